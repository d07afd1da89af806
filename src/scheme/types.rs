//! Plaintext and ciphertext containers.

use serde::{Deserialize, Serialize};

use crate::math::RnsPoly;

/// Batched plaintext: one ring element over the plaintext modulus, holding
/// the slot-encoded values of a matrix layout.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Plaintext {
    /// Coefficients mod t.
    pub coeffs: Vec<u64>,
}

impl Plaintext {
    /// Wrap a coefficient vector.
    pub fn from_coeffs(coeffs: Vec<u64>) -> Self {
        Self { coeffs }
    }

    /// Ring degree (slot count).
    pub fn degree(&self) -> usize {
        self.coeffs.len()
    }
}

/// BFV ciphertext: two polynomials after encryption, three transiently
/// after a multiplication until relinearized. Never mutated once built;
/// homomorphic operators produce new instances.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Ciphertext {
    parts: Vec<RnsPoly>,
}

impl Ciphertext {
    /// Assemble from component polynomials.
    pub fn from_parts(parts: Vec<RnsPoly>) -> Self {
        debug_assert!((2..=3).contains(&parts.len()));
        Self { parts }
    }

    /// Number of polynomial components (2 or 3).
    pub fn size(&self) -> usize {
        self.parts.len()
    }

    /// Component `i`.
    pub fn part(&self, i: usize) -> &RnsPoly {
        &self.parts[i]
    }

    /// All components.
    pub fn parts(&self) -> &[RnsPoly] {
        &self.parts
    }

    /// Ring degree.
    pub fn degree(&self) -> usize {
        self.parts[0].degree()
    }

    /// The modulus basis this ciphertext lives in.
    pub fn moduli(&self) -> &[u64] {
        self.parts[0].moduli()
    }
}
