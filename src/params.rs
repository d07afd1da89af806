//! BFV parameter sets for batched matrix computation.
//!
//! The plaintext modulus is the prime used by the original deployment:
//! t = 2^13 * 119 + 1 = 974849, which satisfies t ≡ 1 (mod 2n) for every
//! supported ring degree and leaves headroom for result slots in
//! [-127*128*16, 128*128*16].

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Plaintext modulus: prime, ≡ 1 (mod 8192).
pub const PLAIN_MODULUS: u64 = (1u64 << 13) * 119 + 1;

/// Smallest element value the matrix layer accepts.
pub const ELEMENT_MIN: i64 = -128;

/// Largest element value the matrix layer accepts.
pub const ELEMENT_MAX: i64 = 127;

/// NTT-friendly 60-bit prime: 2^60 - 2^14 + 1.
const Q0: u64 = 1152921504606830593;

/// NTT-friendly 64-bit prime: 2^64 - 2^32 + 1.
const Q1: u64 = 18446744069414584321;

/// Auxiliary NTT primes (each ≡ 1 mod 2^21) used to carry exact
/// tensor-product coefficients during homomorphic multiplication.
const AUX_MODULI: [u64; 5] = [998244353, 754974721, 469762049, 167772161, 1004535809];

/// Parameters for the batched BFV scheme.
///
/// Both sides of the protocol must construct their context from identical
/// parameters; the layouts computed by the matrix codec are a pure function
/// of `poly_degree`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BfvParams {
    /// Ring degree n (power of two). Equals the slot count of the batch
    /// encoder; the batch half size is n/2.
    pub poly_degree: usize,

    /// Plaintext modulus t. Must be ≡ 1 (mod 2n) for batching.
    pub plain_modulus: u64,

    /// RNS basis of the ciphertext modulus q = q0 * q1.
    pub crt_moduli: Vec<u64>,

    /// Extension primes for exact tensor products during multiplication.
    pub aux_moduli: Vec<u64>,

    /// Standard deviation of the Gaussian error distribution.
    pub sigma: f64,

    /// Gadget decomposition base for key switching.
    pub gadget_base: u64,

    /// Number of gadget digits: ⌈log_base(q)⌉.
    pub gadget_len: usize,

    /// Largest matrix extent the layer supports (rows or columns).
    pub matrix_size_max: usize,
}

impl BfvParams {
    /// Production-shaped parameters: n = 4096, matching the original
    /// deployment's degree and plaintext modulus.
    pub fn demo_4096() -> Self {
        Self::with_degree(4096)
    }

    /// Reduced-degree parameters for fast tests. Same plaintext modulus and
    /// ciphertext basis, so all layout and noise behavior carries over.
    pub fn test_1024() -> Self {
        Self::with_degree(1024)
    }

    fn with_degree(poly_degree: usize) -> Self {
        // q = q0 * q1 is a 124-bit modulus; 7 base-2^20 digits cover it.
        Self {
            poly_degree,
            plain_modulus: PLAIN_MODULUS,
            crt_moduli: vec![Q0, Q1],
            aux_moduli: AUX_MODULI.to_vec(),
            sigma: 6.4,
            gadget_base: 1 << 20,
            gadget_len: 7,
            matrix_size_max: 16,
        }
    }

    /// Slot count of the batch encoder (one slot per ring coefficient).
    pub fn slot_count(&self) -> usize {
        self.poly_degree
    }

    /// Size of one batching row (half the slots).
    pub fn batch_half_size(&self) -> usize {
        self.poly_degree / 2
    }

    /// Composite ciphertext modulus q as a 128-bit integer.
    pub fn modulus_u128(&self) -> u128 {
        self.crt_moduli
            .iter()
            .fold(1u128, |acc, &m| acc * m as u128)
    }

    /// Scaling factor Δ = ⌊q/t⌋.
    pub fn delta_u128(&self) -> u128 {
        self.modulus_u128() / self.plain_modulus as u128
    }

    /// Rotation step counts the client provisions Galois keys for:
    /// n/matrix_size_max, doubling while below n/2. Together with the
    /// column-swap element this covers every step the diagonal product
    /// engine rotates by.
    pub fn rotation_steps(&self) -> Vec<usize> {
        let mut steps = Vec::new();
        let mut i = self.poly_degree / self.matrix_size_max;
        while i < self.poly_degree / 2 {
            steps.push(i);
            i *= 2;
        }
        steps
    }

    /// Check the structural constraints the scheme relies on.
    pub fn validate(&self) -> Result<()> {
        let n = self.poly_degree;
        if !n.is_power_of_two() || n < 4 {
            return Err(Error::validation("poly_degree must be a power of two >= 4"));
        }

        let two_n = 2 * n as u64;
        if self.plain_modulus % two_n != 1 {
            return Err(Error::validation(
                "plain_modulus must be ≡ 1 (mod 2n) for batching",
            ));
        }
        for &q in self.crt_moduli.iter().chain(self.aux_moduli.iter()) {
            if q % two_n != 1 {
                return Err(Error::validation(format!(
                    "modulus {q} is not NTT-friendly for degree {n}"
                )));
            }
        }
        if self.crt_moduli.is_empty() {
            return Err(Error::validation("crt_moduli must be non-empty"));
        }

        if self.gadget_base < 2 || !self.gadget_base.is_power_of_two() {
            return Err(Error::validation("gadget_base must be a power of two >= 2"));
        }
        let base_bits = self.gadget_base.trailing_zeros() as usize;
        let q_bits = 128 - self.modulus_u128().leading_zeros() as usize;
        if base_bits * self.gadget_len < q_bits {
            return Err(Error::validation(
                "gadget digits do not cover the ciphertext modulus",
            ));
        }

        if self.matrix_size_max < 1 || self.matrix_size_max > self.batch_half_size() {
            return Err(Error::validation(
                "matrix_size_max must fit within one batching row",
            ));
        }

        Ok(())
    }
}

impl Default for BfvParams {
    fn default() -> Self {
        Self::demo_4096()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_params_valid() {
        assert!(BfvParams::demo_4096().validate().is_ok());
        assert!(BfvParams::test_1024().validate().is_ok());
    }

    #[test]
    fn delta_is_large() {
        let params = BfvParams::demo_4096();
        // q ≈ 2^124, t ≈ 2^20, so Δ ≈ 2^104.
        assert!(params.delta_u128() > 1u128 << 100);
    }

    #[test]
    fn rotation_steps_cover_engine_strides() {
        let params = BfvParams::test_1024();
        let steps = params.rotation_steps();
        assert_eq!(steps, vec![64, 128, 256]);

        // The product engine rotates by 2 * (n/2)/dimension = n/dimension
        // for every padded dimension above 2.
        let mut dim = 4;
        while dim <= params.matrix_size_max {
            assert!(steps.contains(&(params.poly_degree / dim)));
            dim *= 2;
        }
    }

    #[test]
    fn non_power_of_two_degree_rejected() {
        let mut params = BfvParams::test_1024();
        params.poly_degree = 1000;
        assert!(params.validate().is_err());
    }
}
