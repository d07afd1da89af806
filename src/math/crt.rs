//! CRT composition helpers.
//!
//! Residues over the two-prime ciphertext basis compose into a u128; the
//! extended basis used during homomorphic multiplication carries exact
//! tensor-product coefficients, which are recomposed with big integers
//! before the ⌊t·x/q⌉ scaling step.

use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::ToPrimitive;

use super::modular::ModQ;

/// Compose two CRT residues into a value modulo q0 * q1.
///
/// Formula: x = a0 + q0 * ((a1 - a0) * q0^{-1} mod q1).
pub fn compose_2(a0: u64, a1: u64, q0: u64, q1: u64, q0_inv_mod_q1: u64) -> u128 {
    let a0_mod_q1 = a0 % q1;
    let diff = ModQ::sub(a1, a0_mod_q1, q1);
    let t = ModQ::mul(diff, q0_inv_mod_q1, q1);
    a0 as u128 + (q0 as u128) * (t as u128)
}

/// Precomputed CRT recomposition over an arbitrary prime basis.
///
/// For moduli p_0..p_{k-1} with product M, recomposes residue vectors into
/// the unique integer in [0, M).
#[derive(Clone, Debug)]
pub struct CrtBasis {
    moduli: Vec<u64>,
    /// Product of all moduli.
    modulus: BigInt,
    /// M / p_i for each i.
    punctured: Vec<BigInt>,
    /// (M / p_i)^{-1} mod p_i for each i.
    punctured_inv: Vec<u64>,
}

impl CrtBasis {
    /// Build the recomposition tables for the given pairwise-coprime moduli.
    pub fn new(moduli: &[u64]) -> Self {
        let modulus: BigInt = moduli.iter().fold(BigInt::from(1u64), |acc, &m| acc * m);

        let mut punctured = Vec::with_capacity(moduli.len());
        let mut punctured_inv = Vec::with_capacity(moduli.len());
        for &p in moduli {
            let m_i = &modulus / p;
            let m_i_mod_p = (&m_i % p)
                .to_u64()
                .expect("punctured modulus residue fits u64");
            punctured_inv.push(ModQ::inv(m_i_mod_p, p));
            punctured.push(m_i);
        }

        Self {
            moduli: moduli.to_vec(),
            modulus,
            punctured,
            punctured_inv,
        }
    }

    /// The composite modulus M.
    pub fn modulus(&self) -> &BigInt {
        &self.modulus
    }

    /// Recompose residues into the centered representative in
    /// (-M/2, M/2].
    pub fn compose_centered(&self, residues: &[u64]) -> BigInt {
        debug_assert_eq!(residues.len(), self.moduli.len());

        let mut acc = BigInt::from(0u64);
        for i in 0..residues.len() {
            let p = self.moduli[i];
            let term = ModQ::mul(residues[i] % p, self.punctured_inv[i], p);
            acc += &self.punctured[i] * term;
        }
        acc = acc.mod_floor(&self.modulus);

        if &acc * 2u64 > self.modulus {
            acc -= &self.modulus;
        }
        acc
    }
}

/// Round t*x/q to the nearest integer (unreduced; callers reduce into the
/// ring they need).
///
/// Used by the multiplication rescaling step (x is a centered tensor
/// coefficient, result reduced mod q) and by decryption (x is the raw
/// phase, result reduced mod t).
pub fn scale_round(x: &BigInt, t: u64, q: &BigInt) -> BigInt {
    let numerator: BigInt = x * t + (q >> 1);
    numerator.div_floor(q)
}

/// Reduce a non-negative big integer modulo a word-sized prime.
pub fn reduce_u64(x: &BigInt, p: u64) -> u64 {
    x.mod_floor(&BigInt::from(p))
        .to_u64()
        .expect("residue fits u64")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compose_2_round_trip() {
        let q0: u64 = 1152921504606830593;
        let q1: u64 = 18446744069414584321;
        let q0_inv = ModQ::inv(q0 % q1, q1);

        for value in [0u128, 1, 12345678901234567890, (q0 as u128) * 7 + 13] {
            let a0 = (value % q0 as u128) as u64;
            let a1 = (value % q1 as u128) as u64;
            assert_eq!(compose_2(a0, a1, q0, q1, q0_inv), value);
        }
    }

    #[test]
    fn basis_recomposes_centered_values() {
        let moduli = [998244353u64, 754974721, 469762049];
        let basis = CrtBasis::new(&moduli);

        for value in [-123456789i64, -1, 0, 1, 987654321] {
            let residues: Vec<u64> = moduli.iter().map(|&p| ModQ::from_signed(value, p)).collect();
            assert_eq!(basis.compose_centered(&residues), BigInt::from(value));
        }
    }

    #[test]
    fn scale_round_matches_rational_rounding() {
        let q = BigInt::from(1000u64);
        // round(7 * 450 / 1000) = round(3.15) = 3
        assert_eq!(scale_round(&BigInt::from(450u64), 7, &q), BigInt::from(3u64));
        // round(7 * -450 / 1000) = round(-3.15) = -3
        assert_eq!(
            scale_round(&BigInt::from(-450i64), 7, &q),
            BigInt::from(-3i64)
        );
    }
}
