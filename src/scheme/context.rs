//! Shared parameter context.
//!
//! Owns every precomputed table the scheme operations need: NTT tables for
//! the main ciphertext basis and the extended multiplication basis, CRT
//! recomposition data, the Δ scaling residues, and gadget powers for key
//! switching. Both the client and the evaluator build one context from the
//! same `BfvParams` and keep it for the process lifetime.

use num_bigint::BigInt;

use crate::error::{Error, Result};
use crate::math::{CrtBasis, ModQ, NttTable};
use crate::params::BfvParams;

/// Immutable precomputed state for one parameter set.
pub struct SchemeContext {
    params: BfvParams,
    /// NTT tables for the ciphertext basis, one per CRT prime.
    main_tables: Vec<NttTable>,
    /// NTT tables for the extended basis (ciphertext primes + aux primes).
    ext_tables: Vec<NttTable>,
    /// Extended basis moduli in table order.
    ext_moduli: Vec<u64>,
    /// CRT recomposition over the extended basis.
    ext_basis: CrtBasis,
    /// q as a big integer.
    modulus: BigInt,
    /// q as a 128-bit integer.
    modulus_u128: u128,
    /// q0^{-1} mod q1 for two-prime lifting.
    q0_inv_mod_q1: u64,
    /// Δ = ⌊q/t⌋ reduced per ciphertext prime.
    delta_residues: Vec<u64>,
    /// Gadget powers base^i reduced per ciphertext prime: powers[i][j].
    gadget_powers: Vec<Vec<u64>>,
}

impl SchemeContext {
    /// Validate parameters and precompute all tables.
    pub fn new(params: BfvParams) -> Result<Self> {
        params.validate()?;

        let n = params.poly_degree;
        let main_tables: Vec<NttTable> = params
            .crt_moduli
            .iter()
            .map(|&q| NttTable::new(n, q))
            .collect();

        let mut ext_moduli = params.crt_moduli.clone();
        ext_moduli.extend_from_slice(&params.aux_moduli);
        let ext_tables: Vec<NttTable> = ext_moduli.iter().map(|&q| NttTable::new(n, q)).collect();
        let ext_basis = CrtBasis::new(&ext_moduli);

        // The extended basis must hold every exact tensor coefficient:
        // |c| <= n * (q/2)^2.
        let modulus_u128 = params.modulus_u128();
        let modulus: BigInt = params
            .crt_moduli
            .iter()
            .fold(BigInt::from(1u64), |acc, &m| acc * m);
        let half_q = &modulus / 2u64;
        let tensor_bound: BigInt = &half_q * &half_q * (2 * n as u64) + 1u64;
        if ext_basis.modulus() < &tensor_bound {
            return Err(Error::validation(
                "aux_moduli too small to carry exact tensor products",
            ));
        }

        let q0_inv_mod_q1 = if params.crt_moduli.len() == 2 {
            let (q0, q1) = (params.crt_moduli[0], params.crt_moduli[1]);
            ModQ::inv(q0 % q1, q1)
        } else {
            0
        };

        let delta = params.delta_u128();
        let delta_residues = params
            .crt_moduli
            .iter()
            .map(|&q| (delta % q as u128) as u64)
            .collect();

        // base^i mod p_j equals the integer gadget power reduced mod p_j,
        // since every ciphertext prime divides q.
        let gadget_powers = (0..params.gadget_len)
            .map(|i| {
                params
                    .crt_moduli
                    .iter()
                    .map(|&q| ModQ::pow(params.gadget_base, i as u64, q))
                    .collect()
            })
            .collect();

        Ok(Self {
            params,
            main_tables,
            ext_tables,
            ext_moduli,
            ext_basis,
            modulus,
            modulus_u128,
            q0_inv_mod_q1,
            delta_residues,
            gadget_powers,
        })
    }

    /// Scheme parameters.
    pub fn params(&self) -> &BfvParams {
        &self.params
    }

    /// Ring degree n.
    pub fn degree(&self) -> usize {
        self.params.poly_degree
    }

    /// Main ciphertext basis moduli.
    pub fn main_moduli(&self) -> &[u64] {
        &self.params.crt_moduli
    }

    /// NTT tables for the full ciphertext basis.
    pub fn main_tables(&self) -> &[NttTable] {
        &self.main_tables
    }

    /// NTT tables for the first `count` ciphertext primes.
    pub fn tables_prefix(&self, count: usize) -> &[NttTable] {
        &self.main_tables[..count]
    }

    /// Extended basis moduli (ciphertext primes followed by aux primes).
    pub fn ext_moduli(&self) -> &[u64] {
        &self.ext_moduli
    }

    /// NTT tables for the extended basis.
    pub fn ext_tables(&self) -> &[NttTable] {
        &self.ext_tables
    }

    /// CRT recomposition over the extended basis.
    pub fn ext_basis(&self) -> &CrtBasis {
        &self.ext_basis
    }

    /// q as a big integer.
    pub fn modulus(&self) -> &BigInt {
        &self.modulus
    }

    /// q as a 128-bit integer.
    pub fn modulus_u128(&self) -> u128 {
        self.modulus_u128
    }

    /// Product of the first `count` ciphertext primes.
    pub fn basis_modulus(&self, count: usize) -> BigInt {
        self.params.crt_moduli[..count]
            .iter()
            .fold(BigInt::from(1u64), |acc, &m| acc * m)
    }

    /// q0^{-1} mod q1 for lifting two-prime residues.
    pub fn q0_inv_mod_q1(&self) -> u64 {
        self.q0_inv_mod_q1
    }

    /// Δ reduced per ciphertext prime.
    pub fn delta_residues(&self) -> &[u64] {
        &self.delta_residues
    }

    /// Gadget power base^i reduced per ciphertext prime.
    pub fn gadget_power(&self, i: usize) -> &[u64] {
        &self.gadget_powers[i]
    }

    /// Galois element for a row rotation by `steps` (X -> X^(3^steps)).
    pub fn galois_element_for_step(&self, steps: usize) -> usize {
        let two_n = 2 * self.degree();
        let mut element = 1usize;
        let mut base = 3usize;
        let mut exp = steps % (self.degree() / 2);
        while exp > 0 {
            if exp & 1 == 1 {
                element = (element * base) % two_n;
            }
            base = (base * base) % two_n;
            exp >>= 1;
        }
        element
    }

    /// Galois element that swaps the two batching rows (X -> X^(2n-1)).
    pub fn column_swap_element(&self) -> usize {
        2 * self.degree() - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_builds_for_presets() {
        assert!(SchemeContext::new(BfvParams::test_1024()).is_ok());
    }

    #[test]
    fn galois_elements_are_odd_units() {
        let ctx = SchemeContext::new(BfvParams::test_1024()).unwrap();
        let two_n = 2 * ctx.degree();
        for steps in [1usize, 64, 128, 256] {
            let g = ctx.galois_element_for_step(steps);
            assert_eq!(g % 2, 1);
            assert!(g < two_n);
        }
        assert_eq!(ctx.column_swap_element(), two_n - 1);
    }

    #[test]
    fn galois_element_step_one_is_three() {
        let ctx = SchemeContext::new(BfvParams::test_1024()).unwrap();
        assert_eq!(ctx.galois_element_for_step(1), 3);
    }
}
