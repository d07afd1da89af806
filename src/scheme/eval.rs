//! Homomorphic operations over BFV ciphertexts.
//!
//! Addition and subtraction are componentwise. Multiplication computes the
//! exact integer tensor product in an extended NTT basis, recomposes each
//! coefficient by CRT, and rescales by t/q. Relinearization and rotations
//! are gadget key switches; rotations first apply the Galois automorphism
//! to both components. Modulus switching drops the second ciphertext prime
//! to shrink transmitted results.

use std::sync::Arc;

use num_integer::Integer;

use crate::error::{Error, Result};
use crate::math::crt::{reduce_u64, scale_round};
use crate::math::{ModQ, RnsPoly};

use super::context::SchemeContext;
use super::keys::{KeySwitchKey, RelinKey, RotationKeys};
use super::types::Ciphertext;

/// Stateless operation dispatcher bound to one context.
pub struct Evaluator {
    ctx: Arc<SchemeContext>,
}

impl Evaluator {
    /// Bind to a context.
    pub fn new(ctx: Arc<SchemeContext>) -> Self {
        Self { ctx }
    }

    fn check_pair(&self, a: &Ciphertext, b: &Ciphertext) -> Result<()> {
        if a.degree() != self.ctx.degree() || b.degree() != self.ctx.degree() {
            return Err(Error::validation(
                "ciphertext degree does not match the context",
            ));
        }
        if a.size() != b.size() {
            return Err(Error::validation("ciphertext sizes differ"));
        }
        if a.moduli() != b.moduli() {
            return Err(Error::validation("ciphertext bases differ"));
        }
        Ok(())
    }

    fn check_full_basis(&self, ct: &Ciphertext) -> Result<()> {
        if ct.moduli() != self.ctx.main_moduli() {
            return Err(Error::validation(
                "operation requires a full-basis ciphertext",
            ));
        }
        Ok(())
    }

    /// Componentwise addition.
    pub fn add(&self, a: &Ciphertext, b: &Ciphertext) -> Result<Ciphertext> {
        self.check_pair(a, b)?;
        let parts = a
            .parts()
            .iter()
            .zip(b.parts().iter())
            .map(|(x, y)| x.add(y))
            .collect();
        Ok(Ciphertext::from_parts(parts))
    }

    /// Sum a non-empty sequence of ciphertexts.
    pub fn add_many(&self, cts: &[Ciphertext]) -> Result<Ciphertext> {
        let (first, rest) = cts
            .split_first()
            .ok_or_else(|| Error::validation("cannot sum an empty ciphertext sequence"))?;
        let mut acc = first.clone();
        for ct in rest {
            acc = self.add(&acc, ct)?;
        }
        Ok(acc)
    }

    /// Componentwise subtraction.
    pub fn sub(&self, a: &Ciphertext, b: &Ciphertext) -> Result<Ciphertext> {
        self.check_pair(a, b)?;
        let parts = a
            .parts()
            .iter()
            .zip(b.parts().iter())
            .map(|(x, y)| x.sub(y))
            .collect();
        Ok(Ciphertext::from_parts(parts))
    }

    /// Componentwise negation.
    pub fn negate(&self, ct: &Ciphertext) -> Result<Ciphertext> {
        Ok(Ciphertext::from_parts(
            ct.parts().iter().map(|p| p.negate()).collect(),
        ))
    }

    /// Lift a full-basis polynomial into the extended basis, transformed to
    /// the evaluation domain: one residue row per extension prime.
    fn extend_ntt(&self, poly: &RnsPoly) -> Vec<Vec<u64>> {
        let ctx = &self.ctx;
        let q = ctx.modulus_u128();
        let half_q = q / 2;

        let centered: Vec<i128> = poly
            .lift_u128(ctx.q0_inv_mod_q1())
            .into_iter()
            .map(|x| {
                if x > half_q {
                    x as i128 - q as i128
                } else {
                    x as i128
                }
            })
            .collect();

        ctx.ext_moduli()
            .iter()
            .zip(ctx.ext_tables().iter())
            .map(|(&p, table)| {
                let mut row: Vec<u64> = centered
                    .iter()
                    .map(|&c| c.rem_euclid(p as i128) as u64)
                    .collect();
                table.forward(&mut row);
                row
            })
            .collect()
    }

    /// Recompose extended-basis residue rows into a main-basis polynomial,
    /// rescaling each exact tensor coefficient by t/q.
    fn rescale_to_main(&self, mut rows: Vec<Vec<u64>>) -> RnsPoly {
        let ctx = &self.ctx;
        let n = ctx.degree();
        let t = ctx.params().plain_modulus;
        let q = ctx.modulus();

        for (row, table) in rows.iter_mut().zip(ctx.ext_tables().iter()) {
            table.inverse(row);
        }

        let mut residues: Vec<u64> = vec![0; rows.len()];
        let mut out: Vec<Vec<u64>> = ctx.main_moduli().iter().map(|_| vec![0u64; n]).collect();
        for k in 0..n {
            for (i, row) in rows.iter().enumerate() {
                residues[i] = row[k];
            }
            let exact = ctx.ext_basis().compose_centered(&residues);
            let scaled = scale_round(&exact, t, q).mod_floor(q);
            for (j, &p) in ctx.main_moduli().iter().enumerate() {
                out[j][k] = reduce_u64(&scaled, p);
            }
        }

        RnsPoly::from_residue_rows(out, ctx.main_moduli())
    }

    /// BFV multiplication of two size-2 ciphertexts; the result has three
    /// components until relinearized.
    pub fn multiply(&self, a: &Ciphertext, b: &Ciphertext) -> Result<Ciphertext> {
        self.check_pair(a, b)?;
        self.check_full_basis(a)?;
        if a.size() != 2 {
            return Err(Error::validation(
                "multiplication requires size-2 ciphertexts",
            ));
        }

        let ctx = &self.ctx;
        let a0 = self.extend_ntt(a.part(0));
        let a1 = self.extend_ntt(a.part(1));
        let b0 = self.extend_ntt(b.part(0));
        let b1 = self.extend_ntt(b.part(1));

        let prime_count = ctx.ext_moduli().len();
        let n = ctx.degree();
        let mut e0 = Vec::with_capacity(prime_count);
        let mut e1 = Vec::with_capacity(prime_count);
        let mut e2 = Vec::with_capacity(prime_count);
        for (i, &p) in ctx.ext_moduli().iter().enumerate() {
            let mut r0 = vec![0u64; n];
            let mut r1 = vec![0u64; n];
            let mut r2 = vec![0u64; n];
            for k in 0..n {
                r0[k] = ModQ::mul(a0[i][k], b0[i][k], p);
                r1[k] = ModQ::add(
                    ModQ::mul(a0[i][k], b1[i][k], p),
                    ModQ::mul(a1[i][k], b0[i][k], p),
                    p,
                );
                r2[k] = ModQ::mul(a1[i][k], b1[i][k], p);
            }
            e0.push(r0);
            e1.push(r1);
            e2.push(r2);
        }

        Ok(Ciphertext::from_parts(vec![
            self.rescale_to_main(e0),
            self.rescale_to_main(e1),
            self.rescale_to_main(e2),
        ]))
    }

    /// Gadget-decompose a full-basis polynomial into base-z digit polynomials.
    fn gadget_decompose(&self, poly: &RnsPoly) -> Vec<RnsPoly> {
        let ctx = &self.ctx;
        let n = ctx.degree();
        let base = ctx.params().gadget_base as u128;
        let base_bits = ctx.params().gadget_base.trailing_zeros();
        let ell = ctx.params().gadget_len;

        let lifted = poly.lift_u128(ctx.q0_inv_mod_q1());
        (0..ell)
            .map(|i| {
                let mut digits = vec![0u64; n];
                for (k, &x) in lifted.iter().enumerate() {
                    digits[k] = ((x >> (i as u32 * base_bits)) & (base - 1)) as u64;
                }
                RnsPoly::from_small_unsigned(&digits, ctx.main_moduli())
            })
            .collect()
    }

    /// Key switch: Σ_i d_i · (a_i, b_i) over the gadget rows.
    fn key_switch(&self, poly: &RnsPoly, key: &KeySwitchKey) -> Result<(RnsPoly, RnsPoly)> {
        let ctx = &self.ctx;
        if key.rows.len() != ctx.params().gadget_len {
            return Err(Error::validation(
                "key-switching key does not match the gadget parameters",
            ));
        }

        let digits = self.gadget_decompose(poly);
        let mut acc_a = RnsPoly::zero(ctx.degree(), ctx.main_moduli());
        let mut acc_b = RnsPoly::zero(ctx.degree(), ctx.main_moduli());
        for (digit, (row_a, row_b)) in digits.iter().zip(key.rows.iter()) {
            acc_a.add_assign(&digit.mul(row_a, ctx.main_tables()));
            acc_b.add_assign(&digit.mul(row_b, ctx.main_tables()));
        }
        Ok((acc_a, acc_b))
    }

    /// Reduce a size-3 ciphertext back to size 2. A size-2 input passes
    /// through unchanged.
    pub fn relinearize(&self, ct: &Ciphertext, rlk: &RelinKey) -> Result<Ciphertext> {
        if ct.size() == 2 {
            return Ok(ct.clone());
        }
        self.check_full_basis(ct)?;

        let (ka, kb) = self.key_switch(ct.part(2), &rlk.0)?;
        let c0 = ct.part(0).add(&kb);
        let c1 = ct.part(1).add(&ka);
        Ok(Ciphertext::from_parts(vec![c0, c1]))
    }

    fn apply_galois(
        &self,
        ct: &Ciphertext,
        element: usize,
        key: &KeySwitchKey,
    ) -> Result<Ciphertext> {
        if ct.size() != 2 {
            return Err(Error::validation(
                "rotation requires a relinearized ciphertext",
            ));
        }
        self.check_full_basis(ct)?;

        let t0 = ct.part(0).automorphism(element);
        let t1 = ct.part(1).automorphism(element);
        let (ka, kb) = self.key_switch(&t1, key)?;
        Ok(Ciphertext::from_parts(vec![t0.add(&kb), ka]))
    }

    /// Rotate both batching rows left by `steps` slots.
    pub fn rotate_rows(
        &self,
        ct: &Ciphertext,
        steps: usize,
        keys: &RotationKeys,
    ) -> Result<Ciphertext> {
        let steps = steps % (self.ctx.degree() / 2);
        if steps == 0 {
            return Ok(ct.clone());
        }

        let element = self.ctx.galois_element_for_step(steps);
        let key = keys.get(element).ok_or_else(|| {
            Error::validation(format!("no rotation key provisioned for step {steps}"))
        })?;
        self.apply_galois(ct, element, key)
    }

    /// Swap the two batching rows.
    pub fn rotate_columns(&self, ct: &Ciphertext, keys: &RotationKeys) -> Result<Ciphertext> {
        let element = self.ctx.column_swap_element();
        let key = keys
            .get(element)
            .ok_or_else(|| Error::validation("no rotation key provisioned for the column swap"))?;
        self.apply_galois(ct, element, key)
    }

    /// Switch to the smallest basis (first prime only) to shrink the
    /// serialized result. A no-op if already switched.
    pub fn mod_switch_to_smallest(&self, ct: &Ciphertext) -> Result<Ciphertext> {
        let level = ct.moduli().len();
        if level == 1 {
            return Ok(ct.clone());
        }
        self.check_full_basis(ct)?;

        let ctx = &self.ctx;
        let q0 = ctx.main_moduli()[0];
        let q1 = ctx.main_moduli()[1];
        let smallest = &ctx.main_moduli()[..1];

        let parts = ct
            .parts()
            .iter()
            .map(|poly| {
                let row: Vec<u64> = poly
                    .lift_u128(ctx.q0_inv_mod_q1())
                    .into_iter()
                    .map(|x| (((x + q1 as u128 / 2) / q1 as u128) % q0 as u128) as u64)
                    .collect();
                RnsPoly::from_residue_rows(vec![row], smallest)
            })
            .collect();
        Ok(Ciphertext::from_parts(parts))
    }
}
