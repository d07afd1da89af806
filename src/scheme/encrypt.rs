//! Public-key encryption and decryption.

use std::sync::Arc;

use num_bigint::BigInt;
use num_traits::ToPrimitive;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

use crate::error::{Error, Result};
use crate::math::crt::scale_round;
use crate::math::{GaussianSampler, RnsPoly};

use super::context::SchemeContext;
use super::keys::{PublicKey, SecretKey};
use super::types::{Ciphertext, Plaintext};

/// Encrypts plaintexts under a public key.
pub struct Encryptor {
    ctx: Arc<SchemeContext>,
    pk: PublicKey,
    rng: ChaCha20Rng,
    sampler: GaussianSampler,
}

impl Encryptor {
    /// Bind a public key to the context.
    pub fn new(ctx: Arc<SchemeContext>, pk: PublicKey) -> Self {
        let sampler = GaussianSampler::new(ctx.params().sigma);
        Self {
            ctx,
            pk,
            rng: ChaCha20Rng::from_entropy(),
            sampler,
        }
    }

    /// Encrypt a plaintext: (p0·u + e0 + Δ·m, p1·u + e1).
    pub fn encrypt(&mut self, plain: &Plaintext) -> Result<Ciphertext> {
        let ctx = self.ctx.clone();
        let n = ctx.degree();
        if plain.degree() != n {
            return Err(Error::validation(format!(
                "plaintext degree {} does not match ring degree {n}",
                plain.degree()
            )));
        }

        let moduli = ctx.main_moduli();
        let u = RnsPoly::ternary(n, moduli, &mut self.rng);
        let e0 = RnsPoly::gaussian(n, moduli, &mut self.sampler);
        let e1 = RnsPoly::gaussian(n, moduli, &mut self.sampler);

        let scaled_m =
            RnsPoly::from_small_unsigned(&plain.coeffs, moduli).scalar_mul(ctx.delta_residues());

        let c0 = self
            .pk
            .p0
            .mul(&u, ctx.main_tables())
            .add(&e0)
            .add(&scaled_m);
        let c1 = self.pk.p1.mul(&u, ctx.main_tables()).add(&e1);

        Ok(Ciphertext::from_parts(vec![c0, c1]))
    }
}

/// Decrypts ciphertexts with the secret key.
pub struct Decryptor {
    ctx: Arc<SchemeContext>,
    sk: SecretKey,
}

impl Decryptor {
    /// Bind a secret key to the context.
    pub fn new(ctx: Arc<SchemeContext>, sk: SecretKey) -> Self {
        Self { ctx, sk }
    }

    /// Raw phase c0 + c1·s (+ c2·s²) over the ciphertext's basis.
    fn phase(&self, ct: &Ciphertext) -> Result<RnsPoly> {
        let ctx = &self.ctx;
        if ct.degree() != ctx.degree() {
            return Err(Error::validation(
                "ciphertext degree does not match the context",
            ));
        }
        let level = ct.moduli().len();
        if level == 0
            || level > ctx.main_moduli().len()
            || ct.moduli() != &ctx.main_moduli()[..level]
        {
            return Err(Error::validation(
                "ciphertext basis does not match the context",
            ));
        }

        let tables = ctx.tables_prefix(level);
        let s = self.sk.s.restrict(level);

        let mut phase = ct.part(0).add(&ct.part(1).mul(&s, tables));
        if ct.size() == 3 {
            let s2 = s.mul(&s, tables);
            phase.add_assign(&ct.part(2).mul(&s2, tables));
        }
        Ok(phase)
    }

    /// Decrypt: m = ⌊t·phase/q⌉ mod t per coefficient.
    pub fn decrypt(&self, ct: &Ciphertext) -> Result<Plaintext> {
        let ctx = &self.ctx;
        let phase = self.phase(ct)?;
        let level = phase.moduli().len();
        let q = ctx.basis_modulus(level);
        let t = ctx.params().plain_modulus;
        let t_big = BigInt::from(t);

        let coeffs = phase
            .lift_u128(ctx.q0_inv_mod_q1())
            .into_iter()
            .map(|x| {
                let rounded = scale_round(&BigInt::from(x), t, &q);
                // Both operands are non-negative here.
                (rounded % &t_big).to_u64().expect("residue fits u64")
            })
            .collect();

        Ok(Plaintext::from_coeffs(coeffs))
    }

    /// Remaining invariant noise budget in bits; decryption fails once this
    /// reaches zero.
    pub fn invariant_noise_budget(&self, ct: &Ciphertext) -> Result<i64> {
        let ctx = &self.ctx;
        let phase = self.phase(ct)?;
        let level = phase.moduli().len();
        let q = ctx.basis_modulus(level);
        let t = ctx.params().plain_modulus;

        let mut worst: BigInt = BigInt::from(0u64);
        for x in phase.lift_u128(ctx.q0_inv_mod_q1()) {
            // v = t·x - round(t·x/q)·q, the centered noise numerator.
            let tx = BigInt::from(x) * t;
            let rounded = scale_round(&BigInt::from(x), t, &q);
            let mut v = tx - rounded * &q;
            if v.sign() == num_bigint::Sign::Minus {
                v = -v;
            }
            if v > worst {
                worst = v;
            }
        }

        let q_bits = q.bits() as i64;
        let noise_bits = worst.bits() as i64;
        Ok((q_bits - 1 - noise_bits).max(0))
    }
}
