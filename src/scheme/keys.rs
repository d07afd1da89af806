//! Key material and key generation.
//!
//! The relinearization key and the rotation key set are both gadget
//! key-switching keys: ℓ encryptions of base^i times a source polynomial
//! (s² for relinearization, τ_g(s) for each rotation element) under the
//! secret key s. Generating them is the expensive one-time client setup;
//! the evaluator only ever consumes them.

use std::collections::BTreeMap;
use std::sync::Arc;

use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};

use crate::math::{GaussianSampler, RnsPoly};

use super::context::SchemeContext;

/// Secret key: uniform ternary polynomial.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SecretKey {
    pub(crate) s: RnsPoly,
}

/// Public key (b, a) with b = -(a·s + e).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PublicKey {
    pub(crate) p0: RnsPoly,
    pub(crate) p1: RnsPoly,
}

/// One gadget key-switching key: rows (a_i, b_i) with
/// b_i = base^i·source - a_i·s - e_i.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KeySwitchKey {
    pub(crate) rows: Vec<(RnsPoly, RnsPoly)>,
}

impl KeySwitchKey {
    /// Number of gadget rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the key has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Relinearization key: key-switching key for s².
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RelinKey(pub(crate) KeySwitchKey);

/// Rotation key set: one key-switching key per supported Galois element.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RotationKeys {
    pub(crate) keys: BTreeMap<usize, KeySwitchKey>,
}

impl RotationKeys {
    /// Key-switching key for the Galois element `g`, if provisioned.
    pub fn get(&self, g: usize) -> Option<&KeySwitchKey> {
        self.keys.get(&g)
    }

    /// Galois elements this set covers.
    pub fn elements(&self) -> impl Iterator<Item = usize> + '_ {
        self.keys.keys().copied()
    }
}

/// Generates all key material for one client session.
pub struct KeyGenerator {
    ctx: Arc<SchemeContext>,
    rng: ChaCha20Rng,
    sampler: GaussianSampler,
    secret: SecretKey,
}

impl KeyGenerator {
    /// Draw a fresh secret key.
    pub fn new(ctx: Arc<SchemeContext>) -> Self {
        let mut rng = ChaCha20Rng::from_entropy();
        let sampler = GaussianSampler::new(ctx.params().sigma);
        let s = RnsPoly::ternary(ctx.degree(), ctx.main_moduli(), &mut rng);
        Self {
            ctx,
            rng,
            sampler,
            secret: SecretKey { s },
        }
    }

    /// The secret key.
    pub fn secret_key(&self) -> SecretKey {
        self.secret.clone()
    }

    /// Derive the public key.
    pub fn public_key(&mut self) -> PublicKey {
        let ctx = self.ctx.clone();
        let n = ctx.degree();
        let moduli = ctx.main_moduli();

        let a = RnsPoly::uniform(n, moduli, &mut self.rng);
        let e = RnsPoly::gaussian(n, moduli, &mut self.sampler);
        let a_s = a.mul(&self.secret.s, ctx.main_tables());
        let p0 = a_s.add(&e).negate();
        PublicKey { p0, p1: a }
    }

    /// Derive the relinearization key (key-switch from s² to s).
    pub fn relin_key(&mut self) -> RelinKey {
        let ctx = self.ctx.clone();
        let s2 = self.secret.s.mul(&self.secret.s, ctx.main_tables());
        RelinKey(self.key_switch_key(&s2))
    }

    /// Derive rotation keys for every step in the parameter set's schedule
    /// plus the column-swap element.
    pub fn rotation_keys(&mut self) -> RotationKeys {
        let ctx = self.ctx.clone();
        let mut keys = BTreeMap::new();
        for step in ctx.params().rotation_steps() {
            let g = ctx.galois_element_for_step(step);
            let source = self.secret.s.automorphism(g);
            keys.insert(g, self.key_switch_key(&source));
        }
        let g = ctx.column_swap_element();
        let source = self.secret.s.automorphism(g);
        keys.insert(g, self.key_switch_key(&source));

        RotationKeys { keys }
    }

    /// Gadget key-switching key encrypting base^i·source under s.
    fn key_switch_key(&mut self, source: &RnsPoly) -> KeySwitchKey {
        let ctx = self.ctx.clone();
        let n = ctx.degree();
        let moduli = ctx.main_moduli();
        let ell = ctx.params().gadget_len;

        let mut rows = Vec::with_capacity(ell);
        for i in 0..ell {
            let a = RnsPoly::uniform(n, moduli, &mut self.rng);
            let e = RnsPoly::gaussian(n, moduli, &mut self.sampler);
            let a_s = a.mul(&self.secret.s, ctx.main_tables());
            let b = source
                .scalar_mul(ctx.gadget_power(i))
                .sub(&a_s)
                .sub(&e);
            rows.push((a, b));
        }
        KeySwitchKey { rows }
    }
}
