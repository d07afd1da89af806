//! Binary save/load for ciphertexts and key material.
//!
//! Every load validates the blob against the active parameter context:
//! ring degree and modulus basis must match, key-switching keys must carry
//! the expected gadget rows. A mismatch is a deserialization error and is
//! rejected before the object reaches any evaluation path.

use std::io::Read;

use crate::error::{Error, Result};
use crate::math::RnsPoly;

use super::context::SchemeContext;
use super::keys::{KeySwitchKey, RelinKey, RotationKeys};
use super::types::Ciphertext;

fn check_poly(poly: &RnsPoly, ctx: &SchemeContext, full_basis: bool) -> Result<()> {
    if poly.degree() != ctx.degree() {
        return Err(Error::deserialization(
            "polynomial degree does not match the context",
        ));
    }
    let level = poly.moduli().len();
    let valid_basis = if full_basis {
        poly.moduli() == ctx.main_moduli()
    } else {
        level >= 1 && level <= ctx.main_moduli().len() && poly.moduli() == &ctx.main_moduli()[..level]
    };
    if !valid_basis {
        return Err(Error::deserialization(
            "polynomial basis does not match the context",
        ));
    }
    Ok(())
}

fn check_ciphertext(ct: &Ciphertext, ctx: &SchemeContext) -> Result<()> {
    if !(2..=3).contains(&ct.size()) {
        return Err(Error::deserialization("ciphertext must have 2 or 3 parts"));
    }
    for part in ct.parts() {
        check_poly(part, ctx, false)?;
        if part.moduli() != ct.moduli() {
            return Err(Error::deserialization("ciphertext parts disagree on basis"));
        }
    }
    Ok(())
}

fn check_key_switch_key(key: &KeySwitchKey, ctx: &SchemeContext) -> Result<()> {
    if key.rows.len() != ctx.params().gadget_len {
        return Err(Error::deserialization(
            "key-switching key has the wrong number of gadget rows",
        ));
    }
    for (a, b) in &key.rows {
        check_poly(a, ctx, true)?;
        check_poly(b, ctx, true)?;
    }
    Ok(())
}

impl Ciphertext {
    /// Serialize to the binary wire form.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Deserialize and validate against the context.
    pub fn from_bytes(bytes: &[u8], ctx: &SchemeContext) -> Result<Self> {
        let ct: Self = bincode::deserialize(bytes)?;
        check_ciphertext(&ct, ctx)?;
        Ok(ct)
    }

    /// Read one ciphertext from a stream, leaving the cursor after it.
    /// Used by the legacy concatenated sequence decoder.
    pub fn read_from<R: Read>(reader: &mut R, ctx: &SchemeContext) -> Result<Self> {
        let ct: Self = bincode::deserialize_from(reader)?;
        check_ciphertext(&ct, ctx)?;
        Ok(ct)
    }
}

impl RelinKey {
    /// Serialize to the binary wire form.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Deserialize and validate against the context.
    pub fn from_bytes(bytes: &[u8], ctx: &SchemeContext) -> Result<Self> {
        let key: Self = bincode::deserialize(bytes)?;
        check_key_switch_key(&key.0, ctx)?;
        Ok(key)
    }
}

impl RotationKeys {
    /// Serialize to the binary wire form.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Deserialize and validate against the context.
    pub fn from_bytes(bytes: &[u8], ctx: &SchemeContext) -> Result<Self> {
        let keys: Self = bincode::deserialize(bytes)?;
        let two_n = 2 * ctx.degree();
        for (&element, key) in &keys.keys {
            if element % 2 == 0 || element >= two_n {
                return Err(Error::deserialization(format!(
                    "invalid Galois element {element}"
                )));
            }
            check_key_switch_key(key, ctx)?;
        }
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::BfvParams;
    use crate::scheme::batch::BatchEncoder;
    use crate::scheme::encrypt::Encryptor;
    use crate::scheme::keys::KeyGenerator;
    use std::sync::Arc;

    #[test]
    fn ciphertext_round_trips_through_bytes() {
        let ctx = Arc::new(SchemeContext::new(BfvParams::test_1024()).unwrap());
        let encoder = BatchEncoder::new(ctx.params()).unwrap();
        let mut keygen = KeyGenerator::new(ctx.clone());
        let pk = keygen.public_key();
        let mut encryptor = Encryptor::new(ctx.clone(), pk);

        let values = vec![0i64; ctx.degree()];
        let ct = encryptor.encrypt(&encoder.encode(&values).unwrap()).unwrap();

        let bytes = ct.to_bytes().unwrap();
        let loaded = Ciphertext::from_bytes(&bytes, &ctx).unwrap();
        assert_eq!(loaded.size(), 2);
        assert_eq!(loaded.moduli(), ctx.main_moduli());
    }

    #[test]
    fn garbage_bytes_are_rejected() {
        let ctx = SchemeContext::new(BfvParams::test_1024()).unwrap();
        assert!(Ciphertext::from_bytes(b"not a ciphertext", &ctx).is_err());
    }

    #[test]
    fn wrong_degree_is_rejected() {
        let small = Arc::new(SchemeContext::new(BfvParams::test_1024()).unwrap());
        let large = SchemeContext::new(BfvParams::demo_4096()).unwrap();

        let encoder = BatchEncoder::new(small.params()).unwrap();
        let mut keygen = KeyGenerator::new(small.clone());
        let pk = keygen.public_key();
        let mut encryptor = Encryptor::new(small.clone(), pk);
        let ct = encryptor
            .encrypt(&encoder.encode(&vec![1i64; small.degree()]).unwrap())
            .unwrap();

        let bytes = ct.to_bytes().unwrap();
        assert!(Ciphertext::from_bytes(&bytes, &large).is_err());
    }
}
