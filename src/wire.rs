//! Wire protocol: typed JSON payloads, base64 transport of binary blobs,
//! and framing for ciphertext sequences.
//!
//! Sequences are framed explicitly: a u32 count followed by a u64 length
//! prefix per ciphertext. The original protocol concatenated raw encodings
//! and recovered the count by parsing until failure; that legacy form is
//! still consumable (and producible for byte-compatibility) but nothing
//! emits it by default.

use std::io::Cursor;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::scheme::{Ciphertext, SchemeContext};

/// Add/subtract request: two single-ciphertext matrices.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PairRequest {
    /// Left operand, base64 ciphertext.
    pub matrixa: String,
    /// Right operand, base64 ciphertext.
    pub matrixb: String,
}

/// Session-scoped two-operand request (pairwise multiply, matrix product).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionPairRequest {
    /// Session token.
    pub sid: String,
    /// Left operand: one ciphertext, or a framed sequence for products.
    pub matrixa: String,
    /// Right operand, base64 ciphertext.
    pub matrixb: String,
}

/// Response carrying one result ciphertext.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResultResponse {
    /// Result, base64 ciphertext.
    pub result: String,
}

/// Session-tagged result.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionResultResponse {
    /// Session token the result belongs to.
    pub sid: String,
    /// Result, base64 ciphertext.
    pub result: String,
}

/// Key query/delete request.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KeyRequest {
    /// Session token.
    pub sid: String,
    /// Key kind wire name: "RelinKeys" or "GaloisKeys".
    #[serde(rename = "type")]
    pub kind: String,
}

/// Key upload request.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KeyUploadRequest {
    /// Session token.
    pub sid: String,
    /// Key kind wire name: "RelinKeys" or "GaloisKeys".
    #[serde(rename = "type")]
    pub kind: String,
    /// Key material, base64.
    pub key: String,
}

/// Error payload returned with non-success statuses.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human-readable description of the rejection.
    pub error: String,
}

/// Encode a binary blob for transport.
pub fn blob_to_base64(bytes: &[u8]) -> String {
    BASE64.encode(bytes)
}

/// Decode a transported blob.
pub fn base64_to_blob(text: &str) -> Result<Vec<u8>> {
    Ok(BASE64.decode(text)?)
}

/// Serialize one ciphertext to base64.
pub fn ciphertext_to_base64(ct: &Ciphertext) -> Result<String> {
    Ok(blob_to_base64(&ct.to_bytes()?))
}

/// Load one ciphertext from base64, validating against the context.
pub fn ciphertext_from_base64(text: &str, ctx: &SchemeContext) -> Result<Ciphertext> {
    Ciphertext::from_bytes(&base64_to_blob(text)?, ctx)
}

/// Frame a ciphertext sequence: u32 count, then u64 length + bytes each.
pub fn sequence_to_bytes(cts: &[Ciphertext]) -> Result<Vec<u8>> {
    let count = u32::try_from(cts.len())
        .map_err(|_| Error::validation("ciphertext sequence too long"))?;
    let mut out = Vec::new();
    out.extend_from_slice(&count.to_le_bytes());
    for ct in cts {
        let bytes = ct.to_bytes()?;
        out.extend_from_slice(&(bytes.len() as u64).to_le_bytes());
        out.extend_from_slice(&bytes);
    }
    Ok(out)
}

/// Decode an explicitly framed ciphertext sequence.
pub fn sequence_from_bytes(bytes: &[u8], ctx: &SchemeContext) -> Result<Vec<Ciphertext>> {
    let header: [u8; 4] = bytes
        .get(..4)
        .and_then(|s| s.try_into().ok())
        .ok_or_else(|| Error::deserialization("truncated sequence header"))?;
    let count = u32::from_le_bytes(header) as usize;

    let mut offset = 4usize;
    let mut out = Vec::with_capacity(count);
    for _ in 0..count {
        let len_bytes: [u8; 8] = bytes
            .get(offset..offset + 8)
            .and_then(|s| s.try_into().ok())
            .ok_or_else(|| Error::deserialization("truncated sequence entry header"))?;
        let len = u64::from_le_bytes(len_bytes) as usize;
        offset += 8;

        let end = offset
            .checked_add(len)
            .ok_or_else(|| Error::deserialization("sequence entry length overflows"))?;
        let blob = bytes
            .get(offset..end)
            .ok_or_else(|| Error::deserialization("truncated sequence entry"))?;
        out.push(Ciphertext::from_bytes(blob, ctx)?);
        offset = end;
    }
    if offset != bytes.len() {
        return Err(Error::deserialization("trailing bytes after sequence"));
    }
    Ok(out)
}

/// Frame a ciphertext sequence to base64.
pub fn sequence_to_base64(cts: &[Ciphertext]) -> Result<String> {
    Ok(blob_to_base64(&sequence_to_bytes(cts)?))
}

/// Decode an explicitly framed, base64 ciphertext sequence.
pub fn sequence_from_base64(text: &str, ctx: &SchemeContext) -> Result<Vec<Ciphertext>> {
    sequence_from_bytes(&base64_to_blob(text)?, ctx)
}

/// Produce the legacy concatenated form: raw encodings back to back, no
/// count or length prefixes.
pub fn legacy_sequence_to_bytes(cts: &[Ciphertext]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    for ct in cts {
        out.extend_from_slice(&ct.to_bytes()?);
    }
    Ok(out)
}

/// Decode the legacy concatenated form by loading one ciphertext at a time
/// until loading fails; the first failure is treated as end of stream.
pub fn legacy_sequence_from_bytes(bytes: &[u8], ctx: &SchemeContext) -> Vec<Ciphertext> {
    let mut cursor = Cursor::new(bytes);
    let mut out = Vec::new();
    while (cursor.position() as usize) < bytes.len() {
        match Ciphertext::read_from(&mut cursor, ctx) {
            Ok(ct) => out.push(ct),
            Err(_) => break,
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::BfvParams;
    use crate::scheme::{BatchEncoder, Encryptor, KeyGenerator};
    use std::sync::Arc;

    fn setup() -> (Arc<SchemeContext>, Encryptor, BatchEncoder) {
        let ctx = Arc::new(SchemeContext::new(BfvParams::test_1024()).unwrap());
        let encoder = BatchEncoder::new(ctx.params()).unwrap();
        let mut keygen = KeyGenerator::new(ctx.clone());
        let pk = keygen.public_key();
        (ctx.clone(), Encryptor::new(ctx, pk), encoder)
    }

    fn sample_ciphertexts(count: usize) -> (Arc<SchemeContext>, Vec<Ciphertext>) {
        let (ctx, mut encryptor, encoder) = setup();
        let cts = (0..count)
            .map(|i| {
                let values = vec![i as i64; ctx.degree()];
                encryptor.encrypt(&encoder.encode(&values).unwrap()).unwrap()
            })
            .collect();
        (ctx, cts)
    }

    #[test]
    fn explicit_framing_round_trip() {
        let (ctx, cts) = sample_ciphertexts(3);
        let framed = sequence_to_base64(&cts).unwrap();
        let decoded = sequence_from_base64(&framed, &ctx).unwrap();
        assert_eq!(decoded.len(), 3);
    }

    #[test]
    fn legacy_framing_round_trip() {
        let (ctx, cts) = sample_ciphertexts(2);
        let bytes = legacy_sequence_to_bytes(&cts).unwrap();
        let decoded = legacy_sequence_from_bytes(&bytes, &ctx);
        assert_eq!(decoded.len(), 2);
    }

    #[test]
    fn legacy_decoder_stops_at_garbage() {
        let (ctx, cts) = sample_ciphertexts(1);
        let mut bytes = legacy_sequence_to_bytes(&cts).unwrap();
        bytes.extend_from_slice(b"\xff\xfftrailing garbage");
        let decoded = legacy_sequence_from_bytes(&bytes, &ctx);
        assert_eq!(decoded.len(), 1);
    }

    #[test]
    fn truncated_explicit_frame_rejected() {
        let (ctx, cts) = sample_ciphertexts(2);
        let mut bytes = sequence_to_bytes(&cts).unwrap();
        bytes.truncate(bytes.len() - 10);
        assert!(sequence_from_bytes(&bytes, &ctx).is_err());
    }

    #[test]
    fn malformed_base64_rejected() {
        let (ctx, _, _) = setup();
        assert!(matches!(
            ciphertext_from_base64("&&& not base64 &&&", &ctx),
            Err(Error::Deserialization(_))
        ));
    }
}
