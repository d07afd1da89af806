//! Batch encoding: slot vectors <-> plaintext ring elements.
//!
//! Slots form a 2 x (n/2) matrix. Row 0 slot i corresponds to evaluating
//! the plaintext polynomial at ψ^(3^i mod 2n), row 1 slot i at ψ^(-3^i),
//! where ψ is a primitive 2n-th root of unity mod t. With that layout the
//! automorphism X -> X^(3^k) rotates both rows left by k slots and
//! X -> X^(2n-1) swaps the rows, which is what the evaluator's rotation
//! keys implement on ciphertexts.

use crate::error::{Error, Result};
use crate::math::{ModQ, NttTable};
use crate::params::BfvParams;

use super::types::Plaintext;

/// Encoder/decoder between signed slot values and plaintext polynomials.
pub struct BatchEncoder {
    slot_count: usize,
    plain_modulus: u64,
    table: NttTable,
    /// slot index -> position in the evaluation-domain vector.
    eval_index: Vec<usize>,
}

impl BatchEncoder {
    /// Build the encoder for the given parameters.
    pub fn new(params: &BfvParams) -> Result<Self> {
        params.validate()?;
        let n = params.poly_degree;
        let t = params.plain_modulus;
        let table = NttTable::new(n, t);

        let two_n = 2 * n;
        let mut eval_index = vec![0usize; n];
        let mut pow3 = 1usize;
        for i in 0..n / 2 {
            // Evaluation point ψ^(2j+1) sits at position j.
            eval_index[i] = (pow3 - 1) / 2;
            eval_index[n / 2 + i] = (two_n - pow3 - 1) / 2;
            pow3 = (pow3 * 3) % two_n;
        }

        Ok(Self {
            slot_count: n,
            plain_modulus: t,
            table,
            eval_index,
        })
    }

    /// Number of slots (equal to the ring degree).
    pub fn slot_count(&self) -> usize {
        self.slot_count
    }

    /// Encode a full slot vector into a plaintext.
    pub fn encode(&self, values: &[i64]) -> Result<Plaintext> {
        if values.len() != self.slot_count {
            return Err(Error::validation(format!(
                "expected {} slot values, got {}",
                self.slot_count,
                values.len()
            )));
        }
        let half = (self.plain_modulus / 2) as i64;
        for &v in values {
            if v < -half || v > half {
                return Err(Error::validation(format!(
                    "slot value {v} outside the plaintext alphabet"
                )));
            }
        }

        let mut evals = vec![0u64; self.slot_count];
        for (slot, &v) in values.iter().enumerate() {
            evals[self.eval_index[slot]] = ModQ::from_signed(v, self.plain_modulus);
        }
        self.table.inverse(&mut evals);
        Ok(Plaintext::from_coeffs(evals))
    }

    /// Decode a plaintext back into signed slot values.
    pub fn decode(&self, plain: &Plaintext) -> Result<Vec<i64>> {
        if plain.degree() != self.slot_count {
            return Err(Error::validation(format!(
                "plaintext degree {} does not match slot count {}",
                plain.degree(),
                self.slot_count
            )));
        }

        let mut evals = plain.coeffs.clone();
        self.table.forward(&mut evals);
        Ok((0..self.slot_count)
            .map(|slot| ModQ::to_signed(evals[self.eval_index[slot]], self.plain_modulus))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::RnsPoly;
    use crate::params::BfvParams;

    const PLAIN_HALF: i64 = (crate::params::PLAIN_MODULUS / 2) as i64;

    fn encoder() -> BatchEncoder {
        BatchEncoder::new(&BfvParams::test_1024()).unwrap()
    }

    #[test]
    fn encode_decode_round_trip() {
        let enc = encoder();
        let n = enc.slot_count();
        let values: Vec<i64> = (0..n as i64).map(|i| (i % 255) - 127).collect();
        let plain = enc.encode(&values).unwrap();
        assert_eq!(enc.decode(&plain).unwrap(), values);
    }

    #[test]
    fn rejects_out_of_alphabet_values() {
        let enc = encoder();
        let mut values = vec![0i64; enc.slot_count()];
        values[0] = PLAIN_HALF + 1;
        assert!(enc.encode(&values).is_err());
    }

    #[test]
    fn row_rotation_automorphism_shifts_slots() {
        // Applying X -> X^(3^k) to the plaintext must rotate each batching
        // row left by k.
        let params = BfvParams::test_1024();
        let enc = encoder();
        let n = enc.slot_count();
        let half = n / 2;

        let values: Vec<i64> = (0..n as i64).map(|i| (i * 7 % 200) - 100).collect();
        let plain = enc.encode(&values).unwrap();

        let k = 5usize;
        let two_n = 2 * n;
        let mut g = 1usize;
        for _ in 0..k {
            g = (g * 3) % two_n;
        }

        let poly = RnsPoly::from_small_unsigned(&plain.coeffs, &[params.plain_modulus]);
        let rotated = poly.automorphism(g);
        let rotated_plain = Plaintext::from_coeffs(rotated.residues(0).to_vec());
        let decoded = enc.decode(&rotated_plain).unwrap();

        for i in 0..half {
            assert_eq!(decoded[i], values[(i + k) % half], "row 0 slot {i}");
            assert_eq!(
                decoded[half + i],
                values[half + (i + k) % half],
                "row 1 slot {i}"
            );
        }
    }

    #[test]
    fn column_swap_automorphism_swaps_rows() {
        let params = BfvParams::test_1024();
        let enc = encoder();
        let n = enc.slot_count();
        let half = n / 2;

        let values: Vec<i64> = (0..n as i64).map(|i| (i % 100) - 50).collect();
        let plain = enc.encode(&values).unwrap();

        let poly = RnsPoly::from_small_unsigned(&plain.coeffs, &[params.plain_modulus]);
        let swapped = poly.automorphism(2 * n - 1);
        let swapped_plain = Plaintext::from_coeffs(swapped.residues(0).to_vec());
        let decoded = enc.decode(&swapped_plain).unwrap();

        for i in 0..half {
            assert_eq!(decoded[i], values[half + i]);
            assert_eq!(decoded[half + i], values[i]);
        }
    }
}
