//! Matrix <-> slot-vector codec.
//!
//! Encodes matrices into the batch encoder's slot grid and decodes results
//! back. All layouts derive from `SlotLayout`; the twisted encoding writes
//! a pre-rotated duplicate of the matrix into the second batching row so
//! the product engine can fold both rows with a single column rotation.
//! Failures are raised before any encryption; nothing partially encodes.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::layout::SlotLayout;
use crate::matrix::Matrix;
use crate::params::{ELEMENT_MAX, ELEMENT_MIN};
use crate::scheme::{BatchEncoder, Ciphertext, Encryptor, Plaintext, SchemeContext};

/// Encoder/decoder between matrices and the scheme's slot layout.
pub struct MatrixCodec {
    ctx: Arc<SchemeContext>,
    encoder: BatchEncoder,
}

impl MatrixCodec {
    /// Build a codec over the context's batch encoder.
    pub fn new(ctx: Arc<SchemeContext>) -> Result<Self> {
        let encoder = BatchEncoder::new(ctx.params())?;
        Ok(Self { ctx, encoder })
    }

    /// The underlying batch encoder.
    pub fn encoder(&self) -> &BatchEncoder {
        &self.encoder
    }

    fn slot_count(&self) -> usize {
        self.ctx.params().slot_count()
    }

    fn batch_half(&self) -> usize {
        self.ctx.params().batch_half_size()
    }

    /// Reject matrices outside the supported size or alphabet before any
    /// encoding work happens.
    pub fn validate_operand(&self, matrix: &Matrix) -> Result<()> {
        let max = self.ctx.params().matrix_size_max;
        if matrix.rows() > max || matrix.cols() > max {
            return Err(Error::validation(format!(
                "matrix extent exceeds the supported maximum of {max}"
            )));
        }
        for &v in matrix.entries() {
            if !(ELEMENT_MIN..=ELEMENT_MAX).contains(&v) {
                return Err(Error::validation(format!(
                    "matrix element {v} outside [{ELEMENT_MIN}, {ELEMENT_MAX}]"
                )));
            }
        }
        Ok(())
    }

    /// Row-major layout: row r, column c at slot r·sep + c.
    pub fn matrix_to_plaintext(&self, matrix: &Matrix) -> Result<Plaintext> {
        self.validate_operand(matrix)?;
        let layout = SlotLayout::new(self.slot_count(), matrix.rows());
        let sep = layout.element_separation;
        if matrix.cols() > sep {
            return Err(Error::validation("matrix is too wide for its slot layout"));
        }

        let mut slots = vec![0i64; self.slot_count()];
        for r in 0..matrix.rows() {
            for c in 0..matrix.cols() {
                slots[r * sep + c] = matrix.at(r, c);
            }
        }
        self.encoder.encode(&slots)
    }

    /// Encode and encrypt a whole matrix into one ciphertext.
    pub fn matrix_to_ciphertext(
        &self,
        matrix: &Matrix,
        encryptor: &mut Encryptor,
    ) -> Result<Ciphertext> {
        let plain = self.matrix_to_plaintext(matrix)?;
        encryptor.encrypt(&plain)
    }

    /// As `matrix_to_ciphertext`, with a duplicate of the matrix in the
    /// second batching row, cyclically shifted back one element separation.
    /// The -1 row offset aligns the duplicate with the rotation schedule of
    /// the diagonal product engine.
    pub fn matrix_to_twisted_ciphertext(
        &self,
        matrix: &Matrix,
        encryptor: &mut Encryptor,
    ) -> Result<Ciphertext> {
        self.validate_operand(matrix)?;
        let half = self.batch_half();
        let layout = SlotLayout::new(self.slot_count(), matrix.rows());
        let sep = layout.element_separation;
        if matrix.cols() > sep {
            return Err(Error::validation("matrix is too wide for its slot layout"));
        }

        let mut slots = vec![0i64; self.slot_count()];
        for r in 0..matrix.rows() {
            for c in 0..matrix.cols() {
                slots[r * sep + c] = matrix.at(r, c);
                slots[half + ((half + r * sep - sep) % half) + c] = matrix.at(r, c);
            }
        }
        let plain = self.encoder.encode(&slots)?;
        encryptor.encrypt(&plain)
    }

    /// Encrypt matrix rows two at a time, one batching row each, with every
    /// value replicated `replication` consecutive slots. Produces
    /// ceil(rows/2) ciphertexts in row order.
    pub fn rows_to_ciphertexts(
        &self,
        matrix: &Matrix,
        replication: usize,
        encryptor: &mut Encryptor,
    ) -> Result<Vec<Ciphertext>> {
        self.validate_operand(matrix)?;
        let half = self.batch_half();
        let layout = SlotLayout::new(self.slot_count(), matrix.cols());
        let sep = layout.element_separation;
        if replication > sep {
            return Err(Error::validation(format!(
                "replication count {replication} exceeds the element separation {sep}"
            )));
        }

        let mut plains = Vec::new();
        let mut r = 0;
        while r < matrix.rows() {
            let mut slots = vec![0i64; self.slot_count()];
            let mut batch_row = 0;
            while batch_row < 2 && r < matrix.rows() {
                for c in 0..matrix.cols() {
                    for j in 0..replication {
                        slots[batch_row * half + sep * c + j] = matrix.at(r, c);
                    }
                }
                batch_row += 1;
                r += 1;
            }
            plains.push(self.encoder.encode(&slots)?);
        }

        // Encode everything before encrypting so a bad row cannot leave a
        // partially produced sequence.
        plains
            .into_iter()
            .map(|plain| encryptor.encrypt(&plain))
            .collect()
    }

    /// Encrypt one matrix column, one value per row at slot sep·r.
    pub fn inverted_column_to_ciphertext(
        &self,
        matrix: &Matrix,
        col: usize,
        encryptor: &mut Encryptor,
    ) -> Result<Ciphertext> {
        self.validate_operand(matrix)?;
        if col >= matrix.cols() {
            return Err(Error::validation(format!(
                "column {col} out of bounds for a {}-column matrix",
                matrix.cols()
            )));
        }
        let layout = SlotLayout::new(self.slot_count(), matrix.rows());
        let sep = layout.element_separation;

        let mut slots = vec![0i64; self.slot_count()];
        for r in 0..matrix.rows() {
            slots[sep * r] = matrix.at(r, col);
        }
        let plain = self.encoder.encode(&slots)?;
        encryptor.encrypt(&plain)
    }

    /// Inverse of the row-major layout: slot r·sep + c -> cell (r, c),
    /// with the separation derived from the declared output rows.
    pub fn plaintext_to_matrix(&self, plain: &Plaintext, rows: usize, cols: usize) -> Result<Matrix> {
        if rows == 0 || cols == 0 {
            return Err(Error::validation("result shape must be non-empty"));
        }
        let layout = SlotLayout::new(self.slot_count(), rows);
        let sep = layout.element_separation;
        if sep == 0 || cols > sep {
            return Err(Error::validation("result shape does not fit the slot layout"));
        }

        let slots = self.encoder.decode(plain)?;
        let mut out = Matrix::zeros(rows, cols)?;
        for r in 0..rows {
            for c in 0..cols {
                out.set(r, c, slots[r * sep + c]);
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::BfvParams;

    fn codec() -> MatrixCodec {
        let ctx = Arc::new(SchemeContext::new(BfvParams::test_1024()).unwrap());
        MatrixCodec::new(ctx).unwrap()
    }

    #[test]
    fn plaintext_round_trip() {
        let codec = codec();
        let m = Matrix::from_rows(vec![vec![1, -2, 3], vec![-4, 5, -6], vec![7, -8, 9]]).unwrap();
        let plain = codec.matrix_to_plaintext(&m).unwrap();
        let back = codec.plaintext_to_matrix(&plain, 3, 3).unwrap();
        assert_eq!(back, m);
    }

    #[test]
    fn boundary_values_round_trip() {
        let codec = codec();
        let m = Matrix::from_rows(vec![vec![ELEMENT_MIN, ELEMENT_MAX]]).unwrap();
        let plain = codec.matrix_to_plaintext(&m).unwrap();
        assert_eq!(codec.plaintext_to_matrix(&plain, 1, 2).unwrap(), m);
    }

    #[test]
    fn out_of_alphabet_entries_rejected() {
        let codec = codec();
        let m = Matrix::from_rows(vec![vec![ELEMENT_MAX + 1]]).unwrap();
        assert!(codec.matrix_to_plaintext(&m).is_err());

        let m = Matrix::from_rows(vec![vec![ELEMENT_MIN - 1]]).unwrap();
        assert!(codec.matrix_to_plaintext(&m).is_err());
    }

    #[test]
    fn oversized_matrix_rejected() {
        let codec = codec();
        let size = codec.ctx.params().matrix_size_max + 1;
        let m = Matrix::zeros(size, 1).unwrap();
        assert!(codec.matrix_to_plaintext(&m).is_err());
    }

    #[test]
    fn inverted_column_places_one_value_per_row() {
        let codec = codec();
        let ctx = codec.ctx.clone();
        let m = Matrix::from_rows(vec![vec![1, 2], vec![3, 4], vec![5, 6]]).unwrap();
        let sep = SlotLayout::new(ctx.params().slot_count(), m.rows()).element_separation;

        let mut keygen = crate::scheme::KeyGenerator::new(ctx.clone());
        let pk = keygen.public_key();
        let sk = keygen.secret_key();
        let mut encryptor = Encryptor::new(ctx.clone(), pk);
        let decryptor = crate::scheme::Decryptor::new(ctx.clone(), sk);

        assert!(codec
            .inverted_column_to_ciphertext(&m, 2, &mut encryptor)
            .is_err());

        let ct = codec
            .inverted_column_to_ciphertext(&m, 1, &mut encryptor)
            .unwrap();
        let slots = codec
            .encoder
            .decode(&decryptor.decrypt(&ct).unwrap())
            .unwrap();
        for (r, expected) in [2i64, 4, 6].iter().enumerate() {
            assert_eq!(slots[sep * r], *expected);
        }
        assert_eq!(slots[1], 0);
    }

    #[test]
    fn replication_bounds_enforced() {
        let codec = codec();
        let ctx = codec.ctx.clone();
        let m = Matrix::from_rows(vec![vec![1, 2], vec![3, 4]]).unwrap();
        let sep = SlotLayout::new(ctx.params().slot_count(), m.cols()).element_separation;

        let mut keygen = crate::scheme::KeyGenerator::new(ctx.clone());
        let pk = keygen.public_key();
        let mut encryptor = Encryptor::new(ctx, pk);

        assert!(codec
            .rows_to_ciphertexts(&m, sep + 1, &mut encryptor)
            .is_err());
        let ciphers = codec.rows_to_ciphertexts(&m, sep, &mut encryptor).unwrap();
        assert_eq!(ciphers.len(), 1);

        let three_rows = Matrix::from_rows(vec![vec![1], vec![2], vec![3]]).unwrap();
        let ciphers = codec
            .rows_to_ciphertexts(&three_rows, 1, &mut encryptor)
            .unwrap();
        assert_eq!(ciphers.len(), 2);
    }
}
