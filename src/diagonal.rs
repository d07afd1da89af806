//! Matrix product by generalized-diagonal decomposition.
//!
//! The client pads the left operand to a power-of-two square, rewrites it
//! as a matrix whose rows are its generalized diagonals, and ships those
//! rows packed two per ciphertext together with a twisted encoding of the
//! right operand. The evaluator multiplies each diagonal ciphertext against
//! the operand, rotating the operand two element separations between steps,
//! then folds the two batching rows and switches the result down for
//! transmission. Only scheme-native operations are used: slotwise multiply,
//! additive combine, and cyclic slot rotation.

use crate::codec::MatrixCodec;
use crate::error::{Error, Result};
use crate::layout::next_power_of_two;
use crate::matrix::Matrix;
use crate::scheme::{Ciphertext, Encryptor, Evaluator, RelinKey, RotationKeys, SchemeContext};

/// Client-side encoding of one product invocation.
pub struct ProductEncoding {
    /// Diagonal ciphertexts, two generalized diagonals each, in order.
    pub diagonals: Vec<Ciphertext>,
    /// Twisted encoding of the right operand.
    pub operand: Ciphertext,
    /// Padded working dimension (power of two).
    pub dimension: usize,
    /// Columns of the right operand (the wide result's column count).
    pub result_cols: usize,
}

/// Matrix whose row r is the r-th generalized diagonal of `a` padded to
/// `dimension`: out[r][c] = padded[c][(c + r) mod dimension].
pub fn cyclic_diagonals(a: &Matrix, dimension: usize) -> Result<Matrix> {
    let padded = a.padded(dimension, dimension)?;
    let mut out = Matrix::zeros(dimension, dimension)?;
    for r in 0..dimension {
        for c in 0..dimension {
            out.set(r, c, padded.at(c, (c + r) % dimension));
        }
    }
    Ok(out)
}

/// Orientation heuristic: transposing pays off when the right operand's
/// larger extent is smaller than the left's, since the padded dimension
/// (and with it the number of diagonal steps) shrinks.
pub fn should_transpose(a: &Matrix, b: &Matrix) -> bool {
    b.max_extent() < a.max_extent()
}

/// Apply the orientation heuristic: returns the operands to actually
/// encode and whether they were swapped onto their transposes.
pub fn orient_operands(a: &Matrix, b: &Matrix) -> (Matrix, Matrix, bool) {
    if should_transpose(a, b) {
        (b.transpose(), a.transpose(), true)
    } else {
        (a.clone(), b.clone(), false)
    }
}

/// Undo the orientation on the decoded wide result and cut it down to the
/// declared result shape.
pub fn finalize_product(
    wide: Matrix,
    transposed: bool,
    result_rows: usize,
    result_cols: usize,
) -> Result<Matrix> {
    let oriented = if transposed { wide.transpose() } else { wide };
    oriented.window(result_rows, result_cols)
}

/// Validate shapes and encode both operands for the evaluator.
///
/// Precondition: inner dimensions match; both operands are non-empty. A
/// mismatch is a validation error raised before anything is encoded.
pub fn encode_product_operands(
    a: &Matrix,
    b: &Matrix,
    codec: &MatrixCodec,
    encryptor: &mut Encryptor,
) -> Result<ProductEncoding> {
    if a.cols() != b.rows() {
        return Err(Error::validation(
            "matrices are incompatible for multiplication",
        ));
    }
    codec.validate_operand(a)?;
    codec.validate_operand(b)?;

    let dimension = next_power_of_two(a.max_extent() as u64) as usize;

    let diag_matrix = cyclic_diagonals(a, dimension)?;
    let diagonals = codec.rows_to_ciphertexts(&diag_matrix, b.cols(), encryptor)?;

    let padded_b = b.padded(dimension, b.cols())?;
    let operand = codec.matrix_to_twisted_ciphertext(&padded_b, encryptor)?;

    Ok(ProductEncoding {
        diagonals,
        operand,
        dimension,
        result_cols: b.cols(),
    })
}

/// Evaluator-side product: multiply/rotate/accumulate over the diagonal
/// set, relinearize, fold the batching rows, and switch down.
///
/// The working dimension is recovered as twice the diagonal count; with a
/// dimension of two the operand rotation degenerates to a no-op, exactly
/// as the single-diagonal-ciphertext case requires.
pub fn diagonal_product(
    ctx: &SchemeContext,
    evaluator: &Evaluator,
    diagonals: &[Ciphertext],
    operand: &Ciphertext,
    relin: &RelinKey,
    rotation: &RotationKeys,
) -> Result<Ciphertext> {
    if diagonals.is_empty() {
        return Err(Error::validation("empty diagonal set"));
    }
    let dimension = 2 * diagonals.len();
    if !dimension.is_power_of_two() {
        return Err(Error::validation("dimension is not a power of two"));
    }

    let half = ctx.params().batch_half_size();
    let separation = if dimension > 2 { half / dimension } else { 0 };

    let mut operand = operand.clone();
    let mut partials = Vec::with_capacity(diagonals.len());
    for diagonal in diagonals {
        partials.push(evaluator.multiply(diagonal, &operand)?);
        operand = evaluator.rotate_rows(&operand, 2 * separation, rotation)?;
    }

    let sum = evaluator.add_many(&partials)?;
    let sum = evaluator.relinearize(&sum, relin)?;
    let folded = evaluator.rotate_columns(&sum, rotation)?;
    let sum = evaluator.add(&sum, &folded)?;
    evaluator.mod_switch_to_smallest(&sum)
}
