//! End-to-end correctness of the encrypted matrix layer, without HTTP:
//! encode -> encrypt -> evaluate -> decrypt -> decode against plain
//! reference results.

use std::sync::Arc;

use ciphermat::diagonal::{
    diagonal_product, encode_product_operands, finalize_product, orient_operands,
};
use ciphermat::scheme::{Decryptor, Encryptor, Evaluator, KeyGenerator, RelinKey, RotationKeys};
use ciphermat::{BfvParams, Matrix, MatrixCodec, SchemeContext};

struct Fixture {
    ctx: Arc<SchemeContext>,
    codec: MatrixCodec,
    encryptor: Encryptor,
    decryptor: Decryptor,
    evaluator: Evaluator,
    relin: RelinKey,
    rotation: RotationKeys,
}

fn fixture() -> Fixture {
    let ctx = Arc::new(SchemeContext::new(BfvParams::test_1024()).unwrap());
    let mut keygen = KeyGenerator::new(ctx.clone());
    let pk = keygen.public_key();
    let sk = keygen.secret_key();
    let relin = keygen.relin_key();
    let rotation = keygen.rotation_keys();
    Fixture {
        codec: MatrixCodec::new(ctx.clone()).unwrap(),
        encryptor: Encryptor::new(ctx.clone(), pk),
        decryptor: Decryptor::new(ctx.clone(), sk),
        evaluator: Evaluator::new(ctx.clone()),
        relin,
        rotation,
        ctx,
    }
}

/// Run the whole product pipeline locally, optionally forcing the
/// orientation instead of applying the heuristic.
fn run_product(f: &mut Fixture, a: &Matrix, b: &Matrix, force_transpose: Option<bool>) -> Matrix {
    let (result_rows, result_cols) = (a.rows(), b.cols());
    let (oriented_a, oriented_b, transposed) = match force_transpose {
        None => orient_operands(a, b),
        Some(false) => (a.clone(), b.clone(), false),
        Some(true) => (b.transpose(), a.transpose(), true),
    };

    let encoding =
        encode_product_operands(&oriented_a, &oriented_b, &f.codec, &mut f.encryptor).unwrap();
    let result = diagonal_product(
        &f.ctx,
        &f.evaluator,
        &encoding.diagonals,
        &encoding.operand,
        &f.relin,
        &f.rotation,
    )
    .unwrap();

    // Products come back switched to the smallest parameter set.
    assert_eq!(result.moduli().len(), 1);

    let plain = f.decryptor.decrypt(&result).unwrap();
    let wide = f
        .codec
        .plaintext_to_matrix(&plain, encoding.dimension, encoding.result_cols)
        .unwrap();
    finalize_product(wide, transposed, result_rows, result_cols).unwrap()
}

#[test]
fn full_round_trip_through_encryption() {
    let mut f = fixture();
    let m = Matrix::from_rows(vec![vec![1, -2, 3], vec![-4, 5, -6]]).unwrap();

    let ct = f.codec.matrix_to_ciphertext(&m, &mut f.encryptor).unwrap();
    let plain = f.decryptor.decrypt(&ct).unwrap();
    let back = f.codec.plaintext_to_matrix(&plain, 2, 3).unwrap();
    assert_eq!(back, m);
}

#[test]
fn addition_scenario() {
    let mut f = fixture();
    let a = Matrix::from_rows(vec![vec![1, 2]]).unwrap();
    let b = Matrix::from_rows(vec![vec![3, 4]]).unwrap();

    let ca = f.codec.matrix_to_ciphertext(&a, &mut f.encryptor).unwrap();
    let cb = f.codec.matrix_to_ciphertext(&b, &mut f.encryptor).unwrap();
    let sum = f.evaluator.add(&ca, &cb).unwrap();
    let sum = f.evaluator.mod_switch_to_smallest(&sum).unwrap();

    let plain = f.decryptor.decrypt(&sum).unwrap();
    let result = f.codec.plaintext_to_matrix(&plain, 1, 2).unwrap();
    assert_eq!(result, Matrix::from_rows(vec![vec![4, 6]]).unwrap());
}

#[test]
fn subtraction_scenario() {
    let mut f = fixture();
    let a = Matrix::from_rows(vec![vec![10, -3], vec![0, 7]]).unwrap();
    let b = Matrix::from_rows(vec![vec![4, 5], vec![-2, 7]]).unwrap();

    let ca = f.codec.matrix_to_ciphertext(&a, &mut f.encryptor).unwrap();
    let cb = f.codec.matrix_to_ciphertext(&b, &mut f.encryptor).unwrap();
    let diff = f.evaluator.sub(&ca, &cb).unwrap();
    let diff = f.evaluator.mod_switch_to_smallest(&diff).unwrap();

    let plain = f.decryptor.decrypt(&diff).unwrap();
    let result = f.codec.plaintext_to_matrix(&plain, 2, 2).unwrap();
    assert_eq!(
        result,
        Matrix::from_rows(vec![vec![6, -8], vec![2, 0]]).unwrap()
    );
}

#[test]
fn elementwise_multiplication_scenario() {
    let mut f = fixture();
    let a = Matrix::from_rows(vec![vec![3, -4], vec![5, 6]]).unwrap();
    let b = Matrix::from_rows(vec![vec![7, 8], vec![-9, 10]]).unwrap();

    let ca = f.codec.matrix_to_ciphertext(&a, &mut f.encryptor).unwrap();
    let cb = f.codec.matrix_to_ciphertext(&b, &mut f.encryptor).unwrap();
    let product = f.evaluator.multiply(&ca, &cb).unwrap();
    let product = f.evaluator.relinearize(&product, &f.relin).unwrap();
    let product = f.evaluator.mod_switch_to_smallest(&product).unwrap();

    let plain = f.decryptor.decrypt(&product).unwrap();
    let result = f.codec.plaintext_to_matrix(&plain, 2, 2).unwrap();
    assert_eq!(
        result,
        Matrix::from_rows(vec![vec![21, -32], vec![-45, 60]]).unwrap()
    );
}

#[test]
fn known_matrix_vector_product() {
    let mut f = fixture();
    let a = Matrix::from_rows(vec![vec![1, 2], vec![3, 4]]).unwrap();
    let b = Matrix::from_rows(vec![vec![5], vec![6]]).unwrap();

    let result = run_product(&mut f, &a, &b, None);
    assert_eq!(result, Matrix::from_rows(vec![vec![17], vec![39]]).unwrap());
}

#[test]
fn one_by_one_product() {
    let mut f = fixture();
    let a = Matrix::from_rows(vec![vec![-7]]).unwrap();
    let b = Matrix::from_rows(vec![vec![9]]).unwrap();

    let result = run_product(&mut f, &a, &b, None);
    assert_eq!(result, Matrix::from_rows(vec![vec![-63]]).unwrap());
}

#[test]
fn orientation_invariance() {
    let mut f = fixture();
    let a = Matrix::from_rows(vec![vec![1, 2, 3], vec![4, 5, 6]]).unwrap();
    let b = Matrix::from_rows(vec![
        vec![1, 0, 2, -1],
        vec![3, 1, 0, 2],
        vec![-2, 4, 1, 0],
    ])
    .unwrap();
    let expected = a.product(&b).unwrap();

    let direct = run_product(&mut f, &a, &b, Some(false));
    let via_transpose = run_product(&mut f, &a, &b, Some(true));
    assert_eq!(direct, expected);
    assert_eq!(via_transpose, expected);
}

#[test]
fn non_square_padding_contributes_nothing() {
    let mut f = fixture();
    // 3x2 times 2x3: padded to dimension 4 on both sides.
    let a = Matrix::from_rows(vec![vec![1, -2], vec![0, 5], vec![3, 1]]).unwrap();
    let b = Matrix::from_rows(vec![vec![2, 0, -3], vec![1, 4, 2]]).unwrap();
    let expected = a.product(&b).unwrap();

    assert_eq!(run_product(&mut f, &a, &b, None), expected);
}

#[test]
fn larger_product_with_heuristic_transpose() {
    let mut f = fixture();
    // The left operand's larger extent dominates, so the heuristic kicks in.
    let a = Matrix::from_rows(vec![
        vec![1, 2, 3, 4, 5],
        vec![6, 7, 8, 9, 10],
        vec![11, 12, 13, 14, 15],
        vec![16, 17, 18, 19, 20],
        vec![21, 22, 23, 24, 25],
        vec![26, 27, 28, 29, 30],
    ])
    .unwrap();
    let b = Matrix::from_rows(vec![
        vec![1, -1],
        vec![2, 0],
        vec![0, 3],
        vec![-2, 1],
        vec![1, 2],
    ])
    .unwrap();
    let expected = a.product(&b).unwrap();

    assert_eq!(run_product(&mut f, &a, &b, None), expected);
}

#[test]
fn incompatible_dimensions_rejected_before_encoding() {
    let mut f = fixture();
    let a = Matrix::from_rows(vec![vec![1, 2]]).unwrap();
    let b = Matrix::from_rows(vec![vec![1, 2]]).unwrap();
    let err = encode_product_operands(&a, &b, &f.codec, &mut f.encryptor);
    assert!(err.is_err());
}
