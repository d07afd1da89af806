//! Diagonal-product throughput at the reduced parameter set.

use std::sync::Arc;

use criterion::{criterion_group, criterion_main, Criterion};

use ciphermat::diagonal::{diagonal_product, encode_product_operands};
use ciphermat::scheme::{Encryptor, Evaluator, KeyGenerator};
use ciphermat::{BfvParams, Matrix, MatrixCodec, SchemeContext};

fn bench_product(c: &mut Criterion) {
    let ctx = Arc::new(SchemeContext::new(BfvParams::test_1024()).unwrap());
    let codec = MatrixCodec::new(ctx.clone()).unwrap();
    let mut keygen = KeyGenerator::new(ctx.clone());
    let pk = keygen.public_key();
    let relin = keygen.relin_key();
    let rotation = keygen.rotation_keys();
    let mut encryptor = Encryptor::new(ctx.clone(), pk);
    let evaluator = Evaluator::new(ctx.clone());

    let a = Matrix::from_rows(vec![
        vec![1, 2, 3, 4],
        vec![5, 6, 7, 8],
        vec![9, 10, 11, 12],
        vec![13, 14, 15, 16],
    ])
    .unwrap();
    let b = Matrix::from_rows(vec![vec![1], vec![-2], vec![3], vec![-4]]).unwrap();

    c.bench_function("encode_product_operands_4x4", |bench| {
        bench.iter(|| encode_product_operands(&a, &b, &codec, &mut encryptor).unwrap())
    });

    let encoding = encode_product_operands(&a, &b, &codec, &mut encryptor).unwrap();
    c.bench_function("diagonal_product_4x4", |bench| {
        bench.iter(|| {
            diagonal_product(
                &ctx,
                &evaluator,
                &encoding.diagonals,
                &encoding.operand,
                &relin,
                &rotation,
            )
            .unwrap()
        })
    });
}

criterion_group!(benches, bench_product);
criterion_main!(benches);
