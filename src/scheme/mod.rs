//! Batched BFV scheme: the homomorphic backend the matrix layer builds on.
//!
//! The matrix codec and product engine only touch this module through the
//! surface a batched scheme exposes: encode/decode, encrypt/decrypt, the
//! homomorphic operators, and binary save/load validated against a shared
//! parameter context.

pub mod batch;
pub mod context;
pub mod encrypt;
pub mod eval;
pub mod keys;
pub mod serialize;
pub mod types;

pub use batch::BatchEncoder;
pub use context::SchemeContext;
pub use encrypt::{Decryptor, Encryptor};
pub use eval::Evaluator;
pub use keys::{KeyGenerator, PublicKey, RelinKey, RotationKeys, SecretKey};
pub use types::{Ciphertext, Plaintext};
