//! ciphermat: compute on encrypted matrices through a remote evaluator.
//!
//! A client packs integer matrices into the slot grid of a batched BFV
//! scheme, encrypts them, and delegates addition, subtraction, and
//! matrix-vector products to a stateless HTTP evaluator that never sees
//! plaintext. Products use the generalized-diagonal method: the left
//! operand travels as a sequence of packed diagonals, the right as a
//! twisted encoding, and the evaluator drives a multiply/rotate/add
//! schedule with per-session relinearization and rotation keys it caches
//! between calls.
//!
//! Key components:
//! - `layout` / `codec`: slot packing geometry and matrix encodings
//! - `diagonal`: diagonal decomposition and the product evaluation loop
//! - `session`: the evaluator's per-session auxiliary key store
//! - `client` / `evaluator`: the two ends of the HTTP protocol
//! - `scheme`: the batched BFV backend everything is built on

pub mod client;
pub mod codec;
pub mod diagonal;
pub mod error;
pub mod evaluator;
pub mod layout;
pub mod math;
pub mod matrix;
pub mod params;
pub mod scheme;
pub mod session;
pub mod wire;

pub use client::MatrixClient;
pub use codec::MatrixCodec;
pub use error::{Error, Result};
pub use evaluator::{router, EvaluatorState};
pub use layout::{next_power_of_two, SlotLayout};
pub use matrix::Matrix;
pub use params::BfvParams;
pub use scheme::{
    BatchEncoder, Ciphertext, Decryptor, Encryptor, Evaluator, KeyGenerator, Plaintext, RelinKey,
    RotationKeys, SchemeContext, SecretKey,
};
pub use session::{DeleteOutcome, KeyKind, MemoryKeyStore, SessionKeyStore, UploadOutcome};
