//! Modular arithmetic, transforms, and RNS polynomial support.

pub mod crt;
pub mod gaussian;
pub mod modular;
pub mod ntt;
pub mod poly;

pub use crt::CrtBasis;
pub use gaussian::GaussianSampler;
pub use modular::ModQ;
pub use ntt::NttTable;
pub use poly::RnsPoly;
