mod base;
pub mod memory;
#[cfg(feature = "aws")]
pub mod s3;

pub use base::*;
