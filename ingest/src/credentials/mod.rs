mod base;
pub mod memory;
#[cfg(feature = "aws")]
pub mod ssm;

pub use base::*;
