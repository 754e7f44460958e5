mod base;
#[cfg(feature = "rest")]
pub mod rest;

pub use base::*;
