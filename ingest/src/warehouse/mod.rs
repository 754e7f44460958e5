mod base;
#[cfg(feature = "postgres")]
pub mod postgres;

pub use base::*;
