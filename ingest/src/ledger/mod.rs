mod base;
pub mod memory;
pub mod warehouse;

pub use base::*;
