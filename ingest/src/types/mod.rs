//! Data carried between the source, the local batch files and the ledger.

mod page;
mod run;
mod table_row;

pub use page::*;
pub use run::*;
pub use table_row::*;
