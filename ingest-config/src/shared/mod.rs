mod base;
mod batch;
mod credentials;
mod ingest;
mod jobs;
mod ledger;
mod source;
mod stager;

pub use base::*;
pub use batch::*;
pub use credentials::*;
pub use ingest::*;
pub use jobs::*;
pub use ledger::*;
pub use source::*;
pub use stager::*;
