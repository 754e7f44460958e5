//! Macros for ingestion error handling.
//!
//! Shorthands for building and returning [`crate::error::IngestError`] values.

/// Creates an [`crate::error::IngestError`] from an error kind and description,
/// optionally with a dynamic detail rendered through [`ToString`].
#[macro_export]
macro_rules! ingest_error {
    ($kind:expr, $desc:expr) => {
        $crate::error::IngestError::from(($kind, $desc))
    };
    ($kind:expr, $desc:expr, $detail:expr) => {
        $crate::error::IngestError::from(($kind, $desc, $detail.to_string()))
    };
}

/// Creates an [`crate::error::IngestError`] and returns it from the current function.
#[macro_export]
macro_rules! bail {
    ($kind:expr, $desc:expr) => {
        return Err($crate::ingest_error!($kind, $desc))
    };
    ($kind:expr, $desc:expr, $detail:expr) => {
        return Err($crate::ingest_error!($kind, $desc, $detail))
    };
}
