use std::error;
use std::fmt;

/// Result type for ingestion operations.
pub type IngestResult<T> = Result<T, IngestError>;

/// Main error type for ingestion operations.
///
/// An [`IngestError`] is either a single error made of an [`ErrorKind`], a static
/// description and an optional dynamic detail, or an aggregate of many errors.
/// The kind drives how the table run orchestrator classifies a failure; the
/// rendered text ends up in the run ledger.
#[derive(Debug, Clone)]
pub struct IngestError {
    repr: ErrorRepr,
}

#[derive(Debug, Clone)]
enum ErrorRepr {
    WithDescription(ErrorKind, &'static str),
    WithDescriptionAndDetail(ErrorKind, &'static str, String),
    Many(Vec<IngestError>),
}

/// Categories of errors raised while ingesting a table.
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
#[non_exhaustive]
pub enum ErrorKind {
    // Configuration errors, fatal to one table only.
    ConfigError,
    MissingCredentials,

    // Source errors.
    AuthenticationError,
    SourceFetchFailed,

    // Staging errors.
    StageUploadFailed,
    StageArchiveFailed,
    StageDeleteFailed,

    // Target errors.
    DestinationConnectionFailed,
    DestinationQueryFailed,
    TruncateFailed,
    MergeFailed,
    SoftDeleteFailed,

    // Ledger errors, logged and never raised past the orchestrator.
    LedgerWriteFailed,

    // IO & serialization errors.
    IoError,
    SerializationError,
    DeserializationError,
    InvalidData,

    // Task errors.
    TableTaskPanic,

    Unknown,
}

impl IngestError {
    /// Creates an [`IngestError`] aggregating multiple errors.
    pub fn many(errors: Vec<IngestError>) -> IngestError {
        IngestError {
            repr: ErrorRepr::Many(errors),
        }
    }

    /// Returns the [`ErrorKind`] of this error.
    ///
    /// For aggregated errors this is the kind of the first error, or
    /// [`ErrorKind::Unknown`] when the list is empty.
    pub fn kind(&self) -> ErrorKind {
        match self.repr {
            ErrorRepr::WithDescription(kind, _)
            | ErrorRepr::WithDescriptionAndDetail(kind, _, _) => kind,
            ErrorRepr::Many(ref errors) => errors
                .first()
                .map(|err| err.kind())
                .unwrap_or(ErrorKind::Unknown),
        }
    }

    /// Returns every [`ErrorKind`] contained in this error, flattened.
    pub fn kinds(&self) -> Vec<ErrorKind> {
        match self.repr {
            ErrorRepr::WithDescription(kind, _)
            | ErrorRepr::WithDescriptionAndDetail(kind, _, _) => vec![kind],
            ErrorRepr::Many(ref errors) => errors
                .iter()
                .flat_map(|err| err.kinds())
                .collect::<Vec<_>>(),
        }
    }

    /// Returns the dynamic detail of this error, or of the first aggregated error
    /// that has one.
    pub fn detail(&self) -> Option<&str> {
        match self.repr {
            ErrorRepr::WithDescriptionAndDetail(_, _, ref detail) => Some(detail.as_str()),
            ErrorRepr::Many(ref errors) => errors.iter().find_map(|e| e.detail()),
            _ => None,
        }
    }
}

impl PartialEq for IngestError {
    fn eq(&self, other: &IngestError) -> bool {
        match (&self.repr, &other.repr) {
            (ErrorRepr::WithDescription(kind_a, _), ErrorRepr::WithDescription(kind_b, _)) => {
                kind_a == kind_b
            }
            (
                ErrorRepr::WithDescriptionAndDetail(kind_a, _, _),
                ErrorRepr::WithDescriptionAndDetail(kind_b, _, _),
            ) => kind_a == kind_b,
            (ErrorRepr::Many(errors_a), ErrorRepr::Many(errors_b)) => {
                errors_a.len() == errors_b.len()
                    && errors_a.iter().zip(errors_b.iter()).all(|(a, b)| a == b)
            }
            _ => false,
        }
    }
}

impl fmt::Display for IngestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        match self.repr {
            ErrorRepr::WithDescription(kind, desc) => {
                fmt::Debug::fmt(&kind, f)?;
                f.write_str(": ")?;
                desc.fmt(f)
            }
            ErrorRepr::WithDescriptionAndDetail(kind, desc, ref detail) => {
                fmt::Debug::fmt(&kind, f)?;
                f.write_str(": ")?;
                desc.fmt(f)?;
                f.write_str(" -> ")?;
                detail.fmt(f)
            }
            ErrorRepr::Many(ref errors) => {
                if errors.is_empty() {
                    write!(f, "Multiple errors occurred (empty)")
                } else if errors.len() == 1 {
                    errors[0].fmt(f)
                } else {
                    write!(f, "Multiple errors occurred ({} total):", errors.len())?;
                    for (i, error) in errors.iter().enumerate() {
                        write!(f, "\n  {}: {}", i + 1, error)?;
                    }
                    Ok(())
                }
            }
        }
    }
}

impl error::Error for IngestError {}

impl From<(ErrorKind, &'static str)> for IngestError {
    fn from((kind, desc): (ErrorKind, &'static str)) -> IngestError {
        IngestError {
            repr: ErrorRepr::WithDescription(kind, desc),
        }
    }
}

impl From<(ErrorKind, &'static str, String)> for IngestError {
    fn from((kind, desc, detail): (ErrorKind, &'static str, String)) -> IngestError {
        IngestError {
            repr: ErrorRepr::WithDescriptionAndDetail(kind, desc, detail),
        }
    }
}

impl<E> From<Vec<E>> for IngestError
where
    E: Into<IngestError>,
{
    fn from(errors: Vec<E>) -> IngestError {
        IngestError {
            repr: ErrorRepr::Many(errors.into_iter().map(Into::into).collect()),
        }
    }
}

/// Converts [`std::io::Error`] with [`ErrorKind::IoError`].
impl From<std::io::Error> for IngestError {
    fn from(err: std::io::Error) -> IngestError {
        IngestError {
            repr: ErrorRepr::WithDescriptionAndDetail(
                ErrorKind::IoError,
                "I/O error occurred",
                err.to_string(),
            ),
        }
    }
}

/// Converts [`serde_json::Error`], splitting I/O failures from malformed input.
impl From<serde_json::Error> for IngestError {
    fn from(err: serde_json::Error) -> IngestError {
        let (kind, description) = match err.classify() {
            serde_json::error::Category::Io => (ErrorKind::IoError, "JSON I/O operation failed"),
            serde_json::error::Category::Syntax
            | serde_json::error::Category::Data
            | serde_json::error::Category::Eof => (
                ErrorKind::DeserializationError,
                "JSON deserialization failed",
            ),
        };

        IngestError {
            repr: ErrorRepr::WithDescriptionAndDetail(kind, description, err.to_string()),
        }
    }
}

/// Converts [`csv::Error`] raised while writing page files.
impl From<csv::Error> for IngestError {
    fn from(err: csv::Error) -> IngestError {
        let kind = if err.is_io_error() {
            ErrorKind::IoError
        } else {
            ErrorKind::SerializationError
        };

        IngestError {
            repr: ErrorRepr::WithDescriptionAndDetail(
                kind,
                "Failed to write delimited page file",
                err.to_string(),
            ),
        }
    }
}

/// Converts [`reqwest::Error`] raised by REST sources.
#[cfg(feature = "rest")]
impl From<reqwest::Error> for IngestError {
    fn from(err: reqwest::Error) -> IngestError {
        let (kind, description) = match err.status() {
            Some(status) if status.as_u16() == 401 || status.as_u16() == 403 => (
                ErrorKind::AuthenticationError,
                "Source API rejected the credentials",
            ),
            _ if err.is_decode() => (
                ErrorKind::DeserializationError,
                "Source API returned an undecodable body",
            ),
            _ => (ErrorKind::SourceFetchFailed, "Source API request failed"),
        };

        IngestError {
            repr: ErrorRepr::WithDescriptionAndDetail(kind, description, err.to_string()),
        }
    }
}

/// Converts [`tokio_postgres::Error`] raised by the warehouse client.
#[cfg(feature = "postgres")]
impl From<tokio_postgres::Error> for IngestError {
    fn from(err: tokio_postgres::Error) -> IngestError {
        let (kind, description) = if err.is_closed() {
            (
                ErrorKind::DestinationConnectionFailed,
                "Warehouse connection is closed",
            )
        } else if err.code().is_some() {
            (ErrorKind::DestinationQueryFailed, "Warehouse query failed")
        } else {
            (
                ErrorKind::DestinationConnectionFailed,
                "Warehouse connection error",
            )
        };

        IngestError {
            repr: ErrorRepr::WithDescriptionAndDetail(kind, description, err.to_string()),
        }
    }
}
