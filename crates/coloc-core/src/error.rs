//! Error types for the colocation core.

use thiserror::Error;

/// Errors that can propagate out of the colocation engine.
///
/// Per-candidate I/O failures never appear here: a candidate that cannot
/// be opened is dropped from the candidate set, not raised (see
/// [`crate::metadata::OpenOutcome`]).
#[derive(Error, Debug)]
pub enum ColocError {
    /// Exactly one of a second product or a mission name must be supplied.
    #[error(
        "Unrecognized option combination: exactly one of `product2` or \
         `mission` must be given, got {0}"
    )]
    UnknownOption(&'static str),

    #[error("Unknown mission: {0}")]
    UnknownMission(String),

    #[error("No metadata opener registered for mission: {0}")]
    UnknownProvider(String),

    #[error("Reference product is unreadable: {0}")]
    ReferenceUnreadable(String),

    #[error("Invalid catalog configuration: {0}")]
    InvalidCatalog(String),

    #[error("Invalid glob pattern: {0}")]
    InvalidPattern(#[from] glob::PatternError),

    #[error("Failed to parse footprint WKT: {0}")]
    WktParse(String),

    #[error("Footprint is unavailable for product: {0}")]
    MissingFootprint(String),

    #[error("Failed to read file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    ConfigParse(#[from] serde_yaml::Error),
}

/// Result type for colocation operations.
pub type Result<T> = std::result::Result<T, ColocError>;
