use thiserror::Error;

use crate::state::data::SelfieId;

/// Errors raised by the catalog, configuration and command layers.
///
/// The rotation engine itself never returns these: data anomalies coming
/// through the change feed are absorbed there, not propagated.
#[derive(Debug, Error)]
pub enum Error {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("malformed display config JSON: {0}")]
    ConfigJson(#[from] serde_json::Error),

    #[error("invalid display config: {0}")]
    InvalidConfig(String),

    #[error("event not found: {0}")]
    EventNotFound(String),

    #[error("event slug already in use: {0}")]
    DuplicateSlug(String),

    #[error("selfie {0} not found")]
    SelfieNotFound(SelfieId),

    #[error("image already added to this event: {0}")]
    DuplicateImage(String),

    #[error("not a readable image: {0}")]
    Image(#[from] image::ImageError),

    #[error("unknown selfie status: {0}")]
    InvalidStatus(String),

    #[error("could not determine a data directory for the catalog")]
    NoDataDir,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
