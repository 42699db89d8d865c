use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("source unavailable: {url}: {reason}")]
    SourceUnavailable { url: String, reason: String },

    #[error("authentication failed for {url}: {reason}")]
    AuthenticationFailed { url: String, reason: String },

    #[error("destination unwritable: {path}: {reason}")]
    DestinationUnwritable { path: String, reason: String },

    #[error("decode error in {context}: {msg}")]
    Decode { context: String, msg: String },

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("source context is closed")]
    Closed,

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("csv: {0}")]
    Csv(#[from] csv::Error),

    #[cfg(feature = "parquet")]
    #[error("parquet: {0}")]
    Parquet(String),

    #[error(transparent)]
    Core(#[from] hepflow_core::Error),
}

impl Error {
    /// Map an `open` failure on a local path to the source error taxonomy.
    pub(crate) fn from_open(url: &str, e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::PermissionDenied => Error::AuthenticationFailed {
                url: url.to_string(),
                reason: e.to_string(),
            },
            _ => Error::SourceUnavailable {
                url: url.to_string(),
                reason: e.to_string(),
            },
        }
    }

    pub(crate) fn unwritable(path: &std::path::Path, reason: impl std::fmt::Display) -> Self {
        Error::DestinationUnwritable {
            path: path.display().to_string(),
            reason: reason.to_string(),
        }
    }
}
