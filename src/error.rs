use thiserror::Error;

use crate::models::AttributeKind;

/// Errors produced while joining, aggregating and regressing country data.
#[derive(Error, Debug)]
pub enum Error {
    /// An external attribute could not be resolved for a country.
    #[error("lookup of {kind} for '{country}' failed: {reason}")]
    LookupFailure {
        country: String,
        kind: AttributeKind,
        reason: String,
    },

    #[error("design matrix is singular, regression is undefined")]
    SingularMatrix,

    #[error("sample ({x}, {y}) is not finite")]
    NonFiniteSample { x: f64, y: f64 },

    #[error("invalid bucket domain [{lo}, {hi}) with width {width}")]
    InvalidBucketDomain { lo: i64, hi: i64, width: i64 },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("chart rendering failed: {0}")]
    Chart(String),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Toml(#[from] toml::de::Error),
}

impl Error {
    pub(crate) fn lookup(country: &str, kind: AttributeKind, reason: impl Into<String>) -> Self {
        Error::LookupFailure {
            country: country.to_string(),
            kind,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
