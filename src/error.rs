use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The address list could not be obtained at all. Fatal for the batch.
    #[error("Address source error: {0}")]
    Source(String),

    /// A single address could not be fetched or its body could not be read.
    #[error("Fetch failed for {address}: {reason}")]
    Fetch { address: String, reason: String },

    #[error("Config error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn fetch(address: impl Into<String>, reason: impl ToString) -> Self {
        Error::Fetch {
            address: address.into(),
            reason: reason.to_string(),
        }
    }
}
