use serde::{Deserialize, Serialize};
use std::time::Duration;
use validator::{Validate, ValidationError};

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_address_source", skip_on_field_errors = false))]
pub struct FetchConfig {
    #[serde(default)]
    #[validate(length(min = 1))]
    pub name: String,

    /// Lister endpoint returning one address per line.
    #[serde(default)]
    #[validate(url)]
    pub list_url: Option<String>,

    /// Inline addresses, used instead of `list_url`.
    #[serde(default)]
    pub addresses: Vec<String>,

    /// Global deadline; 6000ms when unset.
    #[serde(default)]
    #[validate(range(min = 1))]
    pub deadline_ms: Option<u64>,

    #[serde(default)]
    pub request_timeout_ms: Option<u64>,

    #[serde(default)]
    pub user_agent: Option<String>,

    #[serde(default)]
    pub output: Option<OutputConfig>,

    /// Optional path to a parent configuration file to inherit from
    #[serde(default)]
    pub extends: Option<String>,
}

impl FetchConfig {
    pub fn deadline(&self) -> Duration {
        Duration::from_millis(self.deadline_ms.unwrap_or(DEFAULT_DEADLINE_MS))
    }

    pub fn user_agent(&self) -> &str {
        self.user_agent.as_deref().unwrap_or(DEFAULT_USER_AGENT)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OutputConfig {
    Console,
    Discard,
    File {
        path: String,
    },
    Jsonl {
        path: String,
    },
    Csv {
        path: String,
    },
}

fn validate_address_source(config: &FetchConfig) -> Result<(), ValidationError> {
    match (&config.list_url, config.addresses.is_empty()) {
        (Some(_), true) | (None, false) => Ok(()),
        (Some(_), false) => Err(ValidationError::new("list_url_and_addresses")),
        (None, true) => Err(ValidationError::new("missing_address_source")),
    }
}

pub const DEFAULT_DEADLINE_MS: u64 = 6000;

pub const DEFAULT_USER_AGENT: &str = "fanout/0.1";
