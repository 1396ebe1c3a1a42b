//! Configuration management for the client.

use std::env;
use std::time::Duration;
use trellis_engine::{FieldType, ModelField, ModelSchema, DEFAULT_PAGE_SIZE};

/// Client configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// GraphQL endpoint URL
    pub endpoint: String,
    /// Elements requested per page
    pub page_size: usize,
    /// Per-request timeout
    pub timeout: Duration,
    /// Pages to follow before stopping
    pub max_pages: usize,
    /// Model to list
    pub model: ModelConfig,
}

/// Which model the binary lists, and how.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelConfig {
    pub name: String,
    pub plural_name: String,
    /// Scalar fields to select
    pub fields: Vec<String>,
    /// `belongs_to` field linking to the owner, when listing an association
    pub owner_field: Option<String>,
    pub owner_id: Option<String>,
}

impl ModelConfig {
    /// Build the schema the list queries against.
    pub fn schema(&self) -> ModelSchema {
        let mut fields: Vec<ModelField> = self
            .fields
            .iter()
            .map(|name| match name.as_str() {
                "id" => ModelField::id(),
                other => ModelField::optional(other, FieldType::Json),
            })
            .collect();

        if let Some(owner_field) = &self.owner_field {
            fields.push(ModelField::belongs_to(owner_field.as_str(), "Owner", None));
        }

        ModelSchema::new(self.name.as_str(), fields).with_plural_name(self.plural_name.as_str())
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let endpoint = lookup("TRELLIS_ENDPOINT").ok_or(ConfigError::MissingEndpoint)?;

        let page_size = match lookup("TRELLIS_PAGE_SIZE") {
            Some(value) => value
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or(ConfigError::InvalidPageSize)?,
            None => DEFAULT_PAGE_SIZE,
        };

        let timeout_secs = lookup("TRELLIS_TIMEOUT_SECS")
            .unwrap_or_else(|| "30".to_string())
            .parse::<u64>()
            .map_err(|_| ConfigError::InvalidTimeout)?;

        let max_pages = lookup("TRELLIS_MAX_PAGES")
            .unwrap_or_else(|| "1".to_string())
            .parse::<usize>()
            .ok()
            .filter(|n| *n > 0)
            .ok_or(ConfigError::InvalidMaxPages)?;

        let name = lookup("TRELLIS_MODEL").ok_or(ConfigError::MissingModel)?;
        let plural_name = lookup("TRELLIS_PLURAL").unwrap_or_else(|| format!("{}s", name));
        let fields = lookup("TRELLIS_FIELDS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|f| !f.is_empty())
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .filter(|fields| !fields.is_empty())
            .unwrap_or_else(|| vec!["id".to_string()]);

        let owner_field = lookup("TRELLIS_OWNER_FIELD");
        let owner_id = lookup("TRELLIS_OWNER_ID");
        if owner_field.is_some() != owner_id.is_some() {
            return Err(ConfigError::IncompleteOwner);
        }

        Ok(Self {
            endpoint,
            page_size,
            timeout: Duration::from_secs(timeout_secs),
            max_pages,
            model: ModelConfig {
                name,
                plural_name,
                fields,
                owner_field,
                owner_id,
            },
        })
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("TRELLIS_ENDPOINT environment variable is required")]
    MissingEndpoint,

    #[error("TRELLIS_MODEL environment variable is required")]
    MissingModel,

    #[error("Invalid TRELLIS_PAGE_SIZE value")]
    InvalidPageSize,

    #[error("Invalid TRELLIS_TIMEOUT_SECS value")]
    InvalidTimeout,

    #[error("Invalid TRELLIS_MAX_PAGES value")]
    InvalidMaxPages,

    #[error("TRELLIS_OWNER_FIELD and TRELLIS_OWNER_ID must be set together")]
    IncompleteOwner,
}
