//! Client configuration
//!
//! Defaults suit a local backend. A JSON file may override any subset of
//! fields, and a few environment variables override the file. Credentials
//! never live here; see [`crate::session`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use registration_validation::{EntityKind, DEFAULT_MAX_DOCUMENT_BYTES};
use serde::{Deserialize, Serialize};

pub const BASE_URL_ENV_VAR: &str = "REGISTRATION_BASE_URL";
pub const TIMEOUT_ENV_VAR: &str = "REGISTRATION_TIMEOUT_SECS";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Backend paths. `{kind}` expands to `patients`/`donors`, `{id}` to the entity id.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EndpointConfig {
    pub create_patient: String,
    pub create_donor: String,
    pub upload_document: String,
    /// Multipart field name carrying the document
    pub upload_field: String,
    pub anchor: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            create_patient: "/api/hospital/patients".to_string(),
            create_donor: "/api/hospital/donors".to_string(),
            upload_document: "/api/hospital/{kind}/{id}/signature".to_string(),
            upload_field: "signature".to_string(),
            anchor: "/api/hospital/{kind}/{id}/blockchain".to_string(),
        }
    }
}

impl EndpointConfig {
    pub fn create_path(&self, kind: EntityKind) -> &str {
        match kind {
            EntityKind::Patient => &self.create_patient,
            EntityKind::Donor => &self.create_donor,
        }
    }

    pub fn upload_path(&self, kind: EntityKind, entity_id: &str) -> String {
        expand(&self.upload_document, kind, entity_id)
    }

    pub fn anchor_path(&self, kind: EntityKind, entity_id: &str) -> String {
        expand(&self.anchor, kind, entity_id)
    }
}

fn expand(template: &str, kind: EntityKind, entity_id: &str) -> String {
    template
        .replace("{kind}", kind.path_segment())
        .replace("{id}", entity_id)
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ClientConfig {
    pub base_url: String,
    pub request_timeout_secs: u64,
    pub max_document_bytes: usize,
    pub endpoints: EndpointConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            request_timeout_secs: 30,
            max_document_bytes: DEFAULT_MAX_DOCUMENT_BYTES,
            endpoints: EndpointConfig::default(),
        }
    }
}

impl ClientConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: ClientConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from an optional file, then apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
                serde_json::from_str(&json)?
            }
            None => ClientConfig::default(),
        };
        config.apply_overrides(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a variable lookup (the process environment in [`Self::load`])
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(BASE_URL_ENV_VAR) {
            self.base_url = url;
        }
        if let Some(raw) = lookup(TIMEOUT_ENV_VAR) {
            self.request_timeout_secs = raw.trim().parse().map_err(|_| {
                ConfigError::Invalid(format!(
                    "{} must be a whole number of seconds, got '{}'",
                    TIMEOUT_ENV_VAR, raw
                ))
            })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ConfigError::Invalid(format!(
                "base_url must start with http:// or https://, got '{}'",
                self.base_url
            )));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid("request_timeout_secs must be positive".to_string()));
        }
        if self.max_document_bytes == 0 {
            return Err(ConfigError::Invalid("max_document_bytes must be positive".to_string()));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Join a path onto the base url without doubling slashes
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path.trim_start_matches('/'))
    }
}
