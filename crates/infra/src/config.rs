//! Queue configuration.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: String, value: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Job queue configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Name attached to every log line of this queue
    pub name: String,
    /// Collection holding active jobs
    pub job_collection: String,
    /// Append-only collection holding archived jobs
    pub history_collection: String,
    /// Suppress lifecycle log lines (store failures are still reported)
    pub silent: bool,
    /// Schedule repeat successors automatically with the same handler
    pub reschedule_repeats: bool,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            name: "jobq".to_string(),
            job_collection: "job".to_string(),
            history_collection: "job-history".to_string(),
            silent: false,
            reschedule_repeats: false,
        }
    }
}

impl QueueConfig {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_collections(
        mut self,
        job_collection: impl Into<String>,
        history_collection: impl Into<String>,
    ) -> Self {
        self.job_collection = job_collection.into();
        self.history_collection = history_collection.into();
        self
    }

    pub fn silent(mut self, silent: bool) -> Self {
        self.silent = silent;
        self
    }

    pub fn with_reschedule_repeats(mut self, enabled: bool) -> Self {
        self.reschedule_repeats = enabled;
        self
    }

    /// Load from `JOBQ_*` environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup (environment-style keys).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(name) = lookup("JOBQ_NAME") {
            config.name = name;
        }
        if let Some(collection) = lookup("JOBQ_JOB_COLLECTION") {
            config.job_collection = collection;
        }
        if let Some(collection) = lookup("JOBQ_HISTORY_COLLECTION") {
            config.history_collection = collection;
        }
        if let Some(value) = lookup("JOBQ_SILENT") {
            config.silent = parse_bool("JOBQ_SILENT", &value)?;
        }
        if let Some(value) = lookup("JOBQ_RESCHEDULE_REPEATS") {
            config.reschedule_repeats = parse_bool("JOBQ_RESCHEDULE_REPEATS", &value)?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::Invalid("queue name must not be empty".to_string()));
        }
        if self.job_collection.trim().is_empty() || self.history_collection.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "collection names must not be empty".to_string(),
            ));
        }
        if self.job_collection == self.history_collection {
            return Err(ConfigError::Invalid(format!(
                "job and history collections must differ (both '{}')",
                self.job_collection
            )));
        }
        Ok(())
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}
