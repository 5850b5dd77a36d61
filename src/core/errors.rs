//! HBM-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, MonError>;

/// Top-level error type for hbsdmon.
#[derive(Debug, Error)]
pub enum MonError {
    #[error("[HBM-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[HBM-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[HBM-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[HBM-2001] allocation failure in {context}")]
    Allocation { context: &'static str },

    #[error("[HBM-2002] key-value entry {id} is no longer in the store")]
    MissingEntry { id: u64 },

    #[error("[HBM-2101] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[HBM-2201] worker initialization failed for {host}: {details}")]
    WorkerInit { host: String, details: String },

    #[error("[HBM-2301] notification delivery failed: {details}")]
    Notify { details: String },

    #[error("[HBM-3002] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[HBM-3003] channel closed in component {component}")]
    ChannelClosed { component: &'static str },

    #[error("[HBM-3900] runtime failure: {details}")]
    Runtime { details: String },
}

impl MonError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "HBM-1001",
            Self::MissingConfig { .. } => "HBM-1002",
            Self::ConfigParse { .. } => "HBM-1003",
            Self::Allocation { .. } => "HBM-2001",
            Self::MissingEntry { .. } => "HBM-2002",
            Self::Serialization { .. } => "HBM-2101",
            Self::WorkerInit { .. } => "HBM-2201",
            Self::Notify { .. } => "HBM-2301",
            Self::Io { .. } => "HBM-3002",
            Self::ChannelClosed { .. } => "HBM-3003",
            Self::Runtime { .. } => "HBM-3900",
        }
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Convenience constructor for validation failures.
    #[must_use]
    pub fn invalid(details: impl Into<String>) -> Self {
        Self::InvalidConfig {
            details: details.into(),
        }
    }
}

impl From<serde_json::Error> for MonError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for MonError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}

impl From<reqwest::Error> for MonError {
    fn from(value: reqwest::Error) -> Self {
        Self::Notify {
            details: value.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_match_display_prefix() {
        let cases = [
            MonError::invalid("x"),
            MonError::MissingConfig {
                path: PathBuf::from("/nope"),
            },
            MonError::Allocation { context: "kv" },
            MonError::MissingEntry { id: 7 },
            MonError::ChannelClosed { component: "worker" },
        ];
        for err in cases {
            let rendered = err.to_string();
            assert!(
                rendered.starts_with(&format!("[{}]", err.code())),
                "{rendered} should carry {}",
                err.code()
            );
        }
    }

    #[test]
    fn toml_errors_map_to_config_parse() {
        let err: MonError = toml::from_str::<toml::Value>("= broken")
            .map_err(MonError::from)
            .expect_err("invalid toml");
        assert_eq!(err.code(), "HBM-1003");
    }
}
