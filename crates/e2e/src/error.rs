//! Error types for the contract-test harness

use thiserror::Error;

use crate::assertion::AssertionFailure;

#[derive(Error, Debug)]
pub enum E2eError {
    #[error("Fixture not found: {0}")]
    FixtureNotFound(String),

    #[error("Unmocked request: {method} {url} matched no mock rule")]
    UnmockedRequest { method: String, url: String },

    #[error("Assertion failed: {0}")]
    AssertionFailed(AssertionFailure),

    #[error("Timeout waiting for: {0}")]
    Timeout(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Suite parse error: {0}")]
    SpecParse(String),

    #[error("Invalid URL pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl From<AssertionFailure> for E2eError {
    fn from(failure: AssertionFailure) -> Self {
        E2eError::AssertionFailed(failure)
    }
}

pub type E2eResult<T> = Result<T, E2eError>;
