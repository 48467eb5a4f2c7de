//! Runner configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::env::DEFAULT_CI_VAR;
use crate::error::{E2eError, E2eResult};

/// Homologation host of the frete platform
pub const DEFAULT_BASE_URL: &str = "http://frete-hub-plataforma-frete-hlg.casasbahia.com.br";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Directory scanned for `*.yaml` suites
    pub specs_dir: PathBuf,

    /// Directory holding `<name>.json` fixtures
    pub fixtures_dir: PathBuf,

    /// Where `test-results.json` is written
    pub output_dir: PathBuf,

    /// Prefix for scenario URLs that are paths rather than absolute URLs
    pub base_url: String,

    /// Deadline for a live request
    pub request_timeout_ms: u64,

    /// Variable that marks a CI run
    pub ci_env_var: String,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            specs_dir: PathBuf::from("specs"),
            fixtures_dir: PathBuf::from("fixtures"),
            output_dir: PathBuf::from("test-results"),
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout_ms: 30_000,
            ci_env_var: DEFAULT_CI_VAR.to_string(),
        }
    }
}

impl RunnerConfig {
    /// Load configuration from file, or defaults if it does not exist
    pub fn load(path: &Path) -> E2eResult<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Self::from_toml(&content)
        } else {
            Ok(Self::default())
        }
    }

    pub fn from_toml(content: &str) -> E2eResult<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Absolute URLs pass through; paths are joined onto `base_url`
    pub fn resolve_url(&self, url: &str) -> String {
        if url.starts_with("http://") || url.starts_with("https://") {
            return url.to_string();
        }
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            url.trim_start_matches('/')
        )
    }

    fn validate(&self) -> E2eResult<()> {
        if self.request_timeout_ms == 0 {
            return Err(E2eError::Config("request_timeout_ms must be positive".to_string()));
        }
        if self.ci_env_var.trim().is_empty() {
            return Err(E2eError::Config("ci_env_var is empty".to_string()));
        }
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(E2eError::Config(format!(
                "base_url must be an http(s) URL, got '{}'",
                self.base_url
            )));
        }
        Ok(())
    }
}
