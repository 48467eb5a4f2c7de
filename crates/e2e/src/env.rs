//! Decides once per process whether requests are mocked

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Conventional CI marker
pub const DEFAULT_CI_VAR: &str = "CI";

/// Forces mocking on or off regardless of the CI marker
pub const MOCK_OVERRIDE_VAR: &str = "FRETE_E2E_MOCK";

static DETECTED: OnceCell<Environment> = OnceCell::new();

/// Immutable run mode handed to the scenario runner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    mock: bool,
}

impl Environment {
    pub fn mocked() -> Self {
        Self { mock: true }
    }

    pub fn live() -> Self {
        Self { mock: false }
    }

    pub fn should_mock(&self) -> bool {
        self.mock
    }

    /// Read the environment on first call; later calls return the same
    /// answer even if the variables have changed since.
    pub fn detect(ci_var: &str) -> Self {
        *DETECTED.get_or_init(|| Self::read(ci_var))
    }

    /// Snapshot both variables and derive the mode from that snapshot
    fn read(ci_var: &str) -> Self {
        let mock_override = std::env::var(MOCK_OVERRIDE_VAR).ok();
        let ci = std::env::var(ci_var).ok();
        let env = Self::from_vars(mock_override.as_deref(), ci.as_deref());
        info!(
            "Request mode: {} ({}={:?}, {}={:?})",
            if env.mock { "mocked" } else { "live" },
            ci_var,
            ci,
            MOCK_OVERRIDE_VAR,
            mock_override
        );
        env
    }

    fn from_vars(mock_override: Option<&str>, ci: Option<&str>) -> Self {
        let mock = match mock_override.map(str::trim).filter(|v| !v.is_empty()) {
            Some(value) => is_truthy(value),
            None => ci.map(is_truthy).unwrap_or(false),
        };
        Self { mock }
    }
}

/// `1`, `true`, `yes` and `on` in any case
pub fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
