//! Frete E2E Contract Harness
//!
//! Fixture-driven contract tests for the frete calculation API
//! (`POST /frete/v3/calculo/detalhe`) that stay deterministic in CI:
//! - Loads named request payloads from JSON fixtures
//! - Intercepts outbound requests with canned responses when mocking
//! - Sends real requests over HTTP otherwise
//! - Checks status codes and response fields against a declared shape
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  Scenario Runner (Rust)                     │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Environment::detect(CI) -> mocked | live   (read once)     │
//! │  ScenarioRunner                                             │
//! │    ├── FixtureStore::load(name) -> Fixture                  │
//! │    ├── MockResponder::register/intercept/clear   (mocked)   │
//! │    ├── Transport::send(request) -> Response      (live)     │
//! │    └── assertion::assert(response, shape)                   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Suite (YAML)                                               │
//! │    └── groups: [ScenarioGroup]   (mock scope)               │
//! │          ├── mocks: [MockRule]                              │
//! │          └── scenarios: [Scenario]                          │
//! │                ├── fixture | body                           │
//! │                ├── request { method, url }                  │
//! │                ├── mock { status, body }                    │
//! │                └── expect { status, fields }                │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod assertion;
pub mod config;
pub mod env;
pub mod error;
pub mod fixture;
pub mod frete;
pub mod http;
pub mod mock;
pub mod runner;
pub mod spec;
pub mod transport;

pub use assertion::{AssertionFailure, Check, ExpectedShape, ValueKind};
pub use config::RunnerConfig;
pub use env::Environment;
pub use error::{E2eError, E2eResult};
pub use fixture::{Fixture, FixtureStore};
pub use http::{HttpMethod, HttpRequest, Response};
pub use mock::{MockResponder, MockRule, RuleId, UrlPattern};
pub use runner::{RunResult, ScenarioResult, ScenarioRunner, ScenarioState, SuiteResult};
pub use spec::{Scenario, ScenarioGroup, Suite};
pub use transport::{HttpTransport, Transport};
