//! Scenario runner: fixture -> request -> response -> assertions

use std::path::PathBuf;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::assertion::{self, AssertionFailure};
use crate::config::RunnerConfig;
use crate::env::Environment;
use crate::error::{E2eError, E2eResult};
use crate::fixture::{Fixture, FixtureStore};
use crate::frete::{self, FreteRequest};
use crate::http::{HttpRequest, Response};
use crate::mock::{MockResponder, MockRule, UrlPattern};
use crate::spec::{Scenario, ScenarioGroup, Suite};
use crate::transport::{HttpTransport, Transport};

/// Lifecycle of one scenario. `Passed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioState {
    Pending,
    FixtureLoaded,
    ResponseReceived,
    Passed,
    Failed,
}

impl ScenarioState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ScenarioState::Passed | ScenarioState::Failed)
    }

    pub fn can_advance_to(&self, next: ScenarioState) -> bool {
        use ScenarioState::*;
        matches!(
            (self, next),
            (Pending, FixtureLoaded)
                | (FixtureLoaded, ResponseReceived)
                | (ResponseReceived, Passed)
                | (_, Failed)
        ) && !self.is_terminal()
    }

    fn advance(self, next: ScenarioState) -> ScenarioState {
        debug_assert!(
            self.can_advance_to(next),
            "illegal scenario transition {:?} -> {:?}",
            self,
            next
        );
        debug!("Scenario state {:?} -> {:?}", self, next);
        next
    }
}

/// Result of running a single scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub name: String,
    pub group: String,
    pub state: ScenarioState,
    pub duration_ms: u64,
    pub status: Option<u16>,
    pub failure: Option<AssertionFailure>,
    pub error: Option<String>,
}

impl ScenarioResult {
    pub fn success(&self) -> bool {
        self.state == ScenarioState::Passed
    }

    fn aborted(scenario: &Scenario, group: &str, err: &E2eError, duration_ms: u64) -> Self {
        Self {
            name: scenario.name.clone(),
            group: group.to_string(),
            state: ScenarioState::Failed,
            duration_ms,
            status: None,
            failure: match err {
                E2eError::AssertionFailed(failure) => Some(failure.clone()),
                _ => None,
            },
            error: Some(err.to_string()),
        }
    }
}

/// Result of running one suite
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteResult {
    pub suite: String,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub duration_ms: u64,
    pub results: Vec<ScenarioResult>,
}

/// Result of running every selected suite
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub mocked: bool,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub duration_ms: u64,
    pub suites: Vec<SuiteResult>,
}

impl RunResult {
    pub fn success(&self) -> bool {
        self.failed == 0
    }
}

/// Runs scenarios one at a time against the mock responder or a live transport
pub struct ScenarioRunner {
    config: RunnerConfig,
    environment: Environment,
    fixtures: FixtureStore,
    responder: MockResponder,
    transport: Box<dyn Transport>,
}

impl ScenarioRunner {
    pub fn new(
        config: RunnerConfig,
        environment: Environment,
        fixtures: FixtureStore,
        transport: Box<dyn Transport>,
    ) -> Self {
        Self {
            config,
            environment,
            fixtures,
            responder: MockResponder::new(),
            transport,
        }
    }

    /// Runner with an on-disk fixture store and the HTTP transport
    pub fn with_config(config: RunnerConfig, environment: Environment) -> E2eResult<Self> {
        let fixtures = FixtureStore::new(config.fixtures_dir.clone());
        let transport = HttpTransport::new(config.request_timeout())?;
        Ok(Self::new(config, environment, fixtures, Box::new(transport)))
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    pub fn fixtures(&self) -> &FixtureStore {
        &self.fixtures
    }

    pub fn responder(&self) -> &MockResponder {
        &self.responder
    }

    /// Install a rule in the current scope
    pub fn register_mock(&mut self, rule: MockRule) -> E2eResult<()> {
        let rule = self.resolve_rule(rule);
        self.responder.register(rule).map(|_| ())
    }

    /// End the current scope
    pub fn clear_mocks(&mut self) {
        self.responder.clear();
    }

    /// Run one scenario. Infrastructure errors are returned as-is; a failed
    /// assertion is a `Failed` result. The scenario's own mock rule is
    /// removed afterwards; rules installed with `register_mock` stay.
    pub async fn run_scenario(&mut self, scenario: &Scenario) -> E2eResult<ScenarioResult> {
        let mark = self.responder.len();
        let result = self.run_in_group(scenario, "").await;
        self.responder.truncate(mark);
        result
    }

    async fn run_in_group(&mut self, scenario: &Scenario, group: &str) -> E2eResult<ScenarioResult> {
        let start = Instant::now();
        debug!("Running scenario: {}", scenario.name);

        let state = ScenarioState::Pending;

        let fixture = self.load_input(scenario)?;
        let url = self.config.resolve_url(&scenario.request.url);
        if frete::is_calculo_detalhe(scenario.request.method, &url) {
            FreteRequest::from_fixture(&fixture)?;
        }
        let state = state.advance(ScenarioState::FixtureLoaded);

        let mut request =
            HttpRequest::new(scenario.request.method, url).with_body(fixture.to_value());
        for (key, value) in &scenario.request.headers {
            request = request.with_header(key.as_str(), value.as_str());
        }

        let response = self.dispatch(scenario, &request).await?;
        let state = state.advance(ScenarioState::ResponseReceived);

        let outcome = assertion::assert(&response, &scenario.expect);
        let state = state.advance(match outcome {
            Ok(()) => ScenarioState::Passed,
            Err(_) => ScenarioState::Failed,
        });

        let failure = outcome.err();
        Ok(ScenarioResult {
            name: scenario.name.clone(),
            group: group.to_string(),
            state,
            duration_ms: start.elapsed().as_millis() as u64,
            status: Some(response.status),
            error: failure.as_ref().map(|f| f.to_string()),
            failure,
        })
    }

    fn load_input(&self, scenario: &Scenario) -> E2eResult<Fixture> {
        match (&scenario.fixture, &scenario.body) {
            (Some(name), _) => self.fixtures.load(name),
            (None, Some(body)) => Ok(Fixture::new(scenario.name.clone(), body.clone())),
            (None, None) => Err(E2eError::SpecParse(format!(
                "scenario '{}' needs a fixture or a body",
                scenario.name
            ))),
        }
    }

    async fn dispatch(&mut self, scenario: &Scenario, request: &HttpRequest) -> E2eResult<Response> {
        if !self.environment.should_mock() {
            return self.transport.send(request).await;
        }

        match &scenario.mock {
            Some(reply) => {
                let id = self
                    .responder
                    .register(reply.to_rule(request.method, &request.url))?;
                self.responder.intercept_with(id, request)
            }
            None => self.responder.intercept(request),
        }
    }

    /// Run a group as one mock scope: its rules are installed first and
    /// every rule is cleared when the group ends.
    pub async fn run_group(&mut self, group: &ScenarioGroup) -> Vec<ScenarioResult> {
        let setup = if self.environment.should_mock() {
            group
                .mocks
                .iter()
                .try_for_each(|rule| self.register_mock(rule.clone()))
        } else {
            Ok(())
        };

        let mut results = Vec::with_capacity(group.scenarios.len());
        for scenario in &group.scenarios {
            let result = match &setup {
                Err(e) => ScenarioResult::aborted(scenario, &group.name, e, 0),
                Ok(()) => {
                    let start = Instant::now();
                    match self.run_in_group(scenario, &group.name).await {
                        Ok(result) => result,
                        Err(e) => ScenarioResult::aborted(
                            scenario,
                            &group.name,
                            &e,
                            start.elapsed().as_millis() as u64,
                        ),
                    }
                }
            };

            if result.success() {
                info!("✓ {} ({} ms)", result.name, result.duration_ms);
            } else {
                error!(
                    "✗ {} - {}",
                    result.name,
                    result.error.as_deref().unwrap_or("unknown error")
                );
            }
            results.push(result);
        }

        self.responder.clear();
        results
    }

    pub async fn run_suite(&mut self, suite: &Suite) -> SuiteResult {
        let start = Instant::now();
        info!("Suite: {} ({} scenario(s))", suite.name, suite.scenario_count());

        let mut results = Vec::new();
        for group in &suite.groups {
            debug!("Group: {}", group.name);
            results.extend(self.run_group(group).await);
        }

        let passed = results.iter().filter(|r| r.success()).count();
        SuiteResult {
            suite: suite.name.clone(),
            total: results.len(),
            passed,
            failed: results.len() - passed,
            duration_ms: start.elapsed().as_millis() as u64,
            results,
        }
    }

    pub async fn run_suites(&mut self, suites: &[Suite]) -> RunResult {
        let start = Instant::now();
        let mut summaries = Vec::with_capacity(suites.len());

        info!(
            "Running {} suite(s), requests {}",
            suites.len(),
            if self.environment.should_mock() { "mocked" } else { "live" }
        );

        for suite in suites {
            summaries.push(self.run_suite(suite).await);
        }

        let total = summaries.iter().map(|s| s.total).sum();
        let passed = summaries.iter().map(|s| s.passed).sum();
        let failed = summaries.iter().map(|s| s.failed).sum();
        let duration_ms = start.elapsed().as_millis() as u64;

        info!("");
        info!(
            "Test Results: {} passed, {} failed ({} ms)",
            passed, failed, duration_ms
        );

        RunResult {
            mocked: self.environment.should_mock(),
            total,
            passed,
            failed,
            duration_ms,
            suites: summaries,
        }
    }

    /// Run every suite in the specs directory
    pub async fn run_all(&mut self) -> E2eResult<RunResult> {
        let suites = Suite::load_all(&self.config.specs_dir)?;
        Ok(self.run_suites(&suites).await)
    }

    /// Run scenarios tagged `tag` at suite, group or scenario level
    pub async fn run_tagged(&mut self, tag: &str) -> E2eResult<RunResult> {
        let suites: Vec<Suite> = Suite::load_all(&self.config.specs_dir)?
            .iter()
            .filter_map(|s| s.filter_by_tag(tag))
            .collect();
        Ok(self.run_suites(&suites).await)
    }

    /// Run the scenario called `name`
    pub async fn run_named(&mut self, name: &str) -> E2eResult<RunResult> {
        let suites: Vec<Suite> = Suite::load_all(&self.config.specs_dir)?
            .iter()
            .filter_map(|s| s.filter_by_name(name))
            .collect();
        if suites.is_empty() {
            return Err(E2eError::SpecParse(format!("Scenario not found: {}", name)));
        }
        Ok(self.run_suites(&suites).await)
    }

    /// Write results to `<output_dir>/test-results.json`
    pub fn write_results(&self, results: &RunResult) -> E2eResult<PathBuf> {
        std::fs::create_dir_all(&self.config.output_dir)?;

        let path = self.config.output_dir.join("test-results.json");
        let json = serde_json::to_string_pretty(results)?;
        std::fs::write(&path, json)?;

        info!("Results written to: {}", path.display());
        Ok(path)
    }

    fn resolve_rule(&self, mut rule: MockRule) -> MockRule {
        if let UrlPattern::Exact(url) = &rule.url {
            rule.url = UrlPattern::Exact(self.config.resolve_url(url));
        }
        rule
    }
}
