//! Request interception with canned responses
//!
//! Rules are matched newest-first, so a rule registered later shadows any
//! earlier rule for the same method and URL. When mocking is active every
//! outbound request must hit a rule; anything else is an `UnmockedRequest`.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{E2eError, E2eResult};
use crate::http::{HttpMethod, HttpRequest, Response};

/// How a rule's URL is compared against a request URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UrlPattern {
    /// Byte-for-byte equality
    Exact(String),
    /// `**` spans anything, `*` stays within one path segment, `?` is one character
    Glob(String),
    /// Unanchored regular expression
    Regex(String),
}

impl UrlPattern {
    pub fn exact(url: impl Into<String>) -> Self {
        UrlPattern::Exact(url.into())
    }

    pub fn glob(pattern: impl Into<String>) -> Self {
        UrlPattern::Glob(pattern.into())
    }

    pub fn regex(pattern: impl Into<String>) -> Self {
        UrlPattern::Regex(pattern.into())
    }

    pub fn as_str(&self) -> &str {
        match self {
            UrlPattern::Exact(s) | UrlPattern::Glob(s) | UrlPattern::Regex(s) => s,
        }
    }

    fn compile(&self) -> E2eResult<CompiledPattern> {
        let invalid = |e: regex::Error| E2eError::InvalidPattern {
            pattern: self.as_str().to_string(),
            reason: e.to_string(),
        };

        match self {
            UrlPattern::Exact(url) => Ok(CompiledPattern::Exact(url.clone())),
            UrlPattern::Glob(glob) => Regex::new(&glob_to_regex(glob))
                .map(CompiledPattern::Regex)
                .map_err(invalid),
            UrlPattern::Regex(re) => Regex::new(re).map(CompiledPattern::Regex).map_err(invalid),
        }
    }
}

impl fmt::Display for UrlPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UrlPattern::Exact(s) => write!(f, "{}", s),
            UrlPattern::Glob(s) => write!(f, "glob:{}", s),
            UrlPattern::Regex(s) => write!(f, "regex:{}", s),
        }
    }
}

fn glob_to_regex(glob: &str) -> String {
    let mut out = String::with_capacity(glob.len() * 2 + 2);
    out.push('^');
    let mut chars = glob.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' if chars.peek() == Some(&'*') => {
                chars.next();
                out.push_str(".*");
            }
            '*' => out.push_str("[^/]*"),
            '?' => out.push('.'),
            other => out.push_str(&regex::escape(&other.to_string())),
        }
    }
    out.push('$');
    out
}

#[derive(Debug, Clone)]
enum CompiledPattern {
    Exact(String),
    Regex(Regex),
}

impl CompiledPattern {
    fn is_match(&self, url: &str) -> bool {
        match self {
            CompiledPattern::Exact(expected) => expected == url,
            CompiledPattern::Regex(re) => re.is_match(url),
        }
    }
}

/// A declarative interception rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MockRule {
    /// Name to look the rule up by, e.g. `mockFreteErro`
    #[serde(default)]
    pub alias: Option<String>,

    #[serde(default)]
    pub method: HttpMethod,

    pub url: UrlPattern,

    #[serde(default = "default_status")]
    pub status: u16,

    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    #[serde(default)]
    pub body: Value,
}

fn default_status() -> u16 {
    200
}

impl MockRule {
    pub fn new(method: HttpMethod, url: UrlPattern) -> Self {
        Self {
            alias: None,
            method,
            url,
            status: default_status(),
            headers: BTreeMap::new(),
            body: Value::Null,
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into().to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = body;
        self
    }

    fn respond(&self) -> Response {
        let mut headers: BTreeMap<String, String> = self
            .headers
            .iter()
            .map(|(k, v)| (k.to_ascii_lowercase(), v.clone()))
            .collect();
        headers
            .entry("content-type".to_string())
            .or_insert_with(|| "application/json".to_string());
        Response {
            status: self.status,
            headers,
            body: self.body.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RuleId(pub usize);

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rule-{}", self.0)
    }
}

/// One intercepted request, as recorded in the interception log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interception {
    pub rule: RuleId,
    pub alias: Option<String>,
    pub method: HttpMethod,
    pub url: String,
    pub status: u16,
}

struct InstalledRule {
    id: RuleId,
    rule: MockRule,
    pattern: CompiledPattern,
}

/// Holds the rules of the active scope and answers intercepted requests
#[derive(Default)]
pub struct MockResponder {
    rules: Vec<InstalledRule>,
    log: Vec<Interception>,
    hits: HashMap<String, usize>,
    next_id: usize,
}

impl MockResponder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a rule for the rest of the scope. Re-registering an
    /// identical rule returns the existing id and changes nothing.
    pub fn register(&mut self, rule: MockRule) -> E2eResult<RuleId> {
        if let Some(existing) = self.rules.iter().find(|r| r.rule == rule) {
            debug!("Mock rule {} already registered for {} {}", existing.id, rule.method, rule.url);
            return Ok(existing.id);
        }

        let pattern = rule.url.compile()?;
        let id = RuleId(self.next_id);
        self.next_id += 1;

        debug!(
            rule = %id,
            alias = rule.alias.as_deref().unwrap_or("-"),
            "Registered mock {} {} -> {}",
            rule.method,
            rule.url,
            rule.status
        );

        self.rules.push(InstalledRule { id, rule, pattern });
        Ok(id)
    }

    /// Drop every rule and the interception log
    pub fn clear(&mut self) {
        if !self.rules.is_empty() {
            debug!("Clearing {} mock rule(s)", self.rules.len());
        }
        self.rules.clear();
        self.log.clear();
        self.hits.clear();
    }

    /// Drop rules registered after the first `len`, keeping the log
    pub fn truncate(&mut self, len: usize) {
        if self.rules.len() > len {
            debug!("Removing {} scoped mock rule(s)", self.rules.len() - len);
            self.rules.truncate(len);
        }
    }

    /// Answer a request from the newest matching rule
    pub fn intercept(&mut self, request: &HttpRequest) -> E2eResult<Response> {
        let matched = self
            .rules
            .iter()
            .rposition(|r| r.rule.method == request.method && r.pattern.is_match(&request.url));

        match matched {
            Some(index) => Ok(self.answer(index, request)),
            None => Err(unmocked(request)),
        }
    }

    /// Answer a request from one specific rule, which must still match it
    pub fn intercept_with(&mut self, id: RuleId, request: &HttpRequest) -> E2eResult<Response> {
        let matched = self.rules.iter().position(|r| {
            r.id == id && r.rule.method == request.method && r.pattern.is_match(&request.url)
        });

        match matched {
            Some(index) => Ok(self.answer(index, request)),
            None => Err(unmocked(request)),
        }
    }

    fn answer(&mut self, index: usize, request: &HttpRequest) -> Response {
        let installed = &self.rules[index];
        let response = installed.rule.respond();
        let alias = installed.rule.alias.clone();
        let id = installed.id;

        debug!(
            rule = %id,
            alias = alias.as_deref().unwrap_or("-"),
            "Intercepted {} {} -> {}",
            request.method,
            request.url,
            response.status
        );

        if let Some(alias) = &alias {
            *self.hits.entry(alias.clone()).or_insert(0) += 1;
        }
        self.log.push(Interception {
            rule: id,
            alias,
            method: request.method,
            url: request.url.clone(),
            status: response.status,
        });

        response
    }

    /// Requests intercepted since the last `clear`, oldest first
    pub fn intercepts(&self) -> &[Interception] {
        &self.log
    }

    /// How often the rule with this alias answered a request
    pub fn hits(&self, alias: &str) -> usize {
        self.hits.get(alias).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

fn unmocked(request: &HttpRequest) -> E2eError {
    warn!("No mock rule for {} {}", request.method, request.url);
    E2eError::UnmockedRequest {
        method: request.method.to_string(),
        url: request.url.clone(),
    }
}
