//! Declarative YAML scenario suites

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::assertion::ExpectedShape;
use crate::error::{E2eError, E2eResult};
use crate::http::HttpMethod;
use crate::mock::{MockRule, UrlPattern};

/// One YAML file: a named suite of scenario groups
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Suite {
    /// Unique name for this suite
    pub name: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Tags for filtering, inherited by every scenario
    #[serde(default)]
    pub tags: Vec<String>,

    pub groups: Vec<ScenarioGroup>,
}

/// Scope for mock rules: rules registered here are cleared when the group ends
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioGroup {
    pub name: String,

    #[serde(default)]
    pub tags: Vec<String>,

    /// Rules installed before the first scenario of the group runs
    #[serde(default)]
    pub mocks: Vec<MockRule>,

    pub scenarios: Vec<Scenario>,
}

/// A single test case
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub tags: Vec<String>,

    /// Name of the request fixture
    #[serde(default)]
    pub fixture: Option<String>,

    /// Inline request payload, used instead of a fixture
    #[serde(default)]
    pub body: Option<Value>,

    #[serde(default)]
    pub request: RequestSpec,

    /// Canned answer for this scenario's request when mocking
    #[serde(default)]
    pub mock: Option<MockReply>,

    pub expect: ExpectedShape,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestSpec {
    #[serde(default)]
    pub method: HttpMethod,

    /// Absolute URL, or a path resolved against the configured base URL
    #[serde(default = "default_url")]
    pub url: String,

    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl Default for RequestSpec {
    fn default() -> Self {
        Self {
            method: HttpMethod::default(),
            url: default_url(),
            headers: BTreeMap::new(),
        }
    }
}

fn default_url() -> String {
    crate::frete::CALCULO_DETALHE_PATH.to_string()
}

/// Response part of a scenario-level mock rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MockReply {
    #[serde(default)]
    pub alias: Option<String>,

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

impl MockReply {
    /// Rule answering exactly `method url`
    pub fn to_rule(&self, method: HttpMethod, url: &str) -> MockRule {
        let mut rule = MockRule::new(method, UrlPattern::exact(url))
            .with_status(self.status)
            .with_body(self.body.clone());
        rule.alias = self.alias.clone();
        for (key, value) in &self.headers {
            rule = rule.with_header(key.as_str(), value.as_str());
        }
        rule
    }
}

impl Scenario {
    /// Whether the scenario or any enclosing scope carries `tag`
    pub fn has_tag(&self, tag: &str, inherited: &[&[String]]) -> bool {
        self.tags.iter().any(|t| t == tag)
            || inherited.iter().any(|tags| tags.iter().any(|t| t == tag))
    }
}

impl Suite {
    /// Parse a suite from a YAML string
    pub fn from_yaml(yaml: &str) -> E2eResult<Self> {
        let suite: Self = serde_yaml::from_str(yaml)?;
        suite.validate()?;
        Ok(suite)
    }

    /// Parse a suite from a YAML file
    pub fn from_file(path: &Path) -> E2eResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
            .map_err(|e| E2eError::SpecParse(format!("{}: {}", path.display(), e)))
    }

    /// Load all suites from a directory, ordered by file path
    pub fn load_all(dir: &Path) -> E2eResult<Vec<Self>> {
        let mut suites = Vec::new();

        for entry in walkdir::WalkDir::new(dir)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .extension()
                    .map(|ext| ext == "yaml" || ext == "yml")
                    .unwrap_or(false)
            })
        {
            suites.push(Self::from_file(entry.path())?);
        }

        Ok(suites)
    }

    /// Keep only scenarios tagged `tag` at any level. Empty groups are dropped.
    pub fn filter_by_tag(&self, tag: &str) -> Option<Self> {
        self.retain(|group, scenario| {
            scenario.has_tag(tag, &[self.tags.as_slice(), group.tags.as_slice()])
        })
    }

    /// Keep only the scenario called `name`
    pub fn filter_by_name(&self, name: &str) -> Option<Self> {
        self.retain(|_, scenario| scenario.name == name)
    }

    pub fn scenario_count(&self) -> usize {
        self.groups.iter().map(|g| g.scenarios.len()).sum()
    }

    fn retain(&self, keep: impl Fn(&ScenarioGroup, &Scenario) -> bool) -> Option<Self> {
        let groups: Vec<ScenarioGroup> = self
            .groups
            .iter()
            .filter_map(|group| {
                let scenarios: Vec<Scenario> = group
                    .scenarios
                    .iter()
                    .filter(|s| keep(group, *s))
                    .cloned()
                    .collect();
                (!scenarios.is_empty()).then(|| ScenarioGroup {
                    scenarios,
                    ..group.clone()
                })
            })
            .collect();

        (!groups.is_empty()).then(|| Suite {
            groups,
            ..self.clone()
        })
    }

    fn validate(&self) -> E2eResult<()> {
        if self.name.trim().is_empty() {
            return Err(E2eError::SpecParse("suite name is empty".to_string()));
        }

        let mut seen = HashSet::new();
        for scenario in self.groups.iter().flat_map(|g| &g.scenarios) {
            if scenario.name.trim().is_empty() {
                return Err(E2eError::SpecParse(format!(
                    "scenario without a name in suite '{}'",
                    self.name
                )));
            }
            if !seen.insert(scenario.name.as_str()) {
                return Err(E2eError::SpecParse(format!(
                    "duplicate scenario '{}' in suite '{}'",
                    scenario.name, self.name
                )));
            }
            match (&scenario.fixture, &scenario.body) {
                (Some(_), Some(_)) => {
                    return Err(E2eError::SpecParse(format!(
                        "scenario '{}' sets both fixture and body",
                        scenario.name
                    )))
                }
                (None, None) => {
                    return Err(E2eError::SpecParse(format!(
                        "scenario '{}' needs a fixture or a body",
                        scenario.name
                    )))
                }
                _ => {}
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assertion::Check;

    const SUITE: &str = r#"
name: frete-calculo-v3-detalhes
description: Testes da API Frete Cálculo V3 Detalhes
tags: [regressivo]
groups:
  - name: Quando o CEP é válido
    scenarios:
      - name: Deve retornar o tipo de entrega, o prazo, a data e o valor
        tags: [cenariosPositivos]
        fixture: frete-calculo-v3-detalhes
        mock:
          status: 200
          body:
            fretes:
              - tipo: { nome: Normal }
                prazoEntrega: 5
                valor: 59.8
                dataEntrega: "2025-09-15"
        expect:
          status: 200
          fields:
            - path: fretes[0].tipo.nome
              equals: Normal
  - name: Quando o CEP é inválido (vazio)
    mocks:
      - alias: mockFreteErro
        method: POST
        url:
          glob: "**/frete/v3/calculo/detalhe"
        status: 400
    scenarios:
      - name: testeComCampoCepVazio
        tags: [cenariosNegativos]
        body: { Canal: SITE, Cep: "" }
        expect:
          status: 400
"#;

    #[test]
    fn test_parse_suite() {
        let suite = Suite::from_yaml(SUITE).unwrap();
        assert_eq!(suite.name, "frete-calculo-v3-detalhes");
        assert_eq!(suite.groups.len(), 2);
        assert_eq!(suite.scenario_count(), 2);

        let positive = &suite.groups[0].scenarios[0];
        assert_eq!(positive.request.method, HttpMethod::Post);
        assert_eq!(positive.request.url, "/frete/v3/calculo/detalhe");
        assert_eq!(positive.mock.as_ref().unwrap().status, 200);
        assert_eq!(
            positive.expect.fields[0].check,
            Check::Equals(serde_json::json!("Normal"))
        );

        assert_eq!(suite.groups[1].mocks[0].status, 400);
        assert!(suite.groups[1].scenarios[0].body.is_some());
    }

    #[test]
    fn test_filter_by_tag() {
        let suite = Suite::from_yaml(SUITE).unwrap();

        let negative = suite.filter_by_tag("cenariosNegativos").unwrap();
        assert_eq!(negative.scenario_count(), 1);
        assert_eq!(negative.groups[0].name, "Quando o CEP é inválido (vazio)");

        // Suite-level tags are inherited
        assert_eq!(suite.filter_by_tag("regressivo").unwrap().scenario_count(), 2);
        assert!(suite.filter_by_tag("smoke").is_none());
    }

    #[test]
    fn test_filter_by_name() {
        let suite = Suite::from_yaml(SUITE).unwrap();
        let one = suite.filter_by_name("testeComCampoCepVazio").unwrap();
        assert_eq!(one.scenario_count(), 1);
        assert!(suite.filter_by_name("missing").is_none());
    }

    #[test]
    fn test_rejects_ambiguous_input() {
        let yaml = r#"
name: broken
groups:
  - name: g
    scenarios:
      - name: both
        fixture: a
        body: {}
        expect: {}
"#;
        assert!(matches!(Suite::from_yaml(yaml), Err(E2eError::SpecParse(_))));
    }

    #[test]
    fn test_rejects_duplicate_names() {
        let yaml = r#"
name: dupes
groups:
  - name: g
    scenarios:
      - { name: same, fixture: a, expect: {} }
      - { name: same, fixture: b, expect: {} }
"#;
        assert!(matches!(Suite::from_yaml(yaml), Err(E2eError::SpecParse(_))));
    }

    #[test]
    fn test_reply_to_rule() {
        let reply = MockReply {
            alias: Some("mockFrete".to_string()),
            status: 201,
            headers: BTreeMap::from([("X-Trace".to_string(), "1".to_string())]),
            body: serde_json::json!({"ok": true}),
        };
        let rule = reply.to_rule(HttpMethod::Post, "http://frete.local/x");
        assert_eq!(rule.url, UrlPattern::exact("http://frete.local/x"));
        assert_eq!(rule.alias.as_deref(), Some("mockFrete"));
        assert_eq!(rule.status, 201);
        assert_eq!(rule.headers.get("x-trace").map(String::as_str), Some("1"));
    }
}
