//! Contract assertions over a resolved response
//!
//! An [`ExpectedShape`] is an optional status code plus a list of field
//! checks addressed by path (`fretes[0].tipo.nome`). Checks run in order and
//! the first one that fails is reported.

use std::fmt;

use chrono::{DateTime, NaiveDate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::http::Response;

/// The first unmet expectation of a shape
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionFailure {
    pub path: String,
    pub expected: String,
    pub actual: String,
}

impl fmt::Display for AssertionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: expected {}, got {}",
            self.path, self.expected, self.actual
        )
    }
}

impl std::error::Error for AssertionFailure {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    String,
    Number,
    Integer,
    Boolean,
    Array,
    Object,
    Null,
    /// A string holding a calendar date or timestamp
    Date,
}

impl ValueKind {
    fn accepts(&self, value: &Value) -> bool {
        match self {
            ValueKind::String => value.is_string(),
            ValueKind::Number => value.is_number(),
            ValueKind::Integer => value.is_i64() || value.is_u64(),
            ValueKind::Boolean => value.is_boolean(),
            ValueKind::Array => value.is_array(),
            ValueKind::Object => value.is_object(),
            ValueKind::Null => value.is_null(),
            ValueKind::Date => value.as_str().map(is_date).unwrap_or(false),
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::String => "string",
            ValueKind::Number => "number",
            ValueKind::Integer => "integer",
            ValueKind::Boolean => "boolean",
            ValueKind::Array => "array",
            ValueKind::Object => "object",
            ValueKind::Null => "null",
            ValueKind::Date => "date",
        };
        f.write_str(name)
    }
}

fn is_date(s: &str) -> bool {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
        || NaiveDate::parse_from_str(s, "%d/%m/%Y").is_ok()
        || DateTime::parse_from_rfc3339(s).is_ok()
}

/// What a single field must satisfy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Check {
    /// Equal to this value; numbers compare by value
    Equals(Value),
    /// Substring of a string, or element of an array
    Contains(String),
    #[serde(rename = "type")]
    Type(ValueKind),
    /// `true`: present and non-null. `false`: missing or null.
    Present(bool),
    /// Inverse of `Present`
    Absent(bool),
    /// String matching this regular expression
    Matches(String),
}

impl fmt::Display for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Check::Equals(v) => write!(f, "== {}", v),
            Check::Contains(s) => write!(f, "to contain {:?}", s),
            Check::Type(kind) => write!(f, "a {}", kind),
            Check::Present(true) => f.write_str("to be present"),
            Check::Present(false) | Check::Absent(true) => f.write_str("to be absent"),
            Check::Absent(false) => f.write_str("to be present"),
            Check::Matches(re) => write!(f, "to match /{}/", re),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldExpectation {
    pub path: String,
    #[serde(flatten)]
    pub check: Check,
}

impl FieldExpectation {
    pub fn new(path: impl Into<String>, check: Check) -> Self {
        Self {
            path: path.into(),
            check,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExpectedShape {
    #[serde(default)]
    pub status: Option<u16>,
    #[serde(default)]
    pub fields: Vec<FieldExpectation>,
}

impl ExpectedShape {
    pub fn status(status: u16) -> Self {
        Self {
            status: Some(status),
            fields: Vec::new(),
        }
    }

    pub fn equals(self, path: &str, value: impl Into<Value>) -> Self {
        self.field(path, Check::Equals(value.into()))
    }

    pub fn contains(self, path: &str, needle: impl Into<String>) -> Self {
        self.field(path, Check::Contains(needle.into()))
    }

    pub fn is_a(self, path: &str, kind: ValueKind) -> Self {
        self.field(path, Check::Type(kind))
    }

    pub fn present(self, path: &str) -> Self {
        self.field(path, Check::Present(true))
    }

    pub fn absent(self, path: &str) -> Self {
        self.field(path, Check::Absent(true))
    }

    pub fn matches(self, path: &str, pattern: impl Into<String>) -> Self {
        self.field(path, Check::Matches(pattern.into()))
    }

    fn field(mut self, path: &str, check: Check) -> Self {
        self.fields.push(FieldExpectation::new(path, check));
        self
    }
}

/// Check a response against a shape, stopping at the first failure
pub fn assert(response: &Response, expected: &ExpectedShape) -> Result<(), AssertionFailure> {
    if let Some(status) = expected.status {
        if response.status != status {
            return Err(AssertionFailure {
                path: "status".to_string(),
                expected: format!("== {}", status),
                actual: response.status.to_string(),
            });
        }
    }

    for field in &expected.fields {
        check_field(&response.body, field)?;
    }

    Ok(())
}

fn check_field(body: &Value, field: &FieldExpectation) -> Result<(), AssertionFailure> {
    let fail = |actual: String| AssertionFailure {
        path: field.path.clone(),
        expected: field.check.to_string(),
        actual,
    };

    let segments = parse_path(&field.path)
        .map_err(|reason| fail(format!("invalid path ({})", reason)))?;
    let value = resolve(body, &segments);

    let ok = match (&field.check, value) {
        (Check::Present(want), v) => *want == is_present(v),
        (Check::Absent(want), v) => *want != is_present(v),
        (_, None) => return Err(fail("<missing>".to_string())),
        (Check::Equals(expected), Some(actual)) => values_equal(expected, actual),
        (Check::Contains(needle), Some(actual)) => match actual {
            Value::String(s) => s.contains(needle.as_str()),
            Value::Array(items) => items
                .iter()
                .any(|item| item.as_str() == Some(needle.as_str())),
            _ => false,
        },
        (Check::Type(kind), Some(actual)) => kind.accepts(actual),
        (Check::Matches(pattern), Some(actual)) => {
            let re = Regex::new(pattern)
                .map_err(|e| fail(format!("invalid regex ({})", e)))?;
            actual.as_str().map(|s| re.is_match(s)).unwrap_or(false)
        }
    };

    if ok {
        Ok(())
    } else {
        Err(fail(describe(value)))
    }
}

fn is_present(value: Option<&Value>) -> bool {
    value.map(|v| !v.is_null()).unwrap_or(false)
}

fn describe(value: Option<&Value>) -> String {
    match value {
        None => "<missing>".to_string(),
        Some(v) => v.to_string(),
    }
}

fn values_equal(expected: &Value, actual: &Value) -> bool {
    match (expected, actual) {
        (Value::Number(a), Value::Number(b)) => match (a.as_f64(), b.as_f64()) {
            (Some(a), Some(b)) => a == b,
            _ => a == b,
        },
        _ => expected == actual,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Key(String),
    Index(usize),
}

fn parse_path(path: &str) -> Result<Vec<Segment>, String> {
    let mut segments = Vec::new();

    for part in path.split('.') {
        let (key, mut rest) = match part.find('[') {
            Some(pos) => part.split_at(pos),
            None => (part, ""),
        };
        if key.is_empty() && rest.is_empty() {
            return Err("empty segment".to_string());
        }
        if !key.is_empty() {
            segments.push(Segment::Key(key.to_string()));
        }

        while !rest.is_empty() {
            let close = rest
                .find(']')
                .ok_or_else(|| format!("unclosed index in '{}'", part))?;
            let index = rest[1..close]
                .trim()
                .parse::<usize>()
                .map_err(|_| format!("bad index in '{}'", part))?;
            segments.push(Segment::Index(index));
            rest = &rest[close + 1..];
            if !rest.is_empty() && !rest.starts_with('[') {
                return Err(format!("unexpected '{}' after index", rest));
            }
        }
    }

    Ok(segments)
}

fn resolve<'a>(body: &'a Value, segments: &[Segment]) -> Option<&'a Value> {
    segments.iter().try_fold(body, |value, segment| match segment {
        Segment::Key(key) => value.get(key.as_str()),
        Segment::Index(index) => value.get(*index),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn quote() -> Response {
        Response::new(
            200,
            json!({
                "fretes": [{
                    "tipo": {"nome": "Normal"},
                    "prazoEntrega": 5,
                    "valor": 59.8,
                    "dataEntrega": "2025-09-15"
                }]
            }),
        )
    }

    #[test]
    fn test_parse_path() {
        assert_eq!(
            parse_path("fretes[0].tipo.nome").unwrap(),
            vec![
                Segment::Key("fretes".into()),
                Segment::Index(0),
                Segment::Key("tipo".into()),
                Segment::Key("nome".into()),
            ]
        );
        assert_eq!(
            parse_path("grid[1][2]").unwrap(),
            vec![Segment::Key("grid".into()), Segment::Index(1), Segment::Index(2)]
        );
        assert!(parse_path("a..b").is_err());
        assert!(parse_path("a[0").is_err());
        assert!(parse_path("a[x]").is_err());
    }

    #[test]
    fn test_quote_shape_passes() {
        let shape = ExpectedShape::status(200)
            .equals("fretes[0].tipo.nome", "Normal")
            .is_a("fretes[0].prazoEntrega", ValueKind::Number)
            .is_a("fretes[0].prazoEntrega", ValueKind::Integer)
            .is_a("fretes[0].valor", ValueKind::Number)
            .present("fretes[0].dataEntrega")
            .is_a("fretes[0].dataEntrega", ValueKind::Date)
            .absent("erro");
        assert_eq!(assert(&quote(), &shape), Ok(()));
    }

    #[test]
    fn test_status_mismatch_reported_first() {
        let mut response = quote();
        response.status = 500;
        let shape = ExpectedShape::status(200).equals("fretes[0].tipo.nome", "Expressa");

        let failure = assert(&response, &shape).unwrap_err();
        assert_eq!(failure.path, "status");
        assert_eq!(failure.expected, "== 200");
        assert_eq!(failure.actual, "500");
    }

    #[test]
    fn test_fails_fast_with_field_diagnostics() {
        let shape = ExpectedShape::status(200)
            .equals("fretes[0].tipo.nome", "Expressa")
            .present("fretes[9]");

        let failure = assert(&quote(), &shape).unwrap_err();
        assert_eq!(failure.path, "fretes[0].tipo.nome");
        assert_eq!(failure.expected, "== \"Expressa\"");
        assert_eq!(failure.actual, "\"Normal\"");
    }

    #[test]
    fn test_missing_field() {
        let shape = ExpectedShape::default().is_a("fretes[1].valor", ValueKind::Number);
        let failure = assert(&quote(), &shape).unwrap_err();
        assert_eq!(failure.actual, "<missing>");
        assert_eq!(failure.expected, "a number");
    }

    #[test]
    fn test_numbers_compare_by_value() {
        let response = Response::new(200, json!({"n": 5.0, "m": 8}));
        let shape = ExpectedShape::default().equals("n", 5).equals("m", 8);
        assert_eq!(assert(&response, &shape), Ok(()));
    }

    #[test]
    fn test_error_envelope_checks() {
        let response = Response::new(
            400,
            json!({
                "erro": {
                    "mensagem": "Informe um CEP válido. A informação inserida é inválida ou inexistente.",
                    "detalhes": [{"codigo": 8, "detalhe": "O cep  nao corresponde ao padrão 99999999"}]
                }
            }),
        );
        let shape = ExpectedShape::status(400)
            .present("erro")
            .contains("erro.mensagem", "Informe um CEP válido")
            .equals("erro.detalhes[0].codigo", 8)
            .matches("erro.detalhes[0].detalhe", r"\d{8}$");
        assert_eq!(assert(&response, &shape), Ok(()));
    }

    #[test]
    fn test_present_rejects_null() {
        let response = Response::new(200, json!({"dataEntrega": null}));
        let failure = assert(&response, &ExpectedShape::default().present("dataEntrega")).unwrap_err();
        assert_eq!(failure.actual, "null");
    }

    #[test]
    fn test_absent() {
        let response = Response::new(200, json!({"erro": null, "fretes": []}));
        assert!(assert(&response, &ExpectedShape::default().absent("erro")).is_ok());
        assert!(assert(&response, &ExpectedShape::default().absent("detalhes")).is_ok());

        let failure = assert(&response, &ExpectedShape::default().absent("fretes")).unwrap_err();
        assert_eq!(failure.expected, "to be absent");
        assert_eq!(failure.actual, "[]");
    }

    #[test]
    fn test_contains_on_arrays() {
        let response = Response::new(200, json!({"tags": ["normal", "expressa"]}));
        assert!(assert(&response, &ExpectedShape::default().contains("tags", "expressa")).is_ok());
        assert!(assert(&response, &ExpectedShape::default().contains("tags", "agendada")).is_err());
    }

    #[test]
    fn test_date_kind_accepts_brazilian_format() {
        let response = Response::new(200, json!({"a": "24/09/2025", "b": "2025-09-15T10:00:00Z", "c": "soon"}));
        let shape = ExpectedShape::default()
            .is_a("a", ValueKind::Date)
            .is_a("b", ValueKind::Date);
        assert!(assert(&response, &shape).is_ok());
        assert!(assert(&response, &ExpectedShape::default().is_a("c", ValueKind::Date)).is_err());
    }

    #[test]
    fn test_shape_from_yaml() {
        let yaml = r#"
status: 400
fields:
  - path: erro.mensagem
    contains: Informe um CEP válido
  - path: erro.detalhes[0].codigo
    equals: 8
  - path: erro.detalhes
    type: array
  - path: erro
    present: true
  - path: fretes
    absent: true
"#;
        let shape: ExpectedShape = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(shape.status, Some(400));
        assert_eq!(shape.fields.len(), 5);
        assert_eq!(shape.fields[1].check, Check::Equals(json!(8)));
        assert_eq!(shape.fields[2].check, Check::Type(ValueKind::Array));
        assert_eq!(shape.fields[4].check, Check::Absent(true));

        let response = Response::new(400, json!({"erro": {"mensagem": "Informe um CEP válido.", "detalhes": [{"codigo": 8}]}}));
        assert_eq!(assert(&response, &shape), Ok(()));
    }
}
