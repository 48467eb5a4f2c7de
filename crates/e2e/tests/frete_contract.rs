use async_trait::async_trait;
use frete_e2e::{
    frete, E2eError, E2eResult, Environment, FixtureStore, HttpRequest, Response, RunnerConfig,
    ScenarioRunner, ScenarioState, Suite, Transport, UrlPattern,
};
use httpmock::prelude::*;
use serde_json::json;
use std::path::PathBuf;
use std::time::Duration;

/// Transport for mocked runs: any call is a harness bug
struct NoNetwork;

#[async_trait]
impl Transport for NoNetwork {
    async fn send(&self, request: &HttpRequest) -> E2eResult<Response> {
        Err(E2eError::Transport(format!(
            "network is disabled, refused {} {}",
            request.method, request.url
        )))
    }
}

fn crate_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
}

fn shipped_config() -> RunnerConfig {
    RunnerConfig::load(&crate_dir().join("frete-e2e.toml"))
        .map(|config| RunnerConfig {
            specs_dir: crate_dir().join("specs"),
            fixtures_dir: crate_dir().join("fixtures"),
            ..config
        })
        .expect("shipped config should parse")
}

fn mocked_runner(config: RunnerConfig) -> ScenarioRunner {
    let fixtures = FixtureStore::new(config.fixtures_dir.clone());
    ScenarioRunner::new(config, Environment::mocked(), fixtures, Box::new(NoNetwork))
}

#[tokio::test]
async fn shipped_suite_passes_with_mocks() {
    let mut runner = mocked_runner(shipped_config());

    let results = runner.run_all().await.expect("suites should load");

    assert!(results.mocked);
    assert_eq!(results.total, 2);
    assert_eq!(results.failed, 0, "{:#?}", results);
    assert!(results.success());
    // Each group ends by clearing its rules
    assert!(runner.responder().is_empty());
}

#[test]
fn shipped_suite_declares_the_canonical_contract() {
    let suites = Suite::load_all(&crate_dir().join("specs")).unwrap();
    let suite = &suites[0];

    let positive = &suite.groups[0].scenarios[0];
    assert_eq!(positive.expect, frete::success_shape());
    let url = shipped_config().resolve_url(&positive.request.url);
    assert!(frete::is_calculo_detalhe(positive.request.method, &url));
    assert_eq!(
        positive.mock.as_ref().unwrap().to_rule(positive.request.method, &url),
        frete::quote_mock(UrlPattern::exact(url))
    );

    let negative = &suite.groups[1];
    assert_eq!(negative.scenarios[0].expect, frete::invalid_cep_shape());
    assert_eq!(
        negative.mocks,
        vec![frete::invalid_cep_mock(UrlPattern::glob("**/frete/v3/calculo/detalhe"))]
    );
}

#[tokio::test]
async fn tag_filter_selects_negative_scenario() {
    let mut runner = mocked_runner(shipped_config());

    let results = runner.run_tagged("cenariosNegativos").await.unwrap();
    assert_eq!(results.total, 1);
    assert_eq!(results.suites[0].results[0].name, "testeComCampoCepVazio");
    assert!(results.success());

    let none = runner.run_tagged("smoke").await.unwrap();
    assert_eq!(none.total, 0);
}

#[tokio::test]
async fn unknown_scenario_name_is_an_error() {
    let mut runner = mocked_runner(shipped_config());
    assert!(matches!(
        runner.run_named("nao existe").await,
        Err(E2eError::SpecParse(_))
    ));
}

#[tokio::test]
async fn empty_cep_end_to_end_with_mocks() {
    let config = shipped_config();
    let mut runner = mocked_runner(config.clone());

    runner
        .register_mock(frete::invalid_cep_mock(frete_e2e::UrlPattern::exact(
            frete::CALCULO_DETALHE_PATH,
        )))
        .unwrap();

    let suite = Suite::from_yaml(
        r#"
name: cep-vazio
groups:
  - name: Quando o CEP é inválido (vazio)
    scenarios:
      - name: cep vazio
        body:
          Canal: SITE
          Cep: ""
          UnidadeNegocio: B2CCasasBahia
          Produtos:
            - { IdLojista: 10037, IdSku: 12857509, Quantidade: 1, ValorUnitario: "299.00" }
        expect:
          status: 400
"#,
    )
    .unwrap();
    let mut scenario = suite.groups[0].scenarios[0].clone();
    scenario.expect = frete::invalid_cep_shape();

    let result = runner.run_scenario(&scenario).await.unwrap();
    assert_eq!(result.state, ScenarioState::Passed);
    assert_eq!(result.status, Some(400));
    assert_eq!(runner.responder().hits("mockFreteErro"), 1);
    assert_eq!(
        runner.responder().intercepts()[0].url,
        config.resolve_url(frete::CALCULO_DETALHE_PATH)
    );

    runner.clear_mocks();
    assert!(matches!(
        runner.run_scenario(&scenario).await,
        Err(E2eError::UnmockedRequest { .. })
    ));
}

#[test]
fn shipped_fixtures_are_frete_requests_and_stable() {
    let store = FixtureStore::new(crate_dir().join("fixtures"));

    let valid = store.load("frete-calculo-v3-detalhes").unwrap();
    let again = store.load("frete-calculo-v3-detalhes").unwrap();
    assert_eq!(valid.digest(), again.digest());
    assert!(frete::FreteRequest::from_fixture(&valid).unwrap().has_cep());

    let empty = store.load("frete-calculo-v3-detalhes-cep-vazio").unwrap();
    assert!(!frete::FreteRequest::from_fixture(&empty).unwrap().has_cep());

    assert_eq!(
        store.names().unwrap(),
        vec![
            "frete-calculo-v3-detalhes",
            "frete-calculo-v3-detalhes-cep-vazio"
        ]
    );
}

#[tokio::test]
async fn shipped_suite_passes_against_live_server() {
    let server = MockServer::start();
    let quote = server.mock(|when, then| {
        when.method(POST)
            .path("/frete/v3/calculo/detalhe")
            .header("content-type", "application/json")
            .json_body_includes(json!({"Cep": "01310100"}).to_string());
        then.status(200).json_body(json!({
            "fretes": [{
                "tipo": {"nome": "Normal"},
                "prazoEntrega": 7,
                "valor": 41.82,
                "dataEntrega": "24/09/2025"
            }]
        }));
    });
    let invalid = server.mock(|when, then| {
        when.method(POST)
            .path("/frete/v3/calculo/detalhe")
            .json_body_includes(json!({"Cep": ""}).to_string());
        then.status(400).json_body(json!({
            "erro": {
                "mensagem": frete::INVALID_CEP_MESSAGE,
                "detalhes": [{"codigo": 8, "detalhe": "O cep  nao corresponde ao padrão 99999999"}]
            }
        }));
    });

    let config = RunnerConfig {
        base_url: server.base_url(),
        request_timeout_ms: 5_000,
        ..shipped_config()
    };
    let mut runner = ScenarioRunner::with_config(config, Environment::live()).unwrap();

    let results = runner.run_all().await.unwrap();

    quote.assert();
    invalid.assert();
    assert!(!results.mocked);
    assert_eq!(results.passed, 2, "{:#?}", results);
    assert!(runner.responder().intercepts().is_empty());
}

#[tokio::test]
async fn live_timeout_is_reported() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/frete/v3/calculo/detalhe");
        then.status(200)
            .delay(Duration::from_secs(3))
            .json_body(json!({"fretes": []}));
    });

    let config = RunnerConfig {
        base_url: server.base_url(),
        request_timeout_ms: 200,
        ..shipped_config()
    };
    let mut runner = ScenarioRunner::with_config(config, Environment::live()).unwrap();
    let suite = Suite::load_all(&crate_dir().join("specs")).unwrap();
    let scenario = suite[0].groups[0].scenarios[0].clone();

    match runner.run_scenario(&scenario).await {
        Err(E2eError::Timeout(url)) => assert!(url.ends_with("/frete/v3/calculo/detalhe")),
        other => panic!("expected Timeout, got {:?}", other),
    }
}

#[tokio::test]
async fn results_are_written_as_json() {
    let output = tempfile::tempdir().unwrap();
    let config = RunnerConfig {
        output_dir: output.path().join("results"),
        ..shipped_config()
    };
    let mut runner = mocked_runner(config);

    let results = runner.run_all().await.unwrap();
    let path = runner.write_results(&results).unwrap();

    let written: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
    assert_eq!(written["total"], 2);
    assert_eq!(written["suites"][0]["results"][0]["state"], "passed");
}
