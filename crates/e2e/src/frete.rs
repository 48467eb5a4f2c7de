//! Wire contract of `POST /frete/v3/calculo/detalhe`
//!
//! Typed views of the request and both response envelopes, plus the
//! canonical expectations and canned mock answers the shipped suite uses.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::assertion::{ExpectedShape, ValueKind};
use crate::error::{E2eError, E2eResult};
use crate::fixture::Fixture;
use crate::http::HttpMethod;
use crate::mock::{MockRule, UrlPattern};

pub const CALCULO_DETALHE_PATH: &str = "/frete/v3/calculo/detalhe";

/// Message returned for an empty or malformed CEP
pub const INVALID_CEP_MESSAGE: &str =
    "Informe um CEP válido. A informação inserida é inválida ou inexistente.";

/// `detalhes[].codigo` for an invalid CEP
pub const INVALID_CEP_CODE: i64 = 8;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FreteRequest {
    pub canal: String,
    pub cep: String,
    pub unidade_negocio: String,
    pub produtos: Vec<Produto>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Produto {
    pub id_lojista: u64,
    pub id_sku: u64,
    pub quantidade: u32,
    /// Decimal amount as sent on the wire, e.g. `"299.00"`
    pub valor_unitario: String,
}

impl FreteRequest {
    /// Decode a fixture, failing if it does not have the request shape
    pub fn from_fixture(fixture: &Fixture) -> E2eResult<Self> {
        serde_json::from_value(fixture.to_value()).map_err(|e| {
            E2eError::SpecParse(format!(
                "Fixture '{}' is not a frete request: {}",
                fixture.name(),
                e
            ))
        })
    }

    pub fn has_cep(&self) -> bool {
        !self.cep.trim().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FreteResponse {
    pub fretes: Vec<Frete>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Frete {
    pub tipo: TipoEntrega,
    pub prazo_entrega: i64,
    pub valor: f64,
    pub data_entrega: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TipoEntrega {
    pub nome: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErroEnvelope {
    pub erro: Erro,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Erro {
    pub mensagem: String,
    #[serde(default)]
    pub detalhes: Vec<ErroDetalhe>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErroDetalhe {
    pub codigo: i64,
    pub detalhe: String,
}

/// Whether `method url` targets the detailed quote endpoint
pub fn is_calculo_detalhe(method: HttpMethod, url: &str) -> bool {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    method == HttpMethod::Post && path.trim_end_matches('/').ends_with(CALCULO_DETALHE_PATH)
}

/// A quote for a valid CEP: normal delivery with a numeric term and price
pub fn success_shape() -> ExpectedShape {
    ExpectedShape::status(200)
        .equals("fretes[0].tipo.nome", "Normal")
        .is_a("fretes[0].prazoEntrega", ValueKind::Number)
        .is_a("fretes[0].valor", ValueKind::Number)
        .present("fretes[0].dataEntrega")
}

/// The 400 envelope for an empty CEP
pub fn invalid_cep_shape() -> ExpectedShape {
    ExpectedShape::status(400)
        .present("erro")
        .contains("erro.mensagem", "Informe um CEP válido")
        .equals("erro.detalhes[0].codigo", INVALID_CEP_CODE)
}

pub fn quote_mock(url: UrlPattern) -> MockRule {
    let body = FreteResponse {
        fretes: vec![Frete {
            tipo: TipoEntrega {
                nome: "Normal".to_string(),
            },
            prazo_entrega: 5,
            valor: 59.8,
            data_entrega: "2025-09-15".to_string(),
        }],
    };
    MockRule::new(HttpMethod::Post, url)
        .with_alias("mockFrete")
        .with_status(200)
        .with_body(serde_json::to_value(body).unwrap_or_else(|_| json!({})))
}

pub fn invalid_cep_mock(url: UrlPattern) -> MockRule {
    let body = ErroEnvelope {
        erro: Erro {
            mensagem: INVALID_CEP_MESSAGE.to_string(),
            detalhes: vec![ErroDetalhe {
                codigo: INVALID_CEP_CODE,
                detalhe: "O cep  nao corresponde ao padrão 99999999".to_string(),
            }],
        },
    };
    MockRule::new(HttpMethod::Post, url)
        .with_alias("mockFreteErro")
        .with_status(400)
        .with_body(serde_json::to_value(body).unwrap_or_else(|_| json!({})))
}
