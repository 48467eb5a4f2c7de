//! Live HTTP transport used when requests are not mocked

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::error::{E2eError, E2eResult};
use crate::http::{HttpRequest, Response};

/// Sends a request and resolves exactly one response
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &HttpRequest) -> E2eResult<Response>;
}

/// `reqwest`-backed transport. Error statuses are returned, not raised.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> E2eResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &HttpRequest) -> E2eResult<Response> {
        debug!("Sending {} {}", request.method, request.url);

        let mut builder = self
            .client
            .request(request.method.into(), &request.url);
        for (key, value) in &request.headers {
            builder = builder.header(key, value);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| transport_error(&request.url, e))?;

        let status = response.status().as_u16();
        let headers: BTreeMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(k, v)| {
                v.to_str()
                    .ok()
                    .map(|v| (k.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();
        let raw = response
            .bytes()
            .await
            .map_err(|e| transport_error(&request.url, e))?;

        debug!("{} {} -> {}", request.method, request.url, status);

        Ok(Response {
            status,
            headers,
            body: Response::decode_body(&raw),
        })
    }
}

fn transport_error(url: &str, e: reqwest::Error) -> E2eError {
    if e.is_timeout() {
        E2eError::Timeout(url.to_string())
    } else {
        E2eError::Transport(e.to_string())
    }
}
