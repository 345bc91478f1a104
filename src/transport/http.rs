//! A [`Transport`] implementation which uses the `ureq` crate to push to a
//! Loki endpoint.

use super::{StatusCode, Transport, TransportError};
use base64::{engine::general_purpose, Engine};
use std::io::Read;
use std::time::Duration;
use ureq::Agent;
use url::Url;

/// Path of the Loki push API, relative to the server root
pub const PUSH_PATH: &str = "loki/api/v1/push";

/// Longest slice of an error response body kept in a [`TransportError`]
const MAX_ERROR_BODY: u64 = 1024;

/// Pushes payloads over one long-lived `ureq` agent
///
/// The agent keeps its connection pool for the lifetime of the transport,
/// so consecutive batches reuse the same connection.
pub struct HttpTransport {
    agent: Agent,
    push_url: Url,
    authorization: Option<String>,
    tenant: Option<String>,
}

impl HttpTransport {
    /// Create a transport for the Loki server at `endpoint`
    ///
    /// `endpoint` may be the server root (`http://loki:3100`), a prefix
    /// behind a proxy (`https://host/loki-proxy/`) or the full push URL.
    pub fn new(endpoint: &str, request_timeout: Duration) -> Result<Self, TransportError> {
        let endpoint =
            Url::parse(endpoint).map_err(|e| TransportError::InvalidEndpoint(e.to_string()))?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(TransportError::InvalidEndpoint(format!(
                "unsupported scheme '{}'",
                endpoint.scheme()
            )));
        }

        let agent = ureq::AgentBuilder::new().timeout(request_timeout).build();

        Ok(Self {
            agent,
            push_url: push_url(&endpoint)?,
            authorization: None,
            tenant: None,
        })
    }

    /// Send HTTP Basic credentials with every request
    #[must_use]
    pub fn with_basic_auth(mut self, username: &str, password: &str) -> Self {
        self.authorization = Some(basic_auth_header(username, password));
        self
    }

    /// Send an `X-Scope-OrgID` header with every request
    #[must_use]
    pub fn with_tenant(mut self, tenant: impl Into<String>) -> Self {
        self.tenant = Some(tenant.into());
        self
    }

    pub fn push_url(&self) -> &Url {
        &self.push_url
    }

    pub fn authorization(&self) -> Option<&str> {
        self.authorization.as_deref()
    }
}

impl Transport for HttpTransport {
    fn send(&mut self, payload: &[u8]) -> Result<StatusCode, TransportError> {
        let mut request = self
            .agent
            .post(self.push_url.as_str())
            .set("Content-Type", "application/json; charset=utf-8");
        if let Some(authorization) = &self.authorization {
            request = request.set("Authorization", authorization);
        }
        if let Some(tenant) = &self.tenant {
            request = request.set("X-Scope-OrgID", tenant);
        }

        match request.send_bytes(payload) {
            Ok(response) if (200..300).contains(&response.status()) => Ok(response.status()),
            Ok(response) => Err(TransportError::Status {
                code: response.status(),
                body: read_body(response),
            }),
            Err(ureq::Error::Status(code, response)) => Err(TransportError::Status {
                code,
                body: read_body(response),
            }),
            Err(ureq::Error::Transport(transport)) => {
                Err(TransportError::Network(transport.to_string()))
            }
        }
    }

    fn name(&self) -> &str {
        "http"
    }
}

/// Resolve the push URL for a configured endpoint
pub fn push_url(endpoint: &Url) -> Result<Url, TransportError> {
    if endpoint.path().trim_end_matches('/').ends_with(PUSH_PATH) {
        return Ok(endpoint.clone());
    }

    let mut base = endpoint.clone();
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.join(PUSH_PATH)
        .map_err(|e| TransportError::InvalidEndpoint(e.to_string()))
}

/// `Basic <base64(username:password)>`
pub fn basic_auth_header(username: &str, password: &str) -> String {
    let credentials = general_purpose::STANDARD.encode(format!("{}:{}", username, password));
    format!("Basic {}", credentials)
}

fn read_body(response: ureq::Response) -> String {
    let mut body = String::new();
    let _ = response
        .into_reader()
        .take(MAX_ERROR_BODY)
        .read_to_string(&mut body);
    body
}
