//! Forwarding of admitted requests to the upstream AI provider.

use async_trait::async_trait;
use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderMap, HeaderName, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use secrecy::{ExposeSecret, Secret};
use serde::Serialize;
use std::sync::Arc;

use vantage_core::{Error, Result};

use crate::server::AppState;

/// Headers that describe a single connection and must not be relayed.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP.contains(&name.as_str())
}

/// JSON body returned when the upstream cannot be reached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpstreamFailure {
    pub error: &'static str,
    pub code: &'static str,
}

impl UpstreamFailure {
    pub const fn bad_gateway() -> Self {
        Self {
            error: "Upstream Unavailable",
            code: "BAD_GATEWAY",
        }
    }
}

/// Destination for admitted requests.
#[async_trait]
pub trait Upstream: Send + Sync {
    /// Send the request upstream and return its (streaming) response.
    async fn forward(&self, request: Request) -> Result<Response>;
}

/// [`Upstream`] that relays requests to a fixed base URL over HTTP.
pub struct HttpUpstream {
    client: reqwest::Client,
    base_url: String,
    api_key: Secret<String>,
}

impl HttpUpstream {
    pub fn new(base_url: impl Into<String>, api_key: Secret<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| Error::upstream(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn outbound_headers(headers: &HeaderMap) -> HeaderMap {
        let mut out = HeaderMap::with_capacity(headers.len());
        for (name, value) in headers {
            if is_hop_by_hop(name)
                || *name == header::HOST
                || *name == header::CONTENT_LENGTH
                || *name == header::AUTHORIZATION
            {
                continue;
            }
            out.append(name.clone(), value.clone());
        }
        out
    }
}

#[async_trait]
impl Upstream for HttpUpstream {
    async fn forward(&self, request: Request) -> Result<Response> {
        let (parts, body) = request.into_parts();
        let path_and_query = parts.uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
        let url = format!("{}{}", self.base_url, path_and_query);

        // The pipeline has already buffered and bounded the body.
        let body = axum::body::to_bytes(body, usize::MAX)
            .await
            .map_err(|e| Error::upstream(format!("Failed to read request body: {}", e)))?;

        tracing::debug!(method = %parts.method, url = %url, "Forwarding request upstream");

        let upstream = self
            .client
            .request(parts.method, &url)
            .headers(Self::outbound_headers(&parts.headers))
            .bearer_auth(self.api_key.expose_secret())
            .body(body)
            .send()
            .await
            .map_err(|e| Error::upstream(format!("Upstream request failed: {}", e)))?;

        let mut response = Response::builder().status(upstream.status());
        for (name, value) in upstream.headers() {
            if !is_hop_by_hop(name) {
                response = response.header(name, value);
            }
        }

        response
            .body(Body::from_stream(upstream.bytes_stream()))
            .map_err(|e| Error::upstream(format!("Invalid upstream response: {}", e)))
    }
}

/// Catch-all handler for the governed `/v1/*` group.
pub async fn proxy_handler(State(state): State<Arc<AppState>>, request: Request) -> Response {
    match state.upstream.forward(request).await {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(error = %e, "Upstream unavailable");
            (StatusCode::BAD_GATEWAY, Json(UpstreamFailure::bad_gateway())).into_response()
        }
    }
}
