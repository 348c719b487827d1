//! Upstream origin handler.
//!
//! The proxy's content generator: forwards the request to the configured
//! origin and relays status, content type and body.

use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode, Uri, header},
    response::{IntoResponse, Response},
};
use http_body_util::BodyExt;
use tracing::debug;
use url::Url;

use crate::{application::error::HttpError, infra::error::InfraError};

const SOURCE: &str = "infra::http::upstream::forward";

#[derive(Clone)]
pub struct UpstreamState {
    client: reqwest::Client,
    base_url: Url,
}

impl UpstreamState {
    pub fn new(base_url: Url, timeout: Duration) -> Result<Self, InfraError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| InfraError::upstream(base_url.as_str(), err))?;
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Origin URL for `uri`, keeping any path prefix of the base URL.
    pub fn target(&self, uri: &Uri) -> Result<Url, url::ParseError> {
        let path_and_query = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
        let base = self.base_url.as_str().trim_end_matches('/');
        Url::parse(&format!("{base}{path_and_query}"))
    }
}

pub async fn forward(
    State(upstream): State<UpstreamState>,
    request: Request<Body>,
) -> Result<Response, HttpError> {
    let target = upstream.target(request.uri()).map_err(|err| {
        HttpError::from_error(SOURCE, StatusCode::BAD_REQUEST, "Invalid request target", &err)
    })?;

    let (parts, body) = request.into_parts();
    let body = body
        .collect()
        .await
        .map_err(|err| {
            HttpError::from_error(
                SOURCE,
                StatusCode::BAD_REQUEST,
                "Request body could not be read",
                &err,
            )
        })?
        .to_bytes();

    let mut outbound = upstream.client.request(parts.method, target.clone());
    if let Some(content_type) = parts.headers.get(header::CONTENT_TYPE) {
        outbound = outbound.header(header::CONTENT_TYPE, content_type.clone());
    }
    if !body.is_empty() {
        outbound = outbound.body(body);
    }

    let reply = outbound
        .send()
        .await
        .map_err(|err| InfraError::upstream(target.as_str(), err))?;

    let status = reply.status();
    let content_type = reply.headers().get(header::CONTENT_TYPE).cloned();
    let bytes = reply
        .bytes()
        .await
        .map_err(|err| InfraError::upstream(target.as_str(), err))?;

    debug!(target_url = %target, status = status.as_u16(), bytes = bytes.len(), "upstream replied");

    let mut response = (status, bytes).into_response();
    if let Some(content_type) = content_type {
        response.headers_mut().insert(header::CONTENT_TYPE, content_type);
    } else {
        response.headers_mut().remove(header::CONTENT_TYPE);
    }
    Ok(response)
}
