//! Respond-first response cache middleware.
//!
//! Serves stored responses for GET requests. A stale entry is sent as-is and
//! the rest of the stack runs afterwards in a background task, so the next
//! request sees the regenerated content.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderValue, Request, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use http_body_util::BodyExt;
use metrics::counter;
use tracing::{Instrument, debug, instrument, warn};

use crate::application::error::HttpError;

use super::{
    CacheConfig, CacheError, CacheStore, MethodPolicy, RequestContext, Served, Transform,
    capture::Capture,
};

const SOURCE: &str = "cache::middleware::respond_first_layer";

/// Shared cache state for middleware.
#[derive(Clone)]
pub struct CacheState {
    pub config: CacheConfig,
    pub store: Arc<CacheStore>,
    pub transform: Option<Transform>,
}

impl CacheState {
    /// Open the store described by `config`.
    pub fn new(config: CacheConfig) -> Result<Self, CacheError> {
        let store = CacheStore::open(&config)?;
        Ok(Self {
            config,
            store: Arc::new(store),
            transform: None,
        })
    }

    /// Apply `transform` to every body sent to clients, hit or miss.
    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = Some(transform);
        self
    }
}

/// Middleware implementing respond-first, process-later caching.
#[instrument(skip_all, fields(method = %request.method(), path = %request.uri().path()))]
pub async fn respond_first_layer(
    State(cache): State<CacheState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let (parts, body) = request.into_parts();
    let context = RequestContext::from_parts(&parts);

    let served = match cache.store.serve(&context, cache.transform.clone()).await {
        Ok(served) => served,
        Err(CacheError::MethodNotCacheable { .. })
            if cache.config.method_policy == MethodPolicy::Bypass =>
        {
            counter!("rfpl_cache_bypass_total").increment(1);
            return next.run(Request::from_parts(parts, body)).await;
        }
        Err(error) => return error_response(&error),
    };

    match served {
        Served::Fresh(hit) => {
            counter!("rfpl_cache_hit_total", "freshness" => "fresh").increment(1);
            hit.into_response(&cache.config.content_type)
        }
        Served::Stale { response, capture } => {
            counter!("rfpl_cache_hit_total", "freshness" => "stale").increment(1);
            // GET bodies carry no meaning; the refresh replays the head only.
            let replay = Request::from_parts(parts, Body::empty());
            tokio::spawn(refresh(next, replay, capture).in_current_span());
            response.into_response(&cache.config.content_type)
        }
        Served::Miss(capture) => {
            counter!("rfpl_cache_miss_total").increment(1);
            let response = next.run(Request::from_parts(parts, body)).await;
            capture_response(capture, response).await
        }
    }
}

/// Re-run the handler stack behind a stale hit and persist its output.
async fn refresh(next: Next, request: Request<Body>, capture: Capture) {
    let response = next.run(request).await;
    if !should_store_response(&response) {
        debug!(
            status = response.status().as_u16(),
            key = %capture.key(),
            "regenerated response not storable, keeping stale entry"
        );
        return;
    }

    let content = match collect_body(response).await {
        Ok(content) => content,
        Err(error) => {
            counter!("rfpl_cache_store_error_total").increment(1);
            warn!(key = %capture.key(), error = %error, "failed to buffer regenerated response");
            return;
        }
    };

    let key = capture.key().clone();
    match capture.store(content).await {
        Ok(_) => {
            counter!("rfpl_cache_store_total").increment(1);
            debug!(key = %key, "refreshed stale cache entry");
        }
        Err(error) => {
            counter!("rfpl_cache_store_error_total").increment(1);
            warn!(key = %key, error = %error, "stale cache entry refresh failed");
        }
    }
}

/// Persist a miss and forward whatever the capture says the client receives.
async fn capture_response(capture: Capture, response: Response) -> Response {
    if !should_store_response(&response) {
        debug!(
            status = response.status().as_u16(),
            "response not storable, passing through"
        );
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let content = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(error) => {
            return HttpError::new(
                SOURCE,
                axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error",
                format!("failed to buffer response body: {error}"),
            )
            .into_response();
        }
    };

    match capture.store(content).await {
        Ok(emitted) => {
            counter!("rfpl_cache_store_total").increment(1);
            parts
                .headers
                .insert(header::CONTENT_LENGTH, HeaderValue::from(emitted.len()));
            Response::from_parts(parts, Body::from(emitted))
        }
        Err(error) => {
            counter!("rfpl_cache_store_error_total").increment(1);
            error_response(&error)
        }
    }
}

async fn collect_body(response: Response) -> Result<Bytes, axum::Error> {
    Ok(response.into_body().collect().await?.to_bytes())
}

fn error_response(error: &CacheError) -> Response {
    let status = error.status();
    let public_message = match error {
        CacheError::MethodNotCacheable { .. } => "Method not allowed",
        CacheError::Configuration { .. } | CacheError::Storage { .. } => "Internal server error",
    };

    let mut response = HttpError::from_error(SOURCE, status, public_message, error).into_response();
    if matches!(error, CacheError::MethodNotCacheable { .. }) {
        response
            .headers_mut()
            .insert(header::ALLOW, HeaderValue::from_static("GET"));
    }
    response
}

/// Only successful, non-personalised, non-streaming responses are persisted.
pub fn should_store_response(response: &Response) -> bool {
    if !response.status().is_success() {
        return false;
    }

    if response.headers().contains_key(header::SET_COOKIE) {
        return false;
    }

    if response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("text/event-stream"))
    {
        return false;
    }

    true
}
