mod middleware;
mod upstream;

pub use middleware::{RequestTrace, log_responses, set_request_context};
pub use upstream::{UpstreamState, forward};

use axum::{Router, middleware as axum_middleware};

use crate::cache::{CacheState, respond_first_layer};

/// Proxy router: every path goes through the response cache to the upstream origin.
pub fn build_router(cache: CacheState, upstream: UpstreamState) -> Router {
    Router::new()
        .fallback(forward)
        .with_state(upstream)
        .layer(axum_middleware::from_fn_with_state(cache, respond_first_layer))
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
}
