//! HTTP surface: `/generate`, `/job/{job_id}`, `/_health`.

mod error;
mod handlers;
mod middleware;
mod response;

use std::sync::Arc;

use axum::{Router, middleware as axum_middleware, routing::get};

use crate::application::dispatcher::Dispatcher;
use crate::application::poller::StatusPoller;

pub use error::ApiError;
pub use middleware::RequestContext;

#[derive(Clone)]
pub struct HttpState {
    pub dispatcher: Arc<Dispatcher>,
    pub poller: Arc<StatusPoller>,
    /// `Cache-Control: max-age` advertised on artifact responses.
    pub max_age_secs: u64,
}

pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .route("/generate", get(handlers::generate))
        .route("/job/{job_id}", get(handlers::job_status))
        .route("/_health", get(handlers::health))
        .with_state(state)
        .layer(axum_middleware::from_fn(middleware::log_responses))
        .layer(axum_middleware::from_fn(middleware::set_request_context))
}
