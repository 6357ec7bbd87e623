use axum::Json;
use axum::extract::rejection::QueryRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use dailyoffice_api_types::ErrorBody;

use crate::application::dispatcher::DispatchError;
use crate::application::error::ErrorReport;
use crate::application::poller::PollError;

pub mod codes {
    pub const INVALID_REQUEST: &str = "invalid_request";
    pub const NOT_FOUND: &str = "not_found";
    pub const GENERATION_FAILED: &str = "generation_failed";
    pub const GENERATION_TIMEOUT: &str = "generation_timeout";
    pub const JOB_REGISTRY: &str = "job_registry_error";
    pub const RESULT_UNAVAILABLE: &str = "result_unavailable";
}

/// JSON error response with the error chain attached for the response logger.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: Option<String>,
    report: ErrorReport,
}

impl ApiError {
    fn new(
        source: &'static str,
        status: StatusCode,
        code: &'static str,
        message: Option<String>,
        error: Option<&dyn std::error::Error>,
    ) -> Self {
        let report = match error {
            Some(error) => ErrorReport::from_error(source, status, error),
            None => ErrorReport::from_message(source, status, message.clone().unwrap_or_default()),
        };
        Self {
            status,
            code,
            message,
            report,
        }
    }

    pub fn not_found(source: &'static str, message: impl Into<String>) -> Self {
        Self::new(
            source,
            StatusCode::NOT_FOUND,
            codes::NOT_FOUND,
            Some(message.into()),
            None,
        )
    }

    pub fn bad_query(source: &'static str, rejection: &QueryRejection) -> Self {
        Self::new(
            source,
            StatusCode::BAD_REQUEST,
            codes::INVALID_REQUEST,
            Some(rejection.body_text()),
            Some(rejection),
        )
    }

    pub fn from_dispatch(source: &'static str, err: &DispatchError) -> Self {
        match err {
            DispatchError::Validation(domain) => Self::new(
                source,
                StatusCode::BAD_REQUEST,
                codes::INVALID_REQUEST,
                Some(domain.to_string()),
                Some(err),
            ),
            DispatchError::Generation { source: cause, .. } if cause.is_deadline() => Self::new(
                source,
                StatusCode::INTERNAL_SERVER_ERROR,
                codes::GENERATION_TIMEOUT,
                Some(cause.to_string()),
                Some(err),
            ),
            DispatchError::Generation { source: cause, .. } => Self::new(
                source,
                StatusCode::INTERNAL_SERVER_ERROR,
                codes::GENERATION_FAILED,
                Some(cause.to_string()),
                Some(err),
            ),
            DispatchError::JobRegistry { .. } => Self::new(
                source,
                StatusCode::INTERNAL_SERVER_ERROR,
                codes::JOB_REGISTRY,
                None,
                Some(err),
            ),
        }
    }

    pub fn from_poll(source: &'static str, err: &PollError) -> Self {
        let code = match err {
            PollError::Registry(_) => codes::JOB_REGISTRY,
            PollError::ResultMissing { .. } | PollError::Store { .. } => {
                codes::RESULT_UNAVAILABLE
            }
        };
        Self::new(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            code,
            None,
            Some(err),
        )
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody::new(self.code, self.message);
        let mut response = (self.status, Json(body)).into_response();
        self.report.attach(&mut response);
        response
    }
}
