use axum::{
    extract::{Path, Query, State, rejection::QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::application::dispatcher::GenerateOutcome;
use crate::application::poller::JobStatusView;
use crate::domain::descriptor::GenerateParams;

use super::HttpState;
use super::error::ApiError;
use super::response::{
    artifact_response, failed_job_response, pending_response, with_cache_status, with_job_id,
};

const GENERATE_SOURCE: &str = "infra::http::generate";
const JOB_SOURCE: &str = "infra::http::job_status";

pub(super) async fn generate(
    State(state): State<HttpState>,
    query: Result<Query<GenerateParams>, QueryRejection>,
) -> Response {
    let Query(params) = match query {
        Ok(query) => query,
        Err(rejection) => return ApiError::bad_query(GENERATE_SOURCE, &rejection).into_response(),
    };

    match state.dispatcher.handle(&params).await {
        Ok(GenerateOutcome::Artifact {
            artifact,
            cache,
            descriptor,
        }) => with_cache_status(
            artifact_response(
                artifact,
                &descriptor.download_filename(),
                state.max_age_secs,
            ),
            cache,
        ),
        Ok(GenerateOutcome::Accepted { job_id, .. }) => pending_response(&job_id),
        Err(err) => ApiError::from_dispatch(GENERATE_SOURCE, &err).into_response(),
    }
}

pub(super) async fn job_status(
    State(state): State<HttpState>,
    Path(job_id): Path<String>,
) -> Response {
    match state.poller.status(&job_id).await {
        Ok(JobStatusView::NotFound) => {
            ApiError::not_found(JOB_SOURCE, format!("job `{job_id}` not found")).into_response()
        }
        Ok(JobStatusView::Pending { job }) => pending_response(&job.id),
        Ok(JobStatusView::Completed { job, artifact }) => with_job_id(
            artifact_response(
                artifact,
                &job.params.download_filename(),
                state.max_age_secs,
            ),
            &job.id,
        ),
        Ok(JobStatusView::Failed { job, error }) => {
            failed_job_response(JOB_SOURCE, &job.id, &error)
        }
        Err(err) => ApiError::from_poll(JOB_SOURCE, &err).into_response(),
    }
}

pub(super) async fn health() -> StatusCode {
    StatusCode::NO_CONTENT
}
