use axum::{
    Json,
    body::Body,
    http::{
        HeaderName, HeaderValue, StatusCode,
        header::{
            ACCESS_CONTROL_ALLOW_ORIGIN, CACHE_CONTROL, CONTENT_DISPOSITION, CONTENT_LENGTH,
            CONTENT_TYPE, ETAG,
        },
    },
    response::{IntoResponse, Response},
};
use dailyoffice_api_types::{CACHE_STATUS_HEADER, JOB_ID_HEADER, JobStatusBody};

use crate::application::dispatcher::CacheStatus;
use crate::application::error::ErrorReport;
use crate::domain::entities::Artifact;

/// Raw artifact bytes with download and freshness headers.
pub fn artifact_response(artifact: Artifact, filename: &str, max_age_secs: u64) -> Response {
    let mut response = Response::new(Body::from(artifact.bytes.clone()));
    let headers = response.headers_mut();

    insert_header(headers, CONTENT_TYPE, &artifact.content_type);
    insert_header(headers, CONTENT_LENGTH, &artifact.len().to_string());
    insert_header(
        headers,
        CONTENT_DISPOSITION,
        &format!("inline; filename=\"{filename}\""),
    );
    insert_header(headers, CACHE_CONTROL, &format!("max-age={max_age_secs}"));
    insert_header(headers, ACCESS_CONTROL_ALLOW_ORIGIN, "*");
    insert_header(headers, ETAG, &format!("\"{}\"", artifact.digest));

    response
}

pub fn with_cache_status(mut response: Response, cache: CacheStatus) -> Response {
    response.headers_mut().insert(
        HeaderName::from_static(CACHE_STATUS_HEADER),
        HeaderValue::from_static(cache.as_header()),
    );
    response
}

pub fn with_job_id(mut response: Response, job_id: &str) -> Response {
    insert_header(
        response.headers_mut(),
        HeaderName::from_static(JOB_ID_HEADER),
        job_id,
    );
    response
}

/// 202 with `{status: "pending", jobId}`.
pub fn pending_response(job_id: &str) -> Response {
    let mut response = (StatusCode::ACCEPTED, Json(JobStatusBody::pending(job_id))).into_response();
    response
        .headers_mut()
        .insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    response
}

/// 500 with `{status: "failed", jobId, error}`.
pub fn failed_job_response(source: &'static str, job_id: &str, error: &str) -> Response {
    let mut response = (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(JobStatusBody::failed(job_id, error)),
    )
        .into_response();
    ErrorReport::from_message(
        source,
        StatusCode::INTERNAL_SERVER_ERROR,
        format!("job `{job_id}` failed: {error}"),
    )
    .attach(&mut response);
    response
}

fn insert_header(headers: &mut axum::http::HeaderMap, name: HeaderName, value: &str) {
    // Values derived from validated descriptors are always visible ASCII.
    if let Ok(value) = HeaderValue::from_str(value) {
        headers.insert(name, value);
    }
}
