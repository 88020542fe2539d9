use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use stockledger_core::{DomainError, ErrorKind};
use stockledger_infra::EngineError;

/// Map an engine failure onto a status code and a JSON body carrying its code.
pub fn engine_error_to_response(err: &EngineError) -> axum::response::Response {
    if let Some(DomainError::InsufficientStock { available, requested }) = err.as_domain() {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({
                "error": err.code(),
                "message": err.to_string(),
                "available": available,
                "requested": requested,
            })),
        )
            .into_response();
    }

    match err.kind() {
        ErrorKind::Validation => json_error(StatusCode::BAD_REQUEST, err.code(), err.to_string()),
        ErrorKind::Conflict => json_error(StatusCode::CONFLICT, err.code(), err.to_string()),
        ErrorKind::NotFound => json_error(StatusCode::NOT_FOUND, err.code(), err.to_string()),
        ErrorKind::Concurrency => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "error": err.code(),
                "message": err.to_string(),
                "retryable": true,
            })),
        )
            .into_response(),
        ErrorKind::Internal => {
            tracing::error!(code = err.code(), error = %err, "internal engine failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, err.code(), err.to_string())
        }
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

/// Unwrap a JSON body, answering 400 `INVALID_BODY` when it is missing,
/// malformed or does not fit the expected shape.
pub fn read_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, axum::response::Response> {
    body.map(|Json(value)| value).map_err(|rejection| {
        json_error(StatusCode::BAD_REQUEST, "INVALID_BODY", rejection.body_text())
    })
}

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    engine_error_to_response(&EngineError::from(err))
}

/// Parse a path identifier, answering 400 `INVALID_ID` when it is not a UUID.
pub fn parse_id<T>(raw: &str) -> Result<T, axum::response::Response>
where
    T: core::str::FromStr<Err = DomainError>,
{
    raw.parse::<T>()
        .map_err(|e| json_error(StatusCode::BAD_REQUEST, e.code(), e.to_string()))
}
