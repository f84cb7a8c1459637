use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use autoshop_core::DomainError;
use autoshop_infra::ServiceError;

pub type ApiResult<T> = Result<T, ApiError>;

/// Anything a handler can fail with.
#[derive(Debug)]
pub enum ApiError {
    Service(ServiceError),
    /// Malformed path or query input caught before reaching a service.
    BadRequest(String),
}

impl From<ServiceError> for ApiError {
    fn from(value: ServiceError) -> Self {
        ApiError::Service(value)
    }
}

impl From<DomainError> for ApiError {
    fn from(value: DomainError) -> Self {
        ApiError::Service(value.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Service(e) => service_error_to_response(e),
            ApiError::BadRequest(msg) => json_error(StatusCode::BAD_REQUEST, "invalid_input", msg),
        }
    }
}

pub fn status_for(err: &ServiceError) -> StatusCode {
    match err {
        ServiceError::Domain(DomainError::NotFound(_)) => StatusCode::NOT_FOUND,
        ServiceError::Domain(DomainError::Conflict(_)) => StatusCode::CONFLICT,
        ServiceError::Domain(DomainError::InvalidInput(_)) => StatusCode::BAD_REQUEST,
        ServiceError::Domain(DomainError::PreconditionFailed(_)) => StatusCode::UNPROCESSABLE_ENTITY,
        ServiceError::Domain(DomainError::Unauthorized(_)) => StatusCode::FORBIDDEN,
        ServiceError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub fn service_error_to_response(err: ServiceError) -> Response {
    let status = status_for(&err);
    match &err {
        ServiceError::Store(msg) => {
            tracing::error!(error = %msg, "storage failure");
            // Backend detail stays in the log.
            json_error(status, err.code(), "internal error")
        }
        ServiceError::Domain(e) => {
            tracing::debug!(code = e.code(), error = %e, "request rejected");
            json_error(status, err.code(), e.to_string())
        }
    }
}

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_errors_map_to_distinct_statuses() {
        let cases = [
            (DomainError::not_found("order"), StatusCode::NOT_FOUND),
            (DomainError::conflict("order already invoiced"), StatusCode::CONFLICT),
            (DomainError::invalid("bad state"), StatusCode::BAD_REQUEST),
            (DomainError::precondition("order is completed"), StatusCode::UNPROCESSABLE_ENTITY),
            (DomainError::unauthorized("missing permission"), StatusCode::FORBIDDEN),
        ];
        for (err, status) in cases {
            assert_eq!(status_for(&ServiceError::Domain(err)), status);
        }
        assert_eq!(
            status_for(&ServiceError::Store("pool timed out".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn bad_request_is_json() {
        let res = ApiError::BadRequest("invalid order id".into()).into_response();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            res.headers()[axum::http::header::CONTENT_TYPE],
            "application/json"
        );
    }
}
