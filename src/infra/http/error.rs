use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::application::catalog::CatalogError;
use crate::application::error::ErrorReport;

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: ApiErrorMessage,
}

pub mod codes {
    pub const VALIDATION: &str = "validation_error";
    pub const MALFORMED: &str = "malformed_request";
    pub const NOT_FOUND: &str = "not_found";
    pub const CONFLICT: &str = "conflict";
    pub const UNAVAILABLE: &str = "unavailable";
    pub const INTERNAL: &str = "internal_error";
    pub const CANCELED: &str = "canceled";
}

/// nginx's "client closed request"; used when the server abandons work on shutdown.
const CANCELED_STATUS: u16 = 499;

#[derive(Debug, Serialize)]
pub struct ApiErrorMessage {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: &'static str,
    hint: Option<String>,
    report: Option<ErrorReport>,
}

impl ApiError {
    pub fn new(
        status: StatusCode,
        code: &'static str,
        message: &'static str,
        hint: Option<String>,
    ) -> Self {
        Self {
            status,
            code,
            message,
            hint,
            report: None,
        }
    }

    pub fn not_found(message: &'static str) -> Self {
        Self::new(StatusCode::NOT_FOUND, codes::NOT_FOUND, message, None)
    }

    /// Request that could not be decoded at all, before any validation ran.
    pub fn malformed(status: StatusCode, message: &'static str, detail: String) -> Self {
        Self::new(status, codes::MALFORMED, message, Some(detail))
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    fn with_report(mut self, report: ErrorReport) -> Self {
        self.report = Some(report);
        self
    }
}

impl From<CatalogError> for ApiError {
    fn from(err: CatalogError) -> Self {
        const SOURCE: &str = "infra::http::catalog_error";
        let api = match &err {
            CatalogError::Validation { field, message } => Self::new(
                StatusCode::BAD_REQUEST,
                codes::VALIDATION,
                "Request failed validation",
                Some(format!("{field}: {message}")),
            ),
            CatalogError::NotFound(_) => Self::not_found("Product not found"),
            CatalogError::Conflict { sku } => Self::new(
                StatusCode::CONFLICT,
                codes::CONFLICT,
                "SKU already in use",
                Some(format!("SKU `{sku}` belongs to another product")),
            ),
            CatalogError::Unavailable(_) => Self::new(
                StatusCode::SERVICE_UNAVAILABLE,
                codes::UNAVAILABLE,
                "Catalog temporarily unavailable",
                err.is_retryable()
                    .then(|| "Retry the request shortly".to_string()),
            ),
            CatalogError::Internal(_) => Self::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                codes::INTERNAL,
                "Unexpected error occurred",
                None,
            ),
            CatalogError::Canceled => Self::new(
                StatusCode::from_u16(CANCELED_STATUS).unwrap_or(StatusCode::SERVICE_UNAVAILABLE),
                codes::CANCELED,
                "Request canceled",
                None,
            ),
        };
        let report = ErrorReport::from_error(SOURCE, api.status, &err);
        api.with_report(report)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let report = self.report.unwrap_or_else(|| {
            ErrorReport::from_message(
                "infra::http::api",
                self.status,
                format!(
                    "{}: {}",
                    self.code,
                    self.hint.as_deref().unwrap_or(self.message)
                ),
            )
        });
        let body = ApiErrorBody {
            error: ApiErrorMessage {
                code: self.code.to_string(),
                message: self.message.to_string(),
                hint: self.hint,
            },
        };
        let mut response = (self.status, Json(body)).into_response();
        report.attach(&mut response);
        response
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::application::repos::RepoError;

    #[test]
    fn catalog_errors_map_to_distinct_statuses() {
        let cases = [
            (
                CatalogError::Validation {
                    field: "sku",
                    message: "must not be empty".into(),
                },
                StatusCode::BAD_REQUEST,
            ),
            (CatalogError::NotFound(Uuid::nil()), StatusCode::NOT_FOUND),
            (
                CatalogError::Conflict { sku: "A".into() },
                StatusCode::CONFLICT,
            ),
            (
                CatalogError::Unavailable(RepoError::Timeout),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
        assert_eq!(ApiError::from(CatalogError::Canceled).status().as_u16(), 499);
    }
}
