use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::billing::error::BillingError;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Clone, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    UnprocessableEntity(String),
    #[error("{0}")]
    Dependency(String),
    #[error("{0}")]
    Internal(String),
}

impl AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::UnprocessableEntity(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Dependency(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let detail = self.to_string();
        if status.is_server_error() {
            tracing::error!(%status, %detail, "Request failed");
        }
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

impl From<BillingError> for AppError {
    fn from(error: BillingError) -> Self {
        let detail = error.to_string();
        match error {
            BillingError::Validation(_) => Self::BadRequest(detail),
            BillingError::LeaseNotFound(_) | BillingError::OrganizationNotFound(_) => {
                Self::NotFound(detail)
            }
            BillingError::CrossOrganization { .. } => Self::Forbidden(detail),
            BillingError::InactiveLease { .. }
            | BillingError::LeaseNotActiveForPeriod { .. } => Self::UnprocessableEntity(detail),
            BillingError::DuplicateInvoice { .. } => Self::Conflict(detail),
            BillingError::Store(_) => Self::Dependency(detail),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn billing_errors_map_to_http_kinds() {
        let duplicate = BillingError::DuplicateInvoice {
            lease_id: "lease-1".to_string(),
            period_start: chrono::NaiveDate::from_ymd_opt(2024, 4, 1).expect("valid date"),
            period_end: chrono::NaiveDate::from_ymd_opt(2024, 4, 30).expect("valid date"),
        };
        assert!(matches!(AppError::from(duplicate), AppError::Conflict(_)));

        let missing = BillingError::LeaseNotFound("lease-1".to_string());
        assert!(matches!(AppError::from(missing), AppError::NotFound(_)));

        let cross_org = BillingError::CrossOrganization {
            lease_id: "lease-1".to_string(),
        };
        assert!(matches!(AppError::from(cross_org), AppError::Forbidden(_)));
    }
}
