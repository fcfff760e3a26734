//! `IdentityError` → HTTP response mapping

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::error;

use super::ApiResponse;
use crate::domain::IdentityError;

/// Handler error wrapper; lets handlers use `?` on service calls.
#[derive(Debug)]
pub struct ApiError(pub IdentityError);

impl From<IdentityError> for ApiError {
    fn from(e: IdentityError) -> Self {
        Self(e)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            IdentityError::ValidationFailed(_) | IdentityError::PasswordMismatch => {
                StatusCode::BAD_REQUEST
            }
            IdentityError::AlreadyRegistered(_) => StatusCode::CONFLICT,
            IdentityError::UserNotFound | IdentityError::InvalidCredentials => {
                StatusCode::UNAUTHORIZED
            }
            IdentityError::NotFound { .. } => StatusCode::NOT_FOUND,
            IdentityError::SignInFailure(_) | IdentityError::Infra(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Internal details go to the log, not to the client
        let message = if self.0.is_internal() {
            error!(error = %self.0, "Request failed with internal error");
            "Internal server error".to_string()
        } else {
            self.0.to_string()
        };

        (status, Json(ApiResponse::<()>::error(message))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::support::InfraError;

    fn status_of(e: IdentityError) -> StatusCode {
        ApiError(e).status()
    }

    #[test]
    fn business_errors_map_to_client_statuses() {
        assert_eq!(status_of(IdentityError::PasswordMismatch), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_of(IdentityError::ValidationFailed("x".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(IdentityError::AlreadyRegistered("x".into())),
            StatusCode::CONFLICT
        );
        assert_eq!(status_of(IdentityError::UserNotFound), StatusCode::UNAUTHORIZED);
        assert_eq!(status_of(IdentityError::InvalidCredentials), StatusCode::UNAUTHORIZED);
        assert_eq!(status_of(IdentityError::user_not_found("1")), StatusCode::NOT_FOUND);
    }

    #[test]
    fn internal_errors_are_server_faults() {
        assert_eq!(
            status_of(IdentityError::SignInFailure("x".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_of(IdentityError::Infra(InfraError::Storage("down".into()))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
