use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};

use rollcall_signup::SignupError;

/// HTTP-facing error: a status code plus a machine-readable code and a
/// human-readable message.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    pub fn missing_identity() -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            code: "missing_identity",
            message: "X-Acting-User header is required".into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: "invalid_request",
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    fn body(&self) -> Value {
        json!({
            "error": {
                "code": self.code,
                "message": self.message,
            }
        })
    }
}

impl From<SignupError> for ApiError {
    fn from(error: SignupError) -> Self {
        let (status, code) = match &error {
            SignupError::AlreadyRegistered { .. } => (StatusCode::CONFLICT, "already_registered"),
            SignupError::Banned { .. } => (StatusCode::FORBIDDEN, "banned"),
            SignupError::NoSeatsAvailable { .. } => (StatusCode::CONFLICT, "no_seats_available"),
            SignupError::CategoryFull { .. } => (StatusCode::CONFLICT, "category_full"),
            SignupError::SlotOrCategoryNotFound { .. } => {
                (StatusCode::NOT_FOUND, "slot_or_category_not_found")
            }
            SignupError::SlotSelectionRequired { .. } => {
                (StatusCode::UNPROCESSABLE_ENTITY, "slot_selection_required")
            }
            SignupError::NotRegistered { .. } => (StatusCode::NOT_FOUND, "not_registered"),
            SignupError::RegistrationNotFound(_) => {
                (StatusCode::NOT_FOUND, "registration_not_found")
            }
            SignupError::EventNotFound(_) => (StatusCode::NOT_FOUND, "event_not_found"),
            SignupError::InvalidOrExpiredCredential => {
                (StatusCode::GONE, "invalid_or_expired_credential")
            }
            SignupError::NotCheckedIn(_) => (StatusCode::CONFLICT, "not_checked_in"),
            SignupError::Unauthorized { .. } => (StatusCode::FORBIDDEN, "unauthorized"),
            SignupError::Core(_) => (StatusCode::UNPROCESSABLE_ENTITY, "validation_failed"),
            SignupError::Storage(inner) => {
                tracing::error!(error = %inner, "storage failure surfaced to client");
                (StatusCode::INTERNAL_SERVER_ERROR, "storage_error")
            }
        };
        Self {
            status,
            code,
            message: error.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_mapping() {
        let err: ApiError = SignupError::no_seats("e1").into();
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert_eq!(err.body()["error"]["code"], "no_seats_available");
    }

    #[test]
    fn test_credential_mapping() {
        let err: ApiError = SignupError::InvalidOrExpiredCredential.into();
        assert_eq!(err.status(), StatusCode::GONE);
    }

    #[test]
    fn test_not_found_mapping() {
        let err: ApiError = SignupError::EventNotFound("e1".into()).into();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);

        let err: ApiError = SignupError::not_registered("e1", "v1").into();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_messages_survive_mapping() {
        let err: ApiError = SignupError::category_full("morning", "team-a").into();
        let body = err.body();
        let message = body["error"]["message"].as_str().unwrap();
        assert!(message.contains("team-a"));
        assert!(message.contains("morning"));
    }
}
