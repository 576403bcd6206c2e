use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use eveboard_app::AppError;
use eveboard_core::sde::SdeError;
use eveboard_esi::EsiError;
use log::error;
use serde::Serialize;

/// Failure returned by a handler, rendered as `{"error", "message"}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    App(#[from] AppError),

    #[error("{0}")]
    BadRequest(String),
}

impl From<EsiError> for ApiError {
    fn from(err: EsiError) -> Self {
        Self::App(AppError::Esi(err))
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            Self::App(AppError::JobNotFound(_)) => (StatusCode::NOT_FOUND, "job_not_found"),
            Self::App(AppError::Sde(SdeError::TypeNotFound(_))) => {
                (StatusCode::NOT_FOUND, "type_not_found")
            }
            Self::App(AppError::Sde(SdeError::GroupNotFound(_))) => {
                (StatusCode::NOT_FOUND, "group_not_found")
            }
            Self::App(AppError::Esi(err)) => match err {
                EsiError::TokenNotFound(_) => (StatusCode::NOT_FOUND, "token_not_found"),
                EsiError::TokenInvalid { .. } | EsiError::MissingRefreshToken => {
                    (StatusCode::UNAUTHORIZED, "token_invalid")
                }
                EsiError::RateLimited { .. } | EsiError::UpstreamUnavailable { .. } => {
                    (StatusCode::SERVICE_UNAVAILABLE, "upstream_unavailable")
                }
                EsiError::UnknownLoginState(_) => (StatusCode::BAD_REQUEST, "invalid_login_state"),
                EsiError::MissingRequiredScopes { .. } => {
                    (StatusCode::BAD_REQUEST, "missing_required_scopes")
                }
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
            },
            Self::App(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let message = if status.is_server_error() && status != StatusCode::SERVICE_UNAVAILABLE {
            match &self {
                Self::App(AppError::Esi(err)) => error!("request failed: {}", err.display_chain()),
                other => error!("request failed: {other}"),
            }
            "internal server error".to_owned()
        } else {
            self.to_string()
        };

        (
            status,
            Json(ErrorBody {
                error: code,
                message,
            }),
        )
            .into_response()
    }
}
