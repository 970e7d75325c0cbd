use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Every request terminates in exactly one of these; nothing is retried
/// internally. Store failures surface as `Internal` with a generic body.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid or missing credentials")]
    Unauthorized,

    #[error("not allowed to act on this object")]
    Forbidden,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    InvalidStateTransition(&'static str),

    #[error("already linked with a partner")]
    AlreadyPaired,

    #[error("partner not found with this code")]
    PartnerNotFound,

    #[error("not enough tokens")]
    InsufficientTokens,

    #[error("reward already redeemed")]
    AlreadyRedeemed,

    #[error("task has expired")]
    Expired,

    #[error("must be linked with a partner")]
    NotPaired,

    #[error("{0}")]
    BadRequest(&'static str),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound(_) | Self::PartnerNotFound => StatusCode::NOT_FOUND,
            Self::InvalidStateTransition(_) | Self::AlreadyPaired | Self::AlreadyRedeemed => {
                StatusCode::CONFLICT
            }
            Self::InsufficientTokens | Self::Expired | Self::NotPaired | Self::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::Unauthorized => "unauthorized",
            Self::Forbidden => "forbidden",
            Self::NotFound(_) => "not_found",
            Self::InvalidStateTransition(_) => "invalid_state_transition",
            Self::AlreadyPaired => "already_paired",
            Self::PartnerNotFound => "partner_not_found",
            Self::InsufficientTokens => "insufficient_tokens",
            Self::AlreadyRedeemed => "already_redeemed",
            Self::Expired => "expired",
            Self::NotPaired => "not_paired",
            Self::BadRequest(_) => "bad_request",
            Self::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let detail = match &self {
            Self::Internal(e) => {
                error!("internal error: {:#}", e);
                "internal server error".to_string()
            }
            other => other.to_string(),
        };

        (
            self.status(),
            Json(json!({ "error": self.code(), "detail": detail })),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(ApiError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::Forbidden.status(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::PartnerNotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::AlreadyPaired.status(), StatusCode::CONFLICT);
        assert_eq!(ApiError::AlreadyRedeemed.status(), StatusCode::CONFLICT);
        assert_eq!(ApiError::Expired.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::InvalidStateTransition("task is not pending").status(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn internal_detail_is_masked() {
        let err = ApiError::Internal(anyhow::anyhow!("sqlite: disk I/O error at /secret/path"));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
