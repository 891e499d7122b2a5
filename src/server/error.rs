//! Error responses

use axum::{
    extract::rejection::PathRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::error::FederatedError;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error(transparent)]
    Federation(#[from] FederatedError),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<PathRejection> for ServerError {
    fn from(rejection: PathRejection) -> Self {
        ServerError::BadRequest(rejection.body_text())
    }
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::Federation(e) => match e {
                FederatedError::Configuration(_) | FederatedError::Encoding(_) => {
                    StatusCode::BAD_REQUEST
                }
                FederatedError::State(_) | FederatedError::IncompatibleEnsembles { .. } => {
                    StatusCode::CONFLICT
                }
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            ServerError::Federation(e) => e.kind(),
            ServerError::BadRequest(_) => "bad_request",
            ServerError::Internal(_) => "internal_error",
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::warn!(error = %self, "Request rejected");
        }

        let body = Json(json!({
            "success": false,
            "error": self.to_string(),
            "kind": self.kind(),
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (FederatedError::Configuration("x".into()), StatusCode::BAD_REQUEST),
            (FederatedError::Encoding("x".into()), StatusCode::BAD_REQUEST),
            (FederatedError::State("x".into()), StatusCode::CONFLICT),
            (
                FederatedError::IncompatibleEnsembles { expected: 2, found: 1, hospital: 3 },
                StatusCode::CONFLICT,
            ),
            (FederatedError::Storage("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (FederatedError::Training("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, expected) in cases {
            assert_eq!(ServerError::from(err).status(), expected);
        }
        assert_eq!(ServerError::BadRequest("x".into()).status(), StatusCode::BAD_REQUEST);
    }
}
