//! Error handler for authed.

use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

use crate::codec::CodecError;
use crate::store::StoreError;

pub type Result<T> = std::result::Result<T, AuthError>;

/// Errors returned by [`crate::Authed`].
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid session")]
    InvalidSession,

    #[error("invalid payload")]
    InvalidPayload,

    #[error("invalid refresh token")]
    InvalidRefreshToken,

    #[error("invalid token")]
    InvalidToken,

    #[error("token expired")]
    TokenExpired,

    #[error("signing key is missing")]
    MissingSigningKey,

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("stored value is not valid UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("key is not valid hex")]
    Hex(#[from] hex::FromHexError),
}

impl AuthError {
    /// Whether the error means the presented credential must be rejected,
    /// as opposed to a fault of the server.
    pub fn is_unauthorized(&self) -> bool {
        match self {
            AuthError::InvalidSession
            | AuthError::InvalidPayload
            | AuthError::InvalidRefreshToken
            | AuthError::InvalidToken
            | AuthError::TokenExpired
            | AuthError::Store(StoreError::NotFound(_)) => true,
            AuthError::Codec(err) => !err.is_configuration(),
            _ => false,
        }
    }
}

/// Structure for detailed error responses.
#[derive(Debug, Serialize)]
pub struct ResponseError {
    r#type: Option<String>,
    title: String,
    status: u16,
    detail: String,
    instance: Option<String>,
}

impl ResponseError {
    /// Update error status code.
    pub fn status(mut self, code: StatusCode) -> Self {
        self.status = code.as_u16();
        self
    }

    /// Update `title` field.
    pub fn title(mut self, title: &str) -> Self {
        self.title = title.into();
        self
    }

    /// Add detailed error.
    pub fn details(mut self, description: &str) -> Self {
        self.detail = description.into();
        self
    }

    /// Transform [`ResponseError`] into axum [`Response`].
    pub fn into_response(
        self,
    ) -> std::result::Result<Response, axum::http::Error> {
        if let Ok(body) = serde_json::to_string(&self) {
            Response::builder()
                .status(self.status)
                .header(header::CONTENT_TYPE, "application/problem+json")
                .body(body.into())
        } else {
            Ok(internal_server_error())
        }
    }
}

impl Default for ResponseError {
    fn default() -> Self {
        Self {
            r#type: None,
            title: "Internal server error.".to_owned(),
            status: StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
            detail: String::default(),
            instance: None,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let response = if self.is_unauthorized() {
            // Never tell the client which check failed.
            tracing::debug!(error = %self, "credential rejected");
            ResponseError::default()
                .title("Missing or invalid credentials.")
                .details("the session token is invalid or has expired")
                .status(StatusCode::UNAUTHORIZED)
        } else {
            tracing::error!(error = %self, "server returned 500 status");
            ResponseError::default()
        };

        response
            .into_response()
            .unwrap_or_else(|_| internal_server_error())
    }
}

fn internal_server_error() -> Response {
    Response::builder()
        .status(StatusCode::INTERNAL_SERVER_ERROR)
        .header(header::CONTENT_TYPE, "application/problem+json")
        .body(
            serde_json::json!({
                "type": null,
                "title": "Internal server error.",
                "status": StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
                "detail": null,
                "instance": null,
            })
            .to_string()
            .into(),
        )
        .unwrap_or_else(|_| Response::new("Internal server error".into()))
}
