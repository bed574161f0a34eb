//! HTTP mapping for core errors. Bodies are always `{"error": "<message>"}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use eitxt_core::{EitxtError, EnvelopeError, ErrorKind};

#[derive(Debug)]
pub struct ApiError(pub EitxtError);

impl From<EitxtError> for ApiError {
    fn from(e: EitxtError) -> Self {
        ApiError(e)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            EitxtError::Envelope(EnvelopeError::UnsupportedCipher | EnvelopeError::UnsupportedKdf)
            | EitxtError::UnsupportedMedia(_) => StatusCode::UNPROCESSABLE_ENTITY,
            other => match other.kind() {
                ErrorKind::InvalidInput | ErrorKind::MalformedEnvelope | ErrorKind::Integrity => {
                    StatusCode::BAD_REQUEST
                }
                ErrorKind::ResourceLimit => StatusCode::PAYLOAD_TOO_LARGE,
                ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self.0.kind() {
            ErrorKind::Internal => tracing::error!(error = %self.0, "request failed"),
            ErrorKind::Integrity => tracing::debug!("request rejected: integrity failure"),
            _ => tracing::debug!(error = %self.0, status = status.as_u16(), "request rejected"),
        }
        (status, Json(json!({ "error": self.0.public_message() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(e: impl Into<EitxtError>) -> StatusCode {
        ApiError(e.into()).status()
    }

    #[test]
    fn status_table() {
        assert_eq!(status_of(EitxtError::InvalidInput("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(status_of(EnvelopeError::MissingArmor), StatusCode::BAD_REQUEST);
        assert_eq!(status_of(EnvelopeError::BadMagic), StatusCode::BAD_REQUEST);
        assert_eq!(status_of(EnvelopeError::UnsupportedVersion), StatusCode::BAD_REQUEST);
        assert_eq!(status_of(EnvelopeError::Undecodable), StatusCode::BAD_REQUEST);
        assert_eq!(status_of(EnvelopeError::BadSequence), StatusCode::BAD_REQUEST);
        assert_eq!(status_of(EnvelopeError::UnsupportedCipher), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(status_of(EnvelopeError::UnsupportedKdf), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            status_of(EitxtError::UnsupportedMedia("text/html".into())),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(status_of(EitxtError::Integrity), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_of(EitxtError::TooLarge { limit: 1, actual: 2 }),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            status_of(EitxtError::Other(anyhow::anyhow!("boom"))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn internal_details_are_not_exposed() {
        let response = ApiError(EitxtError::Other(anyhow::anyhow!("disk on fire"))).into_response();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], br#"{"error":"internal server error"}"#);
    }
}
