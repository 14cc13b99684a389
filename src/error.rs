//! HTTP-facing error type.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::frame::FrameError;
use crate::traits::CameraError;

/// Handler result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Errors a request handler can end with.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Malformed dimensions or unknown format.
    #[error("not found")]
    NotFound,

    /// The catalog has nothing to offer for the request.
    #[error("non-existent resolution")]
    UnknownResolution,

    /// The sensor did not deliver a frame.
    #[error("still capture error: {0}")]
    Capture(#[from] CameraError),

    /// JPEG to BMP conversion failed.
    #[error("convert to BMP error: {0}")]
    Conversion(#[from] FrameError),

    /// A worker task died.
    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            Self::NotFound => return StatusCode::NOT_FOUND.into_response(),
            Self::UnknownResolution => (StatusCode::NOT_FOUND, "non-existent resolution\n"),
            Self::Capture(err) => {
                tracing::warn!("capture failure: {err}");
                (StatusCode::INTERNAL_SERVER_ERROR, "still capture error\n")
            }
            Self::Conversion(err) => {
                tracing::warn!("toBitmap failure: {err}");
                (StatusCode::INTERNAL_SERVER_ERROR, "convert to BMP error\n")
            }
            Self::Internal(msg) => {
                tracing::error!("Internal error: {msg}");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error\n")
            }
        };

        (status, [(header::CONTENT_TYPE, "text/plain")], body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn render(err: AppError) -> (StatusCode, String) {
        let response = err.into_response();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        (status, String::from_utf8(body.to_vec()).expect("utf-8"))
    }

    #[tokio::test]
    async fn test_status_mapping() {
        assert_eq!(render(AppError::NotFound).await, (StatusCode::NOT_FOUND, String::new()));
        assert_eq!(
            render(AppError::UnknownResolution).await,
            (StatusCode::NOT_FOUND, "non-existent resolution\n".to_owned())
        );
        assert_eq!(
            render(AppError::Capture(CameraError::Timeout)).await,
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "still capture error\n".to_owned()
            )
        );
        assert_eq!(
            render(AppError::Internal("join".to_owned())).await.0,
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
