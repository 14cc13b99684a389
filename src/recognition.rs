//! Text recognition through an external OCR service.
//!
//! The production client speaks the Google Cloud Vision `images:annotate`
//! protocol: the image is base64 encoded into a JSON request asking for
//! `TEXT_DETECTION`, and the full text is read back from
//! `responses[0].fullTextAnnotation.text`.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::config::RecognitionConfig;
use crate::validation::detect_container;

/// Text recognition errors.
#[derive(Debug, thiserror::Error)]
pub enum RecognitionError {
    /// Input is not a complete encoded image.
    #[error("input is not a complete image ({0} bytes)")]
    InvalidImage(usize),
    /// Network failure, timeout, or HTTP error status.
    #[error("OCR request failed: {0}")]
    Transport(#[from] reqwest::Error),
    /// Response body was not the expected JSON.
    #[error("OCR response malformed: {0}")]
    Parse(String),
    /// The service reported an error for this image.
    #[error("OCR service error {code}: {message}")]
    Service {
        /// Status code from the service.
        code: i32,
        /// Message from the service.
        message: String,
    },
}

/// Something that turns an encoded image into text.
#[async_trait]
pub trait TextRecognizer: Send + Sync {
    /// Recognize all text in `image`. An image without text yields an empty string.
    async fn recognize(&self, image: &[u8]) -> Result<String, RecognitionError>;
}

#[derive(Serialize)]
struct AnnotateRequest {
    requests: [ImageRequest; 1],
}

#[derive(Serialize)]
struct ImageRequest {
    image: ImageContent,
    features: [Feature; 1],
}

#[derive(Serialize)]
struct ImageContent {
    content: String,
}

#[derive(Serialize)]
struct Feature {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct AnnotateResponse {
    #[serde(default)]
    responses: Vec<ImageResponse>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImageResponse {
    full_text_annotation: Option<TextAnnotation>,
    error: Option<ServiceStatus>,
}

#[derive(Deserialize)]
struct TextAnnotation {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct ServiceStatus {
    #[serde(default)]
    code: i32,
    #[serde(default)]
    message: String,
}

/// Annotate request asking for `TEXT_DETECTION` on one image.
fn annotate_request(image: &[u8]) -> AnnotateRequest {
    AnnotateRequest {
        requests: [ImageRequest {
            image: ImageContent {
                content: STANDARD.encode(image),
            },
            features: [Feature {
                kind: "TEXT_DETECTION",
            }],
        }],
    }
}

/// Extract the recognized text from an annotate response body.
pub fn parse_annotate_response(body: &str) -> Result<String, RecognitionError> {
    let response: AnnotateResponse =
        serde_json::from_str(body).map_err(|err| RecognitionError::Parse(err.to_string()))?;
    let first = response
        .responses
        .into_iter()
        .next()
        .ok_or_else(|| RecognitionError::Parse("empty responses array".to_owned()))?;

    if let Some(status) = first.error {
        return Err(RecognitionError::Service {
            code: status.code,
            message: status.message,
        });
    }
    Ok(first
        .full_text_annotation
        .map(|annotation| annotation.text)
        .unwrap_or_default())
}

/// Google Cloud Vision client.
pub struct VisionClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl VisionClient {
    /// Build a client with the configured endpoint and timeout.
    pub fn new(config: &RecognitionConfig) -> Result<Self, RecognitionError> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl TextRecognizer for VisionClient {
    async fn recognize(&self, image: &[u8]) -> Result<String, RecognitionError> {
        if detect_container(image).is_none() {
            return Err(RecognitionError::InvalidImage(image.len()));
        }

        let mut request = self
            .client
            .post(&self.endpoint)
            .json(&annotate_request(image));
        if let Some(key) = &self.api_key {
            request = request.query(&[("key", key)]);
        }

        let body = request.send().await?.error_for_status()?.text().await?;
        parse_annotate_response(&body)
    }
}
