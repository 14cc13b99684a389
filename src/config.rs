//! Configuration loaded from the environment (and `.env` via dotenvy).

use std::env;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::num::NonZeroU32;
use std::str::FromStr;
use std::time::Duration;

/// Google Cloud Vision annotate endpoint.
pub const DEFAULT_VISION_URL: &str = "https://vision.googleapis.com/v1/images:annotate";

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A variable is set but does not parse.
    #[error("invalid value for {var}: {value:?}")]
    Invalid {
        /// Environment variable name.
        var: &'static str,
        /// The rejected value.
        value: String,
    },
}

/// Top-level configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP listener settings.
    pub server: ServerConfig,
    /// Sensor settings.
    pub camera: CameraConfig,
    /// Text recognition; `None` serves plain MJPEG.
    pub recognition: Option<RecognitionConfig>,
    /// Wait before retrying a failed startup.
    pub startup_retry: Duration,
}

/// HTTP listener settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address.
    pub host: IpAddr,
    /// Bind port.
    pub port: u16,
}

impl ServerConfig {
    /// Socket address to bind.
    pub const fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

/// Sensor settings.
#[derive(Debug, Clone)]
pub struct CameraConfig {
    /// V4L2 device index (`/dev/videoN`).
    pub device_index: u32,
    /// Requested initial width; the nearest supported mode is used.
    pub initial_width: u32,
    /// Requested initial height.
    pub initial_height: u32,
    /// JPEG quality, 1..=100.
    pub jpeg_quality: u8,
    /// Buffers per capture stream.
    pub buffer_count: u32,
    /// Upper bound on a single dequeue.
    pub capture_timeout: Duration,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device_index: 0,
            initial_width: 1024,
            initial_height: 768,
            jpeg_quality: 80,
            buffer_count: 4,
            capture_timeout: Duration::from_secs(5),
        }
    }
}

/// External OCR service settings.
#[derive(Debug, Clone)]
pub struct RecognitionConfig {
    /// Annotate endpoint.
    pub endpoint: String,
    /// API key sent as the `key` query parameter.
    pub api_key: Option<String>,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Recognize every Nth streamed frame. 1 means every frame, which caps
    /// the stream at the service's round-trip rate.
    pub sample_every: NonZeroU32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
                port: 8080,
            },
            camera: CameraConfig::default(),
            recognition: None,
            startup_retry: Duration::from_secs(5),
        }
    }
}

impl Config {
    /// Read configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let camera_defaults = &defaults.camera;

        let jpeg_quality: u8 = parse_or("CAMERA_JPEG_QUALITY", camera_defaults.jpeg_quality)?;
        if !(1..=100).contains(&jpeg_quality) {
            return Err(ConfigError::Invalid {
                var: "CAMERA_JPEG_QUALITY",
                value: jpeg_quality.to_string(),
            });
        }

        let endpoint = env::var("VISION_API_URL").ok();
        let api_key = env::var("VISION_API_KEY").ok().filter(|key| !key.is_empty());
        let recognition = if endpoint.is_some() || api_key.is_some() {
            Some(RecognitionConfig {
                endpoint: endpoint.unwrap_or_else(|| DEFAULT_VISION_URL.to_owned()),
                api_key,
                timeout: Duration::from_secs(parse_or("VISION_TIMEOUT_SECS", 10)?),
                sample_every: parse_or("RECOGNIZE_EVERY", NonZeroU32::MIN)?,
            })
        } else {
            None
        };

        Ok(Self {
            server: ServerConfig {
                host: parse_or("SERVER_HOST", defaults.server.host)?,
                port: parse_or("SERVER_PORT", defaults.server.port)?,
            },
            camera: CameraConfig {
                device_index: parse_or("CAMERA_DEVICE", camera_defaults.device_index)?,
                initial_width: parse_or("CAMERA_WIDTH", camera_defaults.initial_width)?,
                initial_height: parse_or("CAMERA_HEIGHT", camera_defaults.initial_height)?,
                jpeg_quality,
                buffer_count: parse_or("CAMERA_BUFFERS", camera_defaults.buffer_count)?,
                capture_timeout: Duration::from_millis(parse_or("CAMERA_TIMEOUT_MS", 5000)?),
            },
            recognition,
            startup_retry: Duration::from_secs(parse_or("STARTUP_RETRY_SECS", 5)?),
        })
    }
}

fn parse_or<T: FromStr>(var: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(var) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { var, value }),
        Err(_) => Ok(default),
    }
}
