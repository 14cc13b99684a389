//! Parsing of `/{width}x{height}.{format}` frame requests.

use std::fmt;
use std::str::FromStr;

/// How a captured frame is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    /// One frame converted to a bitmap.
    Bmp,
    /// One frame as captured.
    Jpeg,
    /// Continuous multipart JPEG stream.
    Mjpeg,
}

impl RenderMode {
    /// URL extension for this mode.
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Bmp => "bmp",
            Self::Jpeg => "jpg",
            Self::Mjpeg => "mjpeg",
        }
    }
}

impl FromStr for RenderMode {
    type Err = RequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bmp" => Ok(Self::Bmp),
            "jpg" => Ok(Self::Jpeg),
            "mjpeg" => Ok(Self::Mjpeg),
            other => Err(RequestError::Format(other.to_owned())),
        }
    }
}

/// Rejected frame request path.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    /// Not of the form `WxH.ext`.
    #[error("malformed frame path {0:?}")]
    Malformed(String),
    /// Width or height missing, zero, or not a number.
    #[error("invalid dimension {0:?}")]
    Dimension(String),
    /// Extension is not `bmp`, `jpg` or `mjpeg`.
    #[error("unsupported format {0:?}")]
    Format(String),
}

/// A parsed frame request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameRequest {
    /// Requested width.
    pub width: u32,
    /// Requested height.
    pub height: u32,
    /// Delivery mode.
    pub mode: RenderMode,
}

impl FrameRequest {
    /// The same request at other dimensions.
    #[must_use]
    pub const fn with_dimensions(self, width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            mode: self.mode,
        }
    }

    /// Absolute URL path for this request.
    pub fn path(&self) -> String {
        format!("/{self}")
    }
}

fn parse_dimension(s: &str) -> Result<u32, RequestError> {
    match s.parse::<u32>() {
        Ok(value) if value > 0 => Ok(value),
        _ => Err(RequestError::Dimension(s.to_owned())),
    }
}

impl FromStr for FrameRequest {
    type Err = RequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (dims, ext) = s
            .rsplit_once('.')
            .ok_or_else(|| RequestError::Malformed(s.to_owned()))?;
        let (width, height) = dims
            .split_once('x')
            .ok_or_else(|| RequestError::Malformed(s.to_owned()))?;

        Ok(Self {
            width: parse_dimension(width)?,
            height: parse_dimension(height)?,
            mode: ext.parse()?,
        })
    }
}

impl fmt::Display for FrameRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}.{}", self.width, self.height, self.mode.extension())
    }
}
