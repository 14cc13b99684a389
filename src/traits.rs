//! Core traits and types for the V4L2 camera abstraction.

/// Pixel format representation (e.g., MJPG, JPEG).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FourCC(pub [u8; 4]);

impl FourCC {
    /// Create a new `FourCC` from a 4-byte array.
    #[must_use]
    pub const fn new(code: &[u8; 4]) -> Self {
        Self(*code)
    }

    /// Motion JPEG: every buffer is a self-contained JPEG image.
    pub const MJPG: Self = Self::new(b"MJPG");
    /// Still JPEG, reported by some drivers instead of `MJPG`.
    pub const JPEG: Self = Self::new(b"JPEG");

    /// Whether buffers in this format are JPEG encoded.
    #[must_use]
    pub fn is_jpeg(self) -> bool {
        self == Self::MJPG || self == Self::JPEG
    }
}

impl From<v4l::FourCC> for FourCC {
    fn from(fourcc: v4l::FourCC) -> Self {
        Self(fourcc.repr)
    }
}

impl From<FourCC> for v4l::FourCC {
    fn from(fourcc: FourCC) -> Self {
        Self::new(&fourcc.0)
    }
}

/// Capture mode: frame size plus pixel format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Format {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Pixel format.
    pub fourcc: FourCC,
}

impl Format {
    /// Capture mode of `width` x `height` in `fourcc`.
    #[must_use]
    pub const fn new(width: u32, height: u32, fourcc: FourCC) -> Self {
        Self {
            width,
            height,
            fourcc,
        }
    }

    /// Width and height as a pair.
    #[must_use]
    pub const fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Device capability flags.
#[derive(Debug, Clone, Default)]
pub struct DeviceCapabilities {
    /// Driver name.
    pub driver: String,
    /// Card/device name.
    pub card: String,
    /// Bus information.
    pub bus_info: String,
    /// Whether the device can capture video.
    pub can_capture: bool,
    /// Whether the device supports streaming.
    pub can_stream: bool,
}

/// A buffer dequeued from the driver, before any validation.
#[derive(Debug, Clone)]
pub struct RawFrame {
    /// Encoded frame data, trimmed to the bytes the driver filled.
    pub data: Vec<u8>,
    /// Driver sequence number.
    pub sequence: u32,
}

/// Error type for camera operations.
#[derive(Debug, thiserror::Error)]
pub enum CameraError {
    /// Device with given index was not found.
    #[error("Device {0} not found")]
    DeviceNotFound(u32),
    /// Failed to open device.
    #[error("Failed to open device: {0}")]
    DeviceOpenFailed(String),
    /// Device lacks a capability the server needs.
    #[error("Device cannot be used: {0}")]
    Unsupported(String),
    /// Requested format is not supported.
    #[error("Format not supported: {0:?}")]
    FormatNotSupported(Format),
    /// Driver control could not be applied.
    #[error("Control error: {0}")]
    Control(String),
    /// Error during streaming operation.
    #[error("Stream error: {0}")]
    StreamError(String),
    /// Driver returned a buffer that is not a complete JPEG.
    #[error("Corrupt frame {sequence}: {len} bytes")]
    CorruptFrame {
        /// Sequence number of the rejected buffer.
        sequence: u32,
        /// Number of bytes received.
        len: usize,
    },
    /// No buffer arrived within the dequeue timeout.
    #[error("Operation timed out")]
    Timeout,
}

/// Result type for camera operations.
pub type Result<T> = std::result::Result<T, CameraError>;

/// Abstraction over camera device operations.
pub trait CameraDevice {
    /// The stream type returned by `create_stream`.
    type Stream<'a>: CaptureStream
    where
        Self: 'a;

    /// Get device capabilities.
    fn capabilities(&self) -> &DeviceCapabilities;

    /// Get current format.
    fn format(&self) -> Result<Format>;

    /// Set capture format. Returns the actual format set by the driver.
    fn set_format(&mut self, format: &Format) -> Result<Format>;

    /// List the frame sizes the device can produce in `fourcc`.
    fn frame_sizes(&self, fourcc: FourCC) -> Result<Vec<(u32, u32)>>;

    /// Set the JPEG compression quality (1..=100).
    fn set_jpeg_quality(&mut self, quality: u8) -> Result<()>;

    /// Create a capture stream with the specified number of buffers.
    fn create_stream(&mut self, buffer_count: u32) -> Result<Self::Stream<'_>>;
}

/// Abstraction over capture stream operations.
pub trait CaptureStream {
    /// Capture the next frame from the stream.
    fn next_frame(&mut self) -> Result<RawFrame>;
}
