//! Pi-Cam-Server: an HTTP front end for a V4L2 camera
//!
//! Serves still frames (JPEG or BMP), a multipart MJPEG stream, and the text
//! an external OCR service last recognized in the stream. The camera sits
//! behind trait-based abstractions, so the whole pipeline can be exercised
//! with a mock device instead of real hardware.

pub mod config;
pub mod device;
pub mod error;
pub mod frame;
pub mod recognition;
pub mod request;
pub mod resolution;
pub mod server;
pub mod session;
pub mod streaming;
pub mod text_cache;
pub mod traits;
pub mod validation;

#[cfg(test)]
pub mod mock;

pub use config::Config;
pub use device::V4L2Device;
pub use frame::{Frame, FrameFormat};
pub use recognition::{TextRecognizer, VisionClient};
pub use resolution::{Resolution, ResolutionCatalog};
pub use server::{router, AppState, RecognitionMode};
pub use session::CameraSession;
pub use text_cache::RecognizedText;
pub use traits::{CameraDevice, CaptureStream, DeviceCapabilities, Format, FourCC, RawFrame};
