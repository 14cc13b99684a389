//! Captured images and their JPEG to bitmap conversion.

use std::io::{self, Cursor, Write};

use image::{DynamicImage, ImageFormat};

/// Encoding of a [`Frame`] buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameFormat {
    /// As produced by the sensor.
    Jpeg,
    /// Uncompressed 24-bit bitmap, converted from JPEG.
    Bmp,
}

impl FrameFormat {
    /// HTTP content type for this encoding.
    pub const fn content_type(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Bmp => "image/bmp",
        }
    }
}

/// Error converting a frame between encodings.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The JPEG payload could not be decoded.
    #[error("JPEG decode failed: {0}")]
    Decode(#[source] image::ImageError),
    /// The bitmap could not be written.
    #[error("BMP encode failed: {0}")]
    Encode(#[source] image::ImageError),
}

/// One captured, encoded image.
#[derive(Debug, Clone)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    format: FrameFormat,
    sequence: u32,
}

impl Frame {
    /// Wrap a JPEG buffer captured at `width` x `height`.
    pub const fn jpeg(data: Vec<u8>, width: u32, height: u32, sequence: u32) -> Self {
        Self {
            data,
            width,
            height,
            format: FrameFormat::Jpeg,
            sequence,
        }
    }

    /// Encoded size in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Width in pixels.
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Current encoding.
    pub const fn format(&self) -> FrameFormat {
        self.format
    }

    /// Driver sequence number of the buffer this frame came from.
    pub const fn sequence(&self) -> u32 {
        self.sequence
    }

    /// Encoded bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Give up the frame, keeping only its bytes.
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Convert to an uncompressed bitmap.
    ///
    /// Takes the frame by value: when conversion fails nothing is left to
    /// serve, so a caller can never send the stale JPEG as a bitmap.
    pub fn to_bitmap(self) -> Result<Self, FrameError> {
        if self.format == FrameFormat::Bmp {
            return Ok(self);
        }

        let decoded = image::load_from_memory_with_format(&self.data, ImageFormat::Jpeg)
            .map_err(FrameError::Decode)?;
        let rgb = DynamicImage::ImageRgb8(decoded.to_rgb8());

        let mut data = Vec::new();
        rgb.write_to(&mut Cursor::new(&mut data), ImageFormat::Bmp)
            .map_err(FrameError::Encode)?;

        Ok(Self {
            data,
            width: rgb.width(),
            height: rgb.height(),
            format: FrameFormat::Bmp,
            sequence: self.sequence,
        })
    }

    /// Write the encoded bytes to `out`.
    pub fn write_to<W: Write>(&self, out: &mut W) -> io::Result<()> {
        out.write_all(&self.data)
    }
}
