//! Encoded image container checks.
//!
//! Drivers occasionally hand back truncated MJPEG buffers, and the
//! recognition client must never upload a partial image. These helpers look
//! only at container framing (markers and headers); they do not decode.

/// JPEG start-of-image marker.
const JPEG_SOI: [u8; 2] = [0xFF, 0xD8];
/// JPEG end-of-image marker.
const JPEG_EOI: [u8; 2] = [0xFF, 0xD9];
/// Bitmap file header length (`BITMAPFILEHEADER`).
const BMP_FILE_HEADER_LEN: usize = 14;

/// Encoded image container kinds the server understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Container {
    /// JPEG / JFIF.
    Jpeg,
    /// Windows bitmap.
    Bmp,
}

/// Checks that `data` is a JPEG with both start and end markers.
///
/// Zero padding after the end marker is tolerated, since some UVC cameras
/// report the full buffer as used.
pub fn is_complete_jpeg(data: &[u8]) -> bool {
    if !data.starts_with(&JPEG_SOI) {
        return false;
    }
    let end = data.iter().rposition(|&b| b != 0).map_or(0, |pos| pos + 1);
    end >= JPEG_SOI.len() + JPEG_EOI.len() && data.get(..end).is_some_and(|d| d.ends_with(&JPEG_EOI))
}

/// Checks the `BM` magic and that the declared file size matches the buffer.
pub fn is_valid_bmp(data: &[u8]) -> bool {
    if data.len() < BMP_FILE_HEADER_LEN || !data.starts_with(b"BM") {
        return false;
    }
    let Some(size) = data.get(2..6).and_then(|s| <[u8; 4]>::try_from(s).ok()) else {
        return false;
    };
    let declared = u32::from_le_bytes(size);
    usize::try_from(declared).is_ok_and(|declared| declared == data.len())
}

/// Identify a complete encoded image, or `None` if `data` is neither a
/// complete JPEG nor a well-formed bitmap.
pub fn detect_container(data: &[u8]) -> Option<Container> {
    if is_complete_jpeg(data) {
        Some(Container::Jpeg)
    } else if is_valid_bmp(data) {
        Some(Container::Bmp)
    } else {
        None
    }
}
