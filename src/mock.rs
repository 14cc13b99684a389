//! Mock device implementation for testing without hardware.

use image::codecs::jpeg::JpegEncoder;
use image::{Rgb, RgbImage};

use crate::traits::{
    CameraDevice, CameraError, CaptureStream, DeviceCapabilities, Format, FourCC, RawFrame, Result,
};

/// Mock device for testing without hardware.
pub struct MockDevice {
    capabilities: DeviceCapabilities,
    format: Format,
    frame_sizes: Vec<(u32, u32)>,
    rejected_sizes: Vec<(u32, u32)>,
    substitutions: Vec<((u32, u32), (u32, u32))>,
    format_fail_after: Option<u32>,
    jpeg_quality: Option<u8>,
    quality_supported: bool,
    fail_after: Option<u32>,
    corrupt: bool,
    truncate: bool,
    frame_count: u32,
    set_format_calls: u32,
}

impl Default for MockDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDevice {
    /// Create a new mock device with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self {
            capabilities: DeviceCapabilities {
                driver: "mock".to_owned(),
                card: "Mock Camera".to_owned(),
                bus_info: "mock:0".to_owned(),
                can_capture: true,
                can_stream: true,
            },
            format: Format::new(640, 480, FourCC::MJPG),
            frame_sizes: vec![(320, 240), (640, 480), (1024, 768)],
            rejected_sizes: Vec::new(),
            substitutions: Vec::new(),
            format_fail_after: None,
            jpeg_quality: None,
            quality_supported: true,
            fail_after: None,
            corrupt: false,
            truncate: false,
            frame_count: 0,
            set_format_calls: 0,
        }
    }

    /// Replace the advertised frame sizes.
    #[must_use]
    pub fn with_frame_sizes(mut self, sizes: &[(u32, u32)]) -> Self {
        self.frame_sizes = sizes.to_vec();
        self
    }

    /// Make `set_format` fail for the given size.
    #[must_use]
    pub fn rejecting(mut self, size: (u32, u32)) -> Self {
        self.rejected_sizes.push(size);
        self
    }

    /// Answer a `set_format` for `requested` by switching to `actual`,
    /// the way drivers round unsupported sizes.
    #[must_use]
    pub fn substituting(mut self, requested: (u32, u32), actual: (u32, u32)) -> Self {
        self.substitutions.push((requested, actual));
        self
    }

    /// Fail every `set_format` after the first `calls` calls.
    #[must_use]
    pub const fn failing_format_after(mut self, calls: u32) -> Self {
        self.format_fail_after = Some(calls);
        self
    }

    /// Fail every capture once `frames` frames have been produced.
    #[must_use]
    pub const fn failing_after(mut self, frames: u32) -> Self {
        self.fail_after = Some(frames);
        self
    }

    /// Produce JPEG-framed buffers whose payload cannot be decoded.
    #[must_use]
    pub const fn with_corrupt_frames(mut self) -> Self {
        self.corrupt = true;
        self
    }

    /// Produce buffers cut off before the end-of-image marker.
    #[must_use]
    pub const fn with_truncated_frames(mut self) -> Self {
        self.truncate = true;
        self
    }

    /// Report the JPEG quality control as unsupported.
    #[must_use]
    pub const fn without_quality_control(mut self) -> Self {
        self.quality_supported = false;
        self
    }

    /// Set the capabilities for this mock device.
    #[must_use]
    pub fn with_capabilities(mut self, capabilities: DeviceCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Last JPEG quality applied.
    pub const fn jpeg_quality(&self) -> Option<u8> {
        self.jpeg_quality
    }

    /// Number of `set_format` calls seen so far.
    pub const fn set_format_calls(&self) -> u32 {
        self.set_format_calls
    }
}

impl CameraDevice for MockDevice {
    type Stream<'a> = MockStream<'a>;

    fn capabilities(&self) -> &DeviceCapabilities {
        &self.capabilities
    }

    fn format(&self) -> Result<Format> {
        Ok(self.format.clone())
    }

    fn set_format(&mut self, format: &Format) -> Result<Format> {
        self.set_format_calls += 1;
        let size = format.dimensions();
        let exhausted = self
            .format_fail_after
            .is_some_and(|limit| self.set_format_calls > limit);
        if exhausted || self.rejected_sizes.contains(&size) || !self.frame_sizes.contains(&size) {
            return Err(CameraError::FormatNotSupported(format.clone()));
        }

        let (width, height) = self
            .substitutions
            .iter()
            .find(|(requested, _)| *requested == size)
            .map_or(size, |&(_, actual)| actual);
        self.format = Format::new(width, height, format.fourcc);
        Ok(self.format.clone())
    }

    fn frame_sizes(&self, fourcc: FourCC) -> Result<Vec<(u32, u32)>> {
        if fourcc.is_jpeg() {
            Ok(self.frame_sizes.clone())
        } else {
            Ok(Vec::new())
        }
    }

    fn set_jpeg_quality(&mut self, quality: u8) -> Result<()> {
        if !self.quality_supported {
            return Err(CameraError::Control("JPEG quality not supported".to_owned()));
        }
        self.jpeg_quality = Some(quality);
        Ok(())
    }

    fn create_stream(&mut self, _buffer_count: u32) -> Result<Self::Stream<'_>> {
        Ok(MockStream {
            device: self,
            pattern: TestPattern::ColorBars,
        })
    }
}

/// Test pattern types for mock frame generation.
#[derive(Debug, Clone, Copy)]
pub enum TestPattern {
    /// SMPTE color bars pattern.
    ColorBars,
    /// Horizontal gradient from dark to light.
    Gradient,
    /// Solid color with specified R, G, B values.
    Solid(u8, u8, u8),
}

/// Mock capture stream for testing.
pub struct MockStream<'a> {
    device: &'a mut MockDevice,
    pattern: TestPattern,
}

impl MockStream<'_> {
    /// Set the test pattern for frame generation.
    #[must_use]
    pub const fn with_pattern(mut self, pattern: TestPattern) -> Self {
        self.pattern = pattern;
        self
    }
}

impl CaptureStream for MockStream<'_> {
    fn next_frame(&mut self) -> Result<RawFrame> {
        let seq = self.device.frame_count;
        if self.device.fail_after.is_some_and(|limit| seq >= limit) {
            return Err(CameraError::Timeout);
        }

        let format = &self.device.format;
        let mut data = if self.device.corrupt {
            let mut data = vec![0xFF, 0xD8];
            data.extend(std::iter::repeat(0x5A).take(256));
            data.extend_from_slice(&[0xFF, 0xD9]);
            data
        } else {
            encode_test_jpeg(format.width, format.height, self.pattern)
        };
        if self.device.truncate {
            data.truncate(data.len() / 2);
        }

        self.device.frame_count += 1;
        Ok(RawFrame {
            data,
            sequence: seq,
        })
    }
}

/// Generate a JPEG-encoded test frame.
pub fn encode_test_jpeg(width: u32, height: u32, pattern: TestPattern) -> Vec<u8> {
    let image = generate_test_image(width, height, pattern);
    let mut data = Vec::new();
    JpegEncoder::new_with_quality(&mut data, 80)
        .encode_image(&image)
        .expect("JPEG encoding of a test pattern should succeed");
    data
}

/// Generate an RGB test image with the specified pattern.
pub fn generate_test_image(width: u32, height: u32, pattern: TestPattern) -> RgbImage {
    match pattern {
        TestPattern::ColorBars => generate_color_bars(width, height),
        TestPattern::Gradient => generate_gradient(width, height),
        TestPattern::Solid(r, g, b) => RgbImage::from_pixel(width, height, Rgb([r, g, b])),
    }
}

/// Generate the 8-bar SMPTE color bars pattern.
fn generate_color_bars(width: u32, height: u32) -> RgbImage {
    // White, Yellow, Cyan, Green, Magenta, Red, Blue, Black
    let bars: [[u8; 3]; 8] = [
        [235, 235, 235],
        [235, 235, 16],
        [16, 235, 235],
        [16, 235, 16],
        [235, 16, 235],
        [235, 16, 16],
        [16, 16, 235],
        [16, 16, 16],
    ];
    let bar_width = (width / 8).max(1);

    RgbImage::from_fn(width, height, |x, _| {
        let bar_idx = (x / bar_width).min(7) as usize;
        Rgb(bars[bar_idx])
    })
}

/// Generate a horizontal gradient from dark to light.
fn generate_gradient(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, _| {
        #[allow(clippy::cast_possible_truncation)]
        let v = ((x * 255) / width.max(1)) as u8;
        Rgb([v, v, v])
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::is_complete_jpeg;

    #[test]
    fn test_mock_device_creation() {
        let device = MockDevice::new();
        assert_eq!(device.capabilities().driver, "mock");
        assert!(device.capabilities().can_capture);
        assert!(device.capabilities().can_stream);
    }

    #[test]
    fn test_mock_device_format() {
        let mut device = MockDevice::new();
        let format = device.format().expect("format should succeed");
        assert_eq!(format.width, 640);
        assert_eq!(format.height, 480);

        let new_format = Format::new(1024, 768, FourCC::MJPG);
        let actual = device
            .set_format(&new_format)
            .expect("set_format should succeed");
        assert_eq!(actual.dimensions(), (1024, 768));
        assert_eq!(device.set_format_calls(), 1);
    }

    #[test]
    fn test_mock_device_rejects_unknown_size() {
        let mut device = MockDevice::new().rejecting((320, 240));
        assert!(device.set_format(&Format::new(320, 240, FourCC::MJPG)).is_err());
        assert!(device.set_format(&Format::new(123, 45, FourCC::MJPG)).is_err());
        assert_eq!(device.format().expect("format").dimensions(), (640, 480));
    }

    #[test]
    fn test_mock_stream_capture() {
        let mut device = MockDevice::new();
        let mut stream = device
            .create_stream(4)
            .expect("create_stream should succeed");

        let frame1 = stream.next_frame().expect("next_frame should succeed");
        assert_eq!(frame1.sequence, 0);
        assert!(is_complete_jpeg(&frame1.data));

        let frame2 = stream.next_frame().expect("next_frame should succeed");
        assert_eq!(frame2.sequence, 1);
    }

    #[test]
    fn test_mock_stream_failure_injection() {
        let mut device = MockDevice::new().failing_after(2);
        let mut stream = device.create_stream(1).expect("create_stream");
        assert!(stream.next_frame().is_ok());
        assert!(stream.next_frame().is_ok());
        assert!(matches!(stream.next_frame(), Err(CameraError::Timeout)));
    }

    #[test]
    fn test_mock_truncated_frames() {
        let mut device = MockDevice::new().with_truncated_frames();
        let mut stream = device.create_stream(1).expect("create_stream");
        let frame = stream.next_frame().expect("next_frame");
        assert!(!is_complete_jpeg(&frame.data));
    }

    #[test]
    fn test_gradient_pattern() {
        let image = generate_test_image(640, 480, TestPattern::Gradient);
        assert!(image.get_pixel(0, 0)[0] < 10);
        assert!(image.get_pixel(639, 479)[0] > 200);
    }

    #[test]
    fn test_solid_pattern() {
        let image = generate_test_image(64, 64, TestPattern::Solid(128, 64, 192));
        assert_eq!(image.get_pixel(10, 10), &Rgb([128, 64, 192]));
    }

    #[test]
    fn test_pattern_stream() {
        let mut device = MockDevice::new();
        let stream = device.create_stream(1).expect("create_stream");
        let mut stream = stream.with_pattern(TestPattern::Solid(10, 20, 30));
        let frame = stream.next_frame().expect("next_frame");
        let decoded = image::load_from_memory(&frame.data).expect("decode");
        assert_eq!((decoded.width(), decoded.height()), (640, 480));
    }
}
