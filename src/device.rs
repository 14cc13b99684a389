//! V4L2 device implementation using the v4l crate.

use std::io;
use std::path::Path;
use std::time::Duration;

use v4l::buffer::Type;
use v4l::control::{Control, Value};
use v4l::framesize::FrameSizeEnum;
use v4l::io::mmap::Stream;
use v4l::io::traits::CaptureStream as V4lCaptureStream;
use v4l::video::Capture;
use v4l::Device;

use crate::resolution::STANDARD_SIZES;
use crate::traits::{
    CameraDevice, CameraError, CaptureStream, DeviceCapabilities, Format, FourCC, RawFrame,
    Result,
};

/// `V4L2_CID_JPEG_COMPRESSION_QUALITY` from `linux/v4l2-controls.h`.
const V4L2_CID_JPEG_COMPRESSION_QUALITY: u32 = 0x009d_0903;

/// V4L2 device implementation wrapping the v4l crate.
pub struct V4L2Device {
    device: Device,
    capabilities: DeviceCapabilities,
    timeout: Option<Duration>,
}

impl V4L2Device {
    /// Open a V4L2 device by index (e.g., 0 for /dev/video0).
    pub fn open(index: u32) -> Result<Self> {
        if !Path::new(&format!("/dev/video{index}")).exists() {
            return Err(CameraError::DeviceNotFound(index));
        }

        let device = Device::new(index as usize)
            .map_err(|err| CameraError::DeviceOpenFailed(err.to_string()))?;

        let caps = device
            .query_caps()
            .map_err(|err| CameraError::DeviceOpenFailed(err.to_string()))?;

        let capabilities = DeviceCapabilities {
            driver: caps.driver,
            card: caps.card,
            bus_info: caps.bus,
            can_capture: caps.capabilities.contains(v4l::capability::Flags::VIDEO_CAPTURE),
            can_stream: caps.capabilities.contains(v4l::capability::Flags::STREAMING),
        };

        Ok(Self {
            device,
            capabilities,
            timeout: None,
        })
    }

    /// Bound every dequeue by `timeout`; a stalled sensor then yields
    /// [`CameraError::Timeout`] instead of blocking forever.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

fn to_format(fmt: &v4l::Format) -> Format {
    Format {
        width: fmt.width,
        height: fmt.height,
        fourcc: FourCC::from(fmt.fourcc),
    }
}

impl CameraDevice for V4L2Device {
    type Stream<'a> = V4L2Stream<'a>;

    fn capabilities(&self) -> &DeviceCapabilities {
        &self.capabilities
    }

    fn format(&self) -> Result<Format> {
        let fmt = self
            .device
            .format()
            .map_err(|err| CameraError::StreamError(err.to_string()))?;

        Ok(to_format(&fmt))
    }

    fn set_format(&mut self, format: &Format) -> Result<Format> {
        let mut fmt = self
            .device
            .format()
            .map_err(|err| CameraError::StreamError(err.to_string()))?;

        fmt.width = format.width;
        fmt.height = format.height;
        fmt.fourcc = format.fourcc.into();

        let fmt = self
            .device
            .set_format(&fmt)
            .map_err(|_| CameraError::FormatNotSupported(format.clone()))?;

        Ok(to_format(&fmt))
    }

    fn frame_sizes(&self, fourcc: FourCC) -> Result<Vec<(u32, u32)>> {
        let sizes = self
            .device
            .enum_framesizes(fourcc.into())
            .map_err(|err| CameraError::StreamError(err.to_string()))?;

        let mut out = Vec::new();
        for size in sizes {
            match size.size {
                FrameSizeEnum::Discrete(discrete) => out.push((discrete.width, discrete.height)),
                FrameSizeEnum::Stepwise(step) => {
                    // Continuous ranges are sampled at the usual sensor modes.
                    out.extend(STANDARD_SIZES.iter().copied().filter(|&(w, h)| {
                        (step.min_width..=step.max_width).contains(&w)
                            && (step.min_height..=step.max_height).contains(&h)
                            && (w - step.min_width) % step.step_width.max(1) == 0
                            && (h - step.min_height) % step.step_height.max(1) == 0
                    }));
                }
            }
        }
        Ok(out)
    }

    fn set_jpeg_quality(&mut self, quality: u8) -> Result<()> {
        self.device
            .set_control(Control {
                id: V4L2_CID_JPEG_COMPRESSION_QUALITY,
                value: Value::Integer(i64::from(quality)),
            })
            .map_err(|err| CameraError::Control(err.to_string()))
    }

    fn create_stream(&mut self, buffer_count: u32) -> Result<Self::Stream<'_>> {
        let mut stream = Stream::with_buffers(&self.device, Type::VideoCapture, buffer_count)
            .map_err(|err| CameraError::StreamError(err.to_string()))?;

        if let Some(timeout) = self.timeout {
            stream.set_timeout(timeout);
        }

        Ok(V4L2Stream { stream })
    }
}

/// V4L2 capture stream wrapping mmap-based streaming.
pub struct V4L2Stream<'a> {
    stream: Stream<'a>,
}

impl CaptureStream for V4L2Stream<'_> {
    fn next_frame(&mut self) -> Result<RawFrame> {
        let (buf, meta) = self.stream.next().map_err(|err| match err.kind() {
            io::ErrorKind::TimedOut => CameraError::Timeout,
            _ => CameraError::StreamError(err.to_string()),
        })?;

        // The mapped buffer is sized for the worst case; only `bytesused` is frame data.
        let used = buf.get(..meta.bytesused as usize).unwrap_or(buf);

        Ok(RawFrame {
            data: used.to_vec(),
            sequence: meta.sequence,
        })
    }
}
