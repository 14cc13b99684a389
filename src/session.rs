//! Exclusive ownership of the sensor: resolution state and frame capture.

use tracing::{debug, info, warn};

use crate::config::CameraConfig;
use crate::frame::Frame;
use crate::resolution::{Resolution, ResolutionCatalog};
use crate::traits::{CameraDevice, CameraError, CaptureStream, Format, FourCC, Result};
use crate::validation::is_complete_jpeg;

/// The camera and the mode it is currently producing.
///
/// Methods take `&mut self`, so holding the session is what guarantees only
/// one resolution change or capture is in flight.
pub struct CameraSession<D: CameraDevice> {
    device: D,
    catalog: ResolutionCatalog,
    current: Resolution,
    fourcc: FourCC,
    buffer_count: u32,
}

impl<D: CameraDevice> CameraSession<D> {
    /// One-time setup: check capabilities, build the catalog from the
    /// device's MJPEG sizes, apply the initial resolution and JPEG quality.
    pub fn initialize(mut device: D, config: &CameraConfig) -> Result<Self> {
        let caps = device.capabilities();
        info!(driver = %caps.driver, card = %caps.card, bus = %caps.bus_info, "camera opened");
        if !caps.can_capture || !caps.can_stream {
            return Err(CameraError::Unsupported(format!(
                "{} lacks video capture streaming",
                caps.card
            )));
        }

        let fourcc = [FourCC::MJPG, FourCC::JPEG]
            .into_iter()
            .find(|&fourcc| device.frame_sizes(fourcc).is_ok_and(|sizes| !sizes.is_empty()))
            .ok_or_else(|| CameraError::Unsupported("no JPEG frame sizes".to_owned()))?;
        let catalog = ResolutionCatalog::new(device.frame_sizes(fourcc)?);
        debug!(modes = %catalog.to_csv().replace('\n', ","), "resolution catalog");

        let initial = catalog.find(config.initial_width, config.initial_height);
        let actual = device.set_format(&Format::new(initial.width(), initial.height(), fourcc))?;
        if !initial.matches(actual.width, actual.height) {
            return Err(CameraError::FormatNotSupported(actual));
        }

        if let Err(err) = device.set_jpeg_quality(config.jpeg_quality) {
            warn!(quality = config.jpeg_quality, %err, "JPEG quality not applied");
        }

        info!(resolution = %initial, "camera initialized");
        Ok(Self {
            device,
            catalog,
            current: initial,
            fourcc,
            buffer_count: config.buffer_count,
        })
    }

    /// Supported modes.
    pub const fn catalog(&self) -> &ResolutionCatalog {
        &self.catalog
    }

    /// The mode frames are currently captured at.
    pub const fn resolution(&self) -> Resolution {
        self.current
    }

    /// Switch the active mode. A no-op when `resolution` is already active.
    ///
    /// On failure the previous mode stays active.
    pub fn change_resolution(&mut self, resolution: Resolution) -> Result<()> {
        if resolution == self.current {
            return Ok(());
        }
        if !resolution.is_valid() || self.catalog.list().get(resolution.index()) != Some(&resolution)
        {
            return Err(CameraError::FormatNotSupported(Format::new(
                resolution.width(),
                resolution.height(),
                self.fourcc,
            )));
        }

        let requested = Format::new(resolution.width(), resolution.height(), self.fourcc);
        let actual = match self.device.set_format(&requested) {
            Ok(actual) => actual,
            Err(err) => {
                self.sync_active_mode();
                return Err(err);
            }
        };
        if !resolution.matches(actual.width, actual.height) {
            // The driver substituted another size; put the old one back.
            let previous = Format::new(self.current.width(), self.current.height(), self.fourcc);
            if let Err(err) = self.device.set_format(&previous) {
                warn!(%err, resolution = %self.current, "failed to restore previous resolution");
            }
            self.sync_active_mode();
            return Err(CameraError::FormatNotSupported(requested));
        }

        self.current = resolution;
        Ok(())
    }

    /// Re-read the driver's mode after a failed switch, so frames are labeled
    /// with the size the sensor actually produces.
    fn sync_active_mode(&mut self) {
        let active = match self.device.format() {
            Ok(active) => active,
            Err(err) => {
                warn!(%err, "failed to read back active mode");
                return;
            }
        };
        match self.catalog.get(active.width, active.height) {
            Some(mode) if mode != self.current => {
                warn!(expected = %self.current, active = %mode, "driver left another mode active");
                self.current = mode;
            }
            Some(_) => {}
            None => warn!(
                width = active.width,
                height = active.height,
                "driver mode outside the catalog"
            ),
        }
    }

    /// Start streaming at the current resolution.
    pub fn open_stream(&mut self) -> Result<FrameStream<'_, D>> {
        let resolution = self.current;
        let stream = self.device.create_stream(self.buffer_count)?;
        Ok(FrameStream { stream, resolution })
    }

    /// Capture a single frame.
    pub fn capture(&mut self) -> Result<Frame> {
        self.open_stream()?.capture()
    }

    #[cfg(test)]
    pub(crate) const fn device(&self) -> &D {
        &self.device
    }
}

/// A running capture stream yielding validated JPEG frames.
pub struct FrameStream<'a, D: CameraDevice + 'a> {
    stream: D::Stream<'a>,
    resolution: Resolution,
}

impl<D: CameraDevice> FrameStream<'_, D> {
    /// Dequeue the next frame. Incomplete JPEG buffers are reported as
    /// [`CameraError::CorruptFrame`].
    pub fn capture(&mut self) -> Result<Frame> {
        let raw = self.stream.next_frame()?;
        if !is_complete_jpeg(&raw.data) {
            return Err(CameraError::CorruptFrame {
                sequence: raw.sequence,
                len: raw.data.len(),
            });
        }
        Ok(Frame::jpeg(
            raw.data,
            self.resolution.width(),
            self.resolution.height(),
            raw.sequence,
        ))
    }
}
