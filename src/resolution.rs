//! Supported capture resolutions and nearest-match lookup.

use std::fmt;

/// Common sensor modes, smallest first. Used to sample devices that report a
/// continuous (stepwise) size range instead of discrete sizes.
pub const STANDARD_SIZES: [(u32, u32); 14] = [
    (96, 96),
    (160, 120),
    (176, 144),
    (240, 176),
    (240, 240),
    (320, 240),
    (400, 296),
    (480, 320),
    (640, 480),
    (800, 600),
    (1024, 768),
    (1280, 720),
    (1280, 1024),
    (1600, 1200),
];

/// A capture mode the sensor can produce.
///
/// Values are only created by [`ResolutionCatalog`], so every valid
/// `Resolution` refers to an entry of the catalog it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Resolution {
    width: u32,
    height: u32,
    index: usize,
}

impl Resolution {
    /// Sentinel returned when a lookup has nothing to match against.
    pub const INVALID: Self = Self {
        width: 0,
        height: 0,
        index: usize::MAX,
    };

    /// Width in pixels.
    pub const fn width(self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub const fn height(self) -> u32 {
        self.height
    }

    /// Position in the catalog's mode table.
    pub const fn index(self) -> usize {
        self.index
    }

    /// `false` for the lookup-failure sentinel.
    pub const fn is_valid(self) -> bool {
        self.width != 0 && self.height != 0
    }

    /// Whether this mode has exactly the given dimensions.
    pub const fn matches(self, width: u32, height: u32) -> bool {
        self.width == width && self.height == height
    }

    const fn area(self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Ordered, read-only set of supported resolutions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolutionCatalog {
    modes: Vec<Resolution>,
}

impl ResolutionCatalog {
    /// Build a catalog from reported frame sizes.
    ///
    /// Zero-sized and duplicate entries are dropped; the remaining modes are
    /// ordered by pixel area, then width.
    pub fn new<I>(sizes: I) -> Self
    where
        I: IntoIterator<Item = (u32, u32)>,
    {
        let mut sizes: Vec<(u32, u32)> = sizes
            .into_iter()
            .filter(|&(w, h)| w != 0 && h != 0)
            .collect();
        sizes.sort_by_key(|&(w, h)| (u64::from(w) * u64::from(h), w));
        sizes.dedup();

        let modes = sizes
            .into_iter()
            .enumerate()
            .map(|(index, (width, height))| Resolution {
                width,
                height,
                index,
            })
            .collect();
        Self { modes }
    }

    /// All supported modes in catalog order.
    pub fn list(&self) -> &[Resolution] {
        &self.modes
    }

    /// Number of modes.
    pub fn len(&self) -> usize {
        self.modes.len()
    }

    /// Whether the catalog has no modes.
    pub fn is_empty(&self) -> bool {
        self.modes.is_empty()
    }

    /// Exact lookup.
    pub fn get(&self, width: u32, height: u32) -> Option<Resolution> {
        self.modes.iter().copied().find(|r| r.matches(width, height))
    }

    /// Exact match if present, otherwise the mode closest in pixel area.
    ///
    /// Ties go to the mode with the smaller combined width/height difference,
    /// then to the earlier catalog entry. Returns [`Resolution::INVALID`] only
    /// when the catalog is empty.
    pub fn find(&self, width: u32, height: u32) -> Resolution {
        if let Some(exact) = self.get(width, height) {
            return exact;
        }

        let area = u64::from(width) * u64::from(height);
        self.modes
            .iter()
            .copied()
            .min_by_key(|r| {
                (
                    r.area().abs_diff(area),
                    u64::from(r.width.abs_diff(width)) + u64::from(r.height.abs_diff(height)),
                    r.index,
                )
            })
            .unwrap_or(Resolution::INVALID)
    }

    /// Newline-separated `WxH` listing in catalog order.
    pub fn to_csv(&self) -> String {
        self.modes
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    }
}
