//! Detection zones and the color-coverage classifier.
//!
//! A zone is a fixed rectangle of the camera frame paired with an HSV range
//! and a coverage threshold. Zones are validated against the frame geometry
//! once, when the [`ZoneClassifier`] is built, so classifying a frame never
//! has to deal with bad rectangles.

use core::fmt;

pub mod classifier;
pub mod color;
pub mod frame;

pub use classifier::{ClassifyError, DetectionResult, ZONE_COUNT, ZoneClassifier, classify_zone};
pub use color::{Hsv, HsvRange};
pub use frame::{BufferSizeError, Frame, FrameDimensions, PackedFrame, PixelLayout};

/// Coverage percentage a zone must strictly exceed unless configured otherwise.
pub const DEFAULT_COVERAGE_THRESHOLD: u8 = 10;

/// Role a zone plays on the wire.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ZoneRole {
    /// Sealing station, reported as `Sellado` / `S0|S1`.
    Sellado,
    /// Loading station, reported as `Carga` / `H0|H1`.
    Carga,
}

/// Every zone role in index order.
pub const ALL_ROLES: [ZoneRole; ZONE_COUNT] = [ZoneRole::Sellado, ZoneRole::Carga];

impl ZoneRole {
    /// Deterministic index into [`ALL_ROLES`] and detection results.
    #[must_use]
    pub const fn as_index(self) -> usize {
        match self {
            ZoneRole::Sellado => 0,
            ZoneRole::Carga => 1,
        }
    }

    #[must_use]
    pub const fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(ZoneRole::Sellado),
            1 => Some(ZoneRole::Carga),
            _ => None,
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            ZoneRole::Sellado => "Sellado",
            ZoneRole::Carga => "Carga",
        }
    }

    /// Looks a role up by label (case insensitive).
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        ALL_ROLES
            .iter()
            .copied()
            .find(|role| role.label().eq_ignore_ascii_case(label))
    }
}

impl fmt::Display for ZoneRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Axis-aligned rectangle in frame pixel coordinates.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    #[must_use]
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    #[must_use]
    pub const fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Returns `true` when the rectangle lies entirely inside the frame.
    #[must_use]
    pub fn fits_within(&self, frame: FrameDimensions) -> bool {
        let right = self.x.checked_add(self.width);
        let bottom = self.y.checked_add(self.height);
        matches!(
            (right, bottom),
            (Some(right), Some(bottom)) if right <= frame.width && bottom <= frame.height
        )
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}) {}x{}",
            self.x, self.y, self.width, self.height
        )
    }
}

/// Immutable zone configuration.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct DetectionZone {
    pub role: ZoneRole,
    pub rect: Rect,
    pub range: HsvRange,
    /// Coverage percentage (`0..=100`) that must be strictly exceeded.
    pub threshold: u8,
}

impl DetectionZone {
    /// Builds a zone, rejecting degenerate rectangles, ranges, and thresholds.
    pub fn new(
        role: ZoneRole,
        rect: Rect,
        range: HsvRange,
        threshold: u8,
    ) -> Result<Self, ZoneConfigError> {
        if rect.width == 0 || rect.height == 0 {
            return Err(ZoneConfigError::ZeroArea { role });
        }
        if threshold > 100 {
            return Err(ZoneConfigError::ThresholdOutOfRange { role, threshold });
        }
        if !range.is_ordered() {
            return Err(ZoneConfigError::InvertedRange { role });
        }

        Ok(Self {
            role,
            rect,
            range,
            threshold,
        })
    }

    /// Builds a zone with [`DEFAULT_COVERAGE_THRESHOLD`].
    pub fn with_default_threshold(
        role: ZoneRole,
        rect: Rect,
        range: HsvRange,
    ) -> Result<Self, ZoneConfigError> {
        Self::new(role, rect, range, DEFAULT_COVERAGE_THRESHOLD)
    }

    /// Checks the rectangle against the frame geometry.
    pub fn validate_within(&self, frame: FrameDimensions) -> Result<(), ZoneConfigError> {
        if self.rect.fits_within(frame) {
            Ok(())
        } else {
            Err(ZoneConfigError::OutOfBounds {
                role: self.role,
                rect: self.rect,
                frame,
            })
        }
    }
}

/// Matched-pixel tally for one zone.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct Coverage {
    pub matched: u64,
    pub area: u64,
}

impl Coverage {
    #[must_use]
    pub const fn new(matched: u64, area: u64) -> Self {
        Self { matched, area }
    }

    /// Share of matching pixels as a percentage.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn percent(&self) -> f32 {
        if self.area == 0 {
            return 0.0;
        }
        self.matched as f32 / self.area as f32 * 100.0
    }

    /// `true` iff the coverage strictly exceeds `threshold` percent.
    ///
    /// Evaluated in integers so a coverage exactly at the threshold never
    /// rounds over it.
    #[must_use]
    pub const fn exceeds(&self, threshold: u8) -> bool {
        self.matched * 100 > threshold as u64 * self.area
    }
}

/// Zone configuration problems; the only errors that prevent startup.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ZoneConfigError {
    ZeroArea {
        role: ZoneRole,
    },
    OutOfBounds {
        role: ZoneRole,
        rect: Rect,
        frame: FrameDimensions,
    },
    ThresholdOutOfRange {
        role: ZoneRole,
        threshold: u8,
    },
    InvertedRange {
        role: ZoneRole,
    },
    DuplicateRole(ZoneRole),
    MissingRole(ZoneRole),
}

impl fmt::Display for ZoneConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ZoneConfigError::ZeroArea { role } => {
                write!(f, "zone {role} has zero width or height")
            }
            ZoneConfigError::OutOfBounds { role, rect, frame } => {
                write!(f, "zone {role} rectangle {rect} exceeds {frame} frame")
            }
            ZoneConfigError::ThresholdOutOfRange { role, threshold } => {
                write!(f, "zone {role} threshold {threshold}% exceeds 100%")
            }
            ZoneConfigError::InvertedRange { role } => {
                write!(f, "zone {role} color range has a lower bound above its upper bound")
            }
            ZoneConfigError::DuplicateRole(role) => write!(f, "zone {role} configured twice"),
            ZoneConfigError::MissingRole(role) => write!(f, "zone {role} is not configured"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_area_zone_is_rejected() {
        let error = DetectionZone::with_default_threshold(
            ZoneRole::Carga,
            Rect::new(10, 10, 0, 5),
            HsvRange::yellow(),
        )
        .expect_err("zero width should be rejected");
        assert_eq!(
            error,
            ZoneConfigError::ZeroArea {
                role: ZoneRole::Carga
            }
        );
    }

    #[test]
    fn threshold_above_hundred_is_rejected() {
        let error = DetectionZone::new(
            ZoneRole::Sellado,
            Rect::new(0, 0, 4, 4),
            HsvRange::yellow(),
            101,
        )
        .expect_err("threshold should be rejected");
        assert!(matches!(
            error,
            ZoneConfigError::ThresholdOutOfRange { threshold: 101, .. }
        ));
    }

    #[test]
    fn rectangle_touching_frame_edge_fits() {
        let frame = FrameDimensions::new(640, 480);
        assert!(Rect::new(600, 440, 40, 40).fits_within(frame));
        assert!(!Rect::new(601, 440, 40, 40).fits_within(frame));
        assert!(!Rect::new(u32::MAX, 0, 2, 2).fits_within(frame));
    }

    #[test]
    fn coverage_equal_to_threshold_does_not_exceed() {
        assert!(!Coverage::new(10, 100).exceeds(10));
        assert!(Coverage::new(11, 100).exceeds(10));
        assert!(!Coverage::new(0, 100).exceeds(0));
        assert!(Coverage::new(1, 100).exceeds(0));
    }

    #[test]
    fn role_labels_round_trip() {
        for role in ALL_ROLES {
            assert_eq!(ZoneRole::from_label(role.label()), Some(role));
            assert_eq!(ZoneRole::from_index(role.as_index()), Some(role));
        }
        assert_eq!(ZoneRole::from_label("carga"), Some(ZoneRole::Carga));
        assert_eq!(ZoneRole::from_label("tapa"), None);
    }
}
