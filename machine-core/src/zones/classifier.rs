use core::fmt;

use super::frame::{Frame, FrameDimensions};
use super::{Coverage, DetectionZone, ZoneConfigError, ZoneRole};

/// Number of zones the station inspects (one per [`ZoneRole`]).
pub const ZONE_COUNT: usize = 2;

/// Frame rejected at classification time.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ClassifyError {
    /// The frame geometry differs from the one the zones were validated for.
    DimensionMismatch {
        expected: FrameDimensions,
        actual: FrameDimensions,
    },
}

impl fmt::Display for ClassifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClassifyError::DimensionMismatch { expected, actual } => {
                write!(f, "frame is {actual}, zones configured for {expected}")
            }
        }
    }
}

/// Per-zone detections for one sampling tick, indexed by [`ZoneRole::as_index`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct DetectionResult {
    detected: [bool; ZONE_COUNT],
    coverage: [Coverage; ZONE_COUNT],
}

impl DetectionResult {
    #[must_use]
    pub const fn from_parts(detected: [bool; ZONE_COUNT], coverage: [Coverage; ZONE_COUNT]) -> Self {
        Self { detected, coverage }
    }

    #[must_use]
    pub const fn detected(&self, role: ZoneRole) -> bool {
        self.detected[role.as_index()]
    }

    #[must_use]
    pub const fn coverage(&self, role: ZoneRole) -> Coverage {
        self.coverage[role.as_index()]
    }

    /// Detections aligned by zone index.
    #[must_use]
    pub const fn as_array(&self) -> [bool; ZONE_COUNT] {
        self.detected
    }
}

/// Counts matching pixels inside one zone.
pub fn classify_zone<F: Frame + ?Sized>(zone: &DetectionZone, frame: &F) -> Coverage {
    let rect = zone.rect;
    let mut matched = 0u64;
    for y in rect.y..rect.y + rect.height {
        for x in rect.x..rect.x + rect.width {
            if zone.range.contains(frame.hsv_at(x, y)) {
                matched += 1;
            }
        }
    }

    Coverage::new(matched, rect.area())
}

/// Validated zone set bound to one frame geometry.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ZoneClassifier {
    frame: FrameDimensions,
    zones: [DetectionZone; ZONE_COUNT],
}

impl ZoneClassifier {
    /// Validates `zones` against `frame`; every role must appear exactly once.
    pub fn new(frame: FrameDimensions, zones: &[DetectionZone]) -> Result<Self, ZoneConfigError> {
        let mut slots: [Option<DetectionZone>; ZONE_COUNT] = [None; ZONE_COUNT];

        for zone in zones {
            zone.validate_within(frame)?;
            let slot = &mut slots[zone.role.as_index()];
            if slot.is_some() {
                return Err(ZoneConfigError::DuplicateRole(zone.role));
            }
            *slot = Some(*zone);
        }

        match slots {
            [Some(sellado), Some(carga)] => Ok(Self {
                frame,
                zones: [sellado, carga],
            }),
            [None, _] => Err(ZoneConfigError::MissingRole(ZoneRole::Sellado)),
            [_, None] => Err(ZoneConfigError::MissingRole(ZoneRole::Carga)),
        }
    }

    #[must_use]
    pub const fn frame(&self) -> FrameDimensions {
        self.frame
    }

    #[must_use]
    pub const fn zones(&self) -> &[DetectionZone; ZONE_COUNT] {
        &self.zones
    }

    #[must_use]
    pub const fn zone(&self, role: ZoneRole) -> &DetectionZone {
        &self.zones[role.as_index()]
    }

    /// Classifies every zone of `frame`.
    pub fn classify<F: Frame + ?Sized>(&self, frame: &F) -> Result<DetectionResult, ClassifyError> {
        let actual = frame.dimensions();
        if actual != self.frame {
            return Err(ClassifyError::DimensionMismatch {
                expected: self.frame,
                actual,
            });
        }

        let mut detected = [false; ZONE_COUNT];
        let mut coverage = [Coverage::default(); ZONE_COUNT];
        for (index, zone) in self.zones.iter().enumerate() {
            let tally = classify_zone(zone, frame);
            detected[index] = tally.exceeds(zone.threshold);
            coverage[index] = tally;
        }

        Ok(DetectionResult::from_parts(detected, coverage))
    }
}
