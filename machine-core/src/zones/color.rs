//! 8-bit HSV color model used for zone classification.
//!
//! Hue is stored halved (`0..180`) so every channel fits in a byte; saturation
//! and value span `0..=255`. This matches the convention the station's color
//! thresholds were tuned against.

/// Largest hue value representable in the halved-hue encoding.
pub const HUE_MAX: u8 = 179;

/// Pixel in the classification color space.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct Hsv {
    pub h: u8,
    pub s: u8,
    pub v: u8,
}

impl Hsv {
    #[must_use]
    pub const fn new(h: u8, s: u8, v: u8) -> Self {
        Self { h, s, v }
    }

    /// Converts an 8-bit RGB triple, rounding each channel to nearest.
    #[must_use]
    pub fn from_rgb(r: u8, g: u8, b: u8) -> Self {
        let (r, g, b) = (i32::from(r), i32::from(g), i32::from(b));
        let max = r.max(g).max(b);
        let min = r.min(g).min(b);
        let delta = max - min;

        let s = if max == 0 {
            0
        } else {
            div_round(255 * delta, max)
        };

        let h = if delta == 0 {
            0
        } else if max == r {
            div_round(30 * (g - b), delta)
        } else if max == g {
            60 + div_round(30 * (b - r), delta)
        } else {
            120 + div_round(30 * (r - g), delta)
        };
        let h = if h < 0 {
            h + 180
        } else if h >= 180 {
            h - 180
        } else {
            h
        };

        Self {
            h: clamp_channel(h),
            s: clamp_channel(s),
            v: clamp_channel(max),
        }
    }
}

/// Inclusive per-channel bounds.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct HsvRange {
    pub lower: Hsv,
    pub upper: Hsv,
}

impl HsvRange {
    #[must_use]
    pub const fn new(lower: Hsv, upper: Hsv) -> Self {
        Self { lower, upper }
    }

    /// Yellow range the station ships with.
    #[must_use]
    pub const fn yellow() -> Self {
        Self::new(Hsv::new(20, 100, 100), Hsv::new(35, 255, 255))
    }

    /// Returns `true` when every lower bound sits at or below its upper bound.
    #[must_use]
    pub const fn is_ordered(&self) -> bool {
        self.lower.h <= self.upper.h && self.lower.s <= self.upper.s && self.lower.v <= self.upper.v
    }

    #[must_use]
    pub const fn contains(&self, pixel: Hsv) -> bool {
        pixel.h >= self.lower.h
            && pixel.h <= self.upper.h
            && pixel.s >= self.lower.s
            && pixel.s <= self.upper.s
            && pixel.v >= self.lower.v
            && pixel.v <= self.upper.v
    }
}

fn div_round(numerator: i32, denominator: i32) -> i32 {
    let half = denominator / 2;
    if numerator >= 0 {
        (numerator + half) / denominator
    } else {
        -((-numerator + half) / denominator)
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn clamp_channel(value: i32) -> u8 {
    value.clamp(0, 255) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primaries_map_to_expected_hues() {
        assert_eq!(Hsv::from_rgb(255, 0, 0), Hsv::new(0, 255, 255));
        assert_eq!(Hsv::from_rgb(0, 255, 0), Hsv::new(60, 255, 255));
        assert_eq!(Hsv::from_rgb(0, 0, 255), Hsv::new(120, 255, 255));
    }

    #[test]
    fn pure_yellow_lands_inside_default_range() {
        let yellow = Hsv::from_rgb(255, 255, 0);
        assert_eq!(yellow, Hsv::new(30, 255, 255));
        assert!(HsvRange::yellow().contains(yellow));
    }

    #[test]
    fn greys_have_no_saturation() {
        assert_eq!(Hsv::from_rgb(0, 0, 0), Hsv::new(0, 0, 0));
        assert_eq!(Hsv::from_rgb(128, 128, 128), Hsv::new(0, 0, 128));
        assert!(!HsvRange::yellow().contains(Hsv::from_rgb(200, 200, 200)));
    }

    #[test]
    fn magenta_wraps_into_upper_hue_band() {
        let magenta = Hsv::from_rgb(255, 0, 128);
        assert!(magenta.h > 160 && magenta.h <= HUE_MAX);
    }

    #[test]
    fn range_bounds_are_inclusive() {
        let range = HsvRange::yellow();
        assert!(range.contains(Hsv::new(20, 100, 100)));
        assert!(range.contains(Hsv::new(35, 255, 255)));
        assert!(!range.contains(Hsv::new(19, 100, 100)));
        assert!(!range.contains(Hsv::new(36, 255, 255)));
        assert!(!range.contains(Hsv::new(25, 99, 200)));
    }

    #[test]
    fn inverted_range_is_reported() {
        let range = HsvRange::new(Hsv::new(40, 0, 0), Hsv::new(30, 255, 255));
        assert!(!range.is_ordered());
    }
}
