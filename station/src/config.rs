//! Station configuration.
//!
//! Values come from built-in defaults, then an optional INI file, then the
//! command line, each layer overriding the previous one.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use ini::{Ini, Properties};
use machine_core::zones::color::HUE_MAX;
use machine_core::zones::{
    ALL_ROLES, DEFAULT_COVERAGE_THRESHOLD, DetectionZone, FrameDimensions, Hsv, HsvRange, Rect,
    ZoneClassifier, ZoneConfigError, ZoneRole,
};
use thiserror::Error;

pub const DEFAULT_PORT: &str = "COM5";
pub const DEFAULT_BAUD: u32 = 9600;
pub const DEFAULT_SETTLE: Duration = Duration::from_millis(2000);
pub const DEFAULT_SAMPLE_PERIOD: Duration = Duration::from_millis(30);
pub const DEFAULT_SERIAL_PERIOD: Duration = Duration::from_millis(100);
pub const DEFAULT_FRAME: FrameDimensions = FrameDimensions::new(640, 480);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed configuration: {0}")]
    Syntax(#[from] ini::ParseError),
    #[error("[{section}] {key} = {value:?}: {reason}")]
    InvalidValue {
        section: String,
        key: &'static str,
        value: String,
        reason: &'static str,
    },
    #[error("unknown zone section [{0}]")]
    UnknownZone(String),
    #[error("no frame source configured; pass --frames or set [camera] frames")]
    MissingFrames,
    #[error("invalid zone layout: {0}")]
    Zone(ZoneConfigError),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SerialSettings {
    pub port: String,
    pub baud: u32,
    /// Wait after opening; the controller resets when the port opens.
    pub settle: Duration,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimingSettings {
    pub sample: Duration,
    pub serial: Duration,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CameraSettings {
    pub frames: Option<PathBuf>,
    pub dimensions: FrameDimensions,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ZoneSettings {
    pub role: ZoneRole,
    pub rect: Rect,
    pub range: HsvRange,
    pub threshold: u8,
}

impl ZoneSettings {
    /// Zone placement of the reference station.
    #[must_use]
    pub const fn default_for(role: ZoneRole) -> Self {
        let rect = match role {
            ZoneRole::Sellado => Rect::new(305, 180, 40, 50),
            ZoneRole::Carga => Rect::new(260, 145, 25, 30),
        };
        Self {
            role,
            rect,
            range: HsvRange::yellow(),
            threshold: DEFAULT_COVERAGE_THRESHOLD,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StationConfig {
    pub serial: SerialSettings,
    pub timing: TimingSettings,
    pub camera: CameraSettings,
    pub zones: [ZoneSettings; 2],
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            serial: SerialSettings {
                port: DEFAULT_PORT.to_owned(),
                baud: DEFAULT_BAUD,
                settle: DEFAULT_SETTLE,
            },
            timing: TimingSettings {
                sample: DEFAULT_SAMPLE_PERIOD,
                serial: DEFAULT_SERIAL_PERIOD,
            },
            camera: CameraSettings {
                frames: None,
                dimensions: DEFAULT_FRAME,
            },
            zones: ALL_ROLES.map(ZoneSettings::default_for),
        }
    }
}

/// Command-line values that take precedence over the file.
#[derive(Clone, Debug, Default)]
pub struct Overrides {
    pub port: Option<String>,
    pub baud: Option<u32>,
    pub frames: Option<PathBuf>,
    pub sample_ms: Option<u64>,
    pub serial_ms: Option<u64>,
}

impl StationConfig {
    /// Builds the effective configuration from an optional file and CLI overrides.
    pub fn resolve(path: Option<&Path>, overrides: &Overrides) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        config.apply(overrides);
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_str(text)?;
        Self::from_ini(&ini)
    }

    fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        for (name, props) in ini.iter() {
            let Some(name) = name else {
                continue;
            };
            let section = Section { name, props };
            match name {
                "serial" => {
                    if let Some(port) = props.get("port") {
                        config.serial.port = port.trim().to_owned();
                    }
                    section.number("baud", &mut config.serial.baud)?;
                    section.millis("settle_ms", &mut config.serial.settle)?;
                }
                "timing" => {
                    section.period("sample_ms", &mut config.timing.sample)?;
                    section.period("serial_ms", &mut config.timing.serial)?;
                }
                "camera" => {
                    if let Some(frames) = props.get("frames") {
                        config.camera.frames = Some(PathBuf::from(frames.trim()));
                    }
                    let mut width = config.camera.dimensions.width;
                    let mut height = config.camera.dimensions.height;
                    section.number("width", &mut width)?;
                    section.number("height", &mut height)?;
                    config.camera.dimensions = FrameDimensions::new(width, height);
                }
                other => {
                    let role = other
                        .strip_prefix("zone.")
                        .and_then(ZoneRole::from_label)
                        .ok_or_else(|| ConfigError::UnknownZone(other.to_owned()))?;
                    section.zone(&mut config.zones[role.as_index()])?;
                }
            }
        }

        Ok(config)
    }

    pub fn apply(&mut self, overrides: &Overrides) {
        if let Some(port) = &overrides.port {
            self.serial.port.clone_from(port);
        }
        if let Some(baud) = overrides.baud {
            self.serial.baud = baud;
        }
        if let Some(frames) = &overrides.frames {
            self.camera.frames = Some(frames.clone());
        }
        if let Some(ms) = overrides.sample_ms.filter(|ms| *ms > 0) {
            self.timing.sample = Duration::from_millis(ms);
        }
        if let Some(ms) = overrides.serial_ms.filter(|ms| *ms > 0) {
            self.timing.serial = Duration::from_millis(ms);
        }
    }

    pub fn frames_path(&self) -> Result<&Path, ConfigError> {
        self.camera
            .frames
            .as_deref()
            .ok_or(ConfigError::MissingFrames)
    }

    /// Validates every zone against the frame size.
    pub fn classifier(&self) -> Result<ZoneClassifier, ConfigError> {
        let mut zones = Vec::with_capacity(self.zones.len());
        for settings in &self.zones {
            let zone = DetectionZone::new(
                settings.role,
                settings.rect,
                settings.range,
                settings.threshold,
            )
            .map_err(ConfigError::Zone)?;
            zones.push(zone);
        }
        ZoneClassifier::new(self.camera.dimensions, &zones).map_err(ConfigError::Zone)
    }
}

struct Section<'a> {
    name: &'a str,
    props: &'a Properties,
}

impl Section<'_> {
    fn invalid(&self, key: &'static str, value: &str, reason: &'static str) -> ConfigError {
        ConfigError::InvalidValue {
            section: self.name.to_owned(),
            key,
            value: value.to_owned(),
            reason,
        }
    }

    fn number<T: FromStr>(&self, key: &'static str, slot: &mut T) -> Result<(), ConfigError> {
        if let Some(value) = self.props.get(key) {
            *slot = value
                .trim()
                .parse()
                .map_err(|_| self.invalid(key, value, "expected a non-negative integer"))?;
        }
        Ok(())
    }

    fn millis(&self, key: &'static str, slot: &mut Duration) -> Result<(), ConfigError> {
        let mut ms = u64::try_from(slot.as_millis()).unwrap_or(u64::MAX);
        self.number(key, &mut ms)?;
        *slot = Duration::from_millis(ms);
        Ok(())
    }

    fn period(&self, key: &'static str, slot: &mut Duration) -> Result<(), ConfigError> {
        self.millis(key, slot)?;
        if slot.is_zero() {
            let value = self.props.get(key).unwrap_or_default();
            return Err(self.invalid(key, value, "period must be positive"));
        }
        Ok(())
    }

    fn hsv(&self, key: &'static str, slot: &mut Hsv) -> Result<(), ConfigError> {
        let Some(value) = self.props.get(key) else {
            return Ok(());
        };
        *slot = parse_hsv(value).ok_or_else(|| {
            self.invalid(key, value, "expected `h,s,v` with h in 0-179 and s, v in 0-255")
        })?;
        Ok(())
    }

    fn zone(&self, zone: &mut ZoneSettings) -> Result<(), ConfigError> {
        let Rect {
            mut x,
            mut y,
            mut width,
            mut height,
        } = zone.rect;
        self.number("x", &mut x)?;
        self.number("y", &mut y)?;
        self.number("width", &mut width)?;
        self.number("height", &mut height)?;
        zone.rect = Rect::new(x, y, width, height);

        self.hsv("lower", &mut zone.range.lower)?;
        self.hsv("upper", &mut zone.range.upper)?;
        self.number("threshold", &mut zone.threshold)?;
        Ok(())
    }
}

fn parse_hsv(text: &str) -> Option<Hsv> {
    let mut parts = text.split(',').map(|part| part.trim().parse::<u8>());
    let (Some(Ok(h)), Some(Ok(s)), Some(Ok(v)), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return None;
    };
    (h <= HUE_MAX).then_some(Hsv::new(h, s, v))
}
