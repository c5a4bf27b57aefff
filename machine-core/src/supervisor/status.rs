//! Read-only display model and its textual rendering.
//!
//! [`DisplaySnapshot`] is copied out of the supervisor once per tick so front
//! ends never hold a reference into live state. [`StatusFormatter`] keeps the
//! console rendering consistent.

use core::fmt;

use crate::actuators::{ACTUATOR_COUNT, ALL_ACTUATORS, ActuatorId, ActuatorState};
use crate::sequences::{CYCLE_LENGTH, CYCLE_STEPS, SequenceTracker};
use crate::zones::{ALL_ROLES, Coverage, ZONE_COUNT, ZoneRole};

/// Last classification of one zone.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ZoneSample {
    pub role: ZoneRole,
    pub detected: bool,
    pub coverage: Coverage,
}

impl ZoneSample {
    #[must_use]
    pub const fn new(role: ZoneRole, detected: bool, coverage: Coverage) -> Self {
        Self {
            role,
            detected,
            coverage,
        }
    }
}

/// Commanded state of one solenoid.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ActuatorSample {
    pub id: ActuatorId,
    pub state: ActuatorState,
}

/// Everything a front end shows.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DisplaySnapshot {
    pub zones: [ZoneSample; ZONE_COUNT],
    pub actuators: [ActuatorSample; ACTUATOR_COUNT],
    pub sequence: SequenceTracker,
    pub running: bool,
    pub link_attached: bool,
}

impl DisplaySnapshot {
    /// State before the first frame: nothing detected, everything OFF.
    #[must_use]
    pub fn initial(link_attached: bool) -> Self {
        Self {
            zones: ALL_ROLES.map(|role| ZoneSample::new(role, false, Coverage::default())),
            actuators: ALL_ACTUATORS.map(|line| ActuatorSample {
                id: line.id,
                state: ActuatorState::Off,
            }),
            sequence: SequenceTracker::new(),
            running: false,
            link_attached,
        }
    }

    #[must_use]
    pub const fn zone(&self, role: ZoneRole) -> ZoneSample {
        self.zones[role.as_index()]
    }

    #[must_use]
    pub const fn actuator(&self, id: ActuatorId) -> ActuatorState {
        self.actuators[id.as_index()].state
    }

    /// Completed cycle steps.
    #[must_use]
    pub const fn reached(&self) -> usize {
        self.sequence.count()
    }
}

/// Helper that renders a [`DisplaySnapshot`] into human-readable lines.
#[derive(Clone, Copy, Debug)]
pub struct StatusFormatter<'a> {
    snapshot: &'a DisplaySnapshot,
}

impl<'a> StatusFormatter<'a> {
    #[must_use]
    pub const fn new(snapshot: &'a DisplaySnapshot) -> Self {
        Self { snapshot }
    }

    /// Writes the zone line (e.g. `zones Sellado=1 (15.0%) Carga=0 (0.0%)`).
    pub fn write_zones_line<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        writer.write_str("zones")?;
        for sample in &self.snapshot.zones {
            write!(
                writer,
                " {}={} ({:.1}%)",
                sample.role,
                u8::from(sample.detected),
                sample.coverage.percent()
            )?;
        }
        Ok(())
    }

    /// Writes the solenoid line (e.g. `solenoids A=ON B=OFF C=OFF`).
    pub fn write_actuators_line<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        writer.write_str("solenoids")?;
        for sample in &self.snapshot.actuators {
            write!(writer, " {}={}", sample.id, sample.state)?;
        }
        Ok(())
    }

    /// Writes the cycle line, marking completed steps (e.g. `sequence 2/6 [A+] [B+] B- A- C+ C-`).
    pub fn write_sequence_line<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        let tracker = &self.snapshot.sequence;
        write!(writer, "sequence {}/{}", tracker.count(), CYCLE_LENGTH)?;
        for (index, step) in CYCLE_STEPS.iter().enumerate() {
            if tracker.reached(index) {
                write!(writer, " [{step}]")?;
            } else {
                write!(writer, " {step}")?;
            }
        }
        Ok(())
    }

    /// Writes the run line (e.g. `run state=running link=attached`).
    pub fn write_run_line<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        writer.write_str("run state=")?;
        writer.write_str(if self.snapshot.running {
            "running"
        } else {
            "stopped"
        })?;
        writer.write_str(" link=")?;
        writer.write_str(if self.snapshot.link_attached {
            "attached"
        } else {
            "detached"
        })
    }
}
