//! Fixed actuation cycle and the progress tracker fed by the controller.
//!
//! The controller runs the cycle `A+ B+ B- A- C+ C-` on its own and reports
//! how far it got by sending the concatenated labels of the completed steps
//! (`A+B+B-` after three steps). The tracker only mirrors that count.

use core::fmt;

use crate::actuators::{ActuatorId, actuator_by_id};

/// Number of steps in one cycle.
pub const CYCLE_LENGTH: usize = 6;

/// Direction a solenoid moves in a step.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Stroke {
    Extend,
    Retract,
}

impl Stroke {
    #[must_use]
    pub const fn symbol(self) -> char {
        match self {
            Stroke::Extend => '+',
            Stroke::Retract => '-',
        }
    }
}

/// One entry of the cycle.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SequenceStep {
    pub actuator: ActuatorId,
    pub stroke: Stroke,
    /// Wire label, e.g. `B-`.
    pub label: &'static str,
}

impl SequenceStep {
    #[must_use]
    pub const fn new(actuator: ActuatorId, stroke: Stroke, label: &'static str) -> Self {
        Self {
            actuator,
            stroke,
            label,
        }
    }

    /// Display name of the solenoid the step moves.
    #[must_use]
    pub const fn actuator_label(&self) -> &'static str {
        actuator_by_id(self.actuator).label
    }
}

impl fmt::Display for SequenceStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label)
    }
}

/// Ordered steps of the actuation cycle.
pub const CYCLE_STEPS: [SequenceStep; CYCLE_LENGTH] = [
    SequenceStep::new(ActuatorId::A, Stroke::Extend, "A+"),
    SequenceStep::new(ActuatorId::B, Stroke::Extend, "B+"),
    SequenceStep::new(ActuatorId::B, Stroke::Retract, "B-"),
    SequenceStep::new(ActuatorId::A, Stroke::Retract, "A-"),
    SequenceStep::new(ActuatorId::C, Stroke::Extend, "C+"),
    SequenceStep::new(ActuatorId::C, Stroke::Retract, "C-"),
];

/// Completed-step count carried by a decoded progress token (`1..=6`).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SequenceProgress(u8);

impl SequenceProgress {
    /// Returns `None` for zero or for counts past the end of the cycle.
    #[must_use]
    pub const fn new(completed: usize) -> Option<Self> {
        if completed == 0 || completed > CYCLE_LENGTH {
            None
        } else {
            #[allow(clippy::cast_possible_truncation)]
            Some(Self(completed as u8))
        }
    }

    #[must_use]
    pub const fn completed(self) -> usize {
        self.0 as usize
    }

    /// Label of the most recently completed step.
    #[must_use]
    pub const fn last_step(self) -> SequenceStep {
        CYCLE_STEPS[self.0 as usize - 1]
    }
}

impl fmt::Display for SequenceProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for step in &CYCLE_STEPS[..self.completed()] {
            f.write_str(step.label)?;
        }
        Ok(())
    }
}

/// Mirrors how many cycle steps the controller reports as done.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct SequenceTracker {
    reached: u8,
}

impl SequenceTracker {
    #[must_use]
    pub const fn new() -> Self {
        Self { reached: 0 }
    }

    /// Adopts the reported progress; returns `true` when the count changed.
    pub fn apply(&mut self, progress: SequenceProgress) -> bool {
        let changed = self.reached != progress.0;
        self.reached = progress.0;
        changed
    }

    /// Number of completed steps, in `0..=6`.
    #[must_use]
    pub const fn count(&self) -> usize {
        self.reached as usize
    }

    /// `true` when step `index` (zero-based) has completed.
    #[must_use]
    pub const fn reached(&self, index: usize) -> bool {
        index < self.count()
    }

    /// Per-step completion flags in cycle order.
    #[must_use]
    pub fn steps_reached(&self) -> [bool; CYCLE_LENGTH] {
        core::array::from_fn(|index| self.reached(index))
    }

    pub fn reset(&mut self) {
        self.reached = 0;
    }
}
