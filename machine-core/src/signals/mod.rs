//! Change-only transmission of boolean signals.
//!
//! Every tracked signal starts with no remembered value, so the first
//! observation always fires. Afterwards only transitions are reported, which
//! collapses runs of identical observations into a single event.

use core::fmt;

use crate::actuators::{ACTUATOR_COUNT, ActuatorId};
use crate::zones::{ZONE_COUNT, ZoneRole};

/// Number of signals the notifier can track.
pub const MAX_SIGNALS: usize = ZONE_COUNT + ACTUATOR_COUNT;

/// Identity of a tracked boolean channel.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SignalId {
    Zone(ZoneRole),
    Actuator(ActuatorId),
}

impl SignalId {
    /// Dense index into the notifier's memory.
    #[must_use]
    pub const fn as_index(self) -> usize {
        match self {
            SignalId::Zone(role) => role.as_index(),
            SignalId::Actuator(id) => ZONE_COUNT + id.as_index(),
        }
    }

    #[must_use]
    pub const fn from_index(index: usize) -> Option<Self> {
        if index < ZONE_COUNT {
            match ZoneRole::from_index(index) {
                Some(role) => Some(SignalId::Zone(role)),
                None => None,
            }
        } else {
            match ActuatorId::from_index(index - ZONE_COUNT) {
                Some(id) => Some(SignalId::Actuator(id)),
                None => None,
            }
        }
    }
}

impl fmt::Display for SignalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalId::Zone(role) => write!(f, "zone {role}"),
            SignalId::Actuator(id) => f.write_str(id.label()),
        }
    }
}

/// Transition reported by [`EdgeNotifier::observe`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct EdgeEvent {
    pub signal: SignalId,
    pub value: bool,
}

/// Remembers the last emitted value per signal.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct EdgeNotifier {
    last_sent: [Option<bool>; MAX_SIGNALS],
}

impl EdgeNotifier {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            last_sent: [None; MAX_SIGNALS],
        }
    }

    /// Reports `(signal, value)` when it differs from the remembered value.
    pub fn observe(&mut self, signal: SignalId, value: bool) -> Option<EdgeEvent> {
        let slot = &mut self.last_sent[signal.as_index()];
        if *slot == Some(value) {
            return None;
        }

        *slot = Some(value);
        Some(EdgeEvent { signal, value })
    }

    /// Last emitted value, `None` until the first observation.
    #[must_use]
    pub const fn last_sent(&self, signal: SignalId) -> Option<bool> {
        self.last_sent[signal.as_index()]
    }

    /// Drops the remembered value so the next observation fires again.
    ///
    /// Used when an emitted event never made it onto the wire.
    pub fn forget(&mut self, signal: SignalId) {
        self.last_sent[signal.as_index()] = None;
    }

    /// Forgets every signal.
    pub fn reset(&mut self) {
        self.last_sent = [None; MAX_SIGNALS];
    }
}
