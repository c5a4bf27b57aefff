//! Solenoid catalog and the commanded-state machine.
//!
//! Operator toggles and hardware echoes both flow through
//! [`ActuatorBank::apply`]. Echoes are applied with the actuator's
//! suppress-echo flag raised, so the shared commit path updates the model
//! without producing a command that would bounce back to the controller.

use core::fmt;

/// Identifier for the solenoids driven by the controller.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ActuatorId {
    A,
    B,
    C,
}

impl ActuatorId {
    /// Deterministic index for lookups into [`ALL_ACTUATORS`].
    #[must_use]
    pub const fn as_index(self) -> usize {
        match self {
            ActuatorId::A => 0,
            ActuatorId::B => 1,
            ActuatorId::C => 2,
        }
    }

    #[must_use]
    pub const fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(ActuatorId::A),
            1 => Some(ActuatorId::B),
            2 => Some(ActuatorId::C),
            _ => None,
        }
    }

    /// Compact code used by controller echoes (`A` in `AON`).
    #[must_use]
    pub const fn code(self) -> &'static str {
        actuator_by_id(self).code
    }

    /// Display label, also used as the command prefix (`Solenoid A_ON`).
    #[must_use]
    pub const fn label(self) -> &'static str {
        actuator_by_id(self).label
    }

    /// Resolves either the compact code or the full label (case insensitive).
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        ALL_ACTUATORS
            .iter()
            .find(|line| line.code.eq_ignore_ascii_case(name) || line.label.eq_ignore_ascii_case(name))
            .map(|line| line.id)
    }
}

impl fmt::Display for ActuatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Wire naming for one solenoid.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ActuatorLine {
    pub id: ActuatorId,
    pub code: &'static str,
    pub label: &'static str,
}

impl ActuatorLine {
    #[must_use]
    pub const fn new(id: ActuatorId, code: &'static str, label: &'static str) -> Self {
        Self { id, code, label }
    }
}

/// Number of solenoids on the station.
pub const ACTUATOR_COUNT: usize = 3;

/// Compile-time catalog of every solenoid.
pub const ALL_ACTUATORS: [ActuatorLine; ACTUATOR_COUNT] = [
    ActuatorLine::new(ActuatorId::A, "A", "Solenoid A"),
    ActuatorLine::new(ActuatorId::B, "B", "Solenoid B"),
    ActuatorLine::new(ActuatorId::C, "C", "Solenoid C"),
];

/// Retrieve solenoid naming by identifier.
#[must_use]
pub const fn actuator_by_id(id: ActuatorId) -> ActuatorLine {
    ALL_ACTUATORS[id.as_index()]
}

/// Commanded solenoid state.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum ActuatorState {
    #[default]
    Off,
    On,
}

impl ActuatorState {
    #[must_use]
    pub const fn is_on(self) -> bool {
        matches!(self, ActuatorState::On)
    }

    #[must_use]
    pub const fn toggled(self) -> Self {
        match self {
            ActuatorState::On => ActuatorState::Off,
            ActuatorState::Off => ActuatorState::On,
        }
    }

    /// Wire keyword (`ON` / `OFF`).
    #[must_use]
    pub const fn keyword(self) -> &'static str {
        match self {
            ActuatorState::On => "ON",
            ActuatorState::Off => "OFF",
        }
    }
}

impl fmt::Display for ActuatorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// Where a state change came from.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ChangeOrigin {
    Operator,
    HardwareEcho,
}

/// Command the controller must receive for a change.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ActuatorCommand {
    pub id: ActuatorId,
    pub state: ActuatorState,
}

/// Applied transition.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct StateChange {
    pub id: ActuatorId,
    pub previous: ActuatorState,
    pub current: ActuatorState,
    pub origin: ChangeOrigin,
    /// `None` when the change restates what the hardware already reported.
    pub command: Option<ActuatorCommand>,
}

/// Result of [`ActuatorBank::apply`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum StateChangeResult {
    /// The requested state was already current.
    Unchanged {
        id: ActuatorId,
        state: ActuatorState,
    },
    Applied(StateChange),
}

impl StateChangeResult {
    /// Command to transmit, if any.
    #[must_use]
    pub const fn command(&self) -> Option<ActuatorCommand> {
        match self {
            StateChangeResult::Unchanged { .. } => None,
            StateChangeResult::Applied(change) => change.command,
        }
    }
}

/// One solenoid in the bank.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Actuator {
    pub id: ActuatorId,
    pub state: ActuatorState,
    suppress_echo: bool,
}

impl Actuator {
    #[must_use]
    pub const fn new(id: ActuatorId) -> Self {
        Self {
            id,
            state: ActuatorState::Off,
            suppress_echo: false,
        }
    }
}

/// Commanded state of every solenoid.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ActuatorBank {
    actuators: [Actuator; ACTUATOR_COUNT],
}

impl ActuatorBank {
    /// Creates a bank with every solenoid OFF.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            actuators: [
                Actuator::new(ActuatorId::A),
                Actuator::new(ActuatorId::B),
                Actuator::new(ActuatorId::C),
            ],
        }
    }

    #[must_use]
    pub const fn state(&self, id: ActuatorId) -> ActuatorState {
        self.actuators[id.as_index()].state
    }

    /// States indexed by [`ActuatorId::as_index`].
    #[must_use]
    pub fn states(&self) -> [ActuatorState; ACTUATOR_COUNT] {
        self.actuators.map(|actuator| actuator.state)
    }

    /// Flips a solenoid on operator request.
    pub fn toggle(&mut self, id: ActuatorId) -> StateChangeResult {
        let target = self.state(id).toggled();
        self.apply(id, target, ChangeOrigin::Operator)
    }

    /// Moves `id` to `state`; a no-op when it is already there.
    pub fn apply(
        &mut self,
        id: ActuatorId,
        state: ActuatorState,
        origin: ChangeOrigin,
    ) -> StateChangeResult {
        if self.state(id) == state {
            return StateChangeResult::Unchanged { id, state };
        }

        match origin {
            ChangeOrigin::Operator => StateChangeResult::Applied(self.commit(id, state, origin)),
            ChangeOrigin::HardwareEcho => {
                self.actuators[id.as_index()].suppress_echo = true;
                let change = self.commit(id, state, origin);
                self.actuators[id.as_index()].suppress_echo = false;
                StateChangeResult::Applied(change)
            }
        }
    }

    fn commit(&mut self, id: ActuatorId, state: ActuatorState, origin: ChangeOrigin) -> StateChange {
        let actuator = &mut self.actuators[id.as_index()];
        let previous = actuator.state;
        actuator.state = state;

        let command = if actuator.suppress_echo {
            None
        } else {
            Some(ActuatorCommand { id, state })
        };

        StateChange {
            id,
            previous,
            current: state,
            origin,
            command,
        }
    }
}

impl Default for ActuatorBank {
    fn default() -> Self {
        Self::new()
    }
}
