use core::fmt::{self, Write as _};

use crate::actuators::{ActuatorCommand, ActuatorId, ActuatorState};
use crate::zones::{DetectionResult, ZoneRole};

use super::{MAX_LINE_LEN, WireLine};

/// Message the station sends to the controller.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum OutgoingMessage {
    /// Per-tick heartbeat, `Carga: {0|1}, Sellado: {0|1}`.
    Status { carga: bool, sellado: bool },
    /// Zone transition, `H{0|1}` for Carga and `S{0|1}` for Sellado.
    ZoneEdge { role: ZoneRole, detected: bool },
    Start,
    Stop,
    EmergencyStop,
    /// Operator toggle, `{label}_ON` / `{label}_OFF`.
    Actuator { id: ActuatorId, state: ActuatorState },
}

impl OutgoingMessage {
    /// Heartbeat for a classified frame.
    #[must_use]
    pub const fn status(result: &DetectionResult) -> Self {
        OutgoingMessage::Status {
            carga: result.detected(ZoneRole::Carga),
            sellado: result.detected(ZoneRole::Sellado),
        }
    }

    /// Renders the message followed by the `\n` terminator.
    pub fn encode(&self) -> Result<WireLine, EncodeError> {
        let mut line = WireLine::new();
        write!(line, "{self}").map_err(|_| EncodeError::LineTooLong)?;
        line.push('\n').map_err(|_| EncodeError::LineTooLong)?;
        Ok(line)
    }
}

impl From<ActuatorCommand> for OutgoingMessage {
    fn from(command: ActuatorCommand) -> Self {
        OutgoingMessage::Actuator {
            id: command.id,
            state: command.state,
        }
    }
}

impl fmt::Display for OutgoingMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutgoingMessage::Status { carga, sellado } => {
                write!(
                    f,
                    "Carga: {}, Sellado: {}",
                    u8::from(*carga),
                    u8::from(*sellado)
                )
            }
            OutgoingMessage::ZoneEdge { role, detected } => {
                write!(f, "{}{}", edge_prefix(*role), u8::from(*detected))
            }
            OutgoingMessage::Start => f.write_str("start"),
            OutgoingMessage::Stop => f.write_str("stop"),
            OutgoingMessage::EmergencyStop => f.write_str("stopE"),
            OutgoingMessage::Actuator { id, state } => {
                write!(f, "{}_{}", id.label(), state.keyword())
            }
        }
    }
}

/// Single-letter prefix used for zone edge messages.
#[must_use]
pub const fn edge_prefix(role: ZoneRole) -> char {
    match role {
        ZoneRole::Carga => 'H',
        ZoneRole::Sellado => 'S',
    }
}

/// Message does not fit in a wire line.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum EncodeError {
    LineTooLong,
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncodeError::LineTooLong => write!(f, "message exceeds {MAX_LINE_LEN} bytes"),
        }
    }
}
