//! Decoder for lines reported by the controller.
//!
//! Each alternative is driven by a const table (solenoid catalog, cycle
//! steps) so adding a solenoid or a step never touches the grammar.

use winnow::combinator::{alt, fail, opt, separated_pair};
use winnow::prelude::*;
use winnow::token::literal;

use crate::actuators::{ALL_ACTUATORS, ActuatorId, ActuatorState};
use crate::sequences::{CYCLE_STEPS, SequenceProgress};

/// Solenoid state reported by the hardware.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ActuatorEcho {
    pub id: ActuatorId,
    pub state: ActuatorState,
}

/// Typed result of decoding one incoming line.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum IncomingEvent<'a> {
    Actuator(ActuatorEcho),
    Sequence(SequenceProgress),
    /// Anything else; carries the trimmed line for logging.
    Unrecognized(&'a str),
}

/// Decodes a framed line, ignoring surrounding whitespace and `\r`.
#[must_use]
pub fn decode(line: &str) -> IncomingEvent<'_> {
    let trimmed = line.trim();
    alt((
        actuator_echo.map(IncomingEvent::Actuator),
        sequence_progress.map(IncomingEvent::Sequence),
    ))
    .parse(trimmed)
    .unwrap_or(IncomingEvent::Unrecognized(trimmed))
}

fn actuator_echo(input: &mut &str) -> ModalResult<ActuatorEcho> {
    alt((
        (actuator_code, state_keyword),
        separated_pair(actuator_label, '_', state_keyword),
    ))
    .map(|(id, state)| ActuatorEcho { id, state })
    .parse_next(input)
}

/// Compact echo form, `AON`.
fn actuator_code(input: &mut &str) -> ModalResult<ActuatorId> {
    alt(ALL_ACTUATORS.map(|line| literal(line.code).value(line.id))).parse_next(input)
}

/// Command form, `Solenoid A_ON`.
fn actuator_label(input: &mut &str) -> ModalResult<ActuatorId> {
    alt(ALL_ACTUATORS.map(|line| literal(line.label).value(line.id))).parse_next(input)
}

fn state_keyword(input: &mut &str) -> ModalResult<ActuatorState> {
    alt(("ON".value(ActuatorState::On), "OFF".value(ActuatorState::Off))).parse_next(input)
}

/// Longest run of cycle labels in order, starting from the first step.
fn sequence_progress(input: &mut &str) -> ModalResult<SequenceProgress> {
    let mut completed = 0;
    for step in &CYCLE_STEPS {
        if opt(literal(step.label)).parse_next(input)?.is_none() {
            break;
        }
        completed += 1;
    }

    match SequenceProgress::new(completed) {
        Some(progress) => Ok(progress),
        None => fail.parse_next(input),
    }
}
