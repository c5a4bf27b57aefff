//! Console command dispatcher.
//!
//! Parsed commands are applied to anything implementing [`ControlSurface`].
//! The supervisor is the production surface; tests use a recording fake.

use core::fmt;

use crate::actuators::{ActuatorId, StateChangeResult};
use crate::link::LineLink;
use crate::supervisor::{DisplaySnapshot, Supervisor};
use crate::telemetry::TelemetryInstant;

use super::catalog::{self, CommandSpec};
use super::grammar::{self, Command};

/// Result of a successfully executed console line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandOutcome {
    Started,
    Stopped,
    EmergencyStopped,
    Toggled(StateChangeResult),
    Status(DisplaySnapshot),
    /// `None` lists every command.
    Help(Option<&'static CommandSpec>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommandError<'a> {
    Parse(grammar::ParseError<'a>),
    UnknownTopic(&'a str),
}

impl<'a> From<grammar::ParseError<'a>> for CommandError<'a> {
    fn from(error: grammar::ParseError<'a>) -> Self {
        Self::Parse(error)
    }
}

impl fmt::Display for CommandError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::Parse(error) => error.fmt(f),
            CommandError::UnknownTopic(topic) => write!(f, "no help for `{topic}`"),
        }
    }
}

/// Operations the console can drive.
pub trait ControlSurface {
    type Instant: Copy;

    fn start(&mut self, now: Self::Instant);
    fn stop(&mut self, now: Self::Instant);
    fn emergency_stop(&mut self, now: Self::Instant);
    fn toggle(&mut self, id: ActuatorId, now: Self::Instant) -> StateChangeResult;
    fn snapshot(&self) -> DisplaySnapshot;
}

impl<L, TInstant> ControlSurface for Supervisor<L, TInstant>
where
    L: LineLink,
    TInstant: TelemetryInstant,
{
    type Instant = TInstant;

    fn start(&mut self, now: TInstant) {
        Supervisor::start(self, now);
    }

    fn stop(&mut self, now: TInstant) {
        Supervisor::stop(self, now);
    }

    fn emergency_stop(&mut self, now: TInstant) {
        Supervisor::emergency_stop(self, now);
    }

    fn toggle(&mut self, id: ActuatorId, now: TInstant) -> StateChangeResult {
        self.toggle_actuator(id, now)
    }

    fn snapshot(&self) -> DisplaySnapshot {
        Supervisor::snapshot(self)
    }
}

/// Parses console lines and applies them to a surface.
pub struct CommandExecutor<S> {
    surface: S,
}

impl<S> CommandExecutor<S> {
    #[must_use]
    pub const fn new(surface: S) -> Self {
        Self { surface }
    }

    #[must_use]
    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }
}

impl<S> CommandExecutor<S>
where
    S: ControlSurface,
{
    /// Parses and executes one console line.
    pub fn execute<'a>(
        &mut self,
        line: &'a str,
        now: S::Instant,
    ) -> Result<CommandOutcome, CommandError<'a>> {
        let command = grammar::parse(line)?;
        self.dispatch(command, now)
    }

    fn dispatch<'a>(
        &mut self,
        command: Command<'a>,
        now: S::Instant,
    ) -> Result<CommandOutcome, CommandError<'a>> {
        match command {
            Command::Start => {
                self.surface.start(now);
                Ok(CommandOutcome::Started)
            }
            Command::Stop => {
                self.surface.stop(now);
                Ok(CommandOutcome::Stopped)
            }
            Command::EmergencyStop => {
                self.surface.emergency_stop(now);
                Ok(CommandOutcome::EmergencyStopped)
            }
            Command::Toggle(id) => Ok(CommandOutcome::Toggled(self.surface.toggle(id, now))),
            Command::Status => Ok(CommandOutcome::Status(self.surface.snapshot())),
            Command::Help(help) => match help.topic {
                None => Ok(CommandOutcome::Help(None)),
                Some(topic) => catalog::find(topic)
                    .map(|spec| CommandOutcome::Help(Some(spec)))
                    .ok_or(CommandError::UnknownTopic(topic)),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actuators::{ActuatorBank, ChangeOrigin};
    use crate::console::catalog::CommandTag;
    use crate::console::grammar::ParseError;
    use heapless::Vec as HeaplessVec;

    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    enum Call {
        Start(u32),
        Stop(u32),
        EmergencyStop(u32),
        Toggle(ActuatorId, u32),
    }

    #[derive(Default)]
    struct RecordingSurface {
        calls: HeaplessVec<Call, 8>,
        bank: ActuatorBank,
    }

    impl ControlSurface for RecordingSurface {
        type Instant = u32;

        fn start(&mut self, now: u32) {
            self.calls.push(Call::Start(now)).expect("capacity");
        }

        fn stop(&mut self, now: u32) {
            self.calls.push(Call::Stop(now)).expect("capacity");
        }

        fn emergency_stop(&mut self, now: u32) {
            self.calls.push(Call::EmergencyStop(now)).expect("capacity");
        }

        fn toggle(&mut self, id: ActuatorId, now: u32) -> StateChangeResult {
            self.calls.push(Call::Toggle(id, now)).expect("capacity");
            let target = self.bank.state(id).toggled();
            self.bank.apply(id, target, ChangeOrigin::Operator)
        }

        fn snapshot(&self) -> DisplaySnapshot {
            let mut snapshot = DisplaySnapshot::initial(false);
            for sample in &mut snapshot.actuators {
                sample.state = self.bank.state(sample.id);
            }
            snapshot
        }
    }

    fn executor() -> CommandExecutor<RecordingSurface> {
        CommandExecutor::new(RecordingSurface::default())
    }

    #[test]
    fn run_control_reaches_surface() {
        let mut executor = executor();
        assert_eq!(executor.execute("start", 1), Ok(CommandOutcome::Started));
        assert_eq!(executor.execute("estop", 2), Ok(CommandOutcome::EmergencyStopped));
        assert_eq!(executor.execute("Stop", 3), Ok(CommandOutcome::Stopped));
        assert_eq!(
            executor.surface().calls.as_slice(),
            &[Call::Start(1), Call::EmergencyStop(2), Call::Stop(3)]
        );
    }

    #[test]
    fn toggle_reports_change_with_command() {
        let mut executor = executor();
        let outcome = executor.execute("toggle a", 5).expect("toggle");
        let CommandOutcome::Toggled(result) = outcome else {
            panic!("unexpected outcome: {outcome:?}");
        };
        assert!(result.command().is_some());

        let CommandOutcome::Status(snapshot) = executor.execute("status", 6).expect("status")
        else {
            panic!("status should return a snapshot");
        };
        assert!(snapshot.actuator(ActuatorId::A).is_on());
    }

    #[test]
    fn help_resolves_topics() {
        let mut executor = executor();
        assert_eq!(executor.execute("help", 0), Ok(CommandOutcome::Help(None)));
        match executor.execute("help TOGGLE", 0) {
            Ok(CommandOutcome::Help(Some(spec))) => assert_eq!(spec.tag, CommandTag::Toggle),
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(
            executor.execute("help reboot", 0),
            Err(CommandError::UnknownTopic("reboot"))
        );
    }

    #[test]
    fn parse_errors_leave_surface_untouched() {
        let mut executor = executor();
        assert!(matches!(
            executor.execute("toggle z", 0),
            Err(CommandError::Parse(ParseError::Grammar(_)))
        ));
        assert_eq!(
            executor.execute("", 0),
            Err(CommandError::Parse(ParseError::Empty))
        );
        assert!(executor.surface().calls.is_empty());
    }
}
