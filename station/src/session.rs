//! Host session: owns the supervisor, the frame source, and the telemetry cursor.

use std::fmt;
use std::time::{Duration, Instant};

use machine_core::actuators::StateChangeResult;
use machine_core::console::catalog::{self, CommandSpec};
use machine_core::console::commands::{CommandError, CommandExecutor, CommandOutcome};
use machine_core::console::grammar::ParseError;
use machine_core::link::LineLink;
use machine_core::supervisor::{DisplaySnapshot, StatusFormatter, Supervisor, TickOutcome};
use machine_core::telemetry::{EventId, Severity, TelemetryInstant, TelemetryRecord};
use machine_core::zones::ZoneClassifier;
use tracing::{debug, info, warn};

use crate::frames::FrameSource;

/// Monotonic host clock reading.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct HostInstant(Instant);

impl HostInstant {
    #[must_use]
    pub fn now() -> Self {
        Self(Instant::now())
    }
}

impl TelemetryInstant for HostInstant {
    fn saturating_duration_since(&self, earlier: Self) -> Duration {
        self.0.saturating_duration_since(earlier.0)
    }
}

pub struct Station<L: LineLink> {
    executor: CommandExecutor<Supervisor<L, HostInstant>>,
    frames: FrameSource,
    started_at: HostInstant,
    telemetry_cursor: EventId,
}

impl<L: LineLink> Station<L> {
    pub fn new(classifier: ZoneClassifier, link: L, frames: FrameSource) -> Self {
        Self {
            executor: CommandExecutor::new(Supervisor::new(classifier, link)),
            frames,
            started_at: HostInstant::now(),
            telemetry_cursor: 0,
        }
    }

    pub fn supervisor(&self) -> &Supervisor<L, HostInstant> {
        self.executor.surface()
    }

    /// Runs one sampling tick against the next frame.
    pub fn sample(&mut self, now: HostInstant) -> TickOutcome {
        let supervisor = self.executor.surface_mut();
        let packed = self
            .frames
            .next_frame()
            .and_then(|frame| frame.as_packed().ok());
        supervisor.sample_tick(packed.as_ref(), now)
    }

    /// Drains the serial link; returns the number of lines applied.
    pub fn poll_serial(&mut self, now: HostInstant) -> usize {
        self.executor.surface_mut().serial_tick(now)
    }

    /// Executes one console line and returns the text to show the operator.
    pub fn handle_command(&mut self, line: &str, now: HostInstant) -> Vec<String> {
        match self.executor.execute(line, now) {
            Ok(CommandOutcome::Started) => vec!["OK start".to_owned()],
            Ok(CommandOutcome::Stopped) => vec!["OK stop".to_owned()],
            Ok(CommandOutcome::EmergencyStopped) => vec!["OK stopE".to_owned()],
            Ok(CommandOutcome::Toggled(result)) => vec![describe_toggle(result)],
            Ok(CommandOutcome::Status(snapshot)) => status_lines(&snapshot),
            Ok(CommandOutcome::Help(topic)) => help_lines(topic),
            Err(CommandError::Parse(ParseError::Empty)) => Vec::new(),
            Err(error) => vec![format!("ERR {error}")],
        }
    }

    /// Mirrors telemetry recorded since the last drain into `tracing`.
    pub fn drain_telemetry(&mut self) {
        let telemetry = self.executor.surface().telemetry();
        for record in telemetry.records_since(self.telemetry_cursor) {
            log_record(record, self.started_at);
        }
        self.telemetry_cursor = telemetry.next_id();
    }
}

fn log_record(record: &TelemetryRecord<HostInstant>, started_at: HostInstant) {
    let elapsed = record.timestamp.saturating_duration_since(started_at);
    let at_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
    match record.event.severity() {
        Severity::Warn => warn!(id = record.id, at_ms, event = %record.event, details = ?record.details),
        Severity::Info => info!(id = record.id, at_ms, event = %record.event, details = ?record.details),
        Severity::Debug => debug!(id = record.id, at_ms, event = %record.event, details = ?record.details),
    }
}

fn describe_toggle(result: StateChangeResult) -> String {
    match result {
        StateChangeResult::Applied(change) if change.command.is_some() => {
            format!("OK {} {}", change.id.label(), change.current)
        }
        StateChangeResult::Applied(change) => {
            format!("OK {} {} (not sent)", change.id.label(), change.current)
        }
        StateChangeResult::Unchanged { id, state } => {
            format!("OK {} already {state}", id.label())
        }
    }
}

fn status_lines(snapshot: &DisplaySnapshot) -> Vec<String> {
    let formatter = StatusFormatter::new(snapshot);
    vec![
        render(|out| formatter.write_run_line(out)),
        render(|out| formatter.write_zones_line(out)),
        render(|out| formatter.write_actuators_line(out)),
        render(|out| formatter.write_sequence_line(out)),
    ]
}

fn render(write: impl FnOnce(&mut String) -> fmt::Result) -> String {
    let mut line = String::new();
    if write(&mut line).is_err() {
        line.clear();
    }
    line
}

fn help_lines(topic: Option<&'static CommandSpec>) -> Vec<String> {
    match topic {
        Some(spec) => vec![format!("{:<16} - {}", spec.usage, spec.summary)],
        None => {
            let mut lines = vec!["Available commands:".to_owned()];
            for spec in catalog::commands() {
                lines.push(format!("  {:<16} - {}", spec.usage, spec.summary));
            }
            lines.push("Type `help <command>` for one command, `exit` to quit.".to_owned());
            lines
        }
    }
}
