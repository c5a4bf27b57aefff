//! Structured event log kept by the supervisor.
//!
//! Every run-control action, wire message, state change, and recoverable
//! fault lands in a fixed-size ring as a [`TelemetryRecord`]. Hosts drain the
//! ring after each tick (see [`TelemetryRecorder::records_since`]) and mirror
//! the records into their own logging.

use core::{fmt, time::Duration};

use heapless::{HistoryBuf, OldestOrdered, String};

use crate::actuators::{ActuatorId, ActuatorState, ChangeOrigin, StateChange};
use crate::link::LinkError;
use crate::protocol::FramingError;
use crate::signals::SignalId;
use crate::zones::{ClassifyError, ZoneRole};

/// Monotonic record identifier.
pub type EventId = u64;

/// Total number of telemetry entries retained in memory.
pub const TELEMETRY_RING_CAPACITY: usize = 128;

/// Longest slice of a rejected line kept in a record.
pub const MAX_LINE_EXCERPT: usize = 32;

/// Truncated copy of an incoming line.
pub type LineExcerpt = String<MAX_LINE_EXCERPT>;

/// Discriminated telemetry events.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TelemetryEventKind {
    RunStarted,
    RunStopped,
    EmergencyStop,
    StatusSent,
    ZoneEdge { role: ZoneRole, detected: bool },
    ActuatorChanged { id: ActuatorId, state: ActuatorState },
    EchoIgnored(ActuatorId),
    SequenceAdvanced(u8),
    LineRejected,
    FrameSkipped,
    LinkFault,
}

impl fmt::Display for TelemetryEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryEventKind::RunStarted => f.write_str("run-started"),
            TelemetryEventKind::RunStopped => f.write_str("run-stopped"),
            TelemetryEventKind::EmergencyStop => f.write_str("emergency-stop"),
            TelemetryEventKind::StatusSent => f.write_str("status-sent"),
            TelemetryEventKind::ZoneEdge { role, detected } => {
                write!(f, "zone-edge {role}={}", u8::from(*detected))
            }
            TelemetryEventKind::ActuatorChanged { id, state } => {
                write!(f, "actuator-changed {}={state}", id.label())
            }
            TelemetryEventKind::EchoIgnored(id) => write!(f, "echo-ignored {}", id.label()),
            TelemetryEventKind::SequenceAdvanced(count) => write!(f, "sequence-advanced {count}"),
            TelemetryEventKind::LineRejected => f.write_str("line-rejected"),
            TelemetryEventKind::FrameSkipped => f.write_str("frame-skipped"),
            TelemetryEventKind::LinkFault => f.write_str("link-fault"),
        }
    }
}

/// How loudly a host should report an event.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub enum Severity {
    Debug,
    Info,
    Warn,
}

impl TelemetryEventKind {
    #[must_use]
    pub const fn severity(self) -> Severity {
        match self {
            TelemetryEventKind::LinkFault | TelemetryEventKind::FrameSkipped => Severity::Warn,
            TelemetryEventKind::LineRejected
            | TelemetryEventKind::StatusSent
            | TelemetryEventKind::EchoIgnored(_) => Severity::Debug,
            _ => Severity::Info,
        }
    }
}

/// Why a sampling tick produced no status.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FrameSkipReason {
    Unavailable,
    Rejected(ClassifyError),
}

impl fmt::Display for FrameSkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameSkipReason::Unavailable => f.write_str("no frame"),
            FrameSkipReason::Rejected(error) => error.fmt(f),
        }
    }
}

/// Actuator transition payload.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ActuatorTelemetry {
    pub origin: ChangeOrigin,
    pub command_sent: bool,
    pub elapsed_since_previous: Option<Duration>,
}

/// Payloads carried alongside telemetry events.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TelemetryPayload {
    None,
    Actuator(ActuatorTelemetry),
    Line(LineExcerpt),
    Framing(FramingError),
    Frame(FrameSkipReason),
    /// Link failure, with the signal whose edge was not delivered if any.
    Link {
        error: LinkError,
        signal: Option<SignalId>,
    },
}

/// Trait implemented by monotonic instant wrappers used for telemetry tracking.
pub trait TelemetryInstant: Copy {
    /// Returns the saturating duration from `earlier` to `self`.
    fn saturating_duration_since(&self, earlier: Self) -> Duration;
}

/// Telemetry record stored in the ring buffer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TelemetryRecord<TInstant>
where
    TInstant: Copy,
{
    pub id: EventId,
    pub timestamp: TInstant,
    pub event: TelemetryEventKind,
    pub details: TelemetryPayload,
}

/// Telemetry ring buffer type alias.
pub type TelemetryRing<TInstant, const CAPACITY: usize = TELEMETRY_RING_CAPACITY> =
    HistoryBuf<TelemetryRecord<TInstant>, CAPACITY>;

/// Records telemetry events into a fixed-size ring buffer.
pub struct TelemetryRecorder<TInstant, const CAPACITY: usize = TELEMETRY_RING_CAPACITY>
where
    TInstant: Copy,
{
    ring: TelemetryRing<TInstant, CAPACITY>,
    last_actuation_at: Option<TInstant>,
    next_event_id: EventId,
}

impl<TInstant, const CAPACITY: usize> TelemetryRecorder<TInstant, CAPACITY>
where
    TInstant: TelemetryInstant,
{
    /// Creates a new telemetry recorder with an empty history.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ring: HistoryBuf::new(),
            last_actuation_at: None,
            next_event_id: 0,
        }
    }

    /// Returns an iterator over the recorded telemetry in chronological order.
    pub fn oldest_first(&self) -> OldestOrdered<'_, TelemetryRecord<TInstant>> {
        self.ring.oldest_ordered()
    }

    /// Records with an id at or after `next`, oldest first.
    ///
    /// Hosts keep the id following the last record they saw and pass it back
    /// on the next drain. Records evicted from the ring in between are lost.
    pub fn records_since(
        &self,
        next: EventId,
    ) -> impl Iterator<Item = &TelemetryRecord<TInstant>> + '_ {
        self.ring.oldest_ordered().filter(move |record| record.id >= next)
    }

    /// Id the next record will receive.
    #[must_use]
    pub const fn next_id(&self) -> EventId {
        self.next_event_id
    }

    /// Returns the most recent telemetry record, if available.
    pub fn latest(&self) -> Option<&TelemetryRecord<TInstant>> {
        self.ring.recent()
    }

    /// Returns the number of records currently stored.
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    /// Returns `true` when no telemetry records are stored.
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Records an actuator transition with the time since the previous one.
    pub fn record_actuator_change(&mut self, change: &StateChange, timestamp: TInstant) -> EventId {
        let elapsed = self
            .last_actuation_at
            .map(|previous| timestamp.saturating_duration_since(previous));
        self.last_actuation_at = Some(timestamp);

        let payload = TelemetryPayload::Actuator(ActuatorTelemetry {
            origin: change.origin,
            command_sent: change.command.is_some(),
            elapsed_since_previous: elapsed,
        });
        self.record(
            TelemetryEventKind::ActuatorChanged {
                id: change.id,
                state: change.current,
            },
            payload,
            timestamp,
        )
    }

    /// Records an incoming line the decoder did not recognize.
    pub fn record_rejected_line(&mut self, line: &str, timestamp: TInstant) -> EventId {
        self.record(
            TelemetryEventKind::LineRejected,
            TelemetryPayload::Line(excerpt(line)),
            timestamp,
        )
    }

    /// Records bytes the framer had to discard.
    pub fn record_framing_error(&mut self, error: FramingError, timestamp: TInstant) -> EventId {
        self.record(
            TelemetryEventKind::LineRejected,
            TelemetryPayload::Framing(error),
            timestamp,
        )
    }

    pub fn record_frame_skipped(&mut self, reason: FrameSkipReason, timestamp: TInstant) -> EventId {
        self.record(
            TelemetryEventKind::FrameSkipped,
            TelemetryPayload::Frame(reason),
            timestamp,
        )
    }

    pub fn record_link_fault(
        &mut self,
        error: LinkError,
        signal: Option<SignalId>,
        timestamp: TInstant,
    ) -> EventId {
        self.record(
            TelemetryEventKind::LinkFault,
            TelemetryPayload::Link { error, signal },
            timestamp,
        )
    }

    /// Records an arbitrary telemetry event with the supplied payload.
    pub fn record(
        &mut self,
        event: TelemetryEventKind,
        payload: TelemetryPayload,
        timestamp: TInstant,
    ) -> EventId {
        let id = self.next_event_id;
        self.next_event_id = self.next_event_id.wrapping_add(1);

        self.ring.write(TelemetryRecord {
            id,
            timestamp,
            event,
            details: payload,
        });

        id
    }
}

impl<TInstant, const CAPACITY: usize> Default for TelemetryRecorder<TInstant, CAPACITY>
where
    TInstant: TelemetryInstant,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Copies the longest prefix of `line` that fits, cut on a char boundary.
#[must_use]
pub fn excerpt(line: &str) -> LineExcerpt {
    let mut end = line.len().min(MAX_LINE_EXCERPT);
    while !line.is_char_boundary(end) {
        end -= 1;
    }

    let mut out = LineExcerpt::new();
    // The prefix fits by construction.
    let _ = out.push_str(&line[..end]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd)]
    struct MicrosInstant(u64);

    impl TelemetryInstant for MicrosInstant {
        fn saturating_duration_since(&self, earlier: Self) -> Duration {
            Duration::from_micros(self.0.saturating_sub(earlier.0))
        }
    }

    fn change(id: ActuatorId, current: ActuatorState, origin: ChangeOrigin) -> StateChange {
        StateChange {
            id,
            previous: current.toggled(),
            current,
            origin,
            command: None,
        }
    }

    #[test]
    fn records_elapsed_between_actuations() {
        let mut recorder = TelemetryRecorder::<MicrosInstant>::new();

        let first = recorder.record_actuator_change(
            &change(ActuatorId::A, ActuatorState::On, ChangeOrigin::Operator),
            MicrosInstant(100),
        );
        assert_eq!(first, 0);
        match recorder.latest().map(|record| &record.details) {
            Some(TelemetryPayload::Actuator(details)) => {
                assert_eq!(details.elapsed_since_previous, None);
                assert!(!details.command_sent);
            }
            other => panic!("expected actuator payload, got {other:?}"),
        }

        recorder.record_actuator_change(
            &change(ActuatorId::B, ActuatorState::Off, ChangeOrigin::HardwareEcho),
            MicrosInstant(250),
        );
        let latest = recorder.latest().expect("record");
        assert_eq!(
            latest.event,
            TelemetryEventKind::ActuatorChanged {
                id: ActuatorId::B,
                state: ActuatorState::Off
            }
        );
        match &latest.details {
            TelemetryPayload::Actuator(details) => {
                assert_eq!(details.origin, ChangeOrigin::HardwareEcho);
                let elapsed = details.elapsed_since_previous.expect("missing elapsed");
                assert_eq!(elapsed.as_micros(), 150);
            }
            other => panic!("expected actuator payload, got {other:?}"),
        }
    }

    #[test]
    fn records_since_skips_seen_entries() {
        let mut recorder = TelemetryRecorder::<MicrosInstant, 4>::new();
        for tick in 0..3 {
            recorder.record(
                TelemetryEventKind::StatusSent,
                TelemetryPayload::None,
                MicrosInstant(tick),
            );
        }
        let next = recorder.next_id();
        assert_eq!(next, 3);

        recorder.record(
            TelemetryEventKind::RunStopped,
            TelemetryPayload::None,
            MicrosInstant(10),
        );
        let fresh: heapless::Vec<EventId, 4> =
            recorder.records_since(next).map(|record| record.id).collect();
        assert_eq!(fresh.as_slice(), &[3]);
    }

    #[test]
    fn ring_keeps_most_recent_records() {
        let mut recorder = TelemetryRecorder::<MicrosInstant, 2>::new();
        for tick in 0..5 {
            recorder.record(
                TelemetryEventKind::FrameSkipped,
                TelemetryPayload::Frame(FrameSkipReason::Unavailable),
                MicrosInstant(tick),
            );
        }
        assert_eq!(recorder.len(), 2);
        let ids: heapless::Vec<EventId, 2> =
            recorder.oldest_first().map(|record| record.id).collect();
        assert_eq!(ids.as_slice(), &[3, 4]);
    }

    #[test]
    fn long_lines_are_truncated_on_char_boundaries() {
        let line = "ñññññññññññññññññññññññññññññ";
        let short = excerpt(line);
        assert!(short.len() <= MAX_LINE_EXCERPT);
        assert!(line.starts_with(short.as_str()));
        assert_eq!(excerpt("HX").as_str(), "HX");
    }

    #[test]
    fn severities_follow_event_kind() {
        assert_eq!(TelemetryEventKind::LinkFault.severity(), Severity::Warn);
        assert_eq!(TelemetryEventKind::LineRejected.severity(), Severity::Debug);
        assert_eq!(TelemetryEventKind::RunStarted.severity(), Severity::Info);
    }
}
