//! Single owner of the station state.
//!
//! The host drives two periodic ticks: [`Supervisor::sample_tick`] runs the
//! frame through the classifier and emits the heartbeat plus zone edges,
//! [`Supervisor::serial_tick`] drains the link and applies what the
//! controller reported. Operator actions arrive through the run-control
//! methods. Nothing here blocks or allocates, and no failure is fatal: link
//! and frame problems are recorded as telemetry and the next tick carries on.

pub mod status;

use crate::actuators::{
    ALL_ACTUATORS, ActuatorBank, ActuatorId, ActuatorState, ChangeOrigin, StateChangeResult,
};
use crate::link::{LineLink, LinkError};
use crate::protocol::{IncomingEvent, LineFramer, OutgoingMessage, decode};
use crate::sequences::SequenceTracker;
use crate::signals::{EdgeNotifier, SignalId};
use crate::telemetry::{
    FrameSkipReason, TelemetryEventKind, TelemetryInstant, TelemetryPayload, TelemetryRecorder,
};
use crate::zones::{
    ALL_ROLES, Coverage, DetectionResult, Frame, ZONE_COUNT, ZoneClassifier, ZoneRole,
};

pub use status::{ActuatorSample, DisplaySnapshot, StatusFormatter, ZoneSample};

/// Bytes pulled from the link per read call.
pub const READ_CHUNK: usize = 64;

/// Upper bound on read calls per serial tick so a chatty link cannot starve sampling.
pub const MAX_READS_PER_TICK: usize = 16;

/// Zone edges go out Carga first, matching the controller's expectations.
const EDGE_ORDER: [ZoneRole; ZONE_COUNT] = [ZoneRole::Carga, ZoneRole::Sellado];

/// Result of one sampling tick.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TickOutcome {
    /// No usable frame; nothing was sent.
    Skipped(FrameSkipReason),
    Classified(DetectionResult),
}

/// Toggle request naming a solenoid that does not exist.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct UnknownActuator;

impl core::fmt::Display for UnknownActuator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("unknown solenoid")
    }
}

/// Station state machine bound to one link.
pub struct Supervisor<L, TInstant>
where
    L: LineLink,
    TInstant: TelemetryInstant,
{
    classifier: ZoneClassifier,
    notifier: EdgeNotifier,
    actuators: ActuatorBank,
    sequence: SequenceTracker,
    telemetry: TelemetryRecorder<TInstant>,
    framer: LineFramer,
    link: L,
    /// Set by the first failed transfer, cleared by the next successful write.
    link_faulted: bool,
    running: bool,
    zones: [bool; ZONE_COUNT],
    coverage: [Coverage; ZONE_COUNT],
}

impl<L, TInstant> Supervisor<L, TInstant>
where
    L: LineLink,
    TInstant: TelemetryInstant,
{
    /// Creates a stopped supervisor with every solenoid OFF.
    #[must_use]
    pub fn new(classifier: ZoneClassifier, link: L) -> Self {
        Self {
            classifier,
            notifier: EdgeNotifier::new(),
            actuators: ActuatorBank::new(),
            sequence: SequenceTracker::new(),
            telemetry: TelemetryRecorder::new(),
            framer: LineFramer::new(),
            link,
            link_faulted: false,
            running: false,
            zones: [false; ZONE_COUNT],
            coverage: [Coverage::default(); ZONE_COUNT],
        }
    }

    #[must_use]
    pub fn classifier(&self) -> &ZoneClassifier {
        &self.classifier
    }

    #[must_use]
    pub fn telemetry(&self) -> &TelemetryRecorder<TInstant> {
        &self.telemetry
    }

    #[must_use]
    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Classifies `frame` and, while running, transmits the heartbeat and edges.
    ///
    /// `None` means the frame source had nothing this tick.
    pub fn sample_tick<F>(&mut self, frame: Option<&F>, now: TInstant) -> TickOutcome
    where
        F: Frame + ?Sized,
    {
        let Some(frame) = frame else {
            return self.skip(FrameSkipReason::Unavailable, now);
        };
        let result = match self.classifier.classify(frame) {
            Ok(result) => result,
            Err(error) => return self.skip(FrameSkipReason::Rejected(error), now),
        };

        for role in ALL_ROLES {
            self.zones[role.as_index()] = result.detected(role);
            self.coverage[role.as_index()] = result.coverage(role);
        }

        if self.running && self.link.is_attached() {
            if self.send(OutgoingMessage::status(&result), None, now) {
                self.telemetry
                    .record(TelemetryEventKind::StatusSent, TelemetryPayload::None, now);
            }

            for role in EDGE_ORDER {
                let detected = result.detected(role);
                let signal = SignalId::Zone(role);
                if self.notifier.observe(signal, detected).is_some()
                    && self.send(OutgoingMessage::ZoneEdge { role, detected }, Some(signal), now)
                {
                    self.telemetry.record(
                        TelemetryEventKind::ZoneEdge { role, detected },
                        TelemetryPayload::None,
                        now,
                    );
                }
            }
        }

        TickOutcome::Classified(result)
    }

    /// Drains available bytes and applies every complete line.
    ///
    /// Returns the number of lines handled. Partial lines stay buffered.
    pub fn serial_tick(&mut self, now: TInstant) -> usize {
        if !self.link.is_attached() {
            return 0;
        }

        let mut handled = 0;
        let mut buffer = [0u8; READ_CHUNK];
        for _ in 0..MAX_READS_PER_TICK {
            let count = match self.link.read_available(&mut buffer) {
                Ok(0) => break,
                Ok(count) => count,
                Err(error) => {
                    self.link_fault(error, None, now);
                    break;
                }
            };

            for &byte in &buffer[..count] {
                match self.framer.push(byte) {
                    Ok(Some(line)) => {
                        self.link.line_received(&line);
                        self.handle_line(&line, now);
                        handled += 1;
                    }
                    Ok(None) => {}
                    Err(error) => {
                        self.telemetry.record_framing_error(error, now);
                    }
                }
            }
        }

        handled
    }

    /// Applies one decoded controller line.
    pub fn handle_line(&mut self, line: &str, now: TInstant) {
        match decode(line) {
            IncomingEvent::Actuator(echo) => {
                if let StateChangeResult::Unchanged { id, .. } =
                    self.apply_actuator(echo.id, echo.state, ChangeOrigin::HardwareEcho, now)
                {
                    self.telemetry.record(
                        TelemetryEventKind::EchoIgnored(id),
                        TelemetryPayload::None,
                        now,
                    );
                }
            }
            IncomingEvent::Sequence(progress) => {
                if self.sequence.apply(progress) {
                    let count = u8::try_from(progress.completed()).unwrap_or(u8::MAX);
                    self.telemetry.record(
                        TelemetryEventKind::SequenceAdvanced(count),
                        TelemetryPayload::None,
                        now,
                    );
                }
            }
            IncomingEvent::Unrecognized(text) => {
                self.telemetry.record_rejected_line(text, now);
            }
        }
    }

    /// Starts a run: rearms zone edges, clears cycle progress, sends `start`.
    pub fn start(&mut self, now: TInstant) {
        self.running = true;
        self.notifier.reset();
        self.sequence.reset();
        self.send(OutgoingMessage::Start, None, now);
        self.telemetry
            .record(TelemetryEventKind::RunStarted, TelemetryPayload::None, now);
    }

    /// Ends the run, clears cycle progress, sends `stop`.
    pub fn stop(&mut self, now: TInstant) {
        self.running = false;
        self.sequence.reset();
        self.send(OutgoingMessage::Stop, None, now);
        self.telemetry
            .record(TelemetryEventKind::RunStopped, TelemetryPayload::None, now);
    }

    /// Halts transmission and sends `stopE`. Cycle progress stays visible.
    pub fn emergency_stop(&mut self, now: TInstant) {
        self.running = false;
        self.send(OutgoingMessage::EmergencyStop, None, now);
        self.telemetry
            .record(TelemetryEventKind::EmergencyStop, TelemetryPayload::None, now);
    }

    /// Flips a solenoid and commands the controller.
    pub fn toggle_actuator(&mut self, id: ActuatorId, now: TInstant) -> StateChangeResult {
        let target = self.actuators.state(id).toggled();
        self.apply_actuator(id, target, ChangeOrigin::Operator, now)
    }

    /// [`Self::toggle_actuator`] addressed by code or label.
    pub fn toggle_actuator_named(
        &mut self,
        name: &str,
        now: TInstant,
    ) -> Result<StateChangeResult, UnknownActuator> {
        let id = ActuatorId::from_name(name).ok_or(UnknownActuator)?;
        Ok(self.toggle_actuator(id, now))
    }

    /// Current display model.
    #[must_use]
    pub fn snapshot(&self) -> DisplaySnapshot {
        DisplaySnapshot {
            zones: ALL_ROLES.map(|role| {
                ZoneSample::new(
                    role,
                    self.zones[role.as_index()],
                    self.coverage[role.as_index()],
                )
            }),
            actuators: ALL_ACTUATORS.map(|line| ActuatorSample {
                id: line.id,
                state: self.actuators.state(line.id),
            }),
            sequence: self.sequence,
            running: self.running,
            link_attached: self.link.is_attached() && !self.link_faulted,
        }
    }

    /// Shared path for operator toggles and hardware echoes.
    fn apply_actuator(
        &mut self,
        id: ActuatorId,
        state: ActuatorState,
        origin: ChangeOrigin,
        now: TInstant,
    ) -> StateChangeResult {
        let result = self.actuators.apply(id, state, origin);
        if let StateChangeResult::Applied(change) = &result {
            self.telemetry.record_actuator_change(change, now);
            if let Some(command) = change.command {
                self.send(command.into(), None, now);
            }
        }
        result
    }

    fn skip(&mut self, reason: FrameSkipReason, now: TInstant) -> TickOutcome {
        self.telemetry.record_frame_skipped(reason, now);
        TickOutcome::Skipped(reason)
    }

    /// Writes `message` when a link is attached; returns `true` once it is on the wire.
    ///
    /// A failed edge forgets its signal so the next tick retries it.
    fn send(&mut self, message: OutgoingMessage, signal: Option<SignalId>, now: TInstant) -> bool {
        if !self.link.is_attached() {
            return false;
        }

        let Ok(line) = message.encode() else {
            return false;
        };

        match self.link.write_line(&line) {
            Ok(()) => {
                self.link_faulted = false;
                true
            }
            Err(error) => {
                if let Some(signal) = signal {
                    self.notifier.forget(signal);
                }
                self.link_fault(error, signal, now);
                false
            }
        }
    }

    /// Records only the first fault of an outage; retries stay silent.
    fn link_fault(&mut self, error: LinkError, signal: Option<SignalId>, now: TInstant) {
        if !self.link_faulted {
            self.link_faulted = true;
            self.telemetry.record_link_fault(error, signal, now);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::MemoryLink;
    use crate::telemetry::Severity;
    use crate::zones::{
        DetectionZone, FrameDimensions, Hsv, HsvRange, PackedFrame, PixelLayout, Rect,
    };
    use core::time::Duration;

    #[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
    struct Tick(u64);

    impl TelemetryInstant for Tick {
        fn saturating_duration_since(&self, earlier: Self) -> Duration {
            Duration::from_millis(self.0.saturating_sub(earlier.0))
        }
    }

    const WIDTH: u32 = 20;
    const HEIGHT: u32 = 10;
    const BYTES: usize = (WIDTH * HEIGHT) as usize * 3;

    fn classifier() -> ZoneClassifier {
        let sellado = DetectionZone::with_default_threshold(
            ZoneRole::Sellado,
            Rect::new(0, 0, 10, 10),
            HsvRange::yellow(),
        )
        .expect("sellado");
        let carga = DetectionZone::with_default_threshold(
            ZoneRole::Carga,
            Rect::new(10, 0, 10, 10),
            HsvRange::yellow(),
        )
        .expect("carga");
        ZoneClassifier::new(FrameDimensions::new(WIDTH, HEIGHT), &[sellado, carga])
            .expect("classifier")
    }

    fn frame_with(sellado: usize, carga: usize) -> [u8; BYTES] {
        let mut data = [0u8; BYTES];
        let yellow = Hsv::new(30, 200, 200);
        for (x0, count) in [(0u32, sellado), (10u32, carga)] {
            for index in 0..count {
                let x = x0 + (index as u32 % 10);
                let y = index as u32 / 10;
                let offset = ((y * WIDTH + x) * 3) as usize;
                data[offset..offset + 3].copy_from_slice(&[yellow.h, yellow.s, yellow.v]);
            }
        }
        data
    }

    fn tick(
        supervisor: &mut Supervisor<MemoryLink, Tick>,
        data: &[u8; BYTES],
        at: u64,
    ) -> TickOutcome {
        let frame =
            PackedFrame::new(FrameDimensions::new(WIDTH, HEIGHT), PixelLayout::Hsv8, data)
                .expect("frame");
        supervisor.sample_tick(Some(&frame), Tick(at))
    }

    fn sent(supervisor: &mut Supervisor<MemoryLink, Tick>) -> heapless::Vec<heapless::String<64>, 32> {
        supervisor.link_mut().take_sent()
    }

    #[test]
    fn nothing_is_sent_until_started() {
        let mut supervisor = Supervisor::new(classifier(), MemoryLink::new());
        tick(&mut supervisor, &frame_with(50, 0), 0);
        assert!(sent(&mut supervisor).is_empty());
        assert!(supervisor.snapshot().zone(ZoneRole::Sellado).detected);
    }

    #[test]
    fn first_tick_after_start_sends_heartbeat_then_edges() {
        let mut supervisor = Supervisor::new(classifier(), MemoryLink::new());
        supervisor.start(Tick(0));
        tick(&mut supervisor, &frame_with(15, 0), 30);

        let lines = sent(&mut supervisor);
        let lines: heapless::Vec<&str, 8> = lines.iter().map(|line| line.as_str()).collect();
        assert_eq!(
            lines.as_slice(),
            &["start\n", "Carga: 0, Sellado: 1\n", "H0\n", "S1\n"]
        );
    }

    #[test]
    fn failed_edge_is_retried_next_tick() {
        let mut supervisor = Supervisor::new(classifier(), MemoryLink::new());
        supervisor.start(Tick(0));
        supervisor.link_mut().set_fail_writes(true);
        tick(&mut supervisor, &frame_with(20, 20), 30);

        let fault = supervisor
            .telemetry()
            .oldest_first()
            .find(|record| record.event == TelemetryEventKind::LinkFault)
            .expect("link fault recorded");
        assert!(matches!(
            fault.details,
            TelemetryPayload::Link {
                error: LinkError::Write,
                ..
            }
        ));

        supervisor.link_mut().set_fail_writes(false);
        tick(&mut supervisor, &frame_with(20, 20), 60);
        let lines = sent(&mut supervisor);
        assert!(lines.iter().any(|line| line.as_str() == "H1\n"));
        assert!(lines.iter().any(|line| line.as_str() == "S1\n"));
    }

    #[test]
    fn lost_link_is_reported_once_until_writes_recover() {
        let mut supervisor = Supervisor::new(classifier(), MemoryLink::new());
        supervisor.start(Tick(0));
        supervisor.link_mut().set_fail_writes(true);
        for at in 1..=10 {
            tick(&mut supervisor, &frame_with(20, 0), at * 30);
        }

        let warnings = supervisor
            .telemetry()
            .oldest_first()
            .filter(|record| record.event.severity() == Severity::Warn)
            .count();
        assert_eq!(warnings, 1);
        assert!(!supervisor.snapshot().link_attached);

        supervisor.link_mut().set_fail_writes(false);
        tick(&mut supervisor, &frame_with(20, 0), 330);
        assert!(supervisor.snapshot().link_attached);

        supervisor.link_mut().set_fail_writes(true);
        tick(&mut supervisor, &frame_with(20, 0), 360);
        let faults = supervisor
            .telemetry()
            .oldest_first()
            .filter(|record| record.event == TelemetryEventKind::LinkFault)
            .count();
        assert_eq!(faults, 2, "a new outage is reported again");
    }

    #[test]
    fn missing_frame_skips_tick() {
        let mut supervisor = Supervisor::new(classifier(), MemoryLink::new());
        supervisor.start(Tick(0));
        sent(&mut supervisor);

        let outcome = supervisor.sample_tick::<PackedFrame<'_>>(None, Tick(30));
        assert_eq!(outcome, TickOutcome::Skipped(FrameSkipReason::Unavailable));
        assert!(sent(&mut supervisor).is_empty());
    }

    #[test]
    fn echo_updates_state_without_command() {
        let mut supervisor = Supervisor::new(classifier(), MemoryLink::new());
        supervisor.link_mut().inject(b"BON\r\n");
        assert_eq!(supervisor.serial_tick(Tick(100)), 1);

        assert_eq!(supervisor.snapshot().actuator(ActuatorId::B), ActuatorState::On);
        assert!(sent(&mut supervisor).is_empty());
        assert_eq!(supervisor.link().received_lines(), 1);
    }

    #[test]
    fn toggle_sends_label_command() {
        let mut supervisor = Supervisor::new(classifier(), MemoryLink::new());
        supervisor
            .toggle_actuator_named("a", Tick(0))
            .expect("known solenoid");
        let lines = sent(&mut supervisor);
        assert_eq!(lines[0].as_str(), "Solenoid A_ON\n");
        assert_eq!(
            supervisor.toggle_actuator_named("Z", Tick(1)),
            Err(UnknownActuator)
        );
    }

    #[test]
    fn stop_clears_progress_but_emergency_stop_keeps_it() {
        let mut supervisor = Supervisor::new(classifier(), <MemoryLink>::new());
        supervisor.start(Tick(0));
        supervisor.handle_line("A+B+", Tick(1));
        supervisor.emergency_stop(Tick(2));
        assert_eq!(supervisor.snapshot().reached(), 2);
        assert!(!supervisor.is_running());

        supervisor.stop(Tick(3));
        assert_eq!(supervisor.snapshot().reached(), 0);
    }
}
