use core::time::Duration;

use machine_core::actuators::ActuatorId;
use machine_core::link::{DetachedLink, LineLink, MemoryLink};
use machine_core::supervisor::{Supervisor, TickOutcome};
use machine_core::telemetry::{TelemetryEventKind, TelemetryInstant};
use machine_core::zones::{
    DetectionZone, FrameDimensions, HsvRange, PackedFrame, PixelLayout, Rect, ZoneClassifier,
    ZoneRole,
};

const WIDTH: u32 = 20;
const HEIGHT: u32 = 10;
const BYTES: usize = (WIDTH * HEIGHT) as usize * 3;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
struct MockInstant(u64);

impl TelemetryInstant for MockInstant {
    fn saturating_duration_since(&self, earlier: Self) -> Duration {
        Duration::from_millis(self.0.saturating_sub(earlier.0))
    }
}

fn classifier() -> ZoneClassifier {
    let zones = [
        DetectionZone::with_default_threshold(
            ZoneRole::Sellado,
            Rect::new(0, 0, 10, 10),
            HsvRange::yellow(),
        )
        .expect("sellado zone"),
        DetectionZone::with_default_threshold(
            ZoneRole::Carga,
            Rect::new(10, 0, 10, 10),
            HsvRange::yellow(),
        )
        .expect("carga zone"),
    ];
    ZoneClassifier::new(FrameDimensions::new(WIDTH, HEIGHT), &zones).expect("classifier")
}

/// Hsv8 frame with `sellado` and `carga` yellow pixels in the two 100-pixel zones.
fn frame(sellado: u32, carga: u32) -> Vec<u8> {
    let mut data = vec![0u8; BYTES];
    for (x0, count) in [(0, sellado), (10, carga)] {
        for index in 0..count {
            let (x, y) = (x0 + index % 10, index / 10);
            let offset = ((y * WIDTH + x) * 3) as usize;
            data[offset..offset + 3].copy_from_slice(&[30, 200, 200]);
        }
    }
    data
}

fn tick<L: LineLink>(supervisor: &mut Supervisor<L, MockInstant>, data: &[u8], at: u64) -> TickOutcome {
    let frame = PackedFrame::new(FrameDimensions::new(WIDTH, HEIGHT), PixelLayout::Hsv8, data)
        .expect("frame buffer");
    supervisor.sample_tick(Some(&frame), MockInstant(at))
}

fn drain(supervisor: &mut Supervisor<MemoryLink, MockInstant>) -> Vec<String> {
    supervisor
        .link_mut()
        .take_sent()
        .iter()
        .map(|line| line.as_str().to_owned())
        .collect()
}

#[test]
fn sellado_edge_rises_and_falls_while_status_repeats() {
    let mut supervisor: Supervisor<MemoryLink, MockInstant> =
        Supervisor::new(classifier(), MemoryLink::new());
    supervisor.start(MockInstant(0));
    assert_eq!(drain(&mut supervisor), ["start\n"]);

    let covered = frame(15, 0);
    let outcome = tick(&mut supervisor, &covered, 30);
    let TickOutcome::Classified(result) = outcome else {
        panic!("frame should classify: {outcome:?}");
    };
    assert!(result.detected(ZoneRole::Sellado));
    assert!(!result.detected(ZoneRole::Carga));
    assert_eq!(
        drain(&mut supervisor),
        ["Carga: 0, Sellado: 1\n", "H0\n", "S1\n"],
        "first tick carries the heartbeat and both initial edges"
    );

    for at in [60, 90] {
        tick(&mut supervisor, &covered, at);
        assert_eq!(
            drain(&mut supervisor),
            ["Carga: 0, Sellado: 1\n"],
            "unchanged zones only repeat the heartbeat"
        );
    }

    tick(&mut supervisor, &frame(5, 0), 120);
    assert_eq!(drain(&mut supervisor), ["Carga: 0, Sellado: 0\n", "S0\n"]);

    let edges: Vec<_> = supervisor
        .telemetry()
        .oldest_first()
        .filter_map(|record| match record.event {
            TelemetryEventKind::ZoneEdge { role, detected } => Some((role, detected)),
            _ => None,
        })
        .collect();
    assert_eq!(
        edges,
        [
            (ZoneRole::Carga, false),
            (ZoneRole::Sellado, true),
            (ZoneRole::Sellado, false),
        ]
    );
}

#[test]
fn coverage_exactly_at_threshold_is_not_detected() {
    let mut supervisor: Supervisor<MemoryLink, MockInstant> =
        Supervisor::new(classifier(), MemoryLink::new());
    supervisor.start(MockInstant(0));

    tick(&mut supervisor, &frame(10, 11), 30);
    let snapshot = supervisor.snapshot();
    assert!(!snapshot.zone(ZoneRole::Sellado).detected);
    assert!(snapshot.zone(ZoneRole::Carga).detected);
}

#[test]
fn absent_link_still_updates_display() {
    let mut supervisor: Supervisor<DetachedLink, MockInstant> =
        Supervisor::new(classifier(), DetachedLink);

    supervisor.start(MockInstant(0));
    assert!(supervisor.is_running());

    tick(&mut supervisor, &frame(40, 60), 30);
    let snapshot = supervisor.snapshot();
    assert!(!snapshot.link_attached);
    assert!(snapshot.zone(ZoneRole::Sellado).detected);
    assert!(snapshot.zone(ZoneRole::Carga).detected);
    assert_eq!(snapshot.zone(ZoneRole::Carga).coverage.matched, 60);

    assert_eq!(supervisor.serial_tick(MockInstant(40)), 0);
}

#[test]
fn detached_memory_link_records_no_bytes() {
    let mut link: MemoryLink = MemoryLink::new();
    link.set_attached(false);
    let mut supervisor = Supervisor::<_, MockInstant>::new(classifier(), link);

    supervisor.start(MockInstant(0));
    tick(&mut supervisor, &frame(50, 50), 30);
    supervisor.toggle_actuator_named("A", MockInstant(35)).expect("known solenoid");

    assert!(supervisor.link().sent().is_empty());
    assert!(supervisor.snapshot().actuator(ActuatorId::A).is_on());
}

#[test]
fn mismatched_frame_is_skipped_without_output() {
    let mut supervisor: Supervisor<MemoryLink, MockInstant> =
        Supervisor::new(classifier(), MemoryLink::new());
    supervisor.start(MockInstant(0));
    drain(&mut supervisor);

    let small = vec![0u8; 4 * 4 * 3];
    let frame = PackedFrame::new(FrameDimensions::new(4, 4), PixelLayout::Hsv8, &small)
        .expect("frame buffer");
    let outcome = supervisor.sample_tick(Some(&frame), MockInstant(30));

    assert!(matches!(outcome, TickOutcome::Skipped(_)));
    assert!(drain(&mut supervisor).is_empty());
    assert_eq!(
        supervisor.telemetry().latest().map(|record| record.event),
        Some(TelemetryEventKind::FrameSkipped)
    );
}
