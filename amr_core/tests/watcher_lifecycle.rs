//! Edge watcher threads decode edges, report faults and never leak.

use std::time::{Duration, Instant};

use amr_core::mocks::RecordingMotor;
use amr_core::{DriveError, DriveLoop, EdgeWatcher, EncoderConfig, EncoderPair, WheelSide};
use amr_hardware::{ChannelEdgeSource, SimulatedWheel};
use amr_traits::{ChannelLevels, EdgeSource};

/// Source whose first wait panics, like a driver bug in the edge context.
struct PanickingSource;

impl EdgeSource for PanickingSource {
    fn wait_edge(
        &mut self,
        _timeout: Duration,
    ) -> Result<Option<ChannelLevels>, Box<dyn std::error::Error + Send + Sync>> {
        panic!("edge source blew up");
    }
}

fn wait_for(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    cond()
}

#[test]
fn watcher_applies_edges_to_its_wheel() {
    let enc = EncoderPair::new(EncoderConfig::default(), EncoderConfig::default());
    let (tx, src) = ChannelEdgeSource::channel();
    let watcher = EdgeWatcher::spawn(
        src,
        enc.decoder(WheelSide::Left).expect("claim"),
        Duration::from_millis(10),
    )
    .expect("spawn");

    let mut wheel = SimulatedWheel::new();
    for levels in wheel.edges(25) {
        tx.send(levels).unwrap();
    }
    assert!(wait_for(|| watcher.edges_seen() == 25));
    assert_eq!(enc.read_both(), (25, 0));
    assert!(watcher.take_fault().is_none());
}

#[test]
fn disconnected_source_is_reported_once() {
    let enc = EncoderPair::new(EncoderConfig::default(), EncoderConfig::default());
    let (tx, src) = ChannelEdgeSource::channel();
    let watcher = EdgeWatcher::spawn(
        src,
        enc.decoder(WheelSide::Right).expect("claim"),
        Duration::from_millis(10),
    )
    .expect("spawn");
    drop(tx);

    assert!(wait_for(|| !watcher.is_running()));
    let fault = watcher.take_fault().expect("fault reported");
    assert!(matches!(fault, DriveError::HardwareFault(ref m) if m.contains("disconnected")));
    assert!(watcher.take_fault().is_none());
}

#[test]
fn dropping_watcher_releases_the_decoder() {
    let enc = EncoderPair::new(EncoderConfig::default(), EncoderConfig::default());
    for _ in 0..10 {
        let (_tx, src) = ChannelEdgeSource::channel();
        let watcher = EdgeWatcher::spawn(
            src,
            enc.decoder(WheelSide::Left).expect("decoder free again"),
            Duration::from_millis(5),
        )
        .expect("spawn");
        drop(watcher);
    }
    assert!(enc.decoder(WheelSide::Left).is_some());
}

#[test]
fn panicked_watcher_reports_not_running_without_fault() {
    let enc = EncoderPair::new(EncoderConfig::default(), EncoderConfig::default());
    let watcher = EdgeWatcher::spawn(
        PanickingSource,
        enc.decoder(WheelSide::Left).expect("claim"),
        Duration::from_millis(5),
    )
    .expect("spawn");

    assert!(wait_for(|| !watcher.is_running()));
    assert!(watcher.take_fault().is_none());
    // Drop joins the panicked thread without propagating the panic.
    drop(watcher);
}

#[test]
fn tick_halts_motors_when_a_watcher_dies() {
    let (_keep, right) = ChannelEdgeSource::channel();
    let left_motor = RecordingMotor::new();
    let right_motor = RecordingMotor::new();
    let mut dl = DriveLoop::builder()
        .with_encoder_config(EncoderConfig::default(), EncoderConfig::default())
        .with_motors(left_motor.clone(), right_motor.clone())
        .with_edge_sources(PanickingSource, right)
        .build()
        .expect("build");
    dl.drive_at(800.0, 800.0).expect("enable");

    assert!(wait_for(|| !dl.watchers()[0].is_running()));
    std::thread::sleep(Duration::from_millis(60));
    let err = dl.tick().expect_err("dead watcher must stop the loop");
    let msg = format!("{err:#}");
    assert!(msg.contains("left encoder stopped"), "{msg}");
    assert!(msg.contains("edge watcher exited"), "{msg}");
    assert!(!dl.is_enabled());
    assert_eq!(left_motor.last(), Some(0));
    assert_eq!(right_motor.last(), Some(0));

    // Stays stopped on later ticks.
    assert!(dl.tick().is_err());
}
