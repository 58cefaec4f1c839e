use std::sync::Arc;
use std::time::Duration;

use amr_core::util::normalize_angle;
use amr_core::{
    DriveGeometry, EncoderConfig, EncoderPair, OdometryIntegrator, PidGains, VelocityCfg,
    VelocityController, WheelSide,
};
use amr_traits::ChannelLevels;
use amr_traits::clock::test_clock::TestClock;
use core::f64::consts::{PI, TAU};
use proptest::prelude::*;

fn in_half_open_range(h: f64) -> bool {
    h > -PI && h <= PI
}

proptest! {
    #[test]
    fn counter_magnitude_never_exceeds_edge_count(
        edges in prop::collection::vec((any::<bool>(), any::<bool>()), 0..500),
        inverted in any::<bool>(),
    ) {
        let enc = EncoderPair::new(EncoderConfig::new(3418, inverted), EncoderConfig::default());
        let dec = enc.decoder(WheelSide::Left).expect("claim");
        for (a, b) in &edges {
            dec.on_edge(ChannelLevels { a: *a, b: *b });
        }
        prop_assert!(enc.read(WheelSide::Left).unsigned_abs() <= edges.len() as u64);
        prop_assert_eq!(enc.read(WheelSide::Right), 0);
        enc.reset_both();
        prop_assert_eq!(enc.read_both(), (0, 0));
    }

    #[test]
    fn heading_stays_normalized(
        deltas in prop::collection::vec((-200_000i64..200_000, -200_000i64..200_000), 1..40),
    ) {
        let enc = EncoderPair::new(EncoderConfig::default(), EncoderConfig::default());
        let mut odo = OdometryIntegrator::new(enc, DriveGeometry::default());
        for (l, r) in deltas {
            odo.integrate(l, r);
            prop_assert!(in_half_open_range(odo.pose().heading), "{}", odo.pose().heading);
        }
    }

    #[test]
    fn full_turns_wrap_back(h in -PI..PI, turns in -50i32..50) {
        let wrapped = normalize_angle(h + f64::from(turns) * TAU);
        let d = (wrapped - normalize_angle(h)).abs();
        prop_assert!(d < 1e-9 || (TAU - d) < 1e-9, "{h} {turns} {wrapped}");
    }

    #[test]
    fn ramp_is_monotonic_until_pinned(
        target in 1.0f32..5000.0,
        ramp_ms in 50u64..2000,
        period_ms in 5u64..100,
    ) {
        let clock = TestClock::new();
        let cfg = VelocityCfg {
            ramp: Duration::from_millis(ramp_ms),
            update_period: Duration::from_millis(period_ms),
            ..VelocityCfg::default()
        };
        let mut ctl = VelocityController::new(cfg, 255, Arc::new(clock.clone()));
        ctl.enable(true);
        ctl.set_target_rate(WheelSide::Left, target);

        let ticks = ramp_ms / period_ms + 2;
        let mut prev = ctl.applied_rate(WheelSide::Left);
        for _ in 0..ticks {
            clock.advance_ms(period_ms);
            ctl.update(0, 0, Duration::from_millis(period_ms));
            let now = ctl.applied_rate(WheelSide::Left);
            prop_assert!(now >= prev);
            prop_assert!(now <= target);
            prev = now;
        }
        prop_assert_eq!(prev, target);
        clock.advance_ms(period_ms);
        ctl.update(0, 0, Duration::from_millis(period_ms));
        prop_assert_eq!(ctl.applied_rate(WheelSide::Left), target);
    }

    #[test]
    fn integral_contribution_is_bounded(
        ki in 0.0f32..1.0,
        bound in 1.0f32..1000.0,
        target in -10_000.0f32..10_000.0,
        ticks in 1usize..200,
    ) {
        let clock = TestClock::new();
        let cfg = VelocityCfg {
            left_gains: PidGains::new(0.0, ki, 0.0),
            integral_clamp: bound,
            ramp: Duration::ZERO,
            ..VelocityCfg::default()
        };
        let mut ctl = VelocityController::new(cfg, 255, Arc::new(clock.clone()));
        ctl.enable(true);
        ctl.set_target_rate(WheelSide::Left, target);
        for _ in 0..ticks {
            clock.advance_ms(50);
            ctl.update(0, 0, Duration::from_millis(50));
            let contribution = (ki * ctl.integral(WheelSide::Left)).abs();
            prop_assert!(contribution <= ki * bound + 1e-3);
        }
    }
}
