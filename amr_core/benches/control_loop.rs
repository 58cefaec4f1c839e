use std::sync::Arc;
use std::time::Duration;

use amr_core::{
    DriveGeometry, EncoderConfig, EncoderPair, OdometryIntegrator, VelocityCfg,
    VelocityController, WheelSide,
};
use amr_traits::ChannelLevels;
use amr_traits::clock::test_clock::TestClock;
use criterion::{Criterion, black_box, criterion_group, criterion_main};

fn configure(g: &mut criterion::BenchmarkGroup<'_, criterion::measurement::WallTime>) {
    // BENCH_SAMPLE_SIZE=10 BENCH_MEAS_MS=50 cargo bench -p amr_core --bench control_loop
    if let Ok(ss) = std::env::var("BENCH_SAMPLE_SIZE")
        && let Ok(n) = ss.parse::<usize>()
    {
        g.sample_size(n.max(10));
    } else {
        g.sample_size(50);
    }
    if let Ok(ms) = std::env::var("BENCH_MEAS_MS")
        && let Ok(ms_u64) = ms.parse::<u64>()
    {
        g.measurement_time(Duration::from_millis(ms_u64));
    }
}

pub fn bench_pid_update(c: &mut Criterion) {
    let mut g = c.benchmark_group("velocity");
    configure(&mut g);

    let clock = TestClock::new();
    let mut ctl = VelocityController::new(VelocityCfg::default(), 255, Arc::new(clock.clone()));
    ctl.enable(true);
    ctl.set_target_rates(1500.0, -900.0);
    let period = Duration::from_millis(50);

    g.bench_function("pid_update_executed", |b| {
        b.iter(|| {
            clock.advance(period);
            black_box(ctl.update(black_box(75), black_box(-45), period));
        })
    });
    g.bench_function("pid_update_not_due", |b| {
        b.iter(|| black_box(ctl.update(black_box(1), black_box(1), Duration::from_millis(1))))
    });
    g.finish();
}

pub fn bench_odometry(c: &mut Criterion) {
    let mut g = c.benchmark_group("odometry");
    configure(&mut g);

    let enc = EncoderPair::new(EncoderConfig::default(), EncoderConfig::default());
    let mut odo = OdometryIntegrator::new(Arc::clone(&enc), DriveGeometry::default());
    g.bench_function("integrate_turning", |b| {
        b.iter(|| black_box(odo.integrate(black_box(120), black_box(95))))
    });

    let dec = enc.decoder(WheelSide::Left).expect("fresh encoder pair");
    g.bench_function("decode_edge", |b| {
        b.iter(|| black_box(dec.on_edge(black_box(ChannelLevels { a: true, b: false }))))
    });
    g.finish();
}

criterion_group!(control_loop, bench_pid_update, bench_odometry);
criterion_main!(control_loop);
