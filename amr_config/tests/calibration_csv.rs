use std::fs::File;
use std::io::Write;

use amr_config::{CalibrationRow, EncoderCalibration, load_calibration_csv};
use rstest::rstest;
use tempfile::tempdir;

fn row(pulses: i64, revolutions: f64) -> CalibrationRow {
    CalibrationRow { pulses, revolutions }
}

#[rstest]
fn single_turn_gives_ppr_directly() {
    let c = EncoderCalibration::from_rows(&[row(3418, 1.0)]).unwrap();
    assert_eq!(c.pulses_per_revolution, 3418);
    assert_eq!(c.rows_used, 1);
}

#[rstest]
fn several_turns_fit_through_origin() {
    let rows = [row(3410, 1.0), row(6840, 2.0), row(10_254, 3.0)];
    let c = EncoderCalibration::from_rows(&rows).unwrap();
    // sum(r*p)/sum(r*r) = (3410 + 13680 + 30762) / 14 = 3418
    assert_eq!(c.pulses_per_revolution, 3418);
}

#[rstest]
fn outlier_is_rejected() {
    let mut rows: Vec<CalibrationRow> = (1..=20)
        .map(|i| {
            let rev = f64::from(i) * 0.5;
            let noise = (f64::from(i) * 7.0).sin() * 3.0;
            row((3418.0 * rev + noise).round() as i64, rev)
        })
        .collect();
    rows[9].pulses += 5000;

    let c = EncoderCalibration::from_rows(&rows).unwrap();
    assert_eq!(c.rows_used, 19);
    assert!(
        (i64::from(c.pulses_per_revolution) - 3418).abs() <= 1,
        "ppr {}",
        c.pulses_per_revolution
    );
}

#[rstest]
#[case::empty(&[], "at least one row")]
#[case::zero_turns(&[row(10, 0.0), row(-4, 0.0)], "all revolutions are zero")]
#[case::backwards(&[row(-3418, 1.0)], "check encoder inversion")]
fn degenerate_inputs_are_rejected(#[case] rows: &[CalibrationRow], #[case] needle: &str) {
    let err = EncoderCalibration::from_rows(rows).expect_err("should fail");
    assert!(format!("{err}").contains(needle), "{err}");
}

#[rstest]
fn csv_with_wrong_headers_errors() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bad_headers.csv");

    let mut f = File::create(&path).unwrap();
    writeln!(f, "pulses,turns").unwrap();
    writeln!(f, "100,0.0").unwrap();

    let err = load_calibration_csv(&path).expect_err("should error on bad headers");
    assert!(format!("{err}").contains("headers 'pulses,revolutions'"));
}

#[rstest]
fn csv_with_non_numeric_errors() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bad_numeric.csv");

    let mut f = File::create(&path).unwrap();
    writeln!(f, "pulses,revolutions").unwrap();
    writeln!(f, "abc,1.0").unwrap();

    let err = load_calibration_csv(&path).expect_err("should error on non-numeric");
    assert!(format!("{err}").contains("invalid CSV row 2"));
}

#[rstest]
fn csv_round_trip_from_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("turns.csv");

    let mut f = File::create(&path).unwrap();
    writeln!(f, "pulses, revolutions").unwrap();
    writeln!(f, "1709, 0.5").unwrap();
    writeln!(f, "3418, 1.0").unwrap();
    drop(f);

    let c = load_calibration_csv(&path).unwrap();
    assert_eq!(c.pulses_per_revolution, 3418);
    assert!(c.residual_rms < 1e-9);
}
