#![no_main]
use amr_config::{CalibrationRow, EncoderCalibration};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: Vec<(i64, f64)>| {
    let rows: Vec<CalibrationRow> = data
        .into_iter()
        .map(|(pulses, revolutions)| CalibrationRow { pulses, revolutions })
        .collect();
    if let Ok(c) = EncoderCalibration::from_rows(&rows) {
        assert!(c.pulses_per_revolution > 0);
        assert!(c.rows_used >= 1 && c.rows_used <= rows.len());
    }
});
