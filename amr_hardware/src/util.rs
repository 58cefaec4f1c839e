//! Command-to-PWM mapping shared by the H-bridge driver and its tests.

/// Duty cycles `(forward, reverse)` in `[0.0, 1.0]` for a signed command in
/// `-max_command..=max_command`. Only one side is ever non-zero.
pub fn bridge_duty(command: i32, max_command: i32) -> (f64, f64) {
    if max_command <= 0 || command == 0 {
        return (0.0, 0.0);
    }
    let duty = (f64::from(command.unsigned_abs()) / f64::from(max_command)).min(1.0);
    if command > 0 { (duty, 0.0) } else { (0.0, duty) }
}
