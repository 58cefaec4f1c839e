//! Human-readable error descriptions and structured JSON error formatting.

use amr_core::error::{BuildError, DriveError};

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    // Typed matches first
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingEncoders => {
                "What happened: No encoders were provided to the drive loop.\nLikely causes: The encoder pair was not wired into the builder.\nHow to fix: Pass encoder settings via with_encoder_config(...) or with_encoders(...).".to_string()
            }
            BuildError::MissingMotors => {
                "What happened: No motors were provided to the drive loop.\nLikely causes: Motor driver failed to initialize or was not wired into the builder.\nHow to fix: Ensure both motors are created successfully and passed via with_motors(...).".to_string()
            }
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Missing or out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun. See etc/amr_config.toml for a sample."
            ),
        };
    }

    if let Some(de) = err.downcast_ref::<DriveError>() {
        return match de {
            DriveError::Timeout => "What happened: Timed out waiting for an encoder edge.\nLikely causes: Encoder not powered, A/B wires swapped or loose.\nHow to fix: Check the [pins] encoder entries and wiring; raise hardware.edge_poll_ms if the wheel turns slowly.".to_string(),
            DriveError::HardwareFault(msg) => format!(
                "What happened: Hardware fault ({msg}).\nLikely causes: Encoder or motor driver disconnected, or a wheel is blocked.\nHow to fix: Power down, check connectors and that both wheels turn freely, then run `amr self-check`."
            ),
            DriveError::Hardware(msg) => format!(
                "What happened: Hardware error ({msg}).\nLikely causes: GPIO/PWM access failed.\nHow to fix: Verify pin numbers and that the process may access GPIO."
            ),
            other => format!(
                "What happened: {other}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
    }

    // String-based heuristics for errors coming from init or config
    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    if lower.contains("open gpio") || lower.contains("encoder pins") || lower.contains("motor pins")
    {
        return "What happened: Failed to initialize hardware pins.\nLikely causes: Incorrect pin numbers or insufficient GPIO permissions.\nHow to fix: Fix the [pins] values in the config; ensure the process has permission to access GPIO.".to_string();
    }

    if lower.contains("invalid configuration") || lower.contains("parse config") {
        return format!(
            "What happened: Configuration is invalid or incomplete.\nLikely causes: Missing [pins] entries or out-of-range values.\nHow to fix: Edit the TOML config and try again. Detail: {}",
            root_cause(err)
        );
    }

    // Calibration CSV header special-case
    if lower.contains("calibration csv must have headers") {
        return "Invalid headers in calibration CSV. Expected 'pulses,revolutions'.".to_string();
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

fn root_cause(err: &eyre::Report) -> String {
    err.chain()
        .last()
        .map(ToString::to_string)
        .unwrap_or_default()
}

fn reason_name(err: &eyre::Report) -> &'static str {
    if err.downcast_ref::<BuildError>().is_some() {
        return "Build";
    }
    match err.downcast_ref::<DriveError>() {
        Some(DriveError::Timeout) => "Timeout",
        Some(DriveError::HardwareFault(_)) => "HardwareFault",
        Some(DriveError::Hardware(_)) => "Hardware",
        Some(DriveError::Config(_)) => "Config",
        Some(DriveError::State(_)) => "State",
        None => "Error",
    }
}

/// Stable exit codes per failure class; anything untyped returns 1.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    match reason_name(err) {
        "Timeout" => 3,
        "HardwareFault" => 4,
        "Hardware" => 5,
        "Build" | "Config" => 6,
        _ => 1,
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    serde_json::json!({ "reason": reason_name(err), "message": humanize(err) }).to_string()
}
