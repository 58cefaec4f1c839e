#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! `amr`: run, check and monitor the differential-drive base.

mod cli;
mod drive;
mod error_fmt;
mod logging;

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use clap::Parser;
use eyre::{Result, WrapErr};
use serde_json::json;

use crate::cli::{Cli, Commands, JSON_MODE};
use crate::drive::{DriveReport, RunRequest};
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};

fn main() {
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);

    if let Err(err) = real_main(cli) {
        if JSON_MODE.get().copied().unwrap_or(false) {
            eprintln!("{}", format_error_json(&err));
        } else {
            eprintln!("{}", humanize(&err));
        }
        tracing::error!(error = ?err, "command failed");
        std::process::exit(exit_code_for_error(&err));
    }
}

fn load_config(path: &Path) -> Result<amr_config::Config> {
    let text = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("read config {}", path.display()))?;
    let cfg = amr_config::load_toml(&text).wrap_err("parse config")?;
    cfg.validate().wrap_err("invalid configuration")?;
    Ok(cfg)
}

/// Raised by Ctrl-C; the loop stops at its next tick.
fn shutdown_flag() -> Result<Arc<AtomicBool>> {
    let flag = Arc::new(AtomicBool::new(false));
    let f = Arc::clone(&flag);
    ctrlc::set_handler(move || f.store(true, Ordering::SeqCst))
        .wrap_err("install Ctrl-C handler")?;
    Ok(flag)
}

fn real_main(cli: Cli) -> Result<()> {
    let _ = color_eyre::install();

    let cfg = load_config(&cli.config)?;
    logging::init(cli.json, &cli.log_level, &cfg.logging)?;
    tracing::debug!(config = %cli.config.display(), "config loaded");

    let calib = cli
        .calibration
        .as_deref()
        .map(amr_config::load_calibration_csv)
        .transpose()?;
    if let Some(c) = &calib {
        tracing::info!(
            ppr = c.pulses_per_revolution,
            rows = c.rows_used,
            residual_rms = c.residual_rms,
            "encoder calibration loaded"
        );
    }

    match cli.cmd {
        Commands::Run {
            left_pps,
            right_pps,
            duration_ms,
            ramp_ms,
            heading_deg,
        } => {
            let req = RunRequest {
                left_pps: left_pps as f32,
                right_pps: right_pps.unwrap_or(left_pps) as f32,
                duration: Duration::from_millis(duration_ms),
                ramp: ramp_ms.map(Duration::from_millis),
                heading_deg,
            };
            let shutdown = shutdown_flag()?;
            let report = drive::run_drive(&cfg, calib.as_ref(), &req, &shutdown)?;
            print_report(cli.json, "run", &report);
        }
        Commands::SelfCheck => {
            let shutdown = shutdown_flag()?;
            let report = drive::self_check(&cfg, calib.as_ref(), &shutdown)?;
            print_report(cli.json, "self-check", &report);
        }
        Commands::Health => {
            let h = drive::health(&cfg, calib.as_ref())?;
            if cli.json {
                println!(
                    "{}",
                    json!({
                        "status": "ok",
                        "backend": h.backend,
                        "left_ppr": h.left_ppr,
                        "right_ppr": h.right_ppr,
                        "watchers": h.watchers,
                    })
                );
            } else {
                println!(
                    "healthy: backend={} ppr={}/{} watchers={}",
                    h.backend, h.left_ppr, h.right_ppr, h.watchers
                );
            }
        }
    }
    Ok(())
}

fn print_report(json_mode: bool, command: &str, r: &DriveReport) {
    let s = &r.summary;
    let status = if s.interrupted { "interrupted" } else { "complete" };
    if json_mode {
        println!(
            "{}",
            json!({
                "command": command,
                "status": status,
                "backend": r.backend,
                "ticks": s.ticks,
                "commands": s.commands,
                "elapsed_ms": u64::try_from(s.elapsed.as_millis()).unwrap_or(u64::MAX),
                "left_pulses": r.counts.0,
                "right_pulses": r.counts.1,
                "x_cm": s.pose.x,
                "y_cm": s.pose.y,
                "heading_deg": s.pose.heading_degrees(),
            })
        );
    } else {
        println!(
            "{command} {status}: {} ticks, pulses {}/{}, pose ({:.1} cm, {:.1} cm, {:.1} deg)",
            s.ticks,
            r.counts.0,
            r.counts.1,
            s.pose.x,
            s.pose.y,
            s.pose.heading_degrees()
        );
    }
}
