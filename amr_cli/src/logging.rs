//! Console and optional file logging from the CLI flags and `[logging]`.

use std::path::Path;

use tracing_appender::rolling;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

use crate::cli::FILE_GUARD;

/// `RUST_LOG` wins over the given level.
fn filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

fn file_appender(path: &Path, rotation: Option<&str>) -> rolling::RollingFileAppender {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let name = path
        .file_name()
        .map_or_else(|| "amr.log".into(), |n| n.to_string_lossy().into_owned());
    match rotation {
        Some("daily") => rolling::daily(dir, name),
        Some("hourly") => rolling::hourly(dir, name),
        _ => rolling::never(dir, name),
    }
}

/// Console logs go to stderr so stdout carries only command output.
pub fn init(json: bool, console_level: &str, cfg: &amr_config::Logging) -> eyre::Result<()> {
    let file = cfg.file.as_deref().map(|path| {
        let (writer, guard) =
            tracing_appender::non_blocking(file_appender(Path::new(path), cfg.rotation.as_deref()));
        let _ = FILE_GUARD.set(guard);
        let level = cfg.level.as_deref().unwrap_or("info");
        (writer, EnvFilter::new(level))
    });

    tracing_subscriber::registry()
        .with(json.then(|| {
            fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_filter(filter(console_level))
        }))
        .with((!json).then(|| {
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr)
                .with_filter(filter(console_level))
        }))
        .with(file.map(|(writer, level)| {
            fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(writer)
                .with_filter(level)
        }))
        .try_init()
        .map_err(|e| eyre::eyre!("init logging: {e}"))?;
    Ok(())
}
