//! Logging backends for the pipeline.
//!
//! Two sinks share the `log` facade used across the workspace:
//!
//! - `init_with_level` installs a plain stderr sink printing
//!   `[  1.234s  INFO session] message` (uptime, level, last target segment);
//! - `init_tracing` (feature `tracing`) installs a `tracing-subscriber` fmt
//!   layer, text or JSON, that also receives every `log` record.

use std::fmt;
use std::io::Write;
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use log::{Level, LevelFilter, Log, Metadata, Record};

/// Last `::` segment of a module path, so `pelletcam::session` logs as `session`.
fn short_target(target: &str) -> &str {
    target.rsplit("::").next().unwrap_or(target)
}

/// One rendered stderr line, without the trailing newline.
fn format_line(uptime: Duration, level: Level, target: &str, args: &fmt::Arguments<'_>) -> String {
    format!(
        "[{:7.3}s {:>5} {}] {}",
        uptime.as_secs_f64(),
        level,
        short_target(target),
        args
    )
}

struct PipelineLogger {
    max_level: LevelFilter,
    installed_at: Instant,
}

impl Log for PipelineLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.max_level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format_line(
            self.installed_at.elapsed(),
            record.level(),
            record.target(),
            record.args(),
        );
        let _ = writeln!(std::io::stderr().lock(), "{line}");
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

static PIPELINE_LOGGER: OnceLock<PipelineLogger> = OnceLock::new();

/// Route `log` records to stderr at `level` and below.
///
/// Only the first call installs; later calls keep the original level.
pub fn init_with_level(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    if PIPELINE_LOGGER.get().is_some() {
        return Ok(());
    }
    let logger = PIPELINE_LOGGER.get_or_init(|| PipelineLogger {
        max_level: level,
        installed_at: Instant::now(),
    });
    log::set_logger(logger)?;
    log::set_max_level(level);
    Ok(())
}

/// Install a `tracing` fmt subscriber on stderr; `log` records are bridged into it.
///
/// `RUST_LOG` wins when set, otherwise `level` applies. Returns `false` when a
/// global subscriber or logger was already installed.
#[cfg(feature = "tracing")]
pub fn init_tracing(level: LevelFilter, json: bool) -> bool {
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::{fmt as tfmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_ascii_lowercase()));
    let builder = tfmt().with_env_filter(filter).with_writer(std::io::stderr);
    let installed = if json {
        builder.json().flatten_event(true).finish().try_init()
    } else {
        builder
            .with_timer(tfmt::time::Uptime::default())
            .finish()
            .try_init()
    };
    installed.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lines_carry_uptime_level_and_short_target() {
        let line = format_line(
            Duration::from_millis(1234),
            Level::Info,
            "pelletcam::session",
            &format_args!("tag {} recorded", "p1"),
        );
        assert_eq!(line, "[  1.234s  INFO session] tag p1 recorded");
    }

    #[test]
    fn targets_without_a_path_are_kept() {
        assert_eq!(short_target("pelletcam"), "pelletcam");
        assert_eq!(short_target("a::b::c"), "c");
    }

    #[test]
    fn repeated_install_is_a_noop() {
        init_with_level(LevelFilter::Debug).unwrap();
        init_with_level(LevelFilter::Trace).unwrap();
        assert_eq!(
            PIPELINE_LOGGER.get().map(|l| l.max_level),
            Some(LevelFilter::Debug)
        );
    }
}
