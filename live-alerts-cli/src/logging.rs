//! Console and optional rolling-file logging with local timestamps.

use std::path::Path;

use chrono::Local;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::Writer, time::FormatTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use crate::error::{CliError, Result};

/// Default log filter directive.
pub const DEFAULT_LOG_FILTER: &str = "live_alerts=info,live_alerts_cli=info";

const VERBOSE_LOG_FILTER: &str = "live_alerts=debug,live_alerts_cli=debug";
const QUIET_LOG_FILTER: &str = "error";

/// Timestamps in the local timezone.
#[derive(Debug, Clone, Copy)]
struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z"))
    }
}

/// Pick the filter directive. `RUST_LOG` wins unless `-v` or `-q` was given.
pub fn filter_directive(verbose: bool, quiet: bool, env: Option<&str>) -> String {
    if quiet {
        QUIET_LOG_FILTER.to_string()
    } else if verbose {
        VERBOSE_LOG_FILTER.to_string()
    } else {
        env.filter(|s| !s.trim().is_empty())
            .unwrap_or(DEFAULT_LOG_FILTER)
            .to_string()
    }
}

/// Install the global subscriber.
///
/// The returned guard flushes the file writer and must live until exit.
pub fn init_logging(verbose: bool, quiet: bool, log_dir: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let env = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let directive = filter_directive(verbose, quiet, env.as_deref());
    let filter = EnvFilter::try_new(&directive)
        .map_err(|e| CliError::Logging(format!("invalid filter directive {directive:?}: {e}")))?;

    let console = fmt::layer().with_target(verbose).with_timer(LocalTimer);

    let (file, guard) = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let appender = tracing_appender::rolling::daily(dir, "live-alerts.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_timer(LocalTimer)
                .boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .try_init()
        .map_err(|e| CliError::Logging(e.to_string()))?;

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_directive() {
        assert_eq!(filter_directive(false, false, None), DEFAULT_LOG_FILTER);
        assert_eq!(filter_directive(false, false, Some("")), DEFAULT_LOG_FILTER);
        assert_eq!(filter_directive(false, false, Some("live_alerts=trace")), "live_alerts=trace");
        assert_eq!(filter_directive(true, false, Some("warn")), VERBOSE_LOG_FILTER);
        assert_eq!(filter_directive(false, true, None), QUIET_LOG_FILTER);
    }

    #[test]
    fn test_directives_parse() {
        for directive in [DEFAULT_LOG_FILTER, VERBOSE_LOG_FILTER, QUIET_LOG_FILTER] {
            EnvFilter::try_new(directive).unwrap();
        }
    }
}
