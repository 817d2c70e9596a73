//! Logging setup: console output plus a `pipeline.log` file in the run's
//! output directory.

use std::path::Path;

use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Registry;

use crate::config::LoggingConfig;
use crate::Result;

/// Initialize logging with console and file output.
///
/// The file layer writes `pipeline.log` inside `output_dir`, which is
/// expected to be the dated per-run directory.
pub fn init_logging(config: &LoggingConfig, output_dir: &Path) -> Result<()> {
    let level = &config.level;
    let env_filter = EnvFilter::new(format!("{level},quizgen={level}"));

    if config.backtrace {
        std::env::set_var("RUST_BACKTRACE", "1");
    }

    let file_appender = tracing_appender::rolling::never(output_dir, "pipeline.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let console_layer = fmt::layer()
        .with_target(true)
        .with_writer(std::io::stderr);

    let file_layer = fmt::layer()
        .with_target(true)
        .with_writer(non_blocking)
        .with_ansi(false);

    Registry::default()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    // Keep the appender guard alive for the lifetime of the process
    std::mem::forget(guard);

    tracing::info!(
        "Logging initialized (level: {}), file output: {}",
        level,
        output_dir.join("pipeline.log").display()
    );

    Ok(())
}

/// Initialize console-only logging for auxiliary commands and tests.
pub fn init_simple_logging() -> Result<()> {
    tracing_subscriber::fmt()
        .with_target(true)
        .with_max_level(tracing::Level::INFO)
        .init();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_logging_does_not_panic() {
        // A second initialization in the same process fails; we only care
        // that the call itself is safe.
        let _ = init_simple_logging();
    }
}
