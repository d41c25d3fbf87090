use anyhow::Result;
use meditrack_client::StateDir;
use std::fs::OpenOptions;
use tracing::Level;
use tracing_subscriber::{
    EnvFilter, Layer, layer::SubscriberExt, registry::LookupSpan, util::SubscriberInitExt,
};

fn stderr_layer<S>() -> impl Layer<S>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(true)
}

fn env_filter(level: Level) -> EnvFilter {
    let level_str = level.as_str().to_lowercase();
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("meditrack={level_str},meditrack_client={level_str}").into())
}

/// Initialize logging for the CLI
///
/// Logs always go to stderr; unless `no_file_log` is set they are also
/// appended to `<data dir>/<component>.log`.
pub fn init_logging(
    log_level: Level,
    state_dir: &StateDir,
    component: &str,
    no_file_log: bool,
) -> Result<()> {
    if no_file_log {
        tracing_subscriber::registry()
            .with(env_filter(log_level))
            .with(stderr_layer())
            .init();
        return Ok(());
    }

    let log_file_path = state_dir.log_path(component);
    if let Some(parent) = log_file_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_file_path)?;

    tracing_subscriber::registry()
        .with(env_filter(log_level))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(log_file)
                .with_ansi(false),
        )
        .with(stderr_layer())
        .init();

    Ok(())
}
