use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use anyhow::Context as _;
use tracing_subscriber::Layer as _;
use tracing_subscriber::filter::{LevelFilter, Targets};
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

/// Logs to stderr (filtered by `RUST_LOG`, default `info`) and, when
/// `log_file` is given, appends this crate's debug records to it.
pub fn init(log_file: Option<&Path>) -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new("info"))
        .context("build log filter")?;

    let stderr = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(filter);

    let file = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("create log dir: {}", parent.display()))?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("open log file: {}", path.display()))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_target(false)
                    .with_writer(Mutex::new(file))
                    .with_filter(file_filter()),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(stderr)
        .with(file)
        .try_init()
        .map_err(|err| anyhow::anyhow!("initialize tracing subscriber: {err}"))?;

    Ok(())
}

/// Dependencies (html5ever, hyper, reqwest) stay out of the novel log.
fn file_filter() -> Targets {
    Targets::new().with_target(env!("CARGO_CRATE_NAME"), LevelFilter::DEBUG)
}

#[cfg(test)]
mod tests {
    use tracing::Level;

    use super::*;

    #[test]
    fn novel_log_keeps_only_crate_records() {
        let filter = file_filter();

        assert!(filter.would_enable("novelreader::pipeline", &Level::DEBUG));
        assert!(filter.would_enable("novelreader", &Level::INFO));
        assert!(!filter.would_enable("novelreader::fetch", &Level::TRACE));
        assert!(!filter.would_enable("html5ever::tree_builder", &Level::DEBUG));
        assert!(!filter.would_enable("hyper_util::client::legacy::connect::http", &Level::DEBUG));
        assert!(!filter.would_enable("reqwest::connect", &Level::WARN));
    }
}
