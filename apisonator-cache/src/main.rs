mod config;

use crate::config::{Config, LoggingConfig, MetricsConfig};
use clap::Parser;
use metrics_exporter_statsd::StatsdBuilder;
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const METRICS_PREFIX: &str = "apisonator_cache";

/// Caching HTTP adapter in front of an Apisonator backend.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Port that HTTP server should listen on [default: 3000]
    #[arg(long)]
    port: Option<u16>,

    /// The URL of upstream Apisonator server
    #[arg(long)]
    upstream: Option<String>,

    /// Path to a YAML config file. Flags take precedence over its values.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error(transparent)]
    Config(#[from] config::ConfigError),
    #[error("invalid sentry DSN: {0}")]
    SentryDsn(#[from] sentry::types::ParseDsnError),
    #[error("could not set up metrics: {0}")]
    Metrics(String),
    #[error(transparent)]
    Apisonator(#[from] apisonator::errors::ApisonatorError),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            process::exit(1);
        }
    };

    let _sentry = match init_logging(config.common.logging.as_ref()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("{e}");
            process::exit(1);
        }
    };

    if let Err(e) = run(config).await {
        tracing::error!("{e}");
        process::exit(1);
    }
}

async fn run(config: Config) -> Result<(), CliError> {
    if let Some(metrics) = &config.common.metrics {
        init_metrics(metrics)?;
    }

    tracing::info!(
        port = config.apisonator.listener.port,
        upstream = %config.apisonator.upstream,
        "starting apisonator-cache"
    );
    apisonator::run(config.apisonator, shutdown_signal()).await?;
    tracing::info!("stopped");

    Ok(())
}

fn load_config(cli: &Cli) -> Result<Config, CliError> {
    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::from_upstream(""),
    };

    Ok(config.with_overrides(cli.upstream.clone(), cli.port))
}

fn init_logging(
    logging: Option<&LoggingConfig>,
) -> Result<Option<sentry::ClientInitGuard>, CliError> {
    let sentry_guard = match logging {
        Some(logging) => {
            let dsn = logging.sentry_dsn.parse()?;
            Some(sentry::init(sentry::ClientOptions {
                dsn: Some(dsn),
                release: sentry::release_name!(),
                ..Default::default()
            }))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .with(
            sentry_guard
                .as_ref()
                .map(|_| sentry::integrations::tracing::layer()),
        )
        .init();

    Ok(sentry_guard)
}

fn init_metrics(metrics_config: &MetricsConfig) -> Result<(), CliError> {
    let recorder = StatsdBuilder::from(&metrics_config.statsd_host, metrics_config.statsd_port)
        .build(Some(METRICS_PREFIX))
        .map_err(|e| CliError::Metrics(e.to_string()))?;
    metrics::set_global_recorder(recorder).map_err(|e| CliError::Metrics(e.to_string()))?;

    shared::metrics_defs::describe_all(apisonator::metrics_defs::ALL_METRICS);
    shared::metrics_defs::describe_all(threescale::metrics_defs::ALL_METRICS);

    tracing::info!(
        host = %metrics_config.statsd_host,
        port = metrics_config.statsd_port,
        "sending metrics to statsd"
    );
    Ok(())
}

/// Resolves on Ctrl-C or, on unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("could not listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("could not listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn flags_without_config_file() {
        let cli = Cli::parse_from(["apisonator-cache", "--upstream", "http://backend:3001"]);
        let config = load_config(&cli).unwrap();
        assert_eq!(config.apisonator.upstream, "http://backend:3001");
        assert_eq!(config.apisonator.listener.port, 3000);
        assert!(config.apisonator.validate().is_ok());

        let cli = Cli::parse_from(["apisonator-cache", "--port", "8080"]);
        let config = load_config(&cli).unwrap();
        assert_eq!(config.apisonator.listener.port, 8080);
        // The upstream is mandatory
        assert!(config.apisonator.validate().is_err());
    }

    #[test]
    fn missing_config_file() {
        let cli = Cli::parse_from(["apisonator-cache", "--config", "/nonexistent.yaml"]);
        assert!(matches!(load_config(&cli), Err(CliError::Config(_))));
    }
}
