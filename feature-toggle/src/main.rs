use std::sync::Arc;

use anyhow::{bail, Context, Result};
use envconfig::Envconfig;
use tokio::signal;
use tracing_subscriber::fmt;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use feature_toggle::config::{Config, FlagKind, SourceKind};
use feature_toggle::dataset::FlagValue;
use feature_toggle::poller::spawn_refresh_loop_with;
use feature_toggle::source::{FileFlagSource, FlagSource, HttpFlagSource};
use feature_toggle::store::{self, DatasetStore};
use feature_toggle::{BooleanStore, FeatureStore};

async fn shutdown() {
    let mut term = match signal::unix::signal(signal::unix::SignalKind::terminate()) {
        Ok(term) => term,
        Err(e) => {
            tracing::error!("failed to register SIGTERM handler: {}", e);
            return;
        }
    };

    tokio::select! {
        _ = term.recv() => {},
        _ = signal::ctrl_c() => {},
    };

    tracing::info!("Shutting down gracefully...");
}

fn init_logging(debug: bool) {
    // Logs go to stderr so stdout stays a clean JSON report.
    let log_layer = {
        let base_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_level(true);

        if debug {
            base_layer
                .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE)
                .with_ansi(true)
                .with_filter(EnvFilter::from_default_env())
                .boxed()
        } else {
            base_layer
                .json()
                .with_filter(EnvFilter::from_default_env())
                .boxed()
        }
    };

    tracing_subscriber::registry().with(log_layer).init();
}

fn build_source(config: &Config) -> Result<Arc<dyn FlagSource>> {
    match config.flags_source {
        SourceKind::File => Ok(Arc::new(FileFlagSource::new(&config.flags_file))),
        SourceKind::Http => {
            if config.api_url.is_empty() || config.base_uuid.is_empty() {
                bail!("API_URL and BASE_UUID are required when FLAGS_SOURCE=http");
            }
            let source =
                HttpFlagSource::new(&config.api_url, &config.base_uuid, config.http_timeout())
                    .context("failed to build the HTTP flag source")?;
            Ok(Arc::new(source))
        }
    }
}

fn print_report<V: FlagValue>(store: &DatasetStore<V>) {
    match store.report() {
        Ok(report) => println!("{}", report),
        Err(e) => tracing::error!("failed to serialize flag report: {}", e),
    }
}

async fn run<V: FlagValue>(config: Config, store: DatasetStore<V>) -> Result<()> {
    let source = build_source(&config)?;
    let store = Arc::new(store.with_policy(config.raw_value_policy));

    store
        .refresh_from(source.as_ref())
        .await
        .context("initial flag load failed")?;
    store::set_global_store(store.clone());
    print_report(&store);

    if !*config.watch {
        return Ok(());
    }

    tracing::info!(
        interval_secs = config.refresh_interval_secs.get(),
        "watching for flag changes"
    );
    let poller = spawn_refresh_loop_with(store, source, config.refresh_interval(), |store| {
        print_report(store)
    });
    shutdown().await;
    poller.abort();
    store::clear_global_store();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::init_from_env().context("Invalid configuration")?;
    init_logging(*config.debug);

    match config.flags_kind {
        FlagKind::Feature => run(config, FeatureStore::default()).await,
        FlagKind::Boolean => run(config, BooleanStore::default()).await,
    }
}
