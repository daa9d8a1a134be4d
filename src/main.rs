use anyhow::Result;
use netsnare::config::Config;
use netsnare::handlers::ssh::SshServer;
use netsnare::handlers::Supervisor;
use netsnare::{classifier, keys, sink, web};
use std::path::Path;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (before any other initialization)
    let _ = dotenvy::dotenv();

    // Configuration drives the log level, so it loads before the subscriber
    let config = Config::load()?;

    // Initialize logging based on LOG_FORMAT env var
    // Use LOG_FORMAT=gcp for structured GCP Cloud Logging
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_default();
    if log_format == "gcp" {
        tracing_subscriber::registry()
            .with(tracing_subscriber::filter::LevelFilter::INFO)
            .with(tracing_stackdriver::layer())
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::new(&config.logging.level))
            .init();
    }

    info!("Starting netsnare...");
    info!(
        "Listen ports: {:?} (deceptive SSH on {})",
        config.server.ports, config.server.ssh_port
    );

    // Event log shared by every handler
    let sink = sink::start(config.logging.events_file.clone().into());

    // Host identity key: generated on first start, stable afterwards
    let host_key = keys::load_or_generate(Path::new(&config.keys.host_key))?;

    let classifier = Arc::new(classifier::OriginClassifier::new(&config.classifier)?);
    if config.classifier.enabled {
        info!("Origin classifier enabled ({})", config.classifier.endpoint);
    } else {
        info!("Origin classifier disabled");
    }

    let ssh = SshServer::new(host_key, sink.clone());

    // Bind every port before accepting anything; a failed bind aborts startup
    let supervisor = Supervisor::bind(&config, classifier, ssh, sink)?;
    supervisor.start();

    if config.web.enabled {
        // Static-file decoy site (blocking)
        web::start_server(&config).await?;
    } else {
        std::future::pending::<()>().await;
    }

    Ok(())
}
