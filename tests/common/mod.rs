//! Shared harness for the socket-level integration tests

use netsnare::classifier::OriginClassifier;
use netsnare::config::{
    ClassifierConfig, Config, KeysConfig, LimitsConfig, LoggingConfig, ServerConfig, WebConfig,
};
use netsnare::handlers::ssh::SshServer;
use netsnare::handlers::Supervisor;
use netsnare::{keys, sink};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

pub fn test_dir() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("netsnare_test_{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

/// Config bound to loopback with the classifier disabled, so tests stay
/// hermetic. Ports given as 0 come back as ephemeral assignments.
pub fn test_config(ports: Vec<u16>, ssh_port: u16, dir: &Path) -> Config {
    Config {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            ports,
            ssh_port,
        },
        limits: LimitsConfig::default(),
        logging: LoggingConfig {
            level: "info".to_string(),
            events_file: dir.join("events.log").to_string_lossy().into_owned(),
        },
        keys: KeysConfig {
            host_key: dir.join("host_key").to_string_lossy().into_owned(),
        },
        classifier: ClassifierConfig {
            enabled: false,
            ..Default::default()
        },
        web: WebConfig::default(),
    }
}

/// Bind and start a supervisor for `config`, returning the bound addresses
pub fn start_supervisor(config: &Config) -> Vec<SocketAddr> {
    let sink = sink::start(PathBuf::from(&config.logging.events_file));
    let host_key = keys::load_or_generate(Path::new(&config.keys.host_key)).unwrap();
    let classifier = Arc::new(OriginClassifier::new(&config.classifier).unwrap());
    let ssh = SshServer::new(host_key, sink.clone());

    let supervisor = Supervisor::bind(config, classifier, ssh, sink).unwrap();
    let addrs = supervisor.local_addrs();
    supervisor.start();
    addrs
}

/// Wait out the sink's flush interval, then parse the event log
pub async fn read_events(config: &Config) -> Vec<serde_json::Value> {
    tokio::time::sleep(Duration::from_millis(600)).await;
    let text = std::fs::read_to_string(&config.logging.events_file).unwrap_or_default();
    text.lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}
