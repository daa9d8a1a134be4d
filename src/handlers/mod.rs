//! Listener supervisor
//!
//! Binds every configured decoy port up front and runs one accept loop per
//! port for the process lifetime, dispatching each accepted connection onto
//! its own task.

pub mod probe;
pub mod ssh;

use anyhow::{Context, Result};
use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpSocket};
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::classifier::OriginClassifier;
use crate::config::Config;
use crate::sink::EventSink;
use self::ssh::SshServer;

/// OS queue depth for not-yet-accepted connections on each passive socket
const LISTEN_BACKLOG: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortRole {
    Generic,
    Ssh,
}

pub struct Supervisor {
    listeners: Vec<(TcpListener, PortRole)>,
    classifier: Arc<OriginClassifier>,
    ssh: Arc<SshServer>,
    sink: EventSink,
    admission: Arc<Semaphore>,
}

impl Supervisor {
    /// Bind one listening socket per configured port before any accept loop
    /// starts. Any bind failure is fatal: a honeypot with a silently missing
    /// port is a monitoring gap, not a degraded mode.
    pub fn bind(
        config: &Config,
        classifier: Arc<OriginClassifier>,
        ssh: SshServer,
        sink: EventSink,
    ) -> Result<Self> {
        let mut listeners = Vec::with_capacity(config.server.ports.len());

        for &port in &config.server.ports {
            let role = if port == config.server.ssh_port {
                PortRole::Ssh
            } else {
                PortRole::Generic
            };
            let addr = (config.server.host.as_str(), port)
                .to_socket_addrs()
                .with_context(|| format!("Invalid listen address {}:{}", config.server.host, port))?
                .next()
                .with_context(|| format!("Unresolvable listen host {}", config.server.host))?;
            let listener =
                bind_socket(addr).with_context(|| format!("Failed to bind port {}", port))?;
            listeners.push((listener, role));
        }

        Ok(Self {
            listeners,
            classifier,
            ssh: Arc::new(ssh),
            sink,
            admission: Arc::new(Semaphore::new(config.limits.max_connections)),
        })
    }

    /// Bound addresses in configuration order. Ports requested as 0 show
    /// their ephemeral assignment here.
    pub fn local_addrs(&self) -> Vec<SocketAddr> {
        self.listeners
            .iter()
            .filter_map(|(l, _)| l.local_addr().ok())
            .collect()
    }

    /// Spawn one accept loop per bound port. The loops run for the process
    /// lifetime; this returns once they are all started.
    pub fn start(self) {
        let count = self.listeners.len();

        for (listener, role) in self.listeners {
            let classifier = self.classifier.clone();
            let ssh = self.ssh.clone();
            let sink = self.sink.clone();
            let admission = self.admission.clone();

            tokio::spawn(async move {
                accept_loop(listener, role, classifier, ssh, sink, admission).await;
            });
        }

        info!("Started {} listeners", count);
    }
}

async fn accept_loop(
    listener: TcpListener,
    role: PortRole,
    classifier: Arc<OriginClassifier>,
    ssh: Arc<SshServer>,
    sink: EventSink,
    admission: Arc<Semaphore>,
) {
    let port = listener.local_addr().map(|a| a.port()).unwrap_or(0);
    match role {
        PortRole::Ssh => info!("Deceptive SSH server listening on port {}", port),
        PortRole::Generic => info!("Probe listener started on port {}", port),
    }

    loop {
        match listener.accept().await {
            Ok((socket, peer)) => {
                // Admission limit: beyond capacity the connection is dropped
                // at accept time instead of spawning unboundedly
                let permit = match admission.clone().try_acquire_owned() {
                    Ok(p) => p,
                    Err(_) => {
                        warn!(
                            "Connection limit reached, dropping {} on port {}",
                            peer, port
                        );
                        continue;
                    }
                };

                let classifier = classifier.clone();
                let ssh = ssh.clone();
                let sink = sink.clone();

                tokio::spawn(async move {
                    let _permit = permit;
                    match role {
                        PortRole::Ssh => ssh.handle(socket, peer, port).await,
                        PortRole::Generic => {
                            probe::handle(socket, peer, port, classifier, sink).await
                        }
                    }
                });
            }
            Err(e) => {
                warn!("Accept error on port {}: {}", port, e);
            }
        }
    }
}

fn bind_socket(addr: SocketAddr) -> std::io::Result<TcpListener> {
    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };
    socket.set_reuseaddr(true)?;
    socket.bind(addr)?;
    socket.listen(LISTEN_BACKLOG)
}
