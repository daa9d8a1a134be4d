//! Deceptive SSH server
//!
//! Speaks the real transport protocol (version exchange, key exchange,
//! encrypted channel) with the persisted host key so connecting clients see
//! a genuine SSH endpoint, records every password attempt, and rejects all
//! of them. No authentication path returns `Auth::Accept` and no session
//! channel is ever opened.

use std::io::ErrorKind;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use russh::keys::{HashAlg, PrivateKey, PublicKey};
use russh::server::{Auth, Config, Handler, Msg, Session};
use russh::{Channel, MethodKind, SshId};
use tokio::net::TcpStream;
use tracing::{debug, error, info, warn};

use crate::events::CredentialAttempt;
use crate::sink::EventSink;

/// Version banner presented to clients; a stock OpenSSH string, since an
/// unusual banner is an immediate honeypot tell
const SERVER_ID: &str = "SSH-2.0-OpenSSH_8.9p1 Ubuntu-3ubuntu0.6";

pub struct SshServer {
    config: Arc<Config>,
    sink: EventSink,
}

impl SshServer {
    pub fn new(host_key: PrivateKey, sink: EventSink) -> Self {
        let config = Config {
            server_id: SshId::Standard(SERVER_ID.to_string()),
            keys: vec![host_key],
            methods: (&[MethodKind::PublicKey, MethodKind::Password]).as_slice().into(),
            auth_rejection_time: Duration::from_secs(3),
            auth_rejection_time_initial: Some(Duration::from_secs(0)),
            inactivity_timeout: Some(Duration::from_secs(60)),
            ..Default::default()
        };

        Self {
            config: Arc::new(config),
            sink,
        }
    }

    /// Serve one accepted connection through the transport handshake and
    /// auth phase. Every fault stays inside this call; nothing reaches the
    /// accept loop.
    pub async fn handle(&self, socket: TcpStream, peer: SocketAddr, port: u16) {
        debug!("SSH connection from {} on port {}", peer, port);

        let handler = SshHandler {
            peer,
            port,
            sink: self.sink.clone(),
        };

        match russh::server::run_stream(self.config.clone(), socket, handler).await {
            Ok(session) => {
                if let Err(e) = session.await {
                    log_session_error(peer, e);
                }
            }
            Err(e) => {
                // Handshake never completed
                log_session_error(peer, e);
            }
        }
    }
}

struct SshHandler {
    peer: SocketAddr,
    port: u16,
    sink: EventSink,
}

impl Handler for SshHandler {
    type Error = russh::Error;

    async fn auth_none(&mut self, user: &str) -> Result<Auth, Self::Error> {
        debug!("SSH none auth from {} for {:?}", self.peer, user);
        Ok(Auth::Reject {
            proceed_with_methods: Some(
                (&[MethodKind::PublicKey, MethodKind::Password]).as_slice().into(),
            ),
            partial_success: false,
        })
    }

    async fn auth_password(&mut self, user: &str, password: &str) -> Result<Auth, Self::Error> {
        info!(
            "SSH password attempt from {} on port {}: user {:?}",
            self.peer, self.port, user
        );
        self.sink
            .emit(CredentialAttempt::new(self.port, self.peer, user, password));

        Ok(Auth::Reject {
            proceed_with_methods: None,
            partial_success: false,
        })
    }

    async fn auth_publickey(
        &mut self,
        user: &str,
        public_key: &PublicKey,
    ) -> Result<Auth, Self::Error> {
        debug!(
            "SSH publickey offer from {} for {:?}: {}",
            self.peer,
            user,
            public_key.fingerprint(HashAlg::Sha256)
        );
        // Steer the client toward password auth; key offers carry no secret
        // worth recording
        Ok(Auth::Reject {
            proceed_with_methods: Some((&[MethodKind::Password]).as_slice().into()),
            partial_success: false,
        })
    }

    async fn channel_open_session(
        &mut self,
        channel: Channel<Msg>,
        _session: &mut Session,
    ) -> Result<bool, Self::Error> {
        // Unreachable while auth always rejects; refused regardless
        warn!(
            "SSH session channel {} refused for {}",
            channel.id(),
            self.peer
        );
        Ok(false)
    }
}

/// Per-connection fault boundary. Expected client misbehavior is logged at
/// warn, unexpected internals at error.
fn log_session_error(peer: SocketAddr, error: russh::Error) {
    match error {
        russh::Error::Disconnect => {
            debug!("SSH client {} disconnected", peer);
        }
        russh::Error::IO(err) => match err.kind() {
            ErrorKind::UnexpectedEof => {
                warn!("SSH session from {} ended without disconnect", peer);
            }
            ErrorKind::ConnectionReset => {
                warn!("SSH session from {} reset by peer", peer);
            }
            _ => {
                error!("SSH I/O error from {}: {}", peer, err);
            }
        },
        russh::Error::Elapsed(_) | russh::Error::InactivityTimeout => {
            warn!("SSH session from {} timed out", peer);
        }
        russh::Error::NoCommonAlgo { .. } => {
            warn!("SSH handshake with {} failed: no common algorithm", peer);
        }
        russh::Error::SshEncoding(err) => {
            warn!("SSH client {} sent a malformed packet: {}", peer, err);
        }
        _ => {
            error!("SSH session error from {}: {:?}", peer, error);
        }
    }
}
