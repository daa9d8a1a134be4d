//! Event records written to the event log

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::net::SocketAddr;
use uuid::Uuid;

/// One accepted connection on a generic decoy port
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionEvent {
    pub id: Uuid,
    pub kind: &'static str,
    pub timestamp: DateTime<Utc>,
    pub port: u16,
    pub peer_ip: String,
    pub peer_port: u16,
    /// Raw probe bytes, hex-encoded so binary payloads survive the log intact
    pub payload: Option<String>,
    pub vpn: bool,
}

impl ConnectionEvent {
    pub fn new(port: u16, peer: SocketAddr) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: "connection",
            timestamp: Utc::now(),
            port,
            peer_ip: peer.ip().to_string(),
            peer_port: peer.port(),
            payload: None,
            vpn: false,
        }
    }

    pub fn with_payload(mut self, payload: &[u8]) -> Self {
        self.payload = Some(hex::encode(payload));
        self
    }

    pub fn with_classification(mut self, vpn: bool) -> Self {
        self.vpn = vpn;
        self
    }
}

/// One password authentication attempt seen by the deceptive SSH server.
/// The outcome field is a constant: there is no accepting code path.
#[derive(Debug, Clone, Serialize)]
pub struct CredentialAttempt {
    pub id: Uuid,
    pub kind: &'static str,
    pub timestamp: DateTime<Utc>,
    pub port: u16,
    pub peer_ip: String,
    pub peer_port: u16,
    pub username: String,
    pub password: String,
    pub outcome: &'static str,
}

impl CredentialAttempt {
    pub fn new(port: u16, peer: SocketAddr, username: &str, password: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: "credential-attempt",
            timestamp: Utc::now(),
            port,
            peer_ip: peer.ip().to_string(),
            peer_port: peer.port(),
            username: username.to_string(),
            password: password.to_string(),
            outcome: "rejected",
        }
    }
}

/// Union type carried by the sink channel
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Event {
    Connection(ConnectionEvent),
    Credential(CredentialAttempt),
}

impl From<ConnectionEvent> for Event {
    fn from(e: ConnectionEvent) -> Self {
        Event::Connection(e)
    }
}

impl From<CredentialAttempt> for Event {
    fn from(e: CredentialAttempt) -> Self {
        Event::Credential(e)
    }
}
