//! Probe handler for generic decoy ports
//!
//! Captures whatever an unauthenticated probe sends within the read
//! deadline, tags the source, answers with a fixed rejection and closes.

use std::io::ErrorKind;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, error, warn};

use crate::classifier::OriginClassifier;
use crate::events::ConnectionEvent;
use crate::sink::EventSink;

const READ_DEADLINE: Duration = Duration::from_secs(4);
const MAX_PAYLOAD: usize = 64;
const REJECTION: &[u8] = b"Access Denied.\n";

pub async fn handle(
    mut socket: TcpStream,
    peer: SocketAddr,
    port: u16,
    classifier: Arc<OriginClassifier>,
    sink: EventSink,
) {
    let mut buf = [0u8; MAX_PAYLOAD];

    match tokio::time::timeout(READ_DEADLINE, socket.read(&mut buf)).await {
        Ok(Ok(0)) => {
            // Peer connected and closed without sending anything
            let vpn = classifier.classify(peer.ip()).await;
            debug!("Empty probe from {} on port {}", peer, port);
            sink.emit(ConnectionEvent::new(port, peer).with_classification(vpn));
        }
        Ok(Ok(n)) => {
            let vpn = classifier.classify(peer.ip()).await;
            debug!(
                "Probe from {} on port {}: {} bytes (vpn={})",
                peer, port, n, vpn
            );
            sink.emit(
                ConnectionEvent::new(port, peer)
                    .with_payload(&buf[..n])
                    .with_classification(vpn),
            );

            if let Err(e) = socket.write_all(REJECTION).await {
                match e.kind() {
                    ErrorKind::ConnectionReset | ErrorKind::BrokenPipe => {
                        error!("Connection reset by {} on port {}", peer, port);
                    }
                    _ => warn!("Failed to answer probe from {}: {}", peer, e),
                }
            }
        }
        Ok(Err(e)) if e.kind() == ErrorKind::ConnectionReset => {
            error!("Connection reset by {} on port {}", peer, port);
        }
        Ok(Err(e)) => {
            warn!("Probe read error from {} on port {}: {}", peer, port, e);
        }
        Err(_) => {
            // Expected scanner behavior: connect, say nothing, hold the
            // socket. Not an error and not worth an event.
            debug!("Probe from {} on port {} sent nothing before deadline", peer, port);
        }
    }
    // Socket closes on drop
}
