use std::sync::Arc;

use tokio::net::UdpSocket;
use tokio::sync::{Semaphore, broadcast};
use tracing::{debug, error, info, warn};

use crate::responder::{Rejection, Responder};

/// Largest datagram read from the socket
const RECV_BUFFER_SIZE: usize = 4096;

/// Run the UDP responder loop until a shutdown signal arrives.
///
/// Each datagram is handled on its own task. A task only starts once a
/// permit is available, so at most `query_semaphore`'s capacity are in
/// flight and the receive loop waits rather than dropping work.
pub async fn run_udp_server(
    sock: Arc<UdpSocket>,
    responder: Arc<Responder>,
    query_semaphore: Arc<Semaphore>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    info!("UDP DNS server listening on {}", sock.local_addr()?);
    let mut buf = vec![0_u8; RECV_BUFFER_SIZE];

    loop {
        let permit = tokio::select! {
            _ = shutdown_rx.recv() => break,
            permit = query_semaphore.clone().acquire_owned() => permit?,
        };

        tokio::select! {
            _ = shutdown_rx.recv() => break,

            result = sock.recv_from(&mut buf) => {
                let (read_bytes, src_addr) = match result {
                    Ok(received) => received,
                    Err(e) => {
                        warn!("UDP receive failed: {}", e);
                        continue;
                    }
                };

                let query_data = buf[..read_bytes].to_vec();
                let sock = sock.clone();
                let responder = responder.clone();

                tokio::spawn(async move {
                    let _permit = permit;

                    match responder.respond(&query_data, src_addr) {
                        Ok(response) => {
                            if let Err(e) = sock.send_to(&response, src_addr).await {
                                error!("Failed to send UDP response to {}: {}", src_addr, e);
                            }
                        }
                        Err(rejection @ Rejection::Pack(_)) => {
                            error!("{}: {}", src_addr, rejection);
                        }
                        Err(rejection) if rejection.is_malformed() => {
                            debug!("Dropping datagram from {}: {}", src_addr, rejection);
                        }
                        Err(rejection) => {
                            warn!("Dropping query from {}: {}", src_addr, rejection);
                        }
                    }
                });
            }
        }
    }

    info!("UDP server received shutdown signal");
    Ok(())
}
