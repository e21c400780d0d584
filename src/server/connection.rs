//! Per-connection read/decode/dispatch/encode/write loop.
//!
//! Each accepted connection runs one of these on its own task. The loop owns
//! the connection's framed stream exclusively, so replies and queued chat
//! broadcasts go out in the order this task processes them. Any fatal error
//! (malformed header, oversized frame, handler failure, I/O) closes this
//! connection and nothing else.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc};
use tokio_util::codec::Framed;
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::core::codec::PacketCodec;
use crate::core::stack::ProtocolStack;
use crate::server::handler::Mode;
use crate::server::registry::{ClientRegistry, ConnectionId};
use crate::server::ServerStats;

/// How much a file-mode connection may accumulate, as a multiple of the
/// packet size limit.
const FILE_SINK_PACKETS: usize = 64;

pub(crate) async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    id: ConnectionId,
    config: ServerConfig,
    registry: Arc<ClientRegistry>,
    stats: Arc<ServerStats>,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut framed = Framed::new(stream, PacketCodec::new(config.max_packet_size));
    let stack = ProtocolStack::new();
    let mut handler = config
        .mode
        .handler(config.max_packet_size.saturating_mul(FILE_SINK_PACKETS));

    // Only chat mode receives broadcasts; other modes drop the sender so the
    // queue stays permanently empty.
    let (tx, mut rx) = mpsc::unbounded_channel::<Vec<u8>>();
    let registered = config.mode == Mode::Chat;
    if registered {
        registry.register(id, tx);
    } else {
        drop(tx);
    }

    info!(conn = id, %peer, mode = %config.mode, "connection established");

    loop {
        tokio::select! {
            maybe_frame = framed.next() => match maybe_frame {
                Some(Ok(frame)) => {
                    let payload = match stack.decapsulate(&frame) {
                        Ok(payload) => payload,
                        Err(e) => {
                            warn!(conn = id, %peer, error = %e, "dropping connection on decode failure");
                            break;
                        }
                    };
                    stats.record_received(frame.len(), payload.len());
                    debug!(conn = id, packet = frame.len(), payload = payload.len(), "packet decoded");

                    let reply = match handler.handle(&payload, id, &registry) {
                        Ok(reply) => reply,
                        Err(e) => {
                            warn!(conn = id, %peer, error = %e, "dropping connection on handler failure");
                            break;
                        }
                    };
                    let packet = stack.encapsulate(&reply);
                    stats.record_sent(packet.len());
                    if let Err(e) = framed.send(packet).await {
                        warn!(conn = id, %peer, error = %e, "failed to write reply");
                        break;
                    }
                }
                Some(Err(e)) => {
                    warn!(conn = id, %peer, error = %e, "dropping connection on framing failure");
                    break;
                }
                None => {
                    info!(conn = id, %peer, "peer closed connection");
                    break;
                }
            },

            Some(broadcast_payload) = rx.recv() => {
                let packet = stack.encapsulate(&broadcast_payload);
                stats.record_sent(packet.len());
                if let Err(e) = framed.send(packet).await {
                    warn!(conn = id, %peer, error = %e, "failed to deliver broadcast");
                    break;
                }
            }

            _ = shutdown.recv() => {
                info!(conn = id, %peer, "closing connection for server shutdown");
                break;
            }

            () = idle_wait(config.idle_timeout) => {
                info!(conn = id, %peer, "closing idle connection");
                break;
            }
        }
    }

    // Every exit path releases shared and per-connection state.
    if registered {
        registry.unregister(id);
    }
    handler.on_disconnect();
    info!(conn = id, %peer, "connection closed");
}

/// Pends forever when no idle timeout is configured, so the select arm never
/// fires.
async fn idle_wait(timeout: Option<Duration>) {
    match timeout {
        Some(t) => tokio::time::sleep(t).await,
        None => std::future::pending::<()>().await,
    }
}
