//! # TCP Server
//!
//! Accepts connections indefinitely on the configured address, spawns one
//! independent handler task per connection, and shuts down cleanly on an
//! explicit stop signal. A connection's failure is isolated to that
//! connection; only bind/listen failures are fatal to the server itself.

pub mod handler;
pub mod registry;

mod connection;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info, warn};

use crate::config::ServerConfig;
use crate::error::Result;
use crate::server::registry::ClientRegistry;

/// How long shutdown waits for in-flight connections before forcing exit.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Server-wide traffic counters, shared with every connection handler.
#[derive(Debug, Default)]
pub struct ServerStats {
    packets_received: AtomicU64,
    packets_sent: AtomicU64,
    bytes_received: AtomicU64,
    bytes_sent: AtomicU64,
    /// Header bytes carried on top of received payloads.
    overhead_bytes: AtomicU64,
}

impl ServerStats {
    pub(crate) fn record_received(&self, packet_len: usize, payload_len: usize) {
        self.packets_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received
            .fetch_add(packet_len as u64, Ordering::Relaxed);
        self.overhead_bytes
            .fetch_add((packet_len - payload_len) as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_sent(&self, packet_len: usize) {
        self.packets_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent
            .fetch_add(packet_len as u64, Ordering::Relaxed);
    }

    /// Consistent-enough point-in-time copy of the counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            packets_received: self.packets_received.load(Ordering::Relaxed),
            packets_sent: self.packets_sent.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            overhead_bytes: self.overhead_bytes.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`ServerStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub packets_received: u64,
    pub packets_sent: u64,
    pub bytes_received: u64,
    pub bytes_sent: u64,
    pub overhead_bytes: u64,
}

/// The protocol server: listener, chat registry and traffic counters.
pub struct Server {
    listener: TcpListener,
    config: ServerConfig,
    registry: Arc<ClientRegistry>,
    stats: Arc<ServerStats>,
    next_id: AtomicU64,
}

impl Server {
    /// Validate `config` and bind its listen address.
    pub async fn bind(config: ServerConfig) -> Result<Self> {
        config.validate_strict()?;
        let listener = TcpListener::bind(&config.address).await?;
        info!(address = %config.address, mode = %config.mode, "server listening");
        Ok(Self {
            listener,
            config,
            registry: Arc::new(ClientRegistry::new()),
            stats: Arc::new(ServerStats::default()),
            next_id: AtomicU64::new(0),
        })
    }

    /// The address actually bound (useful when configured with port 0).
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Handle to the traffic counters; stays valid while the server runs.
    pub fn stats(&self) -> Arc<ServerStats> {
        Arc::clone(&self.stats)
    }

    /// Handle to the chat client registry.
    pub fn registry(&self) -> Arc<ClientRegistry> {
        Arc::clone(&self.registry)
    }

    /// Run until CTRL+C.
    pub async fn run(self) -> Result<()> {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);
        tokio::spawn(async move {
            if let Ok(()) = tokio::signal::ctrl_c().await {
                info!("received CTRL+C signal, shutting down");
                let _ = shutdown_tx.send(()).await;
            }
        });
        self.run_until(shutdown_rx).await
    }

    /// Run until a message arrives on `shutdown_rx`, then close all open
    /// connections and drain with a grace period.
    pub async fn run_until(self, mut shutdown_rx: mpsc::Receiver<()>) -> Result<()> {
        let (conn_shutdown_tx, _) = broadcast::channel::<()>(1);
        let active_connections = Arc::new(AtomicUsize::new(0));

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("shutting down server, closing connections");
                    let _ = conn_shutdown_tx.send(());

                    let timeout = tokio::time::sleep(SHUTDOWN_GRACE);
                    tokio::pin!(timeout);
                    loop {
                        tokio::select! {
                            _ = &mut timeout => {
                                warn!("shutdown grace period elapsed, forcing exit");
                                break;
                            }
                            _ = tokio::time::sleep(Duration::from_millis(100)) => {
                                let remaining = active_connections.load(Ordering::Acquire);
                                if remaining == 0 {
                                    info!("all connections closed");
                                    break;
                                }
                            }
                        }
                    }

                    return Ok(());
                }

                accept_result = self.listener.accept() => {
                    match accept_result {
                        Ok((stream, peer)) => {
                            let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
                            let config = self.config.clone();
                            let registry = Arc::clone(&self.registry);
                            let stats = Arc::clone(&self.stats);
                            let shutdown = conn_shutdown_tx.subscribe();
                            let active = Arc::clone(&active_connections);

                            active.fetch_add(1, Ordering::AcqRel);
                            tokio::spawn(async move {
                                connection::handle_connection(
                                    stream, peer, id, config, registry, stats, shutdown,
                                )
                                .await;
                                active.fetch_sub(1, Ordering::AcqRel);
                            });
                        }
                        Err(e) => {
                            error!(error = %e, "error accepting connection");
                        }
                    }
                }
            }
        }
    }
}
