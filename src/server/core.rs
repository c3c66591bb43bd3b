use log::{error, info, warn};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::net::UdpSocket;
use tokio::sync::watch;

use crate::client::ClientRegistry;
use crate::config::PingerConfig;
use crate::error::PingerError;
use crate::protocol::REGISTRATION_BUFFER_SIZE;
use crate::server::shard::shard_index;
use crate::utils::network::{bind_udp_socket, resolve_listen_address};

/// Consecutive receive failures after which the socket is considered unusable.
const MAX_CONSECUTIVE_RECV_ERRORS: usize = 64;

/// Dispatcher that receives registrations and shards them across the pool.
///
/// The same socket is used for receiving here and for sending pings from
/// every registry.
pub struct Server {
    listen_address: SocketAddr,
    socket: Arc<UdpSocket>,
    pool: Vec<Arc<ClientRegistry>>,
    shutdown: watch::Sender<bool>,
    started: AtomicBool,
    stopping: AtomicBool,
}

impl Server {
    /// Binds the UDP socket and builds the registry pool.
    pub async fn bind(config: &PingerConfig) -> Result<Self, PingerError> {
        config.validate()?;

        let listen = config.listen_socket();
        let addr = resolve_listen_address(&listen)
            .await
            .ok_or_else(|| PingerError::InvalidAddress(listen.clone()))?;

        let socket = Arc::new(bind_udp_socket(addr).map_err(|e| PingerError::Bind(addr, e))?);
        let listen_address = socket.local_addr()?;

        let pool = (0..config.pool_size)
            .map(|id| {
                Arc::new(ClientRegistry::new(
                    id,
                    config.client_expiration(),
                    config.ping_interval(),
                    Arc::clone(&socket),
                ))
            })
            .collect();

        let (shutdown, _) = watch::channel(false);

        Ok(Self {
            listen_address,
            socket,
            pool,
            shutdown,
            started: AtomicBool::new(false),
            stopping: AtomicBool::new(false),
        })
    }

    /// Starts every registry, then receives registrations until [`stop`](Self::stop)
    /// is called.
    pub async fn start(&self) -> Result<(), PingerError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(PingerError::AlreadyRunning);
        }

        info!(
            "Listening on {} ({} workers)",
            self.listen_address,
            self.pool.len()
        );

        let mut shutdown = self.shutdown.subscribe();
        if self.stopping.load(Ordering::SeqCst) {
            let _ = shutdown.wait_for(|stopped| *stopped).await;
            info!("Stopped before start");
            return Ok(());
        }

        for registry in &self.pool {
            if let Err(e) = registry.start().await {
                // a concurrent stop() got to this registry first
                if self.stopping.load(Ordering::SeqCst) {
                    let _ = shutdown.wait_for(|stopped| *stopped).await;
                    info!("Stopped");
                    return Ok(());
                }
                return Err(e.into());
            }
        }

        let mut buf = [0u8; REGISTRATION_BUFFER_SIZE];
        let mut consecutive_errors = 0;

        loop {
            tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                received = self.socket.recv_from(&mut buf) => match received {
                    Ok((_, client_addr)) => {
                        consecutive_errors = 0;
                        self.route(client_addr).await;
                    }
                    Err(e) => {
                        consecutive_errors += 1;
                        warn!("Error receiving registration: {}", e);

                        if consecutive_errors >= MAX_CONSECUTIVE_RECV_ERRORS {
                            error!(
                                "Giving up after {} consecutive receive errors",
                                consecutive_errors
                            );
                            self.stop().await;
                            return Err(PingerError::Receive(e));
                        }
                    }
                },
            }
        }

        info!("Stopped");
        Ok(())
    }

    /// Stops every registry and waits for them to finish, then unblocks the
    /// receive loop, so `start()` only returns once the pool is stopped.
    /// Calling it again is a no-op.
    pub async fn stop(&self) {
        if self.stopping.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("Stopping...");

        for registry in &self.pool {
            registry.request_stop().await;
        }

        for registry in &self.pool {
            registry.join().await;
        }

        self.shutdown.send_replace(true);
    }

    /// Registers `client_addr` with the registry that owns it.
    pub async fn route(&self, client_addr: SocketAddr) {
        self.registry_for(&client_addr).upsert(client_addr).await;
    }

    /// Index of the registry owning `client_addr`.
    pub fn shard_of(&self, client_addr: &SocketAddr) -> usize {
        shard_index(client_addr, self.pool.len())
    }

    pub fn registry_for(&self, client_addr: &SocketAddr) -> &Arc<ClientRegistry> {
        &self.pool[self.shard_of(client_addr)]
    }

    pub fn pool(&self) -> &[Arc<ClientRegistry>] {
        &self.pool
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.listen_address
    }

    /// Total number of registered clients across the pool.
    pub async fn client_count(&self) -> usize {
        let mut total = 0;
        for registry in &self.pool {
            total += registry.client_count().await;
        }
        total
    }
}
