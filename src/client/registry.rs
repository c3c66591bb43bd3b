//! Client registry
//!
//! A registry owns one shard of the clients. It records when each client last
//! registered, pings every known client on a fixed cadence and forgets the
//! ones that stayed silent for longer than the expiration.

use log::{debug, error, info, warn};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval};

use crate::client::state::RegistryState;
use crate::error::RegistryError;
use crate::protocol::PING_PAYLOAD;

struct Lifecycle {
    state: RegistryState,
    task: Option<JoinHandle<()>>,
}

/// Registry for one shard of registered clients.
///
/// All reads and writes of the client map go through a single lock, so a
/// registration racing with a sweep is either seen by the sweep (and the
/// client survives) or lands after it as a fresh insert.
pub struct ClientRegistry {
    id: usize,
    expiration: Duration,
    ping_interval: Duration,
    socket: Arc<UdpSocket>,
    clients: Mutex<HashMap<SocketAddr, Instant>>,
    shutdown: watch::Sender<bool>,
    lifecycle: Mutex<Lifecycle>,
}

impl ClientRegistry {
    /// Creates a registry that pings through `socket` every `ping_interval`
    /// and drops clients not seen for more than `expiration`.
    pub fn new(
        id: usize,
        expiration: Duration,
        ping_interval: Duration,
        socket: Arc<UdpSocket>,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            id,
            expiration,
            ping_interval,
            socket,
            clients: Mutex::new(HashMap::new()),
            shutdown,
            lifecycle: Mutex::new(Lifecycle {
                state: RegistryState::Created,
                task: None,
            }),
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn expiration(&self) -> Duration {
        self.expiration
    }

    /// Registers `address`, or refreshes its TTL if already known.
    pub async fn upsert(&self, address: SocketAddr) {
        let mut clients = self.clients.lock().await;
        if clients.insert(address, Instant::now()).is_none() {
            info!("Worker {}: add client {}", self.id, address);
        } else {
            debug!("Worker {}: refresh client {}", self.id, address);
        }
    }

    /// Sends one ping to every registered client.
    ///
    /// Returns how many pings were handed to the socket. A failed send is
    /// logged and the pass moves on to the next client.
    pub async fn ping_all(&self) -> usize {
        let clients = self.clients.lock().await;
        if clients.is_empty() {
            return 0;
        }

        debug!("Worker {}: pinging {} clients", self.id, clients.len());
        let mut sent = 0;
        for address in clients.keys() {
            match self.socket.send_to(&PING_PAYLOAD, address).await {
                Ok(_) => sent += 1,
                Err(e) => warn!("Worker {}: failed to ping {}: {}", self.id, address, e),
            }
        }
        sent
    }

    /// Removes clients whose last registration is older than the expiration.
    pub async fn sweep_expired(&self) -> Vec<SocketAddr> {
        self.sweep_expired_at(Instant::now()).await
    }

    /// Same as [`sweep_expired`](Self::sweep_expired), measured against `now`.
    pub async fn sweep_expired_at(&self, now: Instant) -> Vec<SocketAddr> {
        let mut clients = self.clients.lock().await;
        if clients.is_empty() {
            return Vec::new();
        }

        debug!("Worker {}: refreshing clients list", self.id);
        let mut expired = Vec::new();
        clients.retain(|address, last_seen| {
            if now.saturating_duration_since(*last_seen) > self.expiration {
                info!("Worker {}: client {} expired", self.id, address);
                expired.push(*address);
                false
            } else {
                true
            }
        });
        expired
    }

    /// Pings every `ping_interval` until a stop is requested. After each ping
    /// pass, sweeps if half the expiration has elapsed since the last sweep, so
    /// a pass slower than the interval cannot starve eviction. The pass in
    /// progress always completes.
    pub async fn run_loop(self: Arc<Self>) {
        let mut shutdown = self.shutdown.subscribe();

        let mut ping_ticker = interval(self.ping_interval);
        ping_ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let sweep_period = self.expiration / 2;
        let mut next_sweep = Instant::now() + sweep_period;

        loop {
            if *shutdown.borrow_and_update() {
                break;
            }

            tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                _ = ping_ticker.tick() => {}
            }

            self.ping_all().await;

            if Instant::now() >= next_sweep {
                self.sweep_expired().await;
                next_sweep = Instant::now() + sweep_period;
            }
        }

        info!("Worker {}: stopped", self.id);
    }

    /// Spawns [`run_loop`](Self::run_loop) on the runtime.
    pub async fn start(self: &Arc<Self>) -> Result<(), RegistryError> {
        let mut lifecycle = self.lifecycle.lock().await;
        match lifecycle.state {
            RegistryState::Created => {}
            RegistryState::Running => return Err(RegistryError::AlreadyStarted(self.id)),
            RegistryState::Stopping | RegistryState::Stopped => {
                return Err(RegistryError::Stopped(self.id));
            }
        }

        lifecycle.task = Some(tokio::spawn(Arc::clone(self).run_loop()));
        lifecycle.state = RegistryState::Running;
        Ok(())
    }

    /// Asks the loop to exit after its current pass. Does not wait.
    pub async fn request_stop(&self) {
        self.shutdown.send_replace(true);

        let mut lifecycle = self.lifecycle.lock().await;
        lifecycle.state = match lifecycle.state {
            RegistryState::Created => RegistryState::Stopped,
            RegistryState::Running => RegistryState::Stopping,
            other => other,
        };
    }

    /// Waits for the loop task to finish. No-op if it was never started or
    /// has already been joined.
    pub async fn join(&self) {
        let task = self.lifecycle.lock().await.task.take();

        if let Some(task) = task {
            if let Err(e) = task.await {
                error!("Worker {}: task failed: {}", self.id, e);
            }
            self.lifecycle.lock().await.state = RegistryState::Stopped;
        }
    }

    pub async fn state(&self) -> RegistryState {
        self.lifecycle.lock().await.state
    }

    pub async fn client_count(&self) -> usize {
        self.clients.lock().await.len()
    }

    pub async fn last_seen(&self, address: &SocketAddr) -> Option<Instant> {
        self.clients.lock().await.get(address).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::timeout;

    async fn loopback_socket() -> Arc<UdpSocket> {
        Arc::new(UdpSocket::bind("127.0.0.1:0").await.unwrap())
    }

    async fn registry(expiration: Duration, ping_interval: Duration) -> Arc<ClientRegistry> {
        Arc::new(ClientRegistry::new(
            0,
            expiration,
            ping_interval,
            loopback_socket().await,
        ))
    }

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    #[tokio::test(start_paused = true)]
    async fn test_upsert_twice_keeps_single_entry_with_later_timestamp() {
        let registry = registry(Duration::from_secs(4), Duration::from_secs(1)).await;

        registry.upsert(addr(5000)).await;
        let first = registry.last_seen(&addr(5000)).await.unwrap();

        tokio::time::advance(Duration::from_millis(10)).await;
        registry.upsert(addr(5000)).await;
        let second = registry.last_seen(&addr(5000)).await.unwrap();

        assert_eq!(registry.client_count().await, 1);
        assert!(second > first);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_removes_only_expired_clients() {
        let registry = registry(Duration::from_secs(4), Duration::from_secs(1)).await;

        registry.upsert(addr(5000)).await;
        tokio::time::advance(Duration::from_secs(3)).await;
        registry.upsert(addr(5001)).await;

        let expired = registry
            .sweep_expired_at(Instant::now() + Duration::from_millis(1500))
            .await;

        assert_eq!(expired, vec![addr(5000)]);
        assert_eq!(registry.client_count().await, 1);
        assert!(registry.last_seen(&addr(5001)).await.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_at_exact_expiration_keeps_client() {
        let registry = registry(Duration::from_secs(4), Duration::from_secs(1)).await;

        registry.upsert(addr(5000)).await;
        let seen = registry.last_seen(&addr(5000)).await.unwrap();

        let expired = registry.sweep_expired_at(seen + Duration::from_secs(4)).await;
        assert!(expired.is_empty());

        let expired = registry
            .sweep_expired_at(seen + Duration::from_secs(4) + Duration::from_millis(1))
            .await;
        assert_eq!(expired, vec![addr(5000)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refreshed_client_is_never_evicted() {
        let registry = registry(Duration::from_secs(4), Duration::from_secs(1)).await;

        for _ in 0..10 {
            registry.upsert(addr(5000)).await;
            tokio::time::advance(Duration::from_secs(3)).await;
            assert!(registry.sweep_expired().await.is_empty());
        }

        assert_eq!(registry.client_count().await, 1);
    }

    #[tokio::test]
    async fn test_ping_all_sends_one_ping_per_client() {
        let registry = registry(Duration::from_secs(4), Duration::from_secs(1)).await;

        let mut clients = Vec::new();
        for _ in 0..3 {
            let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
            registry.upsert(client.local_addr().unwrap()).await;
            // a duplicate registration must not produce a second ping
            registry.upsert(client.local_addr().unwrap()).await;
            clients.push(client);
        }

        assert_eq!(registry.ping_all().await, 3);

        for client in &clients {
            let mut buf = [0u8; 16];
            let (n, _) = timeout(Duration::from_secs(2), client.recv_from(&mut buf))
                .await
                .unwrap()
                .unwrap();
            assert_eq!(&buf[..n], &PING_PAYLOAD);

            let extra = timeout(Duration::from_millis(100), client.recv_from(&mut buf)).await;
            assert!(extra.is_err(), "received a duplicate ping");
        }
    }

    #[tokio::test]
    async fn test_ping_all_on_empty_registry_is_noop() {
        let registry = registry(Duration::from_secs(4), Duration::from_secs(1)).await;
        assert_eq!(registry.ping_all().await, 0);
    }

    #[tokio::test]
    async fn test_failed_send_does_not_stop_the_pass() {
        let registry = registry(Duration::from_secs(4), Duration::from_secs(1)).await;
        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();

        // an IPv6 destination cannot be reached from an IPv4 socket
        registry.upsert("[::1]:9".parse().unwrap()).await;
        registry.upsert(client.local_addr().unwrap()).await;

        assert_eq!(registry.ping_all().await, 1);

        let mut buf = [0u8; 2];
        let (n, _) = timeout(Duration::from_secs(2), client.recv_from(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(n, 2);
    }

    #[tokio::test]
    async fn test_run_loop_pings_then_expires_silent_client() {
        let registry = registry(Duration::from_millis(200), Duration::from_millis(20)).await;
        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        registry.upsert(client.local_addr().unwrap()).await;

        registry.start().await.unwrap();

        let mut buf = [0u8; 2];
        for _ in 0..2 {
            timeout(Duration::from_secs(2), client.recv_from(&mut buf))
                .await
                .unwrap()
                .unwrap();
        }

        let expired = timeout(Duration::from_secs(3), async {
            while registry.client_count().await > 0 {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await;
        assert!(expired.is_ok(), "client was never swept");

        registry.request_stop().await;
        registry.join().await;
    }

    #[tokio::test]
    async fn test_slow_ping_pass_does_not_starve_sweep() {
        // thousands of sends per pass take far longer than the 1ms interval
        let registry = registry(Duration::from_millis(200), Duration::from_millis(1)).await;
        for port in 20000..25000 {
            registry.upsert(addr(port)).await;
        }

        registry.start().await.unwrap();

        let drained = timeout(Duration::from_secs(10), async {
            while registry.client_count().await > 0 {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await;
        assert!(drained.is_ok(), "sweep never ran while pings kept the loop busy");

        registry.request_stop().await;
        registry.join().await;
    }

    #[tokio::test]
    async fn test_lifecycle_transitions() {
        let registry = registry(Duration::from_secs(4), Duration::from_millis(50)).await;
        assert_eq!(registry.state().await, RegistryState::Created);

        registry.start().await.unwrap();
        assert_eq!(registry.state().await, RegistryState::Running);
        assert!(matches!(
            registry.start().await,
            Err(RegistryError::AlreadyStarted(0))
        ));

        registry.request_stop().await;
        assert_eq!(registry.state().await, RegistryState::Stopping);

        timeout(Duration::from_secs(2), registry.join())
            .await
            .expect("loop did not stop in time");
        assert_eq!(registry.state().await, RegistryState::Stopped);

        assert!(matches!(
            registry.start().await,
            Err(RegistryError::Stopped(0))
        ));
    }

    #[tokio::test]
    async fn test_stop_before_start_goes_straight_to_stopped() {
        let registry = registry(Duration::from_secs(4), Duration::from_secs(1)).await;

        registry.request_stop().await;
        registry.join().await;

        assert!(registry.state().await.is_stopped());
    }
}
