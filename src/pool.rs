//! Priority connection pool
//!
//! A bounded set of [`NntpClient`]s multiplexed over many concurrent
//! callers. Waiters are served strictly by (priority desc, arrival asc);
//! idle connections are kept alive with periodic DATE probes; a pool with
//! nothing to do closes its sockets and sleeps until the next caller wakes
//! it; a command that fails at the connection level is retried exactly once
//! on another connection.
//!
//! Lease release and waiter dispatch run synchronously on the drop path,
//! so a cancelled caller can never lose a connection.

use crate::client::NntpClient;
use crate::config::PoolConfig;
use crate::error::{NntpError, Result};
use crate::response::{ArticleResponse, GroupInfo, ListGroupInfo, Stat};
use crate::yenc::{YencFetch, YencHeaders};
use std::cmp::Reverse;
use std::collections::{BTreeMap, VecDeque};
use std::future::Future;
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

/// Waiter ordering key: higher priority first, FIFO within a priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct WaiterKey {
    priority: Reverse<i32>,
    seq: u64,
}

impl WaiterKey {
    fn new(priority: i32, seq: u64) -> Self {
        Self {
            priority: Reverse(priority),
            seq,
        }
    }
}

struct PoolState {
    idle: VecDeque<NntpClient>,
    waiters: BTreeMap<WaiterKey, oneshot::Sender<NntpClient>>,
    waiter_seq: u64,
    leased: usize,
    closed: bool,
    keepalive: Option<JoinHandle<()>>,
}

struct PoolShared {
    config: PoolConfig,
    state: Mutex<PoolState>,
    sleeping: AtomicBool,
    last_activity_ms: AtomicI64,
    started: Instant,
}

impl PoolShared {
    fn now_ms(&self) -> i64 {
        self.started.elapsed().as_millis() as i64
    }

    fn touch(&self) {
        self.last_activity_ms.store(self.now_ms(), Ordering::Release);
    }

    /// Hand a connection to the best live waiter, or park it
    ///
    /// Waiters cancelled after enqueueing are discarded as they are
    /// encountered.
    fn dispatch_locked(state: &mut PoolState, mut client: NntpClient) {
        loop {
            match state.waiters.pop_first() {
                Some((key, tx)) => match tx.send(client) {
                    Ok(()) => {
                        trace!(
                            "dispatched connection to waiter (priority {}, seq {})",
                            key.priority.0,
                            key.seq
                        );
                        state.leased += 1;
                        return;
                    }
                    Err(reclaimed) => client = reclaimed,
                },
                None => {
                    state.idle.push_back(client);
                    return;
                }
            }
        }
    }

    /// Return a leased connection to the pool (synchronous; runs on drop
    /// paths)
    fn return_client(self: &Arc<Self>, client: NntpClient) {
        let mut state = self.state.lock().unwrap();
        state.leased -= 1;
        if state.closed {
            drop(state);
            client.shutdown();
            return;
        }
        Self::dispatch_locked(&mut state, client);
    }
}

/// An exclusive lease of a pooled client
///
/// Dropping the lease returns the connection to the pool; the return is
/// synchronous and therefore survives cancellation at any await point.
pub struct PooledClient {
    shared: Arc<PoolShared>,
    client: Option<NntpClient>,
}

impl std::fmt::Debug for PooledClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledClient").finish_non_exhaustive()
    }
}

impl PooledClient {
    /// A clone of the leased client, sharing its connection
    pub fn client(&self) -> NntpClient {
        self.client.as_ref().unwrap().clone()
    }
}

impl Deref for PooledClient {
    type Target = NntpClient;

    fn deref(&self) -> &NntpClient {
        self.client.as_ref().unwrap()
    }
}

impl Drop for PooledClient {
    fn drop(&mut self) {
        if let Some(client) = self.client.take() {
            self.shared.return_client(client);
        }
    }
}

/// Pending acquisition; removes its waiter on cancellation
struct Waiting {
    shared: Arc<PoolShared>,
    key: WaiterKey,
    rx: oneshot::Receiver<NntpClient>,
    done: bool,
}

impl Waiting {
    async fn wait(mut self) -> Result<PooledClient> {
        let received = (&mut self.rx).await;
        self.done = true;
        match received {
            Ok(client) => Ok(PooledClient {
                shared: Arc::clone(&self.shared),
                client: Some(client),
            }),
            Err(_) => Err(NntpError::PoolClosed),
        }
    }
}

impl Drop for Waiting {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        {
            let mut state = self.shared.state.lock().unwrap();
            state.waiters.remove(&self.key);
        }
        // A connection may have been assigned in the race between
        // cancellation and removal; it must not be lost.
        if let Ok(client) = self.rx.try_recv() {
            self.shared.return_client(client);
        }
    }
}

/// Priority NNTP connection pool
///
/// Cloning is cheap and clones share the pool.
///
/// # Example
///
/// ```no_run
/// use nntp_stream::{NntpPool, PoolConfig, ServerConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let server = ServerConfig::tls("news.example.com").with_credentials("user", "pass");
/// let pool = NntpPool::connect(PoolConfig::new(server, 8)).await?;
///
/// // Interactive lookups outrank bulk downloads.
/// let stat = pool.stat("<part1@example.com>", 10).await?;
/// println!("found: {}", stat.is_found());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct NntpPool {
    shared: Arc<PoolShared>,
}

impl NntpPool {
    /// Build all connections concurrently and start the keepalive loop
    pub async fn connect(config: PoolConfig) -> Result<Self> {
        config.validate()?;
        debug!(
            "connecting pool to {}:{} ({} connections)",
            config.server.host, config.server.port, config.max_connections
        );

        let clients = build_clients(&config).await?;
        let shared = Arc::new(PoolShared {
            config,
            state: Mutex::new(PoolState {
                idle: clients.into(),
                waiters: BTreeMap::new(),
                waiter_seq: 0,
                leased: 0,
                closed: false,
                keepalive: None,
            }),
            sleeping: AtomicBool::new(false),
            last_activity_ms: AtomicI64::new(0),
            started: Instant::now(),
        });
        shared.touch();
        start_keepalive(&shared);

        Ok(Self { shared })
    }

    /// Lease a connection at the given priority
    ///
    /// Wakes the pool when it is sleeping. Higher priority is served
    /// first; equal priorities are FIFO. Dropping the returned future
    /// before completion withdraws the request without losing any
    /// racily-assigned connection.
    pub async fn get(&self, priority: i32) -> Result<PooledClient> {
        self.shared.touch();
        if self.shared.sleeping.load(Ordering::Acquire) {
            self.wake().await?;
        }
        self.acquire(priority).await
    }

    /// Lease a connection, run `op` on it, and retry exactly once on a
    /// connection-level failure
    ///
    /// The retry schedules a reconnect on the failed connection, returns
    /// it, leases again at the same priority (possibly a different
    /// connection), waits for that connection's reconnect if one is
    /// pending, and reruns `op`. A second connection failure and every
    /// non-connection error propagate unchanged.
    pub async fn with_client<T, F, Fut>(&self, priority: i32, op: F) -> Result<T>
    where
        F: Fn(NntpClient) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let lease = self.get(priority).await?;
        match op(lease.client()).await {
            Err(e) if e.is_connection_error() => {
                warn!("command failed on pooled connection, retrying: {}", e);
                lease.connection().schedule_reconnect().await;
                drop(lease);

                let retry = self.acquire(priority).await?;
                retry.connection().ensure_connected().await?;
                op(retry.client()).await
            }
            result => result,
        }
    }

    /// Close idle connections and stop probing until the next wake
    ///
    /// Idempotent. Leased connections are untouched; they are parked on
    /// return and drained by the next wake.
    pub async fn sleep(&self) {
        do_sleep(&self.shared);
    }

    /// Rebuild the pool's connections after a sleep
    ///
    /// Idempotent; a wake of an already-awake pool does nothing. All
    /// connections are rebuilt concurrently and the keepalive loop is
    /// restarted.
    pub async fn wake(&self) -> Result<()> {
        let stale: Vec<NntpClient> = {
            let mut state = self.shared.state.lock().unwrap();
            if !self.shared.sleeping.swap(false, Ordering::AcqRel) {
                return Ok(());
            }
            state.idle.drain(..).collect()
        };
        debug!("waking pool");
        for client in stale {
            client.shutdown();
        }

        let clients = match build_clients(&self.shared.config).await {
            Ok(clients) => clients,
            Err(e) => {
                // Stay asleep so the next caller retries the wake.
                self.shared.sleeping.store(true, Ordering::Release);
                return Err(e);
            }
        };

        {
            let mut state = self.shared.state.lock().unwrap();
            for client in clients {
                PoolShared::dispatch_locked(&mut state, client);
            }
        }
        self.shared.touch();
        start_keepalive(&self.shared);
        Ok(())
    }

    /// Shut the pool down
    ///
    /// Queued waiters fail with [`NntpError::PoolClosed`]; idle
    /// connections close now, leased ones when returned.
    pub async fn close(&self) {
        let (waiters, idle, keepalive) = {
            let mut state = self.shared.state.lock().unwrap();
            if state.closed {
                return;
            }
            state.closed = true;
            let waiters = std::mem::take(&mut state.waiters);
            let idle: Vec<NntpClient> = state.idle.drain(..).collect();
            (waiters, idle, state.keepalive.take())
        };

        if let Some(handle) = keepalive {
            handle.abort();
        }
        // Dropping the senders fails every queued waiter.
        drop(waiters);
        for client in idle {
            client.close().await;
        }
        debug!("pool closed");
    }

    /// Number of idle connections
    pub fn idle_connections(&self) -> usize {
        self.shared.state.lock().unwrap().idle.len()
    }

    /// Number of connections currently leased out
    pub fn leased_connections(&self) -> usize {
        self.shared.state.lock().unwrap().leased
    }

    /// Number of callers waiting for a connection
    pub fn waiting_requests(&self) -> usize {
        self.shared.state.lock().unwrap().waiters.len()
    }

    /// Whether the pool is sleeping
    pub fn is_sleeping(&self) -> bool {
        self.shared.sleeping.load(Ordering::Acquire)
    }

    async fn acquire(&self, priority: i32) -> Result<PooledClient> {
        let waiting = {
            let mut state = self.shared.state.lock().unwrap();
            if state.closed {
                return Err(NntpError::PoolClosed);
            }
            if let Some(client) = state.idle.pop_front() {
                state.leased += 1;
                return Ok(PooledClient {
                    shared: Arc::clone(&self.shared),
                    client: Some(client),
                });
            }
            let (tx, rx) = oneshot::channel();
            let key = WaiterKey::new(priority, state.waiter_seq);
            state.waiter_seq += 1;
            state.waiters.insert(key, tx);
            Waiting {
                shared: Arc::clone(&self.shared),
                key,
                rx,
                done: false,
            }
        };
        waiting.wait().await
    }
}

// Typed delegates over with_client.
impl NntpPool {
    /// Select a newsgroup on a pooled connection
    pub async fn group(&self, newsgroup: &str, priority: i32) -> Result<GroupInfo> {
        self.with_client(priority, |client| async move { client.group(newsgroup).await })
            .await
    }

    /// Select a newsgroup and list its article numbers
    pub async fn listgroup(
        &self,
        newsgroup: &str,
        range: Option<&str>,
        priority: i32,
    ) -> Result<ListGroupInfo> {
        self.with_client(priority, |client| async move {
            client.listgroup(newsgroup, range).await
        })
        .await
    }

    /// Check article status
    pub async fn stat(&self, id: &str, priority: i32) -> Result<Stat> {
        self.with_client(priority, |client| async move { client.stat(Some(id)).await })
            .await
    }

    /// Fetch a full article
    pub async fn article(&self, id: &str, priority: i32) -> Result<ArticleResponse> {
        self.with_client(priority, |client| async move { client.article(id).await })
            .await
    }

    /// Fetch article headers
    pub async fn head(&self, id: &str, priority: i32) -> Result<ArticleResponse> {
        self.with_client(priority, |client| async move { client.head(id).await })
            .await
    }

    /// Fetch an article body as text lines
    pub async fn body(&self, id: &str, priority: i32) -> Result<ArticleResponse> {
        self.with_client(priority, |client| async move { client.body(id).await })
            .await
    }

    /// The server's current date and time
    pub async fn date(&self, priority: i32) -> Result<String> {
        self.with_client(priority, |client| async move { client.date().await })
            .await
    }

    /// Fetch only the yEnc declaration of an article body
    pub async fn body_yenc_headers(&self, id: &str, priority: i32) -> Result<YencHeaders> {
        self.with_client(priority, |client| async move {
            client.body_yenc_headers(id).await
        })
        .await
    }

    /// Fetch an article body as a streaming yEnc decode
    ///
    /// The lease travels inside the returned [`YencFetch`], so the
    /// connection goes back to the pool when the fetch (and its stream)
    /// is dropped, not when this call returns.
    pub async fn body_yenc(&self, id: &str, priority: i32) -> Result<YencFetch> {
        let lease = self.get(priority).await?;
        match lease.client().body_yenc(id).await {
            Ok(mut fetch) => {
                fetch.attach_lease(lease);
                Ok(fetch)
            }
            Err(e) if e.is_connection_error() => {
                warn!("yEnc fetch failed on pooled connection, retrying: {}", e);
                lease.connection().schedule_reconnect().await;
                drop(lease);

                let retry = self.acquire(priority).await?;
                retry.connection().ensure_connected().await?;
                let mut fetch = retry.client().body_yenc(id).await?;
                fetch.attach_lease(retry);
                Ok(fetch)
            }
            Err(e) => Err(e),
        }
    }
}

async fn build_clients(config: &PoolConfig) -> Result<Vec<NntpClient>> {
    let mut tasks = Vec::with_capacity(config.max_connections as usize);
    for _ in 0..config.max_connections {
        let server = config.server.clone();
        tasks.push(tokio::spawn(
            async move { NntpClient::connect(server).await },
        ));
    }

    let mut clients = Vec::with_capacity(tasks.len());
    for task in tasks {
        let client = task
            .await
            .map_err(|e| NntpError::Io(std::io::Error::other(e.to_string())))??;
        clients.push(client);
    }
    Ok(clients)
}

fn do_sleep(shared: &Arc<PoolShared>) {
    let drained = {
        let mut state = shared.state.lock().unwrap();
        if state.closed {
            return;
        }
        if shared.sleeping.swap(true, Ordering::AcqRel) {
            return;
        }
        debug!("pool going to sleep");
        if let Some(handle) = state.keepalive.take() {
            handle.abort();
        }
        state.idle.drain(..).collect::<Vec<NntpClient>>()
    };
    for client in drained {
        client.shutdown();
    }
}

fn start_keepalive(shared: &Arc<PoolShared>) {
    let interval_ms = shared.config.keepalive_interval_ms;
    if interval_ms <= 0 {
        return;
    }
    let weak = Arc::downgrade(shared);
    let handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_millis(interval_ms as u64));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        ticker.tick().await; // first tick completes immediately
        loop {
            ticker.tick().await;
            let Some(shared) = weak.upgrade() else {
                return;
            };
            keepalive_tick(&shared).await;
        }
    });
    shared.state.lock().unwrap().keepalive = Some(handle);
}

async fn keepalive_tick(shared: &Arc<PoolShared>) {
    if shared.sleeping.load(Ordering::Acquire) {
        return;
    }

    let grace_ms = shared.config.idle_grace_period_ms;
    if grace_ms > 0 {
        let idle_ms = shared.now_ms() - shared.last_activity_ms.load(Ordering::Acquire);
        if idle_ms > grace_ms {
            debug!("pool idle for {}ms, going to sleep", idle_ms);
            do_sleep(shared);
            return;
        }
    }

    let clients: Vec<NntpClient> = {
        let mut state = shared.state.lock().unwrap();
        state.idle.drain(..).collect()
    };
    for client in clients {
        match client.date().await {
            Ok(_) => trace!("keepalive probe ok"),
            Err(e) if e.is_connection_error() => {
                warn!("keepalive probe failed, reconnecting: {}", e);
                client.connection().schedule_reconnect().await;
            }
            Err(e) => warn!("keepalive probe returned an unexpected response: {}", e),
        }

        // Probed connections always come back; keepalive never shrinks
        // the pool.
        let mut state = shared.state.lock().unwrap();
        if state.closed {
            drop(state);
            client.shutdown();
            continue;
        }
        PoolShared::dispatch_locked(&mut state, client);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_waiter_key_ordering() {
        // Higher priority sorts first; FIFO within a priority.
        let mut keys = [
            WaiterKey::new(1, 0),
            WaiterKey::new(10, 2),
            WaiterKey::new(5, 1),
            WaiterKey::new(10, 3),
        ];
        keys.sort();
        assert_eq!(keys[0], WaiterKey::new(10, 2));
        assert_eq!(keys[1], WaiterKey::new(10, 3));
        assert_eq!(keys[2], WaiterKey::new(5, 1));
        assert_eq!(keys[3], WaiterKey::new(1, 0));
    }

    #[test]
    fn test_waiter_map_pops_highest_priority_first() {
        let mut map: BTreeMap<WaiterKey, u32> = BTreeMap::new();
        map.insert(WaiterKey::new(1, 0), 1);
        map.insert(WaiterKey::new(5, 1), 5);
        map.insert(WaiterKey::new(10, 2), 10);

        let order: Vec<u32> = std::iter::from_fn(|| map.pop_first().map(|(_, v)| v)).collect();
        assert_eq!(order, vec![10, 5, 1]);
    }
}
