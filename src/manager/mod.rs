//! Fixed-pool WebSocket connection manager.
//!
//! Owns exactly `max_connections` connections partitioned by role, places
//! orderbook subscriptions by min-load, tracks per-subscription sequences,
//! and redistributes a failed connection's markets across the survivors.

mod connection;
mod placement;
mod role;
mod sequence;
mod waiters;

pub use connection::RawFrame;
pub use role::ConnectionRole;
pub use sequence::{SeqObservation, SequenceTracker};
pub use waiters::CommandReply;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::ConnectionManagerConfig;
use crate::domain::Ticker;
use crate::error::Result;
use crate::exchange::SignedDialer;
use crate::monitor::{HealthState, Metrics};
use crate::registry::{ChangeKind, MarketChange};
use self::connection::{run_connection, ConnEvent, Connection};
use self::placement::PlacementMap;

/// One unit of subscribe work for the worker pool.
#[derive(Debug, Clone)]
struct SubscribeJob {
    tickers: Vec<Ticker>,
    /// Set when the job re-places markets from a failed connection.
    redistributed: bool,
}

pub struct ConnectionManager {
    config: Arc<ConnectionManagerConfig>,
    dialer: SignedDialer,
    connections: Vec<Arc<Connection>>,
    placement: PlacementMap,
    seq: Arc<SequenceTracker>,
    raw_tx: mpsc::Sender<RawFrame>,
    subscribe_tx: mpsc::Sender<SubscribeJob>,
    subscribe_rx: Mutex<Option<mpsc::Receiver<SubscribeJob>>>,
    events_tx: mpsc::UnboundedSender<ConnEvent>,
    events_rx: Mutex<Option<mpsc::UnboundedReceiver<ConnEvent>>>,
    metrics: Arc<Metrics>,
    health: Arc<HealthState>,
}

impl ConnectionManager {
    /// Build the manager; the returned receiver is the central raw-frame
    /// queue the router consumes.
    pub fn new(
        config: ConnectionManagerConfig,
        dialer: SignedDialer,
        metrics: Arc<Metrics>,
        health: Arc<HealthState>,
    ) -> (Arc<Self>, mpsc::Receiver<RawFrame>) {
        let (raw_tx, raw_rx) = mpsc::channel(config.message_buffer_size);
        let (subscribe_tx, subscribe_rx) = mpsc::channel(config.subscribe_queue_size);
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let connections = (0..config.max_connections as u64)
            .map(|id| Connection::new(id, ConnectionRole::for_slot(id as usize)))
            .collect();

        let manager = Arc::new(Self {
            config: Arc::new(config),
            dialer,
            connections,
            placement: PlacementMap::default(),
            seq: Arc::new(SequenceTracker::new()),
            raw_tx,
            subscribe_tx,
            subscribe_rx: Mutex::new(Some(subscribe_rx)),
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
            metrics,
            health,
        });

        (manager, raw_rx)
    }

    /// Shared sequence tracker; the router flags gaps through it.
    pub fn sequence_tracker(&self) -> Arc<SequenceTracker> {
        Arc::clone(&self.seq)
    }

    /// Spawn the connection tasks, the event loop, the subscribe workers,
    /// and the change-stream consumer. `initial` is the active-market set
    /// from the registry's startup sweep.
    pub async fn start(
        self: Arc<Self>,
        changes: mpsc::Receiver<MarketChange>,
        initial: Vec<Ticker>,
        shutdown: watch::Receiver<bool>,
    ) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::new();

        for conn in &self.connections {
            handles.push(tokio::spawn(run_connection(
                Arc::clone(conn),
                self.dialer.clone(),
                Arc::clone(&self.config),
                self.raw_tx.clone(),
                self.events_tx.clone(),
                Arc::clone(&self.metrics),
                shutdown.clone(),
            )));
        }

        let events_rx = self
            .events_rx
            .lock()
            .await
            .take()
            .expect("manager started twice");
        handles.push(tokio::spawn(
            Arc::clone(&self).event_loop(events_rx, shutdown.clone()),
        ));

        let subscribe_rx = Arc::new(Mutex::new(
            self.subscribe_rx
                .lock()
                .await
                .take()
                .expect("manager started twice"),
        ));
        for worker in 0..self.config.worker_count {
            handles.push(tokio::spawn(Arc::clone(&self).subscribe_worker(
                worker,
                Arc::clone(&subscribe_rx),
                shutdown.clone(),
            )));
        }

        handles.push(tokio::spawn(
            Arc::clone(&self).change_consumer(changes, shutdown.clone()),
        ));

        self.enqueue_initial(initial).await;

        handles
    }

    /// Batch the startup sweep into multi-ticker subscribe jobs.
    async fn enqueue_initial(&self, tickers: Vec<Ticker>) {
        let batch_size = self.config.subscribe_batch_size;
        let total = tickers.len();
        for chunk in tickers.chunks(batch_size) {
            let job = SubscribeJob {
                tickers: chunk.to_vec(),
                redistributed: false,
            };
            if self.subscribe_tx.send(job).await.is_err() {
                warn!("Subscribe queue closed during startup enqueue");
                return;
            }
        }
        info!(markets = total, batch_size, "Initial subscriptions queued");
    }

    fn orderbook_candidates(&self) -> impl Iterator<Item = u64> + '_ {
        self.connections
            .iter()
            .filter(|c| c.role == ConnectionRole::Orderbook && c.is_connected())
            .map(|c| c.id)
    }

    fn connection(&self, id: u64) -> &Arc<Connection> {
        &self.connections[id as usize]
    }

    fn subscribe_timeout(&self) -> Duration {
        Duration::from_secs(self.config.subscribe_timeout_secs)
    }

    /// Handle connection state transitions: global re-subscribe on the way
    /// up, redistribution and sequence purge on the way down.
    async fn event_loop(
        self: Arc<Self>,
        mut events: mpsc::UnboundedReceiver<ConnEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        loop {
            let event = tokio::select! {
                event = events.recv() => event,
                _ = shutdown.wait_for(|stop| *stop) => break,
            };
            let Some(event) = event else { break };

            match event {
                ConnEvent::Up(id) => {
                    let conn = Arc::clone(self.connection(id));
                    if conn.role.is_global() {
                        // Orderbook connections come up empty and receive
                        // future placements; global roles re-subscribe. Done
                        // off the event loop so a slow command can't stall
                        // redistribution.
                        let timeout = self.subscribe_timeout();
                        let metrics = Arc::clone(&self.metrics);
                        tokio::spawn(async move {
                            let channel = conn.role.channel();
                            match conn.subscribe(channel, None, timeout).await {
                                Ok(sid) => {
                                    debug!(connection_id = id, sid, channel, "Global channel subscribed");
                                }
                                Err(e) => {
                                    metrics.subscribe_failures_total.inc();
                                    warn!(connection_id = id, error = %e, "Global subscribe failed");
                                }
                            }
                        });
                    }
                    self.publish_health();
                }
                ConnEvent::Down(id) => {
                    self.seq.purge_connection(id);
                    let orphans = self.placement.remove_connection(id);
                    self.metrics
                        .subscriptions_active
                        .set(self.placement.market_count() as i64);
                    if !orphans.is_empty() {
                        info!(
                            connection_id = id,
                            markets = orphans.len(),
                            "Redistributing markets from failed connection"
                        );
                        // Per-ticker jobs so each pick sees current loads.
                        for ticker in orphans {
                            let job = SubscribeJob {
                                tickers: vec![ticker],
                                redistributed: true,
                            };
                            if self.subscribe_tx.try_send(job).is_err() {
                                self.metrics.markets_unplaced_total.inc();
                                warn!("Subscribe queue full during redistribution");
                            }
                        }
                    }
                    self.publish_health();
                }
            }
        }

        debug!("Manager event loop stopped");
    }

    fn publish_health(&self) {
        let connected = self.connections.iter().filter(|c| c.is_connected()).count();
        self.health.set_ws(connected, self.connections.len());
    }

    /// Pull subscribe jobs and execute them against the least-loaded healthy
    /// orderbook connection.
    async fn subscribe_worker(
        self: Arc<Self>,
        worker: usize,
        jobs: Arc<Mutex<mpsc::Receiver<SubscribeJob>>>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        loop {
            let job = {
                let mut rx = jobs.lock().await;
                tokio::select! {
                    job = rx.recv() => job,
                    _ = shutdown.wait_for(|stop| *stop) => break,
                }
            };
            let Some(job) = job else { break };

            if let Err(e) = self.execute_subscribe(&job).await {
                self.metrics.subscribe_failures_total.inc();
                self.metrics
                    .markets_unplaced_total
                    .inc_by(job.tickers.len() as u64);
                warn!(
                    worker,
                    markets = job.tickers.len(),
                    error = %e,
                    "Subscribe failed, markets unplaced"
                );
            }
        }

        debug!(worker, "Subscribe worker stopped");
    }

    async fn execute_subscribe(&self, job: &SubscribeJob) -> Result<()> {
        // Skip markets that already have a live placement (e.g. a change
        // event raced the startup sweep).
        let tickers: Vec<Ticker> = job
            .tickers
            .iter()
            .filter(|t| !self.placement.is_placed(t))
            .cloned()
            .collect();
        if tickers.is_empty() {
            return Ok(());
        }

        let Some(conn_id) = self.placement.pick_min_load(self.orderbook_candidates()) else {
            return Err(crate::error::Error::NoCapacity);
        };
        let conn = self.connection(conn_id);

        self.placement.reserve(conn_id, &tickers);

        let names: Vec<String> = tickers.iter().map(|t| t.to_string()).collect();
        match conn
            .subscribe(
                ConnectionRole::Orderbook.channel(),
                Some(names),
                self.subscribe_timeout(),
            )
            .await
        {
            Ok(sid) => {
                self.placement.commit(
                    conn_id,
                    sid,
                    ConnectionRole::Orderbook.channel(),
                    tickers.clone(),
                );
                self.metrics
                    .subscriptions_active
                    .set(self.placement.market_count() as i64);
                if job.redistributed {
                    self.metrics
                        .market_redistribution_total
                        .inc_by(tickers.len() as u64);
                }
                debug!(
                    connection_id = conn_id,
                    sid,
                    markets = tickers.len(),
                    "Subscribed"
                );
                Ok(())
            }
            Err(e) => {
                self.placement.rollback(conn_id, &tickers);
                Err(e)
            }
        }
    }

    /// Drive subscriptions from the registry's change stream.
    async fn change_consumer(
        self: Arc<Self>,
        mut changes: mpsc::Receiver<MarketChange>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        loop {
            let change = tokio::select! {
                change = changes.recv() => change,
                _ = shutdown.wait_for(|stop| *stop) => break,
            };
            let Some(change) = change else { break };

            match &change.kind {
                ChangeKind::Created => {
                    let job = SubscribeJob {
                        tickers: vec![change.ticker.clone()],
                        redistributed: false,
                    };
                    if self.subscribe_tx.try_send(job).is_err() {
                        warn!(ticker = %change.ticker, "Subscribe queue full, market not placed");
                        self.metrics.markets_unplaced_total.inc();
                    }
                }
                ChangeKind::StatusChange { new, .. } if !new.is_active() => {
                    self.drop_market(&change.ticker).await;
                }
                ChangeKind::Settled => {
                    self.drop_market(&change.ticker).await;
                }
                ChangeKind::StatusChange { .. } => {
                    // Became active again; place it if it isn't.
                    if !self.placement.is_placed(&change.ticker) {
                        let job = SubscribeJob {
                            tickers: vec![change.ticker.clone()],
                            redistributed: false,
                        };
                        let _ = self.subscribe_tx.try_send(job);
                    }
                }
            }
        }

        debug!("Change consumer stopped");
    }

    /// Remove a market that left active state, unsubscribing when its SID
    /// covered only this market. Batch SIDs stay live; the extra frames are
    /// dropped by the store's conflict-ignore once the market settles.
    async fn drop_market(&self, ticker: &Ticker) {
        let Some((placement, sole)) = self.placement.remove_market(ticker) else {
            return;
        };
        self.metrics
            .subscriptions_active
            .set(self.placement.market_count() as i64);

        if let (Some(sid), true) = (placement.sid, sole) {
            let conn = self.connection(placement.connection_id);
            if conn.is_connected() {
                if let Err(e) = conn.unsubscribe(vec![sid], self.subscribe_timeout()).await {
                    debug!(ticker = %ticker, error = %e, "Unsubscribe failed");
                }
            }
        }
    }
}
