//! Runtime health state and the snapshot served over HTTP.
//!
//! Components push their view into [`HealthState`] as they work; the HTTP
//! handler renders a point-in-time snapshot with per-component detail and a
//! rolled-up status.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;

/// Rolled-up service status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Healthy,
    Degraded,
    Unhealthy,
}

impl Status {
    fn worst(self, other: Self) -> Self {
        use Status::{Degraded, Healthy, Unhealthy};
        match (self, other) {
            (Unhealthy, _) | (_, Unhealthy) => Unhealthy,
            (Degraded, _) | (_, Degraded) => Degraded,
            (Healthy, Healthy) => Healthy,
        }
    }
}

/// Shared mutable health state.
#[derive(Default)]
pub struct HealthState {
    ws_connected: AtomicUsize,
    ws_total: AtomicUsize,
    store_connected: AtomicBool,
    store_ping_us: AtomicU64,
    registry_markets: AtomicUsize,
    /// Per-(gatherer, table) sync lag in microseconds.
    sync_lag_us: DashMap<(String, String), i64>,
    has_websocket: AtomicBool,
    has_sync: AtomicBool,
}

impl HealthState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_ws(&self, connected: usize, total: usize) {
        self.has_websocket.store(true, Ordering::Relaxed);
        self.ws_connected.store(connected, Ordering::Relaxed);
        self.ws_total.store(total, Ordering::Relaxed);
    }

    pub fn set_store(&self, connected: bool, ping_ms: f64) {
        self.store_connected.store(connected, Ordering::Relaxed);
        self.store_ping_us
            .store((ping_ms * 1_000.0) as u64, Ordering::Relaxed);
    }

    pub fn set_registry_markets(&self, count: usize) {
        self.registry_markets.store(count, Ordering::Relaxed);
    }

    pub fn set_sync_lag(&self, gatherer: &str, table: &str, lag_us: i64) {
        self.has_sync.store(true, Ordering::Relaxed);
        self.sync_lag_us
            .insert((gatherer.to_string(), table.to_string()), lag_us);
    }

    /// Render a point-in-time snapshot.
    pub fn snapshot(&self) -> HealthSnapshot {
        let ws_connected = self.ws_connected.load(Ordering::Relaxed);
        let ws_total = self.ws_total.load(Ordering::Relaxed);
        let store_connected = self.store_connected.load(Ordering::Relaxed);
        let ping_ms = self.store_ping_us.load(Ordering::Relaxed) as f64 / 1_000.0;
        let markets = self.registry_markets.load(Ordering::Relaxed);

        let mut status = Status::Healthy;

        let websocket = if self.has_websocket.load(Ordering::Relaxed) {
            let ws_status = ws_status(ws_connected, ws_total);
            status = status.worst(ws_status);
            Some(WebsocketHealth {
                connections: ws_total,
                healthy: ws_connected,
            })
        } else {
            None
        };

        let store_status = if !store_connected {
            Status::Unhealthy
        } else if ping_ms < 100.0 {
            Status::Healthy
        } else {
            Status::Degraded
        };
        status = status.worst(store_status);

        let sync = if self.has_sync.load(Ordering::Relaxed) {
            let max_lag_us = self
                .sync_lag_us
                .iter()
                .map(|entry| *entry.value())
                .max()
                .unwrap_or(0);
            let max_lag_seconds = max_lag_us as f64 / 1_000_000.0;
            status = status.worst(lag_status(max_lag_seconds));
            Some(SyncHealth {
                max_lag_seconds,
                tables_syncing: self.sync_lag_us.len(),
            })
        } else {
            None
        };

        HealthSnapshot {
            status,
            components: Components {
                websocket,
                store: StoreHealth {
                    connected: store_connected,
                    ping_ms,
                },
                registry: RegistryHealth { markets },
                sync,
            },
        }
    }
}

/// Connection-count thresholds, scaled from the 150-connection defaults:
/// healthy within 10 of the full pool, degraded down to two thirds.
fn ws_status(connected: usize, total: usize) -> Status {
    if total == 0 {
        return Status::Unhealthy;
    }
    if connected + 10 >= total {
        Status::Healthy
    } else if connected * 3 >= total * 2 {
        Status::Degraded
    } else {
        Status::Unhealthy
    }
}

fn lag_status(lag_seconds: f64) -> Status {
    if lag_seconds < 5.0 {
        Status::Healthy
    } else if lag_seconds <= 30.0 {
        Status::Degraded
    } else {
        Status::Unhealthy
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthSnapshot {
    pub status: Status,
    pub components: Components,
}

#[derive(Debug, Clone, Serialize)]
pub struct Components {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub websocket: Option<WebsocketHealth>,
    pub store: StoreHealth,
    pub registry: RegistryHealth,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sync: Option<SyncHealth>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WebsocketHealth {
    pub connections: usize,
    pub healthy: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct StoreHealth {
    pub connected: bool,
    pub ping_ms: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegistryHealth {
    pub markets: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncHealth {
    pub max_lag_seconds: f64,
    pub tables_syncing: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ws_thresholds_match_defaults() {
        assert_eq!(ws_status(150, 150), Status::Healthy);
        assert_eq!(ws_status(140, 150), Status::Healthy);
        assert_eq!(ws_status(139, 150), Status::Degraded);
        assert_eq!(ws_status(100, 150), Status::Degraded);
        assert_eq!(ws_status(99, 150), Status::Unhealthy);
    }

    #[test]
    fn lag_thresholds() {
        assert_eq!(lag_status(1.0), Status::Healthy);
        assert_eq!(lag_status(10.0), Status::Degraded);
        assert_eq!(lag_status(31.0), Status::Unhealthy);
    }

    #[test]
    fn snapshot_rolls_up_worst_component() {
        let state = HealthState::new();
        state.set_ws(150, 150);
        state.set_store(true, 5.0);
        state.set_registry_markets(1_000);
        assert_eq!(state.snapshot().status, Status::Healthy);

        state.set_sync_lag("gatherer-a", "trades", 12_000_000);
        assert_eq!(state.snapshot().status, Status::Degraded);

        state.set_sync_lag("gatherer-b", "trades", 45_000_000);
        let snapshot = state.snapshot();
        assert_eq!(snapshot.status, Status::Unhealthy);
        let sync = snapshot.components.sync.expect("sync component present");
        assert_eq!(sync.tables_syncing, 2);
        assert!(sync.max_lag_seconds > 40.0);
    }

    #[test]
    fn store_disconnect_is_unhealthy() {
        let state = HealthState::new();
        state.set_store(false, 0.0);
        assert_eq!(state.snapshot().status, Status::Unhealthy);
    }
}
