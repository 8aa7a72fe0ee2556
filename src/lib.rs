//! Driftnet - Redundant capture pipeline for prediction-market exchange data.
//!
//! # Architecture
//!
//! ```text
//! src/
//! ├── domain/           # Prices, timestamps, markets, time-series records
//! ├── exchange/         # Signed REST client + WebSocket transport
//! ├── registry/         # In-memory market registry + reconciliation
//! ├── manager/          # Fixed-pool WebSocket connection manager
//! ├── router/           # Raw-frame demultiplexer
//! ├── writer/           # Batched time-series writers
//! ├── poller/           # Periodic REST orderbook snapshots
//! ├── store/            # SQLite persistence (local + central)
//! ├── sync/             # Deduplicator cursor-sync + metadata-sync
//! ├── monitor/          # Metrics, health state, HTTP endpoints
//! └── app/              # Gatherer / deduplicator orchestration
//! ```
//!
//! Two node kinds share this crate: a **gatherer** ingests the full market
//! universe over WebSocket into a local store, and the **deduplicator**
//! merges the gatherers' stores into a central one, deduplicating on
//! exchange-assigned keys.

pub mod app;
pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod exchange;
pub mod manager;
pub mod monitor;
pub mod poller;
pub mod registry;
pub mod router;
pub mod store;
pub mod sync;
pub mod writer;
