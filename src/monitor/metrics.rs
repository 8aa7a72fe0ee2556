//! Prometheus metric definitions.
//!
//! One `Metrics` instance is built at startup and shared by every component.
//! Naming follows `<component>_<noun>_total` for counters and `_seconds` for
//! durations; label cardinality stays bounded (channel names, writer names,
//! gatherer ids, table names).

use prometheus::{
    Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, IntGaugeVec,
    Opts, Registry,
};

use crate::error::Result;

pub struct Metrics {
    pub registry: Registry,

    // Connection manager
    pub websocket_connections: IntGauge,
    pub websocket_reconnects_total: IntCounterVec,
    pub sequence_gaps_total: IntCounter,
    pub market_redistribution_total: IntCounter,
    pub markets_unplaced_total: IntCounter,
    pub subscriptions_active: IntGauge,
    pub subscribe_failures_total: IntCounter,
    pub manager_messages_dropped_total: IntCounter,

    // Router
    pub router_messages_total: IntCounterVec,
    pub router_messages_dropped_total: IntCounterVec,
    pub router_parse_errors_total: IntCounter,
    pub router_unknown_type_total: IntCounter,

    // Market registry
    pub registry_markets: IntGauge,
    pub registry_changes_dropped_total: IntCounter,
    pub registry_lifecycle_parse_errors_total: IntCounter,
    pub registry_reconcile_changes_total: IntCounter,

    // Writers
    pub writer_received_total: IntCounterVec,
    pub writer_inserted_total: IntCounterVec,
    pub writer_conflicts_total: IntCounterVec,
    pub writer_errors_total: IntCounterVec,
    pub writer_batch_size: HistogramVec,
    pub writer_flush_duration_seconds: HistogramVec,

    // Snapshot poller
    pub snapshot_poller_fetched_total: IntCounter,
    pub snapshot_poller_fetch_errors_total: IntCounter,
    pub snapshot_poller_write_errors_total: IntCounter,
    pub snapshot_poller_markets_polled: IntGauge,
    pub snapshot_poller_poll_duration_seconds: Histogram,

    // Deduplicator sync
    pub sync_rows_read_total: IntCounterVec,
    pub sync_rows_inserted_total: IntCounterVec,
    pub sync_conflicts_total: IntCounterVec,
    pub sync_errors_total: IntCounterVec,
    pub sync_gatherer_unreachable_total: IntCounterVec,
    pub sync_lag_seconds: IntGaugeVec,
    pub metadata_upserts_total: IntCounterVec,
    pub metadata_errors_total: IntCounter,
}

impl Metrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let websocket_connections = IntGauge::new(
            "websocket_connections",
            "Currently connected WebSocket connections",
        )?;
        let websocket_reconnects_total = IntCounterVec::new(
            Opts::new("websocket_reconnects_total", "Reconnect attempts by role"),
            &["role"],
        )?;
        let sequence_gaps_total = IntCounter::new(
            "sequence_gaps_total",
            "Per-subscription sequence gaps observed",
        )?;
        let market_redistribution_total = IntCounter::new(
            "market_redistribution_total",
            "Markets moved to another connection after a failure",
        )?;
        let markets_unplaced_total = IntCounter::new(
            "markets_unplaced_total",
            "Markets that could not be re-placed after a failure",
        )?;
        let subscriptions_active =
            IntGauge::new("subscriptions_active", "Active subscriptions")?;
        let subscribe_failures_total = IntCounter::new(
            "subscribe_failures_total",
            "Subscribe commands rejected or timed out",
        )?;
        let manager_messages_dropped_total = IntCounter::new(
            "manager_messages_dropped_total",
            "Frames dropped because the central queue was full",
        )?;

        let router_messages_total = IntCounterVec::new(
            Opts::new("router_messages_total", "Frames routed by channel"),
            &["channel"],
        )?;
        let router_messages_dropped_total = IntCounterVec::new(
            Opts::new(
                "router_messages_dropped_total",
                "Frames dropped on a full typed channel",
            ),
            &["channel"],
        )?;
        let router_parse_errors_total =
            IntCounter::new("router_parse_errors_total", "Unparseable frames")?;
        let router_unknown_type_total =
            IntCounter::new("router_unknown_type_total", "Frames with unknown type")?;

        let registry_markets =
            IntGauge::new("registry_markets", "Markets tracked in memory")?;
        let registry_changes_dropped_total = IntCounter::new(
            "registry_changes_dropped_total",
            "Change events dropped on a full change stream",
        )?;
        let registry_lifecycle_parse_errors_total = IntCounter::new(
            "registry_lifecycle_parse_errors_total",
            "Lifecycle frames that failed to parse",
        )?;
        let registry_reconcile_changes_total = IntCounter::new(
            "registry_reconcile_changes_total",
            "Synthetic changes emitted by reconciliation sweeps",
        )?;

        let writer_received_total = IntCounterVec::new(
            Opts::new("writer_received_total", "Records received by writer"),
            &["writer"],
        )?;
        let writer_inserted_total = IntCounterVec::new(
            Opts::new("writer_inserted_total", "Rows inserted by writer"),
            &["writer"],
        )?;
        let writer_conflicts_total = IntCounterVec::new(
            Opts::new(
                "writer_conflicts_total",
                "Rows skipped by conflict-ignore, by writer",
            ),
            &["writer"],
        )?;
        let writer_errors_total = IntCounterVec::new(
            Opts::new("writer_errors_total", "Failed flushes by writer"),
            &["writer"],
        )?;
        let writer_batch_size = HistogramVec::new(
            HistogramOpts::new("writer_batch_size", "Rows per flushed batch").buckets(
                prometheus::exponential_buckets(1.0, 4.0, 8)?,
            ),
            &["writer"],
        )?;
        let writer_flush_duration_seconds = HistogramVec::new(
            HistogramOpts::new("writer_flush_duration_seconds", "Flush latency"),
            &["writer"],
        )?;

        let snapshot_poller_fetched_total = IntCounter::new(
            "snapshot_poller_fetched_total",
            "Orderbooks fetched over REST",
        )?;
        let snapshot_poller_fetch_errors_total = IntCounter::new(
            "snapshot_poller_fetch_errors_total",
            "Failed REST orderbook fetches",
        )?;
        let snapshot_poller_write_errors_total = IntCounter::new(
            "snapshot_poller_write_errors_total",
            "Snapshots dropped on a full writer channel",
        )?;
        let snapshot_poller_markets_polled = IntGauge::new(
            "snapshot_poller_markets_polled",
            "Markets in the last poll sweep",
        )?;
        let snapshot_poller_poll_duration_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "snapshot_poller_poll_duration_seconds",
                "Duration of one full poll sweep",
            )
            .buckets(prometheus::exponential_buckets(1.0, 2.0, 11)?),
        )?;

        let sync_labels: &[&str] = &["gatherer", "table"];
        let sync_rows_read_total = IntCounterVec::new(
            Opts::new("sync_rows_read_total", "Rows read from gatherer stores"),
            sync_labels,
        )?;
        let sync_rows_inserted_total = IntCounterVec::new(
            Opts::new(
                "sync_rows_inserted_total",
                "Rows newly inserted into the central store",
            ),
            sync_labels,
        )?;
        let sync_conflicts_total = IntCounterVec::new(
            Opts::new(
                "sync_conflicts_total",
                "Rows skipped as duplicates during sync",
            ),
            sync_labels,
        )?;
        let sync_errors_total = IntCounterVec::new(
            Opts::new("sync_errors_total", "Failed sync cycles"),
            sync_labels,
        )?;
        let sync_gatherer_unreachable_total = IntCounterVec::new(
            Opts::new(
                "sync_gatherer_unreachable_total",
                "Cycles skipped because a gatherer store was unreachable",
            ),
            &["gatherer"],
        )?;
        let sync_lag_seconds = IntGaugeVec::new(
            Opts::new(
                "sync_lag_seconds",
                "Seconds between now and the sync cursor",
            ),
            sync_labels,
        )?;
        let metadata_upserts_total = IntCounterVec::new(
            Opts::new("metadata_upserts_total", "Metadata rows upserted"),
            &["entity"],
        )?;
        let metadata_errors_total =
            IntCounter::new("metadata_errors_total", "Failed metadata sync cycles")?;

        let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
            Box::new(websocket_connections.clone()),
            Box::new(websocket_reconnects_total.clone()),
            Box::new(sequence_gaps_total.clone()),
            Box::new(market_redistribution_total.clone()),
            Box::new(markets_unplaced_total.clone()),
            Box::new(subscriptions_active.clone()),
            Box::new(subscribe_failures_total.clone()),
            Box::new(manager_messages_dropped_total.clone()),
            Box::new(router_messages_total.clone()),
            Box::new(router_messages_dropped_total.clone()),
            Box::new(router_parse_errors_total.clone()),
            Box::new(router_unknown_type_total.clone()),
            Box::new(registry_markets.clone()),
            Box::new(registry_changes_dropped_total.clone()),
            Box::new(registry_lifecycle_parse_errors_total.clone()),
            Box::new(registry_reconcile_changes_total.clone()),
            Box::new(writer_received_total.clone()),
            Box::new(writer_inserted_total.clone()),
            Box::new(writer_conflicts_total.clone()),
            Box::new(writer_errors_total.clone()),
            Box::new(writer_batch_size.clone()),
            Box::new(writer_flush_duration_seconds.clone()),
            Box::new(snapshot_poller_fetched_total.clone()),
            Box::new(snapshot_poller_fetch_errors_total.clone()),
            Box::new(snapshot_poller_write_errors_total.clone()),
            Box::new(snapshot_poller_markets_polled.clone()),
            Box::new(snapshot_poller_poll_duration_seconds.clone()),
            Box::new(sync_rows_read_total.clone()),
            Box::new(sync_rows_inserted_total.clone()),
            Box::new(sync_conflicts_total.clone()),
            Box::new(sync_errors_total.clone()),
            Box::new(sync_gatherer_unreachable_total.clone()),
            Box::new(sync_lag_seconds.clone()),
            Box::new(metadata_upserts_total.clone()),
            Box::new(metadata_errors_total.clone()),
        ];
        for collector in collectors {
            registry.register(collector)?;
        }

        Ok(Self {
            registry,
            websocket_connections,
            websocket_reconnects_total,
            sequence_gaps_total,
            market_redistribution_total,
            markets_unplaced_total,
            subscriptions_active,
            subscribe_failures_total,
            manager_messages_dropped_total,
            router_messages_total,
            router_messages_dropped_total,
            router_parse_errors_total,
            router_unknown_type_total,
            registry_markets,
            registry_changes_dropped_total,
            registry_lifecycle_parse_errors_total,
            registry_reconcile_changes_total,
            writer_received_total,
            writer_inserted_total,
            writer_conflicts_total,
            writer_errors_total,
            writer_batch_size,
            writer_flush_duration_seconds,
            snapshot_poller_fetched_total,
            snapshot_poller_fetch_errors_total,
            snapshot_poller_write_errors_total,
            snapshot_poller_markets_polled,
            snapshot_poller_poll_duration_seconds,
            sync_rows_read_total,
            sync_rows_inserted_total,
            sync_conflicts_total,
            sync_errors_total,
            sync_gatherer_unreachable_total,
            sync_lag_seconds,
            metadata_upserts_total,
            metadata_errors_total,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_register_without_collision() {
        let metrics = Metrics::new().expect("all metric names are unique");
        metrics.sequence_gaps_total.inc();
        metrics
            .writer_conflicts_total
            .with_label_values(&["trade"])
            .inc_by(3);

        let families = metrics.registry.gather();
        assert!(families
            .iter()
            .any(|f| f.get_name() == "sequence_gaps_total"));
        assert!(families
            .iter()
            .any(|f| f.get_name() == "writer_conflicts_total"));
    }
}
