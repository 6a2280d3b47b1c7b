//! Prometheus-backed metrics registry and snapshot helpers.
//!
//! # Design
//! - Encapsulates collector registration to keep the public API small.
//! - Exposes the counters and gauges relevant to transfer operations.

use std::sync::Arc;

use prometheus::core::Collector;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use serde::Serialize;

use crate::error::{Result, TelemetryError};

const CONFLICT_POLICIES: [&str; 3] = ["throw", "overwrite", "rename"];

/// Prometheus-backed metrics registry shared by transfer services.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    registry: Registry,
    transfer_steps_total: IntCounterVec,
    transfer_entries_total: IntCounterVec,
    transfer_bytes_total: IntCounter,
    transfer_conflicts_total: IntCounterVec,
    transfer_rollbacks_total: IntCounterVec,
    active_transfers: IntGauge,
}

/// Snapshot of selected gauges and counters for health reporting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    /// Operations currently in flight.
    pub active_transfers: i64,
    /// Total bytes copied by the executor.
    pub bytes_total: u64,
    /// Files copied.
    pub entries_copied: u64,
    /// Files moved.
    pub entries_moved: u64,
    /// Directories moved.
    pub directories_moved: u64,
    /// Conflicts resolved by policy, all policies combined.
    pub conflicts_total: u64,
    /// Rollbacks that restored every touched path.
    pub rollbacks_completed: u64,
    /// Rollbacks that left at least one compensation undone.
    pub rollbacks_incomplete: u64,
}

impl Metrics {
    /// Construct a new metrics registry with the standard collectors registered.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the Prometheus collectors cannot be
    /// registered.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let transfer_steps_total = register(
            &registry,
            "transfer_steps_total",
            IntCounterVec::new(
                Opts::new("transfer_steps_total", "Transfer pipeline steps executed by status"),
                &["step", "status"],
            ),
        )?;
        let transfer_entries_total = register(
            &registry,
            "transfer_entries_total",
            IntCounterVec::new(
                Opts::new("transfer_entries_total", "Entries transferred by mode"),
                &["mode"],
            ),
        )?;
        let transfer_bytes_total = register(
            &registry,
            "transfer_bytes_total",
            IntCounter::with_opts(Opts::new(
                "transfer_bytes_total",
                "Bytes copied between source and destination handles",
            )),
        )?;
        let transfer_conflicts_total = register(
            &registry,
            "transfer_conflicts_total",
            IntCounterVec::new(
                Opts::new(
                    "transfer_conflicts_total",
                    "Existing destinations resolved by conflict policy",
                ),
                &["policy"],
            ),
        )?;
        let transfer_rollbacks_total = register(
            &registry,
            "transfer_rollbacks_total",
            IntCounterVec::new(
                Opts::new("transfer_rollbacks_total", "Ledger rollbacks by outcome"),
                &["outcome"],
            ),
        )?;
        let active_transfers = register(
            &registry,
            "active_transfers",
            IntGauge::with_opts(Opts::new("active_transfers", "Transfers currently running")),
        )?;

        Ok(Self {
            inner: Arc::new(MetricsInner {
                registry,
                transfer_steps_total,
                transfer_entries_total,
                transfer_bytes_total,
                transfer_conflicts_total,
                transfer_rollbacks_total,
                active_transfers,
            }),
        })
    }

    /// Increment the pipeline step counter.
    pub fn inc_transfer_step(&self, step: &str, status: &str) {
        self.inner
            .transfer_steps_total
            .with_label_values(&[step, status])
            .inc();
    }

    /// Count one transferred entry for the given mode (`copy`, `move`, `directory_move`).
    pub fn inc_entry(&self, mode: &str) {
        self.inner
            .transfer_entries_total
            .with_label_values(&[mode])
            .inc();
    }

    /// Add copied bytes to the running total.
    pub fn add_bytes(&self, bytes: u64) {
        self.inner.transfer_bytes_total.inc_by(bytes);
    }

    /// Count one conflict resolved under the given policy.
    pub fn inc_conflict(&self, policy: &str) {
        self.inner
            .transfer_conflicts_total
            .with_label_values(&[policy])
            .inc();
    }

    /// Count one rollback with its outcome (`completed` or `incomplete`).
    pub fn inc_rollback(&self, outcome: &str) {
        self.inner
            .transfer_rollbacks_total
            .with_label_values(&[outcome])
            .inc();
    }

    /// Mark a transfer as started; the returned guard marks it finished on drop.
    #[must_use]
    pub fn track_active(&self) -> ActiveTransferGuard {
        self.inner.active_transfers.inc();
        ActiveTransferGuard {
            gauge: self.inner.active_transfers.clone(),
        }
    }

    /// Render the metrics registry using the Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if the metrics cannot be encoded or if the encoded
    /// buffer is not valid UTF-8.
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|source| TelemetryError::MetricsEncode { source })?;
        String::from_utf8(buffer).map_err(|source| TelemetryError::MetricsUtf8 { source })
    }

    /// Take a point-in-time snapshot of the most relevant gauges and counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        let inner = &self.inner;
        MetricsSnapshot {
            active_transfers: inner.active_transfers.get(),
            bytes_total: inner.transfer_bytes_total.get(),
            entries_copied: inner.transfer_entries_total.with_label_values(&["copy"]).get(),
            entries_moved: inner.transfer_entries_total.with_label_values(&["move"]).get(),
            directories_moved: inner
                .transfer_entries_total
                .with_label_values(&["directory_move"])
                .get(),
            conflicts_total: CONFLICT_POLICIES
                .iter()
                .map(|policy| {
                    inner
                        .transfer_conflicts_total
                        .with_label_values(&[*policy])
                        .get()
                })
                .sum(),
            rollbacks_completed: inner
                .transfer_rollbacks_total
                .with_label_values(&["completed"])
                .get(),
            rollbacks_incomplete: inner
                .transfer_rollbacks_total
                .with_label_values(&["incomplete"])
                .get(),
        }
    }

    /// Read a single step counter, mainly for assertions.
    #[must_use]
    pub fn step_count(&self, step: &str, status: &str) -> u64 {
        self.inner
            .transfer_steps_total
            .with_label_values(&[step, status])
            .get()
    }
}

/// Decrements `active_transfers` when dropped.
#[derive(Debug)]
pub struct ActiveTransferGuard {
    gauge: IntGauge,
}

impl Drop for ActiveTransferGuard {
    fn drop(&mut self) {
        self.gauge.dec();
    }
}

fn register<C>(
    registry: &Registry,
    name: &'static str,
    collector: prometheus::Result<C>,
) -> Result<C>
where
    C: Collector + Clone + 'static,
{
    let collector = collector.map_err(|source| TelemetryError::MetricsRegister { name, source })?;
    registry
        .register(Box::new(collector.clone()))
        .map_err(|source| TelemetryError::MetricsRegister { name, source })?;
    Ok(collector)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_snapshot_reflects_updates() -> anyhow::Result<()> {
        let metrics = Metrics::new()?;
        metrics.inc_transfer_step("transfer", "completed");
        metrics.inc_entry("copy");
        metrics.inc_entry("copy");
        metrics.inc_entry("move");
        metrics.add_bytes(2_048);
        metrics.inc_conflict("overwrite");
        metrics.inc_conflict("rename");
        metrics.inc_rollback("completed");

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.entries_copied, 2);
        assert_eq!(snapshot.entries_moved, 1);
        assert_eq!(snapshot.bytes_total, 2_048);
        assert_eq!(snapshot.conflicts_total, 2);
        assert_eq!(snapshot.rollbacks_completed, 1);
        assert_eq!(snapshot.rollbacks_incomplete, 0);
        assert_eq!(metrics.step_count("transfer", "completed"), 1);

        let rendered = metrics.render()?;
        assert!(rendered.contains("transfer_steps_total"));
        assert!(rendered.contains("transfer_bytes_total"));
        Ok(())
    }

    #[test]
    fn active_guard_tracks_in_flight_transfers() -> anyhow::Result<()> {
        let metrics = Metrics::new()?;
        {
            let _first = metrics.track_active();
            let _second = metrics.track_active();
            assert_eq!(metrics.snapshot().active_transfers, 2);
        }
        assert_eq!(metrics.snapshot().active_transfers, 0);
        Ok(())
    }
}
