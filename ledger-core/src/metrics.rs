//! Metrics collection for observability
//!
//! Each ledger owns its own Prometheus registry, so several ledgers (tests,
//! simulations) can live in one process without name clashes.
//!
//! # Metrics
//!
//! - `ledger_events_total{event_type}` - Committed state transitions
//! - `ledger_rejections_total{kind}` - Rejected operations by error kind
//! - `ledger_supply` - Outstanding supply (minor units)
//! - `ledger_reserves` - Attested reserves (minor units)
//! - `ledger_attestation_duration_seconds` - Signing latency

use crate::types::Amount;
use prometheus::{Histogram, HistogramOpts, IntCounterVec, IntGauge, Opts, Registry};
use std::fmt;
use std::sync::Arc;

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    /// Committed events by type
    pub events_total: IntCounterVec,

    /// Rejections by error kind
    pub rejections_total: IntCounterVec,

    /// Outstanding supply
    pub supply: IntGauge,

    /// Attested reserves
    pub reserves: IntGauge,

    /// Attestation signing latency
    pub attestation_duration: Histogram,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl Metrics {
    /// Create new metrics collector
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let events_total = IntCounterVec::new(
            Opts::new("ledger_events_total", "Committed state transitions"),
            &["event_type"],
        )?;
        registry.register(Box::new(events_total.clone()))?;

        let rejections_total = IntCounterVec::new(
            Opts::new("ledger_rejections_total", "Rejected operations by error kind"),
            &["kind"],
        )?;
        registry.register(Box::new(rejections_total.clone()))?;

        let supply = IntGauge::new("ledger_supply", "Outstanding supply (minor units)")?;
        registry.register(Box::new(supply.clone()))?;

        let reserves = IntGauge::new("ledger_reserves", "Attested reserves (minor units)")?;
        registry.register(Box::new(reserves.clone()))?;

        let attestation_duration = Histogram::with_opts(
            HistogramOpts::new(
                "ledger_attestation_duration_seconds",
                "Histogram of attestation signing latencies",
            )
            .buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.010, 0.050, 0.100, 0.500, 1.0]),
        )?;
        registry.register(Box::new(attestation_duration.clone()))?;

        Ok(Self {
            events_total,
            rejections_total,
            supply,
            reserves,
            attestation_duration,
            registry,
        })
    }

    /// Record a committed event
    pub fn record_event(&self, event_type: &str) {
        self.events_total.with_label_values(&[event_type]).inc();
    }

    /// Record a rejected operation
    pub fn record_rejection(&self, kind: &str) {
        self.rejections_total.with_label_values(&[kind]).inc();
    }

    /// Publish current supply and reserves
    pub fn update_totals(&self, supply: Amount, reserves: Amount) {
        self.supply.set(supply);
        self.reserves.set(reserves);
    }

    /// Record attestation duration
    pub fn record_attestation_duration(&self, duration_seconds: f64) {
        self.attestation_duration.observe(duration_seconds);
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new().expect("static metric definitions are valid")
    }
}

impl fmt::Debug for Metrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Metrics")
            .field("supply", &self.supply.get())
            .field("reserves", &self.reserves.get())
            .finish_non_exhaustive()
    }
}
