//! # Prometheus Metrics
//!
//! Operational counters for the embedded ledger. Registered in a dedicated
//! [`prometheus::Registry`] so they never collide with a global registry,
//! and rendered in the text exposition format on request.

use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

use vault_ledger::{BlockHeight, CustodyService, HeightOracle, LedgerEvent, VaultError, VaultLedger};

/// Metric handles for one ledger.
#[derive(Clone)]
pub struct LedgerMetrics {
    registry: Registry,
    /// Vaults created.
    pub vaults_created_total: IntCounter,
    /// Signatures recorded.
    pub signatures_recorded_total: IntCounter,
    /// First-time emergency activations.
    pub emergency_unlocks_total: IntCounter,
    /// Vaults released to their owners.
    pub vaults_released_total: IntCounter,
    /// Rejected operations, labelled by error kind.
    pub operations_rejected_total: IntCounterVec,
    /// Vaults currently live.
    pub live_vaults: IntGauge,
    /// Token amount currently in custody.
    pub custodied_amount: IntGauge,
    /// Height of the embedded oracle.
    pub height: IntGauge,
}

impl LedgerMetrics {
    /// Creates and registers all metrics.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("vault".into()), None)?;

        let vaults_created_total =
            IntCounter::new("vaults_created_total", "Total number of vaults created")?;
        registry.register(Box::new(vaults_created_total.clone()))?;

        let signatures_recorded_total = IntCounter::new(
            "signatures_recorded_total",
            "Total number of withdrawal signatures recorded",
        )?;
        registry.register(Box::new(signatures_recorded_total.clone()))?;

        let emergency_unlocks_total = IntCounter::new(
            "emergency_unlocks_total",
            "Total number of vaults opened by the arbitrator",
        )?;
        registry.register(Box::new(emergency_unlocks_total.clone()))?;

        let vaults_released_total =
            IntCounter::new("vaults_released_total", "Total number of vaults withdrawn")?;
        registry.register(Box::new(vaults_released_total.clone()))?;

        let operations_rejected_total = IntCounterVec::new(
            Opts::new(
                "operations_rejected_total",
                "Total number of rejected ledger operations by error kind",
            ),
            &["kind"],
        )?;
        registry.register(Box::new(operations_rejected_total.clone()))?;

        let live_vaults = IntGauge::new("live_vaults", "Number of vaults not yet withdrawn")?;
        registry.register(Box::new(live_vaults.clone()))?;

        let custodied_amount =
            IntGauge::new("custodied_amount", "Token amount held on behalf of live vaults")?;
        registry.register(Box::new(custodied_amount.clone()))?;

        let height = IntGauge::new("height", "Current height of the embedded oracle")?;
        registry.register(Box::new(height.clone()))?;

        Ok(Self {
            registry,
            vaults_created_total,
            signatures_recorded_total,
            emergency_unlocks_total,
            vaults_released_total,
            operations_rejected_total,
            live_vaults,
            custodied_amount,
            height,
        })
    }

    /// Counts one event drained from the ledger.
    pub fn observe_event(&self, event: &LedgerEvent) {
        match event {
            LedgerEvent::VaultCreated { .. } => self.vaults_created_total.inc(),
            LedgerEvent::VaultSigned { .. } => self.signatures_recorded_total.inc(),
            LedgerEvent::EmergencyUnlocked { .. } => self.emergency_unlocks_total.inc(),
            LedgerEvent::VaultReleased { .. } => self.vaults_released_total.inc(),
            LedgerEvent::ArbitratorChanged { .. } => {}
        }
    }

    /// Counts one rejected operation.
    pub fn observe_rejection(&self, err: &VaultError) {
        self.operations_rejected_total
            .with_label_values(&[err.kind()])
            .inc();
    }

    /// Refreshes the gauges from the ledger's current state.
    pub fn refresh<C: CustodyService>(&self, ledger: &VaultLedger<BlockHeight, C>) {
        self.live_vaults.set(ledger.vault_ids().len() as i64);
        self.custodied_amount
            .set(i64::try_from(ledger.custodied_total()).unwrap_or(i64::MAX));
        self.height
            .set(i64::try_from(ledger.oracle().current_height()).unwrap_or(i64::MAX));
    }

    /// Encodes all registered metrics into the Prometheus text exposition format.
    pub fn encode(&self) -> anyhow::Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_render_with_namespace() {
        let metrics = LedgerMetrics::new().unwrap();
        metrics.vaults_created_total.inc();
        metrics.observe_rejection(&VaultError::ZeroAmount);

        let text = metrics.encode().unwrap();
        assert!(text.contains("vault_vaults_created_total 1"));
        assert!(text.contains("vault_operations_rejected_total{kind=\"ZeroAmount\"} 1"));
    }
}
