//! Operator admin surface.
//!
//! [`AdminService`] exposes manual sweeps, breaker overrides and the
//! ledger/SLO views. It only reads or nudges shared state; scan data
//! itself is served by [`ScanApi`](scanrelay_store::ScanApi).

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::Mutex;

use scanrelay_breaker::{BreakerSnapshot, CircuitBreaker};
use scanrelay_core::event::{EventLog, ScanEvent};
use scanrelay_core::metrics as m;
use scanrelay_core::types::{BudgetPeriod, ProviderId};
use scanrelay_dispatcher::{ContinuationTracker, ProviderRegistry};
use scanrelay_ledger::{BudgetAlert, BudgetRecord, CostLedger, ProviderMetrics, SloMonitor, SloStatus};
use scanrelay_remediator::{StuckJobRemediator, SweepReport};
use scanrelay_store::JobStore;

use crate::health::{ComponentHealth, DaemonHealth, aggregate_status, provider_health};
use crate::registry::PluginRegistry;

/// Component name of the stuck-job remediation scheduler.
pub const COMPONENT_SCAN_FLOW: &str = "scan_flow";
/// Component name of the async continuation tracker.
pub const COMPONENT_CONTINUATIONS: &str = "continuations";
/// Health-only component summarizing provider circuit states.
pub const COMPONENT_PROVIDERS: &str = "providers";

/// Result of an operator-triggered sweep.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "component", rename_all = "snake_case")]
pub enum TriggerReport {
    /// Stuck-job remediation sweep.
    ScanFlow(SweepReport),
    /// One poll of every tracked async scan.
    Continuations { polled: usize, tracked: usize },
}

/// Budget view for one period.
#[derive(Debug, Clone, Serialize)]
pub struct BudgetSummary {
    pub period: BudgetPeriod,
    pub currency: String,
    pub records: Vec<BudgetRecord>,
    pub alerts: Vec<BudgetAlert>,
}

/// Shared handles behind the admin surface.
pub struct AdminService<S: JobStore> {
    remediator: Arc<StuckJobRemediator<S>>,
    tracker: Arc<ContinuationTracker<S>>,
    providers: Arc<ProviderRegistry>,
    breaker: Arc<CircuitBreaker>,
    ledger: Arc<CostLedger>,
    slo: Arc<SloMonitor>,
    events: Arc<dyn EventLog>,
    components: Arc<Mutex<PluginRegistry>>,
    started_at: Instant,
    record_uptime: bool,
}

impl<S: JobStore> AdminService<S> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        remediator: Arc<StuckJobRemediator<S>>,
        tracker: Arc<ContinuationTracker<S>>,
        providers: Arc<ProviderRegistry>,
        breaker: Arc<CircuitBreaker>,
        ledger: Arc<CostLedger>,
        slo: Arc<SloMonitor>,
        events: Arc<dyn EventLog>,
        components: Arc<Mutex<PluginRegistry>>,
    ) -> Self {
        Self {
            remediator,
            tracker,
            providers,
            breaker,
            ledger,
            slo,
            events,
            components,
            started_at: Instant::now(),
            record_uptime: false,
        }
    }

    /// Also publish the uptime gauge whenever `health()` is queried.
    pub fn with_uptime_metric(mut self, enabled: bool) -> Self {
        self.record_uptime = enabled;
        self
    }

    /// Run one pass of a component on demand.
    ///
    /// # Components
    ///
    /// * `"scan_flow"` - stuck-job remediation sweep
    /// * `"continuations"` - poll every tracked async scan once
    pub async fn trigger_sweep(&self, component: &str) -> anyhow::Result<TriggerReport> {
        match component {
            COMPONENT_SCAN_FLOW => {
                tracing::info!(component, "operator triggered remediation sweep");
                let report = self.remediator.sweep_now().await?;
                Ok(TriggerReport::ScanFlow(report))
            }
            COMPONENT_CONTINUATIONS => {
                tracing::info!(component, "operator triggered continuation poll");
                let tracked = self.tracker.tracked_count();
                let polled = self.tracker.poll_all().await;
                Ok(TriggerReport::Continuations { polled, tracked })
            }
            other => Err(anyhow::anyhow!(
                "unknown component '{}', expected '{}' or '{}'",
                other,
                COMPONENT_SCAN_FLOW,
                COMPONENT_CONTINUATIONS
            )),
        }
    }

    /// Force a provider's circuit open.
    pub fn trip_breaker(&self, provider: &str) -> anyhow::Result<BreakerSnapshot> {
        let id = self.known_provider(provider)?;
        let snapshot = self.breaker.trip(&id)?;
        tracing::warn!(provider = %id, "circuit manually tripped");
        Ok(snapshot)
    }

    /// Close a provider's circuit and clear its failure history.
    pub fn reset_breaker(&self, provider: &str) -> anyhow::Result<BreakerSnapshot> {
        let id = self.known_provider(provider)?;
        let snapshot = self.breaker.reset(&id)?;
        tracing::info!(provider = %id, "circuit manually reset");
        Ok(snapshot)
    }

    /// Breaker state of every provider seen so far, ordered by provider id.
    pub fn breaker_states(&self) -> Vec<BreakerSnapshot> {
        self.breaker.snapshots()
    }

    /// Per-provider call statistics over the trailing `window`.
    pub fn provider_metrics(&self, window: Duration) -> Vec<ProviderMetrics> {
        self.ledger.all_provider_metrics(window)
    }

    /// Spend records and alerts for the current `period`.
    pub fn budget_summary(&self, period: BudgetPeriod) -> BudgetSummary {
        BudgetSummary {
            period,
            currency: self.ledger.currency().to_owned(),
            records: self.ledger.summary(period),
            alerts: self
                .ledger
                .alerts()
                .into_iter()
                .filter(|a| a.period == period)
                .collect(),
        }
    }

    pub fn slo_report(&self) -> Vec<SloStatus> {
        self.slo.report()
    }

    /// Most recent audit events, newest first.
    pub fn recent_events(&self, limit: usize) -> Vec<ScanEvent> {
        self.events.recent(limit)
    }

    /// Aggregated health of all registered components.
    pub async fn health(&self) -> DaemonHealth {
        let mut components = self.components.lock().await.health_statuses().await;
        components.push(ComponentHealth {
            name: COMPONENT_PROVIDERS.to_owned(),
            status: provider_health(self.providers.len(), &self.breaker.snapshots()),
        });
        let status = aggregate_status(&components);
        let uptime_secs = self.started_at.elapsed().as_secs();

        if self.record_uptime {
            #[allow(clippy::cast_precision_loss)]
            metrics::gauge!(m::DAEMON_UPTIME_SECONDS).set(uptime_secs as f64);
        }

        DaemonHealth {
            status,
            uptime_secs,
            components,
        }
    }

    fn known_provider(&self, provider: &str) -> anyhow::Result<ProviderId> {
        let id = ProviderId::new(provider);
        if self.providers.get(&id).is_none() {
            return Err(anyhow::anyhow!("unknown provider '{}'", provider));
        }
        Ok(id)
    }
}
