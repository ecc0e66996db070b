//! Runtime assembly and lifecycle management.
//!
//! The [`Orchestrator`] is the central coordinator of `scanrelay-daemon`.
//! It wires the shared state (job store, event log, breaker, ledger, SLO
//! monitor), builds the dispatcher and background components, and runs
//! them until a shutdown signal arrives.
//!
//! # Startup Order
//!
//! 1. Continuation tracker (resumes polling for scans with pending async flags)
//! 2. Remediation scheduler (first sweep runs right after start)
//!
//! # Shutdown Order (reverse)
//!
//! 1. Remediation scheduler
//! 2. Continuation tracker (cancels per-scan poll tasks)
//!
//! Provider adapters are code, not configuration, and are registered
//! through [`OrchestratorBuilder::provider`].

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use tokio::sync::{Mutex, broadcast};

use scanrelay_breaker::{CircuitBreaker, CircuitBreakerConfig};
use scanrelay_core::clock::{Clock, SystemClock};
use scanrelay_core::config::ScanrelayConfig;
use scanrelay_core::event::{EventLog, MemoryEventLog};
use scanrelay_core::types::{ScanStatus, Target};
use scanrelay_dispatcher::{
    ContinuationService, ContinuationTracker, DispatchContext, Dispatcher, DispatcherSettings,
    ProviderAdapter, ProviderRegistry, TrackerSettings,
};
use scanrelay_ledger::{CostLedger, CostLedgerConfig, SloDefinition, SloMonitor};
use scanrelay_remediator::{RemediationScheduler, RemediationSettings, StuckJobRemediator};
use scanrelay_store::{MemoryJobStore, ScanApi, ScanView};

use crate::admin::{AdminService, COMPONENT_CONTINUATIONS, COMPONENT_SCAN_FLOW};
use crate::health::DaemonHealth;
use crate::metrics_server;
use crate::registry::PluginRegistry;

/// Job store used by the daemon.
pub type DaemonStore = MemoryJobStore;

/// Builder for [`Orchestrator`].
pub struct OrchestratorBuilder {
    config: ScanrelayConfig,
    clock: Arc<dyn Clock>,
    providers: Vec<ProviderAdapter>,
}

impl OrchestratorBuilder {
    pub fn new(config: ScanrelayConfig) -> Self {
        Self {
            config,
            clock: Arc::new(SystemClock),
            providers: Vec::new(),
        }
    }

    /// Replace the wall clock (tests use a manual clock).
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Register a provider adapter.
    pub fn provider(mut self, adapter: ProviderAdapter) -> Self {
        self.providers.push(adapter);
        self
    }

    /// Validate the configuration and assemble the runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration validation fails
    /// - Two adapters share a provider id
    /// - The metrics recorder cannot be installed
    pub fn build(self) -> Result<Orchestrator> {
        let Self {
            config,
            clock,
            providers,
        } = self;

        config
            .validate()
            .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

        if config.metrics.enabled {
            metrics_server::install_metrics_recorder(&config.metrics)?;
        }

        let events: Arc<dyn EventLog> =
            Arc::new(MemoryEventLog::new(config.general.event_log_capacity));
        let store = Arc::new(DaemonStore::new());

        let mut registry = ProviderRegistry::new();
        for adapter in providers {
            tracing::info!(
                provider = %adapter.id(),
                capability = %adapter.capability(),
                "registering provider adapter"
            );
            registry.register(adapter)?;
        }
        if registry.is_empty() {
            tracing::warn!("no provider adapters registered, every scan will fail");
        }
        for configured in &config.providers {
            if registry.get(&configured.id.as_str().into()).is_none() {
                tracing::warn!(provider = %configured.id, "configured provider has no adapter");
            }
        }
        let registry = Arc::new(registry);

        let breaker_config = CircuitBreakerConfig::from_core(&config.breaker);
        breaker_config.validate()?;
        let breaker = Arc::new(CircuitBreaker::new(
            breaker_config,
            Arc::clone(&clock),
            Arc::clone(&events),
        ));
        let ledger = Arc::new(CostLedger::new(
            CostLedgerConfig::from_core(&config.ledger),
            Arc::clone(&clock),
            Arc::clone(&events),
        ));
        let slo = Arc::new(SloMonitor::new(
            SloDefinition::from_core(&config.slo),
            Arc::clone(&clock),
        ));

        let ctx = DispatchContext {
            store: Arc::clone(&store),
            registry: Arc::clone(&registry),
            breaker: Arc::clone(&breaker),
            ledger: Arc::clone(&ledger),
            slo: Arc::clone(&slo),
            clock: Arc::clone(&clock),
            events: Arc::clone(&events),
        };

        let tracker = Arc::new(ContinuationTracker::new(
            ctx.clone(),
            TrackerSettings::from_core(&config.tracker),
        ));
        let dispatcher_settings =
            DispatcherSettings::from_core(&config.dispatcher, &config.providers);
        dispatcher_settings.validate()?;
        let dispatcher = Arc::new(Dispatcher::new(
            ctx,
            dispatcher_settings,
            Arc::clone(&tracker),
        ));

        let remediator = Arc::new(StuckJobRemediator::new(
            Arc::clone(&store),
            Arc::clone(&clock),
            Arc::clone(&events),
            RemediationSettings::from_core(&config.remediation),
        )?);

        let scans = ScanApi::from_config(
            &config.store,
            Arc::clone(&store),
            Arc::clone(&clock),
            Arc::clone(&events),
        );

        let mut plugins = PluginRegistry::new();
        plugins.register(
            COMPONENT_CONTINUATIONS,
            Box::new(ContinuationService::new(Arc::clone(&tracker))),
        )?;
        plugins.register(
            COMPONENT_SCAN_FLOW,
            Box::new(RemediationScheduler::new(Arc::clone(&remediator))),
        )?;
        let component_count = plugins.count();
        let plugins = Arc::new(Mutex::new(plugins));

        let admin = AdminService::new(
            remediator,
            tracker,
            registry,
            breaker,
            ledger,
            slo,
            Arc::clone(&events),
            Arc::clone(&plugins),
        )
        .with_uptime_metric(config.metrics.enabled);

        if config.metrics.enabled {
            record_daemon_metrics(component_count);
        }
        tracing::info!(components = component_count, "orchestrator initialized");

        let (shutdown_tx, _) = broadcast::channel(16);
        Ok(Orchestrator {
            config,
            plugins,
            scans,
            dispatcher,
            admin: Arc::new(admin),
            events,
            shutdown_tx,
            start_time: Instant::now(),
        })
    }
}

/// The main daemon orchestrator.
pub struct Orchestrator {
    /// Loaded and validated configuration.
    config: ScanrelayConfig,
    /// Registry of lifecycle components (ordered for start/stop).
    plugins: Arc<Mutex<PluginRegistry>>,
    scans: ScanApi<DaemonStore>,
    dispatcher: Arc<Dispatcher<DaemonStore>>,
    admin: Arc<AdminService<DaemonStore>>,
    events: Arc<dyn EventLog>,
    /// Shutdown broadcast sender (signals all background tasks).
    shutdown_tx: broadcast::Sender<()>,
    /// Daemon start time (for uptime reporting).
    start_time: Instant,
}

impl Orchestrator {
    pub fn builder(config: ScanrelayConfig) -> OrchestratorBuilder {
        OrchestratorBuilder::new(config)
    }

    /// Start all components in registration order.
    ///
    /// If any component fails, already-started components are stopped again.
    pub async fn start(&self) -> Result<()> {
        let mut plugins = self.plugins.lock().await;
        tracing::info!("starting all components");
        if let Err(e) = plugins.start_all().await {
            tracing::warn!("startup failed, rolling back already-started components");
            if let Err(stop_err) = plugins.stop_all().await {
                tracing::error!(
                    startup_error = %e,
                    rollback_error = %stop_err,
                    "rollback also failed during startup failure cleanup"
                );
            }
            return Err(e);
        }
        Ok(())
    }

    /// Start all components and block until SIGTERM or SIGINT.
    pub async fn run(&self) -> Result<()> {
        self.start().await?;

        let uptime_task = if self.config.metrics.enabled {
            Some(spawn_uptime_updater(
                self.start_time,
                self.shutdown_tx.subscribe(),
            ))
        } else {
            None
        };

        tracing::info!("entering main loop");
        let signal = wait_for_shutdown_signal().await?;
        tracing::info!(signal = signal, "shutdown signal received");

        let _ = self.shutdown_tx.send(());
        if let Some(task) = uptime_task {
            let _ = task.await;
        }

        self.shutdown().await
    }

    /// Stop all components in reverse registration order.
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("stopping all components");
        self.plugins.lock().await.stop_all().await
    }

    /// Create a scan for `target` and dispatch it unless a cached result was reused.
    ///
    /// Returns the scan as it stands after the synchronous providers have
    /// answered; async providers may still be pending.
    pub async fn submit_scan(&self, owner: &str, target: Target) -> Result<ScanView> {
        let scan = self.scans.create_scan(owner, target).await?;
        if scan.status == ScanStatus::Pending {
            let report = self.dispatcher.dispatch(scan.id).await?;
            tracing::debug!(
                scan_id = %scan.id,
                status = %report.status,
                calls = report.calls.len(),
                "scan dispatched"
            );
        }
        Ok(self.scans.get_scan(scan.id).await?)
    }

    pub fn scans(&self) -> &ScanApi<DaemonStore> {
        &self.scans
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher<DaemonStore>> {
        &self.dispatcher
    }

    pub fn tracker(&self) -> &Arc<ContinuationTracker<DaemonStore>> {
        self.dispatcher.tracker()
    }

    pub fn admin(&self) -> &Arc<AdminService<DaemonStore>> {
        &self.admin
    }

    pub fn events(&self) -> &Arc<dyn EventLog> {
        &self.events
    }

    pub async fn health(&self) -> DaemonHealth {
        self.admin.health().await
    }

    pub fn config(&self) -> &ScanrelayConfig {
        &self.config
    }
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
///
/// Returns the name of the signal that triggered the shutdown.
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Record daemon-level metrics (build info, components registered).
fn record_daemon_metrics(component_count: usize) {
    use scanrelay_core::metrics as m;

    metrics::gauge!(m::DAEMON_BUILD_INFO, "version" => env!("CARGO_PKG_VERSION")).set(1.0);
    #[allow(clippy::cast_precision_loss)]
    metrics::gauge!(m::DAEMON_COMPONENTS_REGISTERED).set(component_count as f64);

    tracing::debug!(
        component_count,
        version = env!("CARGO_PKG_VERSION"),
        "daemon metrics recorded"
    );
}

/// Spawn a background task that periodically updates the uptime metric.
fn spawn_uptime_updater(
    start_time: Instant,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> tokio::task::JoinHandle<()> {
    use scanrelay_core::metrics as m;

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(10));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let uptime_secs = start_time.elapsed().as_secs();
                    #[allow(clippy::cast_precision_loss)]
                    metrics::gauge!(m::DAEMON_UPTIME_SECONDS).set(uptime_secs as f64);
                }
                _ = shutdown_rx.recv() => {
                    tracing::debug!("uptime updater shutting down");
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_uptime_updater_stops_on_shutdown() {
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let task = spawn_uptime_updater(Instant::now(), shutdown_rx);

        let _ = shutdown_tx.send(());

        let result = tokio::time::timeout(tokio::time::Duration::from_millis(100), task).await;
        assert!(result.is_ok(), "uptime updater should shut down within timeout");
    }

    #[test]
    fn test_duplicate_provider_ids_fail_the_build() {
        use scanrelay_dispatcher::mock::MockSyncProvider;

        let result = Orchestrator::builder(ScanrelayConfig::default())
            .provider(ProviderAdapter::Sync(Arc::new(MockSyncProvider::new("hibp"))))
            .provider(ProviderAdapter::Sync(Arc::new(MockSyncProvider::new("hibp"))))
            .build();
        assert!(result.is_err());
    }
}
