//! Aggregated health check reporting.
//!
//! Collects each component's `health_check()` into a unified
//! [`DaemonHealth`] report. The overall daemon status is the worst
//! status among all components.
//!
//! # Aggregation Rule
//!
//! - All Healthy -> Healthy
//! - Any Degraded, none Unhealthy -> Degraded(reason)
//! - Any Unhealthy -> Unhealthy(reason)
//!
//! Besides the lifecycle components, the daemon reports a synthetic
//! `providers` component derived from circuit breaker state: some open
//! circuits degrade the daemon, and when every registered provider is
//! open no scan can produce results, so the daemon is unhealthy.

use serde::Serialize;

use scanrelay_breaker::{BreakerSnapshot, CircuitState};
use scanrelay_core::pipeline::HealthStatus;

/// Aggregated health report for the entire daemon.
#[derive(Debug, Clone, Serialize)]
pub struct DaemonHealth {
    /// Overall daemon health status (worst of all components).
    pub status: HealthStatus,
    /// Daemon uptime in seconds since start.
    pub uptime_secs: u64,
    /// Per-component health reports.
    pub components: Vec<ComponentHealth>,
}

/// Health status for a single component.
#[derive(Debug, Clone, Serialize)]
pub struct ComponentHealth {
    /// Component name (e.g., "continuations", "scan_flow").
    pub name: String,
    /// Current health status of the component.
    pub status: HealthStatus,
}

/// Aggregate component health statuses into a single status.
///
/// Returns the worst status found: Unhealthy > Degraded > Healthy. The
/// reason lists every component at that severity, in component order.
pub fn aggregate_status(components: &[ComponentHealth]) -> HealthStatus {
    let Some(worst) = components.iter().map(|c| severity(&c.status)).max() else {
        return HealthStatus::Healthy;
    };

    let reasons = components
        .iter()
        .filter(|c| severity(&c.status) == worst)
        .filter_map(|c| match &c.status {
            HealthStatus::Healthy => None,
            HealthStatus::Degraded(reason) | HealthStatus::Unhealthy(reason) => {
                Some(format!("{}: {}", c.name, reason))
            }
        })
        .collect::<Vec<_>>()
        .join("; ");

    match worst {
        0 => HealthStatus::Healthy,
        1 => HealthStatus::Degraded(reasons),
        _ => HealthStatus::Unhealthy(reasons),
    }
}

fn severity(status: &HealthStatus) -> u8 {
    match status {
        HealthStatus::Healthy => 0,
        HealthStatus::Degraded(_) => 1,
        HealthStatus::Unhealthy(_) => 2,
    }
}

/// Health of the provider pool as seen by the circuit breaker.
///
/// `registered` is the number of configured providers. Snapshots of
/// providers that never made a call are absent, which counts as closed.
/// Half-open circuits still admit a trial call and are not counted.
pub fn provider_health(registered: usize, snapshots: &[BreakerSnapshot]) -> HealthStatus {
    let open: Vec<&str> = snapshots
        .iter()
        .filter(|s| s.state == CircuitState::Open)
        .map(|s| s.provider.as_str())
        .collect();

    if open.is_empty() {
        HealthStatus::Healthy
    } else if open.len() >= registered {
        HealthStatus::Unhealthy(format!("all {} provider circuits open", registered))
    } else {
        HealthStatus::Degraded(format!(
            "{} of {} provider circuits open ({})",
            open.len(),
            registered,
            open.join(", ")
        ))
    }
}
