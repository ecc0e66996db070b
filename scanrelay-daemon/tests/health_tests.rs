//! Health aggregation tests.
//!
//! Tests the health status aggregation logic and component health reporting.

use scanrelay_breaker::{BreakerSnapshot, CircuitState};
use scanrelay_core::pipeline::HealthStatus;
use scanrelay_core::types::ProviderId;
use scanrelay_daemon::health::{ComponentHealth, DaemonHealth, aggregate_status, provider_health};

fn component(name: &str, status: HealthStatus) -> ComponentHealth {
    ComponentHealth {
        name: name.to_string(),
        status,
    }
}

fn breaker(provider: &str, state: CircuitState) -> BreakerSnapshot {
    BreakerSnapshot {
        provider: ProviderId::new(provider),
        state,
        failure_count: 0,
        total_trips: 0,
        total_calls_blocked: 0,
        consecutive_reopens: 0,
        last_transition_at: None,
        next_attempt_at: None,
        last_failure_at: None,
        last_success_at: None,
    }
}

#[test]
fn test_aggregate_status_all_healthy() {
    // Given: All components are healthy
    let components = vec![
        component("continuations", HealthStatus::Healthy),
        component("scan_flow", HealthStatus::Healthy),
    ];

    // When: Aggregating status
    let status = aggregate_status(&components);

    // Then: Overall status should be Healthy
    assert!(
        status.is_healthy(),
        "all healthy components should result in healthy status"
    );
}

#[test]
fn test_aggregate_status_one_degraded() {
    // Given: One component is degraded
    let components = vec![
        component("continuations", HealthStatus::Healthy),
        component(
            "scan_flow",
            HealthStatus::Degraded("periodic sweeps disabled".to_string()),
        ),
    ];

    // When: Aggregating status
    let status = aggregate_status(&components);

    // Then: Overall status should be Degraded and name the component
    match status {
        HealthStatus::Degraded(reason) => {
            assert_eq!(reason, "scan_flow: periodic sweeps disabled");
        }
        other => panic!("expected Degraded, got {other:?}"),
    }
}

#[test]
fn test_aggregate_status_unhealthy_wins_over_degraded() {
    // Given: One degraded and one unhealthy component
    let components = vec![
        component(
            "scan_flow",
            HealthStatus::Degraded("3 consecutive sweep failures".to_string()),
        ),
        component(
            "continuations",
            HealthStatus::Unhealthy("not started".to_string()),
        ),
    ];

    // When: Aggregating status
    let status = aggregate_status(&components);

    // Then: Only unhealthy reasons are reported
    match status {
        HealthStatus::Unhealthy(reason) => {
            assert_eq!(reason, "continuations: not started");
        }
        other => panic!("expected Unhealthy, got {other:?}"),
    }
}

#[test]
fn test_aggregate_status_collects_all_unhealthy_reasons() {
    let components = vec![
        component("continuations", HealthStatus::Unhealthy("stopped".to_string())),
        component("scan_flow", HealthStatus::Unhealthy("stopped".to_string())),
    ];

    let status = aggregate_status(&components);

    assert_eq!(
        status,
        HealthStatus::Unhealthy("continuations: stopped; scan_flow: stopped".to_string())
    );
}

#[test]
fn test_aggregate_status_no_components() {
    // Given: No components registered
    // Then: Nothing can be unhealthy
    assert!(aggregate_status(&[]).is_healthy());
}

#[test]
fn test_daemon_health_serializes_components() {
    // Given: A health report
    let health = DaemonHealth {
        status: HealthStatus::Healthy,
        uptime_secs: 42,
        components: vec![component("scan_flow", HealthStatus::Healthy)],
    };

    // When: Serializing to JSON
    let json = serde_json::to_value(&health).expect("health should serialize");

    // Then: The report carries uptime and per-component entries
    assert_eq!(json["uptime_secs"], 42);
    assert_eq!(json["components"][0]["name"], "scan_flow");
}

#[test]
fn test_provider_health_closed_and_half_open_are_healthy() {
    // Given: No open circuits (a half-open one still admits a trial call)
    let snapshots = vec![
        breaker("hibp", CircuitState::Closed),
        breaker("dehashed", CircuitState::HalfOpen),
    ];

    // Then: The provider pool is healthy, as is a pool nobody has called yet
    assert!(provider_health(3, &snapshots).is_healthy());
    assert!(provider_health(3, &[]).is_healthy());
}

#[test]
fn test_provider_health_some_open_is_degraded() {
    // Given: Two of three providers are open
    let snapshots = vec![
        breaker("dehashed", CircuitState::Open),
        breaker("hibp", CircuitState::Closed),
        breaker("leakcheck", CircuitState::Open),
    ];

    // When: Summarizing and aggregating with healthy lifecycle components
    let status = provider_health(3, &snapshots);
    let overall = aggregate_status(&[
        component("continuations", HealthStatus::Healthy),
        component("providers", status.clone()),
    ]);

    // Then: The open providers are named
    assert_eq!(
        status,
        HealthStatus::Degraded("2 of 3 provider circuits open (dehashed, leakcheck)".to_string())
    );
    assert_eq!(
        overall,
        HealthStatus::Degraded(
            "providers: 2 of 3 provider circuits open (dehashed, leakcheck)".to_string()
        )
    );
}

#[test]
fn test_provider_health_all_open_is_unhealthy() {
    // Given: Every registered provider is open
    let snapshots = vec![
        breaker("hibp", CircuitState::Open),
        breaker("leakcheck", CircuitState::Open),
    ];

    // Then: No scan can produce results
    assert_eq!(
        provider_health(2, &snapshots),
        HealthStatus::Unhealthy("all 2 provider circuits open".to_string())
    );
}
