//! 메트릭 상수 및 설명 등록
//!
//! 모든 Prometheus 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 크레이트는 이 상수를 사용하여 `metrics::counter!()`, `metrics::gauge!()`,
//! `metrics::histogram!()` 매크로를 호출합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `scanrelay_`
//! - 컴포넌트명: `scan_`, `provider_`, `breaker_`, `continuation_`, `remediation_`, `ledger_`
//! - 접미어: `_total` (counter), `_seconds` (histogram/latency), 없음 (gauge)
//!
//! # 사용 예시
//!
//! ```ignore
//! use scanrelay_core::metrics as m;
//!
//! metrics::counter!(m::PROVIDER_CALLS_TOTAL, m::LABEL_PROVIDER => "hibp").increment(1);
//! ```

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 프로바이더 레이블 키
pub const LABEL_PROVIDER: &str = "provider";

/// 이벤트 단계 레이블 키
pub const LABEL_STAGE: &str = "stage";

/// 스캔 상태 레이블 키
pub const LABEL_STATUS: &str = "status";

/// 서킷 상태 레이블 키 (closed, open, half_open)
pub const LABEL_STATE: &str = "state";

/// 결과 레이블 키 (success, failure, timeout)
pub const LABEL_RESULT: &str = "result";

/// 정리 액션 레이블 키
pub const LABEL_ACTION: &str = "action";

/// 예산 기간 레이블 키 (daily, monthly)
pub const LABEL_PERIOD: &str = "period";

/// 알림 수준 레이블 키 (warning, critical)
pub const LABEL_LEVEL: &str = "level";

/// 건너뛴 사유 레이블 키
pub const LABEL_REASON: &str = "reason";

/// SLO 이름 레이블 키
pub const LABEL_SLO: &str = "slo";

// ─── 스캔 메트릭 ────────────────────────────────────────────────────

/// 생성된 스캔 수 (counter, label: status)
pub const SCANS_CREATED_TOTAL: &str = "scanrelay_scans_created_total";

/// 종료 상태에 도달한 스캔 수 (counter, label: status)
pub const SCANS_FINALIZED_TOTAL: &str = "scanrelay_scans_finalized_total";

/// 스캔 생성부터 종료까지 걸린 시간 (histogram, 초)
pub const SCAN_COMPLETION_SECONDS: &str = "scanrelay_scan_completion_seconds";

/// 저장된 발견 항목 수 (counter, label: provider)
pub const FINDINGS_INGESTED_TOTAL: &str = "scanrelay_findings_ingested_total";

// ─── 디스패처 메트릭 ─────────────────────────────────────────────────

/// 프로바이더 호출 수 (counter, labels: provider, result)
pub const PROVIDER_CALLS_TOTAL: &str = "scanrelay_provider_calls_total";

/// 프로바이더 호출 지연 시간 (histogram, 초, label: provider)
pub const PROVIDER_CALL_DURATION_SECONDS: &str = "scanrelay_provider_call_duration_seconds";

/// 호출하지 않고 건너뛴 프로바이더 수 (counter, labels: provider, reason)
pub const PROVIDER_SKIPPED_TOTAL: &str = "scanrelay_provider_skipped_total";

// ─── 서킷 브레이커 메트릭 ────────────────────────────────────────────

/// 서킷 상태 전이 수 (counter, labels: provider, state)
pub const BREAKER_TRANSITIONS_TOTAL: &str = "scanrelay_breaker_transitions_total";

/// 서킷 차단으로 거부된 호출 수 (counter, label: provider)
pub const BREAKER_CALLS_BLOCKED_TOTAL: &str = "scanrelay_breaker_calls_blocked_total";

/// 현재 서킷 상태 (gauge, 0=closed 1=half_open 2=open, label: provider)
pub const BREAKER_STATE: &str = "scanrelay_breaker_state";

// ─── 비동기 연속 추적 메트릭 ─────────────────────────────────────────

/// 폴링 중인 스캔 수 (gauge)
pub const CONTINUATIONS_ACTIVE: &str = "scanrelay_continuations_active";

/// 수행된 폴링 수 (counter, labels: provider, result)
pub const CONTINUATION_POLLS_TOTAL: &str = "scanrelay_continuation_polls_total";

/// 종료된 스캔에 늦게 도착한 발견 항목 수 (counter, label: provider)
pub const LATE_FINDINGS_TOTAL: &str = "scanrelay_late_findings_total";

// ─── 정리 작업 메트릭 ────────────────────────────────────────────────

/// 수행된 스윕 수 (counter)
pub const REMEDIATION_SWEEPS_TOTAL: &str = "scanrelay_remediation_sweeps_total";

/// 적용된 정리 액션 수 (counter, label: action)
pub const REMEDIATION_ACTIONS_TOTAL: &str = "scanrelay_remediation_actions_total";

/// 조건부 갱신 경합으로 건너뛴 수 (counter)
pub const REMEDIATION_RACES_TOTAL: &str = "scanrelay_remediation_races_total";

/// 강제 해제된 대기 플래그 수 (counter)
pub const REMEDIATION_FLAGS_CLEARED_TOTAL: &str = "scanrelay_remediation_flags_cleared_total";

// ─── 비용 원장 / SLO 메트릭 ──────────────────────────────────────────

/// 기간 누적 비용 (gauge, labels: provider, period)
pub const LEDGER_PERIOD_COST: &str = "scanrelay_ledger_period_cost";

/// 발생한 예산 알림 수 (counter, labels: provider, level)
pub const LEDGER_BUDGET_ALERTS_TOTAL: &str = "scanrelay_ledger_budget_alerts_total";

/// SLO 준수율 (gauge, 0.0 ~ 1.0, label: slo)
pub const SLO_COMPLIANCE_RATIO: &str = "scanrelay_slo_compliance_ratio";

// ─── 이벤트 로그 메트릭 ──────────────────────────────────────────────

/// 기록된 감사 이벤트 수 (counter, label: stage)
pub const EVENTS_APPENDED_TOTAL: &str = "scanrelay_events_appended_total";

// ─── Daemon 메트릭 ──────────────────────────────────────────────────

/// Daemon: 가동 시간 (gauge, 초)
pub const DAEMON_UPTIME_SECONDS: &str = "scanrelay_daemon_uptime_seconds";

/// Daemon: 등록된 컴포넌트 수 (gauge)
pub const DAEMON_COMPONENTS_REGISTERED: &str = "scanrelay_daemon_components_registered";

/// Daemon: 빌드 정보 (gauge, 항상 1, label: version)
pub const DAEMON_BUILD_INFO: &str = "scanrelay_daemon_build_info";

// ─── 히스토그램 버킷 정의 ────────────────────────────────────────────

/// 프로바이더 호출 지연 시간 버킷 (초)
///
/// 50ms ~ 60s 범위
pub const PROVIDER_CALL_DURATION_BUCKETS: [f64; 10] =
    [0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0];

/// 스캔 완료 시간 버킷 (초)
///
/// 1s ~ 1h 범위 (비동기 프로바이더는 수 분이 걸림)
pub const SCAN_COMPLETION_BUCKETS: [f64; 9] =
    [1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 600.0, 1800.0, 3600.0];

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// 전역 레코더 설치 후 한 번만 호출합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge, describe_histogram};

    // Scans
    describe_counter!(SCANS_CREATED_TOTAL, "Total number of scans created");
    describe_counter!(
        SCANS_FINALIZED_TOTAL,
        "Total number of scans that reached a terminal status"
    );
    describe_histogram!(
        SCAN_COMPLETION_SECONDS,
        "Time from scan creation to terminal status in seconds"
    );
    describe_counter!(
        FINDINGS_INGESTED_TOTAL,
        "Total number of findings stored per provider"
    );

    // Dispatcher
    describe_counter!(
        PROVIDER_CALLS_TOTAL,
        "Total number of provider calls by result"
    );
    describe_histogram!(
        PROVIDER_CALL_DURATION_SECONDS,
        "Provider call latency in seconds"
    );
    describe_counter!(
        PROVIDER_SKIPPED_TOTAL,
        "Total number of provider dispatches skipped before calling"
    );

    // Circuit breaker
    describe_counter!(
        BREAKER_TRANSITIONS_TOTAL,
        "Total number of circuit breaker state transitions"
    );
    describe_counter!(
        BREAKER_CALLS_BLOCKED_TOTAL,
        "Total number of calls rejected by an open circuit"
    );
    describe_gauge!(
        BREAKER_STATE,
        "Current circuit state per provider (0=closed, 1=half_open, 2=open)"
    );

    // Continuations
    describe_gauge!(
        CONTINUATIONS_ACTIVE,
        "Number of scans with an active continuation poller"
    );
    describe_counter!(
        CONTINUATION_POLLS_TOTAL,
        "Total number of asynchronous provider polls"
    );
    describe_counter!(
        LATE_FINDINGS_TOTAL,
        "Total number of findings delivered after the scan was closed"
    );

    // Remediation
    describe_counter!(REMEDIATION_SWEEPS_TOTAL, "Total number of stuck-job sweeps");
    describe_counter!(
        REMEDIATION_ACTIONS_TOTAL,
        "Total number of remediation actions applied"
    );
    describe_counter!(
        REMEDIATION_RACES_TOTAL,
        "Total number of remediation updates rejected by a concurrent change"
    );
    describe_counter!(
        REMEDIATION_FLAGS_CLEARED_TOTAL,
        "Total number of stale async pending flags force-cleared"
    );

    // Ledger
    describe_gauge!(
        LEDGER_PERIOD_COST,
        "Accumulated provider cost in the current budget period"
    );
    describe_counter!(
        LEDGER_BUDGET_ALERTS_TOTAL,
        "Total number of budget threshold alerts raised"
    );
    describe_gauge!(SLO_COMPLIANCE_RATIO, "Current SLO compliance ratio");

    // Events
    describe_counter!(EVENTS_APPENDED_TOTAL, "Total number of audit events appended");

    // Daemon
    describe_gauge!(DAEMON_UPTIME_SECONDS, "scanrelay daemon uptime in seconds");
    describe_gauge!(
        DAEMON_COMPONENTS_REGISTERED,
        "Number of lifecycle components registered in the daemon"
    );
    describe_gauge!(DAEMON_BUILD_INFO, "Build information (always 1)");
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_METRIC_NAMES: &[&str] = &[
        SCANS_CREATED_TOTAL,
        SCANS_FINALIZED_TOTAL,
        SCAN_COMPLETION_SECONDS,
        FINDINGS_INGESTED_TOTAL,
        PROVIDER_CALLS_TOTAL,
        PROVIDER_CALL_DURATION_SECONDS,
        PROVIDER_SKIPPED_TOTAL,
        BREAKER_TRANSITIONS_TOTAL,
        BREAKER_CALLS_BLOCKED_TOTAL,
        BREAKER_STATE,
        CONTINUATIONS_ACTIVE,
        CONTINUATION_POLLS_TOTAL,
        LATE_FINDINGS_TOTAL,
        REMEDIATION_SWEEPS_TOTAL,
        REMEDIATION_ACTIONS_TOTAL,
        REMEDIATION_RACES_TOTAL,
        REMEDIATION_FLAGS_CLEARED_TOTAL,
        LEDGER_PERIOD_COST,
        LEDGER_BUDGET_ALERTS_TOTAL,
        SLO_COMPLIANCE_RATIO,
        EVENTS_APPENDED_TOTAL,
        DAEMON_UPTIME_SECONDS,
        DAEMON_COMPONENTS_REGISTERED,
        DAEMON_BUILD_INFO,
    ];

    #[test]
    fn all_metrics_start_with_prefix() {
        for name in ALL_METRIC_NAMES {
            assert!(
                name.starts_with("scanrelay_"),
                "Metric '{}' does not start with 'scanrelay_' prefix",
                name
            );
        }
    }

    #[test]
    fn counters_end_with_total() {
        for name in ALL_METRIC_NAMES.iter().filter(|n| n.contains("_total")) {
            assert!(name.ends_with("_total"), "'{}' has _total mid-name", name);
        }
    }

    #[test]
    fn metric_names_are_unique() {
        let mut names: Vec<_> = ALL_METRIC_NAMES.to_vec();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), ALL_METRIC_NAMES.len());
    }

    #[test]
    fn describe_all_does_not_panic() {
        describe_all();
    }

    #[test]
    fn label_keys_are_lowercase() {
        let labels = [
            LABEL_PROVIDER,
            LABEL_STAGE,
            LABEL_STATUS,
            LABEL_STATE,
            LABEL_RESULT,
            LABEL_ACTION,
            LABEL_PERIOD,
            LABEL_LEVEL,
            LABEL_REASON,
            LABEL_SLO,
        ];
        for label in &labels {
            assert_eq!(label.to_lowercase(), *label);
        }
    }

    #[test]
    fn buckets_are_sorted() {
        for buckets in [
            &PROVIDER_CALL_DURATION_BUCKETS[..],
            &SCAN_COMPLETION_BUCKETS[..],
        ] {
            for i in 1..buckets.len() {
                assert!(buckets[i] > buckets[i - 1]);
            }
        }
    }
}
