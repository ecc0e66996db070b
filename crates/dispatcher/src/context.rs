//! 디스패처와 연속 추적기가 공유하는 실행 컨텍스트

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::warn;

use scanrelay_breaker::CircuitBreaker;
use scanrelay_core::clock::Clock;
use scanrelay_core::event::EventLog;
use scanrelay_core::metrics as m;
use scanrelay_core::types::{BudgetPeriod, Finding, FindingDraft, ProviderId, ScanId};
use scanrelay_ledger::{
    CallSample, CostLedger, SLO_PROVIDER_CALL_LATENCY_MS, SLO_PROVIDER_CALL_SUCCESS, SloMonitor,
};
use scanrelay_store::JobStore;

use crate::finalize::ScanFinalizer;
use crate::provider::ProviderRegistry;

/// 공유 의존성 묶음
///
/// 모든 필드가 `Arc`이므로 복제 비용이 작습니다.
pub struct DispatchContext<S: JobStore> {
    pub store: Arc<S>,
    pub registry: Arc<ProviderRegistry>,
    pub breaker: Arc<CircuitBreaker>,
    pub ledger: Arc<CostLedger>,
    pub slo: Arc<SloMonitor>,
    pub clock: Arc<dyn Clock>,
    pub events: Arc<dyn EventLog>,
}

impl<S: JobStore> Clone for DispatchContext<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            registry: Arc::clone(&self.registry),
            breaker: Arc::clone(&self.breaker),
            ledger: Arc::clone(&self.ledger),
            slo: Arc::clone(&self.slo),
            clock: Arc::clone(&self.clock),
            events: Arc::clone(&self.events),
        }
    }
}

impl<S: JobStore> DispatchContext<S> {
    /// 상태 확정기
    pub fn finalizer(&self) -> ScanFinalizer<S> {
        ScanFinalizer::new(
            Arc::clone(&self.store),
            Arc::clone(&self.clock),
            Arc::clone(&self.events),
            Arc::clone(&self.slo),
        )
    }

    /// 프로바이더 초안을 발견 항목으로 변환합니다.
    pub(crate) fn findings(
        &self,
        scan_id: ScanId,
        provider: &ProviderId,
        drafts: Vec<FindingDraft>,
        now: DateTime<Utc>,
    ) -> Vec<Finding> {
        drafts
            .into_iter()
            .map(|draft| Finding::from_draft(scan_id, provider.clone(), draft, now))
            .collect()
    }

    /// 실제로 수행된 프로바이더 호출 한 건을 원장, SLO, 메트릭에 기록합니다.
    ///
    /// 원장 기록 실패는 로그만 남기고 호출 경로를 막지 않습니다.
    pub(crate) fn observe_call(
        &self,
        provider: &ProviderId,
        success: bool,
        latency: Duration,
        cost: f64,
    ) {
        let sample = CallSample {
            provider: provider.clone(),
            success,
            latency,
            cost,
            at: self.clock.now(),
        };
        if let Err(e) = self.ledger.record_call(sample) {
            warn!(provider = %provider, error = %e, "ledger update skipped");
        }

        self.slo
            .observe(SLO_PROVIDER_CALL_LATENCY_MS, latency.as_millis() as f64);
        self.slo
            .observe(SLO_PROVIDER_CALL_SUCCESS, if success { 1.0 } else { 0.0 });

        let result = if success { "success" } else { "failure" };
        metrics::counter!(
            m::PROVIDER_CALLS_TOTAL,
            m::LABEL_PROVIDER => provider.to_string(),
            m::LABEL_RESULT => result
        )
        .increment(1);
        metrics::histogram!(m::PROVIDER_CALL_DURATION_SECONDS, m::LABEL_PROVIDER => provider.to_string())
            .record(latency.as_secs_f64());
    }

    /// 비동기 결과에 따라온 비용을 두 기간 모두에 반영합니다.
    pub(crate) fn record_late_cost(&self, provider: &ProviderId, cost: f64) {
        if cost <= 0.0 {
            return;
        }
        for period in [BudgetPeriod::Daily, BudgetPeriod::Monthly] {
            if let Err(e) = self.ledger.record_cost(provider, cost, period) {
                warn!(provider = %provider, error = %e, "ledger update skipped");
            }
        }
    }
}
