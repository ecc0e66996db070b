//! 디스패처: 스캔 하나를 적용 가능한 모든 프로바이더에 보냅니다.
//!
//! # 흐름
//!
//! ```text
//! dispatch(scan_id)
//!   ├─ pending -> running (check-and-set)
//!   ├─ 프로바이더별 작업 (동시 실행, 세마포어로 제한)
//!   │    ├─ 설정 누락      → degraded (브레이커 기록 없음)
//!   │    ├─ 서킷 차단      → failed "circuit open"
//!   │    ├─ Sync 호출      → 발견 항목 저장 → reported / failed
//!   │    └─ Async 접수     → pending{ticket}
//!   ├─ 대기 플래그가 있으면 연속 추적기에 등록
//!   └─ 상태 확정 (processing 또는 종료 상태)
//! ```
//!
//! 프로바이더 에러는 디스패치 결과로만 기록되고 호출자에게 전파되지 않습니다.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use scanrelay_core::error::{ProviderError, StoreError};
use scanrelay_core::event::{STAGE_DISPATCH, STAGE_LIFECYCLE, ScanEvent};
use scanrelay_core::metrics as m;
use scanrelay_core::types::{
    Capability, DispatchOutcome, ProviderDispatch, ProviderId, ScanId, ScanStatus, Target,
};
use scanrelay_store::JobStore;

use crate::config::DispatcherSettings;
use crate::context::DispatchContext;
use crate::continuation::ContinuationTracker;
use crate::error::DispatchError;
use crate::provider::{ProviderAdapter, SyncResponse};

/// 서킷 차단으로 건너뛴 디스패치의 사유
pub const REASON_CIRCUIT_OPEN: &str = "circuit open";

// ─── 디스패치 결과 ───────────────────────────────────────────────────

/// 프로바이더 호출 한 건의 처리 결과
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "disposition", rename_all = "snake_case")]
pub enum CallDisposition {
    /// 서킷이 열려 있어 호출하지 않음
    SkippedIneligible,
    /// 자격 증명 / 엔드포인트 누락으로 빈 결과 처리
    SkippedUnconfigured { reason: String },
    /// 동기 호출 완료
    Completed { findings: usize },
    /// 호출 실패
    Failed { reason: String },
    /// 제한 시간 초과
    TimedOut,
    /// 비동기 접수 완료
    Acknowledged { ticket: String },
}

impl CallDisposition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SkippedIneligible => "skipped_ineligible",
            Self::SkippedUnconfigured { .. } => "skipped_unconfigured",
            Self::Completed { .. } => "completed",
            Self::Failed { .. } => "failed",
            Self::TimedOut => "timed_out",
            Self::Acknowledged { .. } => "acknowledged",
        }
    }
}

/// 프로바이더 호출 기록
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderCall {
    pub provider: ProviderId,
    pub capability: Capability,
    #[serde(flatten)]
    pub disposition: CallDisposition,
    /// 실제로 호출한 경우의 지연 시간
    pub latency_ms: Option<u64>,
}

/// 디스패치 보고서
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DispatchReport {
    pub scan_id: ScanId,
    /// 프로바이더 ID 순
    pub calls: Vec<ProviderCall>,
    /// 디스패치 직후의 스캔 상태
    pub status: ScanStatus,
}

impl DispatchReport {
    /// 처리 결과별 호출 수
    pub fn count(&self, disposition: &str) -> usize {
        self.calls
            .iter()
            .filter(|c| c.disposition.as_str() == disposition)
            .count()
    }
}

// ─── Dispatcher ──────────────────────────────────────────────────────

/// 프로바이더 디스패처
pub struct Dispatcher<S: JobStore> {
    ctx: DispatchContext<S>,
    settings: Arc<DispatcherSettings>,
    tracker: Arc<ContinuationTracker<S>>,
    permits: Arc<Semaphore>,
}

impl<S: JobStore> Dispatcher<S> {
    pub fn new(
        ctx: DispatchContext<S>,
        settings: DispatcherSettings,
        tracker: Arc<ContinuationTracker<S>>,
    ) -> Self {
        let permits = Arc::new(Semaphore::new(settings.max_concurrent_calls.max(1)));
        Self {
            ctx,
            settings: Arc::new(settings),
            tracker,
            permits,
        }
    }

    pub fn context(&self) -> &DispatchContext<S> {
        &self.ctx
    }

    pub fn tracker(&self) -> &Arc<ContinuationTracker<S>> {
        &self.tracker
    }

    /// 스캔을 디스패치합니다.
    ///
    /// 스캔이 이미 종료되었으면 `ScanTerminal`, 다른 디스패치가 먼저 시작했으면
    /// `AlreadyDispatched`를 반환합니다.
    pub async fn dispatch(&self, scan_id: ScanId) -> Result<DispatchReport, DispatchError> {
        let scan = self.ctx.store.get(scan_id).await?;
        if scan.is_terminal() {
            return Err(DispatchError::ScanTerminal {
                scan_id: scan_id.to_string(),
                status: scan.status.to_string(),
            });
        }

        let now = self.ctx.clock.now();
        match self
            .ctx
            .store
            .transition(scan_id, ScanStatus::Pending, ScanStatus::Running, None, now)
            .await
        {
            Ok(_) => {}
            Err(e) if e.is_conflict() => {
                let current = self.ctx.store.get(scan_id).await?;
                return Err(if current.is_terminal() {
                    DispatchError::ScanTerminal {
                        scan_id: scan_id.to_string(),
                        status: current.status.to_string(),
                    }
                } else {
                    DispatchError::AlreadyDispatched {
                        scan_id: scan_id.to_string(),
                        status: current.status.to_string(),
                    }
                });
            }
            Err(e) => return Err(e.into()),
        }
        self.ctx.events.append(
            ScanEvent::new(STAGE_LIFECYCLE, ScanStatus::Running.as_str(), now)
                .scan(scan_id)
                .meta("from", ScanStatus::Pending.as_str()),
        );

        let adapters: Vec<ProviderAdapter> = self
            .ctx
            .registry
            .applicable(scan.target.kind)
            .filter(|adapter| self.settings.is_enabled(adapter.id()))
            .cloned()
            .collect();
        info!(
            scan_id = %scan_id,
            target_kind = %scan.target.kind.as_str(),
            providers = adapters.len(),
            "dispatching scan"
        );

        let mut tasks = JoinSet::new();
        for adapter in adapters {
            let call = ProviderTask {
                ctx: self.ctx.clone(),
                settings: Arc::clone(&self.settings),
                permits: Arc::clone(&self.permits),
                scan_id,
                target: scan.target.clone(),
            };
            tasks.spawn(call.run(adapter));
        }

        let mut calls = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(call)) => calls.push(call),
                Ok(Err(e)) => {
                    warn!(scan_id = %scan_id, error = %e, "provider dispatch could not be recorded")
                }
                Err(e) => error!(scan_id = %scan_id, error = %e, "provider task panicked"),
            }
        }
        calls.sort_by(|a, b| a.provider.cmp(&b.provider));

        let acknowledged = calls
            .iter()
            .any(|c| matches!(c.disposition, CallDisposition::Acknowledged { .. }));
        if acknowledged {
            if let Err(e) = self.tracker.track(scan_id) {
                // 연속 추적기가 멈춰 있으면 정리 작업이 대기 플래그를 해제합니다.
                warn!(scan_id = %scan_id, error = %e, "scan not tracked for async results");
            }
        }

        let scan = self.ctx.finalizer().finalize(scan_id).await?;
        debug!(scan_id = %scan_id, status = %scan.status, calls = calls.len(), "dispatch finished");
        Ok(DispatchReport {
            scan_id,
            calls,
            status: scan.status,
        })
    }
}

// ─── 프로바이더 작업 ─────────────────────────────────────────────────

/// 프로바이더 하나에 대한 호출 작업
struct ProviderTask<S: JobStore> {
    ctx: DispatchContext<S>,
    settings: Arc<DispatcherSettings>,
    permits: Arc<Semaphore>,
    scan_id: ScanId,
    target: Target,
}

impl<S: JobStore> ProviderTask<S> {
    async fn run(self, adapter: ProviderAdapter) -> Result<ProviderCall, StoreError> {
        let provider = adapter.id().clone();
        let capability = adapter.capability();
        let now = self.ctx.clock.now();

        self.ctx
            .store
            .record_dispatch(
                self.scan_id,
                ProviderDispatch::new(provider.clone(), capability, now),
            )
            .await?;

        if let Some(missing) = self.settings.missing_configuration(&provider) {
            let reason = format!("missing configuration: {missing}");
            warn!(scan_id = %self.scan_id, provider = %provider, %reason, "provider degraded");
            self.skip(&provider, "unconfigured", DispatchOutcome::Degraded {
                reason: reason.clone(),
            })
            .await?;
            return Ok(self.call(provider, capability, CallDisposition::SkippedUnconfigured { reason }, None));
        }

        if !self.ctx.breaker.is_eligible(&provider) {
            info!(scan_id = %self.scan_id, provider = %provider, "circuit open, provider skipped");
            self.skip(&provider, "circuit_open", DispatchOutcome::Failed {
                reason: REASON_CIRCUIT_OPEN.to_owned(),
            })
            .await?;
            return Ok(self.call(provider, capability, CallDisposition::SkippedIneligible, None));
        }

        // 세마포어는 닫지 않으므로 실패하지 않습니다.
        let _permit = self.permits.acquire().await.ok();
        let timeout = self.settings.timeout_for(&provider);
        let started = Instant::now();

        let disposition = match &adapter {
            ProviderAdapter::Sync(p) => {
                let result = with_timeout(timeout, p.call(&self.target, timeout)).await;
                let latency = started.elapsed();
                match result {
                    Ok(response) => {
                        let cost = self.cost(&provider, response.cost);
                        self.ctx.breaker.record_outcome(&provider, true);
                        self.ctx.observe_call(&provider, true, latency, cost);
                        self.ingest(&provider, response).await?
                    }
                    Err(e) => self.fail(&provider, e, latency).await?,
                }
            }
            ProviderAdapter::Async(p) => {
                let result = with_timeout(timeout, p.submit(&self.target, timeout)).await;
                let latency = started.elapsed();
                match result {
                    Ok(ack) => {
                        let cost = self.cost(&provider, ack.cost);
                        self.ctx.breaker.record_outcome(&provider, true);
                        self.ctx.observe_call(&provider, true, latency, cost);
                        self.acknowledge(&provider, ack.ticket).await?
                    }
                    Err(e) => self.fail(&provider, e, latency).await?,
                }
            }
        };

        let latency_ms = Some(started.elapsed().as_millis() as u64);
        Ok(self.call(provider, capability, disposition, latency_ms))
    }

    fn call(
        &self,
        provider: ProviderId,
        capability: Capability,
        disposition: CallDisposition,
        latency_ms: Option<u64>,
    ) -> ProviderCall {
        ProviderCall {
            provider,
            capability,
            disposition,
            latency_ms,
        }
    }

    fn cost(&self, provider: &ProviderId, reported: Option<f64>) -> f64 {
        reported.unwrap_or_else(|| self.settings.cost_per_call(provider))
    }

    /// 호출하지 않은 디스패치를 확정합니다.
    async fn skip(
        &self,
        provider: &ProviderId,
        reason_label: &'static str,
        outcome: DispatchOutcome,
    ) -> Result<(), StoreError> {
        metrics::counter!(
            m::PROVIDER_SKIPPED_TOTAL,
            m::LABEL_PROVIDER => provider.to_string(),
            m::LABEL_REASON => reason_label
        )
        .increment(1);

        let now = self.ctx.clock.now();
        let message = match &outcome {
            DispatchOutcome::Failed { reason } | DispatchOutcome::Degraded { reason } => {
                reason.clone()
            }
            other => other.as_str().to_owned(),
        };
        self.ctx.events.append(
            ScanEvent::new(STAGE_DISPATCH, "skipped", now)
                .scan(self.scan_id)
                .provider(provider)
                .error(message),
        );
        self.ctx
            .store
            .resolve_dispatch(self.scan_id, provider, outcome, now)
            .await?;
        Ok(())
    }

    /// 동기 응답의 발견 항목을 저장하고 디스패치를 확정합니다.
    async fn ingest(
        &self,
        provider: &ProviderId,
        response: SyncResponse,
    ) -> Result<CallDisposition, StoreError> {
        let now = self.ctx.clock.now();
        let findings = self
            .ctx
            .findings(self.scan_id, provider, response.findings, now);

        let stored = match self.ctx.store.add_findings(self.scan_id, findings.clone()).await {
            Ok(n) => n,
            Err(StoreError::Terminal { .. }) => {
                // 호출 도중 정리 작업이 스캔을 닫은 경우
                self.ctx
                    .store
                    .attach_late_findings(self.scan_id, provider, findings)
                    .await?
            }
            Err(e) => return Err(e),
        };

        self.ctx
            .store
            .resolve_dispatch(
                self.scan_id,
                provider,
                DispatchOutcome::Reported { findings: stored },
                now,
            )
            .await?;
        self.ctx.events.append(
            ScanEvent::new(STAGE_DISPATCH, "reported", now)
                .scan(self.scan_id)
                .provider(provider)
                .meta("findings", stored as u64),
        );
        debug!(scan_id = %self.scan_id, provider = %provider, findings = stored, "provider reported");
        Ok(CallDisposition::Completed { findings: stored })
    }

    /// 비동기 접수를 대기 상태로 기록합니다.
    async fn acknowledge(
        &self,
        provider: &ProviderId,
        ticket: String,
    ) -> Result<CallDisposition, StoreError> {
        let now = self.ctx.clock.now();
        match self
            .ctx
            .store
            .mark_pending(self.scan_id, provider, ticket.clone(), now)
            .await
        {
            Ok(()) => {}
            Err(StoreError::Terminal { status, .. }) => {
                warn!(
                    scan_id = %self.scan_id,
                    provider = %provider,
                    %status,
                    "scan closed before async acknowledgement was recorded"
                );
            }
            Err(e) => return Err(e),
        }
        self.ctx.events.append(
            ScanEvent::new(STAGE_DISPATCH, "pending", now)
                .scan(self.scan_id)
                .provider(provider)
                .meta("ticket", ticket.as_str()),
        );
        debug!(scan_id = %self.scan_id, provider = %provider, %ticket, "async provider acknowledged");
        Ok(CallDisposition::Acknowledged { ticket })
    }

    /// 호출 실패를 기록합니다.
    async fn fail(
        &self,
        provider: &ProviderId,
        error: ProviderError,
        latency: Duration,
    ) -> Result<CallDisposition, StoreError> {
        let now = self.ctx.clock.now();

        if let ProviderError::Configuration(reason) = &error {
            warn!(scan_id = %self.scan_id, provider = %provider, %reason, "provider reported missing configuration");
            // 설정 오류는 판정 없이 시험 호출 슬롯만 돌려줍니다.
            self.ctx.breaker.release_trial_slot(provider);
            let reason = error.to_string();
            self.ctx
                .store
                .resolve_dispatch(
                    self.scan_id,
                    provider,
                    DispatchOutcome::Degraded {
                        reason: reason.clone(),
                    },
                    now,
                )
                .await?;
            self.ctx.events.append(
                ScanEvent::new(STAGE_DISPATCH, "degraded", now)
                    .scan(self.scan_id)
                    .provider(provider)
                    .error(reason.as_str()),
            );
            return Ok(CallDisposition::SkippedUnconfigured { reason });
        }

        warn!(scan_id = %self.scan_id, provider = %provider, error = %error, "provider call failed");
        self.ctx.breaker.record_outcome(provider, false);
        self.ctx
            .observe_call(provider, false, latency, self.settings.cost_per_call(provider));

        let reason = error.to_string();
        self.ctx
            .store
            .resolve_dispatch(
                self.scan_id,
                provider,
                DispatchOutcome::Failed {
                    reason: reason.clone(),
                },
                now,
            )
            .await?;
        self.ctx.events.append(
            ScanEvent::new(STAGE_DISPATCH, "failed", now)
                .scan(self.scan_id)
                .provider(provider)
                .error(reason.as_str()),
        );

        Ok(match error {
            ProviderError::Timeout { .. } => CallDisposition::TimedOut,
            _ => CallDisposition::Failed { reason },
        })
    }
}

/// 프로바이더 future에 제한 시간을 적용합니다.
pub(crate) async fn with_timeout<T>(
    timeout: Duration,
    call: impl Future<Output = Result<T, ProviderError>>,
) -> Result<T, ProviderError> {
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(ProviderError::Timeout {
            timeout_ms: timeout.as_millis() as u64,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disposition_labels_are_stable() {
        assert_eq!(CallDisposition::SkippedIneligible.as_str(), "skipped_ineligible");
        assert_eq!(CallDisposition::TimedOut.as_str(), "timed_out");
        assert_eq!(
            CallDisposition::Acknowledged {
                ticket: "t".to_owned()
            }
            .as_str(),
            "acknowledged"
        );
    }

    #[test]
    fn provider_call_serializes_flat() {
        let call = ProviderCall {
            provider: "hibp".into(),
            capability: Capability::Synchronous,
            disposition: CallDisposition::Completed { findings: 3 },
            latency_ms: Some(12),
        };
        let json = serde_json::to_value(&call).unwrap();
        assert_eq!(json["disposition"], "completed");
        assert_eq!(json["findings"], 3);
        assert_eq!(json["provider"], "hibp");
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_maps_to_provider_timeout() {
        let slow = async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, ProviderError>(())
        };
        let err = with_timeout(Duration::from_millis(100), slow).await.unwrap_err();
        assert_eq!(err, ProviderError::Timeout { timeout_ms: 100 });
    }
}
