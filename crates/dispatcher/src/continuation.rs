//! 비동기 연속 추적기
//!
//! 비동기 프로바이더는 접수 티켓만 돌려주므로 결과는 나중에 두 경로로 들어옵니다.
//!
//! - 폴링: 스캔마다 취소 가능한 tokio 작업이 `poll_interval`마다 [`ContinuationTracker::poll`] 호출
//! - 푸시: 웹훅 등 외부 신호가 [`ContinuationTracker::deliver`] 호출
//!
//! 두 경로는 같은 수집 함수를 공유합니다. 스캔이 이미 종료된 뒤 도착한 결과도
//! 발견 항목(`late`)으로 저장하고 플래그를 확정하지만 상태는 다시 열지 않습니다.
//!
//! 폴링 작업은 대기 플래그가 없어지거나, 스캔이 종료되거나, `cancel`이
//! 호출되거나, 추적기가 정지하면 끝납니다.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use scanrelay_core::error::{PipelineError, ProviderError, ScanrelayError, StoreError};
use scanrelay_core::event::{STAGE_CONTINUATION, ScanEvent};
use scanrelay_core::metrics as m;
use scanrelay_core::pipeline::{HealthStatus, Pipeline};
use scanrelay_core::types::{DispatchOutcome, DispatchState, ProviderId, ScanId};
use scanrelay_store::JobStore;

use crate::config::TrackerSettings;
use crate::context::DispatchContext;
use crate::dispatcher::with_timeout;
use crate::error::DispatchError;
use crate::finalize::ScanFinalizer;
use crate::provider::PollResponse;

/// 추적 중인 스캔의 폴링 작업
struct TrackedScan {
    generation: u64,
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// 비동기 연속 추적기
///
/// `Arc`로 공유되며 폴링 작업은 `Weak` 참조만 보유합니다.
pub struct ContinuationTracker<S: JobStore> {
    ctx: DispatchContext<S>,
    finalizer: ScanFinalizer<S>,
    settings: TrackerSettings,
    root: Mutex<CancellationToken>,
    tasks: Mutex<HashMap<ScanId, TrackedScan>>,
    running: AtomicBool,
    generation: AtomicU64,
    polls: AtomicU64,
    completions: AtomicU64,
}

impl<S: JobStore> ContinuationTracker<S> {
    /// 정지 상태의 추적기를 생성합니다. [`start`](Self::start) 전에는 `track`이 거부됩니다.
    pub fn new(ctx: DispatchContext<S>, settings: TrackerSettings) -> Self {
        let finalizer = ctx.finalizer();
        Self {
            ctx,
            finalizer,
            settings,
            root: Mutex::new(CancellationToken::new()),
            tasks: Mutex::new(HashMap::new()),
            running: AtomicBool::new(false),
            generation: AtomicU64::new(0),
            polls: AtomicU64::new(0),
            completions: AtomicU64::new(0),
        }
    }

    pub fn settings(&self) -> &TrackerSettings {
        &self.settings
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// 누적 폴링 횟수
    pub fn polls(&self) -> u64 {
        self.polls.load(Ordering::Relaxed)
    }

    /// 누적 결과 수집 횟수 (폴링 + 푸시)
    pub fn completions(&self) -> u64 {
        self.completions.load(Ordering::Relaxed)
    }

    /// 폴링 작업이 있는 스캔 수
    pub fn tracked_count(&self) -> usize {
        self.tasks.lock().map(|tasks| tasks.len()).unwrap_or(0)
    }

    pub fn is_tracked(&self, scan_id: ScanId) -> bool {
        self.tasks
            .lock()
            .map(|tasks| tasks.contains_key(&scan_id))
            .unwrap_or(false)
    }

    // ─── 생명주기 ────────────────────────────────────────────────────

    /// 추적을 시작합니다.
    pub fn start(&self) -> Result<(), PipelineError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(PipelineError::AlreadyRunning);
        }
        if let Ok(mut root) = self.root.lock() {
            *root = CancellationToken::new();
        }
        info!(
            poll_interval_secs = self.settings.poll_interval.as_secs(),
            "continuation tracker started"
        );
        Ok(())
    }

    /// 대기 플래그가 남아 있는 미종료 스캔을 다시 추적합니다.
    ///
    /// 재시작 후 호출하면 이전 프로세스에서 접수된 비동기 작업을 이어서 폴링합니다.
    pub async fn resume(self: &Arc<Self>) -> Result<usize, DispatchError> {
        let scans = self.ctx.store.list_with_pending().await?;
        let mut resumed = 0;
        for scan in scans.into_iter().filter(|s| !s.is_terminal()) {
            self.track(scan.id)?;
            resumed += 1;
        }
        if resumed > 0 {
            info!(scans = resumed, "resumed continuation polling");
        }
        Ok(resumed)
    }

    /// 모든 폴링 작업을 취소하고 종료를 기다립니다.
    pub async fn shutdown(&self) {
        self.running.store(false, Ordering::SeqCst);
        if let Ok(root) = self.root.lock() {
            root.cancel();
        }

        let drained: Vec<TrackedScan> = match self.tasks.lock() {
            Ok(mut tasks) => tasks.drain().map(|(_, t)| t).collect(),
            Err(_) => Vec::new(),
        };
        let count = drained.len();
        for tracked in drained {
            tracked.token.cancel();
            if let Err(e) = tracked.handle.await {
                if !e.is_cancelled() {
                    warn!(error = %e, "continuation task ended abnormally");
                }
            }
        }
        metrics::gauge!(m::CONTINUATIONS_ACTIVE).set(0.0);
        info!(tasks = count, "continuation tracker stopped");
    }

    // ─── 추적 등록 / 취소 ────────────────────────────────────────────

    /// 스캔의 폴링 작업을 시작합니다. 이미 추적 중이면 아무것도 하지 않습니다.
    pub fn track(self: &Arc<Self>, scan_id: ScanId) -> Result<(), DispatchError> {
        if !self.is_running() {
            return Err(DispatchError::TrackerStopped);
        }
        let root = self
            .root
            .lock()
            .map(|root| root.clone())
            .map_err(|_| DispatchError::TrackerStopped)?;

        let mut tasks = self
            .tasks
            .lock()
            .map_err(|_| DispatchError::TrackerStopped)?;
        if tasks.contains_key(&scan_id) {
            return Ok(());
        }

        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let token = root.child_token();
        let handle = tokio::spawn(poll_loop(
            Arc::downgrade(self),
            scan_id,
            generation,
            token.clone(),
            self.settings.poll_interval,
        ));
        tasks.insert(
            scan_id,
            TrackedScan {
                generation,
                token,
                handle,
            },
        );
        metrics::gauge!(m::CONTINUATIONS_ACTIVE).set(tasks.len() as f64);
        debug!(scan_id = %scan_id, "continuation tracking started");
        Ok(())
    }

    /// 스캔의 폴링 작업을 취소합니다. 추적 중이었으면 `true`.
    pub fn cancel(&self, scan_id: ScanId) -> bool {
        let removed = match self.tasks.lock() {
            Ok(mut tasks) => {
                let removed = tasks.remove(&scan_id);
                metrics::gauge!(m::CONTINUATIONS_ACTIVE).set(tasks.len() as f64);
                removed
            }
            Err(_) => None,
        };
        match removed {
            Some(tracked) => {
                tracked.token.cancel();
                debug!(scan_id = %scan_id, "continuation tracking cancelled");
                true
            }
            None => false,
        }
    }

    /// 작업 종료 시 자신의 항목만 제거합니다.
    fn forget(&self, scan_id: ScanId, generation: u64) {
        if let Ok(mut tasks) = self.tasks.lock() {
            if tasks
                .get(&scan_id)
                .is_some_and(|t| t.generation == generation)
            {
                tasks.remove(&scan_id);
            }
            metrics::gauge!(m::CONTINUATIONS_ACTIVE).set(tasks.len() as f64);
        }
    }

    // ─── 폴링 / 수집 ─────────────────────────────────────────────────

    /// 스캔의 대기 중인 비동기 디스패치를 한 번 폴링합니다.
    ///
    /// 스캔이 미종료 상태이고 대기 플래그가 남아 있으면 `true`를 반환합니다.
    pub async fn poll(&self, scan_id: ScanId) -> Result<bool, DispatchError> {
        let scan = self.ctx.store.get(scan_id).await?;
        let pending: Vec<(ProviderId, String)> = scan
            .pending_dispatches()
            .filter_map(|d| d.ticket().map(|t| (d.provider.clone(), t.to_owned())))
            .collect();

        for (provider, ticket) in pending {
            let Some(adapter) = self
                .ctx
                .registry
                .get(&provider)
                .and_then(|a| a.as_async())
                .cloned()
            else {
                warn!(scan_id = %scan_id, provider = %provider, "pending flag for unregistered async provider");
                continue;
            };

            self.polls.fetch_add(1, Ordering::Relaxed);
            let timeout = self.settings.poll_timeout;
            let response = with_timeout(timeout, adapter.poll(&ticket, timeout)).await;
            let result = match &response {
                Ok(PollResponse::Pending) => "pending",
                Ok(PollResponse::Completed { .. }) => "completed",
                Ok(PollResponse::Failed { .. }) => "failed",
                Err(_) => "error",
            };
            metrics::counter!(
                m::CONTINUATION_POLLS_TOTAL,
                m::LABEL_PROVIDER => provider.to_string(),
                m::LABEL_RESULT => result
            )
            .increment(1);

            match response {
                Ok(PollResponse::Pending) => {
                    debug!(scan_id = %scan_id, provider = %provider, "async result still pending");
                }
                Ok(response) => {
                    self.ingest(scan_id, &provider, response).await?;
                }
                Err(e) => self.poll_failed(scan_id, &provider, &e),
            }
        }

        let scan = self.finalizer.finalize(scan_id).await?;
        Ok(!scan.is_terminal() && scan.has_pending())
    }

    /// 추적 중인 모든 스캔을 한 번씩 폴링하고 폴링한 스캔 수를 반환합니다.
    pub async fn poll_all(&self) -> usize {
        let ids: Vec<ScanId> = match self.tasks.lock() {
            Ok(tasks) => tasks.keys().copied().collect(),
            Err(_) => return 0,
        };
        let mut polled = 0;
        for scan_id in ids {
            match self.poll(scan_id).await {
                Ok(still_pending) => {
                    polled += 1;
                    if !still_pending {
                        self.cancel(scan_id);
                    }
                }
                Err(e) => warn!(scan_id = %scan_id, error = %e, "continuation poll failed"),
            }
        }
        polled
    }

    /// 외부에서 전달된 비동기 결과를 수집합니다 (웹훅 콜백 등).
    ///
    /// 결과가 반영되었으면 `true`, 이미 보고된 결과의 중복 전달이거나
    /// `Pending`이면 `false`를 반환합니다.
    pub async fn deliver(
        &self,
        scan_id: ScanId,
        provider: &ProviderId,
        response: PollResponse,
    ) -> Result<bool, DispatchError> {
        if self
            .ctx
            .registry
            .get(provider)
            .and_then(|a| a.as_async())
            .is_none()
        {
            return Err(DispatchError::UnknownProvider(provider.to_string()));
        }
        if matches!(response, PollResponse::Pending) {
            return Ok(false);
        }

        let applied = self.ingest(scan_id, provider, response).await?;
        let scan = self.finalizer.finalize(scan_id).await?;
        if scan.is_terminal() || !scan.has_pending() {
            self.cancel(scan_id);
        }
        Ok(applied)
    }

    /// 완료 / 실패 응답을 반영합니다.
    async fn ingest(
        &self,
        scan_id: ScanId,
        provider: &ProviderId,
        response: PollResponse,
    ) -> Result<bool, DispatchError> {
        let scan = self.ctx.store.get(scan_id).await?;
        let Some(dispatch) = scan.dispatches.get(provider) else {
            return Err(StoreError::UnknownDispatch {
                scan_id: scan_id.to_string(),
                provider: provider.to_string(),
            }
            .into());
        };
        // 보고 완료된 기록에 대한 중복 전달은 무시합니다.
        if let DispatchState::Resolved {
            outcome: DispatchOutcome::Reported { .. },
            ..
        } = &dispatch.state
        {
            debug!(scan_id = %scan_id, provider = %provider, "duplicate async result ignored");
            return Ok(false);
        }

        let now = self.ctx.clock.now();
        let late = scan.is_terminal();
        match response {
            PollResponse::Pending => return Ok(false),
            PollResponse::Completed { findings, cost } => {
                let findings = self.ctx.findings(scan_id, provider, findings, now);
                let outcome = DispatchOutcome::Reported {
                    findings: findings.len(),
                };
                // 정리 작업이 강제 해제한 기록은 첫 결과 한 번만 `Reported`로 교체됩니다.
                let won = self
                    .ctx
                    .store
                    .resolve_dispatch(scan_id, provider, outcome.clone(), now)
                    .await?
                    || self
                        .ctx
                        .store
                        .reclaim_dispatch(scan_id, provider, outcome, now)
                        .await?;
                if !won {
                    debug!(scan_id = %scan_id, provider = %provider, "async result already ingested");
                    return Ok(false);
                }
                let added = self
                    .ctx
                    .store
                    .attach_late_findings(scan_id, provider, findings)
                    .await?;
                self.ctx.breaker.record_background_outcome(provider, true);
                if let Some(cost) = cost {
                    self.ctx.record_late_cost(provider, cost);
                }
                self.ctx.events.append(
                    ScanEvent::new(STAGE_CONTINUATION, "completed", now)
                        .scan(scan_id)
                        .provider(provider)
                        .meta("findings", added as u64)
                        .meta("late", late),
                );
                if late {
                    info!(
                        scan_id = %scan_id,
                        provider = %provider,
                        findings = added,
                        status = %scan.status,
                        "late async result attached to closed scan"
                    );
                } else {
                    debug!(scan_id = %scan_id, provider = %provider, findings = added, "async result ingested");
                }
            }
            PollResponse::Failed { reason } => {
                let won = self
                    .ctx
                    .store
                    .resolve_dispatch(
                        scan_id,
                        provider,
                        DispatchOutcome::Failed {
                            reason: reason.clone(),
                        },
                        now,
                    )
                    .await?;
                if !won {
                    debug!(scan_id = %scan_id, provider = %provider, "async failure for resolved flag ignored");
                    return Ok(false);
                }
                self.ctx.breaker.record_background_outcome(provider, false);
                self.ctx.events.append(
                    ScanEvent::new(STAGE_CONTINUATION, "failed", now)
                        .scan(scan_id)
                        .provider(provider)
                        .error(reason.as_str())
                        .meta("late", late),
                );
                warn!(scan_id = %scan_id, provider = %provider, %reason, "async provider reported failure");
            }
        }
        self.completions.fetch_add(1, Ordering::Relaxed);
        Ok(true)
    }

    fn poll_failed(&self, scan_id: ScanId, provider: &ProviderId, error: &ProviderError) {
        warn!(scan_id = %scan_id, provider = %provider, error = %error, "async poll failed");
        if error.counts_as_failure() {
            self.ctx.breaker.record_background_outcome(provider, false);
        }
    }
}

/// 스캔 하나의 폴링 루프
async fn poll_loop<S: JobStore>(
    tracker: Weak<ContinuationTracker<S>>,
    scan_id: ScanId,
    generation: u64,
    token: CancellationToken,
    interval: std::time::Duration,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // 첫 tick은 즉시 완료되므로 건너뜁니다.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = token.cancelled() => {
                debug!(scan_id = %scan_id, "continuation task cancelled");
                return;
            }
            _ = ticker.tick() => {
                let Some(tracker) = tracker.upgrade() else {
                    return;
                };
                let keep_polling = match tracker.poll(scan_id).await {
                    Ok(still_pending) => still_pending,
                    Err(DispatchError::Store(StoreError::NotFound(_))) => false,
                    Err(e) => {
                        warn!(scan_id = %scan_id, error = %e, "continuation poll failed");
                        true
                    }
                };
                if !keep_polling {
                    debug!(scan_id = %scan_id, "continuation finished");
                    tracker.forget(scan_id, generation);
                    return;
                }
            }
        }
    }
}

// ─── Pipeline ────────────────────────────────────────────────────────

/// 연속 추적기 생명주기 래퍼
///
/// 디스패처와 추적기를 공유하면서 daemon의 컴포넌트 레지스트리에 등록하기 위해 사용합니다.
pub struct ContinuationService<S: JobStore> {
    tracker: Arc<ContinuationTracker<S>>,
}

impl<S: JobStore> ContinuationService<S> {
    pub fn new(tracker: Arc<ContinuationTracker<S>>) -> Self {
        Self { tracker }
    }

    pub fn tracker(&self) -> &Arc<ContinuationTracker<S>> {
        &self.tracker
    }
}

impl<S: JobStore> Pipeline for ContinuationService<S> {
    async fn start(&mut self) -> Result<(), ScanrelayError> {
        self.tracker.start()?;
        if let Err(e) = self.tracker.resume().await {
            warn!(error = %e, "failed to resume pending continuations");
        }
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), ScanrelayError> {
        if !self.tracker.is_running() {
            return Err(PipelineError::NotRunning.into());
        }
        self.tracker.shutdown().await;
        Ok(())
    }

    async fn health_check(&self) -> HealthStatus {
        if self.tracker.is_running() {
            HealthStatus::Healthy
        } else {
            HealthStatus::Unhealthy("continuation tracker stopped".to_owned())
        }
    }
}
