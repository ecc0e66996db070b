//! 정체된 스캔 스윕
//!
//! 한 번의 스윕은 두 단계로 진행됩니다.
//!
//! 1. `flag_max_age`보다 오래 대기 중인 비동기 플래그를 강제 해제 (종료된 스캔 포함)
//! 2. 종료되지 않은 스캔을 [`classify`]로 분류하여 종료 상태로 전이
//!
//! 모든 갱신은 관찰한 상태를 조건으로 하는 check-and-set입니다.
//! 경합에서 진 스캔은 `raced`로 집계되고 다음 스윕에서 다시 검사됩니다.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use scanrelay_core::clock::Clock;
use scanrelay_core::error::StoreError;
use scanrelay_core::event::{EventLog, STAGE_REMEDIATION, ScanEvent};
use scanrelay_core::metrics as m;
use scanrelay_core::types::{ProviderId, Scan, ScanId, ScanStatus};
use scanrelay_store::JobStore;

use crate::classify::{Verdict, classify};
use crate::config::RemediationSettings;
use crate::error::RemediationError;

/// 스윕 중 적용된 개별 조치
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum RemediationAction {
    /// 스캔을 종료 상태로 전이
    Finalized {
        scan_id: ScanId,
        from: ScanStatus,
        to: ScanStatus,
        reason: String,
        elapsed_secs: i64,
        findings: usize,
    },
    /// 오래된 비동기 대기 플래그 해제
    FlagCleared {
        scan_id: ScanId,
        provider: ProviderId,
        pending_secs: i64,
    },
}

impl RemediationAction {
    pub fn scan_id(&self) -> ScanId {
        match self {
            Self::Finalized { scan_id, .. } | Self::FlagCleared { scan_id, .. } => *scan_id,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Finalized { to, .. } => to.as_str(),
            Self::FlagCleared { .. } => "flag_cleared",
        }
    }
}

/// 스윕 결과
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub started_at: Option<DateTime<Utc>>,
    /// 분류를 위해 검사한 스캔 수
    pub examined: usize,
    /// 종료 상태로 전이된 스캔 수
    pub fixed: usize,
    /// 동시 갱신으로 건너뛴 수
    pub raced: usize,
    /// 갱신 실패 수
    pub failed: usize,
    /// 강제 해제된 대기 플래그 수
    pub flags_cleared: usize,
    pub actions: Vec<RemediationAction>,
}

impl SweepReport {
    /// 사람이 읽을 수 있는 요약
    pub fn summary(&self) -> String {
        format!(
            "fixed {} of {} stuck scans, cleared {} pending flags, {} raced, {} failed to update",
            self.fixed, self.examined, self.flags_cleared, self.raced, self.failed
        )
    }

    /// 아무 변경도 없었는지 여부
    pub fn is_noop(&self) -> bool {
        self.actions.is_empty()
    }
}

/// 정체된 스캔 정리기
pub struct StuckJobRemediator<S: JobStore> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    events: Arc<dyn EventLog>,
    settings: RemediationSettings,
    sweeps: Arc<AtomicU64>,
    last_report: Mutex<Option<SweepReport>>,
}

impl<S: JobStore> StuckJobRemediator<S> {
    pub fn new(
        store: Arc<S>,
        clock: Arc<dyn Clock>,
        events: Arc<dyn EventLog>,
        settings: RemediationSettings,
    ) -> Result<Self, RemediationError> {
        settings.validate()?;
        Ok(Self {
            store,
            clock,
            events,
            settings,
            sweeps: Arc::new(AtomicU64::new(0)),
            last_report: Mutex::new(None),
        })
    }

    pub fn settings(&self) -> &RemediationSettings {
        &self.settings
    }

    /// 지금까지 수행한 스윕 수
    pub fn sweep_count(&self) -> u64 {
        self.sweeps.load(Ordering::Relaxed)
    }

    /// 마지막 스윕 결과
    pub fn last_report(&self) -> Option<SweepReport> {
        self.last_report.lock().ok().and_then(|guard| guard.clone())
    }

    /// 현재 시계 기준으로 스윕합니다.
    pub async fn sweep_now(&self) -> Result<SweepReport, RemediationError> {
        self.sweep(self.clock.now()).await
    }

    /// `now` 기준으로 스윕합니다.
    ///
    /// 개별 스캔의 갱신 실패는 보고서에 집계되고, 스캔 목록을 읽지 못한 경우만
    /// 에러를 반환합니다.
    pub async fn sweep(&self, now: DateTime<Utc>) -> Result<SweepReport, RemediationError> {
        let mut report = SweepReport {
            started_at: Some(now),
            ..SweepReport::default()
        };

        self.clear_stale_flags(now, &mut report).await?;
        self.finalize_stuck(now, &mut report).await?;

        self.sweeps.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(m::REMEDIATION_SWEEPS_TOTAL).increment(1);

        if report.is_noop() && report.raced == 0 && report.failed == 0 {
            debug!(examined = report.examined, "remediation sweep found nothing to do");
        } else {
            info!(
                examined = report.examined,
                fixed = report.fixed,
                raced = report.raced,
                failed = report.failed,
                flags_cleared = report.flags_cleared,
                "{}",
                report.summary()
            );
        }

        if let Ok(mut last) = self.last_report.lock() {
            *last = Some(report.clone());
        }
        Ok(report)
    }

    // ─── 1단계: 대기 플래그 ──────────────────────────────────────────

    async fn clear_stale_flags(
        &self,
        now: DateTime<Utc>,
        report: &mut SweepReport,
    ) -> Result<(), RemediationError> {
        let scans = self.store.list_with_pending().await?;

        for scan in scans.iter().take(self.settings.batch_limit) {
            let stale: Vec<(ProviderId, DateTime<Utc>)> = scan
                .pending_dispatches()
                .filter_map(|d| d.pending_since().map(|since| (d.provider.clone(), since)))
                .filter(|(_, since)| now - *since > self.settings.flag_max_age)
                .collect();

            for (provider, since) in stale {
                let pending_secs = (now - since).num_seconds();
                let reason = format!("async result not received after {}m", pending_secs / 60);
                match self
                    .store
                    .force_clear_flag(scan.id, &provider, since, reason.clone(), now)
                    .await
                {
                    Ok(()) => {
                        self.events.append(
                            ScanEvent::new(STAGE_REMEDIATION, "flag_cleared", now)
                                .scan(scan.id)
                                .provider(&provider)
                                .meta("reason", reason.as_str())
                                .meta("pending_secs", pending_secs)
                                .meta("original_status", scan.status.as_str()),
                        );
                        metrics::counter!(m::REMEDIATION_FLAGS_CLEARED_TOTAL).increment(1);
                        info!(
                            scan_id = %scan.id,
                            provider = %provider,
                            pending_secs,
                            "stale async pending flag cleared"
                        );
                        report.flags_cleared += 1;
                        self.push_action(
                            report,
                            RemediationAction::FlagCleared {
                                scan_id: scan.id,
                                provider,
                                pending_secs,
                            },
                        );
                    }
                    Err(e) => self.record_failure(report, scan.id, &e),
                }
            }
        }
        Ok(())
    }

    // ─── 2단계: 정체된 스캔 ──────────────────────────────────────────

    async fn finalize_stuck(
        &self,
        now: DateTime<Utc>,
        report: &mut SweepReport,
    ) -> Result<(), RemediationError> {
        let scans = self.store.list_active(self.settings.batch_limit).await?;

        for scan in scans {
            report.examined += 1;

            let findings = match self.store.count_findings(scan.id).await {
                Ok(count) => count,
                Err(e) => {
                    self.record_failure(report, scan.id, &e);
                    continue;
                }
            };

            let elapsed = scan.elapsed(now);
            let Some(verdict) = classify(scan.status, elapsed, findings, &self.settings) else {
                continue;
            };

            match self
                .store
                .transition(
                    scan.id,
                    scan.status,
                    verdict.status,
                    Some(verdict.reason.clone()),
                    now,
                )
                .await
            {
                Ok(_) => {
                    let action =
                        self.record_fix(&scan, &verdict, elapsed.num_seconds(), findings, now);
                    report.fixed += 1;
                    self.push_action(report, action);
                }
                Err(e) => self.record_failure(report, scan.id, &e),
            }
        }
        Ok(())
    }

    fn record_fix(
        &self,
        scan: &Scan,
        verdict: &Verdict,
        elapsed_secs: i64,
        findings: usize,
        now: DateTime<Utc>,
    ) -> RemediationAction {
        self.events.append(
            ScanEvent::new(STAGE_REMEDIATION, verdict.status.as_str(), now)
                .scan(scan.id)
                .meta("reason", verdict.reason.as_str())
                .meta("rule", verdict.rule.as_str())
                .meta("original_status", scan.status.as_str())
                .meta("elapsed_secs", elapsed_secs)
                .meta("findings", findings as u64),
        );
        info!(
            scan_id = %scan.id,
            from = %scan.status,
            to = %verdict.status,
            elapsed_secs,
            findings,
            reason = %verdict.reason,
            "stuck scan remediated"
        );
        RemediationAction::Finalized {
            scan_id: scan.id,
            from: scan.status,
            to: verdict.status,
            reason: verdict.reason.clone(),
            elapsed_secs,
            findings,
        }
    }

    fn push_action(&self, report: &mut SweepReport, action: RemediationAction) {
        metrics::counter!(m::REMEDIATION_ACTIONS_TOTAL, m::LABEL_ACTION => action.label())
            .increment(1);
        report.actions.push(action);
    }

    fn record_failure(&self, report: &mut SweepReport, scan_id: ScanId, err: &StoreError) {
        if err.is_conflict() {
            debug!(scan_id = %scan_id, error = %err, "remediation raced with a concurrent update");
            metrics::counter!(m::REMEDIATION_RACES_TOTAL).increment(1);
            report.raced += 1;
        } else {
            warn!(scan_id = %scan_id, error = %err, "remediation update failed");
            report.failed += 1;
        }
    }
}
