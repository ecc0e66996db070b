//! 메모리 기반 잡 스토어
//!
//! 스캔 하나의 모든 쓰기는 단일 쓰기 잠금 아래에서 읽기-비교-쓰기로 수행되므로
//! 디스패처와 정리 작업이 동시에 같은 스캔을 갱신해도 한쪽만 적용됩니다.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use tracing::debug;

use scanrelay_core::error::StoreError;
use scanrelay_core::metrics as m;
use scanrelay_core::types::{
    DispatchOutcome, DispatchState, Finding, ProviderDispatch, ProviderId, Scan, ScanId,
    ScanStatus, Target,
};

use crate::store::JobStore;

/// 스캔과 그 발견 항목
#[derive(Debug, Clone)]
struct ScanRecord {
    scan: Scan,
    findings: Vec<Finding>,
}

/// 메모리 기반 [`JobStore`] 구현
#[derive(Debug, Default)]
pub struct MemoryJobStore {
    records: RwLock<HashMap<ScanId, ScanRecord>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 저장된 스캔 수
    pub fn len(&self) -> usize {
        self.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<ScanId, ScanRecord>>, StoreError> {
        self.records.read().map_err(|_| StoreError::LockPoisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<ScanId, ScanRecord>>, StoreError> {
        self.records.write().map_err(|_| StoreError::LockPoisoned)
    }
}

fn not_found(id: ScanId) -> StoreError {
    StoreError::NotFound(id.to_string())
}

fn unknown_dispatch(id: ScanId, provider: &ProviderId) -> StoreError {
    StoreError::UnknownDispatch {
        scan_id: id.to_string(),
        provider: provider.to_string(),
    }
}

fn ensure_open(scan: &Scan) -> Result<(), StoreError> {
    if scan.is_terminal() {
        return Err(StoreError::Terminal {
            scan_id: scan.id.to_string(),
            status: scan.status.to_string(),
        });
    }
    Ok(())
}

fn record_finalized(scan: &Scan) {
    metrics::counter!(m::SCANS_FINALIZED_TOTAL, m::LABEL_STATUS => scan.status.as_str())
        .increment(1);
    if let Some(completed_at) = scan.completed_at {
        let secs = (completed_at - scan.created_at).num_milliseconds().max(0) as f64 / 1000.0;
        metrics::histogram!(m::SCAN_COMPLETION_SECONDS).record(secs);
    }
}

impl JobStore for MemoryJobStore {
    async fn create(&self, scan: Scan) -> Result<Scan, StoreError> {
        let mut records = self.write()?;
        debug!(scan_id = %scan.id, owner = %scan.owner, status = %scan.status, "scan stored");
        records.insert(
            scan.id,
            ScanRecord {
                scan: scan.clone(),
                findings: Vec::new(),
            },
        );
        Ok(scan)
    }

    async fn get(&self, id: ScanId) -> Result<Scan, StoreError> {
        let records = self.read()?;
        records
            .get(&id)
            .map(|r| r.scan.clone())
            .ok_or_else(|| not_found(id))
    }

    async fn findings(&self, id: ScanId) -> Result<Vec<Finding>, StoreError> {
        let records = self.read()?;
        records
            .get(&id)
            .map(|r| r.findings.clone())
            .ok_or_else(|| not_found(id))
    }

    async fn count_findings(&self, id: ScanId) -> Result<usize, StoreError> {
        let records = self.read()?;
        records
            .get(&id)
            .map(|r| r.findings.len())
            .ok_or_else(|| not_found(id))
    }

    async fn list_by_owner(&self, owner: &str) -> Result<Vec<Scan>, StoreError> {
        let records = self.read()?;
        let mut scans: Vec<Scan> = records
            .values()
            .filter(|r| r.scan.owner == owner)
            .map(|r| r.scan.clone())
            .collect();
        scans.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(scans)
    }

    async fn list_active(&self, limit: usize) -> Result<Vec<Scan>, StoreError> {
        let records = self.read()?;
        let mut scans: Vec<Scan> = records
            .values()
            .filter(|r| !r.scan.is_terminal())
            .map(|r| r.scan.clone())
            .collect();
        scans.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        scans.truncate(limit);
        Ok(scans)
    }

    async fn list_with_pending(&self) -> Result<Vec<Scan>, StoreError> {
        let records = self.read()?;
        let mut scans: Vec<Scan> = records
            .values()
            .filter(|r| r.scan.has_pending())
            .map(|r| r.scan.clone())
            .collect();
        scans.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(scans)
    }

    async fn find_reusable(
        &self,
        target: &Target,
        since: DateTime<Utc>,
    ) -> Result<Option<Scan>, StoreError> {
        let records = self.read()?;
        Ok(records
            .values()
            .map(|r| &r.scan)
            .filter(|s| {
                &s.target == target
                    && s.created_at >= since
                    && matches!(s.status, ScanStatus::Complete | ScanStatus::CompletePartial)
            })
            .max_by_key(|s| s.created_at)
            .cloned())
    }

    async fn transition(
        &self,
        id: ScanId,
        expected: ScanStatus,
        next: ScanStatus,
        reason: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<Scan, StoreError> {
        let mut records = self.write()?;
        let record = records.get_mut(&id).ok_or_else(|| not_found(id))?;
        let scan = &mut record.scan;

        if scan.status != expected {
            return Err(StoreError::Conflict {
                scan_id: id.to_string(),
                expected: expected.to_string(),
                actual: scan.status.to_string(),
            });
        }
        if !expected.can_transition_to(next) {
            return Err(StoreError::InvalidTransition {
                scan_id: id.to_string(),
                from: expected.to_string(),
                to: next.to_string(),
            });
        }

        scan.status = next;
        if next.is_terminal() {
            scan.completed_at = Some(at);
        }
        if reason.is_some() {
            scan.reason = reason;
        }

        debug!(scan_id = %id, from = %expected, to = %next, "scan transitioned");
        if next.is_terminal() {
            record_finalized(scan);
        }
        Ok(scan.clone())
    }

    async fn record_dispatch(&self, id: ScanId, dispatch: ProviderDispatch) -> Result<(), StoreError> {
        let mut records = self.write()?;
        let record = records.get_mut(&id).ok_or_else(|| not_found(id))?;
        ensure_open(&record.scan)?;
        record
            .scan
            .dispatches
            .insert(dispatch.provider.clone(), dispatch);
        Ok(())
    }

    async fn mark_pending(
        &self,
        id: ScanId,
        provider: &ProviderId,
        ticket: String,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut records = self.write()?;
        let record = records.get_mut(&id).ok_or_else(|| not_found(id))?;
        ensure_open(&record.scan)?;
        let dispatch = record
            .scan
            .dispatches
            .get_mut(provider)
            .ok_or_else(|| unknown_dispatch(id, provider))?;

        if dispatch.state != DispatchState::Dispatched {
            return Err(StoreError::Conflict {
                scan_id: id.to_string(),
                expected: "dispatched".to_owned(),
                actual: dispatch_state_name(&dispatch.state).to_owned(),
            });
        }
        dispatch.state = DispatchState::Pending { ticket, since: at };
        Ok(())
    }

    async fn resolve_dispatch(
        &self,
        id: ScanId,
        provider: &ProviderId,
        outcome: DispatchOutcome,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut records = self.write()?;
        let record = records.get_mut(&id).ok_or_else(|| not_found(id))?;
        let dispatch = record
            .scan
            .dispatches
            .get_mut(provider)
            .ok_or_else(|| unknown_dispatch(id, provider))?;

        if dispatch.is_resolved() {
            return Ok(false);
        }
        dispatch.state = DispatchState::Resolved { outcome, at };
        Ok(true)
    }

    async fn reclaim_dispatch(
        &self,
        id: ScanId,
        provider: &ProviderId,
        outcome: DispatchOutcome,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut records = self.write()?;
        let record = records.get_mut(&id).ok_or_else(|| not_found(id))?;
        let dispatch = record
            .scan
            .dispatches
            .get_mut(provider)
            .ok_or_else(|| unknown_dispatch(id, provider))?;

        if !matches!(
            dispatch.state,
            DispatchState::Resolved {
                outcome: DispatchOutcome::ForceCleared { .. },
                ..
            }
        ) {
            return Ok(false);
        }
        dispatch.state = DispatchState::Resolved { outcome, at };
        Ok(true)
    }

    async fn force_clear_flag(
        &self,
        id: ScanId,
        provider: &ProviderId,
        observed_since: DateTime<Utc>,
        reason: String,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut records = self.write()?;
        let record = records.get_mut(&id).ok_or_else(|| not_found(id))?;
        let dispatch = record
            .scan
            .dispatches
            .get_mut(provider)
            .ok_or_else(|| unknown_dispatch(id, provider))?;

        if dispatch.pending_since() != Some(observed_since) {
            return Err(StoreError::Conflict {
                scan_id: id.to_string(),
                expected: format!("pending since {observed_since}"),
                actual: dispatch_state_name(&dispatch.state).to_owned(),
            });
        }
        dispatch.state = DispatchState::Resolved {
            outcome: DispatchOutcome::ForceCleared { reason },
            at,
        };
        Ok(())
    }

    async fn add_findings(&self, id: ScanId, findings: Vec<Finding>) -> Result<usize, StoreError> {
        let mut records = self.write()?;
        let record = records.get_mut(&id).ok_or_else(|| not_found(id))?;
        ensure_open(&record.scan)?;

        let added = findings.len();
        for finding in &findings {
            metrics::counter!(m::FINDINGS_INGESTED_TOTAL, m::LABEL_PROVIDER => finding.provider.to_string())
                .increment(1);
        }
        record.findings.extend(findings);
        Ok(added)
    }

    async fn attach_late_findings(
        &self,
        id: ScanId,
        provider: &ProviderId,
        findings: Vec<Finding>,
    ) -> Result<usize, StoreError> {
        let mut records = self.write()?;
        let record = records.get_mut(&id).ok_or_else(|| not_found(id))?;
        if !record.scan.dispatches.contains_key(provider) {
            return Err(unknown_dispatch(id, provider));
        }

        let late = record.scan.is_terminal();
        let added = findings.len();
        record.findings.extend(findings.into_iter().map(|mut f| {
            f.late = late;
            f
        }));
        if late && added > 0 {
            metrics::counter!(m::LATE_FINDINGS_TOTAL, m::LABEL_PROVIDER => provider.to_string())
                .increment(added as u64);
        }
        Ok(added)
    }
}

fn dispatch_state_name(state: &DispatchState) -> &'static str {
    match state {
        DispatchState::Dispatched => "dispatched",
        DispatchState::Pending { .. } => "pending",
        DispatchState::Resolved { .. } => "resolved",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scanrelay_core::types::{Capability, FindingDraft, Severity, TargetKind};

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-04-10T08:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn finding(scan: ScanId, provider: &str) -> Finding {
        Finding::from_draft(
            scan,
            provider.into(),
            FindingDraft::new("breach", Severity::Medium, 0.8),
            t0(),
        )
    }

    async fn stored_scan(store: &MemoryJobStore) -> Scan {
        let scan = Scan::new("owner", Target::new(TargetKind::Email, "a@b.io"), t0());
        store.create(scan).await.unwrap()
    }

    #[tokio::test]
    async fn transition_requires_expected_status() {
        let store = MemoryJobStore::new();
        let scan = stored_scan(&store).await;

        let err = store
            .transition(scan.id, ScanStatus::Running, ScanStatus::Processing, None, t0())
            .await
            .unwrap_err();
        assert!(err.is_conflict());

        let updated = store
            .transition(scan.id, ScanStatus::Pending, ScanStatus::Running, None, t0())
            .await
            .unwrap();
        assert_eq!(updated.status, ScanStatus::Running);
        assert!(updated.completed_at.is_none());
    }

    #[tokio::test]
    async fn terminal_transition_stamps_completed_at() {
        let store = MemoryJobStore::new();
        let scan = stored_scan(&store).await;
        let done = store
            .transition(
                scan.id,
                ScanStatus::Pending,
                ScanStatus::Timeout,
                Some("no provider responded".to_owned()),
                t0(),
            )
            .await
            .unwrap();
        assert_eq!(done.completed_at, Some(t0()));
        assert_eq!(done.reason.as_deref(), Some("no provider responded"));

        let err = store
            .transition(scan.id, ScanStatus::Timeout, ScanStatus::Failed, None, t0())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn findings_rejected_after_terminal() {
        let store = MemoryJobStore::new();
        let scan = stored_scan(&store).await;
        store
            .add_findings(scan.id, vec![finding(scan.id, "hibp")])
            .await
            .unwrap();
        store
            .transition(scan.id, ScanStatus::Pending, ScanStatus::Failed, None, t0())
            .await
            .unwrap();

        let err = store
            .add_findings(scan.id, vec![finding(scan.id, "hibp")])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Terminal { .. }));
        assert_eq!(store.count_findings(scan.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn late_findings_require_dispatch_record() {
        let store = MemoryJobStore::new();
        let scan = stored_scan(&store).await;
        let provider = ProviderId::new("gosearch");

        let err = store
            .attach_late_findings(scan.id, &provider, vec![finding(scan.id, "gosearch")])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UnknownDispatch { .. }));

        store
            .record_dispatch(
                scan.id,
                ProviderDispatch::new(provider.clone(), Capability::Asynchronous, t0()),
            )
            .await
            .unwrap();
        store
            .transition(scan.id, ScanStatus::Pending, ScanStatus::Failed, None, t0())
            .await
            .unwrap();

        let added = store
            .attach_late_findings(scan.id, &provider, vec![finding(scan.id, "gosearch")])
            .await
            .unwrap();
        assert_eq!(added, 1);
        let findings = store.findings(scan.id).await.unwrap();
        assert!(findings[0].late);
        assert_eq!(store.get(scan.id).await.unwrap().status, ScanStatus::Failed);
    }

    #[tokio::test]
    async fn dispatch_lifecycle_is_enforced() {
        let store = MemoryJobStore::new();
        let scan = stored_scan(&store).await;
        let provider = ProviderId::new("gosearch");
        store
            .record_dispatch(
                scan.id,
                ProviderDispatch::new(provider.clone(), Capability::Asynchronous, t0()),
            )
            .await
            .unwrap();
        store
            .mark_pending(scan.id, &provider, "ticket-1".to_owned(), t0())
            .await
            .unwrap();

        let err = store
            .mark_pending(scan.id, &provider, "ticket-2".to_owned(), t0())
            .await
            .unwrap_err();
        assert!(err.is_conflict());

        let first = store
            .resolve_dispatch(scan.id, &provider, DispatchOutcome::Reported { findings: 0 }, t0())
            .await
            .unwrap();
        let second = store
            .resolve_dispatch(
                scan.id,
                &provider,
                DispatchOutcome::Failed {
                    reason: "duplicate".to_owned(),
                },
                t0(),
            )
            .await
            .unwrap();
        assert!(first);
        assert!(!second);
    }

    #[tokio::test]
    async fn force_clear_is_conditional_on_observed_since() {
        let store = MemoryJobStore::new();
        let scan = stored_scan(&store).await;
        let provider = ProviderId::new("gosearch");
        store
            .record_dispatch(
                scan.id,
                ProviderDispatch::new(provider.clone(), Capability::Asynchronous, t0()),
            )
            .await
            .unwrap();
        store
            .mark_pending(scan.id, &provider, "t".to_owned(), t0())
            .await
            .unwrap();

        let stale = t0() - chrono::Duration::minutes(1);
        let err = store
            .force_clear_flag(scan.id, &provider, stale, "stale".to_owned(), t0())
            .await
            .unwrap_err();
        assert!(err.is_conflict());

        store
            .force_clear_flag(scan.id, &provider, t0(), "stale".to_owned(), t0())
            .await
            .unwrap();
        assert!(!store.get(scan.id).await.unwrap().has_pending());
        assert_eq!(store.list_with_pending().await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn reclaim_replaces_force_cleared_once() {
        let store = MemoryJobStore::new();
        let scan = stored_scan(&store).await;
        let provider = ProviderId::new("gosearch");
        store
            .record_dispatch(
                scan.id,
                ProviderDispatch::new(provider.clone(), Capability::Asynchronous, t0()),
            )
            .await
            .unwrap();
        store
            .mark_pending(scan.id, &provider, "t".to_owned(), t0())
            .await
            .unwrap();

        // 대기 중인 기록은 교체 대상이 아님
        let reported = DispatchOutcome::Reported { findings: 2 };
        assert!(!store
            .reclaim_dispatch(scan.id, &provider, reported.clone(), t0())
            .await
            .unwrap());

        store
            .force_clear_flag(scan.id, &provider, t0(), "stale".to_owned(), t0())
            .await
            .unwrap();
        let first = store
            .reclaim_dispatch(scan.id, &provider, reported.clone(), t0())
            .await
            .unwrap();
        let second = store
            .reclaim_dispatch(scan.id, &provider, reported, t0())
            .await
            .unwrap();
        assert!(first);
        assert!(!second);
        assert_eq!(
            store.get(scan.id).await.unwrap().dispatches[&provider].outcome(),
            Some(&DispatchOutcome::Reported { findings: 2 })
        );
    }

    #[tokio::test]
    async fn list_active_is_oldest_first_and_limited() {
        let store = MemoryJobStore::new();
        for minutes in [5, 1, 3] {
            let scan = Scan::new(
                "owner",
                Target::new(TargetKind::Username, format!("user{minutes}")),
                t0() + chrono::Duration::minutes(minutes),
            );
            store.create(scan).await.unwrap();
        }
        let active = store.list_active(2).await.unwrap();
        assert_eq!(active.len(), 2);
        assert_eq!(active[0].target.value, "user1");
        assert_eq!(active[1].target.value, "user3");
    }

    #[tokio::test]
    async fn missing_scan_is_not_found() {
        let store = MemoryJobStore::new();
        let err = store.get(ScanId::new()).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }
}
