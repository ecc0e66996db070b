//! 스캔 상태 확정
//!
//! 디스패처와 연속 추적기가 같은 규칙으로 종료 상태를 계산합니다.
//!
//! - 미확정 디스패치가 있고 비동기 플래그가 대기 중이면 `running -> processing`
//! - 모든 디스패치가 확정되면 [`settle`](scanrelay_core::types::settle) 결과로 전이
//!
//! 모든 전이는 check-and-set이므로 정리 작업과 동시에 실행되어도 안전합니다.
//! 이미 종료된 스캔은 다시 열지 않습니다.

use std::sync::Arc;

use tracing::{debug, info};

use scanrelay_core::clock::Clock;
use scanrelay_core::error::StoreError;
use scanrelay_core::event::{EventLog, STAGE_LIFECYCLE, ScanEvent};
use scanrelay_core::types::{Scan, ScanId, ScanStatus};
use scanrelay_ledger::{SLO_SCAN_COMPLETION_SECS, SloMonitor};
use scanrelay_store::JobStore;

/// 경합 시 재시도 횟수
const MAX_ATTEMPTS: usize = 3;

/// 스캔 상태 확정기
pub struct ScanFinalizer<S: JobStore> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    events: Arc<dyn EventLog>,
    slo: Arc<SloMonitor>,
}

impl<S: JobStore> ScanFinalizer<S> {
    pub fn new(
        store: Arc<S>,
        clock: Arc<dyn Clock>,
        events: Arc<dyn EventLog>,
        slo: Arc<SloMonitor>,
    ) -> Self {
        Self {
            store,
            clock,
            events,
            slo,
        }
    }

    /// 현재 디스패치 기록으로 스캔 상태를 갱신하고 최신 스캔을 반환합니다.
    pub async fn finalize(&self, scan_id: ScanId) -> Result<Scan, StoreError> {
        let mut scan = self.store.get(scan_id).await?;

        for _ in 0..MAX_ATTEMPTS {
            if scan.is_terminal() {
                return Ok(scan);
            }

            let (next, reason) = match scan.settled_status() {
                Some(settled) => settled,
                None if scan.status == ScanStatus::Running && scan.has_pending() => {
                    (ScanStatus::Processing, None)
                }
                None => return Ok(scan),
            };

            let now = self.clock.now();
            let from = scan.status;
            match self
                .store
                .transition(scan_id, from, next, reason.clone(), now)
                .await
            {
                Ok(updated) => {
                    self.record(&updated, from, reason);
                    return Ok(updated);
                }
                Err(e) if e.is_conflict() => {
                    debug!(scan_id = %scan_id, error = %e, "finalize raced, re-reading scan");
                    scan = self.store.get(scan_id).await?;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(scan)
    }

    fn record(&self, scan: &Scan, from: ScanStatus, reason: Option<String>) {
        let mut event = ScanEvent::new(STAGE_LIFECYCLE, scan.status.as_str(), self.clock.now())
            .scan(scan.id)
            .meta("from", from.as_str());
        if let Some(reason) = &reason {
            event = event.meta("reason", reason.as_str());
        }
        self.events.append(event);

        if let Some(completed_at) = scan.completed_at {
            let elapsed = (completed_at - scan.created_at).num_milliseconds() as f64 / 1_000.0;
            self.slo.observe(SLO_SCAN_COMPLETION_SECS, elapsed);
            info!(
                scan_id = %scan.id,
                status = %scan.status,
                reason = reason.as_deref().unwrap_or(""),
                elapsed_secs = elapsed,
                "scan finalized"
            );
        } else {
            debug!(scan_id = %scan.id, from = %from, to = %scan.status, "scan awaiting async results");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use scanrelay_core::clock::ManualClock;
    use scanrelay_core::event::MemoryEventLog;
    use scanrelay_core::types::{
        Capability, DispatchOutcome, ProviderDispatch, ProviderId, Target, TargetKind,
    };
    use scanrelay_ledger::{Comparison, SloDefinition};
    use scanrelay_store::MemoryJobStore;

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-05-04T09:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    struct Fixture {
        store: Arc<MemoryJobStore>,
        events: Arc<MemoryEventLog>,
        slo: Arc<SloMonitor>,
        finalizer: ScanFinalizer<MemoryJobStore>,
    }

    fn fixture() -> Fixture {
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(t0()));
        let store = Arc::new(MemoryJobStore::new());
        let events = Arc::new(MemoryEventLog::new(100));
        let slo = Arc::new(SloMonitor::new(
            vec![SloDefinition::new(SLO_SCAN_COMPLETION_SECS, 300.0, Comparison::AtMost)],
            Arc::clone(&clock),
        ));
        let finalizer = ScanFinalizer::new(
            Arc::clone(&store),
            clock,
            events.clone(),
            Arc::clone(&slo),
        );
        Fixture {
            store,
            events,
            slo,
            finalizer,
        }
    }

    async fn running_scan(store: &MemoryJobStore, providers: &[(&str, Capability)]) -> ScanId {
        let scan = store
            .create(Scan::new(
                "analyst",
                Target::new(TargetKind::Email, "a@example.com"),
                t0(),
            ))
            .await
            .unwrap();
        store
            .transition(scan.id, ScanStatus::Pending, ScanStatus::Running, None, t0())
            .await
            .unwrap();
        for (id, capability) in providers {
            store
                .record_dispatch(scan.id, ProviderDispatch::new((*id).into(), *capability, t0()))
                .await
                .unwrap();
        }
        scan.id
    }

    #[tokio::test]
    async fn all_reported_completes() {
        let f = fixture();
        let id = running_scan(&f.store, &[("hibp", Capability::Synchronous)]).await;
        f.store
            .resolve_dispatch(id, &"hibp".into(), DispatchOutcome::Reported { findings: 2 }, t0())
            .await
            .unwrap();

        let scan = f.finalizer.finalize(id).await.unwrap();
        assert_eq!(scan.status, ScanStatus::Complete);
        assert_eq!(scan.completed_at, Some(t0()));
        assert_eq!(f.events.by_stage(STAGE_LIFECYCLE).len(), 1);
        assert_eq!(f.slo.compliance_ratio(SLO_SCAN_COMPLETION_SECS), Some(1.0));
    }

    #[tokio::test]
    async fn pending_flag_moves_to_processing() {
        let f = fixture();
        let gosearch = ProviderId::new("gosearch");
        let id = running_scan(
            &f.store,
            &[
                ("hibp", Capability::Synchronous),
                ("gosearch", Capability::Asynchronous),
            ],
        )
        .await;
        f.store
            .resolve_dispatch(id, &"hibp".into(), DispatchOutcome::Reported { findings: 0 }, t0())
            .await
            .unwrap();
        f.store
            .mark_pending(id, &gosearch, "ticket-1".to_owned(), t0())
            .await
            .unwrap();

        let scan = f.finalizer.finalize(id).await.unwrap();
        assert_eq!(scan.status, ScanStatus::Processing);
        assert!(scan.completed_at.is_none());

        // 두 번째 호출은 변화 없음
        let again = f.finalizer.finalize(id).await.unwrap();
        assert_eq!(again.status, ScanStatus::Processing);

        f.store
            .resolve_dispatch(
                id,
                &gosearch,
                DispatchOutcome::Failed {
                    reason: "upstream error".to_owned(),
                },
                t0(),
            )
            .await
            .unwrap();
        let scan = f.finalizer.finalize(id).await.unwrap();
        assert_eq!(scan.status, ScanStatus::CompletePartial);
    }

    #[tokio::test]
    async fn no_dispatches_fails_with_reason() {
        let f = fixture();
        let id = running_scan(&f.store, &[]).await;
        let scan = f.finalizer.finalize(id).await.unwrap();
        assert_eq!(scan.status, ScanStatus::Failed);
        assert_eq!(scan.reason.as_deref(), Some("no eligible providers"));
    }

    #[tokio::test]
    async fn terminal_scan_is_not_reopened() {
        let f = fixture();
        let id = running_scan(&f.store, &[("hibp", Capability::Synchronous)]).await;
        f.store
            .transition(
                id,
                ScanStatus::Running,
                ScanStatus::Failed,
                Some("abandoned".to_owned()),
                t0(),
            )
            .await
            .unwrap();
        f.store
            .resolve_dispatch(id, &"hibp".into(), DispatchOutcome::Reported { findings: 1 }, t0())
            .await
            .unwrap();

        let scan = f.finalizer.finalize(id).await.unwrap();
        assert_eq!(scan.status, ScanStatus::Failed);
        assert_eq!(scan.reason.as_deref(), Some("abandoned"));
        assert!(f.events.by_stage(STAGE_LIFECYCLE).is_empty());
    }
}
