//! 잡 스토어 동시성 테스트
//!
//! 여러 작업자가 같은 스캔을 동시에 종료하려 할 때
//! 정확히 한 쪽만 성공하는지 검증합니다.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use scanrelay_core::types::{Scan, ScanStatus, Target, TargetKind};
use scanrelay_store::{JobStore, MemoryJobStore};

fn t0() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2026-06-01T00:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_finalizers_have_single_winner() {
    let store = Arc::new(MemoryJobStore::new());
    let scan = store
        .create(Scan::new(
            "owner",
            Target::new(TargetKind::Email, "race@x.io"),
            t0(),
        ))
        .await
        .unwrap();

    let targets = [
        ScanStatus::Complete,
        ScanStatus::Timeout,
        ScanStatus::Failed,
        ScanStatus::CompletePartial,
    ];
    let mut handles = Vec::new();
    for next in targets.into_iter().cycle().take(16) {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store
                .transition(scan.id, ScanStatus::Pending, next, None, t0())
                .await
        }));
    }

    let mut winners = 0;
    let mut conflicts = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => winners += 1,
            Err(e) if e.is_conflict() => conflicts += 1,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    assert_eq!(winners, 1);
    assert_eq!(conflicts, 15);

    let stored = store.get(scan.id).await.unwrap();
    assert!(stored.is_terminal());
    assert_eq!(stored.completed_at, Some(t0()));
}

#[tokio::test]
async fn reusable_lookup_ignores_unfinished_and_failed_scans() {
    let store = MemoryJobStore::new();
    let target = Target::new(TargetKind::Domain, "example.org");

    let running = store
        .create(Scan::new("o", target.clone(), t0()))
        .await
        .unwrap();
    store
        .transition(running.id, ScanStatus::Pending, ScanStatus::Running, None, t0())
        .await
        .unwrap();

    let failed = store
        .create(Scan::new("o", target.clone(), t0()))
        .await
        .unwrap();
    store
        .transition(failed.id, ScanStatus::Pending, ScanStatus::Failed, None, t0())
        .await
        .unwrap();

    let since = t0() - chrono::Duration::hours(1);
    assert!(store.find_reusable(&target, since).await.unwrap().is_none());

    let partial = store
        .create(Scan::new("o", target.clone(), t0()))
        .await
        .unwrap();
    store
        .transition(
            partial.id,
            ScanStatus::Pending,
            ScanStatus::CompletePartial,
            None,
            t0(),
        )
        .await
        .unwrap();
    let found = store.find_reusable(&target, since).await.unwrap();
    assert_eq!(found.map(|s| s.id), Some(partial.id));
}
