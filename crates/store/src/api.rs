//! 스캔 생성/조회 API
//!
//! 같은 대상에 대해 재사용 창 안에 완료된 스캔이 있으면 프로바이더를 다시
//! 호출하지 않고 `cached` 스캔을 만들어 이전 결과를 가리킵니다.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::info;

use scanrelay_core::clock::Clock;
use scanrelay_core::config::StoreConfig;
use scanrelay_core::error::StoreError;
use scanrelay_core::event::{EventLog, STAGE_LIFECYCLE, ScanEvent};
use scanrelay_core::metrics as m;
use scanrelay_core::types::{Finding, Scan, ScanId, Target};

use crate::store::JobStore;

/// 스캔과 발견 항목
#[derive(Debug, Clone, Serialize)]
pub struct ScanView {
    pub scan: Scan,
    /// `cached` 스캔이면 재사용한 스캔의 발견 항목
    pub findings: Vec<Finding>,
}

/// 스캔 API
pub struct ScanApi<S: JobStore> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    events: Arc<dyn EventLog>,
    reuse_window: Duration,
}

impl<S: JobStore> ScanApi<S> {
    pub fn new(
        store: Arc<S>,
        clock: Arc<dyn Clock>,
        events: Arc<dyn EventLog>,
        reuse_window: Duration,
    ) -> Self {
        Self {
            store,
            clock,
            events,
            reuse_window,
        }
    }

    /// 설정으로부터 API를 생성합니다.
    pub fn from_config(
        config: &StoreConfig,
        store: Arc<S>,
        clock: Arc<dyn Clock>,
        events: Arc<dyn EventLog>,
    ) -> Self {
        Self::new(
            store,
            clock,
            events,
            Duration::from_secs(config.reuse_window_secs),
        )
    }

    /// 공유 스토어
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// 새 스캔을 생성합니다.
    ///
    /// 재사용 창 안에 같은 대상의 완료 스캔이 있으면 즉시 `cached`로 끝난
    /// 스캔을 반환하며, 이 스캔은 디스패치할 필요가 없습니다.
    pub async fn create_scan(&self, owner: &str, target: Target) -> Result<Scan, StoreError> {
        let now = self.clock.now();

        let reusable = if self.reuse_window.is_zero() {
            None
        } else {
            let window = chrono::Duration::from_std(self.reuse_window)
                .unwrap_or_else(|_| chrono::Duration::zero());
            self.store.find_reusable(&target, now - window).await?
        };

        let scan = match reusable {
            Some(prior) => Scan::cached(owner, target, prior.id, now),
            None => Scan::new(owner, target, now),
        };
        let scan = self.store.create(scan).await?;

        metrics::counter!(m::SCANS_CREATED_TOTAL, m::LABEL_STATUS => scan.status.as_str())
            .increment(1);
        let mut event = ScanEvent::new(STAGE_LIFECYCLE, scan.status.as_str(), now)
            .scan(scan.id)
            .meta("target_kind", scan.target.kind.as_str())
            .meta("owner", scan.owner.clone());
        if let Some(prior) = scan.reused_from {
            event = event.meta("reused_from", prior.to_string());
        }
        self.events.append(event);

        info!(
            scan_id = %scan.id,
            target = %scan.target,
            status = %scan.status,
            "scan created"
        );
        Ok(scan)
    }

    /// 스캔과 발견 항목을 조회합니다.
    pub async fn get_scan(&self, id: ScanId) -> Result<ScanView, StoreError> {
        let scan = self.store.get(id).await?;
        let source = scan.reused_from.unwrap_or(scan.id);
        let findings = match self.store.findings(source).await {
            Ok(findings) => findings,
            // 재사용 원본이 사라졌으면 빈 결과
            Err(StoreError::NotFound(_)) if source != scan.id => Vec::new(),
            Err(e) => return Err(e),
        };
        Ok(ScanView { scan, findings })
    }

    /// 소유자의 스캔을 최신순으로 조회합니다.
    pub async fn list_scans(&self, owner: &str) -> Result<Vec<Scan>, StoreError> {
        self.store.list_by_owner(owner).await
    }
}
