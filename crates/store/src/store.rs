//! 잡 스토어 추상화
//!
//! 스캔 상태, 디스패치 기록, 발견 항목에 대한 모든 쓰기는 조건부입니다.
//! 읽은 시점의 상태가 유지되고 있을 때만 적용되며, 그렇지 않으면
//! [`StoreError::Conflict`]를 반환합니다.
//!
//! # 구현체
//! - [`MemoryJobStore`](crate::MemoryJobStore): 프로세스 내 구현

use std::future::Future;

use chrono::{DateTime, Utc};

use scanrelay_core::error::StoreError;
use scanrelay_core::types::{
    DispatchOutcome, Finding, ProviderDispatch, ProviderId, Scan, ScanId, ScanStatus, Target,
};

/// 스캔 상태 저장소
///
/// 디스패처, 연속 추적기, 정리 작업이 공유합니다.
/// 구현체는 `Arc`로 공유되므로 내부 가변성을 사용해야 합니다.
pub trait JobStore: Send + Sync + 'static {
    /// 새 스캔을 저장합니다.
    fn create(&self, scan: Scan) -> impl Future<Output = Result<Scan, StoreError>> + Send;

    /// 스캔을 조회합니다.
    fn get(&self, id: ScanId) -> impl Future<Output = Result<Scan, StoreError>> + Send;

    /// 스캔의 발견 항목을 생성 순서대로 조회합니다.
    fn findings(&self, id: ScanId)
    -> impl Future<Output = Result<Vec<Finding>, StoreError>> + Send;

    /// 스캔과 발견 항목을 함께 조회합니다.
    fn get_with_findings(
        &self,
        id: ScanId,
    ) -> impl Future<Output = Result<(Scan, Vec<Finding>), StoreError>> + Send {
        async move {
            let scan = self.get(id).await?;
            let findings = self.findings(id).await?;
            Ok((scan, findings))
        }
    }

    /// 스캔의 발견 항목 수를 반환합니다.
    fn count_findings(&self, id: ScanId) -> impl Future<Output = Result<usize, StoreError>> + Send;

    /// 소유자의 스캔을 최신순으로 조회합니다.
    fn list_by_owner(
        &self,
        owner: &str,
    ) -> impl Future<Output = Result<Vec<Scan>, StoreError>> + Send;

    /// 종료되지 않은 스캔을 오래된 순으로 최대 `limit`개 조회합니다.
    fn list_active(&self, limit: usize)
    -> impl Future<Output = Result<Vec<Scan>, StoreError>> + Send;

    /// 대기 중인 비동기 디스패치가 있는 스캔을 조회합니다 (종료 여부 무관).
    fn list_with_pending(&self) -> impl Future<Output = Result<Vec<Scan>, StoreError>> + Send;

    /// 재사용 가능한 완료 스캔을 찾습니다.
    ///
    /// `since` 이후에 생성되어 `complete` 또는 `complete_partial`로 끝난
    /// 같은 대상의 스캔 중 가장 최근 것을 반환합니다.
    fn find_reusable(
        &self,
        target: &Target,
        since: DateTime<Utc>,
    ) -> impl Future<Output = Result<Option<Scan>, StoreError>> + Send;

    /// 상태를 조건부로 전이합니다 (check-and-set).
    ///
    /// 현재 상태가 `expected`가 아니면 `Conflict`를,
    /// 전이가 단조 증가가 아니면 `InvalidTransition`을 반환합니다.
    /// 종료 상태로 전이하면 `completed_at`이 설정됩니다.
    fn transition(
        &self,
        id: ScanId,
        expected: ScanStatus,
        next: ScanStatus,
        reason: Option<String>,
        at: DateTime<Utc>,
    ) -> impl Future<Output = Result<Scan, StoreError>> + Send;

    /// 디스패치 기록을 추가합니다. 종료된 스캔에는 추가할 수 없습니다.
    fn record_dispatch(
        &self,
        id: ScanId,
        dispatch: ProviderDispatch,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// `dispatched` 상태의 기록을 `pending`으로 바꿉니다.
    fn mark_pending(
        &self,
        id: ScanId,
        provider: &ProviderId,
        ticket: String,
        at: DateTime<Utc>,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// 디스패치 결과를 확정합니다.
    ///
    /// 이미 확정된 기록은 바꾸지 않고 `false`를 반환합니다.
    /// 종료된 스캔에서도 허용됩니다 (늦게 도착한 비동기 결과).
    fn resolve_dispatch(
        &self,
        id: ScanId,
        provider: &ProviderId,
        outcome: DispatchOutcome,
        at: DateTime<Utc>,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// 강제 해제된 기록을 늦게 도착한 결과로 한 번만 교체합니다.
    ///
    /// 기록이 `Resolved{ForceCleared}`일 때만 적용되어 `true`를 반환하고,
    /// 그 외 상태(이미 교체된 경우 포함)에서는 `false`를 반환합니다.
    fn reclaim_dispatch(
        &self,
        id: ScanId,
        provider: &ProviderId,
        outcome: DispatchOutcome,
        at: DateTime<Utc>,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// 오래된 대기 플래그를 조건부로 강제 해제합니다.
    ///
    /// 기록이 여전히 `observed_since`부터 대기 중일 때만 적용됩니다.
    fn force_clear_flag(
        &self,
        id: ScanId,
        provider: &ProviderId,
        observed_since: DateTime<Utc>,
        reason: String,
        at: DateTime<Utc>,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// 진행 중인 스캔에 발견 항목을 추가합니다.
    ///
    /// 스캔이 종료되었으면 `Terminal`을 반환합니다.
    fn add_findings(
        &self,
        id: ScanId,
        findings: Vec<Finding>,
    ) -> impl Future<Output = Result<usize, StoreError>> + Send;

    /// 종료 여부와 무관하게 비동기 프로바이더의 발견 항목을 추가합니다.
    ///
    /// 해당 프로바이더의 디스패치 기록이 있어야 하며,
    /// 종료된 스캔에 붙는 항목은 `late`로 표시됩니다. 상태는 바뀌지 않습니다.
    fn attach_late_findings(
        &self,
        id: ScanId,
        provider: &ProviderId,
        findings: Vec<Finding>,
    ) -> impl Future<Output = Result<usize, StoreError>> + Send;
}
