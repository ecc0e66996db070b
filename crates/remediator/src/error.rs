//! 정리 작업 에러 타입
//!
//! 스윕 중 개별 스캔의 갱신 실패는 [`SweepReport`](crate::SweepReport)에 집계되며,
//! 스캔 목록 조회처럼 스윕 전체를 중단시키는 실패만 에러로 반환됩니다.

use scanrelay_core::error::{OrchestrationError, ScanrelayError, StoreError};

/// 정리 작업 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum RemediationError {
    /// 스토어 에러
    #[error(transparent)]
    Store(#[from] StoreError),

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config { field: String, reason: String },

    /// 정리 작업이 비활성화됨
    #[error("remediation is disabled")]
    Disabled,
}

impl From<RemediationError> for ScanrelayError {
    fn from(err: RemediationError) -> Self {
        match err {
            RemediationError::Store(e) => ScanrelayError::Store(e),
            other => ScanrelayError::Orchestration(OrchestrationError::Remediation(other.to_string())),
        }
    }
}
