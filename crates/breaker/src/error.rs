//! 서킷 브레이커 에러 타입
//!
//! 브레이커는 내부 에러를 호출자에게 전파하지 않고 열림(fail-open)으로 처리하므로,
//! [`BreakerError`]는 설정 검증과 관리 작업에서만 반환됩니다.

use scanrelay_core::error::{ResilienceError, ScanrelayError};

/// 서킷 브레이커 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum BreakerError {
    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// 내부 상태 잠금 오염
    #[error("breaker state for '{0}' is poisoned")]
    Poisoned(String),
}

impl From<BreakerError> for ScanrelayError {
    fn from(err: BreakerError) -> Self {
        ScanrelayError::Resilience(ResilienceError::Breaker(err.to_string()))
    }
}
