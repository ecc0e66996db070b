//! 디스패처 에러 타입
//!
//! 프로바이더 에러는 디스패치 결과로 기록될 뿐 [`DispatchError`]로 전파되지 않습니다.
//! 호출자에게 올라오는 것은 스토어 에러와 스캔 상태 충돌뿐입니다.

use scanrelay_core::error::{OrchestrationError, ScanrelayError, StoreError};

/// 디스패치 / 연속 추적 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// 스토어 에러
    #[error(transparent)]
    Store(#[from] StoreError),

    /// 이미 종료된 스캔
    #[error("scan {scan_id} is already terminal ({status})")]
    ScanTerminal { scan_id: String, status: String },

    /// 이미 디스패치가 시작된 스캔
    #[error("scan {scan_id} was already dispatched ({status})")]
    AlreadyDispatched { scan_id: String, status: String },

    /// 같은 ID의 프로바이더가 이미 등록됨
    #[error("provider '{0}' is already registered")]
    DuplicateProvider(String),

    /// 등록되지 않았거나 비동기 프로바이더가 아님
    #[error("no asynchronous provider '{0}' is registered")]
    UnknownProvider(String),

    /// 연속 추적기가 실행 중이 아님
    #[error("continuation tracker is not running")]
    TrackerStopped,

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config { field: String, reason: String },
}

impl From<DispatchError> for ScanrelayError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::Store(e) => ScanrelayError::Store(e),
            DispatchError::TrackerStopped | DispatchError::UnknownProvider(_) => {
                ScanrelayError::Orchestration(OrchestrationError::Continuation(err.to_string()))
            }
            other => ScanrelayError::Orchestration(OrchestrationError::Dispatch(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_error_is_transparent() {
        let err = DispatchError::from(StoreError::NotFound("abc".to_owned()));
        assert_eq!(err.to_string(), StoreError::NotFound("abc".to_owned()).to_string());
        let top: ScanrelayError = err.into();
        assert!(matches!(top, ScanrelayError::Store(StoreError::NotFound(_))));
    }

    #[test]
    fn tracker_errors_map_to_continuation() {
        let top: ScanrelayError = DispatchError::TrackerStopped.into();
        assert!(matches!(
            top,
            ScanrelayError::Orchestration(OrchestrationError::Continuation(_))
        ));
    }

    #[test]
    fn terminal_scan_maps_to_dispatch() {
        let top: ScanrelayError = DispatchError::ScanTerminal {
            scan_id: "s-1".to_owned(),
            status: "cached".to_owned(),
        }
        .into();
        assert!(matches!(
            top,
            ScanrelayError::Orchestration(OrchestrationError::Dispatch(_))
        ));
        assert!(top.to_string().contains("cached"));
    }
}
