//! 에러 타입: 도메인별 에러 정의
//!
//! 각 크레이트는 자체 도메인 에러를 정의하고 `From` 변환으로
//! [`ScanrelayError`]에 합류시킵니다.

/// scanrelay 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum ScanrelayError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 컴포넌트 생명주기 에러
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// 잡 스토어 에러
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// 프로바이더 호출 에러
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    /// 서킷 브레이커 / 비용 원장 에러
    #[error("resilience error: {0}")]
    Resilience(#[from] ResilienceError),

    /// 디스패치 / 연속 추적 / 정리 작업 에러
    #[error("orchestration error: {0}")]
    Orchestration(#[from] OrchestrationError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 컴포넌트 생명주기 에러
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// 이미 실행 중
    #[error("already running")]
    AlreadyRunning,

    /// 실행 중이 아님
    #[error("not running")]
    NotRunning,

    /// 초기화 실패
    #[error("init failed: {0}")]
    InitFailed(String),

    /// 정지 실패
    #[error("stop failed: {0}")]
    StopFailed(String),
}

/// 잡 스토어 에러
///
/// `Conflict`는 낙관적 check-and-set이 동시 변경에 밀렸음을 의미합니다.
/// 호출자는 다음 주기에 재시도하면 됩니다.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// 스캔을 찾을 수 없음
    #[error("scan not found: {0}")]
    NotFound(String),

    /// 조건부 갱신 실패 (상태가 이미 변경됨)
    #[error("conflict on scan {scan_id}: expected '{expected}', found '{actual}'")]
    Conflict {
        scan_id: String,
        expected: String,
        actual: String,
    },

    /// 허용되지 않는 상태 전이
    #[error("invalid transition for scan {scan_id}: {from} -> {to}")]
    InvalidTransition {
        scan_id: String,
        from: String,
        to: String,
    },

    /// 종료 상태의 스캔에 대한 쓰기
    #[error("scan {scan_id} is terminal ({status})")]
    Terminal { scan_id: String, status: String },

    /// 디스패치 기록이 없는 프로바이더
    #[error("provider '{provider}' was never dispatched for scan {scan_id}")]
    UnknownDispatch { scan_id: String, provider: String },

    /// 내부 잠금 오염
    #[error("store lock poisoned")]
    LockPoisoned,
}

impl StoreError {
    /// 동시 변경 경합으로 인한 실패인지 여부
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

/// 프로바이더 호출 에러
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    /// 프로바이더가 응답하지 않거나 호출이 실패함
    #[error("provider unavailable: {0}")]
    Unavailable(String),

    /// 제한 시간 초과
    #[error("provider timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// 자격 증명 / 엔드포인트 누락
    #[error("provider misconfigured: {0}")]
    Configuration(String),

    /// 프로바이더가 요청을 거부함 (지원하지 않는 대상 등)
    #[error("provider rejected request: {0}")]
    Rejected(String),
}

impl ProviderError {
    /// 서킷 브레이커 실패로 집계해야 하는지 여부
    ///
    /// 설정 누락은 프로바이더 건강과 무관하므로 제외합니다.
    pub fn counts_as_failure(&self) -> bool {
        !matches!(self, Self::Configuration(_))
    }
}

/// 서킷 브레이커 / 비용 원장 에러
#[derive(Debug, thiserror::Error)]
pub enum ResilienceError {
    /// 서킷 브레이커 내부 에러
    #[error("circuit breaker: {0}")]
    Breaker(String),

    /// 비용 원장 / SLO 모니터 내부 에러
    #[error("ledger: {0}")]
    Ledger(String),
}

/// 디스패치 / 연속 추적 / 정리 작업 에러
#[derive(Debug, thiserror::Error)]
pub enum OrchestrationError {
    /// 디스패치 실패
    #[error("dispatch: {0}")]
    Dispatch(String),

    /// 비동기 연속 추적 실패
    #[error("continuation: {0}")]
    Continuation(String),

    /// 정리 스윕 실패
    #[error("remediation: {0}")]
    Remediation(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_conflict_is_detected() {
        let err = StoreError::Conflict {
            scan_id: "abc".to_owned(),
            expected: "running".to_owned(),
            actual: "failed".to_owned(),
        };
        assert!(err.is_conflict());
        assert!(!StoreError::LockPoisoned.is_conflict());
    }

    #[test]
    fn configuration_errors_do_not_count_as_breaker_failures() {
        assert!(!ProviderError::Configuration("missing key".to_owned()).counts_as_failure());
        assert!(ProviderError::Timeout { timeout_ms: 10 }.counts_as_failure());
        assert!(ProviderError::Unavailable("503".to_owned()).counts_as_failure());
    }

    #[test]
    fn nested_errors_convert_into_top_level() {
        let err: ScanrelayError = StoreError::NotFound("abc".to_owned()).into();
        assert!(matches!(err, ScanrelayError::Store(StoreError::NotFound(_))));
        assert!(err.to_string().contains("scan not found"));
    }
}
