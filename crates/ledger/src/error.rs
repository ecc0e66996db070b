//! 비용 원장 에러 타입
//!
//! 원장과 SLO 모니터는 스캔 경로를 막지 않으므로 호출자는 보통
//! [`LedgerError`]를 로그로만 남기고 무시합니다.

use scanrelay_core::error::{ResilienceError, ScanrelayError};

/// 비용 원장 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// 음수이거나 유한하지 않은 금액
    #[error("invalid amount for provider '{provider}': {amount}")]
    InvalidAmount { provider: String, amount: f64 },

    /// 알 수 없거나 비활성화된 SLO
    #[error("unknown or disabled slo '{0}'")]
    UnknownSlo(String),

    /// 내부 잠금 오염
    #[error("ledger state for '{0}' is poisoned")]
    Poisoned(String),
}

impl From<LedgerError> for ScanrelayError {
    fn from(err: LedgerError) -> Self {
        ScanrelayError::Resilience(ResilienceError::Ledger(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_amount_display() {
        let err = LedgerError::InvalidAmount {
            provider: "hibp".to_owned(),
            amount: -1.5,
        };
        assert_eq!(err.to_string(), "invalid amount for provider 'hibp': -1.5");
    }

    #[test]
    fn converts_to_resilience_error() {
        let err: ScanrelayError = LedgerError::UnknownSlo("uptime".to_owned()).into();
        assert!(matches!(
            err,
            ScanrelayError::Resilience(ResilienceError::Ledger(_))
        ));
    }
}
