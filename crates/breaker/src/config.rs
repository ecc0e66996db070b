//! 서킷 브레이커 설정
//!
//! core의 [`BreakerConfig`]에서 파생됩니다.
//!
//! ```ignore
//! let config = CircuitBreakerConfig::from_core(&core_config.breaker);
//! ```

use chrono::Duration;

use scanrelay_core::config::BreakerConfig;

use crate::error::BreakerError;

/// 서킷 브레이커 설정
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// 서킷을 여는 실패 횟수
    pub failure_threshold: u32,
    /// 실패를 집계하는 창
    pub failure_window: Duration,
    /// 기본 대기 시간
    pub cooldown: Duration,
    /// 반복 개방 시 대기 시간 상한
    pub max_cooldown: Duration,
    /// 시험 호출 슬롯이 유실된 것으로 보는 시간
    pub probe_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self::from_core(&BreakerConfig::default())
    }
}

impl CircuitBreakerConfig {
    /// core 설정으로부터 생성합니다.
    pub fn from_core(core: &BreakerConfig) -> Self {
        Self {
            failure_threshold: core.failure_threshold,
            failure_window: secs(core.failure_window_secs),
            cooldown: secs(core.cooldown_secs),
            max_cooldown: secs(core.max_cooldown_secs),
            probe_timeout: secs(core.probe_timeout_secs),
        }
    }

    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    pub fn with_max_cooldown(mut self, max_cooldown: Duration) -> Self {
        self.max_cooldown = max_cooldown;
        self
    }

    pub fn with_failure_window(mut self, window: Duration) -> Self {
        self.failure_window = window;
        self
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), BreakerError> {
        if self.failure_threshold == 0 {
            return Err(config_err("failure_threshold", "must be at least 1"));
        }
        if self.failure_window <= Duration::zero() {
            return Err(config_err("failure_window", "must be positive"));
        }
        if self.cooldown <= Duration::zero() {
            return Err(config_err("cooldown", "must be positive"));
        }
        if self.max_cooldown < self.cooldown {
            return Err(config_err("max_cooldown", "must not be below cooldown"));
        }
        if self.probe_timeout <= Duration::zero() {
            return Err(config_err("probe_timeout", "must be positive"));
        }
        Ok(())
    }

    /// `reopens`번째 재개방의 대기 시간
    ///
    /// `cooldown × 2^reopens`, `max_cooldown`에서 고정됩니다.
    pub fn cooldown_for(&self, reopens: u32) -> Duration {
        let base = self.cooldown.num_seconds().max(0) as u64;
        let factor = 1u64.checked_shl(reopens).unwrap_or(u64::MAX);
        let cap = self.max_cooldown.num_seconds().max(0) as u64;
        let secs_total = base.saturating_mul(factor).min(cap);
        secs(secs_total)
    }
}

fn secs(value: u64) -> Duration {
    i64::try_from(value)
        .ok()
        .and_then(Duration::try_seconds)
        .unwrap_or(Duration::MAX)
}

fn config_err(field: &str, reason: &str) -> BreakerError {
    BreakerError::Config {
        field: field.to_owned(),
        reason: reason.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_core_copies_durations() {
        let config = CircuitBreakerConfig::from_core(&BreakerConfig::default());
        assert_eq!(config.failure_threshold, 5);
        assert_eq!(config.cooldown, Duration::seconds(60));
        assert_eq!(config.max_cooldown, Duration::seconds(900));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn cooldown_doubles_and_caps() {
        let config = CircuitBreakerConfig::default();
        assert_eq!(config.cooldown_for(0), Duration::seconds(60));
        assert_eq!(config.cooldown_for(1), Duration::seconds(120));
        assert_eq!(config.cooldown_for(3), Duration::seconds(480));
        assert_eq!(config.cooldown_for(4), Duration::seconds(900));
        assert_eq!(config.cooldown_for(80), Duration::seconds(900));
    }

    #[test]
    fn oversized_core_cooldowns_saturate() {
        let core = BreakerConfig {
            cooldown_secs: u64::MAX,
            max_cooldown_secs: u64::MAX,
            ..BreakerConfig::default()
        };
        let config = CircuitBreakerConfig::from_core(&core);
        assert_eq!(config.cooldown, Duration::MAX);
        assert_eq!(config.cooldown_for(3).num_seconds(), Duration::MAX.num_seconds());
    }

    #[test]
    fn validate_rejects_inverted_cooldowns() {
        let config = CircuitBreakerConfig::default().with_max_cooldown(Duration::seconds(10));
        assert!(matches!(
            config.validate(),
            Err(BreakerError::Config { ref field, .. }) if field == "max_cooldown"
        ));
        assert!(
            CircuitBreakerConfig::default()
                .with_failure_threshold(0)
                .validate()
                .is_err()
        );
    }
}
