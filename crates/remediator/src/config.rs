//! 정리 작업 설정
//!
//! core의 `[remediation]` 섹션에서 파생됩니다.

use chrono::Duration;

use scanrelay_core::config::RemediationConfig;

use crate::error::RemediationError;

/// 정리 작업 설정
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemediationSettings {
    /// 주기적 스윕 활성화 여부
    pub enabled: bool,
    /// 스윕 주기
    pub sweep_interval: std::time::Duration,
    /// `pending` 스캔의 정리 하한
    pub pending_floor: Duration,
    /// 부분 완료 / 시간 초과 기준
    pub partial_after: Duration,
    /// 포기 기준
    pub abandon_after: Duration,
    /// 비동기 대기 플래그 최대 유지 시간
    pub flag_max_age: Duration,
    /// 스윕 한 번에 검사할 최대 스캔 수
    pub batch_limit: usize,
}

impl Default for RemediationSettings {
    fn default() -> Self {
        Self::from_core(&RemediationConfig::default())
    }
}

impl RemediationSettings {
    pub fn from_core(core: &RemediationConfig) -> Self {
        Self {
            enabled: core.enabled,
            sweep_interval: core.sweep_interval(),
            pending_floor: secs(core.pending_floor_secs),
            partial_after: secs(core.partial_after_secs),
            abandon_after: secs(core.abandon_after_secs),
            flag_max_age: secs(core.flag_max_age_secs),
            batch_limit: core.batch_limit,
        }
    }

    pub fn with_batch_limit(mut self, limit: usize) -> Self {
        self.batch_limit = limit;
        self
    }

    pub fn with_thresholds(
        mut self,
        pending_floor: Duration,
        partial_after: Duration,
        abandon_after: Duration,
    ) -> Self {
        self.pending_floor = pending_floor;
        self.partial_after = partial_after;
        self.abandon_after = abandon_after;
        self
    }

    pub fn with_flag_max_age(mut self, max_age: Duration) -> Self {
        self.flag_max_age = max_age;
        self
    }

    pub fn with_sweep_interval(mut self, interval: std::time::Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// 임계값 순서를 검증합니다 (`pending_floor <= partial_after < abandon_after`).
    pub fn validate(&self) -> Result<(), RemediationError> {
        if self.pending_floor <= Duration::zero() {
            return Err(config_err("pending_floor", "must be positive"));
        }
        if self.pending_floor > self.partial_after {
            return Err(config_err("pending_floor", "must not exceed partial_after"));
        }
        if self.partial_after >= self.abandon_after {
            return Err(config_err("partial_after", "must be less than abandon_after"));
        }
        if self.flag_max_age <= Duration::zero() {
            return Err(config_err("flag_max_age", "must be positive"));
        }
        if self.batch_limit == 0 {
            return Err(config_err("batch_limit", "must be at least 1"));
        }
        if self.sweep_interval.is_zero() {
            return Err(config_err("sweep_interval", "must be positive"));
        }
        Ok(())
    }
}

/// 표현 범위를 넘는 값은 `Duration::MAX`로 고정합니다.
fn secs(value: u64) -> Duration {
    i64::try_from(value)
        .ok()
        .and_then(Duration::try_seconds)
        .unwrap_or(Duration::MAX)
}

fn config_err(field: &str, reason: &str) -> RemediationError {
    RemediationError::Config {
        field: field.to_owned(),
        reason: reason.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_core() {
        let settings = RemediationSettings::default();
        assert_eq!(settings.pending_floor, Duration::minutes(2));
        assert_eq!(settings.partial_after, Duration::minutes(10));
        assert_eq!(settings.abandon_after, Duration::minutes(30));
        assert_eq!(settings.flag_max_age, Duration::minutes(10));
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn validate_rejects_unordered_thresholds() {
        let settings = RemediationSettings::default().with_thresholds(
            Duration::minutes(2),
            Duration::minutes(30),
            Duration::minutes(10),
        );
        assert!(matches!(
            settings.validate(),
            Err(RemediationError::Config { field, .. }) if field == "partial_after"
        ));
    }

    #[test]
    fn oversized_core_values_saturate() {
        let core = RemediationConfig {
            abandon_after_secs: u64::MAX,
            flag_max_age_secs: i64::MAX as u64,
            ..RemediationConfig::default()
        };
        let settings = RemediationSettings::from_core(&core);
        assert_eq!(settings.abandon_after, Duration::MAX);
        assert_eq!(settings.flag_max_age, Duration::MAX);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn validate_rejects_zero_batch() {
        let settings = RemediationSettings::default().with_batch_limit(0);
        assert!(settings.validate().is_err());
    }
}
