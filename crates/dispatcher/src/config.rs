//! 디스패처 / 연속 추적기 설정
//!
//! core의 `[dispatcher]`, `[tracker]`, `[[providers]]` 섹션에서 파생됩니다.

use std::collections::HashMap;
use std::time::Duration;

use scanrelay_core::config::{DispatcherConfig, ProviderConfig, TrackerConfig};
use scanrelay_core::types::ProviderId;

use crate::error::DispatchError;

/// 디스패처 설정
#[derive(Debug, Clone)]
pub struct DispatcherSettings {
    /// 프로바이더별 제한 시간이 없을 때 사용
    pub default_timeout: Duration,
    /// 동시에 진행할 수 있는 프로바이더 호출 수
    pub max_concurrent_calls: usize,
    /// 프로바이더별 설정 (없으면 기본값으로 활성화)
    pub providers: HashMap<ProviderId, ProviderConfig>,
}

impl Default for DispatcherSettings {
    fn default() -> Self {
        Self::from_core(&DispatcherConfig::default(), &[])
    }
}

impl DispatcherSettings {
    pub fn from_core(core: &DispatcherConfig, providers: &[ProviderConfig]) -> Self {
        Self {
            default_timeout: Duration::from_secs(core.default_timeout_secs),
            max_concurrent_calls: core.max_concurrent_calls,
            providers: providers
                .iter()
                .map(|p| (ProviderId::new(p.id.clone()), p.clone()))
                .collect(),
        }
    }

    /// 프로바이더 설정을 추가합니다.
    pub fn with_provider(mut self, config: ProviderConfig) -> Self {
        self.providers
            .insert(ProviderId::new(config.id.clone()), config);
        self
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// 설정 파일에서 비활성화하지 않았으면 `true`
    pub fn is_enabled(&self, provider: &ProviderId) -> bool {
        self.providers.get(provider).is_none_or(|p| p.enabled)
    }

    /// 프로바이더 호출 제한 시간
    pub fn timeout_for(&self, provider: &ProviderId) -> Duration {
        self.providers
            .get(provider)
            .and_then(|p| p.timeout_secs)
            .map(Duration::from_secs)
            .unwrap_or(self.default_timeout)
    }

    /// 어댑터가 비용을 보고하지 않을 때의 호출 단가
    pub fn cost_per_call(&self, provider: &ProviderId) -> f64 {
        self.providers
            .get(provider)
            .map(|p| p.cost_per_call)
            .unwrap_or(0.0)
    }

    /// 누락된 자격 증명 / 엔드포인트
    pub fn missing_configuration(&self, provider: &ProviderId) -> Option<String> {
        self.providers
            .get(provider)
            .and_then(ProviderConfig::missing_configuration)
    }

    pub fn validate(&self) -> Result<(), DispatchError> {
        if self.default_timeout.is_zero() {
            return Err(DispatchError::Config {
                field: "default_timeout".to_owned(),
                reason: "must be positive".to_owned(),
            });
        }
        if self.max_concurrent_calls == 0 {
            return Err(DispatchError::Config {
                field: "max_concurrent_calls".to_owned(),
                reason: "must be at least 1".to_owned(),
            });
        }
        Ok(())
    }
}

/// 연속 추적기 설정
#[derive(Debug, Clone)]
pub struct TrackerSettings {
    pub poll_interval: Duration,
    pub poll_timeout: Duration,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self::from_core(&TrackerConfig::default())
    }
}

impl TrackerSettings {
    pub fn from_core(core: &TrackerConfig) -> Self {
        Self {
            poll_interval: core.poll_interval(),
            poll_timeout: core.poll_timeout(),
        }
    }
}
