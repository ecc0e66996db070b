//! 설정 관리: scanrelay.toml 파싱 및 런타임 설정
//!
//! [`ScanrelayConfig`]는 모든 컴포넌트의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`SCANRELAY_REMEDIATION_ABANDON_AFTER_SECS=3600` 형식)
//! 3. 설정 파일 (`scanrelay.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), scanrelay_core::error::ScanrelayError> {
//! use scanrelay_core::config::ScanrelayConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = ScanrelayConfig::load("scanrelay.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = ScanrelayConfig::parse("[breaker]\nfailure_threshold = 3")?;
//! # Ok(())
//! # }
//! ```

use std::fmt::Display;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, ScanrelayError};

/// 설정 상한값 상수
const MAX_TIMEOUT_SECS: u64 = 600;
const MAX_CONCURRENT_CALLS: usize = 256;
const MAX_FAILURE_THRESHOLD: u32 = 1_000;
const MAX_COOLDOWN_SECS: u64 = 86_400;
const MAX_POLL_INTERVAL_SECS: u64 = 3_600;
const MAX_SWEEP_INTERVAL_SECS: u64 = 86_400;
const MAX_BATCH_LIMIT: usize = 100_000;
const MAX_REMEDIATION_AGE_SECS: u64 = 30 * 86_400;

/// scanrelay 통합 설정
///
/// `scanrelay.toml` 파일의 최상위 구조를 나타냅니다.
/// 각 컴포넌트는 자기 섹션만 읽어 사용합니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanrelayConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub dispatcher: DispatcherConfig,
    #[serde(default)]
    pub breaker: BreakerConfig,
    #[serde(default)]
    pub tracker: TrackerConfig,
    #[serde(default)]
    pub remediation: RemediationConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
    /// SLO 정의 목록
    #[serde(default = "default_slos")]
    pub slo: Vec<SloConfig>,
    /// 프로바이더별 설정
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl Default for ScanrelayConfig {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            store: StoreConfig::default(),
            dispatcher: DispatcherConfig::default(),
            breaker: BreakerConfig::default(),
            tracker: TrackerConfig::default(),
            remediation: RemediationConfig::default(),
            ledger: LedgerConfig::default(),
            slo: default_slos(),
            providers: Vec::new(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl ScanrelayConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ScanrelayError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, ScanrelayError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ScanrelayError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                ScanrelayError::Io(e)
            }
        })?;
        Self::parse(&content)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, ScanrelayError> {
        toml::from_str(toml_str).map_err(|e| {
            ScanrelayError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 프로바이더 설정을 조회합니다.
    pub fn provider(&self, id: &str) -> Option<&ProviderConfig> {
        self.providers.iter().find(|p| p.id == id)
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `SCANRELAY_{SECTION}_{FIELD}`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "SCANRELAY_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "SCANRELAY_GENERAL_LOG_FORMAT");
        override_parsed(
            &mut self.general.event_log_capacity,
            "SCANRELAY_GENERAL_EVENT_LOG_CAPACITY",
        );

        // Store
        override_parsed(
            &mut self.store.reuse_window_secs,
            "SCANRELAY_STORE_REUSE_WINDOW_SECS",
        );

        // Dispatcher
        override_parsed(
            &mut self.dispatcher.default_timeout_secs,
            "SCANRELAY_DISPATCHER_DEFAULT_TIMEOUT_SECS",
        );
        override_parsed(
            &mut self.dispatcher.max_concurrent_calls,
            "SCANRELAY_DISPATCHER_MAX_CONCURRENT_CALLS",
        );

        // Breaker
        override_parsed(
            &mut self.breaker.failure_threshold,
            "SCANRELAY_BREAKER_FAILURE_THRESHOLD",
        );
        override_parsed(
            &mut self.breaker.failure_window_secs,
            "SCANRELAY_BREAKER_FAILURE_WINDOW_SECS",
        );
        override_parsed(&mut self.breaker.cooldown_secs, "SCANRELAY_BREAKER_COOLDOWN_SECS");
        override_parsed(
            &mut self.breaker.max_cooldown_secs,
            "SCANRELAY_BREAKER_MAX_COOLDOWN_SECS",
        );

        // Tracker
        override_parsed(
            &mut self.tracker.poll_interval_secs,
            "SCANRELAY_TRACKER_POLL_INTERVAL_SECS",
        );

        // Remediation
        override_parsed(&mut self.remediation.enabled, "SCANRELAY_REMEDIATION_ENABLED");
        override_parsed(
            &mut self.remediation.sweep_interval_secs,
            "SCANRELAY_REMEDIATION_SWEEP_INTERVAL_SECS",
        );
        override_parsed(
            &mut self.remediation.pending_floor_secs,
            "SCANRELAY_REMEDIATION_PENDING_FLOOR_SECS",
        );
        override_parsed(
            &mut self.remediation.partial_after_secs,
            "SCANRELAY_REMEDIATION_PARTIAL_AFTER_SECS",
        );
        override_parsed(
            &mut self.remediation.abandon_after_secs,
            "SCANRELAY_REMEDIATION_ABANDON_AFTER_SECS",
        );
        override_parsed(
            &mut self.remediation.flag_max_age_secs,
            "SCANRELAY_REMEDIATION_FLAG_MAX_AGE_SECS",
        );

        // Ledger
        override_string(&mut self.ledger.currency, "SCANRELAY_LEDGER_CURRENCY");

        // Metrics
        override_parsed(&mut self.metrics.enabled, "SCANRELAY_METRICS_ENABLED");
        override_string(&mut self.metrics.listen_addr, "SCANRELAY_METRICS_LISTEN_ADDR");
        override_parsed(&mut self.metrics.port, "SCANRELAY_METRICS_PORT");
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), ScanrelayError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        if self.general.event_log_capacity == 0 {
            return Err(invalid("general.event_log_capacity", "must be greater than 0"));
        }

        check_range(
            "dispatcher.default_timeout_secs",
            self.dispatcher.default_timeout_secs,
            1,
            MAX_TIMEOUT_SECS,
        )?;
        if self.dispatcher.max_concurrent_calls == 0
            || self.dispatcher.max_concurrent_calls > MAX_CONCURRENT_CALLS
        {
            return Err(invalid(
                "dispatcher.max_concurrent_calls",
                format!("must be between 1 and {MAX_CONCURRENT_CALLS}"),
            ));
        }

        self.breaker.validate()?;
        check_range(
            "tracker.poll_interval_secs",
            self.tracker.poll_interval_secs,
            1,
            MAX_POLL_INTERVAL_SECS,
        )?;
        check_range(
            "tracker.poll_timeout_secs",
            self.tracker.poll_timeout_secs,
            1,
            MAX_TIMEOUT_SECS,
        )?;
        self.remediation.validate()?;
        self.ledger.validate()?;

        let valid_comparisons = ["at_most", "at_least"];
        for slo in &self.slo {
            if slo.name.is_empty() {
                return Err(invalid("slo.name", "must not be empty"));
            }
            if !valid_comparisons.contains(&slo.comparison.as_str()) {
                return Err(invalid(
                    "slo.comparison",
                    format!(
                        "slo '{}': must be one of: {}",
                        slo.name,
                        valid_comparisons.join(", ")
                    ),
                ));
            }
            if slo.window == 0 {
                return Err(invalid(
                    "slo.window",
                    format!("slo '{}': must be greater than 0", slo.name),
                ));
            }
        }

        let mut seen = std::collections::HashSet::new();
        for provider in &self.providers {
            if provider.id.is_empty() {
                return Err(invalid("providers.id", "must not be empty"));
            }
            if !seen.insert(provider.id.as_str()) {
                return Err(invalid(
                    "providers.id",
                    format!("duplicate provider '{}'", provider.id),
                ));
            }
            if let Some(timeout) = provider.timeout_secs {
                check_range("providers.timeout_secs", timeout, 1, MAX_TIMEOUT_SECS)?;
            }
            if provider.cost_per_call < 0.0 || !provider.cost_per_call.is_finite() {
                return Err(invalid(
                    "providers.cost_per_call",
                    format!("provider '{}': must be a non-negative number", provider.id),
                ));
            }
        }

        if self.metrics.enabled && self.metrics.port == 0 {
            return Err(invalid("metrics.port", "must be non-zero when metrics are enabled"));
        }

        Ok(())
    }
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
    /// 메모리 감사 로그에 보관할 최대 이벤트 수
    pub event_log_capacity: usize,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
            event_log_capacity: 100_000,
        }
    }
}

/// 잡 스토어 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// 같은 대상의 완료된 스캔을 재사용하는 기간 (초, 0이면 재사용 안 함)
    pub reuse_window_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            reuse_window_secs: 3_600,
        }
    }
}

/// 디스패처 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// 프로바이더 호출 기본 제한 시간 (초)
    pub default_timeout_secs: u64,
    /// 스캔 하나당 동시 프로바이더 호출 수
    pub max_concurrent_calls: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            default_timeout_secs: 30,
            max_concurrent_calls: 8,
        }
    }
}

/// 서킷 브레이커 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerConfig {
    /// 서킷을 여는 실패 횟수
    pub failure_threshold: u32,
    /// 실패를 집계하는 창 (초)
    pub failure_window_secs: u64,
    /// 첫 번째 개방 후 대기 시간 (초)
    pub cooldown_secs: u64,
    /// 반복 개방 시 대기 시간 상한 (초)
    pub max_cooldown_secs: u64,
    /// 시험 호출 슬롯을 회수하기까지의 시간 (초)
    pub probe_timeout_secs: u64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            failure_window_secs: 300,
            cooldown_secs: 60,
            max_cooldown_secs: 900,
            probe_timeout_secs: 120,
        }
    }
}

impl BreakerConfig {
    fn validate(&self) -> Result<(), ScanrelayError> {
        if self.failure_threshold == 0 || self.failure_threshold > MAX_FAILURE_THRESHOLD {
            return Err(invalid(
                "breaker.failure_threshold",
                format!("must be between 1 and {MAX_FAILURE_THRESHOLD}"),
            ));
        }
        check_range(
            "breaker.failure_window_secs",
            self.failure_window_secs,
            1,
            MAX_COOLDOWN_SECS,
        )?;
        check_range("breaker.cooldown_secs", self.cooldown_secs, 1, MAX_COOLDOWN_SECS)?;
        check_range(
            "breaker.max_cooldown_secs",
            self.max_cooldown_secs,
            self.cooldown_secs,
            MAX_COOLDOWN_SECS,
        )?;
        check_range(
            "breaker.probe_timeout_secs",
            self.probe_timeout_secs,
            1,
            MAX_COOLDOWN_SECS,
        )
    }
}

/// 비동기 연속 추적 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// 스캔별 폴링 주기 (초)
    pub poll_interval_secs: u64,
    /// 폴링 호출 제한 시간 (초)
    pub poll_timeout_secs: u64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 15,
            poll_timeout_secs: 10,
        }
    }
}

impl TrackerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_secs(self.poll_timeout_secs)
    }
}

/// 정체된 스캔 정리 설정
///
/// 기본 임계값(2분 / 10분 / 30분)은 경험적으로 정해진 값이므로
/// 프로바이더 특성에 맞게 조정합니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemediationConfig {
    /// 주기적 스윕 활성화 여부
    pub enabled: bool,
    /// 스윕 주기 (초)
    pub sweep_interval_secs: u64,
    /// `pending` 상태 스캔의 정리 하한 (초)
    pub pending_floor_secs: u64,
    /// 부분 완료/시간 초과로 정리하는 기준 (초)
    pub partial_after_secs: u64,
    /// 포기(failed)로 정리하는 기준 (초)
    pub abandon_after_secs: u64,
    /// 비동기 대기 플래그 최대 유지 시간 (초)
    pub flag_max_age_secs: u64,
    /// 스윕 한 번에 검사할 최대 스캔 수
    pub batch_limit: usize,
}

impl Default for RemediationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sweep_interval_secs: 60,
            pending_floor_secs: 120,
            partial_after_secs: 600,
            abandon_after_secs: 1_800,
            flag_max_age_secs: 600,
            batch_limit: 500,
        }
    }
}

impl RemediationConfig {
    fn validate(&self) -> Result<(), ScanrelayError> {
        check_range(
            "remediation.sweep_interval_secs",
            self.sweep_interval_secs,
            1,
            MAX_SWEEP_INTERVAL_SECS,
        )?;
        if self.pending_floor_secs == 0 {
            return Err(invalid("remediation.pending_floor_secs", "must be greater than 0"));
        }
        if self.pending_floor_secs > self.partial_after_secs {
            return Err(invalid(
                "remediation.pending_floor_secs",
                "must not exceed partial_after_secs",
            ));
        }
        if self.partial_after_secs >= self.abandon_after_secs {
            return Err(invalid(
                "remediation.partial_after_secs",
                "must be less than abandon_after_secs",
            ));
        }
        check_range(
            "remediation.abandon_after_secs",
            self.abandon_after_secs,
            1,
            MAX_REMEDIATION_AGE_SECS,
        )?;
        check_range(
            "remediation.flag_max_age_secs",
            self.flag_max_age_secs,
            1,
            MAX_REMEDIATION_AGE_SECS,
        )?;
        if self.batch_limit == 0 || self.batch_limit > MAX_BATCH_LIMIT {
            return Err(invalid(
                "remediation.batch_limit",
                format!("must be between 1 and {MAX_BATCH_LIMIT}"),
            ));
        }
        Ok(())
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

/// 비용 원장 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// 통화 코드 (ISO 4217)
    pub currency: String,
    /// 프로바이더별로 보관하는 호출 샘플 수
    pub sample_capacity: usize,
    /// 프로바이더별 예산
    pub budgets: Vec<BudgetConfig>,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            currency: "GBP".to_owned(),
            sample_capacity: 10_000,
            budgets: Vec::new(),
        }
    }
}

impl LedgerConfig {
    fn validate(&self) -> Result<(), ScanrelayError> {
        if self.currency.len() != 3 || !self.currency.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(invalid(
                "ledger.currency",
                "must be a three-letter uppercase ISO 4217 code",
            ));
        }
        if self.sample_capacity == 0 {
            return Err(invalid("ledger.sample_capacity", "must be greater than 0"));
        }
        for budget in &self.budgets {
            if budget.provider.is_empty() {
                return Err(invalid("ledger.budgets.provider", "must not be empty"));
            }
            for limit in [budget.daily_limit, budget.monthly_limit].into_iter().flatten() {
                if limit <= 0.0 || !limit.is_finite() {
                    return Err(invalid(
                        "ledger.budgets.limit",
                        format!("provider '{}': limits must be positive", budget.provider),
                    ));
                }
            }
            if !(0.0 < budget.warn_pct && budget.warn_pct < budget.critical_pct) {
                return Err(invalid(
                    "ledger.budgets.warn_pct",
                    format!(
                        "provider '{}': must satisfy 0 < warn_pct < critical_pct",
                        budget.provider
                    ),
                ));
            }
        }
        Ok(())
    }
}

/// 프로바이더 예산
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetConfig {
    pub provider: String,
    /// 일일 한도 (없으면 일일 알림 없음)
    #[serde(default)]
    pub daily_limit: Option<f64>,
    /// 월간 한도
    #[serde(default)]
    pub monthly_limit: Option<f64>,
    /// 경고 알림 기준 (%)
    #[serde(default = "default_warn_pct")]
    pub warn_pct: f64,
    /// 위험 알림 기준 (%)
    #[serde(default = "default_critical_pct")]
    pub critical_pct: f64,
}

fn default_warn_pct() -> f64 {
    80.0
}

fn default_critical_pct() -> f64 {
    95.0
}

/// SLO 정의
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SloConfig {
    pub name: String,
    pub target: f64,
    /// 비교 방식 (at_most, at_least)
    #[serde(default = "default_comparison")]
    pub comparison: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// 준수율 계산에 사용할 최근 측정값 수
    #[serde(default = "default_slo_window")]
    pub window: usize,
}

fn default_comparison() -> String {
    "at_most".to_owned()
}

fn default_true() -> bool {
    true
}

fn default_slo_window() -> usize {
    1_000
}

fn default_slos() -> Vec<SloConfig> {
    vec![
        SloConfig {
            name: "provider_call_latency_ms".to_owned(),
            target: 5_000.0,
            comparison: "at_most".to_owned(),
            enabled: true,
            window: default_slo_window(),
        },
        SloConfig {
            name: "provider_call_success".to_owned(),
            target: 1.0,
            comparison: "at_least".to_owned(),
            enabled: true,
            window: default_slo_window(),
        },
        SloConfig {
            name: "scan_completion_secs".to_owned(),
            target: 600.0,
            comparison: "at_most".to_owned(),
            enabled: true,
            window: default_slo_window(),
        },
    ]
}

/// 프로바이더 설정
///
/// 어댑터 자체는 코드에서 등록하며, 이 섹션은 활성화 여부와
/// 자격 증명 / 엔드포인트 / 제한 시간 / 호출 단가를 제공합니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub id: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// 호출 엔드포인트 (지정했다면 비어 있으면 안 됨)
    #[serde(default)]
    pub endpoint: Option<String>,
    /// 자격 증명을 담은 환경변수 이름
    #[serde(default)]
    pub credential_env: Option<String>,
    /// 호출 제한 시간 (없으면 디스패처 기본값)
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    /// 어댑터가 비용을 보고하지 않을 때 사용할 호출 단가
    #[serde(default)]
    pub cost_per_call: f64,
}

impl ProviderConfig {
    /// 기본값으로 채운 프로바이더 설정을 생성합니다.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            enabled: true,
            endpoint: None,
            credential_env: None,
            timeout_secs: None,
            cost_per_call: 0.0,
        }
    }

    /// 자격 증명과 엔드포인트가 갖춰졌는지 확인합니다.
    ///
    /// 문제가 있으면 사람이 읽을 수 있는 사유를 반환합니다.
    pub fn missing_configuration(&self) -> Option<String> {
        if let Some(endpoint) = &self.endpoint
            && endpoint.trim().is_empty()
        {
            return Some(format!("provider '{}' has an empty endpoint", self.id));
        }
        if let Some(env_key) = &self.credential_env {
            match std::env::var(env_key) {
                Ok(value) if !value.trim().is_empty() => {}
                _ => {
                    return Some(format!(
                        "provider '{}' credential {} is not set",
                        self.id, env_key
                    ));
                }
            }
        }
        None
    }
}

/// Prometheus 메트릭 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub listen_addr: String,
    pub port: u16,
    pub endpoint: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "127.0.0.1".to_owned(),
            port: 9_464,
            endpoint: "/metrics".to_owned(),
        }
    }
}

// --- 검증 헬퍼 ---

fn invalid(field: &str, reason: impl Into<String>) -> ScanrelayError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason: reason.into(),
    }
    .into()
}

fn check_range(field: &str, value: u64, min: u64, max: u64) -> Result<(), ScanrelayError> {
    if value < min || value > max {
        return Err(invalid(field, format!("must be between {min} and {max}")));
    }
    Ok(())
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_parsed<T>(target: &mut T, env_key: &str)
where
    T: FromStr,
    T::Err: Display,
{
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<T>() {
            Ok(parsed) => *target = parsed,
            Err(e) => warn!(
                env_key,
                value = val.as_str(),
                error = %e,
                "failed to parse env var, ignoring"
            ),
        }
    }
}
