//! 비용 원장 / SLO 설정
//!
//! core의 `[ledger]`, `[[slo]]` 섹션에서 파생됩니다.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use scanrelay_core::config::{LedgerConfig, SloConfig};
use scanrelay_core::types::{BudgetPeriod, ProviderId};

/// 프로바이더 하나의 예산 한도
#[derive(Debug, Clone, PartialEq)]
pub struct BudgetLimits {
    pub daily_limit: Option<f64>,
    pub monthly_limit: Option<f64>,
    pub warn_pct: f64,
    pub critical_pct: f64,
}

impl BudgetLimits {
    /// 기간별 한도
    pub fn limit_for(&self, period: BudgetPeriod) -> Option<f64> {
        match period {
            BudgetPeriod::Daily => self.daily_limit,
            BudgetPeriod::Monthly => self.monthly_limit,
        }
    }
}

/// 비용 원장 설정
#[derive(Debug, Clone)]
pub struct CostLedgerConfig {
    pub currency: String,
    /// 프로바이더별 호출 샘플 보관 수
    pub sample_capacity: usize,
    pub budgets: HashMap<ProviderId, BudgetLimits>,
}

impl Default for CostLedgerConfig {
    fn default() -> Self {
        Self::from_core(&LedgerConfig::default())
    }
}

impl CostLedgerConfig {
    pub fn from_core(core: &LedgerConfig) -> Self {
        let budgets = core
            .budgets
            .iter()
            .map(|b| {
                (
                    ProviderId::new(b.provider.clone()),
                    BudgetLimits {
                        daily_limit: b.daily_limit,
                        monthly_limit: b.monthly_limit,
                        warn_pct: b.warn_pct,
                        critical_pct: b.critical_pct,
                    },
                )
            })
            .collect();
        Self {
            currency: core.currency.clone(),
            sample_capacity: core.sample_capacity.max(1),
            budgets,
        }
    }

    /// 예산을 추가합니다.
    pub fn with_budget(mut self, provider: impl Into<ProviderId>, limits: BudgetLimits) -> Self {
        self.budgets.insert(provider.into(), limits);
        self
    }
}

/// SLO 비교 방식
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    /// 측정값 <= 목표
    AtMost,
    /// 측정값 >= 목표
    AtLeast,
}

impl Comparison {
    /// 설정 문자열을 해석합니다. 알 수 없는 값은 `None`.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "at_most" => Some(Self::AtMost),
            "at_least" => Some(Self::AtLeast),
            _ => None,
        }
    }

    /// 측정값이 목표를 만족하는지 여부
    pub fn is_met(&self, value: f64, target: f64) -> bool {
        match self {
            Self::AtMost => value <= target,
            Self::AtLeast => value >= target,
        }
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AtMost => f.write_str("at_most"),
            Self::AtLeast => f.write_str("at_least"),
        }
    }
}

/// SLO 정의
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SloDefinition {
    pub name: String,
    pub target: f64,
    pub comparison: Comparison,
    pub enabled: bool,
    /// 준수율 계산에 쓰는 최근 측정값 수
    pub window: usize,
}

impl SloDefinition {
    pub fn new(name: impl Into<String>, target: f64, comparison: Comparison) -> Self {
        Self {
            name: name.into(),
            target,
            comparison,
            enabled: true,
            window: 1_000,
        }
    }

    /// core 설정에서 정의 목록을 만듭니다. 비교 방식이 잘못된 항목은 건너뜁니다.
    pub fn from_core(slos: &[SloConfig]) -> Vec<Self> {
        slos.iter()
            .filter_map(|slo| {
                let comparison = Comparison::parse(&slo.comparison)?;
                Some(Self {
                    name: slo.name.clone(),
                    target: slo.target,
                    comparison,
                    enabled: slo.enabled,
                    window: slo.window.max(1),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scanrelay_core::config::{BudgetConfig, ScanrelayConfig};

    #[test]
    fn ledger_config_from_core() {
        let core = LedgerConfig {
            currency: "EUR".to_owned(),
            sample_capacity: 50,
            budgets: vec![BudgetConfig {
                provider: "hibp".to_owned(),
                daily_limit: Some(5.0),
                monthly_limit: None,
                warn_pct: 80.0,
                critical_pct: 95.0,
            }],
        };
        let config = CostLedgerConfig::from_core(&core);
        assert_eq!(config.currency, "EUR");
        let limits = &config.budgets[&ProviderId::new("hibp")];
        assert_eq!(limits.limit_for(BudgetPeriod::Daily), Some(5.0));
        assert_eq!(limits.limit_for(BudgetPeriod::Monthly), None);
    }

    #[test]
    fn default_slos_are_converted() {
        let config = ScanrelayConfig::default();
        let slos = SloDefinition::from_core(&config.slo);
        assert_eq!(slos.len(), 3);
        assert_eq!(slos[1].comparison, Comparison::AtLeast);
    }

    #[test]
    fn comparison_semantics() {
        assert!(Comparison::AtMost.is_met(5_000.0, 5_000.0));
        assert!(!Comparison::AtMost.is_met(5_001.0, 5_000.0));
        assert!(Comparison::AtLeast.is_met(1.0, 1.0));
        assert!(!Comparison::AtLeast.is_met(0.0, 1.0));
        assert_eq!(Comparison::parse("between"), None);
    }
}
