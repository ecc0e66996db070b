//! scanrelay 비용 원장과 SLO 모니터
//!
//! # Module Structure
//!
//! - [`error`]: 도메인 에러 (`LedgerError`)
//! - [`config`]: 원장/SLO 설정 (`CostLedgerConfig`, `SloDefinition`)
//! - [`ledger`]: 비용 기록, 예산 알림, 프로바이더 통계 (`CostLedger`)
//! - [`slo`]: SLO 준수율 (`SloMonitor`)

pub mod config;
pub mod error;
pub mod ledger;
pub mod slo;

pub use config::{BudgetLimits, Comparison, CostLedgerConfig, SloDefinition};
pub use error::LedgerError;
pub use ledger::{AlertLevel, BudgetAlert, BudgetRecord, CallSample, CostLedger, ProviderMetrics};
pub use slo::{
    SLO_PROVIDER_CALL_LATENCY_MS, SLO_PROVIDER_CALL_SUCCESS, SLO_SCAN_COMPLETION_SECS,
    SloMeasurement, SloMonitor, SloStatus,
};
