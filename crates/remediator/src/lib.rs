//! scanrelay 정체된 스캔 정리
//!
//! 프로바이더 응답이 끝내 오지 않아 멈춘 스캔을 경과 시간 규칙에 따라
//! 종료 상태로 전이하고, 오래된 비동기 대기 플래그를 해제합니다.
//!
//! # Module Structure
//!
//! - [`error`]: 도메인 에러 (`RemediationError`)
//! - [`config`]: 임계값 설정 (`RemediationSettings`)
//! - [`classify`]: 순수 분류 규칙 (`classify`, `Verdict`)
//! - [`sweep`]: 스윕 실행 (`StuckJobRemediator`, `SweepReport`)
//! - [`scheduler`]: 주기 실행 (`RemediationScheduler`)

pub mod classify;
pub mod config;
pub mod error;
pub mod scheduler;
pub mod sweep;

pub use classify::{Rule, Verdict, classify};
pub use config::RemediationSettings;
pub use error::RemediationError;
pub use scheduler::RemediationScheduler;
pub use sweep::{RemediationAction, StuckJobRemediator, SweepReport};
