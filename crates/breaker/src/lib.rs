//! scanrelay 서킷 브레이커
//!
//! 실패가 반복되는 프로바이더로의 호출을 일시적으로 차단하고,
//! 대기 시간이 지나면 시험 호출 하나로 회복 여부를 확인합니다.
//!
//! # Module Structure
//!
//! - [`error`]: 도메인 에러 (`BreakerError`)
//! - [`config`]: 브레이커 설정 (`CircuitBreakerConfig`)
//! - [`breaker`]: 상태 머신 (`CircuitBreaker`, `CircuitState`, `BreakerSnapshot`)

pub mod breaker;
pub mod config;
pub mod error;

pub use breaker::{BreakerSnapshot, CircuitBreaker, CircuitState};
pub use config::CircuitBreakerConfig;
pub use error::BreakerError;
