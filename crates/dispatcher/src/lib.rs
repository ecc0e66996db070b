//! scanrelay 프로바이더 디스패치와 비동기 연속 추적
//!
//! 스캔 하나를 적용 가능한 모든 프로바이더에 동시에 보내고, 서킷 브레이커와
//! 비용 원장에 결과를 반영한 뒤 스캔 상태를 확정합니다. 비동기 프로바이더의
//! 결과는 [`ContinuationTracker`]가 폴링 또는 푸시로 수집합니다.
//!
//! # Module Structure
//!
//! - [`error`]: 도메인 에러 (`DispatchError`)
//! - [`config`]: 디스패처/추적기 설정 (`DispatcherSettings`, `TrackerSettings`)
//! - [`provider`]: 프로바이더 어댑터와 레지스트리
//! - [`context`]: 공유 의존성 (`DispatchContext`)
//! - [`finalize`]: 상태 확정 규칙 (`ScanFinalizer`)
//! - [`dispatcher`]: 디스패치 (`Dispatcher`, `DispatchReport`)
//! - [`continuation`]: 비동기 결과 수집 (`ContinuationTracker`, `ContinuationService`)

pub mod config;
pub mod context;
pub mod continuation;
pub mod dispatcher;
pub mod error;
pub mod finalize;
pub mod provider;

#[cfg(any(test, feature = "test-util"))]
pub mod mock;

pub use config::{DispatcherSettings, TrackerSettings};
pub use context::DispatchContext;
pub use continuation::{ContinuationService, ContinuationTracker};
pub use dispatcher::{
    CallDisposition, DispatchReport, Dispatcher, ProviderCall, REASON_CIRCUIT_OPEN,
};
pub use error::DispatchError;
pub use finalize::ScanFinalizer;
pub use provider::{
    Ack, AsyncProvider, PollResponse, ProviderAdapter, ProviderRegistry, SyncProvider,
    SyncResponse,
};
