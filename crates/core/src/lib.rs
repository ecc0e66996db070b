//! scanrelay 공통 기반 크레이트
//!
//! 스캔/발견 항목/디스패치 기록 같은 도메인 타입, 통합 설정, 에러 계층,
//! 감사 이벤트 로그, 메트릭 이름, 컴포넌트 생명주기 trait을 제공합니다.

pub mod clock;
pub mod config;
pub mod error;
pub mod event;
pub mod metrics;
pub mod pipeline;
pub mod types;

// --- 주요 타입 re-export ---

// 에러
pub use error::{
    ConfigError, OrchestrationError, PipelineError, ProviderError, ResilienceError,
    ScanrelayError, StoreError,
};

// 설정
pub use config::ScanrelayConfig;

// 시간
pub use clock::{Clock, ManualClock, SystemClock};

// 이벤트
pub use event::{EventLog, MemoryEventLog, ScanEvent};

// 생명주기 trait
pub use pipeline::{BoxFuture, DynPipeline, HealthStatus, Pipeline};

// 도메인 타입
pub use types::{
    BudgetPeriod, Capability, DispatchOutcome, DispatchState, Finding, FindingDraft,
    ProviderDispatch, ProviderId, Scan, ScanId, ScanStatus, Severity, Target, TargetKind,
};
