//! scanrelay 잡 스토어
//!
//! 스캔, 프로바이더 디스패치 기록, 발견 항목을 보관합니다.
//! 모든 상태 변경은 조건부 쓰기이므로 디스패처와 정리 작업이 같은 스캔을
//! 동시에 갱신해도 종료 상태가 덮어써지지 않습니다.
//!
//! # 주요 타입
//! - [`JobStore`]: 스토어 추상화
//! - [`MemoryJobStore`]: 프로세스 내 구현
//! - [`ScanApi`]: 스캔 생성/조회, 결과 재사용

pub mod api;
pub mod memory;
pub mod store;

pub use api::{ScanApi, ScanView};
pub use memory::MemoryJobStore;
pub use store::JobStore;
