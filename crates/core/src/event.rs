//! 감사 이벤트 로그: 모든 상태 전이를 추가 전용으로 기록
//!
//! [`ScanEvent`]는 한 번 기록되면 변경되지 않으며, 스캔보다 오래 남습니다.
//! 이벤트 로그는 감사 용도로만 사용하며 실시간 판단에는 쓰지 않습니다.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::metrics as m;
use crate::types::{ProviderId, ScanId};

// --- 단계(stage) 상수 ---

/// 디스패치 단계
pub const STAGE_DISPATCH: &str = "dispatch";
/// 서킷 브레이커 상태 전이
pub const STAGE_CIRCUIT_BREAKER: &str = "circuit_breaker";
/// 비동기 연속 추적
pub const STAGE_CONTINUATION: &str = "continuation";
/// 정리(remediation) 작업
pub const STAGE_REMEDIATION: &str = "remediation";
/// 예산 알림
pub const STAGE_BUDGET: &str = "budget";
/// 스캔 상태 전이
pub const STAGE_LIFECYCLE: &str = "lifecycle";

/// 특정 프로바이더와 무관한 이벤트의 provider 값
pub const PROVIDER_SYSTEM: &str = "system";

/// 감사 이벤트
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanEvent {
    pub id: Uuid,
    /// 관련 스캔 (브레이커/원장 이벤트는 없음)
    pub scan_id: Option<ScanId>,
    pub provider: String,
    pub stage: String,
    pub status: String,
    pub error_message: Option<String>,
    /// 추가 정보 (JSON 객체)
    pub metadata: serde_json::Map<String, serde_json::Value>,
    pub timestamp: DateTime<Utc>,
}

impl ScanEvent {
    /// 시스템 이벤트를 생성합니다.
    pub fn new(stage: impl Into<String>, status: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            scan_id: None,
            provider: PROVIDER_SYSTEM.to_owned(),
            stage: stage.into(),
            status: status.into(),
            error_message: None,
            metadata: serde_json::Map::new(),
            timestamp: at,
        }
    }

    /// 관련 스캔을 지정합니다.
    pub fn scan(mut self, scan_id: ScanId) -> Self {
        self.scan_id = Some(scan_id);
        self
    }

    /// 관련 프로바이더를 지정합니다.
    pub fn provider(mut self, provider: &ProviderId) -> Self {
        self.provider = provider.as_str().to_owned();
        self
    }

    /// 에러 메시지를 지정합니다.
    pub fn error(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }

    /// 메타데이터 항목을 추가합니다.
    pub fn meta(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.to_owned(), value.into());
        self
    }
}

/// 감사 이벤트 저장소
///
/// 구현체는 기록 실패를 호출자에게 전파하지 않아야 합니다.
pub trait EventLog: Send + Sync {
    /// 이벤트를 추가합니다.
    fn append(&self, event: ScanEvent);

    /// 특정 스캔의 이벤트를 기록 순서대로 반환합니다.
    fn for_scan(&self, scan_id: ScanId) -> Vec<ScanEvent>;

    /// 최근 이벤트를 최신순으로 최대 `limit`개 반환합니다.
    fn recent(&self, limit: usize) -> Vec<ScanEvent>;

    /// 보관 중인 이벤트 수
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// 메모리 기반 이벤트 로그
///
/// 용량을 초과하면 가장 오래된 이벤트부터 버립니다.
pub struct MemoryEventLog {
    events: Mutex<VecDeque<ScanEvent>>,
    capacity: usize,
    evicted: AtomicU64,
}

impl MemoryEventLog {
    /// 지정한 용량으로 로그를 생성합니다 (최소 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: Mutex::new(VecDeque::with_capacity(capacity.min(4096))),
            capacity,
            evicted: AtomicU64::new(0),
        }
    }

    /// 용량 초과로 버려진 이벤트 수
    pub fn evicted(&self) -> u64 {
        self.evicted.load(Ordering::Relaxed)
    }

    /// 단계별 필터링
    pub fn by_stage(&self, stage: &str) -> Vec<ScanEvent> {
        let events = self.events.lock().unwrap_or_else(|e| e.into_inner());
        events.iter().filter(|e| e.stage == stage).cloned().collect()
    }
}

impl Default for MemoryEventLog {
    fn default() -> Self {
        Self::new(100_000)
    }
}

impl EventLog for MemoryEventLog {
    fn append(&self, event: ScanEvent) {
        debug!(
            scan_id = ?event.scan_id,
            provider = %event.provider,
            stage = %event.stage,
            status = %event.status,
            "audit event"
        );
        metrics::counter!(m::EVENTS_APPENDED_TOTAL, m::LABEL_STAGE => event.stage.clone())
            .increment(1);

        let mut events = self.events.lock().unwrap_or_else(|e| e.into_inner());
        if events.len() >= self.capacity {
            events.pop_front();
            self.evicted.fetch_add(1, Ordering::Relaxed);
        }
        events.push_back(event);
    }

    fn for_scan(&self, scan_id: ScanId) -> Vec<ScanEvent> {
        let events = self.events.lock().unwrap_or_else(|e| e.into_inner());
        events
            .iter()
            .filter(|e| e.scan_id == Some(scan_id))
            .cloned()
            .collect()
    }

    fn recent(&self, limit: usize) -> Vec<ScanEvent> {
        let events = self.events.lock().unwrap_or_else(|e| e.into_inner());
        events.iter().rev().take(limit).cloned().collect()
    }

    fn len(&self) -> usize {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}
