//! 시간 공급자: 경과 시간 판정을 테스트에서 결정적으로 만들기 위한 추상화
//!
//! 운영 환경에서는 [`SystemClock`]을, 테스트에서는 [`ManualClock`]을 주입합니다.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};

/// 현재 시각을 제공하는 trait
pub trait Clock: Send + Sync + 'static {
    /// 현재 UTC 시각
    fn now(&self) -> DateTime<Utc>;
}

/// 실제 시스템 시계
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// 수동으로 진행시키는 시계
///
/// 복제본끼리 같은 시각을 공유합니다.
#[derive(Debug, Clone)]
pub struct ManualClock {
    current: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    /// 지정한 시각에서 시작하는 시계를 생성합니다.
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            current: Arc::new(Mutex::new(start)),
        }
    }

    /// 시계를 `delta`만큼 진행합니다.
    pub fn advance(&self, delta: chrono::Duration) {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        *current += delta;
    }

    /// 시계를 지정한 시각으로 설정합니다.
    pub fn set(&self, at: DateTime<Utc>) {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        *current = at;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.current.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_advances_shared_time() {
        let start = DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let clock = ManualClock::new(start);
        let other = clock.clone();

        clock.advance(chrono::Duration::minutes(5));
        assert_eq!(other.now(), start + chrono::Duration::minutes(5));

        other.set(start);
        assert_eq!(clock.now(), start);
    }

    #[test]
    fn system_clock_is_monotonic_enough() {
        let a = SystemClock.now();
        let b = SystemClock.now();
        assert!(b >= a);
    }
}
