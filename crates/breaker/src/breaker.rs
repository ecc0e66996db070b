//! 프로바이더별 서킷 브레이커
//!
//! # 상태 전이
//! ```text
//! closed --(창 안의 실패 >= 임계값)--> open
//! open --(대기 시간 경과 후 첫 확인)--> half_open (시험 호출 1개)
//! half_open --(시험 성공)--> closed
//! half_open --(시험 실패)--> open (대기 시간 2배, 상한 고정)
//! ```
//!
//! 프로바이더 간에는 잠금을 공유하지 않습니다. 바깥 맵 잠금은 조회/삽입에만
//! 쓰이고, 상태 갱신은 프로바이더별 잠금 아래에서 직렬화됩니다.
//!
//! 내부 잠금이 오염되면 브레이커는 열림(fail-open)으로 동작합니다.
//! 호출은 허용되고 결과 기록은 로그만 남기고 무시됩니다.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use scanrelay_core::clock::Clock;
use scanrelay_core::event::{EventLog, STAGE_CIRCUIT_BREAKER, ScanEvent};
use scanrelay_core::metrics as m;
use scanrelay_core::types::ProviderId;

use crate::config::CircuitBreakerConfig;
use crate::error::BreakerError;

// ─── 상태 ────────────────────────────────────────────────────────────

/// 서킷 상태
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// 정상, 모든 호출 허용
    #[default]
    Closed,
    /// 차단, 대기 시간까지 호출 거부
    Open,
    /// 시험 호출 1개만 허용
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }

    /// 게이지 값 (0=closed, 1=half_open, 2=open)
    fn gauge_value(&self) -> f64 {
        match self {
            Self::Closed => 0.0,
            Self::HalfOpen => 1.0,
            Self::Open => 2.0,
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 관리 화면용 브레이커 상태 스냅샷
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakerSnapshot {
    pub provider: ProviderId,
    pub state: CircuitState,
    /// 실패 창 안의 실패 수
    pub failure_count: u32,
    pub total_trips: u64,
    pub total_calls_blocked: u64,
    pub consecutive_reopens: u32,
    pub last_transition_at: Option<DateTime<Utc>>,
    pub next_attempt_at: Option<DateTime<Utc>>,
    pub last_failure_at: Option<DateTime<Utc>>,
    pub last_success_at: Option<DateTime<Utc>>,
}

/// 프로바이더 하나의 브레이커 상태
#[derive(Debug, Default)]
struct BreakerEntry {
    state: CircuitState,
    failures: VecDeque<DateTime<Utc>>,
    total_trips: u64,
    total_calls_blocked: u64,
    consecutive_reopens: u32,
    last_transition_at: Option<DateTime<Utc>>,
    next_attempt_at: Option<DateTime<Utc>>,
    probe_claimed_at: Option<DateTime<Utc>>,
    last_failure_at: Option<DateTime<Utc>>,
    last_success_at: Option<DateTime<Utc>>,
}

impl BreakerEntry {
    fn snapshot(&self, provider: &ProviderId) -> BreakerSnapshot {
        BreakerSnapshot {
            provider: provider.clone(),
            state: self.state,
            failure_count: u32::try_from(self.failures.len()).unwrap_or(u32::MAX),
            total_trips: self.total_trips,
            total_calls_blocked: self.total_calls_blocked,
            consecutive_reopens: self.consecutive_reopens,
            last_transition_at: self.last_transition_at,
            next_attempt_at: self.next_attempt_at,
            last_failure_at: self.last_failure_at,
            last_success_at: self.last_success_at,
        }
    }

    fn prune_failures(&mut self, now: DateTime<Utc>, window: chrono::Duration) {
        while let Some(oldest) = self.failures.front() {
            if now - *oldest > window {
                self.failures.pop_front();
            } else {
                break;
            }
        }
    }
}

/// 전이 원인 (감사 이벤트 메타데이터)
#[derive(Debug, Clone, Copy)]
enum Trigger {
    FailureThreshold,
    CooldownElapsed,
    ProbeSucceeded,
    ProbeFailed,
    ManualTrip,
    ManualReset,
}

impl Trigger {
    fn as_str(&self) -> &'static str {
        match self {
            Self::FailureThreshold => "failure_threshold",
            Self::CooldownElapsed => "cooldown_elapsed",
            Self::ProbeSucceeded => "probe_succeeded",
            Self::ProbeFailed => "probe_failed",
            Self::ManualTrip => "manual_trip",
            Self::ManualReset => "manual_reset",
        }
    }
}

// ─── 브레이커 ────────────────────────────────────────────────────────

/// 프로바이더별 서킷 브레이커
///
/// `Arc<CircuitBreaker>`로 디스패처, 연속 추적기, 관리 화면이 공유합니다.
/// 처음 보는 프로바이더는 `closed` 상태로 생성됩니다.
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    clock: Arc<dyn Clock>,
    events: Arc<dyn EventLog>,
    entries: Mutex<HashMap<ProviderId, Arc<Mutex<BreakerEntry>>>>,
}

impl CircuitBreaker {
    pub fn new(
        config: CircuitBreakerConfig,
        clock: Arc<dyn Clock>,
        events: Arc<dyn EventLog>,
    ) -> Self {
        Self {
            config,
            clock,
            events,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    fn entry(&self, provider: &ProviderId) -> Option<Arc<Mutex<BreakerEntry>>> {
        match self.entries.lock() {
            Ok(mut entries) => Some(entries.entry(provider.clone()).or_default().clone()),
            Err(_) => {
                warn!(provider = %provider, "breaker table poisoned, failing open");
                None
            }
        }
    }

    /// 호출 가능 여부를 확인합니다.
    ///
    /// `open` 상태에서 대기 시간이 지난 뒤 첫 확인은 `half_open`으로 전이하며
    /// 시험 호출 슬롯을 차지합니다. `half_open`에서는 슬롯이 비어 있거나
    /// `probe_timeout`보다 오래 점유된 경우에만 `true`를 반환합니다.
    pub fn is_eligible(&self, provider: &ProviderId) -> bool {
        let Some(entry) = self.entry(provider) else {
            return true;
        };
        let mut entry = match entry.lock() {
            Ok(entry) => entry,
            Err(_) => {
                warn!(provider = %provider, "breaker state poisoned, failing open");
                return true;
            }
        };
        let now = self.clock.now();
        let state = entry.state;
        let probe_claimed_at = entry.probe_claimed_at;

        match state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let ready = entry.next_attempt_at.is_none_or(|at| now >= at);
                if ready {
                    self.transition(
                        provider,
                        &mut entry,
                        CircuitState::HalfOpen,
                        Trigger::CooldownElapsed,
                        now,
                    );
                    entry.probe_claimed_at = Some(now);
                    true
                } else {
                    self.block(provider, &mut entry);
                    false
                }
            }
            CircuitState::HalfOpen => match probe_claimed_at {
                Some(claimed) if now - claimed < self.config.probe_timeout => {
                    self.block(provider, &mut entry);
                    false
                }
                Some(claimed) => {
                    warn!(
                        provider = %provider,
                        claimed_at = %claimed,
                        "probe slot expired, reclaiming"
                    );
                    entry.probe_claimed_at = Some(now);
                    true
                }
                None => {
                    entry.probe_claimed_at = Some(now);
                    true
                }
            },
        }
    }

    /// 호출 결과를 기록합니다.
    pub fn record_outcome(&self, provider: &ProviderId, success: bool) {
        let Some(entry) = self.entry(provider) else {
            return;
        };
        let mut entry = match entry.lock() {
            Ok(entry) => entry,
            Err(_) => {
                warn!(provider = %provider, success, "breaker state poisoned, outcome dropped");
                return;
            }
        };
        let now = self.clock.now();

        if success {
            entry.last_success_at = Some(now);
        } else {
            entry.last_failure_at = Some(now);
        }

        match (entry.state, success) {
            (CircuitState::Closed, true) => entry.failures.clear(),
            (CircuitState::Closed, false) => {
                entry.failures.push_back(now);
                entry.prune_failures(now, self.config.failure_window);
                let failures = entry.failures.len();
                debug!(provider = %provider, failures, "provider failure recorded");
                if failures >= self.config.failure_threshold as usize {
                    entry.consecutive_reopens = 0;
                    self.open(provider, &mut entry, Trigger::FailureThreshold, now);
                }
            }
            (CircuitState::HalfOpen, true) => {
                entry.consecutive_reopens = 0;
                entry.failures.clear();
                entry.next_attempt_at = None;
                entry.probe_claimed_at = None;
                self.transition(
                    provider,
                    &mut entry,
                    CircuitState::Closed,
                    Trigger::ProbeSucceeded,
                    now,
                );
            }
            (CircuitState::HalfOpen, false) => {
                entry.consecutive_reopens = entry.consecutive_reopens.saturating_add(1);
                self.open(provider, &mut entry, Trigger::ProbeFailed, now);
            }
            // 개방 전에 시작된 호출의 결과
            (CircuitState::Open, _) => {}
        }
    }

    /// `is_eligible`로 허가받지 않은 결과를 기록합니다 (비동기 폴링 / 외부 전달).
    ///
    /// `closed`에서는 `record_outcome`과 같고, `open`/`half_open`에서는 무시합니다.
    /// 회복 여부는 시험 호출만 판정합니다.
    pub fn record_background_outcome(&self, provider: &ProviderId, success: bool) {
        if self.state(provider) == CircuitState::Closed {
            self.record_outcome(provider, success);
        } else {
            debug!(provider = %provider, success, "background outcome ignored while circuit is not closed");
        }
    }

    /// 판정 없이 끝난 시험 호출의 슬롯을 반환합니다.
    ///
    /// 상태는 `half_open`으로 유지되며 다음 확인이 바로 시험 호출이 됩니다.
    pub fn release_trial_slot(&self, provider: &ProviderId) {
        let Some(entry) = self.entry(provider) else {
            return;
        };
        match entry.lock() {
            Ok(mut entry) => {
                if entry.state == CircuitState::HalfOpen && entry.probe_claimed_at.take().is_some() {
                    debug!(provider = %provider, "trial slot released without verdict");
                }
            }
            Err(_) => warn!(provider = %provider, "breaker state poisoned, trial slot release dropped"),
        }
    }

    /// 서킷을 강제로 엽니다.
    pub fn trip(&self, provider: &ProviderId) -> Result<BreakerSnapshot, BreakerError> {
        let entry = self
            .entry(provider)
            .ok_or_else(|| BreakerError::Poisoned(provider.to_string()))?;
        let mut entry = entry
            .lock()
            .map_err(|_| BreakerError::Poisoned(provider.to_string()))?;
        let now = self.clock.now();
        entry.consecutive_reopens = 0;
        self.open(provider, &mut entry, Trigger::ManualTrip, now);
        Ok(entry.snapshot(provider))
    }

    /// 서킷을 닫고 실패 기록을 지웁니다.
    ///
    /// 상태 잠금이 오염되었으면 새 상태로 교체합니다.
    pub fn reset(&self, provider: &ProviderId) -> Result<BreakerSnapshot, BreakerError> {
        let now = self.clock.now();
        let fresh = Arc::new(Mutex::new(BreakerEntry::default()));
        let previous = {
            let mut entries = self
                .entries
                .lock()
                .map_err(|_| BreakerError::Poisoned(provider.to_string()))?;
            entries.insert(provider.clone(), fresh.clone())
        };

        let mut entry = fresh
            .lock()
            .map_err(|_| BreakerError::Poisoned(provider.to_string()))?;
        if let Some(Ok(old)) = previous.as_ref().map(|p| p.lock()) {
            entry.state = old.state;
            entry.total_trips = old.total_trips;
            entry.total_calls_blocked = old.total_calls_blocked;
            entry.last_failure_at = old.last_failure_at;
            entry.last_success_at = old.last_success_at;
        }
        self.transition(provider, &mut entry, CircuitState::Closed, Trigger::ManualReset, now);
        Ok(entry.snapshot(provider))
    }

    /// 프로바이더의 상태 스냅샷
    pub fn snapshot(&self, provider: &ProviderId) -> Option<BreakerSnapshot> {
        let entry = self.entry(provider)?;
        let entry = entry.lock().ok()?;
        Some(entry.snapshot(provider))
    }

    /// 알려진 모든 프로바이더의 스냅샷 (프로바이더 ID 순)
    pub fn snapshots(&self) -> Vec<BreakerSnapshot> {
        let entries: Vec<(ProviderId, Arc<Mutex<BreakerEntry>>)> = match self.entries.lock() {
            Ok(entries) => entries.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            Err(_) => return Vec::new(),
        };
        let mut snapshots: Vec<BreakerSnapshot> = entries
            .iter()
            .filter_map(|(provider, entry)| entry.lock().ok().map(|e| e.snapshot(provider)))
            .collect();
        snapshots.sort_by(|a, b| a.provider.cmp(&b.provider));
        snapshots
    }

    /// 현재 상태 (스냅샷을 만들지 않는 가벼운 조회)
    pub fn state(&self, provider: &ProviderId) -> CircuitState {
        self.entry(provider)
            .and_then(|e| e.lock().ok().map(|e| e.state))
            .unwrap_or_default()
    }

    // ─── 내부 ────────────────────────────────────────────────────────

    fn open(
        &self,
        provider: &ProviderId,
        entry: &mut BreakerEntry,
        trigger: Trigger,
        now: DateTime<Utc>,
    ) {
        let cooldown = self.config.cooldown_for(entry.consecutive_reopens);
        entry.next_attempt_at = Some(now.checked_add_signed(cooldown).unwrap_or(DateTime::<Utc>::MAX_UTC));
        entry.probe_claimed_at = None;
        entry.failures.clear();
        entry.total_trips += 1;
        self.transition(provider, entry, CircuitState::Open, trigger, now);
    }

    fn block(&self, provider: &ProviderId, entry: &mut BreakerEntry) {
        entry.total_calls_blocked += 1;
        metrics::counter!(m::BREAKER_CALLS_BLOCKED_TOTAL, m::LABEL_PROVIDER => provider.to_string())
            .increment(1);
        debug!(
            provider = %provider,
            state = %entry.state,
            next_attempt_at = ?entry.next_attempt_at,
            "call blocked by circuit breaker"
        );
    }

    fn transition(
        &self,
        provider: &ProviderId,
        entry: &mut BreakerEntry,
        to: CircuitState,
        trigger: Trigger,
        now: DateTime<Utc>,
    ) {
        let from = entry.state;
        entry.state = to;
        entry.last_transition_at = Some(now);

        match to {
            CircuitState::Open => warn!(
                provider = %provider,
                from = %from,
                trigger = trigger.as_str(),
                next_attempt_at = ?entry.next_attempt_at,
                "circuit opened"
            ),
            _ => info!(
                provider = %provider,
                from = %from,
                to = %to,
                trigger = trigger.as_str(),
                "circuit state changed"
            ),
        }

        metrics::counter!(
            m::BREAKER_TRANSITIONS_TOTAL,
            m::LABEL_PROVIDER => provider.to_string(),
            m::LABEL_STATE => to.as_str()
        )
        .increment(1);
        metrics::gauge!(m::BREAKER_STATE, m::LABEL_PROVIDER => provider.to_string())
            .set(to.gauge_value());

        let mut event = ScanEvent::new(STAGE_CIRCUIT_BREAKER, to.as_str(), now)
            .provider(provider)
            .meta("from", from.as_str())
            .meta("trigger", trigger.as_str())
            .meta("total_trips", entry.total_trips);
        if let Some(next) = entry.next_attempt_at.filter(|_| to == CircuitState::Open) {
            event = event.meta("next_attempt_at", next.to_rfc3339());
        }
        self.events.append(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use scanrelay_core::clock::ManualClock;
    use scanrelay_core::event::MemoryEventLog;

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-07-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn breaker() -> (CircuitBreaker, ManualClock, Arc<MemoryEventLog>) {
        let clock = ManualClock::new(t0());
        let events = Arc::new(MemoryEventLog::new(1_000));
        let breaker = CircuitBreaker::new(
            CircuitBreakerConfig::default(),
            Arc::new(clock.clone()),
            events.clone(),
        );
        (breaker, clock, events)
    }

    fn fail(breaker: &CircuitBreaker, provider: &ProviderId, times: usize) {
        for _ in 0..times {
            breaker.record_outcome(provider, false);
        }
    }

    #[test]
    fn unknown_provider_starts_closed() {
        let (breaker, _, _) = breaker();
        let hibp = ProviderId::new("hibp");
        assert!(breaker.is_eligible(&hibp));
        let snapshot = breaker.snapshot(&hibp).unwrap();
        assert_eq!(snapshot.state, CircuitState::Closed);
        assert_eq!(snapshot.total_trips, 0);
    }

    #[test]
    fn unbounded_cooldown_keeps_circuit_open() {
        let clock = ManualClock::new(t0());
        let core = scanrelay_core::config::BreakerConfig {
            cooldown_secs: u64::MAX,
            max_cooldown_secs: u64::MAX,
            ..Default::default()
        };
        let breaker = CircuitBreaker::new(
            CircuitBreakerConfig::from_core(&core),
            Arc::new(clock.clone()),
            Arc::new(MemoryEventLog::new(16)),
        );
        let hibp = ProviderId::new("hibp");

        breaker.trip(&hibp).unwrap();
        assert_eq!(
            breaker.snapshot(&hibp).unwrap().next_attempt_at,
            Some(DateTime::<Utc>::MAX_UTC)
        );
        clock.advance(Duration::days(3_650));
        assert!(!breaker.is_eligible(&hibp));
    }

    #[test]
    fn opens_at_threshold() {
        let (breaker, _, events) = breaker();
        let p = ProviderId::new("hibp");
        fail(&breaker, &p, 4);
        assert_eq!(breaker.state(&p), CircuitState::Closed);
        fail(&breaker, &p, 1);

        let snapshot = breaker.snapshot(&p).unwrap();
        assert_eq!(snapshot.state, CircuitState::Open);
        assert_eq!(snapshot.total_trips, 1);
        assert_eq!(snapshot.next_attempt_at, Some(t0() + Duration::seconds(60)));
        assert_eq!(snapshot.last_transition_at, Some(t0()));
        assert_eq!(events.by_stage(STAGE_CIRCUIT_BREAKER).len(), 1);
    }

    #[test]
    fn success_while_closed_resets_failures() {
        let (breaker, _, _) = breaker();
        let p = ProviderId::new("hibp");
        fail(&breaker, &p, 4);
        breaker.record_outcome(&p, true);
        fail(&breaker, &p, 4);
        assert_eq!(breaker.state(&p), CircuitState::Closed);
        assert_eq!(breaker.snapshot(&p).unwrap().failure_count, 4);
    }

    #[test]
    fn failures_outside_window_do_not_count() {
        let (breaker, clock, _) = breaker();
        let p = ProviderId::new("hibp");
        fail(&breaker, &p, 4);
        clock.advance(Duration::seconds(301));
        fail(&breaker, &p, 1);
        assert_eq!(breaker.state(&p), CircuitState::Closed);
        assert_eq!(breaker.snapshot(&p).unwrap().failure_count, 1);
    }

    #[test]
    fn open_blocks_until_cooldown_then_allows_single_probe() {
        let (breaker, clock, _) = breaker();
        let p = ProviderId::new("hibp");
        fail(&breaker, &p, 5);

        clock.advance(Duration::seconds(59));
        assert!(!breaker.is_eligible(&p));
        assert_eq!(breaker.snapshot(&p).unwrap().total_calls_blocked, 1);

        clock.advance(Duration::seconds(1));
        assert!(breaker.is_eligible(&p));
        assert_eq!(breaker.state(&p), CircuitState::HalfOpen);
        assert!(!breaker.is_eligible(&p));
        assert!(!breaker.is_eligible(&p));
    }

    #[test]
    fn probe_success_closes_circuit() {
        let (breaker, clock, _) = breaker();
        let p = ProviderId::new("hibp");
        fail(&breaker, &p, 5);
        clock.advance(Duration::seconds(60));
        assert!(breaker.is_eligible(&p));
        breaker.record_outcome(&p, true);

        let snapshot = breaker.snapshot(&p).unwrap();
        assert_eq!(snapshot.state, CircuitState::Closed);
        assert_eq!(snapshot.consecutive_reopens, 0);
        assert!(snapshot.next_attempt_at.is_none());
        assert!(breaker.is_eligible(&p));
    }

    #[test]
    fn probe_failure_reopens_with_doubled_cooldown() {
        let (breaker, clock, _) = breaker();
        let p = ProviderId::new("hibp");
        fail(&breaker, &p, 5);
        clock.advance(Duration::seconds(60));
        assert!(breaker.is_eligible(&p));
        breaker.record_outcome(&p, false);

        let snapshot = breaker.snapshot(&p).unwrap();
        assert_eq!(snapshot.state, CircuitState::Open);
        assert_eq!(snapshot.total_trips, 2);
        assert_eq!(snapshot.consecutive_reopens, 1);
        assert_eq!(
            snapshot.next_attempt_at,
            Some(t0() + Duration::seconds(60) + Duration::seconds(120))
        );
    }

    #[test]
    fn lost_probe_slot_is_reclaimed_after_timeout() {
        let (breaker, clock, _) = breaker();
        let p = ProviderId::new("hibp");
        fail(&breaker, &p, 5);
        clock.advance(Duration::seconds(60));
        assert!(breaker.is_eligible(&p));

        clock.advance(Duration::seconds(119));
        assert!(!breaker.is_eligible(&p));
        clock.advance(Duration::seconds(1));
        assert!(breaker.is_eligible(&p));
        assert!(!breaker.is_eligible(&p));
    }

    #[test]
    fn trip_and_reset_are_audited() {
        let (breaker, _, events) = breaker();
        let p = ProviderId::new("gosearch");
        let tripped = breaker.trip(&p).unwrap();
        assert_eq!(tripped.state, CircuitState::Open);
        assert!(!breaker.is_eligible(&p));

        let reset = breaker.reset(&p).unwrap();
        assert_eq!(reset.state, CircuitState::Closed);
        assert_eq!(reset.total_trips, 1);
        assert!(breaker.is_eligible(&p));

        let audit = events.by_stage(STAGE_CIRCUIT_BREAKER);
        let triggers: Vec<_> = audit
            .iter()
            .map(|e| e.metadata["trigger"].as_str().unwrap().to_owned())
            .collect();
        assert_eq!(triggers, ["manual_trip", "manual_reset"]);
        assert_eq!(audit[1].metadata["from"], "open");
    }

    #[test]
    fn snapshots_are_sorted_by_provider() {
        let (breaker, _, _) = breaker();
        breaker.is_eligible(&ProviderId::new("zeta"));
        breaker.is_eligible(&ProviderId::new("alpha"));
        let names: Vec<_> = breaker
            .snapshots()
            .into_iter()
            .map(|s| s.provider.to_string())
            .collect();
        assert_eq!(names, ["alpha", "zeta"]);
    }

    #[test]
    fn poisoned_state_fails_open_and_reset_recovers() {
        let (breaker, _, _) = breaker();
        let p = ProviderId::new("hibp");
        fail(&breaker, &p, 5);
        assert!(!breaker.is_eligible(&p));

        let entry = breaker.entry(&p).unwrap();
        let _ = std::thread::spawn(move || {
            let _guard = entry.lock().unwrap();
            panic!("poison breaker state");
        })
        .join();

        assert!(breaker.is_eligible(&p));
        breaker.record_outcome(&p, false);
        assert!(breaker.snapshot(&p).is_none());

        let snapshot = breaker.reset(&p).unwrap();
        assert_eq!(snapshot.state, CircuitState::Closed);
        assert!(breaker.is_eligible(&p));
    }
}
