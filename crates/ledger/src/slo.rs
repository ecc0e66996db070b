//! SLO 모니터
//!
//! 측정값을 정의별 목표와 비교하여 최근 `window`개 샘플에 대한 준수율을 계산합니다.
//! 알 수 없거나 비활성화된 SLO 이름의 측정값은 버립니다.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use scanrelay_core::clock::Clock;
use scanrelay_core::metrics as m;

use crate::config::{Comparison, SloDefinition};
use crate::error::LedgerError;

/// 프로바이더 호출 지연 시간 (ms)
pub const SLO_PROVIDER_CALL_LATENCY_MS: &str = "provider_call_latency_ms";
/// 프로바이더 호출 성공 여부 (1.0 / 0.0)
pub const SLO_PROVIDER_CALL_SUCCESS: &str = "provider_call_success";
/// 스캔 생성부터 종료까지 걸린 시간 (초)
pub const SLO_SCAN_COMPLETION_SECS: &str = "scan_completion_secs";

/// 측정값 한 건
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SloMeasurement {
    pub value: f64,
    pub met: bool,
    pub at: DateTime<Utc>,
}

/// SLO 하나의 현재 상태
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SloStatus {
    pub name: String,
    pub target: f64,
    pub comparison: Comparison,
    pub samples: usize,
    /// 측정값이 없으면 `None`
    pub compliance_ratio: Option<f64>,
    pub last: Option<SloMeasurement>,
}

/// SLO 모니터
pub struct SloMonitor {
    definitions: HashMap<String, SloDefinition>,
    clock: Arc<dyn Clock>,
    samples: Mutex<HashMap<String, VecDeque<SloMeasurement>>>,
}

impl SloMonitor {
    pub fn new(definitions: Vec<SloDefinition>, clock: Arc<dyn Clock>) -> Self {
        let definitions = definitions
            .into_iter()
            .map(|d| (d.name.clone(), d))
            .collect();
        Self {
            definitions,
            clock,
            samples: Mutex::new(HashMap::new()),
        }
    }

    /// 활성화된 정의인지 여부
    pub fn is_tracked(&self, name: &str) -> bool {
        self.definitions.get(name).is_some_and(|d| d.enabled)
    }

    /// 측정값을 기록합니다.
    ///
    /// 알 수 없거나 비활성화된 SLO면 `UnknownSlo`를 반환하며 아무것도 기록하지 않습니다.
    pub fn record_measurement(&self, name: &str, value: f64) -> Result<bool, LedgerError> {
        let definition = self
            .definitions
            .get(name)
            .filter(|d| d.enabled)
            .ok_or_else(|| LedgerError::UnknownSlo(name.to_owned()))?;

        let met = definition.comparison.is_met(value, definition.target);
        let measurement = SloMeasurement {
            value,
            met,
            at: self.clock.now(),
        };

        let mut samples = self
            .samples
            .lock()
            .map_err(|_| LedgerError::Poisoned(name.to_owned()))?;
        let window = samples.entry(name.to_owned()).or_default();
        if window.len() >= definition.window {
            window.pop_front();
        }
        window.push_back(measurement);
        let compliance = ratio(window);

        if !met {
            debug!(slo = name, value, target = definition.target, "slo measurement missed target");
        }
        if let Some(compliance) = compliance {
            metrics::gauge!(m::SLO_COMPLIANCE_RATIO, m::LABEL_SLO => name.to_owned())
                .set(compliance);
        }
        Ok(met)
    }

    /// 측정값을 기록하고 실패는 로그로만 남깁니다.
    pub fn observe(&self, name: &str, value: f64) {
        match self.record_measurement(name, value) {
            Ok(_) => {}
            Err(LedgerError::UnknownSlo(_)) => {}
            Err(e) => warn!(slo = name, error = %e, "slo measurement dropped"),
        }
    }

    /// 준수율 (0.0 ~ 1.0). 측정값이 없거나 알 수 없는 SLO면 `None`.
    pub fn compliance_ratio(&self, name: &str) -> Option<f64> {
        let samples = self.samples.lock().ok()?;
        samples.get(name).and_then(ratio)
    }

    /// 모든 정의의 현재 상태 (이름 순, 비활성 정의 제외)
    pub fn report(&self) -> Vec<SloStatus> {
        let samples = match self.samples.lock() {
            Ok(samples) => samples,
            Err(_) => {
                warn!("slo samples poisoned");
                return Vec::new();
            }
        };
        let mut report: Vec<SloStatus> = self
            .definitions
            .values()
            .filter(|d| d.enabled)
            .map(|d| {
                let window = samples.get(&d.name);
                SloStatus {
                    name: d.name.clone(),
                    target: d.target,
                    comparison: d.comparison,
                    samples: window.map_or(0, VecDeque::len),
                    compliance_ratio: window.and_then(ratio),
                    last: window.and_then(|w| w.back().copied()),
                }
            })
            .collect();
        report.sort_by(|a, b| a.name.cmp(&b.name));
        report
    }
}

fn ratio(window: &VecDeque<SloMeasurement>) -> Option<f64> {
    if window.is_empty() {
        return None;
    }
    let met = window.iter().filter(|s| s.met).count();
    Some(met as f64 / window.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use scanrelay_core::clock::SystemClock;

    fn monitor() -> SloMonitor {
        let mut disabled = SloDefinition::new("uptime", 0.99, Comparison::AtLeast);
        disabled.enabled = false;
        let mut latency =
            SloDefinition::new(SLO_PROVIDER_CALL_LATENCY_MS, 5_000.0, Comparison::AtMost);
        latency.window = 4;
        SloMonitor::new(
            vec![
                latency,
                SloDefinition::new(SLO_PROVIDER_CALL_SUCCESS, 1.0, Comparison::AtLeast),
                disabled,
            ],
            Arc::new(SystemClock),
        )
    }

    #[test]
    fn compliance_ratio_over_samples() {
        let monitor = monitor();
        for success in [true, true, false, true] {
            monitor.observe(SLO_PROVIDER_CALL_SUCCESS, if success { 1.0 } else { 0.0 });
        }
        assert_eq!(monitor.compliance_ratio(SLO_PROVIDER_CALL_SUCCESS), Some(0.75));
    }

    #[test]
    fn window_drops_oldest_samples() {
        let monitor = monitor();
        monitor.observe(SLO_PROVIDER_CALL_LATENCY_MS, 9_000.0);
        for _ in 0..4 {
            monitor.observe(SLO_PROVIDER_CALL_LATENCY_MS, 200.0);
        }
        assert_eq!(monitor.compliance_ratio(SLO_PROVIDER_CALL_LATENCY_MS), Some(1.0));
    }

    #[test]
    fn unknown_and_disabled_slos_are_skipped() {
        let monitor = monitor();
        assert!(matches!(
            monitor.record_measurement("nope", 1.0),
            Err(LedgerError::UnknownSlo(_))
        ));
        assert!(monitor.record_measurement("uptime", 1.0).is_err());
        assert!(!monitor.is_tracked("uptime"));
        assert_eq!(monitor.compliance_ratio("uptime"), None);
    }

    #[test]
    fn report_lists_enabled_definitions() {
        let monitor = monitor();
        monitor.observe(SLO_PROVIDER_CALL_LATENCY_MS, 6_000.0);
        let report = monitor.report();
        let names: Vec<_> = report.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, [SLO_PROVIDER_CALL_LATENCY_MS, SLO_PROVIDER_CALL_SUCCESS]);
        assert_eq!(report[0].samples, 1);
        assert_eq!(report[0].compliance_ratio, Some(0.0));
        assert!(!report[0].last.unwrap().met);
        assert_eq!(report[1].compliance_ratio, None);
    }
}
