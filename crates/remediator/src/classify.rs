//! 정체된 스캔 분류 규칙
//!
//! 부작용이 없는 순수 함수입니다. 스윕은 이 결과를 보고 상태 전이만 수행합니다.
//!
//! | 경과 시간                          | 발견 항목 | 결과               |
//! |------------------------------------|-----------|--------------------|
//! | `> abandon_after`                  | 무관      | `failed`           |
//! | `> partial_after` (pending은 floor)| 있음      | `complete_partial` |
//! | `> partial_after` (pending은 floor)| 없음      | `timeout`          |
//! | 그 외                              | -         | 변경 없음          |

use chrono::Duration;
use serde::Serialize;

use scanrelay_core::types::ScanStatus;

use crate::config::RemediationSettings;

/// 적용된 규칙
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    /// 포기 기준 초과
    Abandoned,
    /// 부분 결과로 마감
    Partial,
    /// 결과 없이 시간 초과
    TimedOut,
}

impl Rule {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Abandoned => "abandoned",
            Self::Partial => "partial",
            Self::TimedOut => "timed_out",
        }
    }
}

/// 분류 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    /// 전이할 종료 상태
    pub status: ScanStatus,
    /// 스캔에 기록할 사유
    pub reason: String,
    pub rule: Rule,
}

/// 스캔을 분류합니다.
///
/// 종료 상태이거나 아직 기준 시간을 넘지 않았으면 `None`을 반환합니다.
pub fn classify(
    status: ScanStatus,
    elapsed: Duration,
    findings: usize,
    settings: &RemediationSettings,
) -> Option<Verdict> {
    if status.is_terminal() {
        return None;
    }

    let minutes = elapsed.num_minutes();
    if elapsed > settings.abandon_after {
        return Some(Verdict {
            status: ScanStatus::Failed,
            reason: format!("abandoned after {minutes}m"),
            rule: Rule::Abandoned,
        });
    }

    let threshold = match status {
        ScanStatus::Pending => settings.pending_floor,
        _ => settings.partial_after,
    };
    if elapsed <= threshold {
        return None;
    }

    if findings > 0 {
        Some(Verdict {
            status: ScanStatus::CompletePartial,
            reason: format!("partial results after {minutes}m"),
            rule: Rule::Partial,
        })
    } else {
        Some(Verdict {
            status: ScanStatus::Timeout,
            reason: format!("timed out after {minutes}m stuck in {status}"),
            rule: Rule::TimedOut,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> RemediationSettings {
        RemediationSettings::default()
    }

    #[test]
    fn fresh_running_scan_is_left_alone() {
        assert_eq!(
            classify(ScanStatus::Running, Duration::minutes(5), 0, &settings()),
            None
        );
    }

    #[test]
    fn pending_scan_uses_lower_floor() {
        let verdict = classify(ScanStatus::Pending, Duration::minutes(3), 0, &settings())
            .expect("pending past floor should be classified");
        assert_eq!(verdict.status, ScanStatus::Timeout);
        assert_eq!(verdict.reason, "timed out after 3m stuck in pending");
        assert_eq!(verdict.rule, Rule::TimedOut);
    }

    #[test]
    fn processing_with_findings_completes_partially() {
        let verdict = classify(ScanStatus::Processing, Duration::minutes(15), 2, &settings())
            .expect("processing past partial_after should be classified");
        assert_eq!(verdict.status, ScanStatus::CompletePartial);
        assert_eq!(verdict.reason, "partial results after 15m");
    }

    #[test]
    fn very_old_scan_is_abandoned_even_with_findings() {
        let verdict = classify(ScanStatus::Running, Duration::minutes(45), 7, &settings())
            .expect("abandoned scan should be classified");
        assert_eq!(verdict.status, ScanStatus::Failed);
        assert_eq!(verdict.reason, "abandoned after 45m");
        assert_eq!(verdict.rule, Rule::Abandoned);
    }

    #[test]
    fn boundaries_are_exclusive() {
        let s = settings();
        assert_eq!(classify(ScanStatus::Running, s.partial_after, 0, &s), None);
        let at_abandon = classify(ScanStatus::Running, s.abandon_after, 0, &s)
            .expect("past partial_after should be classified");
        assert_eq!(at_abandon.status, ScanStatus::Timeout);
    }

    #[test]
    fn terminal_scans_are_never_classified() {
        for status in ScanStatus::ALL.iter().filter(|s| s.is_terminal()) {
            assert_eq!(classify(*status, Duration::hours(5), 0, &settings()), None);
        }
    }
}
