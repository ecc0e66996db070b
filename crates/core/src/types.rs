//! 도메인 타입: 스캔, 발견 항목, 프로바이더 디스패치 기록
//!
//! 모든 크레이트가 공유하는 데이터 구조를 정의합니다.
//! 스캔 상태는 단조 증가만 허용되며, 종료 상태에 도달한 스캔은 다시 열리지 않습니다.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── 식별자 ──────────────────────────────────────────────────────────

/// 스캔 ID (UUID v4)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScanId(Uuid);

impl ScanId {
    /// 새 무작위 ID를 생성합니다.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// 내부 UUID를 반환합니다.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ScanId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ScanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for ScanId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// 프로바이더 ID (예: `"hibp"`, `"gosearch"`)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProviderId(String);

impl ProviderId {
    /// 새 프로바이더 ID를 생성합니다.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProviderId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for ProviderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

// ─── 스캔 대상 ───────────────────────────────────────────────────────

/// 스캔 대상 유형
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    Username,
    Email,
    Phone,
    Domain,
    Ip,
    Name,
}

impl TargetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Username => "username",
            Self::Email => "email",
            Self::Phone => "phone",
            Self::Domain => "domain",
            Self::Ip => "ip",
            Self::Name => "name",
        }
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 스캔 대상
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Target {
    /// 대상 유형
    pub kind: TargetKind,
    /// 대상 값 (정규화된 형태)
    pub value: String,
}

impl Target {
    /// 새 대상을 생성합니다.
    ///
    /// 재사용 창 비교를 위해 앞뒤 공백을 제거하고,
    /// 대소문자 구분이 없는 유형은 소문자로 정규화합니다.
    pub fn new(kind: TargetKind, value: impl Into<String>) -> Self {
        let value = value.into();
        let value = match kind {
            TargetKind::Email | TargetKind::Domain | TargetKind::Username => {
                value.trim().to_lowercase()
            }
            _ => value.trim().to_owned(),
        };
        Self { kind, value }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.value)
    }
}

// ─── 스캔 상태 ───────────────────────────────────────────────────────

/// 스캔 상태
///
/// `pending < running < processing < 종료 상태` 순서로만 진행합니다.
/// 종료 상태: `complete`, `complete_partial`, `timeout`, `failed`, `cached`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanStatus {
    Pending,
    Running,
    Processing,
    Complete,
    CompletePartial,
    Timeout,
    Failed,
    Cached,
}

impl ScanStatus {
    /// 모든 상태 (안정적인 어휘 순서)
    pub const ALL: [ScanStatus; 8] = [
        Self::Pending,
        Self::Running,
        Self::Processing,
        Self::Complete,
        Self::CompletePartial,
        Self::Timeout,
        Self::Failed,
        Self::Cached,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Processing => "processing",
            Self::Complete => "complete",
            Self::CompletePartial => "complete_partial",
            Self::Timeout => "timeout",
            Self::Failed => "failed",
            Self::Cached => "cached",
        }
    }

    /// 종료 상태 여부
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Complete | Self::CompletePartial | Self::Timeout | Self::Failed | Self::Cached
        )
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Running => 1,
            Self::Processing => 2,
            _ => 3,
        }
    }

    /// `self -> next` 전이가 허용되는지 여부
    ///
    /// 종료 상태에서는 어떤 전이도 허용되지 않습니다.
    /// `cached`는 생성 시점에만 부여되므로 전이 대상이 될 수 없습니다.
    pub fn can_transition_to(&self, next: ScanStatus) -> bool {
        !self.is_terminal() && next != Self::Cached && next.rank() > self.rank()
    }
}

impl fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScanStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown scan status '{s}'"))
    }
}

// ─── 심각도 / 발견 항목 ──────────────────────────────────────────────

/// 심각도 레벨
///
/// `Ord` 구현으로 비교가 가능합니다 (`Info < Low < Medium < High < Critical`).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    #[default]
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// 문자열에서 심각도를 파싱합니다. 대소문자를 구분하지 않습니다.
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "info" | "informational" => Some(Self::Info),
            "low" => Some(Self::Low),
            "medium" | "med" => Some(Self::Medium),
            "high" => Some(Self::High),
            "critical" | "crit" => Some(Self::Critical),
            _ => None,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Info => "info",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        };
        f.write_str(s)
    }
}

/// 프로바이더가 반환한 발견 항목 초안
///
/// 스캔 ID와 생성 시각은 수집 시점에 채워집니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FindingDraft {
    /// 발견 유형 (예: `"breach"`, `"social_profile"`)
    pub kind: String,
    pub severity: Severity,
    /// 신뢰도 (0.0 ~ 1.0)
    pub confidence: f64,
    /// 순서가 보존되는 증거 키/값 쌍
    pub evidence: Vec<(String, String)>,
    pub remediation_hint: Option<String>,
}

impl FindingDraft {
    pub fn new(kind: impl Into<String>, severity: Severity, confidence: f64) -> Self {
        Self {
            kind: kind.into(),
            severity,
            confidence,
            evidence: Vec::new(),
            remediation_hint: None,
        }
    }

    /// 증거 항목을 추가합니다.
    pub fn with_evidence(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.evidence.push((key.into(), value.into()));
        self
    }

    /// 조치 힌트를 설정합니다.
    pub fn with_remediation_hint(mut self, hint: impl Into<String>) -> Self {
        self.remediation_hint = Some(hint.into());
        self
    }
}

/// 발견 항목
///
/// 추가만 가능합니다. `late`는 스캔이 종료된 뒤 도착한 비동기 결과임을 표시합니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub id: Uuid,
    pub scan_id: ScanId,
    pub provider: ProviderId,
    pub kind: String,
    pub severity: Severity,
    pub confidence: f64,
    pub evidence: Vec<(String, String)>,
    pub remediation_hint: Option<String>,
    pub created_at: DateTime<Utc>,
    pub late: bool,
}

impl Finding {
    /// 초안으로부터 발견 항목을 생성합니다. 신뢰도는 `[0, 1]`로 고정됩니다.
    pub fn from_draft(
        scan_id: ScanId,
        provider: ProviderId,
        draft: FindingDraft,
        now: DateTime<Utc>,
    ) -> Self {
        let confidence = if draft.confidence.is_nan() {
            0.0
        } else {
            draft.confidence.clamp(0.0, 1.0)
        };
        Self {
            id: Uuid::new_v4(),
            scan_id,
            provider,
            kind: draft.kind,
            severity: draft.severity,
            confidence,
            evidence: draft.evidence,
            remediation_hint: draft.remediation_hint,
            created_at: now,
            late: false,
        }
    }
}

// ─── 프로바이더 디스패치 ─────────────────────────────────────────────

/// 프로바이더 결과 전달 방식
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// 호출 응답에 결과가 포함됨
    Synchronous,
    /// 접수 확인만 즉시 반환하고 결과는 나중에 보고함
    Asynchronous,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Synchronous => f.write_str("synchronous"),
            Self::Asynchronous => f.write_str("asynchronous"),
        }
    }
}

/// 프로바이더 디스패치 최종 결과
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DispatchOutcome {
    /// 결과 보고 완료 (발견 항목이 0개일 수도 있음)
    Reported { findings: usize },
    /// 호출 실패, 시간 초과, 서킷 차단
    Failed { reason: String },
    /// 설정 누락으로 빈 결과 처리 (상태 계산에서 제외)
    Degraded { reason: String },
    /// 정리 작업이 대기 플래그를 강제 해제함
    ForceCleared { reason: String },
}

impl DispatchOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reported { .. } => "reported",
            Self::Failed { .. } => "failed",
            Self::Degraded { .. } => "degraded",
            Self::ForceCleared { .. } => "force_cleared",
        }
    }
}

/// 디스패치 생명주기: `dispatched -> pending -> resolved`
///
/// 동기 프로바이더는 `pending`을 건너뜁니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DispatchState {
    Dispatched,
    Pending {
        ticket: String,
        since: DateTime<Utc>,
    },
    Resolved {
        outcome: DispatchOutcome,
        at: DateTime<Utc>,
    },
}

/// 스캔별 프로바이더 디스패치 기록
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderDispatch {
    pub provider: ProviderId,
    pub capability: Capability,
    pub dispatched_at: DateTime<Utc>,
    pub state: DispatchState,
}

impl ProviderDispatch {
    pub fn new(provider: ProviderId, capability: Capability, now: DateTime<Utc>) -> Self {
        Self {
            provider,
            capability,
            dispatched_at: now,
            state: DispatchState::Dispatched,
        }
    }

    /// 비동기 결과를 기다리는 중인지 여부
    pub fn is_pending(&self) -> bool {
        matches!(self.state, DispatchState::Pending { .. })
    }

    /// 결과가 확정되었는지 여부
    pub fn is_resolved(&self) -> bool {
        matches!(self.state, DispatchState::Resolved { .. })
    }

    /// 대기 시작 시각 (대기 중일 때만)
    pub fn pending_since(&self) -> Option<DateTime<Utc>> {
        match &self.state {
            DispatchState::Pending { since, .. } => Some(*since),
            _ => None,
        }
    }

    /// 대기 티켓 (대기 중일 때만)
    pub fn ticket(&self) -> Option<&str> {
        match &self.state {
            DispatchState::Pending { ticket, .. } => Some(ticket),
            _ => None,
        }
    }

    pub fn outcome(&self) -> Option<&DispatchOutcome> {
        match &self.state {
            DispatchState::Resolved { outcome, .. } => Some(outcome),
            _ => None,
        }
    }
}

// ─── 스캔 ────────────────────────────────────────────────────────────

/// 스캔 (한 번의 다중 프로바이더 정보 수집 요청)
///
/// `completed_at`은 상태가 종료 상태일 때만 설정됩니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scan {
    pub id: ScanId,
    pub owner: String,
    pub target: Target,
    pub status: ScanStatus,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    /// 재사용한 이전 스캔 (`cached` 상태일 때)
    pub reused_from: Option<ScanId>,
    /// 종료 사유 (사람이 읽을 수 있는 문자열)
    pub reason: Option<String>,
    pub dispatches: BTreeMap<ProviderId, ProviderDispatch>,
}

impl Scan {
    /// `pending` 상태의 새 스캔을 생성합니다.
    pub fn new(owner: impl Into<String>, target: Target, now: DateTime<Utc>) -> Self {
        Self {
            id: ScanId::new(),
            owner: owner.into(),
            target,
            status: ScanStatus::Pending,
            created_at: now,
            completed_at: None,
            reused_from: None,
            reason: None,
            dispatches: BTreeMap::new(),
        }
    }

    /// 이전 스캔을 재사용하는 `cached` 스캔을 생성합니다.
    pub fn cached(
        owner: impl Into<String>,
        target: Target,
        reused_from: ScanId,
        now: DateTime<Utc>,
    ) -> Self {
        let mut scan = Self::new(owner, target, now);
        scan.status = ScanStatus::Cached;
        scan.completed_at = Some(now);
        scan.reused_from = Some(reused_from);
        scan.reason = Some(format!("reused results from scan {reused_from}"));
        scan
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// 생성 후 경과 시간
    pub fn elapsed(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.created_at
    }

    /// 대기 중인 비동기 디스패치가 있는지 여부
    pub fn has_pending(&self) -> bool {
        self.dispatches.values().any(ProviderDispatch::is_pending)
    }

    /// 대기 중인 비동기 디스패치 목록
    pub fn pending_dispatches(&self) -> impl Iterator<Item = &ProviderDispatch> {
        self.dispatches.values().filter(|d| d.is_pending())
    }

    /// 디스패치 결과로부터 종료 상태를 결정합니다.
    ///
    /// 미확정 디스패치가 남아 있으면 `None`을 반환합니다.
    pub fn settled_status(&self) -> Option<(ScanStatus, Option<String>)> {
        if self.dispatches.values().any(|d| !d.is_resolved()) {
            return None;
        }
        Some(settle(self.dispatches.values().filter_map(|d| d.outcome())))
    }
}

/// 디스패치 결과 집합을 종료 상태로 환산합니다.
///
/// - 모든 프로바이더가 보고 → `complete`
/// - 일부만 보고 → `complete_partial`
/// - 보고한 프로바이더 없음 → `failed`
///
/// `Degraded` 결과는 분모에서 제외됩니다.
pub fn settle<'a>(
    outcomes: impl IntoIterator<Item = &'a DispatchOutcome>,
) -> (ScanStatus, Option<String>) {
    let mut reported = 0usize;
    let mut missing = 0usize;
    for outcome in outcomes {
        match outcome {
            DispatchOutcome::Reported { .. } => reported += 1,
            DispatchOutcome::Failed { .. } | DispatchOutcome::ForceCleared { .. } => missing += 1,
            DispatchOutcome::Degraded { .. } => {}
        }
    }

    match (reported, missing) {
        (0, 0) => (
            ScanStatus::Failed,
            Some("no eligible providers".to_owned()),
        ),
        (0, n) => (
            ScanStatus::Failed,
            Some(format!("no provider returned results ({n} failed)")),
        ),
        (_, 0) => (ScanStatus::Complete, None),
        (r, m) => (
            ScanStatus::CompletePartial,
            Some(format!("{r} of {} providers returned results", r + m)),
        ),
    }
}

// ─── 비용 기간 ───────────────────────────────────────────────────────

/// 예산 집계 기간
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetPeriod {
    Daily,
    Monthly,
}

impl BudgetPeriod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Monthly => "monthly",
        }
    }
}

impl fmt::Display for BudgetPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
