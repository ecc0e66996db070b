//! 프로바이더 비용 원장
//!
//! 호출마다 일간/월간 비용 기록을 갱신하고, 예산 기준을 넘으면
//! 기간과 레벨별로 한 번씩 알림을 남깁니다. 최근 호출 샘플로
//! 프로바이더 오류율과 p95 지연 시간을 계산합니다.
//!
//! 원장은 스캔 경로를 막지 않습니다. 내부 에러는 호출자에게 반환되지만
//! 디스패처는 이를 로그로만 남깁니다.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Datelike, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use scanrelay_core::clock::Clock;
use scanrelay_core::event::{EventLog, STAGE_BUDGET, ScanEvent};
use scanrelay_core::metrics as m;
use scanrelay_core::types::{BudgetPeriod, ProviderId};

use crate::config::{BudgetLimits, CostLedgerConfig};
use crate::error::LedgerError;

// ─── 기록 타입 ───────────────────────────────────────────────────────

/// 기간별 비용 기록
///
/// 기간 안에서는 단조 증가하며, 기간이 바뀌면 새 기록으로 교체됩니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetRecord {
    pub provider: ProviderId,
    pub period: BudgetPeriod,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub total_cost: f64,
    pub total_calls: u64,
    pub success_calls: u64,
    pub failed_calls: u64,
    pub currency: String,
}

impl BudgetRecord {
    fn new(provider: ProviderId, period: BudgetPeriod, today: NaiveDate, currency: &str) -> Self {
        let (period_start, period_end) = period_bounds(period, today);
        Self {
            provider,
            period,
            period_start,
            period_end,
            total_cost: 0.0,
            total_calls: 0,
            success_calls: 0,
            failed_calls: 0,
            currency: currency.to_owned(),
        }
    }
}

/// 예산 알림 레벨
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertLevel {
    Warning,
    Critical,
}

impl AlertLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Warning => "warning",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 예산 알림
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetAlert {
    pub provider: ProviderId,
    pub period: BudgetPeriod,
    pub period_start: NaiveDate,
    pub level: AlertLevel,
    pub threshold_pct: f64,
    pub usage_pct: f64,
    pub limit: f64,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

/// 프로바이더 호출 한 건
#[derive(Debug, Clone, PartialEq)]
pub struct CallSample {
    pub provider: ProviderId,
    pub success: bool,
    pub latency: Duration,
    pub cost: f64,
    pub at: DateTime<Utc>,
}

/// 기간 내 프로바이더 호출 통계
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderMetrics {
    pub provider: ProviderId,
    pub calls: u64,
    pub errors: u64,
    /// 오류율 (0 ~ 100)
    pub error_pct: f64,
    /// 호출이 없으면 `None`
    pub p95_latency_ms: Option<u64>,
    pub cost: f64,
}

/// 프로바이더별 원장 상태
#[derive(Debug, Default)]
struct ProviderBook {
    daily: Option<BudgetRecord>,
    monthly: Option<BudgetRecord>,
    samples: VecDeque<CallSample>,
    alerted: HashSet<(BudgetPeriod, NaiveDate, AlertLevel)>,
}

impl ProviderBook {
    /// 현재 기간의 기록 (기간이 앞으로 넘어갔으면 새 기록으로 교체)
    ///
    /// 기록은 뒤로 돌아가지 않으며, 이전 기간의 날짜는 현재 기록을 그대로 돌려줍니다.
    fn current(
        &mut self,
        provider: &ProviderId,
        period: BudgetPeriod,
        today: NaiveDate,
        currency: &str,
    ) -> &mut BudgetRecord {
        let slot = match period {
            BudgetPeriod::Daily => &mut self.daily,
            BudgetPeriod::Monthly => &mut self.monthly,
        };
        let (start, _) = period_bounds(period, today);
        let advanced = slot.as_ref().is_some_and(|r| start > r.period_start);
        if advanced {
            info!(provider = %provider, period = %period, period_start = %start, "ledger period rolled over");
            *slot = Some(BudgetRecord::new(provider.clone(), period, today, currency));
        }
        slot.get_or_insert_with(|| BudgetRecord::new(provider.clone(), period, today, currency))
    }

    /// 이미 지나간 기간에 속하는 날짜인지
    fn is_behind(&self, period: BudgetPeriod, today: NaiveDate) -> bool {
        let slot = match period {
            BudgetPeriod::Daily => &self.daily,
            BudgetPeriod::Monthly => &self.monthly,
        };
        let (start, _) = period_bounds(period, today);
        slot.as_ref().is_some_and(|r| start < r.period_start)
    }
}

fn period_bounds(period: BudgetPeriod, today: NaiveDate) -> (NaiveDate, NaiveDate) {
    match period {
        BudgetPeriod::Daily => (today, today),
        BudgetPeriod::Monthly => {
            let start = today.with_day(1).unwrap_or(today);
            let end = start
                .checked_add_months(Months::new(1))
                .and_then(|next| next.pred_opt())
                .unwrap_or(today);
            (start, end)
        }
    }
}

// ─── 원장 ────────────────────────────────────────────────────────────

/// 프로바이더 비용 원장
pub struct CostLedger {
    config: CostLedgerConfig,
    clock: Arc<dyn Clock>,
    events: Arc<dyn EventLog>,
    books: Mutex<HashMap<ProviderId, Arc<Mutex<ProviderBook>>>>,
    alerts: Mutex<Vec<BudgetAlert>>,
}

impl CostLedger {
    pub fn new(config: CostLedgerConfig, clock: Arc<dyn Clock>, events: Arc<dyn EventLog>) -> Self {
        Self {
            config,
            clock,
            events,
            books: Mutex::new(HashMap::new()),
            alerts: Mutex::new(Vec::new()),
        }
    }

    pub fn currency(&self) -> &str {
        &self.config.currency
    }

    fn book(&self, provider: &ProviderId) -> Result<Arc<Mutex<ProviderBook>>, LedgerError> {
        let mut books = self
            .books
            .lock()
            .map_err(|_| LedgerError::Poisoned(provider.to_string()))?;
        Ok(books.entry(provider.clone()).or_default().clone())
    }

    fn lock_book<'a>(
        provider: &ProviderId,
        book: &'a Mutex<ProviderBook>,
    ) -> Result<MutexGuard<'a, ProviderBook>, LedgerError> {
        book.lock()
            .map_err(|_| LedgerError::Poisoned(provider.to_string()))
    }

    /// 한 기간에 비용만 더합니다 (호출 수는 바뀌지 않음).
    pub fn record_cost(
        &self,
        provider: &ProviderId,
        amount: f64,
        period: BudgetPeriod,
    ) -> Result<BudgetRecord, LedgerError> {
        validate_amount(provider, amount)?;
        let now = self.clock.now();
        let book = self.book(provider)?;
        let mut book = Self::lock_book(provider, &book)?;

        let record = book.current(provider, period, now.date_naive(), &self.config.currency);
        record.total_cost += amount;
        let snapshot = record.clone();
        self.publish_cost(&snapshot);
        self.check_budget(&mut book, &snapshot, now);
        Ok(snapshot)
    }

    /// 호출 한 건을 기록합니다.
    ///
    /// 일간/월간 기록, 최근 샘플, 예산 확인이 함께 갱신됩니다.
    pub fn record_call(&self, sample: CallSample) -> Result<(), LedgerError> {
        let provider = sample.provider.clone();
        validate_amount(&provider, sample.cost)?;
        let today = sample.at.date_naive();
        let book = self.book(&provider)?;
        let mut book = Self::lock_book(&provider, &book)?;

        for period in [BudgetPeriod::Daily, BudgetPeriod::Monthly] {
            if book.is_behind(period, today) {
                debug!(provider = %provider, period = %period, at = %sample.at, "call sample for a closed period skipped");
                continue;
            }
            let record = book.current(&provider, period, today, &self.config.currency);
            record.total_cost += sample.cost;
            record.total_calls += 1;
            if sample.success {
                record.success_calls += 1;
            } else {
                record.failed_calls += 1;
            }
            let snapshot = record.clone();
            self.publish_cost(&snapshot);
            self.check_budget(&mut book, &snapshot, sample.at);
        }

        if book.samples.len() >= self.config.sample_capacity {
            book.samples.pop_front();
        }
        debug!(
            provider = %provider,
            success = sample.success,
            latency_ms = sample.latency.as_millis() as u64,
            cost = sample.cost,
            "provider call recorded"
        );
        book.samples.push_back(sample);
        Ok(())
    }

    /// 현재 기간의 비용 기록 (프로바이더 ID 순)
    pub fn summary(&self, period: BudgetPeriod) -> Vec<BudgetRecord> {
        let today = self.clock.now().date_naive();
        let (start, _) = period_bounds(period, today);
        let mut records: Vec<BudgetRecord> = self
            .all_books()
            .into_iter()
            .filter_map(|(provider, book)| {
                let book = Self::lock_book(&provider, &book).ok()?;
                let record = match period {
                    BudgetPeriod::Daily => book.daily.clone(),
                    BudgetPeriod::Monthly => book.monthly.clone(),
                }?;
                (record.period_start == start).then_some(record)
            })
            .collect();
        records.sort_by(|a, b| a.provider.cmp(&b.provider));
        records
    }

    /// 발생한 예산 알림 (발생 순)
    pub fn alerts(&self) -> Vec<BudgetAlert> {
        self.alerts
            .lock()
            .map(|alerts| alerts.clone())
            .unwrap_or_default()
    }

    /// 최근 `window` 동안의 프로바이더 호출 통계
    pub fn provider_metrics(&self, provider: &ProviderId, window: Duration) -> ProviderMetrics {
        let since = self.since(window);
        let samples: Vec<CallSample> = self
            .book(provider)
            .ok()
            .and_then(|book| {
                let book = Self::lock_book(provider, &book).ok()?;
                Some(book.samples.iter().filter(|s| s.at >= since).cloned().collect())
            })
            .unwrap_or_default();
        summarize(provider, &samples)
    }

    /// 모든 프로바이더의 호출 통계 (프로바이더 ID 순)
    pub fn all_provider_metrics(&self, window: Duration) -> Vec<ProviderMetrics> {
        let since = self.since(window);
        let mut metrics: Vec<ProviderMetrics> = self
            .all_books()
            .into_iter()
            .filter_map(|(provider, book)| {
                let book = Self::lock_book(&provider, &book).ok()?;
                let samples: Vec<CallSample> =
                    book.samples.iter().filter(|s| s.at >= since).cloned().collect();
                Some(summarize(&provider, &samples))
            })
            .collect();
        metrics.sort_by(|a, b| a.provider.cmp(&b.provider));
        metrics
    }

    // ─── 내부 ────────────────────────────────────────────────────────

    fn since(&self, window: Duration) -> DateTime<Utc> {
        let window = chrono::Duration::from_std(window).unwrap_or(chrono::Duration::MAX);
        self.clock
            .now()
            .checked_sub_signed(window)
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    fn all_books(&self) -> Vec<(ProviderId, Arc<Mutex<ProviderBook>>)> {
        match self.books.lock() {
            Ok(books) => books.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            Err(_) => {
                warn!("ledger table poisoned");
                Vec::new()
            }
        }
    }

    fn publish_cost(&self, record: &BudgetRecord) {
        metrics::gauge!(
            m::LEDGER_PERIOD_COST,
            m::LABEL_PROVIDER => record.provider.to_string(),
            m::LABEL_PERIOD => record.period.as_str()
        )
        .set(record.total_cost);
    }

    fn check_budget(&self, book: &mut ProviderBook, record: &BudgetRecord, now: DateTime<Utc>) {
        let Some(limits) = self.config.budgets.get(&record.provider) else {
            return;
        };
        let Some(limit) = limits.limit_for(record.period) else {
            return;
        };
        let usage_pct = record.total_cost / limit * 100.0;
        let Some((level, threshold_pct)) = crossed_level(limits, usage_pct) else {
            return;
        };
        if !book
            .alerted
            .insert((record.period, record.period_start, level))
        {
            return;
        }

        let message = format!(
            "{} has reached {:.0}% of {} budget ({:.2} of {:.2} {})",
            record.provider,
            usage_pct,
            record.period,
            record.total_cost,
            limit,
            record.currency
        );
        warn!(
            provider = %record.provider,
            period = %record.period,
            level = %level,
            usage_pct,
            limit,
            "budget threshold crossed"
        );
        metrics::counter!(
            m::LEDGER_BUDGET_ALERTS_TOTAL,
            m::LABEL_PROVIDER => record.provider.to_string(),
            m::LABEL_LEVEL => level.as_str()
        )
        .increment(1);
        self.events.append(
            ScanEvent::new(STAGE_BUDGET, level.as_str(), now)
                .provider(&record.provider)
                .meta("period", record.period.as_str())
                .meta("usage_pct", usage_pct)
                .meta("limit", limit)
                .meta("threshold_pct", threshold_pct),
        );

        let alert = BudgetAlert {
            provider: record.provider.clone(),
            period: record.period,
            period_start: record.period_start,
            level,
            threshold_pct,
            usage_pct,
            limit,
            message,
            created_at: now,
        };
        match self.alerts.lock() {
            Ok(mut alerts) => alerts.push(alert),
            Err(_) => warn!(provider = %record.provider, "alert list poisoned, alert dropped"),
        }
    }
}

fn crossed_level(limits: &BudgetLimits, usage_pct: f64) -> Option<(AlertLevel, f64)> {
    if usage_pct >= limits.critical_pct {
        Some((AlertLevel::Critical, limits.critical_pct))
    } else if usage_pct >= limits.warn_pct {
        Some((AlertLevel::Warning, limits.warn_pct))
    } else {
        None
    }
}

fn validate_amount(provider: &ProviderId, amount: f64) -> Result<(), LedgerError> {
    if amount < 0.0 || !amount.is_finite() {
        return Err(LedgerError::InvalidAmount {
            provider: provider.to_string(),
            amount,
        });
    }
    Ok(())
}

fn summarize(provider: &ProviderId, samples: &[CallSample]) -> ProviderMetrics {
    let calls = samples.len() as u64;
    let errors = samples.iter().filter(|s| !s.success).count() as u64;
    let error_pct = if calls == 0 {
        0.0
    } else {
        errors as f64 / calls as f64 * 100.0
    };
    let cost = samples.iter().map(|s| s.cost).sum();

    let mut latencies: Vec<u64> = samples
        .iter()
        .map(|s| u64::try_from(s.latency.as_millis()).unwrap_or(u64::MAX))
        .collect();
    latencies.sort_unstable();
    // nearest-rank
    let p95_latency_ms = if latencies.is_empty() {
        None
    } else {
        let rank = (latencies.len() * 95).div_ceil(100).max(1);
        latencies.get(rank - 1).copied()
    };

    ProviderMetrics {
        provider: provider.clone(),
        calls,
        errors,
        error_pct,
        p95_latency_ms,
        cost,
    }
}
