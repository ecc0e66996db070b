//! 주기적 스윕 스케줄러
//!
//! [`RemediationScheduler`]는 core의 [`Pipeline`] trait을 구현하여
//! daemon에서 다른 컴포넌트와 동일한 생명주기로 관리됩니다.
//! 시작 직후 한 번 스윕하고, 이후 `sweep_interval`마다 반복합니다.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use scanrelay_core::error::{PipelineError, ScanrelayError};
use scanrelay_core::pipeline::{HealthStatus, Pipeline};
use scanrelay_store::JobStore;

use crate::sweep::StuckJobRemediator;

/// 연속 실패가 이 값 이상이면 Degraded로 보고
const DEGRADED_AFTER_FAILURES: u64 = 3;

/// 스케줄러 실행 상태
#[derive(Debug, Clone, PartialEq, Eq)]
enum SchedulerState {
    /// 초기화됨, 아직 시작하지 않음
    Initialized,
    /// 실행 중
    Running,
    /// 정지됨
    Stopped,
}

/// 정리 작업 스케줄러
pub struct RemediationScheduler<S: JobStore> {
    remediator: Arc<StuckJobRemediator<S>>,
    state: SchedulerState,
    /// 백그라운드 태스크 핸들
    tasks: Vec<tokio::task::JoinHandle<()>>,
    /// 연속 스윕 실패 수
    consecutive_failures: Arc<AtomicU64>,
}

impl<S: JobStore + 'static> RemediationScheduler<S> {
    pub fn new(remediator: Arc<StuckJobRemediator<S>>) -> Self {
        Self {
            remediator,
            state: SchedulerState::Initialized,
            tasks: Vec::new(),
            consecutive_failures: Arc::new(AtomicU64::new(0)),
        }
    }

    /// 스케줄러가 사용하는 정리기 (운영자 수동 스윕용)
    pub fn remediator(&self) -> &Arc<StuckJobRemediator<S>> {
        &self.remediator
    }

    pub fn consecutive_failures(&self) -> u64 {
        self.consecutive_failures.load(Ordering::Relaxed)
    }
}

impl<S: JobStore + 'static> Pipeline for RemediationScheduler<S> {
    async fn start(&mut self) -> Result<(), ScanrelayError> {
        if self.state == SchedulerState::Running {
            return Err(PipelineError::AlreadyRunning.into());
        }

        let settings = self.remediator.settings().clone();
        if !settings.enabled {
            info!("periodic remediation disabled, sweeps run only on demand");
            self.state = SchedulerState::Running;
            return Ok(());
        }

        let remediator = Arc::clone(&self.remediator);
        let failures = Arc::clone(&self.consecutive_failures);

        let sweep_task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(settings.sweep_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                match remediator.sweep_now().await {
                    Ok(_) => {
                        failures.store(0, Ordering::Relaxed);
                    }
                    Err(e) => {
                        let count = failures.fetch_add(1, Ordering::Relaxed) + 1;
                        warn!(error = %e, consecutive_failures = count, "remediation sweep failed");
                    }
                }
            }
        });

        self.tasks.push(sweep_task);
        self.state = SchedulerState::Running;
        info!(
            interval_secs = settings.sweep_interval.as_secs(),
            "remediation scheduler started"
        );
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), ScanrelayError> {
        if self.state != SchedulerState::Running {
            return Err(PipelineError::NotRunning.into());
        }

        for task in self.tasks.drain(..) {
            task.abort();
            let _ = task.await;
        }

        self.state = SchedulerState::Stopped;
        info!("remediation scheduler stopped");
        Ok(())
    }

    async fn health_check(&self) -> HealthStatus {
        match self.state {
            SchedulerState::Running => {
                if !self.remediator.settings().enabled {
                    return HealthStatus::Degraded("periodic sweeps disabled".to_owned());
                }
                let failures = self.consecutive_failures();
                if failures >= DEGRADED_AFTER_FAILURES {
                    HealthStatus::Degraded(format!("{failures} consecutive sweep failures"))
                } else {
                    HealthStatus::Healthy
                }
            }
            SchedulerState::Initialized => HealthStatus::Unhealthy("not started".to_owned()),
            SchedulerState::Stopped => HealthStatus::Unhealthy("stopped".to_owned()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use scanrelay_core::clock::ManualClock;
    use scanrelay_core::event::MemoryEventLog;
    use scanrelay_store::MemoryJobStore;

    use crate::config::RemediationSettings;

    fn scheduler(settings: RemediationSettings) -> RemediationScheduler<MemoryJobStore> {
        let start = DateTime::parse_from_rfc3339("2026-05-04T09:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let remediator = StuckJobRemediator::new(
            Arc::new(MemoryJobStore::new()),
            Arc::new(ManualClock::new(start)),
            Arc::new(MemoryEventLog::new(10)),
            settings,
        )
        .unwrap();
        RemediationScheduler::new(Arc::new(remediator))
    }

    #[tokio::test]
    async fn lifecycle_follows_pipeline_contract() {
        let mut scheduler = scheduler(RemediationSettings::default());
        assert!(scheduler.health_check().await.is_unhealthy());
        assert!(scheduler.stop().await.is_err());

        scheduler.start().await.unwrap();
        assert!(scheduler.start().await.is_err());
        assert!(scheduler.health_check().await.is_healthy());

        scheduler.stop().await.unwrap();
        assert_eq!(
            scheduler.health_check().await,
            HealthStatus::Unhealthy("stopped".to_owned())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn sweeps_on_start_and_every_interval() {
        let mut scheduler = scheduler(
            RemediationSettings::default().with_sweep_interval(std::time::Duration::from_secs(60)),
        );
        scheduler.start().await.unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        assert_eq!(scheduler.remediator().sweep_count(), 1);

        tokio::time::sleep(std::time::Duration::from_secs(60)).await;
        assert_eq!(scheduler.remediator().sweep_count(), 2);

        scheduler.stop().await.unwrap();
        tokio::time::sleep(std::time::Duration::from_secs(120)).await;
        assert_eq!(scheduler.remediator().sweep_count(), 2);
    }

    #[tokio::test]
    async fn disabled_scheduler_reports_degraded() {
        let mut settings = RemediationSettings::default();
        settings.enabled = false;
        let mut scheduler = scheduler(settings);
        scheduler.start().await.unwrap();
        assert!(matches!(
            scheduler.health_check().await,
            HealthStatus::Degraded(_)
        ));
        scheduler.stop().await.unwrap();
    }
}
