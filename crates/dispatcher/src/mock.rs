//! 테스트용 mock 프로바이더
//!
//! 응답, 지연, 에러를 조정할 수 있으며 호출 횟수를 기록합니다.
//! 다른 크레이트의 테스트에서는 `test-util` 기능으로 사용합니다.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use scanrelay_core::error::ProviderError;
use scanrelay_core::pipeline::BoxFuture;
use scanrelay_core::types::{FindingDraft, ProviderId, Target, TargetKind};

use crate::provider::{Ack, AsyncProvider, PollResponse, SyncProvider, SyncResponse};

fn supports(kinds: &Option<Vec<TargetKind>>, kind: TargetKind) -> bool {
    kinds.as_ref().is_none_or(|kinds| kinds.contains(&kind))
}

/// 동기 mock 프로바이더
pub struct MockSyncProvider {
    id: ProviderId,
    kinds: Option<Vec<TargetKind>>,
    findings: Vec<FindingDraft>,
    cost: Option<f64>,
    delay: Option<Duration>,
    error: Mutex<Option<ProviderError>>,
    calls: AtomicUsize,
}

impl MockSyncProvider {
    /// 모든 대상 유형을 지원하고 빈 결과를 돌려주는 프로바이더
    pub fn new(id: impl Into<ProviderId>) -> Self {
        Self {
            id: id.into(),
            kinds: None,
            findings: Vec::new(),
            cost: None,
            delay: None,
            error: Mutex::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_kinds(mut self, kinds: &[TargetKind]) -> Self {
        self.kinds = Some(kinds.to_vec());
        self
    }

    pub fn with_findings(mut self, findings: Vec<FindingDraft>) -> Self {
        self.findings = findings;
        self
    }

    pub fn with_cost(mut self, cost: f64) -> Self {
        self.cost = Some(cost);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_error(self, error: ProviderError) -> Self {
        self.fail_with(Some(error));
        self
    }

    /// 이후 호출의 에러를 바꿉니다. `None`이면 정상 응답합니다.
    pub fn fail_with(&self, error: Option<ProviderError>) {
        if let Ok(mut slot) = self.error.lock() {
            *slot = error;
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl SyncProvider for MockSyncProvider {
    fn id(&self) -> &ProviderId {
        &self.id
    }

    fn supports(&self, kind: TargetKind) -> bool {
        supports(&self.kinds, kind)
    }

    fn call<'a>(
        &'a self,
        _target: &'a Target,
        _timeout: Duration,
    ) -> BoxFuture<'a, Result<SyncResponse, ProviderError>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            let error = self.error.lock().ok().and_then(|slot| slot.clone());
            match error {
                Some(error) => Err(error),
                None => Ok(SyncResponse {
                    findings: self.findings.clone(),
                    cost: self.cost,
                }),
            }
        })
    }
}

/// 비동기 mock 프로바이더
///
/// 접수 시 `"{id}-{n}"` 형식의 티켓을 발급하고, 폴링은 `set_poll`로 지정한
/// 응답을 돌려줍니다 (기본값 `Pending`).
pub struct MockAsyncProvider {
    id: ProviderId,
    kinds: Option<Vec<TargetKind>>,
    cost: Option<f64>,
    submit_error: Option<ProviderError>,
    poll_response: Mutex<Result<PollResponse, ProviderError>>,
    submits: AtomicUsize,
    polls: AtomicUsize,
}

impl MockAsyncProvider {
    pub fn new(id: impl Into<ProviderId>) -> Self {
        Self {
            id: id.into(),
            kinds: None,
            cost: None,
            submit_error: None,
            poll_response: Mutex::new(Ok(PollResponse::Pending)),
            submits: AtomicUsize::new(0),
            polls: AtomicUsize::new(0),
        }
    }

    pub fn with_kinds(mut self, kinds: &[TargetKind]) -> Self {
        self.kinds = Some(kinds.to_vec());
        self
    }

    pub fn with_cost(mut self, cost: f64) -> Self {
        self.cost = Some(cost);
        self
    }

    pub fn with_submit_error(mut self, error: ProviderError) -> Self {
        self.submit_error = Some(error);
        self
    }

    /// 이후 폴링 응답을 바꿉니다.
    pub fn set_poll(&self, response: Result<PollResponse, ProviderError>) {
        if let Ok(mut slot) = self.poll_response.lock() {
            *slot = response;
        }
    }

    /// 이후 폴링이 지정한 발견 항목으로 완료되도록 합니다.
    pub fn complete_with(&self, findings: Vec<FindingDraft>) {
        self.set_poll(Ok(PollResponse::Completed {
            findings,
            cost: self.cost,
        }));
    }

    pub fn submits(&self) -> usize {
        self.submits.load(Ordering::SeqCst)
    }

    pub fn polls(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }
}

impl AsyncProvider for MockAsyncProvider {
    fn id(&self) -> &ProviderId {
        &self.id
    }

    fn supports(&self, kind: TargetKind) -> bool {
        supports(&self.kinds, kind)
    }

    fn submit<'a>(
        &'a self,
        _target: &'a Target,
        _timeout: Duration,
    ) -> BoxFuture<'a, Result<Ack, ProviderError>> {
        Box::pin(async move {
            let n = self.submits.fetch_add(1, Ordering::SeqCst) + 1;
            match &self.submit_error {
                Some(error) => Err(error.clone()),
                None => Ok(Ack {
                    ticket: format!("{}-{n}", self.id),
                    cost: self.cost,
                }),
            }
        })
    }

    fn poll<'a>(
        &'a self,
        _ticket: &'a str,
        _timeout: Duration,
    ) -> BoxFuture<'a, Result<PollResponse, ProviderError>> {
        Box::pin(async move {
            self.polls.fetch_add(1, Ordering::SeqCst);
            self.poll_response
                .lock()
                .map(|slot| slot.clone())
                .unwrap_or(Ok(PollResponse::Pending))
        })
    }
}
