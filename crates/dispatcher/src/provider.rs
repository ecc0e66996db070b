//! 프로바이더 어댑터 추상화
//!
//! 동기 프로바이더는 호출 응답에 결과를 담아 돌려주고, 비동기 프로바이더는
//! 접수 티켓만 돌려준 뒤 나중에 폴링이나 콜백으로 결과를 보고합니다.
//!
//! ```text
//!             ProviderAdapter
//!               ┌────┴────┐
//!          Sync(..)     Async(..)
//!        call() → 결과   submit() → 티켓 → poll(티켓) → 결과
//! ```
//!
//! 레지스트리가 서로 다른 어댑터를 함께 보관하므로 trait은 `BoxFuture`를
//! 반환하는 dyn-compatible 형태입니다.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use scanrelay_core::error::ProviderError;
use scanrelay_core::pipeline::BoxFuture;
use scanrelay_core::types::{Capability, FindingDraft, ProviderId, Target, TargetKind};

use crate::error::DispatchError;

/// 동기 호출 응답
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncResponse {
    pub findings: Vec<FindingDraft>,
    /// 호출 비용 (없으면 설정의 호출 단가)
    pub cost: Option<f64>,
}

/// 비동기 접수 확인
#[derive(Debug, Clone, PartialEq)]
pub struct Ack {
    /// 결과 조회에 사용할 티켓
    pub ticket: String,
    pub cost: Option<f64>,
}

/// 비동기 결과 조회 응답
#[derive(Debug, Clone, PartialEq)]
pub enum PollResponse {
    /// 아직 처리 중
    Pending,
    /// 처리 완료
    Completed {
        findings: Vec<FindingDraft>,
        cost: Option<f64>,
    },
    /// 프로바이더 측 처리 실패
    Failed { reason: String },
}

/// 결과를 즉시 돌려주는 프로바이더
pub trait SyncProvider: Send + Sync {
    fn id(&self) -> &ProviderId;

    /// 대상 유형 지원 여부
    fn supports(&self, kind: TargetKind) -> bool;

    fn call<'a>(
        &'a self,
        target: &'a Target,
        timeout: Duration,
    ) -> BoxFuture<'a, Result<SyncResponse, ProviderError>>;
}

/// 접수 후 나중에 결과를 보고하는 프로바이더
pub trait AsyncProvider: Send + Sync {
    fn id(&self) -> &ProviderId;

    fn supports(&self, kind: TargetKind) -> bool;

    /// 작업을 접수합니다.
    fn submit<'a>(
        &'a self,
        target: &'a Target,
        timeout: Duration,
    ) -> BoxFuture<'a, Result<Ack, ProviderError>>;

    /// 접수한 작업의 상태를 조회합니다.
    fn poll<'a>(
        &'a self,
        ticket: &'a str,
        timeout: Duration,
    ) -> BoxFuture<'a, Result<PollResponse, ProviderError>>;
}

/// 등록된 프로바이더
#[derive(Clone)]
pub enum ProviderAdapter {
    Sync(Arc<dyn SyncProvider>),
    Async(Arc<dyn AsyncProvider>),
}

impl ProviderAdapter {
    pub fn id(&self) -> &ProviderId {
        match self {
            Self::Sync(p) => p.id(),
            Self::Async(p) => p.id(),
        }
    }

    pub fn capability(&self) -> Capability {
        match self {
            Self::Sync(_) => Capability::Synchronous,
            Self::Async(_) => Capability::Asynchronous,
        }
    }

    pub fn supports(&self, kind: TargetKind) -> bool {
        match self {
            Self::Sync(p) => p.supports(kind),
            Self::Async(p) => p.supports(kind),
        }
    }

    /// 비동기 프로바이더면 반환합니다.
    pub fn as_async(&self) -> Option<&Arc<dyn AsyncProvider>> {
        match self {
            Self::Async(p) => Some(p),
            Self::Sync(_) => None,
        }
    }
}

impl std::fmt::Debug for ProviderAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderAdapter")
            .field("id", self.id())
            .field("capability", &self.capability())
            .finish()
    }
}

/// 프로바이더 레지스트리
///
/// 프로바이더 ID 순으로 보관하므로 디스패치 순서가 결정적입니다.
#[derive(Debug, Default, Clone)]
pub struct ProviderRegistry {
    adapters: BTreeMap<ProviderId, ProviderAdapter>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 어댑터를 등록합니다. 같은 ID가 이미 있으면 에러를 반환합니다.
    pub fn register(&mut self, adapter: ProviderAdapter) -> Result<(), DispatchError> {
        let id = adapter.id().clone();
        if self.adapters.contains_key(&id) {
            return Err(DispatchError::DuplicateProvider(id.to_string()));
        }
        self.adapters.insert(id, adapter);
        Ok(())
    }

    pub fn get(&self, id: &ProviderId) -> Option<&ProviderAdapter> {
        self.adapters.get(id)
    }

    /// 대상 유형을 지원하는 어댑터
    pub fn applicable(&self, kind: TargetKind) -> impl Iterator<Item = &ProviderAdapter> {
        self.adapters.values().filter(move |a| a.supports(kind))
    }

    pub fn ids(&self) -> impl Iterator<Item = &ProviderId> {
        self.adapters.keys()
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}
