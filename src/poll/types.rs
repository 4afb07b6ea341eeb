// src/poll/types.rs
use anyhow::Result;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// One immutable fetched payload plus its capture time.
#[derive(Debug)]
pub struct Snapshot<T> {
    pub payload: Arc<T>,
    pub captured_at: DateTime<Utc>,
}

// Manual impl: cloning shares the payload and must not require `T: Clone`.
impl<T> Clone for Snapshot<T> {
    fn clone(&self) -> Self {
        Self {
            payload: Arc::clone(&self.payload),
            captured_at: self.captured_at,
        }
    }
}

impl<T> Snapshot<T> {
    pub fn new(payload: T, captured_at: DateTime<Utc>) -> Self {
        Self {
            payload: Arc::new(payload),
            captured_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Scheduled,
    Fetching,
    Suspended,
    Stopped,
}

/// What a subscriber sees of one poller.
#[derive(Debug)]
pub struct PollView<T> {
    pub snapshot: Option<Snapshot<T>>,
    pub loading: bool,
    /// Last fetch failure, rendered with `{:#}`. Cleared by the next successful fetch.
    pub error: Option<String>,
    /// Time of the last fetch that changed the snapshot.
    pub last_updated: Option<DateTime<Utc>>,
    pub current_interval: Duration,
    pub phase: Phase,
    /// Number of settled fetches (success or failure).
    pub cycles: u64,
}

impl<T> Clone for PollView<T> {
    fn clone(&self) -> Self {
        Self {
            snapshot: self.snapshot.clone(),
            loading: self.loading,
            error: self.error.clone(),
            last_updated: self.last_updated,
            current_interval: self.current_interval,
            phase: self.phase,
            cycles: self.cycles,
        }
    }
}

impl<T> PollView<T> {
    pub(crate) fn idle(base_interval: Duration) -> Self {
        Self {
            snapshot: None,
            loading: false,
            error: None,
            last_updated: None,
            current_interval: base_interval,
            phase: Phase::Idle,
            cycles: 0,
        }
    }

    pub fn payload(&self) -> Option<&T> {
        self.snapshot.as_ref().map(|s| s.payload.as_ref())
    }

    pub fn is_stopped(&self) -> bool {
        self.phase == Phase::Stopped
    }
}

/// Fetch contract for one data need (roster, statistics, a single thread).
#[async_trait::async_trait]
pub trait SnapshotSource<T>: Send + Sync {
    async fn fetch(&self) -> Result<T>;
    fn name(&self) -> &str;
}

/// Adapts an async closure into a [`SnapshotSource`].
pub struct FnSource<F> {
    name: String,
    f: F,
}

impl<F> FnSource<F> {
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

#[async_trait::async_trait]
impl<T, F, Fut> SnapshotSource<T> for FnSource<F>
where
    T: Send + 'static,
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<T>> + Send + 'static,
{
    async fn fetch(&self) -> Result<T> {
        (self.f)().await
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[async_trait::async_trait]
impl<T: Send + 'static> SnapshotSource<T> for Box<dyn SnapshotSource<T>> {
    async fn fetch(&self) -> Result<T> {
        (**self).fetch().await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
