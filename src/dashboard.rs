// src/dashboard.rs
//! Wiring of the per-need pollers (roster, inferred candidates, statistics, one open thread)
//! into the merged roster view. Holds no derived state: [`Dashboard::roster_view`] merges
//! the latest snapshots on every call.

use anyhow::Result;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{watch, Notify};
use tracing::warn;

use crate::config::RosterSyncConfig;
use crate::conversation::{decode_threads, render_thread, RenderedMessage};
use crate::poll::{HttpJsonSource, PollView, Poller, PollerHandle, PollingConfig, SnapshotSource};
use crate::roster::{decode_candidates, Candidate, MergeOptions, Provenance, RosterSources, RosterView};
use crate::stats::RosterStats;

/// Builds the fetcher for the thread(s) with one party, given their e-mail.
pub type ThreadSourceFn = Box<dyn Fn(&str) -> Result<Box<dyn SnapshotSource<Value>>> + Send + Sync>;

/// Fetchers for the dashboard's standing data needs, plus the per-thread factory.
pub struct DashboardSources {
    pub roster: Box<dyn SnapshotSource<Value>>,
    pub inferred: Box<dyn SnapshotSource<Value>>,
    pub stats: Box<dyn SnapshotSource<RosterStats>>,
    pub thread: ThreadSourceFn,
}

impl DashboardSources {
    /// Backend endpoints: `/api/lawyers`, `/api/candidates`, `/api/stats` and
    /// `/api/conversations/<email>`.
    pub fn http(cfg: &RosterSyncConfig, client: &reqwest::Client) -> Self {
        let backend = cfg.clone();
        let thread_client = client.clone();
        Self {
            roster: Box::new(
                HttpJsonSource::<Value>::new("roster", cfg.endpoint("api/lawyers")).with_client(client.clone()),
            ),
            inferred: Box::new(
                HttpJsonSource::<Value>::new("inferred", cfg.endpoint("api/candidates"))
                    .with_client(client.clone()),
            ),
            stats: Box::new(
                HttpJsonSource::<RosterStats>::new("stats", cfg.endpoint("api/stats")).with_client(client.clone()),
            ),
            thread: Box::new(move |email: &str| {
                let url = backend.thread_endpoint(email)?;
                let source = HttpJsonSource::<Value>::new(thread_name(email), url.as_str())
                    .with_client(thread_client.clone());
                Ok(Box::new(source) as Box<dyn SnapshotSource<Value>>)
            }),
        }
    }
}

pub struct Dashboard {
    seed: Vec<Candidate>,
    merge: MergeOptions,
    thread_cfg: PollingConfig,
    thread_source: ThreadSourceFn,
    visibility: watch::Receiver<bool>,
    updates: Arc<Notify>,
    roster: PollerHandle<Value>,
    inferred: PollerHandle<Value>,
    stats: PollerHandle<RosterStats>,
}

impl Dashboard {
    /// Poll the configured backend over HTTP.
    pub fn connect(cfg: RosterSyncConfig, visibility: watch::Receiver<bool>) -> Self {
        let client = reqwest::Client::new();
        let sources = DashboardSources::http(&cfg, &client);
        Self::start_with(cfg, sources, visibility)
    }

    pub fn start_with(cfg: RosterSyncConfig, sources: DashboardSources, visibility: watch::Receiver<bool>) -> Self {
        let updates = Arc::new(Notify::new());

        let roster = poller(sources.roster, cfg.roster, &visibility, &updates);
        let inferred = poller(sources.inferred, cfg.inferred, &visibility, &updates);
        let stats = poller(sources.stats, cfg.stats, &visibility, &updates);

        Self {
            seed: cfg.seed.clone(),
            merge: cfg.merge_options(),
            thread_cfg: cfg.thread,
            thread_source: sources.thread,
            visibility,
            updates,
            roster,
            inferred,
            stats,
        }
    }

    /// Resolves after any standing poller saw a changed payload.
    pub async fn updated(&self) {
        self.updates.notified().await;
    }

    /// Merge of the latest seed, roster and inferred snapshots.
    pub fn roster_view(&self) -> RosterView {
        let sources = RosterSources {
            seed: self.seed.clone(),
            authoritative: candidates_from(&self.roster.view(), Provenance::Authoritative),
            inferred: candidates_from(&self.inferred.view(), Provenance::Inferred),
        };
        sources.merge(&self.merge)
    }

    pub fn stats(&self) -> Option<RosterStats> {
        self.stats.view().payload().cloned()
    }

    pub fn roster_status(&self) -> PollView<Value> {
        self.roster.view()
    }

    pub fn inferred_status(&self) -> PollView<Value> {
        self.inferred.view()
    }

    pub fn stats_status(&self) -> PollView<RosterStats> {
        self.stats.view()
    }

    /// Manual "refresh now" on every standing poller.
    pub fn refresh_all(&self) {
        self.roster.refresh();
        self.inferred.refresh();
        self.stats.refresh();
    }

    /// Start polling the thread(s) with one party. Dropping the handle closes it.
    pub fn open_thread(&self, email: &str) -> Result<PollerHandle<Value>> {
        let source = (self.thread_source)(email)?;
        Ok(Poller::new(source)
            .config(self.thread_cfg)
            .visibility(self.visibility.clone())
            .start())
    }

    pub fn stop(&mut self) {
        self.roster.stop();
        self.inferred.stop();
        self.stats.stop();
    }
}

fn poller<T>(
    source: Box<dyn SnapshotSource<T>>,
    cfg: PollingConfig,
    visibility: &watch::Receiver<bool>,
    updates: &Arc<Notify>,
) -> PollerHandle<T>
where
    T: serde::Serialize + Send + Sync + 'static,
{
    let notify = Arc::clone(updates);
    Poller::new(source)
        .config(cfg)
        .visibility(visibility.clone())
        .on_update(move |_new: &T, _old: Option<&T>| notify.notify_one())
        .start()
}

fn thread_name(email: &str) -> String {
    format!("thread:{}", email.trim().to_lowercase())
}

fn candidates_from(view: &PollView<Value>, provenance: Provenance) -> Vec<Candidate> {
    let Some(payload) = view.payload() else {
        return Vec::new();
    };
    match decode_candidates(payload, provenance) {
        Ok(list) => list,
        Err(e) => {
            warn!(target: "roster", ?provenance, error = %format!("{e:#}"), "undecodable roster snapshot");
            Vec::new()
        }
    }
}

/// Cleaned messages per thread from a thread-poller snapshot.
pub fn render_thread_snapshot(view: &PollView<Value>) -> Result<Vec<(String, Vec<RenderedMessage>)>> {
    let Some(payload) = view.payload() else {
        return Ok(Vec::new());
    };
    Ok(decode_threads(payload)?
        .iter()
        .map(|t| (t.thread_id.clone(), render_thread(t)))
        .collect())
}
