// src/poll/scheduler.rs
//! Adaptive polling for one subscription.
//!
//! A [`Poller`] is built (`Idle`), then [`Poller::start`] spawns a single tokio task that
//! owns the [`PollingState`] and runs fetch cycles one at a time:
//!
//! - unchanged payload: interval grows by 1.5x up to `max_interval`
//! - changed payload: snapshot replaced, `on_update` called, interval reset to base
//! - fetch error: error recorded, stale snapshot kept, interval untouched
//! - host hidden: `Suspended`, no timer; becoming visible fetches immediately
//!
//! Subscribers read a [`PollView`] from a `watch` channel. Every publish goes through
//! `send_if_modified` and refuses to write once the view says `Stopped`; [`PollerHandle::stop`]
//! flips the view to `Stopped` under that same lock before aborting the task, so a fetch
//! that settles after teardown can't touch anything.

use chrono::Utc;
use metrics::{counter, gauge};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::change_detector::{ChangeDetector, StructuralEq};
use crate::poll::config::{next_backoff, PollingConfig};
use crate::poll::ensure_metrics_described;
use crate::poll::types::{Phase, PollView, Snapshot, SnapshotSource};

pub type OnUpdate<T> = Box<dyn Fn(&T, Option<&T>) + Send + Sync>;
pub type ShouldContinue = Box<dyn Fn() -> bool + Send + Sync>;

/// Mutable scheduling state, owned by exactly one worker task.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollingState {
    pub current_interval: Duration,
    pub base_interval: Duration,
    pub max_interval: Duration,
    pub enabled: bool,
    pub mounted: bool,
}

impl PollingState {
    pub fn new(cfg: &PollingConfig) -> Self {
        let base = cfg.base_interval();
        Self {
            current_interval: base,
            base_interval: base,
            max_interval: cfg.max_interval(),
            enabled: cfg.enabled,
            mounted: true,
        }
    }

    pub fn reset(&mut self) {
        self.current_interval = self.base_interval;
    }

    pub fn back_off(&mut self) {
        self.current_interval =
            next_backoff(self.current_interval, self.base_interval, self.max_interval);
    }
}

#[derive(Debug, Clone, Copy)]
enum Command {
    Refresh,
}

/// Builder for one subscription. Nothing runs until [`Poller::start`].
pub struct Poller<T> {
    source: Arc<dyn SnapshotSource<T>>,
    detector: Box<dyn ChangeDetector<T>>,
    config: PollingConfig,
    on_update: Option<OnUpdate<T>>,
    should_continue: Option<ShouldContinue>,
    visibility: Option<watch::Receiver<bool>>,
}

impl<T: Serialize + Send + Sync + 'static> Poller<T> {
    /// Poller with the default structural change detector.
    pub fn new<S>(source: S) -> Self
    where
        S: SnapshotSource<T> + 'static,
    {
        Self::with_detector(source, StructuralEq)
    }
}

impl<T: Send + Sync + 'static> Poller<T> {
    pub fn with_detector<S, D>(source: S, detector: D) -> Self
    where
        S: SnapshotSource<T> + 'static,
        D: ChangeDetector<T> + 'static,
    {
        Self {
            source: Arc::new(source),
            detector: Box::new(detector),
            config: PollingConfig::default(),
            on_update: None,
            should_continue: None,
            visibility: None,
        }
    }

    pub fn config(mut self, config: PollingConfig) -> Self {
        self.config = config.sanitized();
        self
    }

    pub fn base_interval(mut self, d: Duration) -> Self {
        self.config.base_interval_ms = d.as_millis() as u64;
        self.config = self.config.sanitized();
        self
    }

    pub fn max_interval(mut self, d: Duration) -> Self {
        self.config.max_interval_ms = d.as_millis() as u64;
        self.config = self.config.sanitized();
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.config.enabled = enabled;
        self
    }

    /// Called with `(new, old)` after a fetch changed the snapshot.
    pub fn on_update<F>(mut self, f: F) -> Self
    where
        F: Fn(&T, Option<&T>) + Send + Sync + 'static,
    {
        self.on_update = Some(Box::new(f));
        self
    }

    /// Checked before every scheduled fetch; `false` skips that fetch.
    pub fn should_continue<F>(mut self, f: F) -> Self
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        self.should_continue = Some(Box::new(f));
        self
    }

    /// Host-surface visibility. Without one the surface counts as always visible.
    pub fn visibility(mut self, rx: watch::Receiver<bool>) -> Self {
        self.visibility = Some(rx);
        self
    }

    /// Spawn the worker. Must be called from within a tokio runtime.
    pub fn start(self) -> PollerHandle<T> {
        ensure_metrics_described();

        let state = PollingState::new(&self.config);
        let (view_tx, view_rx) = watch::channel(PollView::idle(state.base_interval));
        let view_tx = Arc::new(view_tx);
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let name = self.source.name().to_string();

        info!(
            target: "poll",
            source = %name,
            base_ms = state.base_interval.as_millis() as u64,
            max_ms = state.max_interval.as_millis() as u64,
            enabled = state.enabled,
            "poller started"
        );

        let worker = Worker {
            name: name.clone(),
            source: self.source,
            detector: self.detector,
            on_update: self.on_update,
            should_continue: self.should_continue,
            view: Arc::clone(&view_tx),
            state,
            last: None,
        };
        let task = tokio::spawn(worker.run(cmd_rx, self.visibility));

        PollerHandle {
            name,
            view_tx,
            view_rx,
            commands: cmd_tx,
            task: Some(task),
        }
    }
}

/// Running subscription. Dropping the handle stops the poller.
pub struct PollerHandle<T> {
    name: String,
    view_tx: Arc<watch::Sender<PollView<T>>>,
    view_rx: watch::Receiver<PollView<T>>,
    commands: mpsc::UnboundedSender<Command>,
    task: Option<JoinHandle<()>>,
}

impl<T> PollerHandle<T> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current view (snapshot, loading flag, error, last update time).
    pub fn view(&self) -> PollView<T> {
        self.view_rx.borrow().clone()
    }

    /// Change-notified view stream.
    pub fn subscribe(&self) -> watch::Receiver<PollView<T>> {
        self.view_rx.clone()
    }

    /// Reset the interval to base and fetch now, cutting the pending timer short.
    /// A refresh requested mid-fetch runs after that fetch settles.
    pub fn refresh(&self) {
        if self.commands.send(Command::Refresh).is_err() {
            debug!(target: "poll", source = %self.name, "refresh after stop ignored");
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.view_rx.borrow().is_stopped()
    }

    /// Terminal and idempotent: clears the timer and discards any in-flight result.
    pub fn stop(&mut self) {
        let newly_stopped = self.view_tx.send_if_modified(|v| {
            if v.phase == Phase::Stopped {
                return false;
            }
            v.phase = Phase::Stopped;
            v.loading = false;
            true
        });
        if let Some(task) = self.task.take() {
            task.abort();
        }
        if newly_stopped {
            info!(target: "poll", source = %self.name, "poller stopped");
        }
    }
}

impl<T> Drop for PollerHandle<T> {
    fn drop(&mut self) {
        self.stop();
    }
}

enum Next {
    FetchNow,
    Wait,
    Suspend,
}

/// Wake-up reasons while `Scheduled`.
enum WaitWake {
    Timer,
    Refresh,
    Hidden,
    Closed,
}

/// Wake-up reasons while `Suspended`; no timer is armed.
enum SuspendWake {
    Refresh,
    Visible,
    Closed,
}

struct Worker<T> {
    name: String,
    source: Arc<dyn SnapshotSource<T>>,
    detector: Box<dyn ChangeDetector<T>>,
    on_update: Option<OnUpdate<T>>,
    should_continue: Option<ShouldContinue>,
    view: Arc<watch::Sender<PollView<T>>>,
    state: PollingState,
    last: Option<Arc<T>>,
}

impl<T: Send + Sync + 'static> Worker<T> {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut visibility: Option<watch::Receiver<bool>>,
    ) {
        let mut next = Next::FetchNow;
        loop {
            next = match next {
                Next::FetchNow => {
                    if !is_visible(&visibility) {
                        Next::Suspend
                    } else if self.gated() {
                        counter!("poll_skipped_total", "source" => self.name.clone()).increment(1);
                        debug!(target: "poll", source = %self.name, "fetch skipped");
                        Next::Wait
                    } else {
                        if !self.cycle().await {
                            break;
                        }
                        Next::Wait
                    }
                }
                Next::Wait => {
                    if !self.set_phase(Phase::Scheduled) {
                        break;
                    }
                    let woke = tokio::select! {
                        cmd = commands.recv() => match cmd {
                            Some(Command::Refresh) => WaitWake::Refresh,
                            None => WaitWake::Closed,
                        },
                        _ = wait_visibility(&mut visibility, false) => WaitWake::Hidden,
                        _ = tokio::time::sleep(self.state.current_interval) => WaitWake::Timer,
                    };
                    match woke {
                        WaitWake::Timer => Next::FetchNow,
                        WaitWake::Refresh => {
                            drain_refreshes(&mut commands);
                            self.state.reset();
                            Next::FetchNow
                        }
                        WaitWake::Hidden => Next::Suspend,
                        WaitWake::Closed => break,
                    }
                }
                Next::Suspend => {
                    if !self.set_phase(Phase::Suspended) {
                        break;
                    }
                    debug!(target: "poll", source = %self.name, "suspended while hidden");
                    let woke = tokio::select! {
                        cmd = commands.recv() => match cmd {
                            Some(Command::Refresh) => SuspendWake::Refresh,
                            None => SuspendWake::Closed,
                        },
                        _ = wait_visibility(&mut visibility, true) => SuspendWake::Visible,
                    };
                    match woke {
                        // Remember the reset; the fetch happens on resume.
                        SuspendWake::Refresh => {
                            drain_refreshes(&mut commands);
                            self.state.reset();
                            self.publish_interval();
                            Next::Suspend
                        }
                        SuspendWake::Visible => Next::FetchNow,
                        SuspendWake::Closed => break,
                    }
                }
            };
        }
        self.state.mounted = false;
        debug!(target: "poll", source = %self.name, "worker exited");
    }

    fn gated(&self) -> bool {
        !self.state.enabled || self.should_continue.as_ref().is_some_and(|f| !f())
    }

    /// Publish unless stopped. Returns false once the view is `Stopped`.
    fn publish(&mut self, f: impl FnOnce(&mut PollView<T>)) -> bool {
        let alive = self.view.send_if_modified(|v| {
            if v.phase == Phase::Stopped {
                return false;
            }
            f(v);
            true
        });
        if !alive {
            self.state.mounted = false;
        }
        alive
    }

    fn set_phase(&mut self, phase: Phase) -> bool {
        self.publish(|v| v.phase = phase)
    }

    fn publish_interval(&mut self) {
        let interval = self.state.current_interval;
        self.publish(|v| v.current_interval = interval);
    }

    /// Run `on_update` unless the poller was stopped after the snapshot was published.
    fn notify(&mut self, new: &T, old: Option<&T>) -> bool {
        if self.view.borrow().is_stopped() {
            self.state.mounted = false;
            return false;
        }
        if let Some(cb) = &self.on_update {
            cb(new, old);
        }
        true
    }

    /// One fetch, start to settle. Returns false if the poller was stopped meanwhile.
    async fn cycle(&mut self) -> bool {
        if !self.publish(|v| {
            v.phase = Phase::Fetching;
            v.loading = true;
        }) {
            return false;
        }
        counter!("poll_fetch_total", "source" => self.name.clone()).increment(1);

        let result = self.source.fetch().await;
        let now = Utc::now();

        match result {
            Ok(payload) => {
                let changed = match &self.last {
                    None => true,
                    Some(prev) => self.detector.changed(prev, &payload),
                };
                if changed {
                    self.state.reset();
                    let snap = Snapshot::new(payload, now);
                    let interval = self.state.current_interval;
                    let published = snap.clone();
                    if !self.publish(move |v| {
                        v.snapshot = Some(published);
                        v.last_updated = Some(now);
                        v.error = None;
                        v.loading = false;
                        v.current_interval = interval;
                        v.cycles += 1;
                    }) {
                        return false;
                    }
                    let prev = self.last.replace(Arc::clone(&snap.payload));
                    counter!("poll_changes_total", "source" => self.name.clone()).increment(1);
                    debug!(target: "poll", source = %self.name, changed = true, "fetch settled");
                    if !self.notify(&snap.payload, prev.as_deref()) {
                        return false;
                    }
                } else {
                    self.state.back_off();
                    let interval = self.state.current_interval;
                    if !self.publish(|v| {
                        v.error = None;
                        v.loading = false;
                        v.current_interval = interval;
                        v.cycles += 1;
                    }) {
                        return false;
                    }
                    debug!(
                        target: "poll",
                        source = %self.name,
                        changed = false,
                        interval_ms = interval.as_millis() as u64,
                        "fetch settled"
                    );
                }
            }
            Err(e) => {
                let msg = format!("{e:#}");
                warn!(target: "poll", source = %self.name, error = %msg, "fetch failed");
                counter!("poll_fetch_errors_total", "source" => self.name.clone()).increment(1);
                if !self.publish(|v| {
                    v.error = Some(msg);
                    v.loading = false;
                    v.cycles += 1;
                }) {
                    return false;
                }
            }
        }

        gauge!("poll_interval_ms", "source" => self.name.clone())
            .set(self.state.current_interval.as_millis() as f64);
        true
    }
}

fn is_visible(rx: &Option<watch::Receiver<bool>>) -> bool {
    rx.as_ref().map_or(true, |r| *r.borrow())
}

/// Resolves once visibility equals `want`. Never resolves without a signal, or after the
/// host dropped its sender (the last value then holds forever).
async fn wait_visibility(rx: &mut Option<watch::Receiver<bool>>, want: bool) {
    let Some(rx) = rx.as_mut() else {
        return std::future::pending().await;
    };
    let reached = rx.wait_for(|v| *v == want).await.is_ok();
    if !reached {
        std::future::pending::<()>().await;
    }
}

fn drain_refreshes(commands: &mut mpsc::UnboundedReceiver<Command>) {
    while let Ok(Command::Refresh) = commands.try_recv() {}
}
