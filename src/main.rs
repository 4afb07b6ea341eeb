//! roster-sync: polls the outreach backend and logs the merged lawyer roster.
//!
//! Reads `config/roster.toml` (or `$ROSTER_CONFIG_PATH`), polls the roster, candidate and
//! statistics endpoints adaptively, and logs the highlighted lawyers whenever a poll
//! brings new data. With an e-mail argument the thread(s) with that party are polled
//! too and their cleaned messages logged. Ctrl-C stops all pollers.

use anyhow::Result;
use roster_sync::dashboard::render_thread_snapshot;
use roster_sync::poll::PollView;
use roster_sync::{Dashboard, RosterSyncConfig};
use serde_json::Value;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("roster_sync=info,warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

/// Next published thread view. Pending forever once no thread is open.
async fn next_thread_view(slot: &mut Option<watch::Receiver<PollView<Value>>>) -> PollView<Value> {
    loop {
        let Some(rx) = slot.as_mut() else {
            return std::future::pending().await;
        };
        if rx.changed().await.is_ok() {
            return rx.borrow_and_update().clone();
        }
        *slot = None;
    }
}

fn log_thread(party: &str, view: &PollView<Value>) {
    if let Some(err) = &view.error {
        warn!(party, error = %err, "thread poll failing");
    }
    match render_thread_snapshot(view) {
        Ok(threads) => {
            for (thread_id, messages) in threads {
                for m in messages {
                    info!(party, thread = %thread_id, from = %m.from, body = %m.body, "message");
                }
            }
        }
        Err(e) => warn!(party, error = %format!("{e:#}"), "undecodable thread snapshot"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = RosterSyncConfig::load_default()?;
    info!(
        backend = %cfg.backend_url,
        seed = cfg.seed.len(),
        roster_base_ms = cfg.roster.base_interval_ms,
        "roster-sync starting"
    );

    // No host surface to hide in a terminal.
    let (_visible_tx, visible_rx) = watch::channel(true);
    let mut dashboard = Dashboard::connect(cfg, visible_rx);

    let party = std::env::args().nth(1);
    let thread = match &party {
        Some(email) => Some(dashboard.open_thread(email)?),
        None => None,
    };
    let mut thread_rx = thread.as_ref().map(|h| h.subscribe());
    let mut thread_seen = None;

    loop {
        tokio::select! {
            view = next_thread_view(&mut thread_rx) => {
                if view.last_updated != thread_seen {
                    thread_seen = view.last_updated;
                    log_thread(party.as_deref().unwrap_or_default(), &view);
                } else if let Some(err) = &view.error {
                    warn!(error = %err, "thread poll failing; showing last snapshot");
                }
            }
            _ = dashboard.updated() => {
                let view = dashboard.roster_view();
                info!(
                    records = view.records.len(),
                    excluded = view.seed.len(),
                    dropped = view.dropped,
                    "roster updated"
                );
                for (rank, r) in view.highlight.iter().enumerate() {
                    info!(
                        rank = rank + 1,
                        key = %r.key,
                        name = r.display.name.as_deref().unwrap_or("-"),
                        firm = r.display.firm.as_deref().unwrap_or("-"),
                        score = r.score,
                        source = ?r.score_source,
                        "highlight"
                    );
                }
                if let Some(stats) = dashboard.stats() {
                    info!(
                        contacted = stats.lawyers_contacted,
                        responded = stats.lawyers_responded,
                        quotes = stats.quotes_received,
                        deals = stats.deals_finalized,
                        "stats"
                    );
                }
                if let Some(err) = dashboard.roster_status().error {
                    warn!(error = %err, "roster poll failing; showing last snapshot");
                }
            }
            res = tokio::signal::ctrl_c() => {
                if let Err(e) = res {
                    warn!(error = %e, "ctrl-c listener failed");
                }
                break;
            }
        }
    }

    drop(thread);
    dashboard.stop();
    info!("roster-sync stopped");
    Ok(())
}
