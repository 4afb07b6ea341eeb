// src/poll/mod.rs
pub mod config;
pub mod scheduler;
pub mod source;
pub mod types;

use metrics::{describe_counter, describe_gauge};
use once_cell::sync::OnceCell;

pub use config::PollingConfig;
pub use scheduler::{Poller, PollerHandle, PollingState};
pub use source::HttpJsonSource;
pub use types::{FnSource, Phase, PollView, Snapshot, SnapshotSource};

/// One-time metrics registration (so series show up once a recorder is installed).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("poll_fetch_total", "Fetches started, per source.");
        describe_counter!(
            "poll_fetch_errors_total",
            "Fetches that failed (transport/parse), per source."
        );
        describe_counter!(
            "poll_changes_total",
            "Fetches whose payload differed from the previous snapshot."
        );
        describe_counter!(
            "poll_skipped_total",
            "Scheduled fetches skipped because polling was disabled or gated off."
        );
        describe_gauge!("poll_interval_ms", "Current polling interval in milliseconds.");
        describe_counter!(
            "roster_dropped_candidates_total",
            "Candidates dropped from the merge for lacking any identity key."
        );
    });
}
