// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod change_detector;
pub mod config;
pub mod conversation;
pub mod dashboard;
pub mod poll;
pub mod reply_cleaner;
pub mod roster;
pub mod stats;

// ---- Re-exports for stable public API ----
pub use crate::change_detector::{ChangeDetector, StructuralEq};
pub use crate::config::RosterSyncConfig;
pub use crate::dashboard::{Dashboard, DashboardSources, ThreadSourceFn};
pub use crate::poll::{FnSource, HttpJsonSource, Phase, PollView, Poller, PollerHandle, PollingConfig};
pub use crate::reply_cleaner::clean_body;
pub use crate::roster::{merge_sources, Candidate, MergeOptions, MergedRecord, Provenance, RosterView};
