// src/config/mod.rs
pub mod roster;

pub use roster::RosterSyncConfig;
