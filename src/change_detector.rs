// src/change_detector.rs
//! Snapshot comparison used by the poller to decide whether a fetch changed anything.
//!
//! The default is [`StructuralEq`]: both payloads are lowered to `serde_json::Value`
//! and compared as trees. Objects compare as maps, so a backend that reorders keys
//! between responses does not look like a change. Arrays still compare by position.

use serde::Serialize;

/// Decides whether `new` differs from `old`. Must be deterministic and side-effect free.
pub trait ChangeDetector<T>: Send + Sync {
    fn changed(&self, old: &T, new: &T) -> bool;
}

impl<T, F> ChangeDetector<T> for F
where
    F: Fn(&T, &T) -> bool + Send + Sync,
{
    fn changed(&self, old: &T, new: &T) -> bool {
        self(old, new)
    }
}

/// Order-independent structural equality over the serde data model.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuralEq;

impl<T: Serialize> ChangeDetector<T> for StructuralEq {
    fn changed(&self, old: &T, new: &T) -> bool {
        match (serde_json::to_value(old), serde_json::to_value(new)) {
            (Ok(a), Ok(b)) => a != b,
            // Unserializable payloads can't be compared; treat as changed so data still flows.
            _ => true,
        }
    }
}

/// Equality via `PartialEq`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PartialEqDetector;

impl<T: PartialEq> ChangeDetector<T> for PartialEqDetector {
    fn changed(&self, old: &T, new: &T) -> bool {
        old != new
    }
}

/// Byte comparison of the JSON serialization.
///
/// Order-sensitive: a `HashMap` (or any structure whose iteration order is not
/// stable between fetches) can serialize differently while holding the same data,
/// which shows up as a spurious change and resets backoff. Prefer [`StructuralEq`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SerializedEq;

impl<T: Serialize> ChangeDetector<T> for SerializedEq {
    fn changed(&self, old: &T, new: &T) -> bool {
        match (serde_json::to_vec(old), serde_json::to_vec(new)) {
            (Ok(a), Ok(b)) => a != b,
            _ => true,
        }
    }
}
