// src/roster/rank.rs
//! Ranking of merged records and selection of the top-N highlight.
//!
//! - Full list: resolved score descending; ties keep encounter order (stable sort on
//!   records that arrive already in encounter order).
//! - Highlight: records carrying a real backend fact score come first, in rank order.
//!   Remaining slots are backfilled from the rest of the ranked list.

use std::cmp::Ordering;

use crate::roster::MergedRecord;

/// Reference highlight size.
pub const DEFAULT_HIGHLIGHT_SIZE: usize = 3;

pub fn rank_records(records: &mut [MergedRecord]) {
    records.sort_by(compare);
}

fn compare(a: &MergedRecord, b: &MergedRecord) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.encounter.cmp(&b.encounter))
}

/// Expects `ranked` to be the output of [`rank_records`].
pub fn select_highlight(ranked: &[MergedRecord], n: usize) -> Vec<MergedRecord> {
    let mut out: Vec<MergedRecord> = ranked
        .iter()
        .filter(|r| r.has_fact_score())
        .take(n)
        .cloned()
        .collect();

    if out.len() < n {
        let missing = n - out.len();
        out.extend(
            ranked
                .iter()
                .filter(|r| !r.has_fact_score())
                .take(missing)
                .cloned(),
        );
    }
    out
}
