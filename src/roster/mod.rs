// src/roster/mod.rs
//! Multi-source roster merge.
//!
//! Candidates arrive independently from the static seed list, the backend roster and the
//! AI-extracted candidate list. [`merge_sources`] folds them into one record per identity
//! key, resolving each field from the strongest source that supplies it, then ranks the
//! result. It is a pure function of its inputs and is recomputed on every call.

pub mod candidate;
pub mod rank;

use metrics::counter;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

pub use candidate::{
    decode_candidates, identity_key, normalize_email, Candidate, DisplayFields, IdentityKey,
    Provenance, ScoreFields,
};
pub use rank::{rank_records, select_highlight, DEFAULT_HIGHLIGHT_SIZE};

/// Upper bound of the score scale.
pub const MAX_SCORE: f64 = 100.0;

/// Where a record's resolved score came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreSource {
    Fact,
    Inferred,
    Seed,
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergedRecord {
    pub key: IdentityKey,
    pub email: Option<String>,
    pub display: DisplayFields,
    pub experience_years: Option<u32>,
    pub email_count: Option<u32>,
    /// Resolved score, clamped to `[0, 100]`.
    pub score: f64,
    pub score_source: ScoreSource,
    /// Contributing sources, strongest first.
    pub sources: Vec<Provenance>,
    /// `(source precedence, position within that source)` of the first candidate seen.
    pub encounter: (u8, usize),
}

impl MergedRecord {
    /// A backend fact score that counts (non-zero). See [`resolve_score`].
    pub fn has_fact_score(&self) -> bool {
        self.score_source == ScoreSource::Fact && self.score > 0.0
    }
}

#[derive(Debug, Clone)]
pub struct MergeOptions {
    pub highlight_size: usize,
    /// Normalized emails routed to the seed bucket instead of the general list.
    excluded: BTreeSet<String>,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            highlight_size: DEFAULT_HIGHLIGHT_SIZE,
            excluded: BTreeSet::new(),
        }
    }
}

impl MergeOptions {
    pub fn with_highlight_size(mut self, n: usize) -> Self {
        self.highlight_size = n;
        self
    }

    /// Add emails (any case/whitespace) to the exclusion set; blanks are ignored.
    pub fn exclude<I, S>(mut self, emails: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.excluded
            .extend(emails.into_iter().filter_map(|e| normalize_email(e.as_ref())));
        self
    }

    pub fn excluded(&self) -> &BTreeSet<String> {
        &self.excluded
    }

    fn is_excluded(&self, key: &IdentityKey) -> bool {
        match key {
            IdentityKey::Email(e) => self.excluded.contains(e),
            IdentityKey::Synthetic(_) => false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RosterView {
    /// Deduplicated, ranked, non-excluded records.
    pub records: Vec<MergedRecord>,
    /// Excluded records (demo/internal seed accounts), in encounter order.
    pub seed: Vec<MergedRecord>,
    /// Top-N subset of `records`.
    pub highlight: Vec<MergedRecord>,
    /// Candidates dropped for lacking any identity key.
    pub dropped: usize,
}

impl RosterView {
    pub fn find(&self, email: &str) -> Option<&MergedRecord> {
        let key = IdentityKey::Email(normalize_email(email)?);
        self.records
            .iter()
            .chain(self.seed.iter())
            .find(|r| r.key == key)
    }
}

/// The three roster sources a dashboard polls for.
#[derive(Debug, Clone, Default)]
pub struct RosterSources {
    pub seed: Vec<Candidate>,
    pub authoritative: Vec<Candidate>,
    pub inferred: Vec<Candidate>,
}

impl RosterSources {
    pub fn merge(&self, opts: &MergeOptions) -> RosterView {
        merge_sources(
            &[
                self.seed.as_slice(),
                self.authoritative.as_slice(),
                self.inferred.as_slice(),
            ],
            opts,
        )
    }
}

/// Merge candidate lists into one ranked, deduplicated view.
///
/// List order is irrelevant; each candidate's own provenance decides precedence and
/// encounter order (authoritative, then inferred, then seed; input order within each).
pub fn merge_sources<L: AsRef<[Candidate]>>(sources: &[L], opts: &MergeOptions) -> RosterView {
    let mut tagged: Vec<((u8, usize), &Candidate)> = Vec::new();
    let mut positions: HashMap<u8, usize> = HashMap::new();
    for list in sources {
        for c in list.as_ref() {
            let prec = c.provenance.precedence();
            let pos = positions.entry(prec).or_insert(0);
            tagged.push(((prec, *pos), c));
            *pos += 1;
        }
    }
    tagged.sort_by_key(|(enc, _)| *enc);

    let mut dropped = 0usize;
    let mut index: HashMap<IdentityKey, usize> = HashMap::new();
    let mut groups: Vec<(IdentityKey, (u8, usize), Vec<&Candidate>)> = Vec::new();
    for (enc, c) in tagged {
        let Some(key) = identity_key(c) else {
            dropped += 1;
            debug!(target: "roster", provenance = ?c.provenance, "dropping candidate without identity key");
            continue;
        };
        match index.get(&key) {
            Some(&i) => groups[i].2.push(c),
            None => {
                index.insert(key.clone(), groups.len());
                groups.push((key, enc, vec![c]));
            }
        }
    }
    if dropped > 0 {
        crate::poll::ensure_metrics_described();
        counter!("roster_dropped_candidates_total").increment(dropped as u64);
    }

    let mut records = Vec::with_capacity(groups.len());
    let mut seed = Vec::new();
    for (key, encounter, members) in groups {
        let record = synthesize(key, encounter, &members);
        if opts.is_excluded(&record.key) {
            seed.push(record);
        } else {
            records.push(record);
        }
    }

    rank_records(&mut records);
    let highlight = select_highlight(&records, opts.highlight_size);

    debug!(
        target: "roster",
        records = records.len(),
        seed = seed.len(),
        highlight = highlight.len(),
        dropped,
        "roster merged"
    );

    RosterView {
        records,
        seed,
        highlight,
        dropped,
    }
}

/// `members` are already in encounter order, which is strongest-source first.
fn synthesize(key: IdentityKey, encounter: (u8, usize), members: &[&Candidate]) -> MergedRecord {
    let text = |get: fn(&Candidate) -> Option<&String>| -> Option<String> {
        members
            .iter()
            .filter_map(|c| get(c))
            .map(|s| s.trim())
            .find(|s| !s.is_empty())
            .map(str::to_string)
    };

    let (score, score_source) = resolve_score(members);

    let mut sources: Vec<Provenance> = Vec::new();
    for c in members {
        if !sources.contains(&c.provenance) {
            sources.push(c.provenance);
        }
    }

    let email = match &key {
        IdentityKey::Email(e) => Some(e.clone()),
        IdentityKey::Synthetic(_) => None,
    };

    MergedRecord {
        email,
        display: DisplayFields {
            name: text(|c| c.display.name.as_ref()),
            firm: text(|c| c.display.firm.as_ref()),
            specialty: text(|c| c.display.specialty.as_ref()),
            location: text(|c| c.display.location.as_ref()),
            notes: text(|c| c.display.notes.as_ref()),
        },
        experience_years: members.iter().find_map(|c| c.scores.experience_years),
        email_count: members.iter().find_map(|c| c.scores.email_count),
        score,
        score_source,
        sources,
        encounter,
        key,
    }
}

/// Score precedence for one identity:
///
/// 1. authoritative fact score, when present and > 0
/// 2. inferred match score
/// 3. authoritative score of exactly 0 (a zero fact score is treated as "no fact yet")
/// 4. seed score
///
/// Result clamped to `[0, 100]`; non-finite values count as absent.
pub fn resolve_score(members: &[&Candidate]) -> (f64, ScoreSource) {
    let first = |p: Provenance| {
        members
            .iter()
            .filter(|c| c.provenance == p)
            .find_map(|c| c.scores.score.filter(|s| s.is_finite()))
    };
    let fact = first(Provenance::Authoritative);
    let inferred = first(Provenance::Inferred);
    let seeded = first(Provenance::Seed);

    let (raw, src) = match (fact, inferred, seeded) {
        (Some(f), _, _) if f > 0.0 => (f, ScoreSource::Fact),
        (_, Some(i), _) => (i, ScoreSource::Inferred),
        (Some(f), None, _) => (f, ScoreSource::Fact),
        (None, None, Some(s)) => (s, ScoreSource::Seed),
        (None, None, None) => (0.0, ScoreSource::None),
    };
    (raw.clamp(0.0, MAX_SCORE), src)
}
