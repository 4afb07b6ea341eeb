// src/roster/candidate.rs
//! Roster entries as delivered by each source, and identity-key normalization.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Which source produced a candidate. Field precedence: Authoritative > Inferred > Seed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    /// Static list shipped with the client config.
    #[default]
    Seed,
    /// Backend roster (sole writer of the tracked-lawyer table).
    Authoritative,
    /// Best-effort AI-extracted candidates.
    Inferred,
}

impl Provenance {
    /// Lower is stronger. Also the source order used for encounter-order tie-breaks.
    pub fn precedence(self) -> u8 {
        match self {
            Provenance::Authoritative => 0,
            Provenance::Inferred => 1,
            Provenance::Seed => 2,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DisplayFields {
    #[serde(default, alias = "lawyer_name")]
    pub name: Option<String>,
    #[serde(default, alias = "firm_name")]
    pub firm: Option<String>,
    #[serde(default, alias = "case_type")]
    pub specialty: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreFields {
    /// Fact score for authoritative records, match score for inferred ones (0..=100).
    #[serde(default, alias = "match_score", alias = "fact_score")]
    pub score: Option<f64>,
    #[serde(default)]
    pub experience_years: Option<u32>,
    #[serde(default)]
    pub email_count: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    #[serde(default, alias = "lawyer_email")]
    pub email: Option<String>,
    #[serde(flatten)]
    pub display: DisplayFields,
    #[serde(flatten)]
    pub scores: ScoreFields,
    #[serde(default)]
    pub provenance: Provenance,
}

impl Candidate {
    pub fn new(provenance: Provenance) -> Self {
        Self {
            provenance,
            ..Self::default()
        }
    }

    pub fn email(mut self, email: &str) -> Self {
        self.email = Some(email.to_string());
        self
    }

    pub fn name(mut self, name: &str) -> Self {
        self.display.name = Some(name.to_string());
        self
    }

    pub fn firm(mut self, firm: &str) -> Self {
        self.display.firm = Some(firm.to_string());
        self
    }

    pub fn specialty(mut self, specialty: &str) -> Self {
        self.display.specialty = Some(specialty.to_string());
        self
    }

    pub fn location(mut self, location: &str) -> Self {
        self.display.location = Some(location.to_string());
        self
    }

    pub fn notes(mut self, notes: &str) -> Self {
        self.display.notes = Some(notes.to_string());
        self
    }

    pub fn score(mut self, score: f64) -> Self {
        self.scores.score = Some(score);
        self
    }

    pub fn experience_years(mut self, years: u32) -> Self {
        self.scores.experience_years = Some(years);
        self
    }
}

/// Key deciding that two candidates are the same real-world party.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum IdentityKey {
    /// Normalized email: trimmed, lowercase.
    Email(String),
    /// `name|firm` for candidates without an email. Never equal to an email key.
    Synthetic(String),
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentityKey::Email(e) => f.write_str(e),
            IdentityKey::Synthetic(s) => write!(f, "~{s}"),
        }
    }
}

/// Trim + lowercase; blank input has no key.
pub fn normalize_email(raw: &str) -> Option<String> {
    let t = raw.trim();
    if t.is_empty() {
        None
    } else {
        Some(t.to_lowercase())
    }
}

fn normalize_label(raw: Option<&str>) -> String {
    raw.unwrap_or_default()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// `None` means the candidate is malformed and must be dropped.
pub fn identity_key(c: &Candidate) -> Option<IdentityKey> {
    if let Some(email) = c.email.as_deref().and_then(normalize_email) {
        return Some(IdentityKey::Email(email));
    }
    let name = normalize_label(c.display.name.as_deref());
    let firm = normalize_label(c.display.firm.as_deref());
    if name.is_empty() && firm.is_empty() {
        return None;
    }
    Some(IdentityKey::Synthetic(format!("{name}|{firm}")))
}

/// Decode a backend list payload into candidates of the given provenance.
///
/// Accepts a bare array or an object wrapping it under `lawyers`, `candidates` or
/// `matches`. Items that don't decode are skipped (logged at debug).
pub fn decode_candidates(payload: &serde_json::Value, provenance: Provenance) -> Result<Vec<Candidate>> {
    let items = match payload {
        serde_json::Value::Array(items) => items,
        serde_json::Value::Object(map) => ["lawyers", "candidates", "matches"]
            .iter()
            .find_map(|k| map.get(*k).and_then(|v| v.as_array()))
            .context("roster payload has no lawyers/candidates/matches array")?,
        other => anyhow::bail!("unexpected roster payload type: {}", json_type(other)),
    };

    let mut out = Vec::with_capacity(items.len());
    for (idx, item) in items.iter().enumerate() {
        match serde_json::from_value::<Candidate>(item.clone()) {
            Ok(mut c) => {
                c.provenance = provenance;
                out.push(c);
            }
            Err(e) => debug!(target: "roster", idx, error = %e, "skipping undecodable candidate"),
        }
    }
    Ok(out)
}

fn json_type(v: &serde_json::Value) -> &'static str {
    match v {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
