// src/conversation.rs
//! Message threads as served by the backend, plus the render-time view.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::reply_cleaner::clean_body;
use crate::roster::normalize_email;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub to: String,
    #[serde(default, rename = "body")]
    pub raw_body: String,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// Append-only: new fetches only ever add messages at the end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thread {
    #[serde(default)]
    pub thread_id: String,
    #[serde(default)]
    pub participants: Vec<String>,
    #[serde(default, alias = "emails")]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl Thread {
    /// Exact (normalized) match on participants or any message's from/to.
    pub fn involves(&self, email: &str) -> bool {
        let Some(want) = normalize_email(email) else {
            return false;
        };
        let hit = |s: &str| normalize_email(s).as_deref() == Some(want.as_str());
        self.participants.iter().any(|p| hit(p.as_str()))
            || self
                .messages
                .iter()
                .any(|m| hit(m.from.as_str()) || hit(m.to.as_str()))
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at.as_deref().and_then(parse_timestamp)
    }
}

/// Display form of one message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedMessage {
    pub from: String,
    pub to: String,
    pub timestamp: Option<String>,
    pub body: String,
}

/// Backend timestamps are RFC 3339 or naive ISO (`2025-11-22T20:41:51.237844`, read as UTC).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|n| n.and_utc())
}

/// Decode `{"threads": [...]}`, `{"conversations": {id: {...}}}` or a bare array.
pub fn decode_threads(payload: &serde_json::Value) -> Result<Vec<Thread>> {
    if let Some(arr) = payload.as_array() {
        return serde_json::from_value(serde_json::Value::Array(arr.clone()))
            .context("decode thread array");
    }
    if let Some(arr) = payload.get("threads") {
        return serde_json::from_value(arr.clone()).context("decode threads");
    }
    if let Some(map) = payload.get("conversations") {
        let by_id: BTreeMap<String, Thread> =
            serde_json::from_value(map.clone()).context("decode conversations map")?;
        return Ok(by_id
            .into_iter()
            .map(|(id, mut t)| {
                if t.thread_id.is_empty() {
                    t.thread_id = id;
                }
                t
            })
            .collect());
    }
    anyhow::bail!("thread payload has no threads/conversations")
}

pub fn threads_for_party<'a>(threads: &'a [Thread], email: &str) -> Vec<&'a Thread> {
    threads.iter().filter(|t| t.involves(email)).collect()
}

/// Threads updated strictly after `since`. Threads without a readable timestamp are left out.
pub fn updated_since(threads: &[Thread], since: DateTime<Utc>) -> Vec<&Thread> {
    threads
        .iter()
        .filter(|t| t.updated_at().is_some_and(|u| u > since))
        .collect()
}

/// Messages in `new` that were not in `old`. If `old` is not a prefix of `new` the
/// history was rewritten upstream and the whole of `new` counts as new.
pub fn appended_messages<'a>(old: &Thread, new: &'a Thread) -> &'a [Message] {
    let n = old.messages.len();
    if new.messages.len() >= n && new.messages[..n] == old.messages[..] {
        &new.messages[n..]
    } else {
        &new.messages[..]
    }
}

/// Render-time cleaning of every message body.
pub fn render_thread(thread: &Thread) -> Vec<RenderedMessage> {
    thread
        .messages
        .iter()
        .map(|m| RenderedMessage {
            from: m.from.clone(),
            to: m.to.clone(),
            timestamp: m.timestamp.clone(),
            body: clean_body(&m.raw_body),
        })
        .collect()
}
