// src/stats.rs
//! Outreach statistics: the `/api/stats` payload polled by the dashboard, and
//! [`derive_stats`], which computes the same numbers from lawyer summaries and threads.

use serde::{Deserialize, Serialize};

use crate::conversation::Thread;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterStats {
    #[serde(default)]
    pub lawyers_contacted: u32,
    #[serde(default)]
    pub lawyers_responded: u32,
    #[serde(default)]
    pub total_conversations: u32,
    #[serde(default)]
    pub active_conversations: u32,
    #[serde(default)]
    pub quotes_received: u32,
    #[serde(default)]
    pub deals_finalized: u32,
}

/// Backend roster entry, reduced to what the statistics need.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct LawyerSummary {
    #[serde(default, alias = "lawyer_email")]
    pub email: String,
    #[serde(default)]
    pub email_count: u32,
    #[serde(default)]
    pub hourly_rate: Option<f64>,
    #[serde(default)]
    pub flat_fee: Option<f64>,
    #[serde(default)]
    pub contingency_rate: Option<f64>,
    #[serde(default)]
    pub retainer_amount: Option<f64>,
    #[serde(default)]
    pub estimated_total: Option<f64>,
}

impl LawyerSummary {
    pub fn has_pricing(&self) -> bool {
        self.hourly_rate.is_some()
            || self.flat_fee.is_some()
            || self.contingency_rate.is_some()
            || self.retainer_amount.is_some()
            || self.estimated_total.is_some()
    }
}

/// Words that suggest a deal; only counted together with a strong indicator.
const FINALIZATION_KEYWORDS: &[&str] = &[
    "agreed",
    "accept",
    "accepted",
    "signed",
    "contract",
    "retainer paid",
    "retainer sent",
    "moving forward",
    "proceed",
    "hired",
    "retained",
    "deal",
    "finalized",
    "confirmed",
    "agreement",
    "terms agreed",
    "ready to start",
    "begin work",
    "engagement letter",
];

const STRONG_INDICATORS: &[&str] = &[
    "we agree",
    "i accept",
    "i'll proceed",
    "let's move forward",
    "retainer sent",
    "payment sent",
    "signed the",
    "contract signed",
];

/// A thread counts as a finalized deal when it has a reply (>= 2 messages) and its text
/// carries both a finalization keyword and a strong indicator.
pub fn is_deal_finalized(thread: &Thread) -> bool {
    if thread.messages.len() < 2 {
        return false;
    }
    let text = thread
        .messages
        .iter()
        .map(|m| m.raw_body.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ");
    FINALIZATION_KEYWORDS.iter().any(|k| text.contains(k))
        && STRONG_INDICATORS.iter().any(|k| text.contains(k))
}

pub fn derive_stats(lawyers: &[LawyerSummary], threads: &[Thread]) -> RosterStats {
    let count = |n: usize| u32::try_from(n).unwrap_or(u32::MAX);
    RosterStats {
        lawyers_contacted: count(lawyers.len()),
        lawyers_responded: count(lawyers.iter().filter(|l| l.email_count > 1).count()),
        total_conversations: count(threads.len()),
        active_conversations: count(threads.iter().filter(|t| t.messages.len() > 1).count()),
        quotes_received: count(lawyers.iter().filter(|l| l.has_pricing()).count()),
        deals_finalized: count(threads.iter().filter(|t| is_deal_finalized(t)).count()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::Message;

    fn thread(bodies: &[&str]) -> Thread {
        Thread {
            thread_id: "t".into(),
            participants: vec![],
            messages: bodies
                .iter()
                .map(|b| Message {
                    from: "a@x".into(),
                    to: "me@x".into(),
                    raw_body: b.to_string(),
                    timestamp: None,
                })
                .collect(),
            updated_at: None,
        }
    }

    #[test]
    fn keyword_alone_is_not_a_deal() {
        let t = thread(&["Can you send the contract?", "Sure, the contract is attached."]);
        assert!(!is_deal_finalized(&t));
    }

    #[test]
    fn keyword_plus_strong_indicator_is_a_deal() {
        let t = thread(&["Here are the terms.", "I accept. Retainer sent today."]);
        assert!(is_deal_finalized(&t));
    }

    #[test]
    fn single_message_thread_never_counts() {
        let t = thread(&["We agree, contract signed."]);
        assert!(!is_deal_finalized(&t));
    }

    #[test]
    fn derive_counts() {
        let lawyers = vec![
            LawyerSummary {
                email: "a@x".into(),
                email_count: 3,
                flat_fee: Some(2_500.0),
                ..Default::default()
            },
            LawyerSummary {
                email: "b@x".into(),
                email_count: 1,
                ..Default::default()
            },
        ];
        let threads = vec![thread(&["hi"]), thread(&["hi", "we agree, contract signed"])];
        let s = derive_stats(&lawyers, &threads);
        assert_eq!(
            s,
            RosterStats {
                lawyers_contacted: 2,
                lawyers_responded: 1,
                total_conversations: 2,
                active_conversations: 1,
                quotes_received: 1,
                deals_finalized: 1,
            }
        );
    }

    #[test]
    fn stats_payload_tolerates_missing_fields() {
        let s: RosterStats = serde_json::from_str(r#"{"lawyers_contacted": 4}"#).unwrap();
        assert_eq!(s.lawyers_contacted, 4);
        assert_eq!(s.deals_finalized, 0);
    }
}
