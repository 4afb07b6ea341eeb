// src/reply_cleaner.rs
//! Strip quoted reply history from message bodies before display.
//!
//! Pass 1 truncates at the first reply preamble (rules in [`QUOTE_RULES`], tried in order).
//! A rule only counts when there is authored text above its match.
//! Pass 2 drops runs of two or more `>`-quoted lines; a lone quoted line stays, it is
//! usually a deliberate citation.
//! If what's left is under [`MIN_CLEAN_CHARS`], fall back to pass 1 alone on the original
//! body, then to the trimmed original. The cleaner only ever removes text.

use once_cell::sync::Lazy;
use regex::Regex;

/// Results shorter than this (in chars, after trimming) trigger the fallback chain.
pub const MIN_CLEAN_CHARS: usize = 5;

/// One reply-preamble convention.
pub struct QuoteRule {
    pub name: &'static str,
    pub pattern: Regex,
}

impl QuoteRule {
    fn new(name: &'static str, pattern: &str) -> Self {
        Self {
            name,
            pattern: Regex::new(pattern).expect("quote rule regex"),
        }
    }

    /// Byte offset of the first match, if any.
    pub fn find(&self, body: &str) -> Option<usize> {
        self.pattern.find(body).map(|m| m.start())
    }
}

/// Preamble rules in priority order.
pub static QUOTE_RULES: Lazy<Vec<QuoteRule>> = Lazy::new(|| {
    vec![
        // "On Mon, Jan 1, 2025 at 9:00 AM Jane <j@x.com> wrote:" (clients wrap it onto two lines)
        QuoteRule::new("on_wrote", r"(?m)^[ \t]*On\b[^\n]*(?:\n[^\n]*)?\bwrote:[ \t]*\r?$"),
        QuoteRule::new(
            "original_message",
            r"(?im)^[ \t]*-{2,}[ \t]*Original Message[ \t]*-{2,}",
        ),
        QuoteRule::new(
            "forwarded",
            r"(?im)^[ \t]*-{2,}[ \t]*Forwarded message[ \t]*-{2,}",
        ),
        // Outlook's horizontal rule above the quoted header block; tried before the bare
        // "From:" so the rule line itself is cut too.
        QuoteRule::new("outlook_rule", r"(?m)^[ \t]*_{10,}[ \t]*\r?$"),
        QuoteRule::new("from_header", r"(?m)^[ \t]*From:[ \t]"),
    ]
});

/// Pass 1: the first rule that matches with non-blank text before the match.
/// Returns `(rule name, byte offset)`.
pub fn first_split(body: &str) -> Option<(&'static str, usize)> {
    QUOTE_RULES.iter().find_map(|rule| {
        let at = rule.find(body)?;
        if body[..at].trim().is_empty() {
            None
        } else {
            Some((rule.name, at))
        }
    })
}

fn truncate_at_preamble(body: &str) -> Option<&str> {
    first_split(body).map(|(_, at)| &body[..at])
}

fn is_quoted(line: &str) -> bool {
    line.trim_start().starts_with('>')
}

/// Pass 2: drop runs of >= 2 consecutive quoted lines, keep isolated ones.
pub fn drop_quoted_runs(text: &str) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let mut kept: Vec<&str> = Vec::with_capacity(lines.len());
    let mut i = 0;
    while i < lines.len() {
        if is_quoted(lines[i]) {
            let start = i;
            while i < lines.len() && is_quoted(lines[i]) {
                i += 1;
            }
            if i - start == 1 {
                kept.push(lines[start]);
            }
        } else {
            kept.push(lines[i]);
            i += 1;
        }
    }
    kept.join("\n")
}

/// Display-ready body: new text only, quoted history removed.
pub fn clean_body(raw: &str) -> String {
    let truncated = truncate_at_preamble(raw).unwrap_or(raw);
    let cleaned = drop_quoted_runs(truncated);
    let cleaned = cleaned.trim();
    if cleaned.chars().count() >= MIN_CLEAN_CHARS {
        return cleaned.to_string();
    }

    match truncate_at_preamble(raw) {
        Some(head) => head.trim().to_string(),
        None => raw.trim().to_string(),
    }
}
