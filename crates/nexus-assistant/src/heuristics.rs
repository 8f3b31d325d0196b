// SPDX-FileCopyrightText: 2026 Nexus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Zero-cost text heuristics used around the scorer.
//!
//! No network, no model call. These only run on strings already in hand.

/// Phrases that read like a deflection rather than an answer.
const HEDGING_PHRASES: &[&str] = &["i can help", "let me assist", "please contact"];

/// Confidence for a reply whose scorer reported none.
///
/// Very short replies are rarely useful on their own, deflections are
/// middling, and long replies are usually substantive.
pub fn fallback_confidence(reply: &str) -> f64 {
    let words = reply.split_whitespace().count();
    let lowered = reply.to_lowercase();
    if words < 3 {
        0.3
    } else if HEDGING_PHRASES.iter().any(|p| lowered.contains(p)) {
        0.6
    } else if words > 10 {
        0.9
    } else {
        0.7
    }
}

/// First keyword found in `text`, compared case-insensitively.
///
/// Blank keywords are ignored so a stray `""` in tenant settings cannot
/// escalate every message.
pub fn find_escalation_keyword<'a>(text: &str, keywords: &'a [String]) -> Option<&'a str> {
    let lowered = text.to_lowercase();
    keywords
        .iter()
        .map(|k| k.trim())
        .filter(|k| !k.is_empty())
        .find(|k| lowered.contains(&k.to_lowercase()))
}
