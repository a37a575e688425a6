//! Explicit-sender phrase detection and fuzzy matching against a
//! message's `From` header.
//!
//! Two independent jobs live here: pulling a candidate name out of a
//! free-text question ("emails from Alice about the budget" → "alice"),
//! and deciding whether a given sender string plausibly refers to that
//! candidate. Both are regex/substring heuristics, not NLP — matching the
//! shape of the system this was distilled from, which favors precision
//! (no false-positive sender lock-on) over recall.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

const SOUTH_ASIAN_PREFIXES: &[&str] = &[
    "syed", "syeda", "muhammad", "mohd", "md", "hafiz", "sheikh", "malik", "rana", "raja", "ch",
    "chaudhry", "mirza", "khawaja", "miss", "mrs", "mr", "dr",
];

static FALSE_POSITIVE_TERMS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "me", "you", "us", "them", "him", "her", "it", "the", "a", "an", "last", "week", "month",
        "year", "today", "yesterday", "this", "that", "my", "our", "their", "any", "all", "some",
        "most", "recent", "latest", "newest", "oldest", "inbox", "email", "emails", "mail",
        "message", "messages", "urgent", "important", "unread", "read", "starred", "flagged",
    ]
    .into_iter()
    .collect()
});

const NAME_TAIL: &str = r"(?:\s+about|\s+regarding|\s+on|\s+with|\s*$)";

static SENDER_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(&format!(
            r"emails?\s+from\s+([a-z0-9][a-z0-9._\s-]{{1,40}}?){NAME_TAIL}"
        ))
        .unwrap(),
        Regex::new(&format!(r"sent\s+by\s+([a-z0-9][a-z0-9._\s-]{{1,40}}?){NAME_TAIL}")).unwrap(),
        Regex::new(&format!(
            r"(?:show|get|find|list|give\s+me|what).*?\bfrom\s+([a-z0-9][a-z0-9._\s-]{{1,40}}?){NAME_TAIL}"
        ))
        .unwrap(),
        Regex::new(&format!(r"^from\s+([a-z0-9][a-z0-9._\s-]{{1,40}}?){NAME_TAIL}")).unwrap(),
    ]
});

/// Detect an explicit sender reference in a question, e.g. "emails from
/// John about the budget" -> `Some("john")`. Returns `None` unless the
/// phrasing is unambiguous; never guesses from a bare name alone.
pub fn detect_sender_from_query(query: &str) -> Option<String> {
    let query_lower = query.to_lowercase();
    let query_lower = query_lower.trim();

    for pattern in SENDER_PATTERNS.iter() {
        let Some(captures) = pattern.captures(query_lower) else {
            continue;
        };
        let raw = captures.get(1)?.as_str().trim();
        let candidate = raw.split_whitespace().collect::<Vec<_>>().join(" ");

        if candidate.is_empty() || FALSE_POSITIVE_TERMS.contains(candidate.as_str()) {
            continue;
        }
        if candidate.chars().count() < 2 {
            continue;
        }
        if candidate.chars().all(|c| c.is_ascii_digit()) {
            continue;
        }

        log::debug!("detected sender candidate: '{candidate}'");
        return Some(candidate);
    }

    None
}

fn strip_non_alnum(s: &str) -> String {
    s.chars().filter(|c| c.is_ascii_alphanumeric()).collect()
}

fn strip_non_alnum_space(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == ' ')
        .collect()
}

fn normalize_name(name: &str) -> String {
    strip_non_alnum_space(&name.to_lowercase())
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// (display name, email address, email username) extracted from a raw
/// `From:` header value such as `"Alice Wong <alice.wong@example.com>"`.
fn extract_name_parts(sender: &str) -> (String, String, String) {
    let sender_lower = sender.to_lowercase();

    static EMAIL_RE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"([a-z0-9._+-]+@[a-z0-9.-]+)").unwrap());
    static USERNAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([^@]+)@").unwrap());
    static NAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([^<]+)\s*<").unwrap());
    static SEP_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[._-]").unwrap());

    let email_address = EMAIL_RE
        .find(&sender_lower)
        .map(|m| m.as_str().to_string())
        .unwrap_or_default();

    let email_username = if email_address.is_empty() {
        String::new()
    } else {
        USERNAME_RE
            .captures(&email_address)
            .map(|c| SEP_RE.replace_all(&c[1], " ").to_string())
            .unwrap_or_default()
    };

    let full_name = if let Some(c) = NAME_RE.captures(&sender_lower) {
        c[1].trim().to_string()
    } else if email_address.is_empty() {
        sender_lower.trim().to_string()
    } else {
        String::new()
    };

    (
        if full_name.is_empty() {
            String::new()
        } else {
            normalize_name(&full_name)
        },
        email_address,
        if email_username.is_empty() {
            String::new()
        } else {
            normalize_name(&email_username)
        },
    )
}

/// Expand a search term into the variants it could plausibly appear as
/// in a sender string, including splitting compound South-Asian names at
/// common honorific prefixes (`"syedahajra"` -> `"syed ahajra"`, `"hajra"`, `"syed"`).
fn generate_search_variants(search_term: &str) -> Vec<String> {
    let term = search_term.to_lowercase().trim().to_string();
    let term_clean = strip_non_alnum(&term);

    let mut variants: HashSet<String> = HashSet::new();
    variants.insert(term.clone());
    variants.insert(term_clean.clone());

    if !term.contains(' ') {
        for prefix in SOUTH_ASIAN_PREFIXES {
            if term_clean.starts_with(prefix) && term_clean.len() > prefix.len() + 1 {
                let remainder = &term_clean[prefix.len()..];
                variants.insert(format!("{prefix} {remainder}"));
                variants.insert(remainder.to_string());
                variants.insert(prefix.to_string());
            }
        }
    } else {
        let parts: Vec<&str> = term.split_whitespace().collect();
        for part in &parts {
            if part.chars().count() >= 3 {
                variants.insert(part.to_string());
            }
        }
        variants.insert(parts.concat());
    }

    variants.into_iter().collect()
}

/// Decide whether `sender` plausibly refers to `search_term`, trying the
/// search term (and its generated variants) against the sender's email
/// address, display name, and email username, then falling back to a
/// strict all-tokens-match check for multi-word queries.
pub fn sender_matches(sender: &str, search_term: &str) -> bool {
    if search_term.trim().is_empty() || sender.trim().is_empty() {
        return false;
    }

    let search_term = search_term.to_lowercase();
    let search_term = search_term.trim();
    let (full_name, email_address, email_username) = extract_name_parts(sender);

    let email_address_clean = strip_non_alnum(&email_address);
    let full_name_clean = strip_non_alnum_space(&full_name);
    let email_username_clean = strip_non_alnum(&email_username);
    let sender_blob = format!("{full_name_clean} {email_address_clean} {email_username_clean}");
    let sender_blob_no_space = sender_blob.replace(' ', "");

    for variant in generate_search_variants(search_term) {
        let v_clean = strip_non_alnum(&variant);
        if v_clean.is_empty() {
            continue;
        }

        if email_address_clean.contains(&v_clean) {
            return true;
        }
        if full_name_clean.replace(' ', "").contains(&v_clean) {
            return true;
        }
        if full_name_clean.contains(&variant) {
            return true;
        }
        if email_username_clean.contains(&v_clean) {
            return true;
        }
    }

    let search_words: Vec<&str> = search_term
        .split_whitespace()
        .filter(|w| w.chars().count() >= 3)
        .collect();
    if search_words.len() >= 2 {
        let matched = search_words
            .iter()
            .filter(|w| sender_blob_no_space.contains(&strip_non_alnum(w)))
            .count();
        if matched >= search_words.len() {
            return true;
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_explicit_from_phrasing() {
        assert_eq!(
            detect_sender_from_query("show me emails from alice about the budget"),
            Some("alice".to_string())
        );
        assert_eq!(
            detect_sender_from_query("what's in my inbox"),
            None
        );
    }

    #[test]
    fn rejects_false_positive_terms() {
        assert_eq!(detect_sender_from_query("emails from me"), None);
        assert_eq!(detect_sender_from_query("emails from today"), None);
    }

    #[test]
    fn matches_sender_by_display_name() {
        assert!(sender_matches("Alice Wong <alice.wong@example.com>", "alice"));
        assert!(sender_matches("Alice Wong <alice.wong@example.com>", "wong"));
        assert!(!sender_matches("Bob Lee <bob.lee@example.com>", "alice"));
    }

    #[test]
    fn splits_compound_south_asian_names() {
        assert!(sender_matches(
            "Syeda Hajra <syedahajra@example.com>",
            "syedahajra"
        ));
        assert!(sender_matches(
            "Syeda Hajra <syedahajra@example.com>",
            "hajra"
        ));
    }

    #[test]
    fn requires_all_tokens_for_multiword_query() {
        assert!(sender_matches(
            "Syed Hajra Ahmed <shajra@example.com>",
            "syed hajra"
        ));
        assert!(!sender_matches(
            "Syed Hajra Ahmed <shajra@example.com>",
            "syed zeeshan"
        ));
    }
}
