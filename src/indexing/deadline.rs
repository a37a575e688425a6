//! Deadline and urgency derivation from message text.
//!
//! Pattern table and substring checks mirror the heuristics used during
//! indexing in the system this was distilled from: a handful of ordered
//! regexes looking for an explicit date near "deadline"/"due"/"by", with
//! a bare urgency-word fallback that synthesizes a same-day deadline.

use chrono::{DateTime, NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

static PATTERN_DEADLINE_SLASH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"deadline[:\s]+(\d{1,2}/\d{1,2}/\d{4})").unwrap());
static PATTERN_DUE_SLASH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"due[:\s]+(\d{1,2}/\d{1,2}/\d{4})").unwrap());
static PATTERN_DEADLINE_ISO: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"deadline[:\s]+(\d{4}-\d{2}-\d{2})").unwrap());
static PATTERN_DUE_ISO: Lazy<Regex> = Lazy::new(|| Regex::new(r"due[:\s]+(\d{4}-\d{2}-\d{2})").unwrap());
static PATTERN_BY_SLASH: Lazy<Regex> = Lazy::new(|| Regex::new(r"by[:\s]+(\d{1,2}/\d{1,2}/\d{4})").unwrap());

const URGENT_WORDS: &[&str] = &["urgent", "asap", "immediately"];

/// Extract a deadline date, trying each pattern in order, then falling
/// back to "now" when the text reads as urgent but names no date.
pub fn extract_deadline(text: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let text_lower = text.to_lowercase();

    let candidates: [(&Regex, &str); 5] = [
        (&PATTERN_DEADLINE_SLASH, "%m/%d/%Y"),
        (&PATTERN_DUE_SLASH, "%m/%d/%Y"),
        (&PATTERN_DEADLINE_ISO, "%Y-%m-%d"),
        (&PATTERN_DUE_ISO, "%Y-%m-%d"),
        (&PATTERN_BY_SLASH, "%m/%d/%Y"),
    ];

    for (pattern, format) in candidates {
        if let Some(captures) = pattern.captures(&text_lower) {
            if let Ok(date) = NaiveDate::parse_from_str(&captures[1], format) {
                return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
            }
        }
    }

    if URGENT_WORDS.iter().any(|w| text_lower.contains(w)) {
        return Some(now);
    }

    None
}

pub fn is_urgent(text_lower: &str) -> bool {
    ["urgent", "asap", "immediately", "critical"]
        .iter()
        .any(|w| text_lower.contains(w))
}

pub fn has_deadline(text_lower: &str) -> bool {
    text_lower.contains("deadline") || text_lower.contains("due")
}

/// Render a deadline the way a human reads it relative to now: overdue,
/// due today, due within a few days, or a plain date further out.
pub fn format_deadline(deadline: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    let Some(deadline) = deadline else {
        return "No deadline".to_string();
    };

    let days_until = (deadline.date_naive() - now.date_naive()).num_days();
    if days_until < 0 {
        "OVERDUE".to_string()
    } else if days_until == 0 {
        "DUE TODAY".to_string()
    } else if days_until <= 3 {
        format!("DUE IN {days_until} DAYS")
    } else {
        deadline.format("%Y-%m-%d").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 7, 27, 12, 0, 0).unwrap()
    }

    #[test]
    fn extracts_slash_deadline() {
        let d = extract_deadline("Deadline: 08/15/2026 for the report", now());
        assert_eq!(d.unwrap().format("%Y-%m-%d").to_string(), "2026-08-15");
    }

    #[test]
    fn extracts_iso_due_date() {
        let d = extract_deadline("due: 2026-09-01 please respond", now());
        assert_eq!(d.unwrap().format("%Y-%m-%d").to_string(), "2026-09-01");
    }

    #[test]
    fn falls_back_to_now_for_urgent_text_without_date() {
        let d = extract_deadline("this is urgent, please reply asap", now());
        assert_eq!(d, Some(now()));
    }

    #[test]
    fn returns_none_without_date_or_urgency() {
        assert_eq!(extract_deadline("just checking in", now()), None);
    }

    #[test]
    fn formats_overdue_and_today_and_soon_and_far() {
        assert_eq!(
            format_deadline(Some(now() - chrono::Duration::days(2)), now()),
            "OVERDUE"
        );
        assert_eq!(format_deadline(Some(now()), now()), "DUE TODAY");
        assert_eq!(
            format_deadline(Some(now() + chrono::Duration::days(2)), now()),
            "DUE IN 2 DAYS"
        );
        assert_eq!(
            format_deadline(Some(now() + chrono::Duration::days(30)), now()).len(),
            10
        );
        assert_eq!(format_deadline(None, now()), "No deadline");
    }

    #[test]
    fn urgency_and_deadline_flags_are_substring_checks() {
        assert!(is_urgent("this is CRITICAL"));
        assert!(!is_urgent("just a normal update"));
        assert!(has_deadline("the due date is tomorrow"));
        assert!(!has_deadline("no dates mentioned"));
    }
}
