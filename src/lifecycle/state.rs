//! Per-user index state and its transitions.

use chrono::{DateTime, Utc};

use crate::models::IndexStatus;

/// Mutable state tracked per user. Mutated only by the lifecycle manager,
/// always under its map lock, never across an I/O await point.
#[derive(Debug, Clone)]
pub struct IndexState {
    pub status: IndexStatus,
    pub attempt: u32,
    pub last_indexed_at: Option<DateTime<Utc>>,
    pub emails_indexed: u64,
    pub new_emails: u64,
    pub last_error: Option<String>,
    pub rate_limited_until: Option<DateTime<Utc>>,
}

impl Default for IndexState {
    fn default() -> Self {
        Self {
            status: IndexStatus::Idle,
            attempt: 0,
            last_indexed_at: None,
            emails_indexed: 0,
            new_emails: 0,
            last_error: None,
            rate_limited_until: None,
        }
    }
}

impl IndexState {
    /// Resolve the status a caller should observe right now: a
    /// `rate_limited` state whose cooldown has elapsed reads back as
    /// whatever it was before (ready, since only a ready index degrades
    /// to a rate-limited query path).
    pub fn effective_status(&self, now: DateTime<Utc>) -> IndexStatus {
        if self.status == IndexStatus::RateLimited {
            if let Some(until) = self.rate_limited_until {
                if now >= until {
                    return IndexStatus::Ready;
                }
            }
        }
        self.status
    }
}
