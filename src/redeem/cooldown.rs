//! Per-item reuse suppression.
//!
//! No background sweep: entries are overwritten on redemption and compared
//! against the wall clock wherever a surface needs to know. An entry whose
//! expiry has passed is simply stale data.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

#[derive(Debug, Clone, Default)]
pub struct CooldownMap {
    expiries: HashMap<String, DateTime<Utc>>,
}

impl CooldownMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts (or restarts) an item's cooldown window. A later redemption
    /// overwrites an earlier window with its own timestamp + duration.
    pub fn apply(&mut self, id: &str, now: DateTime<Utc>, cooldown_ms: u64) {
        let expiry = now + Duration::milliseconds(cooldown_ms as i64);
        self.expiries.insert(id.to_string(), expiry);
    }

    pub fn is_active(&self, now: DateTime<Utc>, id: &str) -> bool {
        match self.expiries.get(id) {
            Some(expiry) => now < *expiry,
            None => false,
        }
    }

    pub fn expiry(&self, id: &str) -> Option<DateTime<Utc>> {
        self.expiries.get(id).copied()
    }
}
