//! Durable session state: snapshot, restore and expiry semantics.
//!
//! A [`SessionState`] is an opaque blob for the caller: it persists it on
//! login success and hands it back on the next process start. Everything in
//! it is defaulted so a malformed or truncated blob is never fatal; the worst
//! outcome of bad data is a failed logged-in probe and a fall-through to full
//! login.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::cookies::Cookie;
use crate::factors::FactorKind;

/// Immutable per-flow persistence policy, fixed at engine construction.
#[derive(Debug, Clone)]
pub struct StatePolicy {
    /// How long a dumped state stays reusable, refreshed at every dump.
    pub state_duration: Duration,
    /// How long a completed second factor keeps the login exempt from a new
    /// challenge, counted from the completion timestamp. `None` when the
    /// site re-challenges every time.
    pub twofa_duration: Option<Duration>,
    /// Cookie names removed from the jar before every dump. Single-use
    /// cookies tied to a completed challenge must never be replayed.
    pub cookies_to_clear: Vec<String>,
    /// Factor keys whose presence skips the logged-in probe on state reload,
    /// so a side-effecting navigation (an OTP-sending URL, typically) is not
    /// repeated.
    pub skip_locate_on: Vec<FactorKind>,
}

impl Default for StatePolicy {
    fn default() -> Self {
        Self {
            state_duration: Duration::from_secs(10 * 60),
            twofa_duration: None,
            cookies_to_clear: Vec::new(),
            skip_locate_on: Vec::new(),
        }
    }
}

impl StatePolicy {
    /// Compute the expiry stamped into a dump taken at `now`:
    /// `max(now + state_duration, twofa_logged_date + twofa_duration)`,
    /// truncated to whole seconds. Monotonic for a fixed completion date:
    /// consecutive dumps never move the expiry backwards.
    pub fn expire_at(
        &self,
        now: DateTime<Utc>,
        twofa_logged_date: Option<DateTime<Utc>>,
    ) -> DateTime<Utc> {
        let mut expire = now + self.state_duration;
        if let (Some(logged), Some(twofa_duration)) = (twofa_logged_date, self.twofa_duration) {
            expire = expire.max(logged + twofa_duration);
        }
        truncate_subsec(expire)
    }
}

/// Serialized snapshot of everything a login needs to be resumed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionState {
    /// Last visited URL, target of the logged-in probe on reload.
    #[serde(default)]
    pub url: Option<String>,
    /// Cookie jar contents at dump time, minus the do-not-persist names.
    #[serde(default)]
    pub cookies: Vec<Cookie>,
    /// Custom fields declared by the flow, round-tripped verbatim.
    #[serde(default)]
    pub fields: BTreeMap<String, serde_json::Value>,
    /// When the last second factor completed. Stored as text so legacy
    /// blobs with naive timestamps still load.
    #[serde(default)]
    pub twofa_logged_date: Option<String>,
    /// Computed expiry; recomputed at every dump, never read back verbatim.
    #[serde(default)]
    pub expire: Option<String>,
}

impl SessionState {
    /// True if the blob's expiry is present and in the past. Callers check
    /// this before handing the blob to the engine; an expired blob is
    /// equivalent to no blob at all.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.expire.as_deref().and_then(parse_state_timestamp) {
            Some(expire) => expire < now,
            None => false,
        }
    }

    /// Parsed second-factor completion timestamp, if any.
    pub fn twofa_logged_date(&self) -> Option<DateTime<Utc>> {
        self.twofa_logged_date
            .as_deref()
            .and_then(parse_state_timestamp)
    }
}

/// Parse a timestamp from a state blob.
///
/// RFC 3339 first; naive timestamps (legacy blobs) are assumed to be in the
/// local system timezone. Unparseable text yields `None`, never an error.
pub fn parse_state_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(date) = DateTime::parse_from_rfc3339(raw) {
        return Some(date.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Local
                .from_local_datetime(&naive)
                .earliest()
                .map(|date| date.with_timezone(&Utc));
        }
    }

    tracing::warn!(raw, "unparseable timestamp in stored state, ignoring it");
    None
}

/// Format a timestamp for a state blob, truncated to whole seconds.
pub fn format_state_timestamp(date: DateTime<Utc>) -> String {
    truncate_subsec(date).to_rfc3339()
}

fn truncate_subsec(date: DateTime<Utc>) -> DateTime<Utc> {
    date - chrono::Duration::nanoseconds(i64::from(date.timestamp_subsec_nanos()))
}
