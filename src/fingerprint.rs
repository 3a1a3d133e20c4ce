//! Device fingerprint model and trust scoring.
//!
//! DESIGN
//! ======
//! A fingerprint is four free-text request attributes captured at login
//! and snapshotted onto the refresh token. On refresh the snapshot is
//! compared field-by-field against the presented fingerprint: a match
//! adds 25, a mismatch subtracts a field-specific penalty, and the score
//! is clamped to [0, 100]. A refresh is accepted only at or above the
//! trust threshold. Absent fields normalize to empty strings and compare
//! like any other value, so a device that never sends a field still
//! matches itself on it.

use serde::{Deserialize, Serialize};

/// Minimum clamped score for a refresh attempt to be accepted.
pub const TRUST_THRESHOLD: u8 = 80;

const FIELD_MATCH: i32 = 25;
const IP_MISMATCH: i32 = -10;
const LANGUAGE_MISMATCH: i32 = -5;
const PLATFORM_MISMATCH: i32 = -10;
const USER_AGENT_MISMATCH: i32 = -15;

/// Coarse device descriptor captured from request metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceFingerprint {
    pub ip_address: String,
    pub user_agent: String,
    pub platform: String,
    pub language: String,
}

impl DeviceFingerprint {
    /// Build a fingerprint from optional request attributes; absent values
    /// become empty strings.
    #[must_use]
    pub fn from_parts(
        ip_address: Option<String>,
        user_agent: Option<String>,
        platform: Option<String>,
        language: Option<String>,
    ) -> Self {
        Self {
            ip_address: ip_address.unwrap_or_default(),
            user_agent: user_agent.unwrap_or_default(),
            platform: platform.unwrap_or_default(),
            language: language.unwrap_or_default(),
        }
    }
}

/// Weighted-match trust score between a stored snapshot and a presented
/// fingerprint, clamped to [0, 100].
#[must_use]
pub fn trust_score(stored: &DeviceFingerprint, presented: &DeviceFingerprint) -> u8 {
    let mut score = 0i32;
    score += score_field(&stored.ip_address, &presented.ip_address, IP_MISMATCH);
    score += score_field(&stored.user_agent, &presented.user_agent, USER_AGENT_MISMATCH);
    score += score_field(&stored.platform, &presented.platform, PLATFORM_MISMATCH);
    score += score_field(&stored.language, &presented.language, LANGUAGE_MISMATCH);
    u8::try_from(score.clamp(0, 100)).unwrap_or(0)
}

/// Whether a presented fingerprint clears the trust threshold against the
/// stored snapshot.
#[must_use]
pub fn is_trusted(stored: &DeviceFingerprint, presented: &DeviceFingerprint) -> bool {
    trust_score(stored, presented) >= TRUST_THRESHOLD
}

fn score_field(stored: &str, presented: &str, penalty: i32) -> i32 {
    if stored == presented { FIELD_MATCH } else { penalty }
}

#[cfg(test)]
#[path = "fingerprint_test.rs"]
mod tests;
