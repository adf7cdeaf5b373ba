//! Attention state machine
//!
//! Turns a stream of per-frame presence samples into a debounced status.
//! Presence restores `Focused` immediately; absence only flips to
//! `Distracted` once it has lasted strictly longer than the threshold.

use std::fmt;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Published attention status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttentionStatus {
    #[default]
    Focused,
    Distracted,
}

impl AttentionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttentionStatus::Focused => "focused",
            AttentionStatus::Distracted => "distracted",
        }
    }

    pub fn is_distracted(&self) -> bool {
        matches!(self, AttentionStatus::Distracted)
    }
}

impl fmt::Display for AttentionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Hysteresis filter over presence samples.
///
/// Samples must arrive with non-decreasing `now`.
#[derive(Debug, Clone)]
pub struct AttentionTracker {
    threshold: Duration,
    last_presence: Instant,
    status: AttentionStatus,
}

impl AttentionTracker {
    /// Start tracking as `Focused`, counting absence from `now`
    pub fn new(threshold: Duration, now: Instant) -> Self {
        Self {
            threshold,
            last_presence: now,
            status: AttentionStatus::Focused,
        }
    }

    /// Feed one sample and return the resulting status
    pub fn observe(&mut self, has_face: bool, now: Instant) -> AttentionStatus {
        if has_face {
            self.last_presence = now;
            self.status = AttentionStatus::Focused;
        } else {
            self.status = if self.absence(now) > self.threshold {
                AttentionStatus::Distracted
            } else {
                AttentionStatus::Focused
            };
        }
        self.status
    }

    pub fn status(&self) -> AttentionStatus {
        self.status
    }

    pub fn last_presence(&self) -> Instant {
        self.last_presence
    }

    pub fn threshold(&self) -> Duration {
        self.threshold
    }

    /// Time since the last presence sample
    pub fn absence(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_presence)
    }
}
