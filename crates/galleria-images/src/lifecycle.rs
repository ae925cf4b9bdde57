//! Lifecycle of a section entry and its backing record.
//!
//! ```text
//! Pending ──ingest ok──▶ Stored ──flagged by sweep──▶ Invalid ──purged──▶ Removed
//!    │                     │                                              ▲
//!    └──ingest failed──────┼──────────────────────────────────────────────┤
//!                          └──deleted by user─────────────────────────────┘
//! ```

use serde::Serialize;

use crate::error::{ImageError, ImageResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryState {
    /// Only an ephemeral preview exists
    Pending,
    /// Durable and validated
    Stored,
    /// Flagged by a cleanup sweep
    Invalid,
    /// Gone
    Removed,
}

impl EntryState {
    pub fn can_transition_to(self, next: EntryState) -> bool {
        use EntryState::*;
        matches!(
            (self, next),
            (Pending, Stored)
                | (Pending, Removed)
                | (Stored, Invalid)
                | (Stored, Removed)
                | (Invalid, Removed)
        )
    }

    /// Move to `next`, rejecting transitions outside the lifecycle.
    pub fn transition(self, next: EntryState) -> ImageResult<EntryState> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(ImageError::InvalidTransition {
                from: self,
                to: next,
            })
        }
    }
}
