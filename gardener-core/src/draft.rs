//! Review of generated draft files before they become a pull request.

use std::collections::BTreeMap;

use crate::domain::DraftProposal;
use crate::error::{GardenerError, Result};

/// Where a repository's draft is in its review lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DraftState {
    /// No draft has been delivered.
    NoDraft,
    /// Files are waiting for the user to pick which ones to commit.
    PendingReview {
        /// Filename to inclusion flag.
        files: BTreeMap<String, bool>,
    },
    /// Selected files were committed as a pull request.
    Committed {
        /// URL of the opened pull request.
        pr_url: String,
    },
}

/// Per-repository draft review state machine.
///
/// There is no discard transition: a review that is dropped uncommitted
/// leaves the draft on the server for the next session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftReview {
    state: DraftState,
}

impl Default for DraftReview {
    fn default() -> Self {
        Self {
            state: DraftState::NoDraft,
        }
    }
}

impl DraftReview {
    /// Start a review with every file included. Empty proposals stay in `NoDraft`.
    pub fn from_proposal(proposal: &DraftProposal) -> Self {
        if proposal.is_empty() {
            return Self::default();
        }
        let files = proposal.keys().map(|name| (name.clone(), true)).collect();
        Self {
            state: DraftState::PendingReview { files },
        }
    }

    /// Current state.
    pub fn state(&self) -> &DraftState {
        &self.state
    }

    /// Whether files are awaiting a decision.
    pub fn is_pending(&self) -> bool {
        matches!(self.state, DraftState::PendingReview { .. })
    }

    /// Flip the inclusion flag of one file, returning the new flag.
    pub fn toggle(&mut self, filename: &str) -> Result<bool> {
        let flag = self.flag_mut(filename)?;
        *flag = !*flag;
        Ok(*flag)
    }

    /// Set the inclusion flag of one file.
    pub fn set_included(&mut self, filename: &str, included: bool) -> Result<()> {
        *self.flag_mut(filename)? = included;
        Ok(())
    }

    /// Included filenames in name order; empty outside review.
    pub fn selected_files(&self) -> Vec<String> {
        match &self.state {
            DraftState::PendingReview { files } => files
                .iter()
                .filter(|(_, included)| **included)
                .map(|(name, _)| name.clone())
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Move to `Committed` after the backend opened the pull request.
    pub fn mark_committed(&mut self, pr_url: impl Into<String>) -> Result<()> {
        if !self.is_pending() {
            return Err(GardenerError::InvalidInput(
                "no draft is awaiting review".to_string(),
            ));
        }
        self.state = DraftState::Committed {
            pr_url: pr_url.into(),
        };
        Ok(())
    }

    fn flag_mut(&mut self, filename: &str) -> Result<&mut bool> {
        match &mut self.state {
            DraftState::PendingReview { files } => files.get_mut(filename).ok_or_else(|| {
                GardenerError::InvalidInput(format!("draft has no file named {filename}"))
            }),
            _ => Err(GardenerError::InvalidInput(
                "no draft is awaiting review".to_string(),
            )),
        }
    }
}
