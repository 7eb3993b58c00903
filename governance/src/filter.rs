//! Proposal list filtering.

use civitas_types::Timestamp;
use serde::{Deserialize, Serialize};

use crate::proposal::{Category, Proposal, ProposalStatus};

/// All set criteria must match; unset criteria match everything.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalFilter {
    /// Case-insensitive substring of the description.
    pub search: Option<String>,
    pub category: Option<Category>,
    pub status: Option<ProposalStatus>,
}

impl ProposalFilter {
    pub fn matches(&self, proposal: &Proposal, now: Timestamp) -> bool {
        if let Some(term) = self.search.as_deref().filter(|t| !t.is_empty()) {
            if !proposal
                .description
                .to_lowercase()
                .contains(&term.to_lowercase())
            {
                return false;
            }
        }
        if self.category.is_some_and(|c| c != proposal.category) {
            return false;
        }
        if self.status.is_some_and(|s| s != proposal.status(now)) {
            return false;
        }
        true
    }

    pub fn apply<'a>(
        &self,
        proposals: impl IntoIterator<Item = &'a Proposal>,
        now: Timestamp,
    ) -> Vec<&'a Proposal> {
        proposals
            .into_iter()
            .filter(|p| self.matches(p, now))
            .collect()
    }
}
