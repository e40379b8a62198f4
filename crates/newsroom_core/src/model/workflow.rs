//! Workflow vocabulary shared by policy, stage machine and audit payloads.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Named stage-machine edge action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageAction {
    SubmitForReview,
    ForwardForApproval,
    RequestRevision,
    Approve,
    MarkReadyToPublish,
    Publish,
    Resubmit,
    Archive,
    Unarchive,
}

impl StageAction {
    pub const ALL: [StageAction; 9] = [
        StageAction::SubmitForReview,
        StageAction::ForwardForApproval,
        StageAction::RequestRevision,
        StageAction::Approve,
        StageAction::MarkReadyToPublish,
        StageAction::Publish,
        StageAction::Resubmit,
        StageAction::Archive,
        StageAction::Unarchive,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::SubmitForReview => "submit_for_review",
            Self::ForwardForApproval => "forward_for_approval",
            Self::RequestRevision => "request_revision",
            Self::Approve => "approve",
            Self::MarkReadyToPublish => "mark_ready_to_publish",
            Self::Publish => "publish",
            Self::Resubmit => "resubmit",
            Self::Archive => "archive",
            Self::Unarchive => "unarchive",
        }
    }
}

impl Display for StageAction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Role-bound assignment position on a content item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentSlot {
    Reviewer,
    Approver,
    Translator,
}

impl AssignmentSlot {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Reviewer => "reviewer",
            Self::Approver => "approver",
            Self::Translator => "translator",
        }
    }
}

impl Display for AssignmentSlot {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
