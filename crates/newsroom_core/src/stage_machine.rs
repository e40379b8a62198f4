//! Authoritative story stage transition table.
//!
//! # Responsibility
//! - Own the edge set `(action, from) -> to`.
//! - Apply an edge to an in-memory `Story`, fixing up slot fields.
//!
//! # Invariants
//! - `(from, to)` pairs are unique, so a target stage resolves to at most
//!   one edge.
//! - The returned story always passes `Story::validate()`.
//! - This module performs no I/O and no authorization.

use crate::model::story::{Story, StoryStage};
use crate::model::user::UserId;
use crate::model::workflow::{AssignmentSlot, StageAction};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// One edge of the stage graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageEdge {
    pub action: StageAction,
    pub from: StoryStage,
    pub to: StoryStage,
}

const fn edge(action: StageAction, from: StoryStage, to: StoryStage) -> StageEdge {
    StageEdge { action, from, to }
}

/// The complete edge set.
pub const STAGE_EDGES: &[StageEdge] = &[
    edge(
        StageAction::SubmitForReview,
        StoryStage::Draft,
        StoryStage::NeedsJournalistReview,
    ),
    edge(
        StageAction::ForwardForApproval,
        StoryStage::NeedsJournalistReview,
        StoryStage::NeedsSubEditorApproval,
    ),
    edge(
        StageAction::RequestRevision,
        StoryStage::NeedsJournalistReview,
        StoryStage::NeedsRevision,
    ),
    edge(
        StageAction::RequestRevision,
        StoryStage::NeedsSubEditorApproval,
        StoryStage::NeedsRevision,
    ),
    edge(
        StageAction::Approve,
        StoryStage::NeedsSubEditorApproval,
        StoryStage::Approved,
    ),
    edge(
        StageAction::MarkReadyToPublish,
        StoryStage::Approved,
        StoryStage::ReadyToPublish,
    ),
    edge(
        StageAction::Publish,
        StoryStage::ReadyToPublish,
        StoryStage::Published,
    ),
    edge(
        StageAction::Resubmit,
        StoryStage::NeedsRevision,
        StoryStage::NeedsJournalistReview,
    ),
    edge(
        StageAction::Archive,
        StoryStage::NeedsJournalistReview,
        StoryStage::Archived,
    ),
    edge(
        StageAction::Archive,
        StoryStage::NeedsSubEditorApproval,
        StoryStage::Archived,
    ),
    edge(
        StageAction::Archive,
        StoryStage::NeedsRevision,
        StoryStage::Archived,
    ),
    edge(
        StageAction::Archive,
        StoryStage::Published,
        StoryStage::Archived,
    ),
    edge(
        StageAction::Unarchive,
        StoryStage::Archived,
        StoryStage::Draft,
    ),
];

/// Finds the edge reached by `action` from `from`.
pub fn edge_for_action(action: StageAction, from: StoryStage) -> Option<StageEdge> {
    STAGE_EDGES
        .iter()
        .copied()
        .find(|edge| edge.action == action && edge.from == from)
}

/// Finds the edge connecting `from` to `to`.
pub fn resolve_edge(from: StoryStage, to: StoryStage) -> Option<StageEdge> {
    STAGE_EDGES
        .iter()
        .copied()
        .find(|edge| edge.from == from && edge.to == to)
}

/// Slot that must be filled on entering `stage`, if any.
pub fn required_slot(stage: StoryStage) -> Option<AssignmentSlot> {
    match stage {
        StoryStage::NeedsJournalistReview => Some(AssignmentSlot::Reviewer),
        StoryStage::NeedsSubEditorApproval => Some(AssignmentSlot::Approver),
        _ => None,
    }
}

/// Slot whose holder is tied to `stage`, if any. Same mapping as
/// [`required_slot`] for stories.
pub fn slot_stage(slot: AssignmentSlot) -> Option<StoryStage> {
    match slot {
        AssignmentSlot::Reviewer => Some(StoryStage::NeedsJournalistReview),
        AssignmentSlot::Approver => Some(StoryStage::NeedsSubEditorApproval),
        AssignmentSlot::Translator => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageMachineError {
    NoEdge {
        from: StoryStage,
        to: StoryStage,
    },
    NoActionEdge {
        action: StageAction,
        from: StoryStage,
    },
    MissingAssignee {
        slot: AssignmentSlot,
        to: StoryStage,
    },
    UnexpectedAssignee {
        to: StoryStage,
    },
}

impl Display for StageMachineError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoEdge { from, to } => write!(f, "no transition from {from} to {to}"),
            Self::NoActionEdge { action, from } => {
                write!(f, "action `{action}` is not available from {from}")
            }
            Self::MissingAssignee { slot, to } => {
                write!(f, "entering {to} requires a {slot} assignee")
            }
            Self::UnexpectedAssignee { to } => {
                write!(f, "entering {to} does not take an assignee")
            }
        }
    }
}

impl Error for StageMachineError {}

/// Applies `edge` to `story`.
///
/// Sets the slot for the new stage from `assignee`, clears slots the new
/// stage does not carry, stamps `published_at` on publication and
/// `updated_at` always. `version` is left to the repository write.
pub fn apply_edge(
    story: &Story,
    edge: StageEdge,
    assignee: Option<UserId>,
    now_ms: i64,
) -> Result<Story, StageMachineError> {
    debug_assert_eq!(story.stage, edge.from);

    let slot = required_slot(edge.to);
    match (slot, assignee) {
        (Some(slot), None) => {
            return Err(StageMachineError::MissingAssignee { slot, to: edge.to });
        }
        (None, Some(_)) => return Err(StageMachineError::UnexpectedAssignee { to: edge.to }),
        _ => {}
    }

    let mut next = story.clone();
    next.stage = edge.to;
    next.assigned_reviewer_id = match slot {
        Some(AssignmentSlot::Reviewer) => assignee,
        _ => None,
    };
    next.assigned_approver_id = match slot {
        Some(AssignmentSlot::Approver) => assignee,
        _ => None,
    };
    if edge.to == StoryStage::Published {
        next.published_at = Some(now_ms);
    }
    next.updated_at = now_ms;
    Ok(next)
}
