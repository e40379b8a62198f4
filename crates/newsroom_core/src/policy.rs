//! Centralized role policy.
//!
//! # Responsibility
//! - Answer `(role, action, stage) -> Decision` for every mutation path.
//! - Keep relational conditions (author / assignee) as data so callers
//!   resolve them through [`Decision::permits`].
//!
//! # Invariants
//! - The table is total: a missing entry is `Deny`.
//! - Stage-less actions ignore the stage argument.
//! - The table is built once per process and never mutated.

use crate::model::story::{Story, StoryStage};
use crate::model::translation::Translation;
use crate::model::user::{StaffRole, UserId};
use crate::model::workflow::{AssignmentSlot, StageAction};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::fmt::{Display, Formatter};

/// Action a staff member may attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PolicyAction {
    ReadContent,
    CreateStory,
    EditContent,
    Transition(StageAction),
    /// Change who holds a slot.
    Reassign(AssignmentSlot),
    /// Be the holder of a slot.
    OccupySlot(AssignmentSlot),
    ForkTranslation,
    WorkTranslation,
    ReviewTranslation,
    CompleteTranslation,
    ScheduleFollowUp,
    ManageTasks,
    DeleteStory,
    DeleteClassification,
}

impl PolicyAction {
    /// Every action the table knows about.
    pub fn all() -> Vec<PolicyAction> {
        let mut actions = vec![
            Self::ReadContent,
            Self::CreateStory,
            Self::EditContent,
            Self::ForkTranslation,
            Self::WorkTranslation,
            Self::ReviewTranslation,
            Self::CompleteTranslation,
            Self::ScheduleFollowUp,
            Self::ManageTasks,
            Self::DeleteStory,
            Self::DeleteClassification,
        ];
        actions.extend(StageAction::ALL.into_iter().map(Self::Transition));
        for slot in [
            AssignmentSlot::Reviewer,
            AssignmentSlot::Approver,
            AssignmentSlot::Translator,
        ] {
            actions.push(Self::Reassign(slot));
            actions.push(Self::OccupySlot(slot));
        }
        actions
    }

    /// Returns whether the decision depends on the story stage.
    pub fn is_stage_scoped(self) -> bool {
        matches!(
            self,
            Self::ReadContent
                | Self::EditContent
                | Self::Transition(_)
                | Self::Reassign(AssignmentSlot::Reviewer)
                | Self::Reassign(AssignmentSlot::Approver)
                | Self::ForkTranslation
        )
    }
}

impl Display for PolicyAction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ReadContent => f.write_str("read_content"),
            Self::CreateStory => f.write_str("create_story"),
            Self::EditContent => f.write_str("edit_content"),
            Self::Transition(action) => write!(f, "transition:{action}"),
            Self::Reassign(slot) => write!(f, "reassign:{slot}"),
            Self::OccupySlot(slot) => write!(f, "occupy:{slot}"),
            Self::ForkTranslation => f.write_str("fork_translation"),
            Self::WorkTranslation => f.write_str("work_translation"),
            Self::ReviewTranslation => f.write_str("review_translation"),
            Self::CompleteTranslation => f.write_str("complete_translation"),
            Self::ScheduleFollowUp => f.write_str("schedule_follow_up"),
            Self::ManageTasks => f.write_str("manage_tasks"),
            Self::DeleteStory => f.write_str("delete_story"),
            Self::DeleteClassification => f.write_str("delete_classification"),
        }
    }
}

/// Policy answer for one `(role, action, stage)` cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    AllowIfAuthor,
    AllowIfAssignee,
    Deny,
}

/// Actor's relation to the content being acted on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActorRelation {
    pub is_author: bool,
    pub is_assignee: bool,
}

impl ActorRelation {
    pub fn to_story(story: &Story, actor_id: UserId) -> Self {
        Self {
            is_author: story.author_id == actor_id,
            is_assignee: story.is_assigned_to(actor_id),
        }
    }

    pub fn to_translation(translation: &Translation, actor_id: UserId) -> Self {
        Self {
            is_author: false,
            is_assignee: translation.assigned_to_id == actor_id,
        }
    }
}

impl Decision {
    /// Resolves relational conditions against `relation`.
    pub fn permits(self, relation: ActorRelation) -> bool {
        match self {
            Self::Allow => true,
            Self::AllowIfAuthor => relation.is_author,
            Self::AllowIfAssignee => relation.is_assignee,
            Self::Deny => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct PolicyKey {
    role: StaffRole,
    action: PolicyAction,
    stage: Option<StoryStage>,
}

/// Read-only policy table.
#[derive(Debug)]
pub struct PolicyTable {
    entries: HashMap<PolicyKey, Decision>,
}

impl PolicyTable {
    fn build() -> Self {
        let mut entries = HashMap::new();
        for role in StaffRole::ALL {
            for action in PolicyAction::all() {
                if action.is_stage_scoped() {
                    for stage in StoryStage::ALL {
                        let decision = rule(role, action, Some(stage));
                        if decision != Decision::Deny {
                            entries.insert(
                                PolicyKey {
                                    role,
                                    action,
                                    stage: Some(stage),
                                },
                                decision,
                            );
                        }
                    }
                } else {
                    let decision = rule(role, action, None);
                    if decision != Decision::Deny {
                        entries.insert(
                            PolicyKey {
                                role,
                                action,
                                stage: None,
                            },
                            decision,
                        );
                    }
                }
            }
        }
        Self { entries }
    }

    pub fn decide(
        &self,
        role: StaffRole,
        action: PolicyAction,
        stage: Option<StoryStage>,
    ) -> Decision {
        let stage = if action.is_stage_scoped() { stage } else { None };
        self.entries
            .get(&PolicyKey {
                role,
                action,
                stage,
            })
            .copied()
            .unwrap_or(Decision::Deny)
    }

    /// Number of non-deny cells.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

static POLICY_TABLE: Lazy<PolicyTable> = Lazy::new(PolicyTable::build);

/// Returns the process-wide policy table.
pub fn policy_table() -> &'static PolicyTable {
    &POLICY_TABLE
}

/// Looks up the decision for `(role, action, stage)`.
pub fn authorize(role: StaffRole, action: PolicyAction, stage: Option<StoryStage>) -> Decision {
    POLICY_TABLE.decide(role, action, stage)
}

/// Looks up and resolves the decision in one step.
pub fn is_permitted(
    role: StaffRole,
    action: PolicyAction,
    stage: Option<StoryStage>,
    relation: ActorRelation,
) -> bool {
    authorize(role, action, stage).permits(relation)
}

fn at_least(role: StaffRole, min: StaffRole, decision: Decision) -> Decision {
    if role.is_at_least(min) {
        decision
    } else {
        Decision::Deny
    }
}

/// Tiered grant: `lower` for `[min_lower, min_full)`, `Allow` from `min_full`.
fn tiered(role: StaffRole, min_lower: StaffRole, lower: Decision, min_full: StaffRole) -> Decision {
    if role.is_at_least(min_full) {
        Decision::Allow
    } else if role.is_at_least(min_lower) {
        lower
    } else {
        Decision::Deny
    }
}

fn rule(role: StaffRole, action: PolicyAction, stage: Option<StoryStage>) -> Decision {
    use Decision::{Allow, AllowIfAssignee, AllowIfAuthor, Deny};
    use StaffRole::{Editor, Intern, Journalist, SubEditor};
    use StoryStage as S;

    match action {
        PolicyAction::ReadContent => match stage {
            Some(S::Published) => Allow,
            _ => tiered(role, Intern, AllowIfAuthor, Journalist),
        },
        PolicyAction::CreateStory => at_least(role, Journalist, Allow),
        PolicyAction::EditContent => match stage {
            Some(S::Draft | S::NeedsRevision) => tiered(role, Journalist, AllowIfAuthor, SubEditor),
            Some(S::NeedsJournalistReview) => {
                tiered(role, Journalist, AllowIfAssignee, SubEditor)
            }
            Some(S::NeedsSubEditorApproval) => tiered(role, SubEditor, AllowIfAssignee, Editor),
            Some(S::Approved | S::ReadyToPublish) => at_least(role, SubEditor, Allow),
            _ => Deny,
        },
        PolicyAction::Transition(edge) => transition_rule(role, edge, stage),
        PolicyAction::Reassign(AssignmentSlot::Reviewer) => match stage {
            Some(S::NeedsJournalistReview) => at_least(role, SubEditor, Allow),
            _ => Deny,
        },
        PolicyAction::Reassign(AssignmentSlot::Approver) => match stage {
            Some(S::NeedsSubEditorApproval) => tiered(role, SubEditor, AllowIfAssignee, Editor),
            _ => Deny,
        },
        PolicyAction::Reassign(AssignmentSlot::Translator) => at_least(role, SubEditor, Allow),
        // Write capability is not monotonic: only journalists review.
        PolicyAction::OccupySlot(AssignmentSlot::Reviewer) => {
            if role == Journalist {
                Allow
            } else {
                Deny
            }
        }
        PolicyAction::OccupySlot(AssignmentSlot::Approver) => at_least(role, SubEditor, Allow),
        PolicyAction::OccupySlot(AssignmentSlot::Translator) => Allow,
        PolicyAction::ForkTranslation => match stage {
            Some(S::Approved | S::ReadyToPublish | S::Published) => {
                tiered(role, Journalist, AllowIfAuthor, SubEditor)
            }
            _ => Deny,
        },
        PolicyAction::WorkTranslation => tiered(role, Intern, AllowIfAssignee, Editor),
        PolicyAction::ReviewTranslation | PolicyAction::CompleteTranslation => {
            at_least(role, SubEditor, Allow)
        }
        PolicyAction::ScheduleFollowUp => tiered(role, Journalist, AllowIfAuthor, SubEditor),
        PolicyAction::ManageTasks => tiered(role, Intern, AllowIfAssignee, SubEditor),
        PolicyAction::DeleteStory | PolicyAction::DeleteClassification => {
            at_least(role, Editor, Allow)
        }
    }
}

fn transition_rule(role: StaffRole, edge: StageAction, from: Option<StoryStage>) -> Decision {
    use Decision::{AllowIfAssignee, AllowIfAuthor, Deny};
    use StaffRole::{Editor, Journalist, SubEditor};
    use StoryStage as S;

    let Some(from) = from else {
        return Deny;
    };
    match (edge, from) {
        (StageAction::SubmitForReview, S::Draft) => {
            tiered(role, Journalist, AllowIfAuthor, SubEditor)
        }
        (StageAction::Resubmit, S::NeedsRevision) => {
            tiered(role, Journalist, AllowIfAuthor, Editor)
        }
        (StageAction::ForwardForApproval, S::NeedsJournalistReview)
        | (StageAction::RequestRevision, S::NeedsJournalistReview) => {
            tiered(role, Journalist, AllowIfAssignee, SubEditor)
        }
        (StageAction::Approve, S::NeedsSubEditorApproval)
        | (StageAction::RequestRevision, S::NeedsSubEditorApproval) => {
            tiered(role, SubEditor, AllowIfAssignee, Editor)
        }
        (StageAction::MarkReadyToPublish, S::Approved)
        | (StageAction::Publish, S::ReadyToPublish) => at_least(role, SubEditor, Decision::Allow),
        (
            StageAction::Archive,
            S::NeedsJournalistReview | S::NeedsSubEditorApproval | S::NeedsRevision | S::Published,
        )
        | (StageAction::Unarchive, S::Archived) => at_least(role, Editor, Decision::Allow),
        _ => Deny,
    }
}
