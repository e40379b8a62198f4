//! Stage transitions for stories.
//!
//! # Responsibility
//! - Resolve the requested edge, authorize it, validate the incoming slot
//!   holder and persist the new stage with its audit record.
//!
//! # Invariants
//! - Failure kinds are checked in a fixed order: `NotFound`,
//!   `InvalidTransition`, `Unauthorized`, `InvalidAssignee`, `Conflict`.
//!   Replaying the same invalid request yields the same kind.
//! - The persisted story always satisfies the slot/stage coupling.

use crate::model::audit::AuditPayload;
use crate::model::story::{Story, StoryId, StoryStage};
use crate::model::task::ContentType;
use crate::model::user::UserId;
use crate::model::workflow::StageAction;
use crate::policy::{ActorRelation, PolicyAction};
use crate::repo::error::EntityKind;
use crate::repo::story_repo::StoryRepository;
use crate::repo::user_repo::UserRepository;
use crate::service::context::{EngineContext, WriteScope};
use crate::service::error::{EngineError, EngineResult};
use crate::service::story_service::load_story;
use crate::service::task_service::{reconcile_best_effort, ReconcileTarget};
use crate::service::{check_expected_version, check_slot_holder, ensure_permitted, load_actor};
use crate::stage_machine::{
    apply_edge, edge_for_action, required_slot, resolve_edge, StageEdge, StageMachineError,
};
use log::info;

/// Inbound transition addressed by target stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionRequest {
    pub story_id: StoryId,
    pub target_stage: StoryStage,
    pub actor_id: UserId,
    /// Holder of the slot the target stage requires, if any.
    pub assignee_id: Option<UserId>,
    pub expected_version: Option<i64>,
}

impl TransitionRequest {
    pub fn new(story_id: StoryId, target_stage: StoryStage, actor_id: UserId) -> Self {
        Self {
            story_id,
            target_stage,
            actor_id,
            assignee_id: None,
            expected_version: None,
        }
    }

    pub fn with_assignee(mut self, assignee_id: UserId) -> Self {
        self.assignee_id = Some(assignee_id);
        self
    }

    pub fn with_expected_version(mut self, version: i64) -> Self {
        self.expected_version = Some(version);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionOutcome {
    pub story: Story,
    pub action: StageAction,
    pub from: StoryStage,
}

/// Edge selector: by target stage or by named action.
#[derive(Debug, Clone, Copy)]
enum EdgeSelector {
    Target(StoryStage),
    Action(StageAction),
}

/// `transitionStage(storyId, targetStage, actorId[, assigneeId, expectedVersion])`.
pub fn transition_stage(
    ctx: &EngineContext<'_>,
    request: &TransitionRequest,
) -> EngineResult<TransitionOutcome> {
    run_transition(
        ctx,
        request.story_id,
        EdgeSelector::Target(request.target_stage),
        request.actor_id,
        request.assignee_id,
        request.expected_version,
    )
}

/// `transition(story, action, actor)`: applies a named edge.
pub fn transition(
    ctx: &EngineContext<'_>,
    story_id: StoryId,
    action: StageAction,
    actor_id: UserId,
    assignee_id: Option<UserId>,
) -> EngineResult<TransitionOutcome> {
    run_transition(
        ctx,
        story_id,
        EdgeSelector::Action(action),
        actor_id,
        assignee_id,
        None,
    )
}

fn run_transition(
    ctx: &EngineContext<'_>,
    story_id: StoryId,
    selector: EdgeSelector,
    actor_id: UserId,
    assignee_id: Option<UserId>,
    expected_version: Option<i64>,
) -> EngineResult<TransitionOutcome> {
    let outcome = ctx.write("transition_stage", |scope| {
        let stories = scope.stories()?;
        let story = load_story(&stories, story_id)?;
        let edge = select_edge(&story, selector)?;
        let action = PolicyAction::Transition(edge.action);

        let actor = load_actor(&scope.users()?, actor_id, action)?;
        ensure_permitted(
            &actor,
            action,
            Some(story.stage),
            ActorRelation::to_story(&story, actor.id),
        )?;
        validate_assignee(scope, edge, assignee_id)?;
        check_expected_version(EntityKind::Story, story.id, expected_version, story.version)?;

        let mut next = apply_edge(&story, edge, assignee_id, scope.now_ms())?;
        next.version = stories.update_story(&next)?;
        scope.record(
            actor.id,
            ContentType::Story,
            next.id,
            AuditPayload::StageChanged {
                action: edge.action,
                from: story.stage,
                to: next.stage,
                reviewer_before: story.assigned_reviewer_id,
                reviewer_after: next.assigned_reviewer_id,
                approver_before: story.assigned_approver_id,
                approver_after: next.assigned_approver_id,
            },
        )?;
        reconcile_best_effort(scope, actor.id, ReconcileTarget::Story(&next));

        Ok(TransitionOutcome {
            story: next,
            action: edge.action,
            from: story.stage,
        })
    })?;

    info!(
        "event=stage_transition module=stage_service status=ok story_id={} action={} from={} to={} version={}",
        outcome.story.id, outcome.action, outcome.from, outcome.story.stage, outcome.story.version
    );
    Ok(outcome)
}

fn select_edge(story: &Story, selector: EdgeSelector) -> EngineResult<StageEdge> {
    let edge = match selector {
        EdgeSelector::Target(to) => {
            resolve_edge(story.stage, to).ok_or(StageMachineError::NoEdge {
                from: story.stage,
                to,
            })
        }
        EdgeSelector::Action(action) => {
            edge_for_action(action, story.stage).ok_or(StageMachineError::NoActionEdge {
                action,
                from: story.stage,
            })
        }
    };
    edge.map_err(EngineError::from)
}

fn validate_assignee(
    scope: &WriteScope<'_>,
    edge: StageEdge,
    assignee_id: Option<UserId>,
) -> EngineResult<()> {
    match (required_slot(edge.to), assignee_id) {
        (None, None) => Ok(()),
        (None, Some(_)) => Err(StageMachineError::UnexpectedAssignee { to: edge.to }.into()),
        (Some(slot), None) => Err(StageMachineError::MissingAssignee { slot, to: edge.to }.into()),
        (Some(slot), Some(assignee_id)) => {
            let assignee = scope.users()?.get_user(assignee_id)?.ok_or_else(|| {
                EngineError::InvalidAssignee(format!("assignee {assignee_id} does not exist"))
            })?;
            check_slot_holder(&assignee, slot, None)
        }
    }
}
