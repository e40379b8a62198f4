mod common;

use common::{Newsroom, HOUR_MS, NOW};
use newsroom_core::model::audit::AuditPayload;
use newsroom_core::model::story::StoryStage;
use newsroom_core::model::task::ContentType;
use newsroom_core::model::user::{StaffRole, User};
use newsroom_core::model::workflow::StageAction;
use newsroom_core::service::error::EngineErrorKind;
use newsroom_core::service::stage_service::{transition, transition_stage, TransitionRequest};
use newsroom_core::service::story_service::get_story;
use newsroom_core::stage_machine::{required_slot, resolve_edge};
use uuid::Uuid;

#[test]
fn new_story_starts_in_draft_and_cannot_jump_to_published() {
    let newsroom = Newsroom::new();
    let story = newsroom.draft("Budget vote");
    assert_eq!(story.stage, StoryStage::Draft);
    assert_eq!(story.version, 1);

    let request = TransitionRequest::new(story.id, StoryStage::Published, newsroom.editor.id);
    let err = transition_stage(&newsroom.ctx(), &request).unwrap_err();
    assert_eq!(err.kind(), EngineErrorKind::InvalidTransition);

    let reloaded = get_story(&newsroom.ctx(), story.id).unwrap();
    assert_eq!(reloaded.stage, StoryStage::Draft);
    assert_eq!(reloaded.version, 1);
}

#[test]
fn replaying_an_invalid_pair_yields_the_same_kind() {
    let newsroom = Newsroom::new();
    let story = newsroom.draft("Replay");
    for stage in StoryStage::ALL {
        if resolve_edge(StoryStage::Draft, stage).is_some() {
            continue;
        }
        let request = TransitionRequest::new(story.id, stage, newsroom.editor.id);
        let first = transition_stage(&newsroom.ctx(), &request).unwrap_err().kind();
        let second = transition_stage(&newsroom.ctx(), &request).unwrap_err().kind();
        assert_eq!(first, EngineErrorKind::InvalidTransition, "{stage}");
        assert_eq!(first, second, "{stage}");
    }
}

#[test]
fn full_happy_path_keeps_slots_coupled_to_stage() {
    let newsroom = Newsroom::new();
    let story = newsroom.in_review("Water outage");
    assert_eq!(story.stage, StoryStage::NeedsJournalistReview);
    assert_eq!(story.assigned_reviewer_id, Some(newsroom.reviewer.id));
    assert_eq!(story.assigned_approver_id, None);

    let story = newsroom.move_to(
        &story,
        StoryStage::NeedsSubEditorApproval,
        newsroom.reviewer.id,
        Some(newsroom.sub_editor.id),
    );
    assert_eq!(story.assigned_reviewer_id, None);
    assert_eq!(story.assigned_approver_id, Some(newsroom.sub_editor.id));

    let story = newsroom.move_to(&story, StoryStage::Approved, newsroom.sub_editor.id, None);
    assert_eq!(story.assigned_approver_id, None);

    let story = newsroom.move_to(
        &story,
        StoryStage::ReadyToPublish,
        newsroom.sub_editor.id,
        None,
    );
    newsroom.clock.advance(HOUR_MS);
    let story = newsroom.move_to(&story, StoryStage::Published, newsroom.sub_editor.id, None);
    assert_eq!(story.stage, StoryStage::Published);
    assert_eq!(story.published_at, Some(NOW + HOUR_MS));

    let audit = newsroom.audit_for(ContentType::Story, story.id);
    let stage_changes = audit
        .iter()
        .filter(|entry| matches!(entry.payload, AuditPayload::StageChanged { .. }))
        .count();
    assert_eq!(stage_changes, 5);
    assert_eq!(audit[0].action, "story.create");
}

#[test]
fn named_action_applies_the_matching_edge() {
    let newsroom = Newsroom::new();
    let story = newsroom.in_review("Named action");
    let outcome = transition(
        &newsroom.ctx(),
        story.id,
        StageAction::RequestRevision,
        newsroom.reviewer.id,
        None,
    )
    .unwrap();
    assert_eq!(outcome.from, StoryStage::NeedsJournalistReview);
    assert_eq!(outcome.story.stage, StoryStage::NeedsRevision);
    assert_eq!(outcome.story.assigned_reviewer_id, None);

    let err = transition(
        &newsroom.ctx(),
        story.id,
        StageAction::Publish,
        newsroom.editor.id,
        None,
    )
    .unwrap_err();
    assert_eq!(err.kind(), EngineErrorKind::InvalidTransition);
}

#[test]
fn failure_kinds_are_checked_in_order() {
    let newsroom = Newsroom::new();
    let story = newsroom.draft("Ordering");

    // Missing story wins over everything else.
    let request = TransitionRequest::new(Uuid::new_v4(), StoryStage::Published, newsroom.intern.id);
    assert_eq!(
        transition_stage(&newsroom.ctx(), &request).unwrap_err().kind(),
        EngineErrorKind::NotFound
    );

    // A valid edge for an unauthorized actor with a bad assignee is Unauthorized.
    let request =
        TransitionRequest::new(story.id, StoryStage::NeedsJournalistReview, newsroom.intern.id)
            .with_assignee(newsroom.sub_editor.id);
    assert_eq!(
        transition_stage(&newsroom.ctx(), &request).unwrap_err().kind(),
        EngineErrorKind::Unauthorized
    );

    // Authorized actor, wrong-role reviewer.
    let request =
        TransitionRequest::new(story.id, StoryStage::NeedsJournalistReview, newsroom.journalist.id)
            .with_assignee(newsroom.sub_editor.id);
    assert_eq!(
        transition_stage(&newsroom.ctx(), &request).unwrap_err().kind(),
        EngineErrorKind::InvalidAssignee
    );

    // Missing reviewer.
    let request = TransitionRequest::new(story.id, StoryStage::NeedsJournalistReview, newsroom.journalist.id);
    assert_eq!(
        transition_stage(&newsroom.ctx(), &request).unwrap_err().kind(),
        EngineErrorKind::InvalidAssignee
    );

    // Stale version.
    let request =
        TransitionRequest::new(story.id, StoryStage::NeedsJournalistReview, newsroom.journalist.id)
            .with_assignee(newsroom.reviewer.id)
            .with_expected_version(story.version + 1);
    assert_eq!(
        transition_stage(&newsroom.ctx(), &request).unwrap_err().kind(),
        EngineErrorKind::Conflict
    );
}

#[test]
fn other_journalists_cannot_submit_someone_elses_draft() {
    let newsroom = Newsroom::new();
    let story = newsroom.draft("Not yours");
    let request =
        TransitionRequest::new(story.id, StoryStage::NeedsJournalistReview, newsroom.reviewer2.id)
            .with_assignee(newsroom.reviewer.id);
    let err = transition_stage(&newsroom.ctx(), &request).unwrap_err();
    assert_eq!(err.kind(), EngineErrorKind::Unauthorized);
    assert_eq!(newsroom.audit_rows(), 1);
}

#[test]
fn inactive_reviewer_is_rejected() {
    let newsroom = Newsroom::new();
    let mut retired = User::staff("Retired", StaffRole::Journalist);
    retired.is_active = false;
    newsroom.add_user(&retired);

    let story = newsroom.draft("Inactive");
    let request =
        TransitionRequest::new(story.id, StoryStage::NeedsJournalistReview, newsroom.journalist.id)
            .with_assignee(retired.id);
    let err = transition_stage(&newsroom.ctx(), &request).unwrap_err();
    assert_eq!(err.kind(), EngineErrorKind::InvalidAssignee);
}

#[test]
fn archive_and_unarchive_need_an_editor() {
    let newsroom = Newsroom::new();
    let story = newsroom.in_review("Archive me");

    let request = TransitionRequest::new(story.id, StoryStage::Archived, newsroom.sub_editor.id);
    assert_eq!(
        transition_stage(&newsroom.ctx(), &request).unwrap_err().kind(),
        EngineErrorKind::Unauthorized
    );

    let archived = newsroom.move_to(&story, StoryStage::Archived, newsroom.editor.id, None);
    assert_eq!(archived.assigned_reviewer_id, None);
    assert!(required_slot(archived.stage).is_none());

    let restored = newsroom.move_to(&archived, StoryStage::Draft, newsroom.editor.id, None);
    assert_eq!(restored.stage, StoryStage::Draft);
}

#[test]
fn subscribers_cannot_act() {
    let newsroom = Newsroom::new();
    let story = newsroom.draft("Subscriber");
    let request =
        TransitionRequest::new(story.id, StoryStage::NeedsJournalistReview, newsroom.subscriber.id)
            .with_assignee(newsroom.reviewer.id);
    let err = transition_stage(&newsroom.ctx(), &request).unwrap_err();
    assert_eq!(err.kind(), EngineErrorKind::Unauthorized);
}

#[test]
fn failed_audit_write_rolls_back_the_transition() {
    let newsroom = Newsroom::new();
    let story = newsroom.draft("No trail");
    newsroom.conn.execute_batch("DROP TABLE audit_log;").unwrap();

    let request =
        TransitionRequest::new(story.id, StoryStage::NeedsJournalistReview, newsroom.journalist.id)
            .with_assignee(newsroom.reviewer.id);
    assert!(transition_stage(&newsroom.ctx(), &request).is_err());

    let reloaded = get_story(&newsroom.ctx(), story.id).unwrap();
    assert_eq!(reloaded.stage, StoryStage::Draft);
    assert_eq!(reloaded.version, story.version);
    assert_eq!(reloaded.assigned_reviewer_id, None);
}
