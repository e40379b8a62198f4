mod common;

use common::Newsroom;
use newsroom_core::model::audit::AuditPayload;
use newsroom_core::model::story::StoryStage;
use newsroom_core::model::task::ContentType;
use newsroom_core::model::workflow::AssignmentSlot;
use newsroom_core::service::assignment_service::{assign, AssignRequest, AssignmentOutcome};
use newsroom_core::service::error::EngineErrorKind;
use newsroom_core::service::story_service::get_story;
use uuid::Uuid;

#[test]
fn editor_reassigns_reviewer_and_audit_records_both_holders() {
    let newsroom = Newsroom::new();
    let story = newsroom.in_review("Taxi strike");

    let request = AssignRequest::new(
        AssignmentSlot::Reviewer,
        story.id,
        newsroom.reviewer2.id,
        newsroom.editor.id,
    );
    let outcome = assign(&newsroom.ctx(), &request).unwrap();
    match outcome {
        AssignmentOutcome::Assigned {
            previous, new, version, ..
        } => {
            assert_eq!(previous, Some(newsroom.reviewer.id));
            assert_eq!(new, newsroom.reviewer2.id);
            assert_eq!(version, story.version + 1);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }

    let reloaded = get_story(&newsroom.ctx(), story.id).unwrap();
    assert_eq!(reloaded.stage, StoryStage::NeedsJournalistReview);
    assert_eq!(reloaded.assigned_reviewer_id, Some(newsroom.reviewer2.id));

    let last = newsroom
        .audit_for(ContentType::Story, story.id)
        .pop()
        .unwrap();
    assert_eq!(last.user_id, newsroom.editor.id);
    assert_eq!(
        last.payload,
        AuditPayload::Assigned {
            slot: AssignmentSlot::Reviewer,
            previous: Some(newsroom.reviewer.id),
            new: newsroom.reviewer2.id,
        }
    );
}

#[test]
fn sub_editor_cannot_be_reviewer() {
    let newsroom = Newsroom::new();
    let story = newsroom.in_review("Wrong role");
    let request = AssignRequest::new(
        AssignmentSlot::Reviewer,
        story.id,
        newsroom.sub_editor2.id,
        newsroom.editor.id,
    );
    let err = assign(&newsroom.ctx(), &request).unwrap_err();
    assert_eq!(err.kind(), EngineErrorKind::InvalidAssignee);

    let reloaded = get_story(&newsroom.ctx(), story.id).unwrap();
    assert_eq!(reloaded.assigned_reviewer_id, Some(newsroom.reviewer.id));
}

#[test]
fn repeating_an_assignment_is_a_no_op() {
    let newsroom = Newsroom::new();
    let story = newsroom.in_review("Twice");
    let request = AssignRequest::new(
        AssignmentSlot::Reviewer,
        story.id,
        newsroom.reviewer2.id,
        newsroom.editor.id,
    );

    let first = assign(&newsroom.ctx(), &request).unwrap();
    let rows_after_first = newsroom.audit_rows();
    let second = assign(&newsroom.ctx(), &request).unwrap();

    assert!(!first.is_unchanged());
    assert!(second.is_unchanged());
    assert_eq!(first.holder(), second.holder());
    assert_eq!(newsroom.audit_rows(), rows_after_first);
    let reloaded = get_story(&newsroom.ctx(), story.id).unwrap();
    assert_eq!(reloaded.version, story.version + 1);
}

#[test]
fn no_op_survives_a_stale_expected_version() {
    let newsroom = Newsroom::new();
    let story = newsroom.in_review("Stale no-op");
    let mut request = AssignRequest::new(
        AssignmentSlot::Reviewer,
        story.id,
        newsroom.reviewer.id,
        newsroom.editor.id,
    );
    request.expected_version = Some(story.version - 1);
    assert!(assign(&newsroom.ctx(), &request).unwrap().is_unchanged());
}

#[test]
fn stale_expected_version_conflicts() {
    let newsroom = Newsroom::new();
    let story = newsroom.in_review("Stale");
    let mut request = AssignRequest::new(
        AssignmentSlot::Reviewer,
        story.id,
        newsroom.reviewer2.id,
        newsroom.editor.id,
    );
    request.expected_version = Some(story.version - 1);
    let err = assign(&newsroom.ctx(), &request).unwrap_err();
    assert_eq!(err.kind(), EngineErrorKind::Conflict);
}

#[test]
fn assignment_outside_its_stage_is_a_stage_mismatch() {
    let newsroom = Newsroom::new();
    let draft = newsroom.draft("Still a draft");
    let request = AssignRequest::new(
        AssignmentSlot::Reviewer,
        draft.id,
        newsroom.reviewer.id,
        newsroom.editor.id,
    );
    assert_eq!(
        assign(&newsroom.ctx(), &request).unwrap_err().kind(),
        EngineErrorKind::StageMismatch
    );

    let in_approval = newsroom.in_approval("Approval stage");
    let request = AssignRequest::new(
        AssignmentSlot::Reviewer,
        in_approval.id,
        newsroom.reviewer2.id,
        newsroom.editor.id,
    );
    assert_eq!(
        assign(&newsroom.ctx(), &request).unwrap_err().kind(),
        EngineErrorKind::StageMismatch
    );
}

#[test]
fn approver_reassignment_checks_role_then_policy() {
    let newsroom = Newsroom::new();
    let story = newsroom.in_approval("Approver swap");

    // A journalist is never a valid approver.
    let request = AssignRequest::new(
        AssignmentSlot::Approver,
        story.id,
        newsroom.reviewer.id,
        newsroom.editor.id,
    );
    assert_eq!(
        assign(&newsroom.ctx(), &request).unwrap_err().kind(),
        EngineErrorKind::InvalidAssignee
    );

    // The other sub-editor is not assigned, so cannot hand the story over.
    let request = AssignRequest::new(
        AssignmentSlot::Approver,
        story.id,
        newsroom.sub_editor2.id,
        newsroom.sub_editor2.id,
    );
    assert_eq!(
        assign(&newsroom.ctx(), &request).unwrap_err().kind(),
        EngineErrorKind::Unauthorized
    );

    // The current approver can.
    let request = AssignRequest::new(
        AssignmentSlot::Approver,
        story.id,
        newsroom.sub_editor2.id,
        newsroom.sub_editor.id,
    );
    let outcome = assign(&newsroom.ctx(), &request).unwrap();
    assert_eq!(outcome.holder(), newsroom.sub_editor2.id);
}

#[test]
fn missing_content_is_not_found_and_missing_target_is_invalid() {
    let newsroom = Newsroom::new();
    let story = newsroom.in_review("Lookup");

    let request = AssignRequest::new(
        AssignmentSlot::Reviewer,
        Uuid::new_v4(),
        newsroom.reviewer2.id,
        newsroom.editor.id,
    );
    assert_eq!(
        assign(&newsroom.ctx(), &request).unwrap_err().kind(),
        EngineErrorKind::NotFound
    );

    let request = AssignRequest::new(
        AssignmentSlot::Reviewer,
        story.id,
        Uuid::new_v4(),
        newsroom.editor.id,
    );
    assert_eq!(
        assign(&newsroom.ctx(), &request).unwrap_err().kind(),
        EngineErrorKind::InvalidAssignee
    );
}

#[test]
fn stage_is_checked_before_the_target_user() {
    let newsroom = Newsroom::new();
    let draft = newsroom.draft("Too early");

    let request = AssignRequest::new(
        AssignmentSlot::Reviewer,
        draft.id,
        Uuid::new_v4(),
        newsroom.editor.id,
    );
    assert_eq!(
        assign(&newsroom.ctx(), &request).unwrap_err().kind(),
        EngineErrorKind::StageMismatch
    );
}

#[test]
fn journalist_cannot_reassign_reviewer() {
    let newsroom = Newsroom::new();
    let story = newsroom.in_review("Self-serve");
    let request = AssignRequest::new(
        AssignmentSlot::Reviewer,
        story.id,
        newsroom.reviewer2.id,
        newsroom.journalist.id,
    );
    assert_eq!(
        assign(&newsroom.ctx(), &request).unwrap_err().kind(),
        EngineErrorKind::Unauthorized
    );
}
