// Integration tests for human handoff

mod common;

use common::RecordingNotifier;

use amani::classifier::Category;
use amani::errors::HandoffError;
use amani::handoff::{
    ConversationTurn, HandoffContext, HandoffDisplayMode, HandoffManager, HandoffReason, Priority,
    TicketStatus,
};
use amani::notify::NotificationChannel;

fn context() -> HandoffContext {
    HandoffContext {
        conversation: vec![
            ConversationTurn::user("I can't sleep and everything feels pointless")
                .with_classification(Category::MentalHealth, 7),
            ConversationTurn::assistant("That sounds exhausting."),
            ConversationTurn::user("I don't want to be here anymore")
                .with_classification(Category::Crisis, 10),
        ],
    }
}

#[tokio::test]
async fn test_crisis_handoff_is_urgent_and_notifies_once() {
    let notifier = RecordingNotifier::new();
    let manager = HandoffManager::new(notifier.clone());

    let outcome = manager
        .initiate_human_handoff("user-1", "session-1", HandoffReason::Crisis, context())
        .await
        .unwrap();

    assert_eq!(outcome.ticket.priority, Priority::Urgent);
    assert_eq!(outcome.estimated_wait, "< 5 minutes");
    assert_eq!(outcome.display_mode, HandoffDisplayMode::HandoffUrgent);
    assert!(outcome.crisis_resources.is_some());
    assert!(outcome.ticket.notification_sent);

    assert_eq!(notifier.count(NotificationChannel::Emergency), 1);
    assert_eq!(notifier.count(NotificationChannel::Moderation), 0);
    assert_eq!(notifier.count(NotificationChannel::Support), 0);

    let payload = &notifier.payloads(NotificationChannel::Emergency)[0];
    assert_eq!(payload["ticket_id"], outcome.ticket.ticket_id.as_str());
    assert_eq!(payload["priority"], "URGENT");
}

#[tokio::test]
async fn test_priority_routing() {
    let notifier = RecordingNotifier::new();
    let manager = HandoffManager::new(notifier.clone());

    let high = manager
        .initiate_human_handoff("user-1", "s", HandoffReason::ModerateCrisis, context())
        .await
        .unwrap();
    let medium = manager
        .initiate_human_handoff("user-2", "s", HandoffReason::UserRequest, context())
        .await
        .unwrap();

    assert_eq!(high.ticket.priority, Priority::High);
    assert_eq!(medium.ticket.priority, Priority::Medium);
    assert!(medium.crisis_resources.is_none());
    assert_eq!(notifier.count(NotificationChannel::Moderation), 1);
    assert_eq!(notifier.count(NotificationChannel::Support), 1);
}

#[tokio::test]
async fn test_summary_reflects_conversation() {
    let manager = HandoffManager::new(RecordingNotifier::new());
    let outcome = manager
        .initiate_human_handoff("user-1", "s", HandoffReason::Crisis, context())
        .await
        .unwrap();

    let summary = &outcome.ticket.conversation_summary;
    assert_eq!(summary.total_messages, 3);
    assert_eq!(summary.user_messages, 2);
    assert!(summary.topics.contains(&Category::Crisis));
    assert!(summary.recent_context.contains("don't want to be here"));
}

#[tokio::test]
async fn test_ticket_lifecycle() {
    let manager = HandoffManager::new(RecordingNotifier::new());
    let ticket_id = manager
        .initiate_human_handoff("user-1", "s", HandoffReason::Crisis, context())
        .await
        .unwrap()
        .ticket
        .ticket_id;

    // Completing before assignment is rejected
    match manager.complete_handoff(&ticket_id, "early") {
        Err(HandoffError::InvalidState { .. }) => {}
        other => panic!("expected InvalidState, got {:?}", other.map(|t| t.status)),
    }

    let assigned = manager
        .assign_handoff(&ticket_id, "counselor-7", "Jordan")
        .unwrap();
    assert_eq!(assigned.status, TicketStatus::Assigned);
    assert_eq!(assigned.assigned_to.as_deref(), Some("counselor-7"));
    assert!(manager.pending_tickets(None).is_empty());

    let completed = manager
        .complete_handoff(&ticket_id, "connected with local services")
        .unwrap();
    assert_eq!(completed.status, TicketStatus::Completed);
    assert_eq!(completed.outcome.as_deref(), Some("connected with local services"));

    let stats = manager.handoff_stats();
    assert_eq!(stats.completed, 1);
    assert_eq!(stats.pending, 0);
    assert_eq!(stats.active, 0);

    assert!(matches!(
        manager.assign_handoff("handoff_missing", "c", "C"),
        Err(HandoffError::TicketNotFound(_))
    ));
}

#[tokio::test]
async fn test_pending_tickets_ordered_by_priority() {
    let manager = HandoffManager::new(RecordingNotifier::new());
    for (user, reason) in [
        ("u1", HandoffReason::UserRequest),
        ("u2", HandoffReason::Crisis),
        ("u3", HandoffReason::ModerateCrisis),
    ] {
        manager
            .initiate_human_handoff(user, "s", reason, HandoffContext::default())
            .await
            .unwrap();
    }

    let priorities: Vec<Priority> = manager
        .pending_tickets(None)
        .into_iter()
        .map(|t| t.priority)
        .collect();
    assert_eq!(priorities, vec![Priority::Urgent, Priority::High, Priority::Medium]);
    assert_eq!(manager.pending_tickets(Some(Priority::High)).len(), 1);
}
