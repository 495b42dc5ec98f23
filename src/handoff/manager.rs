// Human handoff manager
//
// Tickets move pending -> assigned -> completed. Pending tickets are served
// by priority, then in arrival order.

use anyhow::Result;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use super::types::{
    determine_priority, ConversationSummary, HandoffContext, HandoffDisplayMode, HandoffOutcome,
    HandoffReason, HandoffStats, HandoffTicket, Priority, TicketStatus,
};
use crate::crisis::SeverityLevel;
use crate::errors::HandoffError;
use crate::notify::{NotificationChannel, Notifier};

#[derive(Default)]
struct Queues {
    pending: VecDeque<HandoffTicket>,
    assigned: Vec<HandoffTicket>,
    completed: Vec<HandoffTicket>,
    /// user_id -> open ticket id
    active: HashMap<String, String>,
}

pub struct HandoffManager {
    queues: Mutex<Queues>,
    notifier: Arc<dyn Notifier>,
}

fn handoff_message(priority: Priority) -> String {
    let wait = priority.estimated_wait();
    match priority {
        Priority::Urgent => format!(
            "I want to make sure you get the best support right now. I'm connecting you with a \
             human crisis counselor immediately. A trained counselor will be with you in {wait} \
             and can see our conversation. While you wait, please call or text 988 (Suicide & \
             Crisis Lifeline), text HELLO to 741741, or call 911 if you're in immediate danger. \
             I'm here with you until the counselor arrives. How are you doing right now?"
        ),
        Priority::High => format!(
            "I want to make sure you get the support you deserve. I'm connecting you with a human \
             counselor who can provide more personalized help. They'll join in {wait} and can see \
             our conversation history. Is there anything you'd like me to pass along?"
        ),
        Priority::Medium => format!(
            "I think you'd benefit from talking with a human counselor who can provide more \
             specialized support. A counselor will reach out in {wait} and will have access to \
             our conversation. In the meantime, I'm still here to talk."
        ),
    }
}

fn channel_for(priority: Priority) -> NotificationChannel {
    match priority {
        Priority::Urgent => NotificationChannel::Emergency,
        Priority::High => NotificationChannel::Moderation,
        Priority::Medium => NotificationChannel::Support,
    }
}

impl HandoffManager {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self {
            queues: Mutex::new(Queues::default()),
            notifier,
        }
    }

    fn queues(&self) -> MutexGuard<'_, Queues> {
        self.queues.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Open a ticket and notify the team matching its priority
    ///
    /// Notification failure is logged and recorded on the ticket; the
    /// ticket is still created.
    pub async fn initiate_human_handoff(
        &self,
        user_id: &str,
        session_id: &str,
        reason: HandoffReason,
        context: HandoffContext,
    ) -> Result<HandoffOutcome> {
        let priority = determine_priority(reason);
        let summary = ConversationSummary::from_turns(&context.conversation);

        let mut ticket = HandoffTicket {
            ticket_id: format!("handoff_{}", uuid::Uuid::new_v4().simple()),
            user_id: user_id.to_string(),
            session_id: session_id.to_string(),
            reason,
            priority,
            conversation_summary: summary,
            status: TicketStatus::Pending,
            assigned_to: None,
            assigned_to_name: None,
            created_at: Utc::now(),
            assigned_at: None,
            completed_at: None,
            outcome: None,
            duration_minutes: None,
            estimated_wait: priority.estimated_wait().to_string(),
            notification_sent: false,
        };

        tracing::info!(
            user_id,
            ticket_id = %ticket.ticket_id,
            reason = ?reason,
            priority = %priority,
            estimated_wait = %ticket.estimated_wait,
            "Human handoff initiated"
        );

        let channel = channel_for(priority);
        let payload = serde_json::json!({
            "ticket_id": ticket.ticket_id,
            "user_id": user_id,
            "session_id": session_id,
            "reason": reason,
            "priority": priority,
            "estimated_wait": ticket.estimated_wait,
            "summary": ticket.conversation_summary,
        });

        match self.notifier.notify(channel, &payload).await {
            Ok(outcome) if outcome.success => ticket.notification_sent = true,
            Ok(outcome) => {
                tracing::warn!(ticket_id = %ticket.ticket_id, method = %outcome.method, "Handoff notification not delivered")
            }
            Err(e) => {
                tracing::warn!(ticket_id = %ticket.ticket_id, channel = %channel, error = %e, "Handoff notification failed")
            }
        }

        {
            let mut queues = self.queues();
            queues
                .active
                .insert(user_id.to_string(), ticket.ticket_id.clone());
            queues.pending.push_back(ticket.clone());
        }

        let crisis_resources = (priority == Priority::Urgent).then(|| SeverityLevel::Severe.tier().resources());
        let display_mode = if priority == Priority::Urgent {
            HandoffDisplayMode::HandoffUrgent
        } else {
            HandoffDisplayMode::HandoffNormal
        };

        Ok(HandoffOutcome {
            message: handoff_message(priority),
            estimated_wait: ticket.estimated_wait.clone(),
            ticket,
            crisis_resources,
            display_mode,
        })
    }

    /// Move a pending ticket to a counselor
    pub fn assign_handoff(
        &self,
        ticket_id: &str,
        counselor_id: &str,
        counselor_name: &str,
    ) -> Result<HandoffTicket, HandoffError> {
        let mut queues = self.queues();

        let Some(pos) = queues.pending.iter().position(|t| t.ticket_id == ticket_id) else {
            return Err(Self::missing_or_wrong_state(&queues, ticket_id, TicketStatus::Pending));
        };

        let Some(mut ticket) = queues.pending.remove(pos) else {
            return Err(HandoffError::TicketNotFound(ticket_id.to_string()));
        };
        ticket.status = TicketStatus::Assigned;
        ticket.assigned_to = Some(counselor_id.to_string());
        ticket.assigned_to_name = Some(counselor_name.to_string());
        ticket.assigned_at = Some(Utc::now());

        tracing::info!(ticket_id, counselor = counselor_name, "Handoff assigned");

        queues.assigned.push(ticket.clone());
        Ok(ticket)
    }

    /// Close an assigned ticket
    pub fn complete_handoff(&self, ticket_id: &str, outcome: &str) -> Result<HandoffTicket, HandoffError> {
        let mut queues = self.queues();

        let Some(pos) = queues.assigned.iter().position(|t| t.ticket_id == ticket_id) else {
            return Err(Self::missing_or_wrong_state(&queues, ticket_id, TicketStatus::Assigned));
        };

        let mut ticket = queues.assigned.remove(pos);
        let now = Utc::now();
        ticket.status = TicketStatus::Completed;
        ticket.completed_at = Some(now);
        ticket.outcome = Some(outcome.to_string());
        ticket.duration_minutes = Some((now - ticket.created_at).num_minutes());

        if queues.active.get(&ticket.user_id) == Some(&ticket.ticket_id) {
            queues.active.remove(&ticket.user_id);
        }

        tracing::info!(ticket_id, duration_minutes = ?ticket.duration_minutes, "Handoff completed");

        queues.completed.push(ticket.clone());
        Ok(ticket)
    }

    fn missing_or_wrong_state(queues: &Queues, ticket_id: &str, expected: TicketStatus) -> HandoffError {
        let actual = queues
            .pending
            .iter()
            .chain(queues.assigned.iter())
            .chain(queues.completed.iter())
            .find(|t| t.ticket_id == ticket_id)
            .map(|t| t.status);

        match actual {
            Some(actual) => HandoffError::InvalidState {
                ticket_id: ticket_id.to_string(),
                actual: actual.to_string(),
                expected: expected.to_string(),
            },
            None => HandoffError::TicketNotFound(ticket_id.to_string()),
        }
    }

    /// Pending tickets, most urgent first, FIFO within a priority
    pub fn pending_tickets(&self, priority: Option<Priority>) -> Vec<HandoffTicket> {
        let queues = self.queues();
        let mut tickets: Vec<HandoffTicket> = queues
            .pending
            .iter()
            .filter(|t| priority.map_or(true, |p| t.priority == p))
            .cloned()
            .collect();
        // Stable sort keeps arrival order within a priority
        tickets.sort_by_key(|t| t.priority);
        tickets
    }

    pub fn ticket(&self, ticket_id: &str) -> Option<HandoffTicket> {
        let queues = self.queues();
        queues
            .pending
            .iter()
            .chain(queues.assigned.iter())
            .chain(queues.completed.iter())
            .find(|t| t.ticket_id == ticket_id)
            .cloned()
    }

    pub fn handoff_stats(&self) -> HandoffStats {
        let queues = self.queues();

        let response_minutes: Vec<f64> = queues
            .completed
            .iter()
            .filter_map(|t| t.assigned_at.map(|at| (at - t.created_at).num_seconds() as f64 / 60.0))
            .collect();
        let avg_response_minutes = if response_minutes.is_empty() {
            None
        } else {
            Some(response_minutes.iter().sum::<f64>() / response_minutes.len() as f64)
        };

        let mut priority_breakdown: BTreeMap<String, usize> = [Priority::Urgent, Priority::High, Priority::Medium]
            .iter()
            .map(|p| (p.as_str().to_string(), 0))
            .collect();
        for ticket in queues.pending.iter().chain(queues.assigned.iter()) {
            *priority_breakdown
                .entry(ticket.priority.as_str().to_string())
                .or_insert(0) += 1;
        }

        HandoffStats {
            active: queues.active.len(),
            pending: queues.pending.len(),
            assigned: queues.assigned.len(),
            completed: queues.completed.len(),
            avg_response_minutes,
            priority_breakdown,
        }
    }

    pub fn reset(&self) {
        *self.queues() = Queues::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handoff::ConversationTurn;
    use crate::notify::LogNotifier;

    fn manager() -> HandoffManager {
        HandoffManager::new(Arc::new(LogNotifier))
    }

    #[tokio::test]
    async fn test_crisis_handoff_is_urgent() {
        let manager = manager();
        let outcome = manager
            .initiate_human_handoff("u1", "s1", HandoffReason::Crisis, HandoffContext::default())
            .await
            .unwrap();

        assert_eq!(outcome.ticket.priority, Priority::Urgent);
        assert_eq!(outcome.estimated_wait, "< 5 minutes");
        assert_eq!(outcome.display_mode, HandoffDisplayMode::HandoffUrgent);
        assert!(outcome.crisis_resources.is_some());
        assert!(outcome.message.contains("988"));
        assert!(outcome.ticket.notification_sent);
    }

    #[tokio::test]
    async fn test_lifecycle() {
        let manager = manager();
        let context = HandoffContext {
            conversation: vec![ConversationTurn::user("I keep arguing with my partner")],
        };
        let outcome = manager
            .initiate_human_handoff("u1", "s1", HandoffReason::UserRequest, context)
            .await
            .unwrap();
        let id = outcome.ticket.ticket_id.clone();
        assert!(outcome.crisis_resources.is_none());

        // Cannot complete before assignment
        let err = manager.complete_handoff(&id, "done").unwrap_err();
        assert!(matches!(err, HandoffError::InvalidState { .. }));

        let assigned = manager.assign_handoff(&id, "c1", "Dana").unwrap();
        assert_eq!(assigned.status, TicketStatus::Assigned);
        assert_eq!(assigned.assigned_to_name.as_deref(), Some("Dana"));

        let completed = manager.complete_handoff(&id, "resolved").unwrap();
        assert_eq!(completed.status, TicketStatus::Completed);
        assert_eq!(completed.duration_minutes, Some(0));

        let stats = manager.handoff_stats();
        assert_eq!(stats.active, 0);
        assert_eq!(stats.completed, 1);
        assert!(stats.avg_response_minutes.is_some());
    }

    #[test]
    fn test_unknown_ticket() {
        let manager = manager();
        assert!(matches!(
            manager.assign_handoff("nope", "c1", "Dana"),
            Err(HandoffError::TicketNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_pending_ordering() {
        let manager = manager();
        let medium = manager
            .initiate_human_handoff("u1", "s1", HandoffReason::UserRequest, HandoffContext::default())
            .await
            .unwrap();
        let high = manager
            .initiate_human_handoff("u2", "s2", HandoffReason::Escalating, HandoffContext::default())
            .await
            .unwrap();
        let urgent = manager
            .initiate_human_handoff("u3", "s3", HandoffReason::SelfHarm, HandoffContext::default())
            .await
            .unwrap();

        let ids: Vec<String> = manager
            .pending_tickets(None)
            .into_iter()
            .map(|t| t.ticket_id)
            .collect();
        assert_eq!(
            ids,
            vec![urgent.ticket.ticket_id, high.ticket.ticket_id, medium.ticket.ticket_id]
        );
        assert_eq!(manager.pending_tickets(Some(Priority::High)).len(), 1);
        assert_eq!(manager.handoff_stats().priority_breakdown["URGENT"], 1);
    }
}
