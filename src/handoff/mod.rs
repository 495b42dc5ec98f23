// Human handoff
// Ticketed transfer from automated support to a human counselor

mod manager;
mod types;

pub use manager::HandoffManager;
pub use types::{
    determine_priority, extract_key_issues, ConversationSummary, ConversationTurn, HandoffContext,
    HandoffDisplayMode, HandoffOutcome, HandoffReason, HandoffStats, HandoffTicket, Priority,
    TicketStatus, TurnRole,
};
