// Support pipeline
// Entry point that ties classification, escalation and follow-up together

mod responder;
mod session;
mod support;

pub use responder::{generate_response, FAILURE_RESPONSE};
pub use session::{SessionManager, SupportSession, MAX_HISTORY};
pub use support::{
    ChatResponse, CrisisInfo, PipelineBuilder, ResponseMetadata, SessionInfo, SupportPipeline,
};
