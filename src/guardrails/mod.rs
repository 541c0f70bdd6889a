//! Content-policy guardrails
//!
//! Two checks wrap the agent: a topic restriction on the user's message and
//! a reading-time limit on the generated reply. A rejection is not an HTTP
//! error; the chat handler answers with a canned reply and a guardrail
//! provenance label instead.

pub mod reading_time;
pub mod topic;

pub use reading_time::ReadingTimeGuardrail;
pub use topic::TopicGuardrail;

/// Outcome of a guardrail check
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Pass,
    Reject { reason: String },
}

impl Verdict {
    pub fn is_pass(&self) -> bool {
        matches!(self, Verdict::Pass)
    }

    pub fn reject<S: Into<String>>(reason: S) -> Self {
        Verdict::Reject {
            reason: reason.into(),
        }
    }
}
