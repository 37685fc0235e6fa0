//! Poll data types.
//!
//! All types here serialise to the wire schema used by the frontend, e.g.
//! questions as `{"id", "q", "a", "b", "created_at"}`. The same shapes are
//! persisted by the JSON store.

use serde::{Deserialize, Serialize};

pub mod question;
pub mod results;
pub mod vote;

pub use question::{NewQuestion, Question, QuestionId, QuestionPatch};
pub use results::ResultSummary;
pub use vote::{Choice, Vote, VoteRequest};

/// Acknowledgement body for operations that return no record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    pub success: bool,
    pub message: String,
}

impl Ack {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}
