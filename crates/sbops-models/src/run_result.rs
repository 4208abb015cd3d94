use serde::{Deserialize, Serialize};

use crate::message::Message;
use crate::usage::Usage;

/// Outcome of one agent run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunResult {
    /// The model's final text reply.
    pub output: String,
    /// Messages produced by this run, starting with the user prompt.
    /// Append these to the history to carry context into the next run.
    pub new_messages: Vec<Message>,
    /// Usage accumulated by the run, including delegated runs.
    pub usage: Usage,
}
