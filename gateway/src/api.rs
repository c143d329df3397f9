use kycdesk_core::conversation::{lenient_history, Turn};
use serde::{Deserialize, Serialize};

// Input: the admin's utterance plus whatever history we returned last time
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub query: String,
    #[serde(default, deserialize_with = "lenient_history")]
    pub history: Vec<Turn>,
}

// Output: final answer, and the history to send back next turn.
// Failures carry only the message.
#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history: Option<Vec<Turn>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub model: String,
    pub tools: usize,
}
