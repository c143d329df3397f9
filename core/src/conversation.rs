//! Conversation history as exchanged with the chat front-end.
//!
//! The service keeps no session store. The client sends the history it got
//! back from the previous turn, we replay it into a fresh model session, and
//! return the grown history in the same wire shape.

use anyhow::Result;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::llm::{ModelReply, ModelService};
use crate::registry::{ToolName, ToolRecord};

pub const ROLE_USER: &str = "user";
pub const ROLE_MODEL: &str = "model";
pub const ROLE_FUNCTION: &str = "function";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    #[serde(default = "default_role", deserialize_with = "role_or_default")]
    pub role: String,
    #[serde(default, deserialize_with = "lenient_parts")]
    pub parts: Vec<Part>,
}

impl Turn {
    pub fn new(role: impl Into<String>, parts: Vec<Part>) -> Self {
        Self { role: role.into(), parts }
    }

    pub fn user_text(text: impl Into<String>) -> Self {
        Self::new(ROLE_USER, vec![Part::Text(text.into())])
    }
}

/// The smallest unit of a turn. Serialises as `{"text": ..}`,
/// `{"function_call": {..}}` or `{"function_response": {..}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Part {
    Text(String),
    FunctionCall(FunctionCall),
    FunctionResponse(FunctionResponse),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "object_or_empty")]
    pub args: Map<String, Value>,
}

impl FunctionCall {
    pub fn str_arg(&self, key: &str) -> Option<&str> {
        self.args.get(key).and_then(Value::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionResponse {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub response: ToolResult,
}

/// What a tool hands back to the model: display text plus the raw record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub data: Option<Value>,
}

fn default_role() -> String {
    ROLE_MODEL.to_string()
}

fn role_or_default<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let role = Option::<String>::deserialize(deserializer)?;
    Ok(role.filter(|r| !r.is_empty()).unwrap_or_else(default_role))
}

fn object_or_empty<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Map<String, Value>, D::Error> {
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    })
}

// Incoming parts may carry stray keys or several variants at once.
#[derive(Deserialize)]
struct RawPart {
    #[serde(default)]
    text: Option<String>,
    #[serde(default, alias = "functionCall")]
    function_call: Option<FunctionCall>,
    #[serde(default, alias = "functionResponse")]
    function_response: Option<FunctionResponse>,
}

impl RawPart {
    fn into_part(self) -> Option<Part> {
        if let Some(call) = self.function_call {
            return Some(Part::FunctionCall(call));
        }
        if let Some(response) = self.function_response {
            return Some(Part::FunctionResponse(response));
        }
        self.text.map(Part::Text)
    }
}

fn lenient_parts<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Part>, D::Error> {
    let raw = Option::<Vec<Option<RawPart>>>::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .flatten()
        .filter_map(RawPart::into_part)
        .collect())
}

/// Deserialises a history array, skipping `null` entries.
pub fn lenient_history<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Turn>, D::Error> {
    let raw = Option::<Vec<Option<Turn>>>::deserialize(deserializer)?;
    Ok(raw.unwrap_or_default().into_iter().flatten().collect())
}

/// Normalises a history into the exact shape the model accepts on replay.
///
/// Roles mentioning "user" collapse to `user`, empty or nameless parts are
/// dropped, `data` survives only when it is a JSON object, and turns left
/// with no parts disappear entirely.
pub fn serialize_history(history: Vec<Turn>) -> Vec<Turn> {
    history
        .into_iter()
        .filter_map(|turn| {
            let role = if turn.role.to_lowercase().contains(ROLE_USER) {
                ROLE_USER.to_string()
            } else if turn.role.is_empty() {
                default_role()
            } else {
                turn.role
            };

            let parts: Vec<Part> = turn.parts.into_iter().filter_map(normalize_part).collect();
            (!parts.is_empty()).then_some(Turn { role, parts })
        })
        .collect()
}

fn normalize_part(part: Part) -> Option<Part> {
    match part {
        Part::FunctionCall(call) if !call.name.is_empty() => Some(Part::FunctionCall(call)),
        Part::FunctionResponse(FunctionResponse { name, response }) if !name.is_empty() => {
            let data = response.data.filter(Value::is_object);
            Some(Part::FunctionResponse(FunctionResponse {
                name,
                response: ToolResult { result: response.result, data },
            }))
        }
        Part::Text(text) if !text.is_empty() => Some(Part::Text(text)),
        _ => None,
    }
}

/// The last customer record fetched in this conversation, if any.
///
/// Walks the history backwards; a failed lookup (no `data`) does not hide an
/// earlier successful one.
pub fn customer_context(history: &[Turn]) -> Option<&Value> {
    let lookup = ToolName::GetCustomerAndAccountDetails.as_str();
    history
        .iter()
        .rev()
        .flat_map(|turn| turn.parts.iter().rev())
        .find_map(|part| match part {
            Part::FunctionResponse(fr) if fr.name == lookup => {
                fr.response.data.as_ref().filter(|d| d.is_object())
            }
            _ => None,
        })
}

/// One request's worth of conversation with the model.
pub struct ChatSession<'a> {
    model: &'a dyn ModelService,
    tools: &'a [ToolRecord],
    history: Vec<Turn>,
}

impl<'a> ChatSession<'a> {
    pub fn start(model: &'a dyn ModelService, tools: &'a [ToolRecord], history: Vec<Turn>) -> Self {
        Self { model, tools, history }
    }

    // Appends the outgoing turn, asks the model, records its reply
    pub async fn send(&mut self, role: &str, parts: Vec<Part>) -> Result<ModelReply> {
        self.history.push(Turn::new(role, parts));
        let reply = self.model.generate(self.tools, &self.history).await?;
        self.history.push(reply.content.clone());
        Ok(reply)
    }

    pub fn history(&self) -> &[Turn] {
        &self.history
    }

    pub fn into_history(self) -> Vec<Turn> {
        self.history
    }
}
