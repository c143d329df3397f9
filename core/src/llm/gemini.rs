//! Gemini `generateContent` over plain REST.
//!
//! Wire types stay private to this module. Function-result turns are sent
//! with role `user`, which is what the API expects for `functionResponse`
//! parts.

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, info};

use super::{ModelError, ModelReply, ModelService};
use crate::config::{ModelConfig, DEFAULT_GEMINI_API_BASE};
use crate::conversation::{FunctionCall, FunctionResponse, Part, Turn, ROLE_MODEL, ROLE_USER};
use crate::registry::ToolRecord;

pub struct GeminiBrain {
    client: Client,
    endpoint: String,
    api_key: SecretString,
    model: String,
}

impl GeminiBrain {
    pub fn new(config: &ModelConfig) -> Result<Self> {
        let base = config.api_base.as_deref().unwrap_or(DEFAULT_GEMINI_API_BASE);
        let endpoint = format!(
            "{}/models/{}:generateContent",
            base.trim_end_matches('/'),
            config.model
        );
        let client = Client::builder().build().map_err(ModelError::Request)?;

        info!(model = %config.model, "Gemini brain configured");
        Ok(Self {
            client,
            endpoint,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        })
    }

    async fn call(&self, request: &GenerateContentRequest<'_>) -> Result<Turn> {
        debug!(model = %self.model, turns = request.contents.len(), "sending generateContent");

        let response = self
            .client
            .post(&self.endpoint)
            .header("x-goog-api-key", self.api_key.expose_secret())
            .json(request)
            .send()
            .await
            .map_err(ModelError::Request)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ModelError::Status { status: status.as_u16(), body }.into());
        }

        let parsed: GenerateContentResponse = response.json().await.map_err(ModelError::Request)?;
        from_response(parsed)
    }
}

#[async_trait]
impl ModelService for GeminiBrain {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn probe(&self) -> Result<String> {
        let request = GenerateContentRequest {
            contents: to_wire(&[Turn::user_text("Hello! Reply with 'System Online'.")]),
            tools: Vec::new(),
        };
        let turn = self.call(&request).await?;
        Ok(ModelReply::new(turn).text().unwrap_or_default())
    }

    async fn generate(&self, tools: &[ToolRecord], contents: &[Turn]) -> Result<ModelReply> {
        let request = GenerateContentRequest {
            contents: to_wire(contents),
            tools: declarations(tools),
        };
        Ok(ModelReply::new(self.call(&request).await?))
    }
}

// ── Wire types ──────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<WireContent>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireTool<'a> {
    function_declarations: Vec<WireDeclaration<'a>>,
}

#[derive(Debug, Serialize)]
struct WireDeclaration<'a> {
    name: &'a str,
    description: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parameters: Option<&'a Value>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<WirePart>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WirePart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_call: Option<WireFunctionCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_response: Option<WireFunctionResponse>,
    #[serde(default, skip_serializing)]
    thought: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireFunctionCall {
    name: String,
    #[serde(default)]
    args: Option<Value>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireFunctionResponse {
    name: String,
    response: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<WireContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

// ── Conversion ──────────────────────────────────────────────────────────────

fn declarations(tools: &[ToolRecord]) -> Vec<WireTool<'_>> {
    if tools.is_empty() {
        return Vec::new();
    }
    vec![WireTool {
        function_declarations: tools
            .iter()
            .map(|t| WireDeclaration {
                name: &t.name,
                description: &t.description,
                parameters: t.parameters.as_ref(),
            })
            .collect(),
    }]
}

fn to_wire(contents: &[Turn]) -> Vec<WireContent> {
    contents
        .iter()
        .map(|turn| WireContent {
            role: Some((if turn.role == ROLE_MODEL { ROLE_MODEL } else { ROLE_USER }).to_string()),
            parts: turn.parts.iter().map(part_to_wire).collect(),
        })
        .filter(|content| !content.parts.is_empty())
        .collect()
}

fn part_to_wire(part: &Part) -> WirePart {
    match part {
        Part::Text(text) => WirePart { text: Some(text.clone()), ..Default::default() },
        Part::FunctionCall(call) => WirePart {
            function_call: Some(WireFunctionCall {
                name: call.name.clone(),
                args: Some(Value::Object(call.args.clone())),
            }),
            ..Default::default()
        },
        Part::FunctionResponse(FunctionResponse { name, response }) => WirePart {
            function_response: Some(WireFunctionResponse {
                name: name.clone(),
                response: json!({ "result": response.result, "data": response.data }),
            }),
            ..Default::default()
        },
    }
}

fn from_response(response: GenerateContentResponse) -> Result<Turn> {
    let Some(candidate) = response.candidates.into_iter().next() else {
        let reason = response
            .prompt_feedback
            .and_then(|f| f.block_reason)
            .unwrap_or_else(|| "empty response".to_string());
        return Err(ModelError::NoCandidates { reason }.into());
    };

    let Some(content) = candidate.content else {
        let reason = candidate.finish_reason.unwrap_or_else(|| "no content".to_string());
        return Err(ModelError::NoCandidates { reason }.into());
    };

    let parts = content
        .parts
        .into_iter()
        .filter(|p| p.thought != Some(true))
        .filter_map(|p| {
            if let Some(call) = p.function_call {
                let args = match call.args {
                    Some(Value::Object(map)) => map,
                    _ => Map::new(),
                };
                return Some(Part::FunctionCall(FunctionCall { name: call.name, args }));
            }
            p.text.map(Part::Text)
        })
        .collect();

    Ok(Turn::new(ROLE_MODEL, parts))
}
