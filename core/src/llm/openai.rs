use std::collections::VecDeque;

use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionMessageToolCall, ChatCompletionRequestAssistantMessageArgs,
        ChatCompletionRequestMessage, ChatCompletionRequestToolMessageArgs,
        ChatCompletionRequestUserMessageArgs, ChatCompletionResponseMessage, ChatCompletionTool,
        ChatCompletionToolArgs, ChatCompletionToolType, CreateChatCompletionRequestArgs,
        FunctionCall as ToolFunction, FunctionObjectArgs,
    },
    Client,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde_json::{json, Map, Value};
use tracing::{debug, info};

use super::{ModelError, ModelReply, ModelService};
use crate::config::ModelConfig;
use crate::conversation::{FunctionCall, FunctionResponse, Part, Turn, ROLE_MODEL};
use crate::registry::ToolRecord;

pub struct OpenAiBrain {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiBrain {
    pub fn new(config: &ModelConfig) -> Self {
        let mut openai = OpenAIConfig::new().with_api_key(config.api_key.expose_secret());
        if let Some(base) = &config.api_base {
            openai = openai.with_api_base(base);
        }
        let client = Client::with_config(openai);

        info!(model = %config.model, "OpenAI brain configured");
        Self { client, model: config.model.clone() }
    }
}

#[async_trait]
impl ModelService for OpenAiBrain {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn probe(&self) -> Result<String> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages([ChatCompletionRequestMessage::User(
                ChatCompletionRequestUserMessageArgs::default()
                    .content("Hello! Reply with 'System Online'.")
                    .build()?,
            )])
            .build()?;

        let response = self.client.chat().create(request).await?;
        Ok(response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .unwrap_or_default())
    }

    async fn generate(&self, tools: &[ToolRecord], contents: &[Turn]) -> Result<ModelReply> {
        let messages = to_messages(contents)?;
        debug!(model = %self.model, messages = messages.len(), "sending chat completion");

        let mut request = CreateChatCompletionRequestArgs::default();
        request.model(&self.model).messages(messages);
        if !tools.is_empty() {
            request.tools(to_tools(tools)?);
        }

        let response = self.client.chat().create(request.build()?).await?;
        let choice = response.choices.into_iter().next().ok_or_else(|| ModelError::NoCandidates {
            reason: "no choices".to_string(),
        })?;

        Ok(ModelReply::new(from_message(choice.message)))
    }
}

// Registry tools -> OpenAI tools. Context-only tools still need an object schema.
fn to_tools(tools: &[ToolRecord]) -> Result<Vec<ChatCompletionTool>> {
    tools
        .iter()
        .map(|t| {
            let parameters = t
                .parameters
                .clone()
                .unwrap_or_else(|| json!({ "type": "object", "properties": {} }));
            let function = FunctionObjectArgs::default()
                .name(&t.name)
                .description(&t.description)
                .parameters(parameters)
                .build()?;
            ChatCompletionToolArgs::default()
                .r#type(ChatCompletionToolType::Function)
                .function(function)
                .build()
                .with_context(|| format!("invalid tool declaration '{}'", t.name))
        })
        .collect()
}

/// Flattens turns into chat messages.
///
/// Our history carries no call ids, so they are minted here in order and a
/// function response is bound to the oldest unanswered call of the same name.
fn to_messages(contents: &[Turn]) -> Result<Vec<ChatCompletionRequestMessage>> {
    let mut messages: Vec<ChatCompletionRequestMessage> = Vec::new();
    let mut pending: VecDeque<(String, String)> = VecDeque::new();
    let mut next_id = 0usize;

    for turn in contents {
        let mut texts = Vec::new();
        let mut calls = Vec::new();

        for part in &turn.parts {
            match part {
                Part::Text(text) => texts.push(text.as_str()),
                Part::FunctionCall(call) => {
                    let id = format!("call_{next_id}");
                    next_id += 1;
                    pending.push_back((call.name.clone(), id.clone()));
                    calls.push(ChatCompletionMessageToolCall {
                        id,
                        r#type: ChatCompletionToolType::Function,
                        function: ToolFunction {
                            name: call.name.clone(),
                            arguments: Value::Object(call.args.clone()).to_string(),
                        },
                    });
                }
                Part::FunctionResponse(FunctionResponse { name, response }) => {
                    let payload =
                        json!({ "result": response.result, "data": response.data }).to_string();
                    match pending.iter().position(|(pending_name, _)| pending_name == name) {
                        Some(index) => {
                            let (_, id) = pending.remove(index).unwrap_or_default();
                            messages.push(
                                ChatCompletionRequestToolMessageArgs::default()
                                    .tool_call_id(id)
                                    .content(payload)
                                    .build()?
                                    .into(),
                            );
                        }
                        None => messages.push(
                            ChatCompletionRequestUserMessageArgs::default()
                                .content(format!("Result of {name}: {payload}"))
                                .build()?
                                .into(),
                        ),
                    }
                }
            }
        }

        let text = texts.concat();
        if turn.role == ROLE_MODEL {
            if text.is_empty() && calls.is_empty() {
                continue;
            }
            let mut assistant = ChatCompletionRequestAssistantMessageArgs::default();
            if !text.is_empty() {
                assistant.content(text);
            }
            if !calls.is_empty() {
                assistant.tool_calls(calls);
            }
            messages.push(assistant.build()?.into());
        } else if !text.is_empty() {
            messages.push(ChatCompletionRequestUserMessageArgs::default().content(text).build()?.into());
        }
    }

    Ok(messages)
}

fn from_message(message: ChatCompletionResponseMessage) -> Turn {
    let mut parts = Vec::new();

    // Only the first call is honoured downstream, keep it first
    if let Some(call) = message.tool_calls.and_then(|calls| calls.into_iter().next()) {
        let args = match serde_json::from_str::<Value>(&call.function.arguments) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };
        parts.push(Part::FunctionCall(FunctionCall { name: call.function.name, args }));
    }
    if let Some(text) = message.content.filter(|t| !t.is_empty()) {
        parts.push(Part::Text(text));
    }

    Turn::new(ROLE_MODEL, parts)
}
