//! The per-request chat flow: ask the model, run at most one tool, ask again.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{info, warn};

use crate::backend::{
    AccountSummary, AdminApi, ApplicantSummary, BackendError, DashboardStats,
};
use crate::conversation::{
    customer_context, serialize_history, ChatSession, FunctionCall, FunctionResponse, Part,
    ToolResult, Turn, ROLE_FUNCTION, ROLE_USER,
};
use crate::dates::resolve_date;
use crate::formatters::{
    format_account_list, format_applicants_by_status, format_dashboard_stats,
    format_full_details, format_nominee_details, format_registration_list, format_specific_detail,
};
use crate::llm::ModelService;
use crate::registry::{ToolName, ToolRecord};

pub const SEARCH_FIRST: &str =
    "You need to find a customer first. Please ask me to search for someone.";

#[derive(Debug, Clone, PartialEq)]
pub struct ChatOutcome {
    pub response: String,
    pub history: Vec<Turn>,
}

pub struct Orchestrator {
    model: Arc<dyn ModelService>,
    backend: Arc<dyn AdminApi>,
    tools: Arc<Vec<ToolRecord>>,
}

impl Orchestrator {
    pub fn new(
        model: Arc<dyn ModelService>,
        backend: Arc<dyn AdminApi>,
        tools: Arc<Vec<ToolRecord>>,
    ) -> Self {
        Self { model, backend, tools }
    }

    pub fn tools(&self) -> &[ToolRecord] {
        &self.tools
    }

    pub fn model_name(&self) -> &str {
        self.model.model_name()
    }

    /// Runs one user utterance against the replayed history.
    ///
    /// Missing records and missing context come back as ordinary answers;
    /// an `Err` means the model, or the backend's JSON, failed outright.
    pub async fn chat(&self, query: &str, history: Vec<Turn>) -> Result<ChatOutcome> {
        let history = serialize_history(history);
        let context = customer_context(&history).cloned();
        let mut session = ChatSession::start(self.model.as_ref(), &self.tools, history);

        let reply = session.send(ROLE_USER, vec![Part::Text(query.to_string())]).await?;

        let response = match reply.function_call() {
            Some(call) => {
                info!(tool = %call.name, "Brain decided to call tool");
                let result = self.run_tool(call, context.as_ref()).await?;
                let part = Part::FunctionResponse(FunctionResponse {
                    name: call.name.clone(),
                    response: result,
                });

                let follow_up = session.send(ROLE_FUNCTION, vec![part]).await?;
                follow_up.text()
            }
            None => {
                info!("Brain answered without a tool");
                reply.text()
            }
        };

        let response = response.ok_or_else(|| anyhow!("model returned no text"))?;
        Ok(ChatOutcome { response, history: serialize_history(session.into_history()) })
    }

    /// Executes one tool call and renders its result.
    pub async fn run_tool(&self, call: &FunctionCall, context: Option<&Value>) -> Result<ToolResult> {
        let tool = match call.name.parse::<ToolName>() {
            Ok(tool) => tool,
            Err(unknown) => {
                warn!(tool = %call.name, "Brain requested a tool that is not in the catalog");
                return Ok(text_only(format!("The tool '{}' is not available. Answer without it.", unknown.0)));
            }
        };

        let result = match tool {
            ToolName::GetCustomerAndAccountDetails => {
                let term = call.str_arg("search_term").unwrap_or_default();
                match self.backend.search_customer(term).await? {
                    Some(data) => ToolResult {
                        result: Some(format_full_details(&data, term)),
                        data: Some(data),
                    },
                    None => text_only(format!("I could not find anyone matching '{term}'.")),
                }
            }

            ToolName::GetPan | ToolName::GetAadhaar | ToolName::GetNomineeDetails => {
                let Some(customer) = context else {
                    return Ok(text_only(SEARCH_FIRST.to_string()));
                };
                let text = match tool {
                    ToolName::GetPan => format_specific_detail(customer, "pan", "PAN number"),
                    ToolName::GetAadhaar => {
                        format_specific_detail(customer, "aadhaar", "Aadhaar number")
                    }
                    _ => format_nominee_details(customer),
                };
                ToolResult { result: Some(text), data: Some(customer.clone()) }
            }

            ToolName::GetDashboardStatistics => match self.backend.dashboard_stats().await? {
                Some(raw) => {
                    let stats: DashboardStats = decode("/admin/dashboard-stats", raw)?;
                    text_only(format_dashboard_stats(&stats))
                }
                None => text_only("Sorry, I could not retrieve the dashboard statistics.".to_string()),
            },

            ToolName::ListApplicantsByKycStatus => {
                let Some(status) = call.str_arg("kyc_status").map(str::to_uppercase) else {
                    return Ok(text_only(
                        "Please tell me which KYC status to list: PENDING, VERIFIED or REJECTED."
                            .to_string(),
                    ));
                };
                match self.backend.list_by_kyc(&status).await? {
                    Some(raw) => {
                        let applicants: Vec<ApplicantSummary> = decode("/admin/list-by-kyc", raw)?;
                        text_only(format_applicants_by_status(&applicants, &status))
                    }
                    None => text_only(format!(
                        "Sorry, I could not retrieve applicants with status '{status}'."
                    )),
                }
            }

            ToolName::ListRegistrationsByDate | ToolName::ListAccountsCreatedByDate => {
                let date_query = call.str_arg("date_query").unwrap_or("today").to_lowercase();
                let date = resolve_date(&date_query);
                info!(%date_query, %date, "resolved date query");

                let raw = if tool == ToolName::ListRegistrationsByDate {
                    self.backend.registrations_on_date(date).await?
                } else {
                    self.backend.accounts_created_on_date(date).await?
                };

                match raw {
                    Some(raw) if tool == ToolName::ListRegistrationsByDate => {
                        let rows: Vec<ApplicantSummary> =
                            decode("/admin/registrations-on-date", raw)?;
                        text_only(format_registration_list(&rows, &date_query))
                    }
                    Some(raw) => {
                        let rows: Vec<AccountSummary> =
                            decode("/admin/accounts-created-on-date", raw)?;
                        text_only(format_account_list(&rows, &date_query))
                    }
                    None => text_only(format!("Sorry, I could not retrieve the list for {date_query}.")),
                }
            }
        };

        Ok(result)
    }
}

fn text_only(text: String) -> ToolResult {
    ToolResult { result: Some(text), data: None }
}

fn decode<T: DeserializeOwned>(endpoint: &str, raw: Value) -> Result<T, BackendError> {
    serde_json::from_value(raw)
        .map_err(|source| BackendError::Decode { endpoint: endpoint.to_string(), source })
}
