use std::fmt;
use std::str::FromStr;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// The catalog ships inside the binary; there is no per-deployment tool list.
const CATALOG: &str = include_str!("../catalog/tools.json");

// The shape of one entry in catalog/tools.json
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolRecord {
    pub name: String,
    pub description: String,

    // JSON Schema for the arguments. Context-only tools take none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,
}

/// Every tool the orchestrator knows how to run.
///
/// A catalog entry without a matching variant is rejected at load time, so
/// the model is never offered a tool that dispatch cannot handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolName {
    GetCustomerAndAccountDetails,
    GetPan,
    GetAadhaar,
    GetNomineeDetails,
    GetDashboardStatistics,
    ListApplicantsByKycStatus,
    ListRegistrationsByDate,
    ListAccountsCreatedByDate,
}

impl ToolName {
    pub const ALL: [ToolName; 8] = [
        ToolName::GetCustomerAndAccountDetails,
        ToolName::GetPan,
        ToolName::GetAadhaar,
        ToolName::GetNomineeDetails,
        ToolName::GetDashboardStatistics,
        ToolName::ListApplicantsByKycStatus,
        ToolName::ListRegistrationsByDate,
        ToolName::ListAccountsCreatedByDate,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ToolName::GetCustomerAndAccountDetails => "get_customer_and_account_details",
            ToolName::GetPan => "get_pan",
            ToolName::GetAadhaar => "get_aadhaar",
            ToolName::GetNomineeDetails => "get_nominee_details",
            ToolName::GetDashboardStatistics => "get_dashboard_statistics",
            ToolName::ListApplicantsByKycStatus => "list_applicants_by_kyc_status",
            ToolName::ListRegistrationsByDate => "list_registrations_by_date",
            ToolName::ListAccountsCreatedByDate => "list_accounts_created_by_date",
        }
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown tool '{0}'")]
pub struct UnknownTool(pub String);

impl FromStr for ToolName {
    type Err = UnknownTool;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        ToolName::ALL
            .into_iter()
            .find(|tool| tool.as_str() == name)
            .ok_or_else(|| UnknownTool(name.to_string()))
    }
}

pub struct Registry;

impl Registry {
    // Parses the embedded catalog and returns the tools in declaration order
    pub fn load() -> Result<Vec<ToolRecord>> {
        Self::parse(CATALOG)
    }

    pub fn parse(content: &str) -> Result<Vec<ToolRecord>> {
        let tools: Vec<ToolRecord> =
            serde_json::from_str(content).context("tool catalog is not valid JSON")?;

        // Descriptor and dispatch branch must exist together
        for tool in &tools {
            tool.name
                .parse::<ToolName>()
                .with_context(|| format!("catalog entry '{}' has no dispatch branch", tool.name))?;
        }

        Ok(tools)
    }
}
