//! Read-only client for the KYC admin API.

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::BackendConfig;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("failed to build backend client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("backend returned malformed JSON from {endpoint}: {source}")]
    Decode {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Admin endpoints the chat tools read from.
///
/// `Ok(None)` means the backend had nothing usable: a non-200 status, an
/// empty body, or no answer at all. Only a 200 with an undecodable body is
/// an error.
#[async_trait]
pub trait AdminApi: Send + Sync {
    async fn search_customer(&self, keyword: &str) -> Result<Option<Value>, BackendError>;
    async fn dashboard_stats(&self) -> Result<Option<Value>, BackendError>;
    async fn list_by_kyc(&self, status: &str) -> Result<Option<Value>, BackendError>;
    async fn registrations_on_date(&self, date: NaiveDate) -> Result<Option<Value>, BackendError>;
    async fn accounts_created_on_date(&self, date: NaiveDate)
        -> Result<Option<Value>, BackendError>;
}

// ── Record shapes ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicantSummary {
    pub id: i64,
    pub full_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountSummary {
    #[serde(default)]
    pub account_number: Option<String>,
    #[serde(default)]
    pub account_type: Option<String>,
    #[serde(default)]
    pub customer_id: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardStats {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub pending: u64,
    #[serde(default)]
    pub verified: u64,
    #[serde(default)]
    pub rejected: u64,
}

// ── HTTP implementation ─────────────────────────────────────────────────────

pub struct HttpAdminApi {
    client: Client,
    base_url: String,
    username: String,
    password: SecretString,
}

impl HttpAdminApi {
    pub fn new(config: &BackendConfig) -> Result<Self, BackendError> {
        let mut builder = Client::builder();
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder.build().map_err(BackendError::Client)?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }

    async fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<Option<Value>, BackendError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(endpoint = %path, "backend request");

        let response = match self
            .client
            .get(&url)
            .query(query)
            .basic_auth(&self.username, Some(self.password.expose_secret()))
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(endpoint = %path, error = %e, "backend unreachable");
                return Ok(None);
            }
        };

        let status = response.status();
        if status != StatusCode::OK {
            warn!(endpoint = %path, status = status.as_u16(), "backend returned no result");
            return Ok(None);
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                warn!(endpoint = %path, error = %e, "backend body could not be read");
                return Ok(None);
            }
        };
        if body.trim().is_empty() {
            return Ok(None);
        }

        serde_json::from_str(&body)
            .map(Some)
            .map_err(|source| BackendError::Decode { endpoint: path.to_string(), source })
    }
}

#[async_trait]
impl AdminApi for HttpAdminApi {
    async fn search_customer(&self, keyword: &str) -> Result<Option<Value>, BackendError> {
        self.get("/admin/search-customer", &[("keyword", keyword)]).await
    }

    async fn dashboard_stats(&self) -> Result<Option<Value>, BackendError> {
        self.get("/admin/dashboard-stats", &[]).await
    }

    async fn list_by_kyc(&self, status: &str) -> Result<Option<Value>, BackendError> {
        self.get("/admin/list-by-kyc", &[("status", status)]).await
    }

    async fn registrations_on_date(&self, date: NaiveDate) -> Result<Option<Value>, BackendError> {
        let date = date.format("%Y-%m-%d").to_string();
        self.get("/admin/registrations-on-date", &[("date", &date)]).await
    }

    async fn accounts_created_on_date(
        &self,
        date: NaiveDate,
    ) -> Result<Option<Value>, BackendError> {
        let date = date.format("%Y-%m-%d").to_string();
        self.get("/admin/accounts-created-on-date", &[("date", &date)]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn account_summary_tolerates_missing_fields() {
        let account: AccountSummary =
            serde_json::from_value(json!({"accountNumber": "SB1001", "balance": 10})).unwrap();
        assert_eq!(account.account_number.as_deref(), Some("SB1001"));
        assert_eq!(account.customer_id, None);
    }

    #[test]
    fn applicant_summary_reads_camel_case() {
        let applicant: ApplicantSummary =
            serde_json::from_value(json!({"id": 7, "fullName": "Meera Nair"})).unwrap();
        assert_eq!(applicant, ApplicantSummary { id: 7, full_name: "Meera Nair".into() });
    }
}
