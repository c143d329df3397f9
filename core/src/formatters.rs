//! Backend records rendered as chat text.
//!
//! The wording here is what the model sees as a tool result and usually
//! echoes back to the admin, so it stays stable.

use serde_json::Value;

use crate::backend::{AccountSummary, ApplicantSummary, DashboardStats};

pub const NEED_CUSTOMER: &str = "You need to find a customer first.";

fn display(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => "N/A".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn or_na<T: ToString>(value: &Option<T>) -> String {
    value.as_ref().map(ToString::to_string).unwrap_or_else(|| "N/A".to_string())
}

fn object<'a>(data: &'a Value, key: &str) -> Option<&'a Value> {
    data.get(key).filter(|v| v.is_object())
}

// Customer record when present, otherwise the KYC application
fn person(data: &Value) -> Option<&Value> {
    object(data, "customer").or_else(|| object(data, "kycApplication"))
}

pub fn format_registration_list(registrations: &[ApplicantSummary], date_query: &str) -> String {
    if registrations.is_empty() {
        return format!("No new customers registered on {date_query}.");
    }
    let mut lines = vec![format!("Here are the customers who registered on {date_query}:")];
    lines.extend(
        registrations
            .iter()
            .map(|r| format!("- {} (Application ID: {})", r.full_name, r.id)),
    );
    lines.join("\n")
}

pub fn format_account_list(accounts: &[AccountSummary], date_query: &str) -> String {
    if accounts.is_empty() {
        return format!("No new accounts were created on {date_query}.");
    }
    let mut lines = vec![format!("Here are the accounts created on {date_query}:")];
    lines.extend(accounts.iter().map(|a| {
        format!(
            "- Account #{} ({}) for Customer ID: {}",
            or_na(&a.account_number),
            or_na(&a.account_type),
            or_na(&a.customer_id)
        )
    }));
    lines.join("\n")
}

/// Full KYC and account summary for a search hit.
///
/// A payload without a `kycApplication` object reads as "not found", even
/// when a bare customer record is present.
pub fn format_full_details(data: &Value, search_term: &str) -> String {
    let Some(application) = object(data, "kycApplication") else {
        return format!("I could not find any customer or applicant matching '{search_term}'.");
    };
    let customer = object(data, "customer").unwrap_or(application);
    let account = object(data, "account");
    let kyc_status = customer.get("kycStatus");

    let mut lines = vec![
        format!(
            "Found details for **{}** (Application ID: {}):",
            display(customer.get("fullName")),
            display(application.get("id"))
        ),
        format!("- **KYC Status:** {}", display(kyc_status)),
        format!("- **PAN:** {}", display(customer.get("pan"))),
        format!("- **Aadhaar:** {}", display(customer.get("aadhaar"))),
        format!("- **Phone:** {}", display(customer.get("phone"))),
    ];

    if let Some(account) = account {
        lines.push("\n**Account Information:**".to_string());
        lines.push(format!("- **Account Status:** {}", display(account.get("accountStatus"))));
        lines.push(format!("- **Account Number:** {}", display(account.get("accountNumber"))));
    } else if kyc_status.and_then(Value::as_str) == Some("VERIFIED") {
        lines.push(
            "\n**Account Information:** This customer is verified, but their bank account has not been created yet."
                .to_string(),
        );
    } else {
        lines.push("\nThis applicant does not have a bank account yet.".to_string());
    }

    lines.join("\n")
}

pub fn format_specific_detail(data: &Value, key: &str, label: &str) -> String {
    let Some(customer) = person(data) else {
        return NEED_CUSTOMER.to_string();
    };
    let name = display(customer.get("fullName"));
    match customer.get(key) {
        Some(Value::String(s)) if !s.is_empty() => format!("The {label} for {name} is: **{s}**"),
        Some(value @ (Value::Number(_) | Value::Bool(true))) => {
            format!("The {label} for {name} is: **{value}**")
        }
        _ => format!("I could not find the {label} for {name}."),
    }
}

pub fn format_nominee_details(data: &Value) -> String {
    let Some(customer) = person(data) else {
        return NEED_CUSTOMER.to_string();
    };
    let name = display(customer.get("fullName"));
    let nominee_name = customer
        .get("nominee")
        .filter(|n| n.is_object())
        .and_then(|n| n.get("name").and_then(Value::as_str).filter(|s| !s.is_empty()).map(|s| (n, s)));

    match nominee_name {
        Some((nominee, nominee_name)) => format!(
            "The nominee for {name} is **{nominee_name}** (Phone: {}).",
            display(nominee.get("mobile"))
        ),
        None => format!("{name} has not registered a nominee."),
    }
}

pub fn format_dashboard_stats(stats: &DashboardStats) -> String {
    format!(
        "Stats: Total: {}, Pending: {}, Verified: {}, Rejected: {}.",
        stats.total, stats.pending, stats.verified, stats.rejected
    )
}

pub fn format_applicants_by_status(applicants: &[ApplicantSummary], status: &str) -> String {
    if applicants.is_empty() {
        return format!("No applicants found with status '{status}'.");
    }
    let names: Vec<String> = applicants
        .iter()
        .map(|a| format!("- {} (ID: {})", a.full_name, a.id))
        .collect();
    format!("Found applicants with status '{status}':\n{}", names.join("\n"))
}
