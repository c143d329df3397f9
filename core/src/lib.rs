//! Natural-language front-end for the KYC admin API.
//!
//! A hosted model picks one of a fixed set of tools, [`dispatch`] runs it
//! against the admin backend and hands the formatted result back to the
//! model for the final answer.

pub mod backend;
pub mod config;
pub mod conversation;
pub mod dates;
pub mod dispatch;
pub mod formatters;
pub mod llm;
pub mod registry;

pub use backend::{AdminApi, HttpAdminApi};
pub use config::AppConfig;
pub use conversation::{Part, Turn};
pub use dispatch::{ChatOutcome, Orchestrator};
pub use llm::{build_model, ModelReply, ModelService};
pub use registry::{Registry, ToolName, ToolRecord};
