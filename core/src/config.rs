use std::env;
use std::str::FromStr;

use secrecy::SecretString;
use thiserror::Error;

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o";
pub const DEFAULT_GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_BACKEND_BASE_URL: &str = "http://localhost:8080/api/chatbot";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub model: ModelConfig,
    pub backend: BackendConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct ModelConfig {
    pub provider: ModelProvider,
    pub api_key: SecretString,
    pub model: String,
    /// Overrides the provider's default endpoint.
    pub api_base: Option<String>,
}

#[derive(Clone, Debug)]
pub struct BackendConfig {
    pub base_url: String,
    pub username: String,
    pub password: SecretString,
    /// `None` leaves outbound calls without a deadline.
    pub timeout_secs: Option<u64>,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub cors_origin: String,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModelProvider {
    Gemini,
    OpenAi,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("invalid value for `{key}`: `{value}` ({reason})")]
    Invalid { key: &'static str, value: String, reason: String },
}

impl FromStr for ModelProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "gemini" | "google" => Ok(Self::Gemini),
            "openai" => Ok(Self::OpenAi),
            other => Err(ConfigError::Invalid {
                key: "MODEL_PROVIDER",
                value: other.to_string(),
                reason: "expected gemini|openai".to_string(),
            }),
        }
    }
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Invalid {
                key: "LOG_FORMAT",
                value: other.to_string(),
                reason: "expected compact|pretty|json".to_string(),
            }),
        }
    }
}

impl ModelProvider {
    fn key_var(self) -> &'static str {
        match self {
            Self::Gemini => "GOOGLE_API_KEY",
            Self::OpenAi => "OPENAI_API_KEY",
        }
    }

    fn default_model(self) -> &'static str {
        match self {
            Self::Gemini => DEFAULT_GEMINI_MODEL,
            Self::OpenAi => DEFAULT_OPENAI_MODEL,
        }
    }
}

impl AppConfig {
    /// Reads the process environment, after loading `.env` if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let provider = match get("MODEL_PROVIDER") {
            Some(value) => value.parse()?,
            None => ModelProvider::Gemini,
        };
        let api_key = get(provider.key_var()).ok_or(ConfigError::Missing(provider.key_var()))?;
        let api_base = match provider {
            ModelProvider::Gemini => {
                Some(get("GEMINI_API_BASE").unwrap_or_else(|| DEFAULT_GEMINI_API_BASE.to_string()))
            }
            ModelProvider::OpenAi => get("OPENAI_API_BASE"),
        };

        let timeout_secs = match get("BACKEND_TIMEOUT_SECS") {
            Some(raw) => Some(raw.parse::<u64>().map_err(|e| ConfigError::Invalid {
                key: "BACKEND_TIMEOUT_SECS",
                value: raw.clone(),
                reason: e.to_string(),
            })?),
            None => None,
        };

        let format = match get("LOG_FORMAT") {
            Some(value) => value.parse()?,
            None => LogFormat::Compact,
        };

        Ok(Self {
            model: ModelConfig {
                provider,
                api_key: SecretString::from(api_key),
                model: get("MODEL_NAME").unwrap_or_else(|| provider.default_model().to_string()),
                api_base,
            },
            backend: BackendConfig {
                base_url: get("BACKEND_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_BACKEND_BASE_URL.to_string()),
                username: get("BACKEND_USERNAME").unwrap_or_else(|| "internal-user".to_string()),
                password: SecretString::from(
                    get("BACKEND_PASSWORD").unwrap_or_else(|| "internal-password".to_string()),
                ),
                timeout_secs,
            },
            server: ServerConfig {
                bind_address: get("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0:5000".to_string()),
                cors_origin: get("CORS_ORIGIN")
                    .unwrap_or_else(|| "http://localhost:8080".to_string()),
            },
            logging: LoggingConfig {
                level: get("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
                format,
            },
        })
    }
}
