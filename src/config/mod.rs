// src/config/mod.rs
// Environment-driven configuration. Loaded once in main and passed down
// explicitly; nothing here is global.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Placeholder values that never count as a configured credential.
const INVALID_PLACEHOLDERS: &[&str] = &["placeholder", "placeholder_key", "changeme", "your_api_key_here"];

/// Static description of a reasoning provider the core knows how to reach.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderSpec {
    /// Lowercase id used by `LLM_PROVIDER` ("gemini", "openai", ...)
    pub id: &'static str,
    /// Display name used in diagnostics
    pub display: &'static str,
    pub key_var: &'static str,
    pub model_var: &'static str,
    pub default_model: &'static str,
    /// Chat-completions compatible endpoint root
    pub base_url: &'static str,
}

/// Known providers, in default fallback order.
pub const PROVIDERS: &[ProviderSpec] = &[
    ProviderSpec {
        id: "gemini",
        display: "Gemini",
        key_var: "GEMINI_API_KEY",
        model_var: "GEMINI_MODEL",
        default_model: "gemini-2.0-flash",
        base_url: "https://generativelanguage.googleapis.com/v1beta/openai",
    },
    ProviderSpec {
        id: "openai",
        display: "OpenAI",
        key_var: "OPENAI_API_KEY",
        model_var: "OPENAI_MODEL",
        default_model: "gpt-4o-mini",
        base_url: "https://api.openai.com/v1",
    },
    ProviderSpec {
        id: "claude",
        display: "Claude",
        key_var: "ANTHROPIC_API_KEY",
        model_var: "ANTHROPIC_MODEL",
        default_model: "claude-sonnet-4-5",
        base_url: "https://api.anthropic.com/v1",
    },
    ProviderSpec {
        id: "nvidia",
        display: "Nvidia",
        key_var: "NVIDIA_API_KEY",
        model_var: "NVIDIA_MODEL",
        default_model: "meta/llama-3.1-70b-instruct",
        base_url: "https://integrate.api.nvidia.com/v1",
    },
    ProviderSpec {
        id: "openrouter",
        display: "OpenRouter",
        key_var: "OPENROUTER_API_KEY",
        model_var: "OPENROUTER_MODEL",
        default_model: "openrouter/auto",
        base_url: "https://openrouter.ai/api/v1",
    },
];

/// Credential and model resolved for one provider.
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub spec: &'static ProviderSpec,
    /// Trimmed secret, possibly empty or a placeholder
    pub api_key: String,
    pub model: String,
}

impl ProviderSettings {
    pub fn is_configured(&self) -> bool {
        is_valid_secret(&self.api_key)
    }
}

pub fn normalize_secret(value: &str) -> &str {
    value.trim()
}

/// A secret counts only when it is non-blank and not a known placeholder.
pub fn is_valid_secret(value: &str) -> bool {
    let normalized = normalize_secret(value);
    !normalized.is_empty()
        && !INVALID_PLACEHOLDERS
            .iter()
            .any(|placeholder| placeholder.eq_ignore_ascii_case(normalized))
}

pub fn is_placeholder(value: &str) -> bool {
    let normalized = normalize_secret(value);
    INVALID_PLACEHOLDERS
        .iter()
        .any(|placeholder| placeholder.eq_ignore_ascii_case(normalized))
}

#[derive(Debug, Clone)]
pub struct CoreConfig {
    // ── Backends
    pub preferred_provider: String,
    pub auto_fallback: bool,
    pub simultaneous: bool,
    pub providers: Vec<ProviderSettings>,
    pub backend_timeout_secs: u64,
    pub rate_limit_cooldown_secs: u64,

    // ── Delegation
    pub specialist_timeout_secs: u64,
    pub log_scan_days: u64,

    // ── Memory
    pub history_window: usize,

    // ── Storage
    pub data_dir: PathBuf,
    pub ledger_marker: String,

    // ── Persona
    pub soul_path: Option<PathBuf>,

    // ── Server
    pub host: String,
    pub port: u16,

    // ── Logging
    pub log_level: String,
}

// Values may carry trailing "# comments" in .env files; those are stripped
// before parsing. Missing or unparseable values fall back to the default.
fn env_var_or<T>(key: &str, default: T) -> T
where
    T: FromStr,
{
    match std::env::var(key) {
        Ok(val) => {
            let clean_val = val.split('#').next().unwrap_or("").trim();
            clean_val.parse::<T>().unwrap_or(default)
        }
        Err(_) => default,
    }
}

fn env_string(key: &str) -> String {
    std::env::var(key).unwrap_or_default().trim().to_string()
}

impl CoreConfig {
    /// Load `.env` (if present) and read the process environment.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        Self::from_current_env()
    }

    /// Read the process environment without touching `.env`.
    pub fn from_current_env() -> Self {
        let providers = PROVIDERS
            .iter()
            .map(|spec| ProviderSettings {
                spec,
                api_key: env_string(spec.key_var),
                model: env_var_or(spec.model_var, spec.default_model.to_string()),
            })
            .collect();

        let soul_path = env_string("SOUL_PATH");

        Self {
            preferred_provider: env_var_or("LLM_PROVIDER", "gemini".to_string()).to_lowercase(),
            auto_fallback: env_var_or("ENABLE_AUTO_FALLBACK", false),
            simultaneous: env_var_or("ENABLE_SIMULTANEOUS_LLM", false),
            providers,
            backend_timeout_secs: env_var_or("BACKEND_TIMEOUT_SECS", 120),
            rate_limit_cooldown_secs: env_var_or("RATE_LIMIT_COOLDOWN_SECS", 600),
            specialist_timeout_secs: env_var_or("SPECIALIST_TIMEOUT_SECS", 25),
            log_scan_days: env_var_or("LOG_SCAN_DAYS", 7),
            history_window: env_var_or("HISTORY_WINDOW", 10),
            data_dir: PathBuf::from(env_var_or("DATA_DIR", "./data".to_string())),
            ledger_marker: env_var_or("LEDGER_MARKER", "[KNOWLEDGE]".to_string()),
            soul_path: (!soul_path.is_empty()).then(|| PathBuf::from(soul_path)),
            host: env_var_or("HOST", "127.0.0.1".to_string()),
            port: env_var_or("PORT", 8787),
            log_level: env_var_or("LOG_LEVEL", "info".to_string()),
        }
    }

    pub fn provider(&self, id: &str) -> Option<&ProviderSettings> {
        let id = id.trim().to_lowercase();
        self.providers.iter().find(|p| p.spec.id == id)
    }

    pub fn specialist_timeout(&self) -> Duration {
        Duration::from_secs(self.specialist_timeout_secs)
    }

    pub fn backend_timeout(&self) -> Duration {
        Duration::from_secs(self.backend_timeout_secs)
    }

    /// Age limit for log files the research specialist reads.
    pub fn log_scan_window(&self) -> Duration {
        Duration::from_secs(self.log_scan_days * 24 * 60 * 60)
    }

    pub fn rate_limit_cooldown(&self) -> Duration {
        Duration::from_secs(self.rate_limit_cooldown_secs)
    }

    pub fn memory_dir(&self) -> PathBuf {
        self.data_dir.join("memory")
    }

    pub fn snapshot_dir(&self) -> PathBuf {
        self.data_dir.join("snapshots")
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.data_dir.join("ledger.jsonl")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn tracing_level(&self) -> tracing::Level {
        self.log_level
            .parse::<tracing::Level>()
            .unwrap_or(tracing::Level::INFO)
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            preferred_provider: "gemini".to_string(),
            auto_fallback: false,
            simultaneous: false,
            providers: PROVIDERS
                .iter()
                .map(|spec| ProviderSettings {
                    spec,
                    api_key: String::new(),
                    model: spec.default_model.to_string(),
                })
                .collect(),
            backend_timeout_secs: 120,
            rate_limit_cooldown_secs: 600,
            specialist_timeout_secs: 25,
            log_scan_days: 7,
            history_window: 10,
            data_dir: PathBuf::from("./data"),
            ledger_marker: "[KNOWLEDGE]".to_string(),
            soul_path: None,
            host: "127.0.0.1".to_string(),
            port: 8787,
            log_level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = CoreConfig::default();
        assert_eq!(config.preferred_provider, "gemini");
        assert!(!config.auto_fallback);
        assert_eq!(config.specialist_timeout(), Duration::from_secs(25));
        assert_eq!(config.rate_limit_cooldown(), Duration::from_secs(600));
        assert_eq!(config.providers.len(), PROVIDERS.len());
        assert_eq!(config.ledger_path(), PathBuf::from("./data/ledger.jsonl"));
    }

    #[test]
    fn test_secret_validation() {
        assert!(is_valid_secret("AIza-real-key"));
        assert!(!is_valid_secret(""));
        assert!(!is_valid_secret("   "));
        assert!(!is_valid_secret("ChangeMe"));
        assert!(!is_valid_secret(" your_api_key_here "));
        assert!(is_placeholder("PLACEHOLDER"));
        assert!(!is_placeholder(""));
    }

    #[test]
    fn test_provider_lookup_is_case_insensitive() {
        let config = CoreConfig::default();
        assert_eq!(config.provider("CLAUDE").map(|p| p.spec.key_var), Some("ANTHROPIC_API_KEY"));
    }

    #[test]
    fn test_tracing_level_parsing() {
        let config = CoreConfig {
            log_level: "debug".to_string(),
            ..CoreConfig::default()
        };
        assert_eq!(config.tracing_level(), tracing::Level::DEBUG);

        let config = CoreConfig {
            log_level: "chatty".to_string(),
            ..CoreConfig::default()
        };
        assert_eq!(config.tracing_level(), tracing::Level::INFO);
    }
}
