use anyhow::{Result, anyhow};
use std::env;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::errors::QuizError;
use crate::llm_providers::LLMProviderType;

// Import logging macros
use crate::{log_system_event, log_validation};

pub const DEFAULT_QUESTION_COUNT: usize = 5;
pub const DEFAULT_PAUSE_SECONDS: i64 = 20;
pub const DEFAULT_SESSION_IDLE_MINUTES: i64 = 60;
pub const DEFAULT_MAX_SESSIONS: usize = 1000;
const MAX_QUESTION_COUNT: usize = 50;

/// Complete application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub llm: LLMConfig,
    pub trivia: TriviaConfig,
    pub quiz: QuizConfig,
    pub history: HistoryConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

/// Large Language Model service configuration
#[derive(Debug, Clone)]
pub struct LLMConfig {
    pub api_key: String,
    pub base_url: Option<String>,
    pub provider: LLMProviderType,
    pub model: Option<String>,
}

/// Trivia question source configuration
#[derive(Debug, Clone)]
pub struct TriviaConfig {
    pub base_url: String,
    pub category: Option<u32>,
    pub difficulty: Option<String>,
}

/// Pacing and presentation of a quiz session
#[derive(Debug, Clone)]
pub struct QuizConfig {
    pub question_count: usize,
    pub pause_seconds: i64,
    pub shuffle_options: bool,
    /// Sessions untouched for this long are dropped
    pub session_idle_minutes: i64,
    pub max_sessions: usize,
}

#[derive(Debug, Clone)]
pub struct HistoryConfig {
    pub path: PathBuf,
}

/// HTTP server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

/// Logging system configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub file_enabled: bool,
    pub console_enabled: bool,
    pub log_directory: String,
}

impl Default for QuizConfig {
    fn default() -> Self {
        Self {
            question_count: DEFAULT_QUESTION_COUNT,
            pause_seconds: DEFAULT_PAUSE_SECONDS,
            shuffle_options: true,
            session_idle_minutes: DEFAULT_SESSION_IDLE_MINUTES,
            max_sessions: DEFAULT_MAX_SESSIONS,
        }
    }
}

impl Config {
    /// Load configuration from environment variables with sensible defaults
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from any key/value source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        log_system_event!(config, "Loading application configuration");

        let config = Config {
            llm: LLMConfig::from_lookup(&lookup)?,
            trivia: TriviaConfig::from_lookup(&lookup)?,
            quiz: QuizConfig::from_lookup(&lookup)?,
            history: HistoryConfig::from_lookup(&lookup),
            server: ServerConfig::from_lookup(&lookup)?,
            logging: LoggingConfig::from_lookup(&lookup)?,
        };

        log_system_event!(config, "Configuration loaded successfully");
        config.log_configuration_summary();

        Ok(config)
    }

    /// Log a summary of loaded configuration (without sensitive data)
    fn log_configuration_summary(&self) {
        info!(
            llm_api_key_masked = %mask_sensitive_data(&self.llm.api_key),
            llm_provider = ?self.llm.provider,
            llm_model = ?self.llm.model,
            trivia_base_url = %self.trivia.base_url,
            question_count = self.quiz.question_count,
            pause_seconds = self.quiz.pause_seconds,
            history_file = %self.history.path.display(),
            server_address = %format!("{}:{}", self.server.host, self.server.port),
            log_level = %self.logging.level,
            "Configuration summary"
        );
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if let Err(e) = self.check_values() {
            log_validation!(failure, "configuration", error = e);
            return Err(e);
        }

        if !["trace", "debug", "info", "warn", "error"]
            .iter()
            .any(|level| self.logging.level.to_lowercase().contains(level))
        {
            warn!("Invalid log level '{}', using 'info' as fallback", self.logging.level);
        }

        log_validation!(success, "configuration", "Configuration validation completed successfully");
        Ok(())
    }

    fn check_values(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(anyhow!("Server port must be greater than 0"));
        }

        if self.quiz.question_count == 0 || self.quiz.question_count > MAX_QUESTION_COUNT {
            return Err(anyhow!(
                "QUIZ_QUESTION_COUNT must be between 1 and {}",
                MAX_QUESTION_COUNT
            ));
        }

        if let Some(difficulty) = &self.trivia.difficulty {
            if !["easy", "medium", "hard"].contains(&difficulty.as_str()) {
                return Err(anyhow!(
                    "TRIVIA_DIFFICULTY must be one of easy, medium, hard (got '{}')",
                    difficulty
                ));
            }
        }

        if self.quiz.pause_seconds < 0 {
            return Err(anyhow!("QUIZ_PAUSE_SECONDS cannot be negative"));
        }

        if self.quiz.session_idle_minutes <= 0 {
            return Err(anyhow!("QUIZ_SESSION_IDLE_MINUTES must be greater than 0"));
        }

        if self.quiz.max_sessions == 0 {
            return Err(anyhow!("QUIZ_MAX_SESSIONS must be greater than 0"));
        }

        Ok(())
    }
}

impl LLMConfig {
    fn from_lookup<F>(lookup: &F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = resolve_api_key(lookup)?;

        let base_url = non_empty(lookup("LLM_BASE_URL"));

        let provider_str = lookup("LLM_PROVIDER").unwrap_or_else(|| "openai".to_string());
        let provider = LLMProviderType::parse(&provider_str);

        let model = non_empty(lookup("LLM_MODEL"));

        Ok(LLMConfig {
            api_key,
            base_url,
            provider,
            model,
        })
    }
}

impl TriviaConfig {
    fn from_lookup<F>(lookup: &F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_url = lookup("TRIVIA_BASE_URL")
            .unwrap_or_else(|| "https://opentdb.com".to_string())
            .trim_end_matches('/')
            .to_string();

        let category = match non_empty(lookup("TRIVIA_CATEGORY")) {
            Some(raw) => Some(
                raw.parse::<u32>()
                    .map_err(|_| anyhow!("Invalid TRIVIA_CATEGORY value: '{}'", raw))?,
            ),
            None => None,
        };

        let difficulty = non_empty(lookup("TRIVIA_DIFFICULTY")).map(|d| d.to_lowercase());

        Ok(TriviaConfig {
            base_url,
            category,
            difficulty,
        })
    }
}

impl QuizConfig {
    fn from_lookup<F>(lookup: &F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let question_count = match lookup("QUIZ_QUESTION_COUNT") {
            Some(raw) => raw.parse::<usize>().map_err(|_| {
                anyhow!("Invalid QUIZ_QUESTION_COUNT value: '{}'. Must be a positive number", raw)
            })?,
            None => DEFAULT_QUESTION_COUNT,
        };

        let pause_seconds = match lookup("QUIZ_PAUSE_SECONDS") {
            Some(raw) => raw
                .parse::<i64>()
                .map_err(|_| anyhow!("Invalid QUIZ_PAUSE_SECONDS value: '{}'", raw))?,
            None => DEFAULT_PAUSE_SECONDS,
        };

        let shuffle_options = parse_flag(lookup, "QUIZ_SHUFFLE_OPTIONS", true)?;

        let session_idle_minutes = match lookup("QUIZ_SESSION_IDLE_MINUTES") {
            Some(raw) => raw
                .parse::<i64>()
                .map_err(|_| anyhow!("Invalid QUIZ_SESSION_IDLE_MINUTES value: '{}'", raw))?,
            None => DEFAULT_SESSION_IDLE_MINUTES,
        };

        let max_sessions = match lookup("QUIZ_MAX_SESSIONS") {
            Some(raw) => raw
                .parse::<usize>()
                .map_err(|_| anyhow!("Invalid QUIZ_MAX_SESSIONS value: '{}'", raw))?,
            None => DEFAULT_MAX_SESSIONS,
        };

        Ok(QuizConfig {
            question_count,
            pause_seconds,
            shuffle_options,
            session_idle_minutes,
            max_sessions,
        })
    }
}

impl HistoryConfig {
    fn from_lookup<F>(lookup: &F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let path = lookup("HISTORY_FILE").unwrap_or_else(|| "quiz_log.json".to_string());
        HistoryConfig {
            path: PathBuf::from(path),
        }
    }
}

impl ServerConfig {
    fn from_lookup<F>(lookup: &F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port_str = lookup("PORT").unwrap_or_else(|| "3000".to_string());

        let port = port_str.parse::<u16>().map_err(|_| {
            anyhow!("Invalid PORT value: '{}'. Must be a number between 1-65535", port_str)
        })?;

        let host = lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string());

        Ok(ServerConfig { port, host })
    }
}

impl LoggingConfig {
    /// Logging settings alone, so the subscriber can be installed before the rest is loaded
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(&|key: &str| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: &F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let level = lookup("RUST_LOG").unwrap_or_else(|| "info,quiz_master=debug".to_string());

        let file_enabled = parse_flag(lookup, "LOG_FILE_ENABLED", true)?;
        let console_enabled = parse_flag(lookup, "LOG_CONSOLE_ENABLED", true)?;

        let log_directory = lookup("LOG_DIRECTORY").unwrap_or_else(|| "logs".to_string());

        Ok(LoggingConfig {
            level,
            file_enabled,
            console_enabled,
            log_directory,
        })
    }
}

/// Find the language-model API key: environment first, then the secrets file
fn resolve_api_key<F>(lookup: &F) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(key) = non_empty(lookup("OPENAI_API_KEY")).or_else(|| non_empty(lookup("LLM_API_KEY"))) {
        return Ok(key);
    }

    let secrets_file = lookup("SECRETS_FILE").unwrap_or_else(|| "secrets.env".to_string());
    if let Some(key) = read_secret(Path::new(&secrets_file), &["OPENAI_API_KEY", "LLM_API_KEY"])? {
        info!(secrets_file = %secrets_file, "Loaded LLM API key from secrets file");
        return Ok(key);
    }

    Err(QuizError::MissingCredential { secrets_file }.into())
}

/// Read the first non-empty value for any of `keys` from a dotenv-format file
fn read_secret(path: &Path, keys: &[&str]) -> Result<Option<String>> {
    if !path.exists() {
        return Ok(None);
    }

    for item in dotenvy::from_path_iter(path)? {
        let (key, value) = item?;
        if keys.contains(&key.as_str()) && !value.trim().is_empty() {
            return Ok(Some(value));
        }
    }

    Ok(None)
}

/// Boolean switch; unset means `default`, anything but true/false is an error
fn parse_flag<F>(lookup: &F, key: &str, default: bool) -> Result<bool>
where
    F: Fn(&str) -> Option<String>,
{
    match non_empty(lookup(key)) {
        Some(raw) => raw
            .trim()
            .to_lowercase()
            .parse::<bool>()
            .map_err(|_| anyhow!("Invalid {} value: '{}'. Must be true or false", key, raw)),
        None => Ok(default),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Mask sensitive data in configuration for safe logging
fn mask_sensitive_data(data: &str) -> String {
    let chars: Vec<char> = data.chars().collect();
    if chars.len() <= 8 {
        "*".repeat(chars.len())
    } else {
        let prefix: String = chars[..4].iter().collect();
        let suffix: String = chars[chars.len() - 4..].iter().collect();
        format!("{}***{}", prefix, suffix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> + use<> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_mask_sensitive_data() {
        assert_eq!(mask_sensitive_data("short"), "*****");
        assert_eq!(mask_sensitive_data("sk-1234567890abcdef"), "sk-1***cdef");
        assert_eq!(mask_sensitive_data("ключ-1234567890-ёж"), "ключ***0-ёж");
        assert_eq!(mask_sensitive_data("ключключ"), "********");
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup_from(&[("OPENAI_API_KEY", "sk-test-key")])).unwrap();

        assert_eq!(config.llm.api_key, "sk-test-key");
        assert_eq!(config.llm.provider, LLMProviderType::OpenAI);
        assert_eq!(config.trivia.base_url, "https://opentdb.com");
        assert_eq!(config.quiz.question_count, 5);
        assert_eq!(config.trivia.category, None);
        assert_eq!(config.quiz.pause_seconds, 20);
        assert!(config.quiz.shuffle_options);
        assert_eq!(config.quiz.session_idle_minutes, 60);
        assert_eq!(config.quiz.max_sessions, 1000);
        assert!(config.logging.file_enabled);
        assert!(config.logging.console_enabled);
        assert_eq!(config.history.path, PathBuf::from("quiz_log.json"));
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_llm_api_key_fallback() {
        let config = Config::from_lookup(lookup_from(&[
            ("OPENAI_API_KEY", "  "),
            ("LLM_API_KEY", "sk-from-llm-var"),
        ]))
        .unwrap();
        assert_eq!(config.llm.api_key, "sk-from-llm-var");
    }

    #[test]
    fn test_missing_credential() {
        let dir = tempfile::tempdir().unwrap();
        let secrets = dir.path().join("absent.env");
        let secrets = secrets.to_string_lossy().to_string();

        let err = Config::from_lookup(lookup_from(&[("SECRETS_FILE", secrets.as_str())])).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<QuizError>(),
            Some(QuizError::MissingCredential { .. })
        ));
    }

    #[test]
    fn test_api_key_from_secrets_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# quiz secrets").unwrap();
        writeln!(file, "OPENAI_API_KEY=sk-from-secrets").unwrap();
        let path = file.path().to_string_lossy().to_string();

        let config = Config::from_lookup(lookup_from(&[("SECRETS_FILE", path.as_str())])).unwrap();
        assert_eq!(config.llm.api_key, "sk-from-secrets");
    }

    #[test]
    fn test_trivia_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            ("OPENAI_API_KEY", "sk-test-key"),
            ("TRIVIA_BASE_URL", "http://localhost:9000/"),
            ("QUIZ_QUESTION_COUNT", "10"),
            ("TRIVIA_CATEGORY", "9"),
            ("TRIVIA_DIFFICULTY", "Hard"),
            ("QUIZ_PAUSE_SECONDS", "0"),
            ("QUIZ_SHUFFLE_OPTIONS", "false"),
        ]))
        .unwrap();

        assert_eq!(config.trivia.base_url, "http://localhost:9000");
        assert_eq!(config.quiz.question_count, 10);
        assert_eq!(config.trivia.category, Some(9));
        assert_eq!(config.trivia.difficulty.as_deref(), Some("hard"));
        assert_eq!(config.quiz.pause_seconds, 0);
        assert!(!config.quiz.shuffle_options);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_llm_provider_parsing() {
        for (input, expected) in [
            ("openai", LLMProviderType::OpenAI),
            ("ChatGPT", LLMProviderType::OpenAI),
            ("gemini", LLMProviderType::Gemini),
            ("Google", LLMProviderType::Gemini),
            ("unknown", LLMProviderType::OpenAI),
        ] {
            let config = Config::from_lookup(lookup_from(&[
                ("OPENAI_API_KEY", "sk-test-key"),
                ("LLM_PROVIDER", input),
            ]))
            .unwrap();
            assert_eq!(config.llm.provider, expected, "Input '{}' should map to {:?}", input, expected);
        }
    }

    #[test]
    fn test_config_validation() {
        let config = Config::from_lookup(lookup_from(&[("OPENAI_API_KEY", "sk-test-key")])).unwrap();

        let mut invalid = config.clone();
        invalid.server.port = 0;
        assert!(invalid.validate().is_err());

        let mut invalid = config.clone();
        invalid.quiz.question_count = 0;
        assert!(invalid.validate().is_err());

        let mut invalid = config.clone();
        invalid.trivia.difficulty = Some("impossible".to_string());
        assert!(invalid.validate().is_err());

        let mut invalid = config.clone();
        invalid.quiz.pause_seconds = -1;
        assert!(invalid.validate().is_err());

        let mut invalid = config.clone();
        invalid.quiz.session_idle_minutes = 0;
        assert!(invalid.validate().is_err());

        let mut invalid = config;
        invalid.quiz.max_sessions = 0;
        assert!(invalid.validate().is_err());
    }

    #[test]
    fn test_invalid_numbers_are_rejected() {
        assert!(Config::from_lookup(lookup_from(&[
            ("OPENAI_API_KEY", "sk-test-key"),
            ("PORT", "not-a-number"),
        ]))
        .is_err());

        assert!(Config::from_lookup(lookup_from(&[
            ("OPENAI_API_KEY", "sk-test-key"),
            ("QUIZ_QUESTION_COUNT", "five"),
        ]))
        .is_err());
    }

    #[test]
    fn test_boolean_flags() {
        let config = Config::from_lookup(lookup_from(&[
            ("OPENAI_API_KEY", "sk-test-key"),
            ("QUIZ_SHUFFLE_OPTIONS", " FALSE "),
            ("LOG_FILE_ENABLED", "false"),
            ("LOG_CONSOLE_ENABLED", ""),
        ]))
        .unwrap();

        assert!(!config.quiz.shuffle_options);
        assert!(!config.logging.file_enabled);
        assert!(config.logging.console_enabled);

        for key in ["QUIZ_SHUFFLE_OPTIONS", "LOG_FILE_ENABLED", "LOG_CONSOLE_ENABLED"] {
            let err = Config::from_lookup(lookup_from(&[
                ("OPENAI_API_KEY", "sk-test-key"),
                (key, "nope"),
            ]))
            .unwrap_err();
            assert!(err.to_string().contains(key), "error should name {}", key);
        }
    }

    #[test]
    fn test_session_limits() {
        let config = Config::from_lookup(lookup_from(&[
            ("OPENAI_API_KEY", "sk-test-key"),
            ("QUIZ_SESSION_IDLE_MINUTES", "15"),
            ("QUIZ_MAX_SESSIONS", "20"),
        ]))
        .unwrap();
        assert_eq!(config.quiz.session_idle_minutes, 15);
        assert_eq!(config.quiz.max_sessions, 20);

        assert!(Config::from_lookup(lookup_from(&[
            ("OPENAI_API_KEY", "sk-test-key"),
            ("QUIZ_MAX_SESSIONS", "lots"),
        ]))
        .is_err());
    }
}
