use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::VisionError;

pub const DEFAULT_API_BASE: &str = "https://open.bigmodel.cn/api/paas/v4";
pub const DEFAULT_MODEL: &str = "glm-4.5v";
pub const DEFAULT_SERVER_NAME: &str = "mcp-vl";
pub const DEFAULT_LOG_LEVEL: &str = "info";
pub const DEFAULT_TEMPERATURE: f64 = 0.7;
pub const DEFAULT_MAX_TOKENS: u32 = 1000;

const PLACEHOLDER_KEYS: &[&str] = &[
    "your_api_key_here",
    "your-api-key",
    "your_api_key",
    "your_zhipuai_api_key",
    "changeme",
    "sk-xxx",
];

/// Process configuration, read once at startup and passed by value to the
/// components that need it.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub api_key: Option<String>,
    pub api_base: String,
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
    pub server_name: String,
    pub server_version: String,
    pub log_level: String,
    pub temp_dir: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl Settings {
    /// Reads the process environment, falling back to `./.env` for keys the
    /// environment leaves unset.
    pub fn from_env() -> Self {
        Self::load(None)
    }

    pub fn load(env_file: Option<&Path>) -> Self {
        let path = env_file
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(".env"));
        let dotenv = match std::fs::read_to_string(&path) {
            Ok(content) => {
                log::debug!("loaded {}", path.display());
                parse_dotenv(&content)
            }
            Err(err) => {
                if env_file.is_some() {
                    log::warn!("could not read env file {}: {err}", path.display());
                }
                HashMap::new()
            }
        };
        Self::from_lookup(|key| {
            std::env::var(key)
                .ok()
                .or_else(|| dotenv.get(key).cloned())
        })
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        Self {
            api_key: get("ZHIPUAI_API_KEY"),
            api_base: get("ZHIPUAI_BASE_URL")
                .map(|value| value.trim_end_matches('/').to_string())
                .filter(|value| !value.is_empty())
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            model: get("ZHIPUAI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            temperature: get("VL_TEMPERATURE")
                .and_then(|value| value.parse::<f64>().ok())
                .filter(|value| value.is_finite())
                .map(|value| value.clamp(0.0, 2.0))
                .unwrap_or(DEFAULT_TEMPERATURE),
            max_tokens: get("VL_MAX_TOKENS")
                .and_then(|value| value.parse::<u32>().ok())
                .filter(|value| *value > 0)
                .unwrap_or(DEFAULT_MAX_TOKENS),
            server_name: get("MCP_SERVER_NAME").unwrap_or_else(|| DEFAULT_SERVER_NAME.to_string()),
            server_version: get("MCP_SERVER_VERSION")
                .unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string()),
            log_level: get("LOG_LEVEL").unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
            temp_dir: get("VL_TEMP_DIR").map(PathBuf::from),
        }
    }

    /// The API key, or a configuration error when it is missing or still a
    /// template placeholder.
    pub fn require_api_key(&self) -> Result<&str, VisionError> {
        match self.api_key.as_deref() {
            None => Err(VisionError::Configuration(
                "ZHIPUAI_API_KEY is not set".to_string(),
            )),
            Some(key) if is_placeholder_key(key) => Err(VisionError::Configuration(
                "ZHIPUAI_API_KEY still holds a placeholder value".to_string(),
            )),
            Some(key) => Ok(key),
        }
    }

    pub fn chat_completions_endpoint(&self) -> String {
        format!("{}/chat/completions", self.api_base)
    }
}

pub fn is_placeholder_key(key: &str) -> bool {
    let lowered = key.trim().to_ascii_lowercase();
    if lowered.is_empty() {
        return true;
    }
    if PLACEHOLDER_KEYS.contains(&lowered.as_str()) {
        return true;
    }
    if lowered.starts_with('<') && lowered.ends_with('>') {
        return true;
    }
    lowered.chars().all(|ch| ch == 'x' || ch == '*')
}

/// Parses `KEY=value` lines: blank lines and `#` comments are skipped, an
/// `export ` prefix is allowed and matching surrounding quotes are removed.
pub fn parse_dotenv(content: &str) -> HashMap<String, String> {
    let mut vars = HashMap::new();
    for raw_line in content.lines() {
        let mut line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some(stripped) = line.strip_prefix("export ") {
            line = stripped.trim();
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        let mut value = value.trim().to_string();
        if value.len() >= 2 {
            let bytes = value.as_bytes();
            if (bytes[0] == b'"' && bytes[bytes.len() - 1] == b'"')
                || (bytes[0] == b'\'' && bytes[bytes.len() - 1] == b'\'')
            {
                value = value[1..value.len() - 1].to_string();
            }
        }
        vars.insert(key.to_string(), value);
    }
    vars
}
