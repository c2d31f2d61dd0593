use crate::errors::{GeminiError, GeminiResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const APP_NAME: &str = "gemini-mcp-chat";
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash-latest";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Configuration struct for the Gemini gateway
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct GeminiConfig {
    pub api_key: Option<String>,
    pub system_prompt: Option<String>,
    pub model_name: Option<String>,
    pub temperature: Option<f32>,
    pub max_output_tokens: Option<i32>,
    pub base_url: Option<String>,
    pub request_timeout_secs: Option<u64>,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            system_prompt: None,
            model_name: Some(DEFAULT_MODEL.to_string()),
            temperature: Some(0.2),
            max_output_tokens: Some(2048),
            base_url: Some(DEFAULT_BASE_URL.to_string()),
            request_timeout_secs: Some(60),
        }
    }
}

impl GeminiConfig {
    /// Merges this config with another config, preferring values from the other config if present
    pub fn merge(&self, other: &Self) -> Self {
        Self {
            api_key: other.api_key.clone().or_else(|| self.api_key.clone()),
            system_prompt: other
                .system_prompt
                .clone()
                .or_else(|| self.system_prompt.clone()),
            model_name: other.model_name.clone().or_else(|| self.model_name.clone()),
            temperature: other.temperature.or(self.temperature),
            max_output_tokens: other.max_output_tokens.or(self.max_output_tokens),
            base_url: other.base_url.clone().or_else(|| self.base_url.clone()),
            request_timeout_secs: other.request_timeout_secs.or(self.request_timeout_secs),
        }
    }
}

/// Settings for spawning and talking to tool processes
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct McpConfig {
    pub python_command: String,
    pub node_command: String,
    pub init_timeout_secs: u64,
    pub tool_timeout_secs: u64,
    pub shutdown_grace_ms: u64,
}

impl Default for McpConfig {
    fn default() -> Self {
        Self {
            python_command: "python".to_string(),
            node_command: "node".to_string(),
            init_timeout_secs: 30,
            tool_timeout_secs: 60,
            shutdown_grace_ms: 2000,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Tool-bearing rounds allowed per query. The last round's follow-up never sees tools.
    pub max_tool_rounds: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self { max_tool_rounds: 1 }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct HttpConfig {
    pub addr: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:8000".to_string(),
        }
    }
}

/// Everything the chat client reads from `config.toml`
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct UnifiedConfig {
    pub gemini: GeminiConfig,
    pub mcp: McpConfig,
    pub orchestrator: OrchestratorConfig,
    pub http: HttpConfig,
    pub log_level: String,
}

impl Default for UnifiedConfig {
    fn default() -> Self {
        Self {
            gemini: GeminiConfig::default(),
            mcp: McpConfig::default(),
            orchestrator: OrchestratorConfig::default(),
            http: HttpConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

impl UnifiedConfig {
    /// Loads configuration from a file if it exists, otherwise returns the default config
    pub fn load_from_file(path: &Path) -> GeminiResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| {
            GeminiError::ConfigError(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        toml::from_str(&content).map_err(|e| {
            GeminiError::ConfigError(format!(
                "Failed to parse config file {}: {}",
                path.display(),
                e
            ))
        })
    }

    /// Loads the config at the default location (`~/.config/gemini-mcp-chat/config.toml`)
    pub fn load_from_default() -> GeminiResult<Self> {
        let path = get_default_config_file(APP_NAME)?;
        Self::load_from_file(&path)
    }

    /// Saves configuration to a file
    pub fn save_to_file(&self, path: &Path) -> GeminiResult<()> {
        let content = toml::to_string(self).map_err(|e| {
            GeminiError::ConfigError(format!("Failed to serialize config: {}", e))
        })?;

        // Ensure the directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                GeminiError::ConfigError(format!("Failed to create config directory: {}", e))
            })?;
        }

        fs::write(path, content)
            .map_err(|e| GeminiError::ConfigError(format!("Failed to write config file: {}", e)))
    }

    /// Fills the API key from the given variable lookup when the file did not set one.
    ///
    /// The lookup is injected so the gateway itself never touches the process
    /// environment; binaries pass `|k| std::env::var(k).ok()`.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if self.gemini.api_key.is_some() {
            return;
        }
        self.gemini.api_key = ["GEMINI_API_KEY", "GOOGLE_API_KEY"]
            .iter()
            .find_map(|key| lookup(key).filter(|v| !v.trim().is_empty()));
    }
}

/// Helper function to get default config directory
pub fn get_default_config_dir(app_name: &str) -> GeminiResult<PathBuf> {
    let home_dir = dirs::home_dir().ok_or_else(|| {
        GeminiError::ConfigError("Could not determine home directory".to_string())
    })?;

    Ok(home_dir.join(".config").join(app_name))
}

/// Helper function to get default config file path
pub fn get_default_config_file(app_name: &str) -> GeminiResult<PathBuf> {
    let config_dir = get_default_config_dir(app_name)?;
    Ok(config_dir.join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let config = UnifiedConfig::load_from_file(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(config, UnifiedConfig::default());
        assert_eq!(config.orchestrator.max_tool_rounds, 1);
        assert_eq!(config.mcp.python_command, "python");
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "log_level = \"debug\"\n[gemini]\nmodel_name = \"gemini-2.0-flash\"\n[mcp]\nnode_command = \"/usr/bin/node\"\n",
        )
        .unwrap();

        let config = UnifiedConfig::load_from_file(&path).unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.gemini.model_name.as_deref(), Some("gemini-2.0-flash"));
        assert_eq!(config.gemini.temperature, Some(0.2));
        assert_eq!(config.mcp.node_command, "/usr/bin/node");
        assert_eq!(config.mcp.python_command, "python");
    }

    #[test]
    fn test_malformed_file_is_config_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[gemini\nmodel_name = ").unwrap();

        let err = UnifiedConfig::load_from_file(&path).unwrap_err();
        assert!(matches!(err, GeminiError::ConfigError(_)));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut config = UnifiedConfig::default();
        config.http.addr = "127.0.0.1:9000".to_string();
        config.save_to_file(&path).unwrap();

        let reloaded = UnifiedConfig::load_from_file(&path).unwrap();
        assert_eq!(reloaded.http.addr, "127.0.0.1:9000");
    }

    #[test]
    fn test_apply_env_prefers_file_key() {
        let vars: HashMap<&str, &str> =
            HashMap::from([("GEMINI_API_KEY", "from-env"), ("GOOGLE_API_KEY", "google")]);

        let mut config = UnifiedConfig::default();
        config.apply_env(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(config.gemini.api_key.as_deref(), Some("from-env"));

        let mut config = UnifiedConfig::default();
        config.gemini.api_key = Some("from-file".to_string());
        config.apply_env(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(config.gemini.api_key.as_deref(), Some("from-file"));
    }

    #[test]
    fn test_apply_env_falls_back_to_google_key() {
        let mut config = UnifiedConfig::default();
        config.apply_env(|k| (k == "GOOGLE_API_KEY").then(|| "google".to_string()));
        assert_eq!(config.gemini.api_key.as_deref(), Some("google"));
    }

    #[test]
    fn test_merge_prefers_other() {
        let base = GeminiConfig::default();
        let other = GeminiConfig {
            api_key: Some("k".to_string()),
            model_name: Some("m".to_string()),
            system_prompt: None,
            temperature: None,
            max_output_tokens: None,
            base_url: None,
            request_timeout_secs: None,
        };
        let merged = base.merge(&other);
        assert_eq!(merged.api_key.as_deref(), Some("k"));
        assert_eq!(merged.model_name.as_deref(), Some("m"));
        assert_eq!(merged.temperature, Some(0.2));
    }
}
