//! Gateway configuration

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::Path;

use scopeforge_core::refinement::RefinementConfig;
use scopeforge_core::scope::DEFAULT_CONTINGENCY_PERCENTAGE;

use crate::{GatewayError, Result, DEFAULT_HOST, DEFAULT_PORT};

/// Main gateway configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// Cross-origin settings
    pub cors: CorsSettings,

    /// Refinement engine settings
    pub refinement: RefinementConfig,

    /// Contingency used when scope generation falls back to the default scope
    pub contingency_percentage: f64,

    /// Directory of historical project documents loaded at startup
    pub knowledge_base_path: Option<String>,

    /// Monthly rate per role, replacing the standard rate card entry
    pub rate_overrides: HashMap<String, f64>,

    /// Scope versions kept per project; older ones are dropped
    pub max_versions_per_project: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            cors: CorsSettings::default(),
            refinement: RefinementConfig::default(),
            contingency_percentage: DEFAULT_CONTINGENCY_PERCENTAGE,
            knowledge_base_path: None,
            rate_overrides: HashMap::new(),
            max_versions_per_project: 20,
        }
    }
}

impl GatewayConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the host
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_knowledge_base_path(mut self, path: impl Into<String>) -> Self {
        self.knowledge_base_path = Some(path.into());
        self
    }

    pub fn with_max_versions(mut self, max: usize) -> Self {
        self.max_versions_per_project = max;
        self
    }

    pub fn with_refinement(mut self, refinement: RefinementConfig) -> Self {
        self.refinement = refinement;
        self
    }

    /// Get the socket address
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| GatewayError::InvalidConfig(format!("bad listen address: {}", e)))
    }

    /// Load configuration from a JSON file, or TOML when the extension is `.toml`
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        if is_toml(path) {
            toml::from_str(&content).map_err(|e| GatewayError::InvalidConfig(e.to_string()))
        } else {
            Ok(serde_json::from_str(&content)?)
        }
    }

    /// Save configuration to a file, in the format its extension names
    pub fn to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = if is_toml(path) {
            toml::to_string_pretty(self).map_err(|e| GatewayError::Serialization(e.to_string()))?
        } else {
            serde_json::to_string_pretty(self)?
        };
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Overlay `SCOPEFORGE_*` variables from the process environment
    pub fn with_env_overrides(self) -> Result<Self> {
        self.apply_env(&|key: &str| std::env::var(key).ok())
    }

    /// Overlay `SCOPEFORGE_*` variables read through `env`
    pub fn apply_env(mut self, env: &dyn Fn(&str) -> Option<String>) -> Result<Self> {
        fn parse<T: std::str::FromStr>(key: &str, value: String) -> Result<T> {
            value
                .trim()
                .parse()
                .map_err(|_| GatewayError::InvalidConfig(format!("{}={} is not valid", key, value)))
        }

        if let Some(host) = env("SCOPEFORGE_HOST") {
            self.host = host;
        }
        if let Some(port) = env("SCOPEFORGE_PORT") {
            self.port = parse("SCOPEFORGE_PORT", port)?;
        }
        if let Some(path) = env("SCOPEFORGE_KNOWLEDGE_PATH") {
            self.knowledge_base_path = Some(path);
        }
        if let Some(secs) = env("SCOPEFORGE_LLM_TIMEOUT_SECS") {
            self.refinement.llm_timeout_secs = parse("SCOPEFORGE_LLM_TIMEOUT_SECS", secs)?;
        }
        if let Some(flag) = env("SCOPEFORGE_LLM_INTENT_FALLBACK") {
            self.refinement.llm_intent_fallback = parse("SCOPEFORGE_LLM_INTENT_FALLBACK", flag)?;
        }
        if let Some(pct) = env("SCOPEFORGE_CONTINGENCY_PERCENTAGE") {
            self.contingency_percentage = parse("SCOPEFORGE_CONTINGENCY_PERCENTAGE", pct)?;
        }
        if let Some(max) = env("SCOPEFORGE_MAX_VERSIONS") {
            self.max_versions_per_project = parse("SCOPEFORGE_MAX_VERSIONS", max)?;
        }
        if let Some(origins) = env("SCOPEFORGE_CORS_ORIGINS") {
            self.cors.allowed_origins = origins
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(str::to_string)
                .collect();
        }
        self.validate()?;
        Ok(self)
    }

    /// Reject settings the gateway cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.refinement.llm_timeout_secs == 0 {
            return Err(GatewayError::InvalidConfig("llm_timeout_secs must be positive".into()));
        }
        if self.max_versions_per_project == 0 {
            return Err(GatewayError::InvalidConfig(
                "max_versions_per_project must be positive".into(),
            ));
        }
        if !self.contingency_percentage.is_finite() || self.contingency_percentage < 0.0 {
            return Err(GatewayError::InvalidConfig(format!(
                "contingency_percentage {} is invalid",
                self.contingency_percentage
            )));
        }
        Ok(())
    }
}

fn is_toml(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("toml")
}

/// Cross-origin settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorsSettings {
    /// Allowed origins; empty allows any origin
    pub allowed_origins: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GatewayConfig::default();
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.host, DEFAULT_HOST);
        assert_eq!(config.refinement.llm_timeout_secs, 30);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = GatewayConfig::new()
            .with_host("0.0.0.0")
            .with_port(8080)
            .with_max_versions(5);

        assert_eq!(config.socket_addr().unwrap().port(), 8080);
        assert_eq!(config.max_versions_per_project, 5);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gateway.json");
        std::fs::write(
            &path,
            r#"{"port": 9000, "refinement": {"llm_intent_fallback": false}, "rate_overrides": {"QA Engineer": 6500}}"#,
        )
        .unwrap();

        let config = GatewayConfig::from_file(&path).unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.host, DEFAULT_HOST);
        assert!(!config.refinement.llm_intent_fallback);
        assert_eq!(config.refinement.llm_timeout_secs, 30);
        assert_eq!(config.rate_overrides["QA Engineer"], 6500.0);

        config.to_file(&path).unwrap();
        assert_eq!(GatewayConfig::from_file(&path).unwrap(), config);
    }

    #[test]
    fn test_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gateway.toml");
        std::fs::write(
            &path,
            "port = 8100\nknowledge_base_path = \"./knowledge\"\n\n[refinement]\nllm_timeout_secs = 10\n",
        )
        .unwrap();

        let config = GatewayConfig::from_file(&path).unwrap();
        assert_eq!(config.port, 8100);
        assert_eq!(config.refinement.llm_timeout_secs, 10);
        assert_eq!(config.knowledge_base_path.as_deref(), Some("./knowledge"));

        std::fs::write(&path, "port = \"high\"").unwrap();
        assert!(matches!(
            GatewayConfig::from_file(&path),
            Err(GatewayError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_env_overlay() {
        let env = |key: &str| match key {
            "SCOPEFORGE_PORT" => Some("9100".to_string()),
            "SCOPEFORGE_LLM_TIMEOUT_SECS" => Some("5".to_string()),
            "SCOPEFORGE_CORS_ORIGINS" => Some("http://localhost:3000, https://app.example.com".to_string()),
            _ => None,
        };
        let config = GatewayConfig::default().apply_env(&env).unwrap();
        assert_eq!(config.port, 9100);
        assert_eq!(config.refinement.llm_timeout_secs, 5);
        assert_eq!(config.cors.allowed_origins.len(), 2);

        let bad = |key: &str| (key == "SCOPEFORGE_PORT").then(|| "eighty".to_string());
        assert!(matches!(
            GatewayConfig::default().apply_env(&bad),
            Err(GatewayError::InvalidConfig(_))
        ));
    }
}
