use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use scopeforge_core::{GenerationOptions, TextGenerator};

use crate::gemini::GeminiClient;
use crate::openai_compatible::OpenAICompatibleClient;

const CONFIG_ENV: &str = "SCOPEFORGE_LLM_CONFIG";
const DEFAULT_CONFIG_FILE: &str = "scopeforge_llm_config.json";
const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const OPENAI_MODEL: &str = "gpt-4o-mini";
const GEMINI_MODEL: &str = "gemini-1.5-flash";

/// Provider order and settings, usually loaded from a JSON file
#[derive(Debug, Default, Deserialize)]
pub struct ProviderRouterConfig {
    pub default: Option<String>,
    pub fallbacks: Option<Vec<String>>,
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderConfig {
    #[serde(rename = "openai")]
    OpenAI {
        api_key: Option<String>,
        api_key_env: Option<String>,
        model: Option<String>,
        base_url: Option<String>,
        temperature: Option<f64>,
        max_tokens: Option<u32>,
    },
    Gemini {
        api_key: Option<String>,
        api_key_env: Option<String>,
        model: Option<String>,
        base_url: Option<String>,
        temperature: Option<f64>,
        max_tokens: Option<u32>,
    },
    #[serde(rename = "openai_compatible")]
    OpenAICompatible {
        name: Option<String>,
        api_key: Option<String>,
        api_key_env: Option<String>,
        base_url: String,
        model: String,
        temperature: Option<f64>,
        max_tokens: Option<u32>,
        headers: Option<HashMap<String, String>>,
    },
}

#[derive(Debug, Clone)]
struct ProviderEntry {
    name: String,
    client: Arc<dyn TextGenerator>,
}

/// Ordered provider list; each call goes to the first provider that answers.
#[derive(Debug, Clone)]
pub struct ProviderRouter {
    providers: Vec<ProviderEntry>,
}

impl ProviderRouter {
    /// Router over already-built generators, tried in the given order
    pub fn from_generators(generators: Vec<(String, Arc<dyn TextGenerator>)>) -> Result<Self> {
        if generators.is_empty() {
            anyhow::bail!("No LLM providers configured.");
        }
        Ok(Self {
            providers: generators
                .into_iter()
                .map(|(name, client)| ProviderEntry { name, client })
                .collect(),
        })
    }

    /// Provider names in call order
    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name.as_str()).collect()
    }

    /// Config file from `SCOPEFORGE_LLM_CONFIG` (or `./scopeforge_llm_config.json`),
    /// otherwise the process environment.
    pub fn from_env() -> Result<Self> {
        let env = |key: &str| std::env::var(key).ok();
        if let Some(config) = Self::load_config_file(&env)? {
            return Self::from_config(config, &env);
        }
        Self::from_env_vars(&env)
    }

    pub fn from_config(
        config: ProviderRouterConfig,
        env: &dyn Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let mut order = Vec::new();
        if let Some(default) = config.default {
            order.push(default);
        }
        if let Some(fallbacks) = config.fallbacks {
            order.extend(fallbacks);
        }
        if order.is_empty() {
            let mut names: Vec<String> = config.providers.keys().cloned().collect();
            names.sort();
            order = names;
        }

        let mut providers = Vec::new();
        let mut seen = HashSet::new();
        for name in order {
            if seen.contains(&name) {
                continue;
            }
            let Some(provider) = config.providers.get(&name) else {
                tracing::warn!(provider = %name, "Provider listed in order but not configured");
                continue;
            };
            providers.push(Self::build_provider(&name, provider, env)?);
            seen.insert(name);
        }

        if providers.is_empty() {
            anyhow::bail!("No valid LLM providers configured.");
        }
        tracing::info!(providers = ?providers.iter().map(|p| &p.name).collect::<Vec<_>>(), "LLM providers configured");
        Ok(Self { providers })
    }

    /// Build the provider list from environment variables.
    ///
    /// `SCOPEFORGE_LLM_PROVIDER` moves one provider to the front; every
    /// provider with credentials present is added after it.
    pub fn from_env_vars(env: &dyn Fn(&str) -> Option<String>) -> Result<Self> {
        let mut order = Vec::new();
        if let Some(preferred) = env("SCOPEFORGE_LLM_PROVIDER") {
            order.push(preferred.trim().to_lowercase());
        }
        order.extend(["openai", "gemini", "openai_compatible"].map(str::to_string));

        let mut providers = Vec::new();
        let mut seen = HashSet::new();
        for name in order {
            if seen.contains(&name) {
                continue;
            }
            if let Some(entry) = Self::build_provider_from_env(&name, env) {
                providers.push(entry);
                seen.insert(name);
            }
        }

        if providers.is_empty() {
            anyhow::bail!(
                "No LLM providers found. Set OPENAI_API_KEY, GEMINI_API_KEY, or SCOPEFORGE_LLM_BASE_URL + SCOPEFORGE_LLM_MODEL."
            );
        }
        Ok(Self { providers })
    }

    fn load_config_file(
        env: &dyn Fn(&str) -> Option<String>,
    ) -> Result<Option<ProviderRouterConfig>> {
        let path = match env(CONFIG_ENV) {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };
        if !path.exists() {
            return Ok(None);
        }
        Self::read_config(&path).map(Some)
    }

    /// Parse a router config file
    pub fn read_config(path: &Path) -> Result<ProviderRouterConfig> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read LLM config at {:?}", path))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Invalid LLM config JSON at {:?}", path))
    }

    fn build_provider(
        name: &str,
        config: &ProviderConfig,
        env: &dyn Fn(&str) -> Option<String>,
    ) -> Result<ProviderEntry> {
        let client: Arc<dyn TextGenerator> = match config {
            ProviderConfig::OpenAI {
                api_key,
                api_key_env,
                model,
                base_url,
                temperature,
                max_tokens,
            } => {
                let api_key = resolve_api_key(api_key, api_key_env, "OPENAI_API_KEY", env)?;
                let model = model.clone().unwrap_or_else(|| OPENAI_MODEL.to_string());
                let base_url = base_url.clone().unwrap_or_else(|| OPENAI_BASE_URL.to_string());
                let mut client = OpenAICompatibleClient::new("OpenAI", Some(api_key), base_url, model);
                if let Some(value) = *temperature {
                    client = client.with_temperature(value);
                }
                if let Some(value) = *max_tokens {
                    client = client.with_max_tokens(value);
                }
                Arc::new(client)
            }
            ProviderConfig::Gemini {
                api_key,
                api_key_env,
                model,
                base_url,
                temperature,
                max_tokens,
            } => {
                let api_key = resolve_api_key(api_key, api_key_env, "GEMINI_API_KEY", env)?;
                let model = model.clone().unwrap_or_else(|| GEMINI_MODEL.to_string());
                let mut client = GeminiClient::new(api_key, model);
                if let Some(url) = base_url {
                    client = client.with_base_url(url.clone());
                }
                if let Some(value) = *temperature {
                    client = client.with_temperature(value);
                }
                if let Some(value) = *max_tokens {
                    client = client.with_max_tokens(value);
                }
                Arc::new(client)
            }
            ProviderConfig::OpenAICompatible {
                name: display_name,
                api_key,
                api_key_env,
                base_url,
                model,
                temperature,
                max_tokens,
                headers,
            } => {
                let api_key = resolve_api_key_optional(api_key, api_key_env, "SCOPEFORGE_LLM_API_KEY", env);
                let display_name = display_name
                    .clone()
                    .unwrap_or_else(|| "OpenAI-Compatible".to_string());
                let mut client =
                    OpenAICompatibleClient::new(display_name, api_key, base_url.clone(), model.clone());
                if let Some(value) = *temperature {
                    client = client.with_temperature(value);
                }
                if let Some(value) = *max_tokens {
                    client = client.with_max_tokens(value);
                }
                for (key, value) in headers.iter().flatten() {
                    client = client.with_header(key.clone(), value.clone());
                }
                Arc::new(client)
            }
        };
        Ok(ProviderEntry {
            name: name.to_string(),
            client,
        })
    }

    fn build_provider_from_env(
        name: &str,
        env: &dyn Fn(&str) -> Option<String>,
    ) -> Option<ProviderEntry> {
        let client: Arc<dyn TextGenerator> = match name {
            "openai" => {
                let api_key = env("OPENAI_API_KEY")?;
                let model = env("OPENAI_MODEL").unwrap_or_else(|| OPENAI_MODEL.to_string());
                let base_url = env("OPENAI_BASE_URL").unwrap_or_else(|| OPENAI_BASE_URL.to_string());
                Arc::new(OpenAICompatibleClient::new("OpenAI", Some(api_key), base_url, model))
            }
            "gemini" => {
                let api_key = env("GEMINI_API_KEY")?;
                let model = env("GEMINI_MODEL").unwrap_or_else(|| GEMINI_MODEL.to_string());
                Arc::new(GeminiClient::new(api_key, model))
            }
            "openai_compatible" => {
                let base_url = env("SCOPEFORGE_LLM_BASE_URL")?;
                let model = env("SCOPEFORGE_LLM_MODEL")?;
                let display_name =
                    env("SCOPEFORGE_LLM_NAME").unwrap_or_else(|| "OpenAI-Compatible".to_string());
                let api_key = env("SCOPEFORGE_LLM_API_KEY");
                Arc::new(OpenAICompatibleClient::new(display_name, api_key, base_url, model))
            }
            _ => return None,
        };
        Some(ProviderEntry {
            name: name.to_string(),
            client,
        })
    }
}

fn resolve_api_key(
    explicit: &Option<String>,
    env_hint: &Option<String>,
    default_env: &str,
    env: &dyn Fn(&str) -> Option<String>,
) -> Result<String> {
    resolve_api_key_optional(explicit, env_hint, default_env, env)
        .with_context(|| format!("Missing required API key env var {}", default_env))
}

fn resolve_api_key_optional(
    explicit: &Option<String>,
    env_hint: &Option<String>,
    default_env: &str,
    env: &dyn Fn(&str) -> Option<String>,
) -> Option<String> {
    if let Some(value) = explicit.clone() {
        return Some(value);
    }
    if let Some(value) = env_hint.as_deref().and_then(env) {
        return Some(value);
    }
    env(default_env)
}

#[async_trait::async_trait]
impl TextGenerator for ProviderRouter {
    async fn generate(&self, prompt: &str, options: GenerationOptions) -> Result<String> {
        let mut errors = Vec::new();
        for provider in &self.providers {
            match provider.client.generate(prompt, options).await {
                Ok(text) => return Ok(text),
                Err(err) => {
                    tracing::warn!(provider = %provider.name, error = %err, "LLM provider failed; trying next");
                    errors.push(format!("{}: {}", provider.name, err));
                }
            }
        }
        anyhow::bail!("All LLM providers failed:\n{}", errors.join("\n"));
    }
}
