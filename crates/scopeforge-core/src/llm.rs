//! Text generation seam and model-output parsing.
//!
//! Every language-model interaction in the core goes through [`TextGenerator`],
//! injected at construction. Concrete HTTP providers live in
//! `scopeforge-providers`; tests use deterministic stubs.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, ScopeError};

/// Per-call generation knobs
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    pub max_tokens: Option<u32>,
    pub temperature: Option<f64>,
}

impl GenerationOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Low temperature for structured extraction
    pub fn structured() -> Self {
        Self::new().with_temperature(0.1).with_max_tokens(1024)
    }
}

/// Language model text generation
#[async_trait::async_trait]
pub trait TextGenerator: Send + Sync + std::fmt::Debug {
    /// Complete `prompt`, returning the raw model text
    async fn generate(&self, prompt: &str, options: GenerationOptions) -> anyhow::Result<String>;
}

#[async_trait::async_trait]
impl<T: TextGenerator + ?Sized> TextGenerator for Arc<T> {
    async fn generate(&self, prompt: &str, options: GenerationOptions) -> anyhow::Result<String> {
        (**self).generate(prompt, options).await
    }
}

/// Run a generation bounded by `timeout`; timeouts become errors.
pub async fn generate_with_timeout(
    generator: &dyn TextGenerator,
    prompt: &str,
    options: GenerationOptions,
    timeout: Duration,
) -> Result<String> {
    match tokio::time::timeout(timeout, generator.generate(prompt, options)).await {
        Ok(Ok(text)) => Ok(text),
        Ok(Err(e)) => Err(ScopeError::Generation(e.to_string())),
        Err(_) => Err(ScopeError::Generation(format!(
            "no response within {}ms",
            timeout.as_millis()
        ))),
    }
}

fn strip_fences(text: &str) -> String {
    text.replace("```json", "")
        .replace("```JSON", "")
        .replace("```", "")
}

/// Locate the first balanced JSON object or array in model output.
///
/// Code fences are stripped first; braces inside string literals are ignored.
pub fn extract_json(text: &str) -> Result<Value> {
    let text = strip_fences(text);
    let start = text
        .char_indices()
        .find(|(_, c)| *c == '{' || *c == '[')
        .map(|(i, _)| i)
        .ok_or_else(|| ScopeError::ModelOutput("no JSON object or array found".into()))?;

    let bytes = text.as_bytes();
    let (open, close) = if bytes[start] == b'{' {
        (b'{', b'}')
    } else {
        (b'[', b']')
    };

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    let mut end = None;

    for (offset, &byte) in bytes[start..].iter().enumerate() {
        if in_string {
            match byte {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match byte {
            b'"' => in_string = true,
            b if b == open => depth += 1,
            b if b == close => {
                depth -= 1;
                if depth == 0 {
                    end = Some(start + offset + 1);
                    break;
                }
            }
            _ => {}
        }
    }

    let end = end.ok_or_else(|| ScopeError::ModelOutput("unbalanced JSON in response".into()))?;
    Ok(serde_json::from_str(&text[start..end])?)
}

/// [`extract_json`] followed by typed deserialization
pub fn parse_model_json<T: DeserializeOwned>(text: &str) -> Result<T> {
    let value = extract_json(text)?;
    serde_json::from_value(value).map_err(|e| ScopeError::ModelOutput(e.to_string()))
}
