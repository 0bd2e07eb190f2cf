//! ScopeForge Providers
//!
//! Concrete [`TextGenerator`](scopeforge_core::TextGenerator) implementations
//! over HTTP: any OpenAI-compatible chat completions endpoint and Google
//! Gemini. [`ProviderRouter`] tries configured providers in order and moves
//! on to the next one only when a provider fails.

#![deny(unsafe_code)]
#![warn(rust_2018_idioms, missing_debug_implementations)]

pub mod gemini;
pub mod openai_compatible;
pub mod router;

pub use gemini::GeminiClient;
pub use openai_compatible::OpenAICompatibleClient;
pub use router::{ProviderConfig, ProviderRouter, ProviderRouterConfig};

/// Instructions sent as the system message with every prompt
pub const SYSTEM_PROMPT: &str = "You are an expert software project consultant. You produce \
     precise project scopes and follow output format instructions exactly.";

/// Defaults when neither the provider config nor the call sets them
pub const DEFAULT_TEMPERATURE: f64 = 0.3;
pub const DEFAULT_MAX_TOKENS: u32 = 4096;
