//! ScopeForge Gateway - HTTP surface for project scoping
//!
//! Exposes the project workflow (profile, document upload, analysis, scope
//! generation, chat refinement, finalization) and a stateless refinement
//! endpoint over one axum router.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                  ScopeForge Gateway                   │
//! ├──────────────────────────────────────────────────────┤
//! │   /api/projects/*    /api/refinement    /api/knowledge│
//! │          │                  │                 │       │
//! │   ┌──────▼──────┐   ┌───────▼───────┐  ┌──────▼────┐ │
//! │   │ProjectStore │   │RefinementEngine│ │ Knowledge │ │
//! │   └──────┬──────┘   └───────┬───────┘  │   Base    │ │
//! │          │          ┌───────▼───────┐  └───────────┘ │
//! │          └─────────►│ ScopeGenerator│                 │
//! │                     └───────┬───────┘                 │
//! │                     ┌───────▼───────┐                 │
//! │                     │ProviderRouter │                 │
//! │                     └───────────────┘                 │
//! └──────────────────────────────────────────────────────┘
//! ```

#![deny(unsafe_code)]
#![warn(rust_2018_idioms)]

pub mod config;
pub mod error;
pub mod gateway;
pub mod store;

pub use config::{CorsSettings, GatewayConfig};
pub use error::{GatewayError, Result};
pub use gateway::{Gateway, GatewayState};
pub use store::{ApprovalStatus, ProjectRecord, ProjectStore, ScopeVersion};

/// Gateway version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default HTTP port
pub const DEFAULT_PORT: u16 = 8000;

/// Default host
pub const DEFAULT_HOST: &str = "127.0.0.1";
