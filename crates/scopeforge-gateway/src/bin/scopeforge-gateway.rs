//! ScopeForge Gateway Binary
//!
//! # Usage
//! ```bash
//! scopeforge-gateway [--config gateway.json] [--port 8000] [--host 127.0.0.1] [--verbose]
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use scopeforge_gateway::{Gateway, GatewayConfig};
use scopeforge_providers::ProviderRouter;
use tracing_subscriber::EnvFilter;

/// ScopeForge Gateway - project scoping and chat refinement over HTTP
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON configuration file
    #[arg(short, long, env = "SCOPEFORGE_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Host to bind to (overrides config)
    #[arg(long)]
    host: Option<String>,

    /// Directory of historical project documents
    #[arg(long)]
    knowledge_path: Option<String>,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(args.verbose)
        .with_thread_ids(args.verbose)
        .init();

    let mut config = match &args.config {
        Some(path) => GatewayConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => GatewayConfig::default(),
    }
    .with_env_overrides()?;
    if let Some(host) = args.host {
        config = config.with_host(host);
    }
    if let Some(port) = args.port {
        config = config.with_port(port);
    }
    if let Some(path) = args.knowledge_path {
        config = config.with_knowledge_base_path(path);
    }

    let providers = ProviderRouter::from_env().context("configuring LLM providers")?;
    tracing::info!(providers = ?providers.provider_names(), "LLM providers ready");

    print_banner(&config.host, config.port);

    let gateway = Gateway::new(config, Arc::new(providers))?;
    gateway.start().await?;

    Ok(())
}

fn print_banner(host: &str, port: u16) {
    println!();
    println!("╔═══════════════════════════════════════════════════════════════╗");
    println!("║                     SCOPEFORGE GATEWAY                        ║");
    println!("║          Project scoping and chat-driven refinement           ║");
    println!("╚═══════════════════════════════════════════════════════════════╝");
    println!();
    println!("HTTP Server");
    println!("   └─ http://{}:{}", host, port);
    println!();
    println!("Endpoints");
    println!("   ├─ GET  /health");
    println!("   ├─ GET  /status");
    println!("   ├─ POST /api/refinement/refine");
    println!("   ├─ GET  /api/projects");
    println!("   ├─ POST /api/projects");
    println!("   ├─ GET  /api/projects/:id");
    println!("   ├─ POST /api/projects/:id/{{document,analyze,scope,refine,finalize}}");
    println!("   ├─ GET  /api/projects/:id/scope/versions");
    println!("   └─ GET  /api/knowledge/search?q=");
    println!();
    println!("Press Ctrl+C to stop the gateway");
    println!();
}
