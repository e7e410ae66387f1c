// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! contract-rpc demo CLI
//!
//! Declares the library service, serves it through an in-memory dispatcher
//! and calls it through a proxy.
//!
//! # Usage
//!
//! ```bash
//! # Defaults
//! contract-rpc-demo
//!
//! # From a config file, with a shorter call timeout
//! contract-rpc-demo --config rpc.toml --timeout-ms 500
//! ```

mod library;

use anyhow::{Context, Result};
use clap::Parser;
use contract_rpc::{Catalog, Dispatcher, Proxy, RpcConfig, RpcError};
use library::{Library, LibraryClient, TestBookError};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "contract-rpc-demo")]
#[command(author = "naskel.com")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Declare, serve and call the library service in-process")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (overrides the config file)
    #[arg(short, long)]
    log_level: Option<String>,

    /// Per-call timeout in milliseconds, 0 for none (overrides the config file)
    #[arg(long)]
    timeout_ms: Option<u64>,
}

fn load_config(cli: &Cli) -> Result<RpcConfig> {
    let mut config = match &cli.config {
        Some(path) => RpcConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => RpcConfig::default(),
    };
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }
    if let Some(ms) = cli.timeout_ms {
        config.proxy.call_timeout_ms = ms;
    }
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    // RUST_LOG wins over the configured level.
    let filter = EnvFilter::try_from_default_env()
        .ok()
        .or_else(|| {
            EnvFilter::try_new(format!(
                "contract_rpc={0},contract_rpc_demo={0}",
                config.log_level
            ))
            .ok()
        })
        .unwrap_or_else(|| EnvFilter::new("info"));
    fmt().with_env_filter(filter).with_target(false).init();

    let descriptor = library::descriptor(&config.service_name);
    let mut catalog = Catalog::new();
    catalog.insert(descriptor.clone())?;

    println!("contract-rpc demo v{}", env!("CARGO_PKG_VERSION"));
    println!("=========================");
    for service in catalog.list() {
        println!("service {}", service.name);
        for method in &service.methods {
            println!(
                "  {}({} param(s)){}{}",
                method.name,
                method.arity,
                if method.has_output { " -> value" } else { "" },
                if method.errors.is_empty() {
                    String::new()
                } else {
                    format!(" throws {}", method.errors.join(", "))
                }
            );
        }
    }
    println!();

    let dispatcher = Arc::new(Dispatcher::build(
        descriptor.clone(),
        Arc::new(Library::default()),
    )?);
    let client = LibraryClient::new(Proxy::with_config(
        descriptor,
        dispatcher.clone(),
        &config.proxy,
    )?);

    client.ping().await?;
    println!("ping: ok");

    println!("getBooks: {:?}", client.get_books().await?);

    let book = client.update_book(1, "The Left Hand of Darkness").await?;
    println!("updateBook(1): {:?}", book);

    match client.update_book(-1, "Nowhere").await {
        Err(RpcError::Declared(failure)) if failure.is::<TestBookError>() => {
            println!("updateBook(-1): {} ({})", failure.kind(), failure.detail());
        }
        Err(e) => return Err(e.into()),
        Ok(book) => anyhow::bail!("updateBook(-1) unexpectedly returned {:?}", book),
    }

    println!("getBooks: {:?}", client.get_books().await?);
    tracing::info!("{} call(s) handled", dispatcher.calls_handled());

    Ok(())
}
