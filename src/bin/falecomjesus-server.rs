// ABOUTME: Server binary entry point
// ABOUTME: Initializes logging, loads environment configuration and runs the HTTP server
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 FaleComJesus

use anyhow::Result;
use tracing::info;

use falecomjesus_server::config::ServerConfig;
use falecomjesus_server::logging::LoggingConfig;
use falecomjesus_server::server;

#[tokio::main]
async fn main() -> Result<()> {
    LoggingConfig::from_env().init()?;

    let config = ServerConfig::from_env()?;
    info!(
        port = config.http_port,
        simulation = config.llm_simulation_mode,
        "starting falecomjesus-server"
    );

    server::run(config).await?;
    Ok(())
}
