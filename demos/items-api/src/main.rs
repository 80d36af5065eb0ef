use std::process::ExitCode;

use apiary::apiary_openapi::cli;
use apiary::prelude::*;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "items-api", version, about = "Items API demo")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the API
    Serve {
        /// Listen address
        #[arg(long, default_value = "0.0.0.0:3000")]
        addr: String,
    },
    /// OpenAPI commands
    Openapi {
        #[command(subcommand)]
        command: OpenApiCommand,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    apiary::init_tracing();
    let args = Cli::parse();

    // no config file and no env: fall back to the demo defaults
    let config = AppConfig::load("dev").unwrap_or_else(|_| AppConfig::empty());
    let registry = match items_api::registry(&config) {
        Ok(registry) => registry,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    match args.command {
        Commands::Openapi { command } => cli::execute(&command, &registry),
        Commands::Serve { addr } => serve(&registry, &addr).await,
    }
}

async fn serve(registry: &ApiRegistry, addr: &str) -> ExitCode {
    let router = match registry.router() {
        Ok(router) => router,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            eprintln!("Error: cannot bind {addr}: {e}");
            return ExitCode::FAILURE;
        }
    };
    tracing::info!(%addr, "serving items API");
    if let Err(e) = axum::serve(listener, router).await {
        tracing::error!(error = %e, "server error");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
