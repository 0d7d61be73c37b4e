//! # PHOSPHOR Server Binary
//!
//! The authoritative playground process.
//!
//! ## Usage
//!
//! ```bash
//! psmove-daemon | phosphor_server --bind 0.0.0.0:3000 --config phosphor.toml
//! ```
//!
//! Wand telemetry arrives on stdin, viewers connect over TCP with
//! newline-delimited JSON.

use std::path::PathBuf;

use tracing_subscriber::EnvFilter;

use phosphor_core::FlatTerrain;
use phosphor_server::{run, ServerConfig};

fn print_help() {
    println!("Usage: phosphor_server [OPTIONS]");
    println!();
    println!("Options:");
    println!("  -c, --config <PATH>      TOML config file");
    println!("  -b, --bind <ADDR>        Viewer listener address (default: 0.0.0.0:3000)");
    println!("  -t, --tick-rate <RATE>   Simulation tick rate in Hz (default: 50)");
    println!("      --reap               Remove avatars when their connection closes");
    println!("  -h, --help               Show this help");
}

fn parse_args(config: &mut ServerConfig) -> Result<Option<PathBuf>, String> {
    let args: Vec<String> = std::env::args().collect();
    let mut config_path = None;
    let mut overrides: Vec<Box<dyn FnOnce(&mut ServerConfig)>> = Vec::new();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                let value = args.get(i + 1).ok_or("--config needs a path")?;
                config_path = Some(PathBuf::from(value));
                i += 1;
            }
            "--bind" | "-b" => {
                let value = args.get(i + 1).ok_or("--bind needs an address")?.clone();
                overrides.push(Box::new(move |c| c.bind_address = value));
                i += 1;
            }
            "--tick-rate" | "-t" => {
                let value: u32 = args
                    .get(i + 1)
                    .ok_or("--tick-rate needs a number")?
                    .parse()
                    .map_err(|_| "--tick-rate needs a number")?;
                overrides.push(Box::new(move |c| c.simulation.tick_rate = value));
                i += 1;
            }
            "--reap" => overrides.push(Box::new(|c| c.reap_on_disconnect = true)),
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            other => return Err(format!("unknown option {other:?}")),
        }
        i += 1;
    }

    // File first, flags on top.
    if let Some(path) = &config_path {
        *config = ServerConfig::load(path).map_err(|err| err.to_string())?;
    }
    for apply in overrides {
        apply(config);
    }
    Ok(config_path)
}

#[tokio::main]
async fn main() {
    println!("╔══════════════════════════════════════════════════════════════════╗");
    println!("║         PHOSPHOR SERVER                                          ║");
    println!("║         THE AUTHORITATIVE PLAYGROUND                             ║");
    println!("╚══════════════════════════════════════════════════════════════════╝");
    println!();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut config = ServerConfig::default();
    let config_path = match parse_args(&mut config) {
        Ok(path) => path,
        Err(err) => {
            eprintln!("error: {err}");
            print_help();
            std::process::exit(2);
        }
    };

    println!("┌─ CONFIGURATION ─────────────────────────────────────────────────┐");
    println!("│ Bind Address:       {}", config.bind_address);
    println!("│ Tick Rate:          {} Hz", config.simulation.tick_rate);
    println!("│ Reap On Disconnect: {}", config.reap_on_disconnect);
    if let Some(path) = &config_path {
        println!("│ Config File:        {}", path.display());
    }
    println!("└──────────────────────────────────────────────────────────────────┘");
    println!();

    // Heightmap-backed terrain arrives through the asset collaborator;
    // standalone runs get the flat floor.
    let terrain = Box::new(FlatTerrain::default());

    if let Err(err) = run(config, terrain).await {
        tracing::error!(%err, "server failed");
        std::process::exit(1);
    }
}
