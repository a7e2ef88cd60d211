//! Pongnet - Networked Pong protocol client
//!
//! Joins a round on a remote Pong game server: negotiates the session over
//! TCP, then ingests the UDP object position stream until the round ends.

mod config;
mod network;
mod protocol;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use config::Config;
use network::{resolve_host, SessionOptions};
use protocol::StateSnapshot;

/// Pongnet - Networked Pong protocol client
#[derive(Parser)]
#[command(name = "pongnet")]
#[command(author = "Pongnet Contributors")]
#[command(version = "0.1.0")]
#[command(about = "Join a round on a remote Pong game server", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a session, play one round, and report the winner
    Play {
        /// Server address to connect to
        #[arg(short, long)]
        server: Option<String>,

        /// Server control port
        #[arg(short, long, default_value_t = protocol::DEFAULT_PORT)]
        port: u16,
    },

    /// Show current configuration
    Config {
        /// Generate sample configuration
        #[arg(long)]
        generate: bool,

        /// Output path for generated config
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show protocol information
    Info,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = if let Some(config_path) = &cli.config {
        Config::load(config_path)?
    } else {
        Config::load_default().unwrap_or_default()
    };

    // Initialize logging
    let filter = if cli.verbose || config.general.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    match cli.command {
        Commands::Play { server, port } => {
            run_play(config, server, port).await?;
        }
        Commands::Config { generate, output } => {
            if generate {
                let sample = config::generate_sample_config();
                if let Some(path) = output {
                    std::fs::write(&path, &sample)?;
                    println!("Configuration written to: {}", path.display());
                } else {
                    println!("{}", sample);
                }
            } else {
                println!("{}", toml::to_string_pretty(&config)?);
            }
        }
        Commands::Info => {
            print_protocol_info();
        }
    }

    Ok(())
}

/// Play one round against the server
async fn run_play(config: Config, server: Option<String>, port: u16) -> anyhow::Result<()> {
    let host = server.unwrap_or_else(|| config.network.host.clone());
    let port = if port != protocol::DEFAULT_PORT {
        port
    } else {
        config.network.port
    };
    let server_addr = resolve_host(&host, port).await?;

    println!("\n========================================");
    println!("  Pongnet Client");
    println!("========================================");
    println!("  Server: {}", server_addr);
    println!(
        "  Field: {}x{}",
        config.session.field_width, config.session.field_height
    );
    println!(
        "  Win score: {}, time limit: {} s",
        config.session.win_score, config.session.game_time
    );
    println!("========================================\n");

    let options = SessionOptions {
        server: server_addr,
        connect_timeout: std::time::Duration::from_millis(config.network.connect_timeout_ms),
    };

    // The state consumer: the core hands each decoded snapshot to this
    // sink; everything fancier than a status line belongs to a renderer.
    let outcome = network::run(&config.session, &options, |s: StateSnapshot| {
        tracing::trace!(
            "ball ({:.1}, {:.1}) paddles ({:.1}, {:.1})",
            s.ball_x,
            s.ball_y,
            s.paddle_a,
            s.paddle_b
        );
        print!(
            "\rball ({:7.1}, {:7.1})  paddle A {:7.1}  paddle B {:7.1}",
            s.ball_x, s.ball_y, s.paddle_a, s.paddle_b
        );
        use std::io::Write;
        let _ = std::io::stdout().flush();
    })
    .await?;

    println!("\n\nRound ended, winner: {}", outcome.winner);

    Ok(())
}

/// Print protocol information
fn print_protocol_info() {
    println!("Pongnet Protocol Information");
    println!("============================\n");
    println!("Default server port: {}", protocol::DEFAULT_PORT);
    println!("Control channel queries:");
    println!("  {:>3}  CreateSession", protocol::QUERY_CREATE_SESSION);
    println!("  {:>3}  BeginRound / round-end event", protocol::QUERY_BEGIN_ROUND);
    println!("  {:>3}  Heartbeat", protocol::QUERY_PING);
    println!(
        "State stream datagram: {} bytes (4 x f32 LE)",
        protocol::SNAPSHOT_LEN
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        // Test that CLI parsing works
        let cli = Cli::try_parse_from(["pongnet", "info"]);
        assert!(cli.is_ok());
    }

    #[test]
    fn test_play_args() {
        let cli = Cli::try_parse_from(["pongnet", "play", "--server", "10.0.0.2", "--port", "9180"]);
        assert!(cli.is_ok());
    }
}
