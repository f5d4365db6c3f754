//! # goban
//!
//! Command-line front end for the goban client.
//!
//! ## Commands
//!
//! - `replay`: Show an SGF record at any move, optionally scored
//! - `watch`: Follow (or play, with `--play`) a live game
//! - `lobby`: List open challenges as they come and go
//!
//! ## Example
//!
//! ```bash
//! # Final position of a record
//! goban replay game.sgf
//!
//! # Move 120, scored with two dead white stones
//! goban replay game.sgf --move 120 --dead pd,qd --komi 6.5
//!
//! # Follow game 123 with the default config
//! goban watch 123
//!
//! # Play it, reading moves from stdin
//! goban watch 123 --play --config ./goban.toml
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;

use commands::{lobby, replay, watch};

/// Command-line front end for the goban client.
#[derive(Parser, Debug)]
#[command(name = "goban")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Replay an SGF record offline
    Replay {
        /// SGF file
        file: PathBuf,

        /// Show the position after this many moves (default: the end)
        #[arg(long = "move", short = 'm')]
        at: Option<usize>,

        /// Comma-separated dead stones to score with, e.g. `aa,bb`
        #[arg(long)]
        dead: Option<String>,

        /// Komi to score with (default: the record's, else 0)
        #[arg(long, allow_negative_numbers = true)]
        komi: Option<f64>,
    },

    /// Follow a live game
    Watch {
        /// Game id
        game_id: u64,

        /// Read moves and commands from stdin
        #[arg(long)]
        play: bool,

        /// Config file (default: the per-user config, if present)
        #[arg(long, short)]
        config: Option<PathBuf>,
    },

    /// List open lobby challenges
    Lobby {
        /// Config file (default: the per-user config, if present)
        #[arg(long, short)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Replay { file, at, dead, komi } => {
            replay::run(&file, at, dead.as_deref(), komi).await?;
        }
        Commands::Watch { game_id, play, config } => {
            let config = config::load(config.as_deref())?;
            watch::run(config, game_id, play).await?;
        }
        Commands::Lobby { config } => {
            let config = config::load(config.as_deref())?;
            lobby::run(config).await?;
        }
    }

    Ok(())
}
