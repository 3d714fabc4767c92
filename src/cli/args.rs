//! CLI argument definitions using clap

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand, ValueHint};

/// Drive saved story sessions: create, advance, stop and inspect them
#[derive(Parser, Debug)]
#[command(name = "storyrun")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Debug output (-d info, -dd debug, -ddd trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub debug: u8,

    /// Config file layered over the global config
    #[arg(long, global = true, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a session from a story script
    New {
        /// Session name (under save_dir) or path
        session: String,
        /// TOML story script
        #[arg(value_hint = ValueHint::FilePath)]
        script: PathBuf,
        /// Replace an existing session
        #[arg(short, long)]
        force: bool,
    },

    /// Advance a session, starting it if idle
    Run {
        /// Session name (under save_dir) or path
        session: String,
        /// Maximum ticks (default: max_ticks from config)
        #[arg(short = 'n', long)]
        ticks: Option<u64>,
        /// Keep the session running even when a tick reports success
        #[arg(long)]
        keep_running: bool,
    },

    /// End a running session, restoring its pre-run topology
    Stop {
        /// Session name (under save_dir) or path
        session: String,
    },

    /// Show the topology and active nodes of a session
    Inspect {
        /// Session name (under save_dir) or path
        session: String,
    },

    /// Manage settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Generate shell completions
    Completion {
        /// Shell type
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show merged config
    Show,

    /// Print a config template
    Template,

    /// Show config paths
    Path,
}
