//! Command-line interface for voxnexus
//!
//! Provides argument parsing using clap derive macros.

use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use std::path::PathBuf;

/// Real-time voice session pipeline
#[derive(Parser, Debug)]
#[command(name = "voxnexus", version, about = "Real-time voice session pipeline")]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose logging (-v: debug, -vv: trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Log filter implied by `-q`/`-v`, used when `RUST_LOG` is unset.
    pub fn log_filter(&self) -> &'static str {
        if self.quiet {
            return "voxnexus=warn";
        }
        match self.verbose {
            0 => "voxnexus=info",
            1 => "voxnexus=debug",
            _ => "voxnexus=trace",
        }
    }
}

/// Packet codec used by `simulate` and `roundtrip`
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecChoice {
    /// Opus when libopus is available, otherwise raw PCM
    Auto,
    /// Opus (requires libopus)
    Opus,
    /// Raw little-endian 16-bit PCM
    Pcm16,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a session with the reference recognizer and synthesizer
    Simulate {
        /// WAV file to stream (default: silence)
        #[arg(long, value_name = "FILE")]
        wav: Option<PathBuf>,

        /// Seconds of silence to stream when no WAV file is given
        #[arg(long, short = 's', value_name = "SECONDS", default_value = "3")]
        seconds: u32,

        /// Packet codec
        #[arg(long, value_enum, default_value = "auto")]
        codec: CodecChoice,
    },

    /// Encode a WAV file into packets and decode it back
    Roundtrip {
        /// Input WAV file
        input: PathBuf,

        /// Output WAV file
        output: PathBuf,

        /// Packet codec
        #[arg(long, value_enum, default_value = "auto")]
        codec: CodecChoice,
    },

    /// Report codec availability and validate configuration
    Check,

    /// View configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

/// Configuration actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration (file + environment overrides) as TOML
    Show,
    /// Print the default configuration file path
    Path,
}
