use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use owo_colors::OwoColorize;
use std::path::Path;
use voxnexus::app::{run_roundtrip, run_simulate, simulation_frames};
use voxnexus::cli::{Cli, Commands, ConfigAction};
use voxnexus::config::Config;
use voxnexus::diagnostics::check_environment;

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_filter());

    match cli.command {
        Commands::Simulate {
            wav,
            seconds,
            codec,
        } => {
            let config = load_config(cli.config.as_deref())?;
            let frames = simulation_frames(&config, wav.as_deref(), seconds)?;
            let report = run_simulate(&config, frames, codec, std::io::stdout())?;
            eprintln!(
                "{} {} frames in, {} events, {} packets ({} bytes)",
                "simulate:".dimmed(),
                report.frames_pushed,
                report.events,
                report.packets.green(),
                report.packet_bytes
            );
            if report.dropped_frames > 0 {
                eprintln!(
                    "{} {} frames dropped (queue full)",
                    "simulate:".dimmed(),
                    report.dropped_frames.yellow()
                );
            }
        }
        Commands::Roundtrip {
            input,
            output,
            codec,
        } => {
            let config = load_config(cli.config.as_deref())?;
            let report = run_roundtrip(&config, &input, &output, codec)
                .with_context(|| format!("roundtrip of {} failed", input.display()))?;
            let seconds = report.samples as f64 / report.sample_rate as f64;
            let kbps = if seconds > 0.0 {
                report.packet_bytes as f64 * 8.0 / seconds / 1000.0
            } else {
                0.0
            };
            println!(
                "{} {} packets, {} bytes, {:.2}s @ {} Hz ({:.1} kbit/s) → {}",
                report.codec.green(),
                report.packets,
                report.packet_bytes,
                seconds,
                report.sample_rate,
                kbps,
                output.display()
            );
        }
        Commands::Check => {
            let config = load_config(cli.config.as_deref())?;
            if !check_environment(&config) {
                std::process::exit(1);
            }
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => {
                let config = load_config(cli.config.as_deref())?;
                print!("{}", config.to_toml()?);
            }
            ConfigAction::Path => match cli.config.or_else(Config::default_path) {
                Some(path) => println!("{}", path.display()),
                None => anyhow::bail!("Could not determine config directory"),
            },
        },
        Commands::Completions { shell } => {
            clap_complete::generate(
                shell,
                &mut Cli::command(),
                "voxnexus",
                &mut std::io::stdout(),
            );
        }
    }

    Ok(())
}

/// Install the fmt subscriber; `RUST_LOG` wins over `-q`/`-v`.
fn init_logging(default_filter: &str) {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .init();
}

/// Load configuration from the given path, or the default path if it exists.
fn load_config(custom_path: Option<&Path>) -> Result<Config> {
    let config = if let Some(path) = custom_path {
        Config::load(path).with_context(|| format!("failed to load {}", path.display()))?
    } else {
        match Config::default_path() {
            Some(path) => Config::load_or_default(&path)?,
            None => Config::default(),
        }
    };

    // Apply environment variable overrides
    Ok(config.with_env_overrides())
}
