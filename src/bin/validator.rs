//! Params Validator CLI
//!
//! Validates JSON payloads against declared action schemas and manages the
//! engine configuration.

use std::io::Read;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use param_schemas::{EngineConfig, ResponseFormat, SchemaRegistry};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "params-validator")]
#[command(about = "Validate request parameters against declared schemas")]
struct Cli {
    /// Config file to load (optional)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Declaration files or directories (added to those in the config)
    #[arg(short, long, global = true)]
    definitions: Vec<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a JSON payload for an action
    Check {
        /// Action whose schema applies
        #[arg(short, long)]
        action: String,

        /// Payload file, or "-" for stdin
        #[arg(default_value = "-")]
        input: String,

        /// Output format: json or plain (defaults to the configured one)
        #[arg(short, long)]
        format: Option<ResponseFormat>,

        /// Print the structured report instead of the client response
        #[arg(long)]
        report: bool,
    },

    /// List registered actions
    Actions,

    /// View and manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show current configuration as TOML
    Show,

    /// Initialize a new config file
    Init {
        /// Output path
        #[arg(short, long, default_value = "params.toml")]
        output: String,
    },

    /// Validate configuration and every declaration it names
    Validate,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(2);
        }
    }
}

/// Returns whether the command succeeded
fn run(cli: Cli) -> anyhow::Result<bool> {
    let mut config = EngineConfig::load_from(cli.config.as_deref())?;
    config.registry.definitions.extend(cli.definitions);

    match cli.command {
        Commands::Check {
            action,
            input,
            format,
            report,
        } => {
            let registry = SchemaRegistry::from_config(&config)?;
            let payload = read_payload(&input)?;
            let result = registry.validate(&action, &payload);

            if report {
                let output = serde_json::json!({
                    "valid": result.valid,
                    "errors": result.errors,
                    "display_messages": result.display_messages(),
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
                return Ok(result.valid);
            }

            let format = format.unwrap_or(config.response.format);
            match result.render(format, config.response.status) {
                Some(response) => {
                    println!("{}", response.body);
                    eprintln!("status: {} ({})", response.status, response.content_type);
                    Ok(false)
                }
                None => {
                    if !registry.contains(&action) {
                        eprintln!("no schema registered for '{}', nothing to validate", action);
                    }
                    println!("✅ {} - valid", action);
                    Ok(true)
                }
            }
        }

        Commands::Actions => {
            let registry = SchemaRegistry::from_config(&config)?;
            if registry.is_empty() {
                println!("No actions registered");
            }
            for action in registry.actions() {
                let attributes = registry
                    .get(action)
                    .map(|schema| schema.attributes().len())
                    .unwrap_or_default();
                println!("  {} ({} attributes)", action, attributes);
            }
            Ok(true)
        }

        Commands::Config { command } => match command {
            ConfigCommands::Show => {
                println!("{}", toml::to_string_pretty(&config)?);
                Ok(true)
            }
            ConfigCommands::Init { output } => {
                EngineConfig::default().save(&output)?;
                println!("✅ Created config file: {}", output);
                Ok(true)
            }
            ConfigCommands::Validate => {
                let registry = SchemaRegistry::from_config(&config)?;
                println!("✅ Configuration is valid");
                println!("   Max depth: {}", config.evaluation.max_depth);
                println!("   Response: {:?} ({})", config.response.format, config.response.status);
                println!("   Actions: {}", registry.len());
                Ok(true)
            }
        },
    }
}

fn read_payload(input: &str) -> anyhow::Result<serde_json::Value> {
    let content = if input == "-" {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .context("reading payload from stdin")?;
        buffer
    } else {
        std::fs::read_to_string(input).with_context(|| format!("reading payload {}", input))?
    };

    serde_json::from_str(&content).context("payload is not valid JSON")
}
