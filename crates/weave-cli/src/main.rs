//! Weave CLI
//!
//! Inspect chaincodes of a statically configured network.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use weave_chaincode::{Chaincode, StaticNetwork};
use weave_core::NetworkConfig;

#[derive(Parser)]
#[command(name = "weave")]
#[command(version)]
#[command(about = "Weave - chaincode access over a configured network", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Network configuration file
    #[arg(short, long, global = true, env = "WEAVE_CONFIG", default_value = "network.toml")]
    config: PathBuf,

    /// Channel name; defaults to the configured default channel
    #[arg(long, global = true, env = "WEAVE_CHANNEL")]
    channel: Option<String>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List channels and their chaincodes
    Channels,

    /// Show whether a chaincode is private
    Private {
        /// Chaincode name
        chaincode: String,
    },

    /// Check that at least one peer can endorse a chaincode
    Available {
        /// Chaincode name
        chaincode: String,
    },

    /// Show the deployed version of a chaincode
    Version {
        /// Chaincode name
        chaincode: String,
    },

    /// List the endorsers of a chaincode
    Endorsers {
        /// Chaincode name
        chaincode: String,

        /// Restrict to these MSP ids
        #[arg(long, value_delimiter = ',')]
        msp: Vec<String>,

        /// Discovery deadline in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Print JSON
        #[arg(long)]
        json: bool,
    },
}

/// Filter used when `RUST_LOG` is unset
fn default_filter(verbose: bool) -> &'static str {
    if verbose {
        "debug"
    } else {
        "info"
    }
}

fn init_logging(verbose: bool) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(verbose)));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

/// Build a facade for `chaincode` on the selected channel
fn open(network: &Arc<StaticNetwork>, config: &NetworkConfig, channel: Option<&str>, chaincode: &str) -> anyhow::Result<Chaincode> {
    let channel_name = match channel {
        Some(name) => name.to_string(),
        None => config
            .default_channel()
            .map(|c| c.name.clone())
            .context("no channels configured")?,
    };
    let channel = network
        .channel(&channel_name)
        .with_context(|| format!("opening channel {}", channel_name))?;

    Ok(Chaincode::new(chaincode, network.clone(), Arc::new(channel)))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = NetworkConfig::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    tracing::info!(network = %config.name, "Loaded {} channel(s)", config.channels.len());
    let network = Arc::new(StaticNetwork::new(config.clone()));
    let channel = cli.channel.as_deref();

    match cli.command {
        Commands::Channels => {
            for channel in &config.channels {
                let marker = if channel.default { " (default)" } else { "" };
                println!("{}{}", channel.name, marker);
                for chaincode in &channel.chaincodes {
                    let visibility = if chaincode.private { "private" } else { "public" };
                    println!("  {} [{}]", chaincode.name, visibility);
                }
            }
        }
        Commands::Private { chaincode } => {
            let cc = open(&network, &config, channel, &chaincode)?;
            println!("{}", cc.is_private());
        }
        Commands::Available { chaincode } => {
            let cc = open(&network, &config, channel, &chaincode)?;
            let available = cc.is_available().await?;
            println!("{}", available);
            if !available {
                std::process::exit(1);
            }
        }
        Commands::Version { chaincode } => {
            let cc = open(&network, &config, channel, &chaincode)?;
            println!("{}", cc.version().await?);
        }
        Commands::Endorsers { chaincode, msp, timeout_ms, json } => {
            let cc = open(&network, &config, channel, &chaincode)?;
            let mut discovery = cc.new_discover();
            if !msp.is_empty() {
                discovery = discovery.with_filter_by_msp_ids(msp);
            }
            if let Some(ms) = timeout_ms {
                discovery = discovery.with_timeout(Duration::from_millis(ms));
            }

            let endorsers = discovery.endorsers().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&endorsers)?);
            } else {
                for endorser in &endorsers {
                    println!("{}  {:<12} {}", endorser.id, endorser.msp_id, endorser.endpoint);
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter() {
        assert_eq!(default_filter(false), "info");
        assert_eq!(default_filter(true), "debug");
    }

    #[test]
    fn test_cli_parses_endorsers() {
        let cli = Cli::parse_from(["weave", "endorsers", "escrow", "--msp", "Org1MSP,Org2MSP"]);
        match cli.command {
            Commands::Endorsers { chaincode, msp, timeout_ms, .. } => {
                assert_eq!(chaincode, "escrow");
                assert_eq!(msp, vec!["Org1MSP".to_string(), "Org2MSP".to_string()]);
                assert_eq!(timeout_ms, None);
            }
            _ => panic!("expected endorsers command"),
        }
    }
}
