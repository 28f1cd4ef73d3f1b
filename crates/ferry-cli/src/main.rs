//! Ferry CLI
//!
//! Share-code rendezvous file transfer through a relay or over the local
//! network.

mod config;
mod progress;
mod ui;

use clap::{Parser, Subcommand};
use config::Config;
use ferry_core::{CancelToken, Receiver, ReceiverOptions, Sender, SenderOptions, TransferError};
use ferry_relay::{DEFAULT_RELAY_HOST, DEFAULT_RELAY_PORT, Relay, RegistryConfig};
use rand::Rng;
use std::path::PathBuf;
use std::sync::Arc;
use ui::ConsoleUi;

/// Ferry - send files to another computer with a short share code
#[derive(Parser)]
#[command(name = "ferry")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Configuration file path
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send files or folders
    Send {
        /// Files or folders to send; `*` patterns are expanded
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Share code for the session; generated when absent
        #[arg(short = 'c', long)]
        share_code: Option<String>,

        /// Archive each folder into a zip before sending
        #[arg(long)]
        zip: bool,

        /// Relay address
        #[arg(long)]
        relay: Option<String>,

        /// Skip the relay and serve the receiver on the local network
        #[arg(long)]
        local: bool,

        /// Listen port for local-network mode
        #[arg(long)]
        local_port: Option<u16>,
    },

    /// Receive files
    Receive {
        /// Share code; prompted for when absent
        share_code: Option<String>,

        /// Relay address
        #[arg(long)]
        relay: Option<String>,

        /// Output directory
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Find the sender by broadcast on the local network
        #[arg(long)]
        local: bool,

        /// The sender's port in local-network mode
        #[arg(long)]
        local_port: Option<u16>,

        /// Accept the transfer and overwrites without prompting
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// Run a rendezvous relay
    Relay {
        /// Listen host
        #[arg(long, default_value = DEFAULT_RELAY_HOST)]
        host: String,

        /// Listen port
        #[arg(long, default_value_t = DEFAULT_RELAY_PORT)]
        port: u16,
    },

    /// Print the version
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(if cli.verbose { "debug" } else { "info" })
        .with_writer(std::io::stderr)
        .init();

    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::load_or_default()?,
    };
    config.validate()?;

    let cancel = CancelToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        });
    }

    match cli.command {
        Commands::Send {
            paths,
            share_code,
            zip,
            relay,
            local,
            local_port,
        } => {
            let options = SenderOptions {
                share_code: share_code.unwrap_or_else(generate_share_code),
                relay: relay.unwrap_or_else(|| config.relay.address.clone()),
                zip,
                local_network: local,
                local_port: local_port.unwrap_or(config.local.port),
            };
            let sender = Sender::new(options, Arc::new(ConsoleUi::new()), cancel);
            finish(sender.run(&paths).await)
        }

        Commands::Receive {
            share_code,
            relay,
            out,
            local,
            local_port,
            yes,
        } => {
            let share_code = match share_code {
                Some(code) => code,
                None => prompt_share_code()?,
            };
            let options = ReceiverOptions {
                share_code,
                relay: relay.unwrap_or_else(|| config.relay.address.clone()),
                out_path: out.unwrap_or_else(|| config.receive.out_path.clone()),
                local_network: local,
                local_port: local_port.unwrap_or(config.local.port),
                assume_yes: yes,
            };
            let receiver = Receiver::new(options, Arc::new(ConsoleUi::new()), cancel);
            finish(receiver.run().await)
        }

        Commands::Relay { host, port } => {
            let relay = Relay::bind(&format!("{host}:{port}"), RegistryConfig::default()).await?;
            eprintln!("relay listening on {}", relay.local_addr()?);
            tokio::select! {
                res = relay.run() => res?,
                _ = cancel.cancelled() => {}
            }
            Ok(())
        }

        Commands::Version => {
            println!("ferry {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// Map a transfer outcome to process exit semantics: a local interrupt is
/// not a failure.
fn finish(result: Result<(), TransferError>) -> anyhow::Result<()> {
    match result {
        Ok(()) => Ok(()),
        Err(TransferError::Interrupted) => {
            eprintln!("interrupted");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// Four random hex pairs joined by dashes, e.g. `a3f1-09be-4c22-d810`.
fn generate_share_code() -> String {
    let mut rng = rand::thread_rng();
    (0..4)
        .map(|_| {
            let pair: [u8; 2] = rng.gen();
            hex::encode(pair)
        })
        .collect::<Vec<_>>()
        .join("-")
}

fn prompt_share_code() -> anyhow::Result<String> {
    let term = console::Term::stderr();
    term.write_str("share code: ")?;
    let code = term.read_line()?;
    Ok(code.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_share_code_shape() {
        let code = generate_share_code();
        let groups: Vec<&str> = code.split('-').collect();
        assert_eq!(groups.len(), 4);
        for group in groups {
            assert_eq!(group.len(), 4);
            assert!(group.chars().all(|c| c.is_ascii_hexdigit()));
        }
    }

    #[test]
    fn test_generated_codes_differ() {
        assert_ne!(generate_share_code(), generate_share_code());
    }
}
