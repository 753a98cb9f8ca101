//! Command-line entry point for the natter chat client.
//!
//! Argument parsing, logging setup, and the exit-status contract live
//! here; everything session-shaped lives in the `natter` crate. The
//! client instance is owned by `main` and passed down explicitly, so
//! there is no process-wide mutable client state.
//!
//! Exit status: 0 for a clean end (end of input, server `BYE`), 1 for an
//! abnormal one (fatal server `ERR`, unreachable server, transport
//! failure). Usage errors exit with clap's status 2.

use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, ValueEnum};

use natter::{ChatClient, ClientConfig, DatagramClient, ExitKind, StreamClient};
use natter_reliability::RetryConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Transport {
    /// Text protocol over a TCP stream.
    Tcp,
    /// Binary protocol over UDP datagrams with confirms.
    Udp,
}

/// Chat client speaking the natter protocol over TCP or UDP.
#[derive(Debug, Parser)]
#[command(name = "natter", version, about)]
struct Args {
    /// Transport protocol to use.
    #[arg(short = 't', long, value_enum)]
    transport: Transport,

    /// Server hostname or IP address.
    #[arg(short = 's', long)]
    server: String,

    /// Server port.
    #[arg(short = 'p', long, default_value_t = 4567)]
    port: u16,

    /// Confirmation timeout in milliseconds (UDP only).
    #[arg(short = 'd', long = "timeout", default_value_t = 250)]
    timeout_ms: u64,

    /// Retransmission count before a send is reported failed (UDP only).
    #[arg(short = 'r', long, default_value_t = 3)]
    retries: u8,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Diagnostics go to stderr via RUST_LOG; stdout belongs to the chat.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut config = ClientConfig::new(args.server.clone(), args.port);
    config.retry = RetryConfig {
        timeout: Duration::from_millis(args.timeout_ms),
        max_retries: args.retries,
    };

    let exit: ExitKind = match args.transport {
        Transport::Tcp => {
            let client = StreamClient::connect(config).await.with_context(|| {
                format!("cannot reach {}:{} over tcp", args.server, args.port)
            })?;
            client.run().await?
        }
        Transport::Udp => {
            let client = DatagramClient::connect(config).await.with_context(|| {
                format!("cannot set up a udp socket for {}:{}", args.server, args.port)
            })?;
            client.run().await?
        }
    };

    tracing::debug!(?exit, "session ended");
    Ok(ExitCode::from(exit.code()))
}
