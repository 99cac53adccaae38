//! Command-line entry point for the Parley chat client.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use parley::{
    ChannelId, ClientConfig, RetryPolicy, TcpChat, TransportMode, UdpChat,
    chat,
};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "parley",
    version,
    about = "Chat client speaking one protocol over TCP (text) or UDP (binary)"
)]
struct Args {
    /// Transport to use.
    #[arg(short = 't', long, value_enum)]
    transport: Transport,

    /// Server host name or IP address.
    #[arg(short = 's', long)]
    server: String,

    /// Server port.
    #[arg(short = 'p', long, default_value_t = 4567)]
    port: u16,

    /// UDP confirmation timeout in milliseconds.
    #[arg(short = 'd', long, default_value_t = 250)]
    delay: u64,

    /// UDP retransmission count after the original send.
    #[arg(short = 'r', long, default_value_t = 3)]
    retransmissions: u8,

    /// Channel that inbound traffic belongs to before the first /join.
    #[arg(short = 'c', long)]
    channel: Option<String>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Transport {
    Tcp,
    Udp,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Diagnostics go to stderr and are off unless RUST_LOG asks for
    // them; stdout is reserved for chat.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let server = resolve(&args.server, args.port).await?;
    let default_channel = args
        .channel
        .map(ChannelId::new)
        .transpose()
        .context("invalid --channel value")?;

    let config = ClientConfig {
        mode: match args.transport {
            Transport::Tcp => TransportMode::Tcp,
            Transport::Udp => TransportMode::Udp,
        },
        server,
        retry: RetryPolicy {
            delay: Duration::from_millis(args.delay),
            retransmissions: args.retransmissions,
        },
        default_channel,
    };

    match config.mode {
        TransportMode::Tcp => {
            let client = TcpChat::connect(&config)
                .await
                .context("connecting to the server")?;
            chat::run(&client).await;
        }
        TransportMode::Udp => {
            let client = UdpChat::connect(&config)
                .await
                .context("binding the local socket")?;
            chat::run(&client).await;
        }
    }
    Ok(())
}

/// Resolves the server to the first address the resolver offers.
async fn resolve(host: &str, port: u16) -> anyhow::Result<SocketAddr> {
    let mut addrs = tokio::net::lookup_host((host, port))
        .await
        .with_context(|| format!("resolving {host}"))?;
    addrs
        .next()
        .with_context(|| format!("no address found for {host}"))
}
