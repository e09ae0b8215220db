#![forbid(unsafe_code)]

//! `duplex-rpc`: send one JSON-RPC call to a peer process over its stdio.
//!
//! Spawns the peer, wires its stdout / stderr / stdin into a [`Client`],
//! issues a single request (or notification), prints the reply as JSON on
//! stdout, then shuts down.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use serde_json::Value;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use duplex_rpc::peer::{spawn_peer, PeerCommand};
use duplex_rpc::{Client, ClientConfig, Result, RpcError};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "duplex-rpc", about = "Send a JSON-RPC call to a stdio peer", version, long_about = None)]
struct Cli {
    /// Path to a TOML client configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Method to call.
    #[arg(long)]
    method: String,

    /// Parameters as a JSON document.
    #[arg(long)]
    params: Option<String>,

    /// Give up waiting for the reply after this many seconds.
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Send a notification instead of a request; no reply is awaited.
    #[arg(long)]
    notify: bool,

    /// Peer program followed by its arguments.
    #[arg(last = true, required = true, num_args = 1..)]
    peer: Vec<String>,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| RpcError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    let config = match &args.config {
        Some(path) => ClientConfig::load_from_path(path)?,
        None => ClientConfig::default(),
    };

    let params = args
        .params
        .as_deref()
        .map(serde_json::from_str::<Value>)
        .transpose()
        .map_err(|err| RpcError::Config(format!("--params is not valid JSON: {err}")))?;

    let (program, peer_args) = args
        .peer
        .split_first()
        .ok_or_else(|| RpcError::Config("missing peer command".into()))?;
    let mut peer = spawn_peer(&PeerCommand {
        program: program.clone(),
        args: peer_args.to_vec(),
        current_dir: None,
    })?;

    let client = Client::builder(peer.stdin)
        .primary(peer.stdout)
        .diagnostic(peer.stderr)
        .handler_fn(|msg| {
            info!(id = ?msg.id, method = ?msg.method, "unsolicited message from peer");
            Ok(())
        })
        .config(config)
        .start()?;

    let outcome = if args.notify {
        client.notify(&args.method, params).await.map(|()| None)
    } else if let Some(secs) = args.timeout_secs {
        client
            .request_with_timeout(&args.method, params, Duration::from_secs(secs))
            .await
            .map(Some)
    } else {
        client.request(&args.method, params).await.map(Some)
    };

    for (stream, exit) in client.shutdown().await {
        info!(%stream, ?exit, "read loop finished");
    }
    if let Err(err) = peer.child.kill().await {
        warn!(%err, "failed to kill peer process");
    }

    if let Some(reply) = outcome? {
        let text = serde_json::to_string_pretty(&reply)
            .map_err(|err| RpcError::Payload(format!("failed to render reply: {err}")))?;
        println!("{text}");
    }

    Ok(())
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| RpcError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| RpcError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
