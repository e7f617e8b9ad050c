//! # Apiary CLI Entry Point
//!
//! Main binary for the apiary RPC server.
//!
//! ## Usage
//!
//! ```bash
//! # Serve the modules in ./api over the stateless HTTP transport
//! apiary serve -a ./api -b 127.0.0.1:8001 -t http
//!
//! # Same modules over the persistent framed transport
//! apiary serve -a ./api -b 127.0.0.1:8001 -t tcp
//!
//! # Make an RPC call (outputs raw JSON)
//! apiary call http://127.0.0.1:8001 user read -a '[3]'
//! ```

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use argh::FromArgs;

use apiary_client::RpcClient;
use apiary_server::{CapabilitySet, Dispatcher, FrameServer, HttpServer, Loader, LoaderConfig};

/// apiary - dynamic service modules served over RPC
#[derive(FromArgs)]
struct Cli {
    #[argh(subcommand)]
    command: Commands,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum Commands {
    Serve(ServeArgs),
    Call(CallArgs),
}

/// Arguments for running the server.
///
/// Each `.js` file in the api directory becomes one service named by its
/// base file name. The transport is selected once at startup.
#[derive(FromArgs)]
#[argh(subcommand, name = "serve")]
/// load service modules and serve them
struct ServeArgs {
    /// directory of service modules
    ///
    /// One `.js` file per service; the file must evaluate to an object of
    /// functions. Non-matching entries are skipped.
    #[argh(option, short = 'a', default = "\"./api\".into()")]
    api: String,

    /// address to bind the server to
    #[argh(option, short = 'b', default = "\"127.0.0.1:8001\".into()")]
    bind: String,

    /// transport to serve: "http" (stateless) or "tcp" (persistent frames)
    #[argh(option, short = 't', default = "\"http\".into()")]
    transport: String,

    /// maximum module initialization time in milliseconds
    ///
    /// A module that does not finish initializing within this budget is
    /// omitted from the registry; the remaining modules still load.
    #[argh(option, long = "load-timeout-ms", default = "5000")]
    load_timeout_ms: u64,

    /// surface full module load errors to the log
    ///
    /// Off by default: failed loads are reported as one-line warnings
    /// without the underlying cause.
    #[argh(switch, long = "display-errors")]
    display_errors: bool,
}

/// Arguments for making a single RPC call.
///
/// Outputs the raw JSON result to stdout for unix tool usage (piping to
/// jq, etc.); errors go to stderr with a non-zero exit code.
#[derive(FromArgs)]
#[argh(subcommand, name = "call")]
/// call a method on a running server
struct CallArgs {
    /// address of the server, scheme selects the transport
    /// (e.g. http://127.0.0.1:8001 or tcp://127.0.0.1:8001)
    #[argh(positional)]
    url: String,

    /// service name
    #[argh(positional)]
    service: String,

    /// method name
    #[argh(positional)]
    method: String,

    /// JSON array of arguments, defaults to []
    #[argh(option, short = 'a', long = "args", default = "\"[]\".into()")]
    args: String,
}

/// The two supported transports, fixed at startup.
enum TransportKind {
    Persistent,
    Stateless,
}

impl TransportKind {
    fn parse(value: &str) -> Result<Self> {
        match value {
            "tcp" | "persistent" => Ok(TransportKind::Persistent),
            "http" | "stateless" => Ok(TransportKind::Stateless),
            other => Err(anyhow::anyhow!(
                "unsupported transport '{other}' (expected tcp or http)"
            )),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli: Cli = argh::from_env();

    // No tracing for `call`: keep stdout clean for piping.
    if matches!(cli.command, Commands::Serve(_)) {
        let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    match cli.command {
        Commands::Serve(args) => run_serve(args).await,
        Commands::Call(args) => run_call(args).await,
    }
}

async fn run_serve(args: ServeArgs) -> Result<()> {
    let transport = TransportKind::parse(&args.transport)?;

    let config = LoaderConfig::new()
        .with_timeout(Duration::from_millis(args.load_timeout_ms))
        .with_display_errors(args.display_errors);
    config.validate().map_err(|e| anyhow::anyhow!(e))?;

    let capabilities = CapabilitySet::in_memory();
    let loader = Loader::new(capabilities.clone(), config);

    tracing::info!("loading service modules from {}", args.api);
    let registry = Arc::new(loader.load_dir(Path::new(&args.api))?);
    if registry.is_empty() {
        tracing::warn!("no services loaded from {}", args.api);
    } else {
        tracing::info!(
            "{} services ready: {:?}",
            registry.len(),
            registry.service_names()
        );
    }

    let dispatcher = Arc::new(Dispatcher::new(registry, capabilities));
    let addr: SocketAddr = args
        .bind
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid bind address {}: {e}", args.bind))?;

    match transport {
        TransportKind::Persistent => {
            FrameServer::bind(addr, dispatcher).await?.run().await?;
        }
        TransportKind::Stateless => {
            HttpServer::bind(addr, dispatcher).await?.run().await?;
        }
    }

    Ok(())
}

async fn run_call(args: CallArgs) -> Result<()> {
    let call_args: Vec<serde_json::Value> = serde_json::from_str(&args.args)
        .map_err(|e| anyhow::anyhow!("--args must be a JSON array: {e}"))?;

    let client = RpcClient::connect(&args.url).await?;
    let result = client.call(&args.service, &args.method, call_args).await?;

    println!("{}", serde_json::to_string(&result)?);
    Ok(())
}
