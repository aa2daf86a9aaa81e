use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use gantry::config::{McpConfig, TransportKind};
use gantry::demo::NotesApp;
use gantry::lifecycle::Gantry;
use gantry::transport;

/// CLI arguments for the adapter
#[derive(Parser, Debug)]
#[command(name = "gantry")]
#[command(about = "MCP adapter serving a demo notes application")]
struct Args {
    /// Path to a gantry.toml config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port for the MCP HTTP server (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Transport to serve on: http or stdio (overrides config)
    #[arg(short, long)]
    transport: Option<String>,

    /// Scan the endpoints, print the exposed surface, and exit
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (silently ignore if not found)
    dotenvy::dotenv().ok();

    // Logs go to stderr so the stdio transport keeps stdout for the protocol
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new("info,gantry=debug,rmcp=info,hyper=off,tower=off,h2=off")
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut config = McpConfig::discover(args.config.as_deref())?;
    if let Ok(port) = std::env::var("GANTRY_PORT") {
        config.port = port.parse()?;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(ref transport) = args.transport {
        config.transport = match transport.as_str() {
            "http" => TransportKind::Http,
            "stdio" => TransportKind::Stdio,
            other => anyhow::bail!("unknown transport '{}', expected http or stdio", other),
        };
    }
    config.validate()?;

    if !config.enabled {
        tracing::warn!("MCP adapter is disabled in the config, nothing to do");
        return Ok(());
    }

    let gantry = Arc::new(Gantry::new(
        config,
        NotesApp::seeded(),
        NotesApp::annotations(),
    ));

    gantry.host_starting()?;
    gantry.host_ready()?;
    let maps = gantry.scan()?;

    tracing::info!("Registry hash: {}", maps.compute_hash());
    tracing::info!("");
    tracing::info!("Tools ({}):", maps.tool_count());
    for tool in maps.tools() {
        tracing::info!(
            "  - {} ({} {})",
            tool.name,
            tool.endpoint.method,
            tool.endpoint.path
        );
    }
    tracing::info!("");
    tracing::info!("Resources ({}):", maps.resource_count());
    for resource in maps.resources() {
        tracing::info!(
            "  - {} ({} {})",
            resource.template.raw(),
            resource.endpoint.method,
            resource.endpoint.path
        );
    }
    tracing::info!("");

    if args.check {
        tracing::info!("Check complete");
        return Ok(());
    }

    gantry.start_serving()?;

    let kind = gantry.config().transport;
    match kind {
        TransportKind::Http => transport::serve_http(gantry).await,
        TransportKind::Stdio => transport::serve_stdio(gantry).await,
    }
}
