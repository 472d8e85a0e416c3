mod server;
mod tools;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rmcp::ServiceExt;
use vl_contracts::{FocusArea, Settings};
use vl_engine::{AnalysisPipeline, ChatCompletionsClient, TempArtifacts};

use crate::server::VisionMcpServer;

#[derive(Debug, Parser)]
#[command(name = "mcp-vl", version, about = "MCP server for vision-language image analysis")]
struct Cli {
    /// Log filter, overriding RUST_LOG and LOG_LEVEL
    #[arg(long, global = true)]
    log_level: Option<String>,
    /// Read fallback settings from this file instead of ./.env
    #[arg(long, global = true)]
    env_file: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve the auto_analyze_image tool over stdio (default)
    Serve,
    /// Run the analysis pipeline once and print the JSON result
    Analyze(AnalyzeArgs),
    /// Send a text-only request to check credentials and connectivity
    Ping(PingArgs),
    /// Remove the temporary image directory
    Cleanup,
}

#[derive(Debug, Parser)]
struct AnalyzeArgs {
    /// File path or http(s) URL; the clipboard is used when omitted
    image: Option<String>,
    #[arg(long, default_value = "code")]
    focus: FocusArea,
}

#[derive(Debug, Parser)]
struct PingArgs {
    #[arg(long, default_value = "Reply with the single word: pong")]
    prompt: String,
}

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("mcp-vl error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let settings = Settings::load(cli.env_file.as_deref());
    init_logging(cli.log_level.as_deref(), &settings.log_level);

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => run_serve(&settings),
        Command::Analyze(args) => run_analyze(&settings, args),
        Command::Ping(args) => run_ping(&settings, args),
        Command::Cleanup => run_cleanup(&settings),
    }
}

/// stdout carries the MCP transport, so logs always go to stderr.
fn init_logging(cli_level: Option<&str>, default_level: &str) {
    let mut builder = match cli_level {
        Some(level) => {
            let mut builder = env_logger::Builder::new();
            builder.parse_filters(level);
            builder
        }
        None => env_logger::Builder::from_env(
            env_logger::Env::default().default_filter_or(default_level),
        ),
    };
    builder.target(env_logger::Target::Stderr).init();
}

fn run_serve(settings: &Settings) -> Result<i32> {
    if let Err(err) = settings.require_api_key() {
        log::warn!("{err}; tool calls will fail until it is configured");
    }
    let pipeline = Arc::new(AnalysisPipeline::from_settings(settings)?);
    let server = VisionMcpServer::new(Arc::clone(&pipeline), settings);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    let served = runtime.block_on(serve_stdio(server, settings));
    drop(runtime);
    // The blocking HTTP clients inside must be dropped outside the runtime.
    drop(pipeline);
    served?;
    Ok(0)
}

async fn serve_stdio(server: VisionMcpServer, settings: &Settings) -> Result<()> {
    log::info!(
        "{} {} starting via stdio (model: {}, temp dir: {})",
        settings.server_name,
        settings.server_version,
        server.pipeline.model_name(),
        server.pipeline.artifacts().root().display()
    );
    let service = server.serve(rmcp::transport::stdio()).await?;
    service.waiting().await?;
    log::info!("client disconnected, shutting down");
    Ok(())
}

fn run_analyze(settings: &Settings, args: AnalyzeArgs) -> Result<i32> {
    let pipeline = AnalysisPipeline::from_settings(settings)?;
    let analysis = pipeline.run(args.image.as_deref(), args.focus)?;
    println!("{}", serde_json::to_string_pretty(&analysis)?);
    Ok(0)
}

fn run_ping(settings: &Settings, args: PingArgs) -> Result<i32> {
    let client = ChatCompletionsClient::new(settings.clone())?;
    let reply = client
        .send_text(&args.prompt)
        .with_context(|| format!("ping to {} failed", settings.chat_completions_endpoint()))?;
    println!("{}: {}", settings.model, reply.trim());
    Ok(0)
}

fn run_cleanup(settings: &Settings) -> Result<i32> {
    let artifacts = TempArtifacts::from_settings(settings);
    if artifacts.purge() {
        println!("removed {}", artifacts.root().display());
    } else {
        println!("nothing to remove at {}", artifacts.root().display());
    }
    Ok(0)
}
