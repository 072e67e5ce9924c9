use clap::{Parser, Subcommand};
use serde_json::json;

use osintmcp::cli::{parse_params, render_json, tool_catalog};
use osintmcp::transport::serve_stdio;
use osintmcp::utils::LoggingConfig;
use osintmcp::{OsintServer, Settings};

#[derive(Parser)]
#[command(name = "osintmcp", version, about = "OSINT tool server", author)]
struct Cli {
    /// Debug-level logs with source locations (same as OSINT_DEBUG=1)
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve newline-delimited JSON requests on stdin/stdout
    Stdio,
    /// Print registered tool definitions
    Tools {
        /// Single-line JSON
        #[arg(long)]
        compact: bool,
    },
    /// Run a single tool invocation
    Invoke {
        tool: String,
        #[arg(long)]
        params: Option<String>,
        #[arg(long, env = "OSINT_CLIENT_API_KEY")]
        api_key: Option<String>,
    },
    /// Discover an allowlisted API and list the tools it would register
    Discover { base_url: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    LoggingConfig::from_env().with_verbose(cli.verbose).init();

    let settings = Settings::from_env()?;
    let server = OsintServer::bootstrap(settings).await?;

    match cli.command {
        Command::Stdio => serve_stdio(server).await?,
        Command::Tools { compact } => println!("{}", render_json(&tool_catalog(&server), !compact)?),
        Command::Invoke {
            tool,
            params,
            api_key,
        } => {
            let params = parse_params(params.as_deref())?;
            let response = server.invoke(&tool, params, api_key.as_deref()).await;
            println!("{}", render_json(&response, true)?);
            if !response.is_success() {
                std::process::exit(1);
            }
        }
        Command::Discover { base_url } => handle_discover(&server, &base_url).await?,
    }
    Ok(())
}

async fn handle_discover(server: &OsintServer, base_url: &str) -> anyhow::Result<()> {
    let connectors = server.connectors();
    if !connectors.is_allowed(base_url) {
        anyhow::bail!("`{base_url}` is not in OSINT_CONNECTOR_ALLOWLIST");
    }
    let Some(spec) = connectors.fetch_spec(base_url).await? else {
        println!("No API spec found under `{base_url}`");
        return Ok(());
    };
    let tools = connectors.synthesize_tools(base_url, &spec);
    println!("{}", render_json(&json!({ "base_url": base_url, "tools": tools }), true)?);
    Ok(())
}
