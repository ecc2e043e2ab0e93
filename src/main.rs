use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;

use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use cie::config::{get_config_path, load_config, save_config, CieConfig};
use cie::mcp::McpServer;
use cie::querier::{Querier, RemoteQuerier};
use cie::tools::{directory_summary, list_endpoints, ListEndpointsArgs};
use cie::types::ToolResult;

/// Query and report on an indexed codebase.
#[derive(Parser)]
#[command(name = "cie", about = "Query and report on an indexed codebase")]
struct Cli {
    /// Project path (default: current directory)
    #[arg(long, global = true)]
    project: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a project configuration
    Init {
        /// Project identifier (default: directory name)
        #[arg(long)]
        project_id: Option<String>,
        /// Query endpoint base URL
        #[arg(long)]
        base_url: Option<String>,
        /// Request timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// Run a raw query script
    Query {
        /// Query script
        script: String,
        /// Output the raw result as JSON
        #[arg(short, long)]
        json: bool,
        /// Maximum rows printed
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// List HTTP endpoints
    Endpoints {
        /// Regex over source file paths
        #[arg(long)]
        path_pattern: Option<String>,
        /// Substring of the endpoint path
        #[arg(long)]
        path_filter: Option<String>,
        /// HTTP method
        #[arg(short, long)]
        method: Option<String>,
        /// Maximum endpoints shown
        #[arg(short, long, default_value = "100")]
        limit: usize,
    },
    /// Summarize a directory
    Summary {
        /// Directory path inside the index
        path: String,
        /// Maximum functions per file
        #[arg(short = 'n', long, default_value = "5")]
        max_funcs: usize,
    },
    /// Start the MCP server on stdio
    Serve,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("CIE_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

async fn run(cli: Cli) -> cie::errors::Result<()> {
    let project_path = resolve_path(cli.project);

    if let Commands::Init {
        project_id,
        base_url,
        timeout,
    } = cli.command
    {
        let mut config = load_config(&project_path)?;
        if let Some(id) = project_id {
            config.project_id = id;
        }
        if let Some(url) = base_url {
            config.base_url = url;
        }
        if let Some(secs) = timeout {
            config.timeout_secs = secs;
        }
        save_config(&project_path, &config)?;
        println!(
            "Initialized project '{}' at {}",
            config.project_id,
            get_config_path(&project_path).display()
        );
        return Ok(());
    }

    let config: CieConfig = load_config(&project_path)?;
    let client = RemoteQuerier::from_config(&config);
    debug!(base_url = client.base_url(), project = client.project_id(), "client ready");

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    match cli.command {
        Commands::Init { .. } => {}
        Commands::Query {
            script,
            json,
            limit,
        } => {
            if json {
                let raw = client.query_raw(&cancel, &script).await?;
                println!("{}", serde_json::to_string_pretty(&raw)?);
            } else {
                let result = client.query(&cancel, &script).await?;
                println!("{}", result.headers.join(" | "));
                let shown = limit.unwrap_or(result.rows.len());
                for row in result.rows.iter().take(shown) {
                    let cells: Vec<String> = row.iter().map(ToString::to_string).collect();
                    println!("{}", cells.join(" | "));
                }
                if result.rows.len() > shown {
                    println!("... {} more rows", result.rows.len() - shown);
                }
            }
        }
        Commands::Endpoints {
            path_pattern,
            path_filter,
            method,
            limit,
        } => {
            let args = ListEndpointsArgs {
                path_pattern: path_pattern.unwrap_or_default(),
                path_filter: path_filter.unwrap_or_default(),
                method: method.unwrap_or_default(),
                limit,
            };
            print_result(&list_endpoints(&client, &cancel, &args).await?);
        }
        Commands::Summary { path, max_funcs } => {
            print_result(&directory_summary(&client, &cancel, &path, max_funcs).await?);
        }
        Commands::Serve => {
            let server = McpServer::new(client, cancel);
            server.run().await?;
        }
    }
    Ok(())
}

fn print_result(result: &ToolResult) {
    if result.is_error {
        eprintln!("{}", result.text);
    } else {
        println!("{}", result.text);
    }
}

/// Resolves an optional path argument to a `PathBuf`.
///
/// Defaults to the current working directory if no path is provided.
fn resolve_path(path: Option<String>) -> PathBuf {
    match path {
        Some(p) => PathBuf::from(p),
        None => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}
