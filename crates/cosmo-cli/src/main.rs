use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser, Debug)]
#[command(
    name = "cosmo",
    version,
    about = "Expose Cosmos DB connections to AI agents over MCP"
)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the MCP server.
    Serve(commands::serve::ServeArgs),

    /// Inspect and probe the configured connections.
    Connections {
        #[command(subcommand)]
        cmd: commands::connections::ConnectionsCommand,
    },

    /// List the tools the server exposes.
    Tools {
        /// Print each tool's input schema.
        #[arg(short, long, default_value_t = false)]
        verbose: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout carries JSON-RPC on the stdio transport.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.cmd {
        Command::Serve(args) => commands::serve::execute(args).await,
        Command::Connections { cmd } => commands::connections::execute(cmd).await,
        Command::Tools { verbose } => commands::tools::list(verbose),
    }
}
