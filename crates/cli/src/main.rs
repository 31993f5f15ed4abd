//! ScholaRAG CLI — the main entry point.
//!
//! Commands:
//! - `serve`   — Start the HTTP chat gateway
//! - `ask`     — Ask a single question from the terminal
//! - `doctor`  — Diagnose configuration and backend reachability

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "scholarag",
    about = "ScholaRAG — documentation assistant for literature-review RAG",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Ask one question and print the answer
    Ask {
        /// The question
        message: String,

        /// Print the answer as it is generated
        #[arg(short, long)]
        stream: bool,

        /// Answer without retrieved context
        #[arg(long)]
        no_rag: bool,
    },

    /// Diagnose configuration and backend health
    Doctor,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing; logs go to stderr so answers stay clean on stdout
    let filter = if cli.verbose { "debug" } else { "info" };
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr);
    if cli.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    match cli.command {
        Commands::Serve { port } => commands::serve::run(port).await?,
        Commands::Ask {
            message,
            stream,
            no_rag,
        } => commands::ask::run(message, stream, !no_rag).await?,
        Commands::Doctor => commands::doctor::run().await?,
    }

    Ok(())
}
