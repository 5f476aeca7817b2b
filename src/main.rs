use askdocs::Result;
use askdocs::commands::{chat, history, ingest, init_config};
use askdocs::config::show_config;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "askdocs")]
#[command(about = "A retrieval-augmented streaming chat backend over ingested documents")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one chat turn, streaming response frames to stdout
    Chat {
        /// User identifier owning the session
        #[arg(long)]
        user: String,
        /// Session to continue; omit to start a new session
        #[arg(long)]
        session: Option<String>,
        /// The message to send
        message: String,
    },
    /// Show the turn log of an active session
    History {
        /// User identifier owning the session
        #[arg(long)]
        user: String,
        /// Session to show; omit for the user's most recent session
        #[arg(long)]
        session: Option<String>,
    },
    /// Analyze a document and index it for retrieval
    Ingest {
        /// URL of the document to analyze
        document_url: String,
    },
    /// Manage configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Chat {
            user,
            session,
            message,
        } => {
            chat(user, session, message).await?;
        }
        Commands::History { user, session } => {
            history(user, session).await?;
        }
        Commands::Ingest { document_url } => {
            ingest(document_url).await?;
        }
        Commands::Config { show } => {
            if show {
                show_config()?;
            } else {
                init_config()?;
            }
        }
    }

    Ok(())
}
