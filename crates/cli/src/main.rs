mod chat_cmd;
mod config;
mod conversations_cmd;
mod status_cmd;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "basechat", about = "basechat CLI - chat with your knowledge bases")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive chat against a knowledge base
    Chat {
        /// Knowledge base id
        #[arg(long)]
        kb: String,

        /// Override the configured server URL
        #[arg(long)]
        server: Option<String>,

        /// Start a fresh conversation instead of resuming the last one
        #[arg(long)]
        new: bool,

        #[command(flatten)]
        tuning: chat_cmd::TuningArgs,
    },

    /// Manage conversations
    Conversations {
        #[command(subcommand)]
        action: ConversationsAction,
    },

    /// Watch document ingestion status until the documents settle
    Status {
        /// Document ids to watch
        #[arg(required = true)]
        documents: Vec<String>,

        /// Override the configured server URL
        #[arg(long)]
        server: Option<String>,

        /// Poll interval in milliseconds
        #[arg(long, default_value_t = 1500)]
        interval_ms: u64,
    },

    /// Show or set configuration
    Config {
        /// Set the server URL
        #[arg(long)]
        server: Option<String>,

        /// Set the API key
        #[arg(long)]
        api_key: Option<String>,
    },
}

#[derive(Subcommand)]
enum ConversationsAction {
    /// List conversations in a knowledge base
    List {
        /// Knowledge base id
        #[arg(long)]
        kb: String,

        /// Filter by title or id substring
        #[arg(long)]
        search: Option<String>,

        #[arg(long, default_value_t = 1)]
        page: usize,

        #[arg(long, default_value_t = 10)]
        page_size: usize,

        #[arg(long)]
        server: Option<String>,
    },

    /// Rename a conversation (omit --title to clear it)
    Rename {
        id: String,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        server: Option<String>,
    },

    /// Delete a conversation
    Delete {
        id: String,

        /// Knowledge base id, used to drop the persisted session if it
        /// pointed at the deleted conversation
        #[arg(long)]
        kb: String,

        #[arg(long)]
        server: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Chat {
            kb,
            server,
            new,
            tuning,
        } => chat_cmd::run_chat(&kb, server, new, tuning).await,
        Commands::Conversations { action } => match action {
            ConversationsAction::List {
                kb,
                search,
                page,
                page_size,
                server,
            } => conversations_cmd::run_list(&kb, search, page, page_size, server).await,
            ConversationsAction::Rename { id, title, server } => {
                conversations_cmd::run_rename(&id, title.as_deref(), server).await
            }
            ConversationsAction::Delete { id, kb, server } => {
                conversations_cmd::run_delete(&id, &kb, server).await
            }
        },
        Commands::Status {
            documents,
            server,
            interval_ms,
        } => status_cmd::run_status(documents, server, interval_ms).await,
        Commands::Config { server, api_key } => {
            if server.is_none() && api_key.is_none() {
                config::show_config()
            } else {
                config::set_config(server, api_key)
            }
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
