use std::io::{BufRead, Write};

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::warn;

use basechat_core::{ChatOverrides, ChatSettings, RetrievalMode};
use basechat_local_store::SessionStore;
use basechat_session::{display_title, ChatSession, ConversationList};

use crate::config;

/// Per-invocation chat tuning; anything unset falls back to the config
/// file's defaults, which in turn fall back to the built-ins.
#[derive(clap::Args)]
pub struct TuningArgs {
    /// Number of chunks to retrieve
    #[arg(long)]
    top_k: Option<u32>,

    #[arg(long)]
    temperature: Option<f32>,

    /// Retrieval mode: vector, keyword, or hybrid
    #[arg(long)]
    retrieval_mode: Option<RetrievalMode>,

    /// Generation model name
    #[arg(long)]
    model: Option<String>,

    /// Model provider
    #[arg(long)]
    provider: Option<String>,

    /// Diversify retrieved sources with MMR
    #[arg(long)]
    use_mmr: bool,

    #[arg(long)]
    mmr_diversity: Option<f32>,

    /// Ask the server to self-check its answer
    #[arg(long)]
    self_check: bool,

    #[arg(long)]
    score_threshold: Option<f32>,

    /// Restrict retrieval to these document ids
    #[arg(long)]
    document: Vec<String>,
}

impl TuningArgs {
    fn into_overrides(self) -> ChatOverrides {
        ChatOverrides {
            top_k: self.top_k,
            temperature: self.temperature,
            retrieval_mode: self.retrieval_mode,
            model: self.model,
            provider: self.provider,
            use_mmr: self.use_mmr.then_some(true),
            mmr_diversity: self.mmr_diversity,
            use_self_check: self.self_check.then_some(true),
            score_threshold: self.score_threshold,
            document_ids: if self.document.is_empty() {
                None
            } else {
                Some(self.document)
            },
            ..ChatOverrides::default()
        }
    }
}

pub async fn run_chat(
    kb: &str,
    server: Option<String>,
    new: bool,
    tuning: TuningArgs,
) -> Result<()> {
    let cfg = config::load_config()?;
    let settings = ChatSettings::resolve(&config::app_settings(&cfg), &tuning.into_overrides());

    let store = SessionStore::open()?;
    let mut session = ChatSession::new(
        config::make_client(&cfg, server.clone())?,
        store,
        kb,
        settings,
    );
    let mut list = ConversationList::new(config::make_client(&cfg, server)?);

    let (refresh_tx, mut refresh_rx) = mpsc::unbounded_channel();
    session.set_refresh_signal(refresh_tx);

    if let Err(e) = list.refresh(kb).await {
        warn!("Starting without a conversation list: {e:#}");
    }
    if new {
        session.start_new_chat();
    }
    session.sync_with_conversations(list.all()).await;

    match session.conversation_id() {
        Some(id) => {
            let title = list
                .all()
                .iter()
                .find(|c| c.id == id)
                .map(display_title)
                .unwrap_or("Untitled");
            println!("Resuming \"{title}\" ({} messages)", session.messages().len());
        }
        None => println!("New conversation; it will be created on your first message."),
    }
    println!("Type a question, /new for a fresh chat, /quit to exit.");

    let stdin = std::io::stdin();
    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();

        match line {
            "" => continue,
            "/quit" | "/exit" => break,
            "/new" => {
                session.start_new_chat();
                list.cancel_edit();
                println!("Started a new chat.");
                continue;
            }
            _ => {}
        }

        session.send_message(line).await;
        print_last_turn(&session);

        // A successful send may have created or retitled the conversation;
        // catch up in the background channel's stead, without blocking sends.
        if refresh_rx.try_recv().is_ok() {
            if let Err(e) = list.refresh(kb).await {
                warn!("Conversation list refresh failed: {e:#}");
            }
        }
    }

    Ok(())
}

fn print_last_turn<B: basechat_session::ChatBackend>(session: &ChatSession<B>) {
    let Some(reply) = session.messages().last() else {
        return;
    };
    println!("{}", reply.content);
    for source in &reply.sources {
        println!(
            "  [{}] {} (chunk {}, score {:.2})",
            source.document_id, source.filename, source.chunk_index, source.score
        );
    }
    if let Some(model) = &reply.model {
        println!("  (answered by {model})");
    }
}
