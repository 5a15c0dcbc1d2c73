use anyhow::Result;

use basechat_local_store::SessionStore;
use basechat_session::{display_title, ConversationList};

use crate::config;

pub async fn run_list(
    kb: &str,
    search: Option<String>,
    page: usize,
    page_size: usize,
    server: Option<String>,
) -> Result<()> {
    let cfg = config::load_config()?;
    let mut list = ConversationList::new(config::make_client(&cfg, server)?);
    list.refresh(kb).await?;

    if let Some(term) = search {
        list.set_search(term);
    }
    list.set_page_size(page_size);
    list.set_page(page);

    let total = list.filtered().len();
    if total == 0 {
        println!("No conversations.");
        return Ok(());
    }

    println!("Page {}/{} ({} conversations)", list.page(), list.total_pages(), total);
    for conversation in list.visible() {
        println!(
            "  {}  {}  (updated {})",
            conversation.id,
            display_title(conversation),
            conversation.updated_at
        );
    }
    Ok(())
}

pub async fn run_rename(id: &str, title: Option<&str>, server: Option<String>) -> Result<()> {
    let cfg = config::load_config()?;
    let client = config::make_client(&cfg, server)?;
    let updated = client.rename_conversation(id, title).await?;
    println!("Renamed {} to \"{}\"", updated.id, display_title(&updated));
    Ok(())
}

pub async fn run_delete(id: &str, kb: &str, server: Option<String>) -> Result<()> {
    let cfg = config::load_config()?;
    let client = config::make_client(&cfg, server)?;
    let resp = client.delete_conversation(id).await?;

    // If this knowledge base's persisted session pointed at the deleted
    // conversation, drop it so the next chat starts clean.
    let store = SessionStore::open()?;
    if store.load(kb).as_deref() == Some(id) {
        store.clear(kb);
    }

    println!("Deleted {} ({})", resp.id, resp.status);
    Ok(())
}
