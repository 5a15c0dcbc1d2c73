use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::watch;

use basechat_core::{DocumentStatus, DocumentStatusSnapshot};
use basechat_session::StatusPoller;

use crate::config;

pub async fn run_status(
    documents: Vec<String>,
    server: Option<String>,
    interval_ms: u64,
) -> Result<()> {
    let cfg = config::load_config()?;
    let client = config::make_client(&cfg, server)?;

    let (poller, mut updates) = StatusPoller::new(client);
    for id in &documents {
        poller.track(DocumentStatusSnapshot {
            id: id.clone(),
            status: DocumentStatus::Pending,
            chunk_count: 0,
            progress_percentage: None,
            processing_stage: None,
            error_message: None,
        });
    }
    let poller = Arc::new(poller);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let runner = tokio::spawn({
        let poller = poller.clone();
        async move {
            poller
                .run(Duration::from_millis(interval_ms), shutdown_rx)
                .await
        }
    });

    println!("Watching {} document(s); Ctrl-C to stop.", documents.len());
    loop {
        tokio::select! {
            maybe = updates.recv() => {
                let Some(update) = maybe else { break };
                print_update(&update);
                if poller.statuses().iter().all(|s| s.status.is_terminal()) {
                    println!("All documents settled.");
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    let _ = shutdown_tx.send(true);
    let _ = runner.await;
    Ok(())
}

fn print_update(update: &DocumentStatusSnapshot) {
    let mut line = format!("{}: {}", update.id, update.status.as_str());
    if let Some(progress) = update.progress_percentage {
        line.push_str(&format!(" {progress:.0}%"));
    }
    if let Some(stage) = &update.processing_stage {
        line.push_str(&format!(" ({stage})"));
    }
    if update.chunk_count > 0 {
        line.push_str(&format!(", {} chunks", update.chunk_count));
    }
    if let Some(error) = &update.error_message {
        line.push_str(&format!(" - {error}"));
    }
    println!("{line}");
}
