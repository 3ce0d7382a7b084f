//! Snapshot commands.

use anyhow::Result;
use aura_sdk::utils::format_timestamp;
use colored::Colorize;

use super::{print_json, Globals};
use crate::cli::{SnapshotAction, SnapshotCommand};

pub async fn execute(cmd: SnapshotCommand, g: &Globals<'_>) -> Result<()> {
    match cmd.action {
        SnapshotAction::Create { project, conversation } => create(&project, &conversation, g).await,
        SnapshotAction::Show { id } => show(&id, g).await,
    }
}

async fn create(project: &str, conversation: &str, g: &Globals<'_>) -> Result<()> {
    let id = g
        .aura
        .retrieval()
        .create_context_snapshot(conversation, project, g.user)
        .await?;

    if g.json {
        return print_json(&serde_json::json!({ "id": id }));
    }
    println!("{} Snapshot created", "✓".green());
    println!("  ID: {}", id);
    Ok(())
}

async fn show(id: &str, g: &Globals<'_>) -> Result<()> {
    let snapshot = g.aura.retrieval().context_snapshot(id, g.user).await?;

    if g.json {
        return print_json(&snapshot);
    }

    println!("{} {}", "Snapshot".bold(), snapshot.id);
    println!("  Project: {}", snapshot.project_id);
    println!("  Conversation: {}", snapshot.conversation_id);
    println!("  Captured: {}", format_timestamp(snapshot.captured_at).dimmed());
    if let Some(brief) = &snapshot.brief {
        println!(
            "  Brief: {} [{}]",
            brief.title.as_deref().unwrap_or("Untitled").bold(),
            brief.status
        );
        if let Some(description) = &brief.description {
            println!("    {}", description.dimmed());
        }
    }
    println!("  Knowledge sources: {}", snapshot.knowledge_source_ids.len());
    for source_id in &snapshot.knowledge_source_ids {
        println!("    - {}", source_id);
    }
    Ok(())
}
