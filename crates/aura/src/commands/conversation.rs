//! Conversation commands.

use anyhow::{bail, Result};
use aura_core::auth::{authorize, Action};
use colored::Colorize;

use super::{print_json, Globals};
use crate::cli::{ConversationAction, ConversationCommand};

pub async fn execute(cmd: ConversationCommand, g: &Globals<'_>) -> Result<()> {
    match cmd.action {
        ConversationAction::Create { project, title } => create(project.as_deref(), title.as_deref(), g).await,
        ConversationAction::Say {
            conversation,
            content,
            role,
        } => say(&conversation, &content, &role, g).await,
    }
}

async fn create(project: Option<&str>, title: Option<&str>, g: &Globals<'_>) -> Result<()> {
    let db = g.database()?;
    if let Some(project) = project {
        authorize(db.as_ref(), project, g.user, Action::Write).await?;
    }

    let id = db.create_conversation(project, g.user, title)?;

    if g.json {
        return print_json(&serde_json::json!({ "id": id }));
    }
    println!("{} Conversation started", "✓".green());
    println!("  ID: {}", id);
    Ok(())
}

async fn say(conversation_id: &str, content: &str, role: &str, g: &Globals<'_>) -> Result<()> {
    let db = g.database()?;
    let Some(conversation) = db.get_conversation(conversation_id)? else {
        bail!("Conversation not found: {}", conversation_id);
    };

    match conversation.project_id.as_deref() {
        Some(project) => authorize(db.as_ref(), project, g.user, Action::Write).await?,
        None if conversation.user_id != g.user => bail!("Conversation belongs to another user"),
        None => {}
    }

    let id = db.append_message(conversation_id, role, content)?;

    if g.json {
        return print_json(&serde_json::json!({ "id": id }));
    }
    println!("{} {} message added", "✓".green(), role.cyan());
    Ok(())
}
