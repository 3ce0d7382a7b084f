//! Context command: token-bounded brief, dialogue and knowledge for a project.

use anyhow::Result;
use aura_sdk::ContextOptions;
use colored::Colorize;

use super::{preview, print_json, Globals};
use crate::cli::ContextArgs;

pub async fn execute(args: ContextArgs, g: &Globals<'_>) -> Result<()> {
    let options = ContextOptions {
        include_recent_messages: args.conversation.is_some(),
        conversation_id: args.conversation,
        max_tokens: args.max_tokens,
        include_project_brief: !args.no_brief,
        include_knowledge_sources: !args.no_knowledge,
    };

    let context = g.aura.retrieval().build_context(&args.project, g.user, &options).await?;

    if g.json {
        return print_json(&context);
    }
    if args.render {
        println!("{}", context.render());
        return Ok(());
    }

    let budget = options
        .max_tokens
        .unwrap_or(g.aura.config().retrieval.default_max_tokens);
    println!(
        "{} Context for {} ({} / {} tokens)",
        "✓".green(),
        args.project.bold(),
        context.token_count,
        budget
    );

    match &context.project_brief {
        Some(brief) => println!("\n  {}\n    {}", "Brief".cyan(), preview(brief, 160)),
        None => println!("\n  {} {}", "Brief".cyan(), "(none)".dimmed()),
    }

    match &context.recent_messages {
        Some(messages) => println!("  {} {} message(s)", "Dialogue".cyan(), messages.len()),
        None => println!("  {} {}", "Dialogue".cyan(), "(none)".dimmed()),
    }

    println!("  {} {} source(s)", "Knowledge".cyan(), context.knowledge_sources.len());
    for source in &context.knowledge_sources {
        println!(
            "    - {} {}",
            source.title.as_deref().unwrap_or("Untitled").bold(),
            preview(&source.content, 100).dimmed()
        );
    }

    Ok(())
}
