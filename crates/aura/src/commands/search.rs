//! Search commands: similarity ranking over a project's knowledge.

use anyhow::Result;
use aura_core::types::SearchResult;
use colored::Colorize;

use super::{preview, print_json, short_id, Globals};
use crate::cli::{SearchArgs, SemanticArgs};

/// Rank indexed knowledge against a query.
pub async fn search(args: SearchArgs, g: &Globals<'_>) -> Result<()> {
    let retrieval = g.aura.retrieval();

    let mut options = retrieval.search_options().include_metadata(args.metadata);
    if let Some(limit) = args.limit {
        options = options.limit(limit);
    }
    if let Some(threshold) = args.threshold {
        options = options.threshold(threshold);
    }
    if !args.source_types.is_empty() {
        options = options.source_types(args.source_types);
    }

    let results = retrieval.search(&args.project, g.user, &args.query, &options).await?;

    if g.json {
        return print_json(&results);
    }
    print_results(&results, args.metadata);
    Ok(())
}

/// Rank precomputed project embeddings against a query.
pub async fn semantic(args: SemanticArgs, g: &Globals<'_>) -> Result<()> {
    let results = g
        .aura
        .retrieval()
        .semantic_search(&args.project, g.user, &args.query, args.limit)
        .await?;

    if g.json {
        return print_json(&results);
    }
    print_results(&results, false);
    Ok(())
}

fn print_results(results: &[SearchResult], show_metadata: bool) {
    if results.is_empty() {
        println!("{}", "No results.".dimmed());
        return;
    }

    println!("{} {} result(s)", "✓".green(), results.len());
    for result in results {
        println!(
            "\n  {} {} {}",
            format!("{:.3}", result.score).cyan(),
            result.title.as_deref().unwrap_or("Untitled").bold(),
            format!("({}, {})", result.source_type, short_id(&result.id)).dimmed()
        );
        println!("    {}", preview(&result.content, 160));
        if show_metadata {
            if let Some(metadata) = &result.metadata {
                println!("    {}", metadata.to_string().dimmed());
            }
        }
    }
}
