//! Knowledge command: add sources to a project's knowledge base.
//!
//! Added sources are embedded and indexed immediately, so they are
//! retrievable by `search`, `semantic` and `context` right away.

use std::path::Path;

use anyhow::{bail, Context, Result};
use aura_core::types::NewKnowledgeSource;
use colored::Colorize;

use super::{print_json, Globals};
use crate::cli::{KnowledgeAction, KnowledgeCommand};

pub async fn execute(cmd: KnowledgeCommand, g: &Globals<'_>) -> Result<()> {
    match cmd.action {
        KnowledgeAction::Add {
            project,
            title,
            content,
            file,
            source_type,
            source_id,
            metadata,
        } => {
            let content = match (content, file) {
                (Some(content), _) => content,
                (None, Some(path)) => read_content(&path)?,
                (None, None) => bail!("Provide --content or --file"),
            };
            let source = NewKnowledgeSource {
                title,
                content,
                source_type,
                source_id,
                metadata: metadata.as_deref().map(parse_metadata).transpose()?,
            };
            add(&project, source, g).await
        }
    }
}

async fn add(project: &str, source: NewKnowledgeSource, g: &Globals<'_>) -> Result<()> {
    let id = g.aura.retrieval().ingest(project, g.user, &source).await?;

    if g.json {
        return print_json(&serde_json::json!({ "id": id, "status": "indexed" }));
    }
    println!("{} Knowledge source indexed", "✓".green());
    println!("  Title: {}", source.title.bold());
    println!("  Type: {}", source.source_type.cyan());
    println!("  ID: {}", id);
    Ok(())
}

fn read_content(path: &Path) -> Result<String> {
    let content = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    if content.trim().is_empty() {
        bail!("{} is empty", path.display());
    }
    Ok(content)
}

/// Metadata must be a JSON object
fn parse_metadata(raw: &str) -> Result<serde_json::Value> {
    let value: serde_json::Value = serde_json::from_str(raw).context("Metadata is not valid JSON")?;
    if !value.is_object() {
        bail!("Metadata must be a JSON object");
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_metadata() {
        assert_eq!(parse_metadata("{\"author\": \"mara\"}").unwrap()["author"], "mara");
        assert!(parse_metadata("[1, 2]").is_err());
        assert!(parse_metadata("not json").is_err());
    }

    #[test]
    fn test_read_content() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "Brand voice: warm, precise").unwrap();
        assert_eq!(read_content(file.path()).unwrap(), "Brand voice: warm, precise");

        let empty = NamedTempFile::new().unwrap();
        assert!(read_content(empty.path()).is_err());
    }
}
