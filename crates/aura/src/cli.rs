//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Aura CLI
///
/// Project-scoped knowledge retrieval and verified answers.
#[derive(Parser, Debug)]
#[command(name = "aura")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Acting user id
    #[arg(short, long, global = true, env = "AURA_USER_ID", default_value = "local")]
    pub user: String,

    /// SQLite database path (overrides config)
    #[arg(long, global = true)]
    pub database: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Rank a project's knowledge against a query
    Search(SearchArgs),

    /// Search a project's precomputed embeddings
    Semantic(SemanticArgs),

    /// Build a token-bounded context for a project
    Context(ContextArgs),

    /// Context snapshots (create, show)
    Snapshot(SnapshotCommand),

    /// Knowledge sources (add)
    Knowledge(KnowledgeCommand),

    /// Projects and access control
    Project(ProjectCommand),

    /// Conversations and messages
    Conversation(ConversationCommand),

    /// Answer a question through the verification pipeline
    Verify(VerifyArgs),

    /// Show version
    Version,
}

// ─────────────────────────────────────────────────────────────────────────────
// Retrieval
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Project ID
    pub project: String,

    /// Search query
    pub query: String,

    /// Maximum results
    #[arg(short, long)]
    pub limit: Option<usize>,

    /// Minimum similarity score
    #[arg(short, long, allow_negative_numbers = true)]
    pub threshold: Option<f32>,

    /// Restrict to source types (repeatable)
    #[arg(short, long = "source-type")]
    pub source_types: Vec<String>,

    /// Include source metadata
    #[arg(long)]
    pub metadata: bool,
}

#[derive(Args, Debug)]
pub struct SemanticArgs {
    /// Project ID
    pub project: String,

    /// Search query
    pub query: String,

    /// Maximum results
    #[arg(short, long, default_value = "10")]
    pub limit: usize,
}

#[derive(Args, Debug)]
pub struct ContextArgs {
    /// Project ID
    pub project: String,

    /// Conversation whose recent messages to include
    #[arg(short, long)]
    pub conversation: Option<String>,

    /// Token budget
    #[arg(short, long)]
    pub max_tokens: Option<usize>,

    /// Leave out the project brief
    #[arg(long)]
    pub no_brief: bool,

    /// Leave out knowledge sources
    #[arg(long)]
    pub no_knowledge: bool,

    /// Print the rendered prompt text instead of a summary
    #[arg(long)]
    pub render: bool,
}

// ─────────────────────────────────────────────────────────────────────────────
// Snapshots
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Args, Debug)]
pub struct SnapshotCommand {
    #[command(subcommand)]
    pub action: SnapshotAction,
}

#[derive(Subcommand, Debug)]
pub enum SnapshotAction {
    /// Record the project's current brief and indexed sources
    Create {
        /// Project ID
        project: String,

        /// Conversation ID
        conversation: String,
    },

    /// Show a snapshot
    Show {
        /// Snapshot ID
        id: String,
    },
}

// ─────────────────────────────────────────────────────────────────────────────
// Knowledge
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Args, Debug)]
pub struct KnowledgeCommand {
    #[command(subcommand)]
    pub action: KnowledgeAction,
}

#[derive(Subcommand, Debug)]
pub enum KnowledgeAction {
    /// Add, embed and index a knowledge source
    Add {
        /// Project ID
        project: String,

        /// Title
        #[arg(short, long)]
        title: String,

        /// Content (or use --file)
        #[arg(short, long, conflicts_with = "file", required_unless_present = "file")]
        content: Option<String>,

        /// Read content from a file
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Source type (document, transcript, note, ...)
        #[arg(short, long, default_value = "document")]
        source_type: String,

        /// External source id
        #[arg(long)]
        source_id: Option<String>,

        /// Metadata as a JSON object
        #[arg(long)]
        metadata: Option<String>,
    },
}

// ─────────────────────────────────────────────────────────────────────────────
// Projects
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Args, Debug)]
pub struct ProjectCommand {
    #[command(subcommand)]
    pub action: ProjectAction,
}

#[derive(Subcommand, Debug)]
pub enum ProjectAction {
    /// Create a project owned by the acting user
    Create {
        /// Title
        #[arg(short, long)]
        title: String,

        /// Client name
        #[arg(short, long)]
        client: Option<String>,

        /// Description
        #[arg(short, long)]
        description: Option<String>,

        /// Allow read access to everyone
        #[arg(long)]
        public: bool,
    },

    /// Grant a user a role on a project
    Grant {
        /// Project ID
        project: String,

        /// User to grant
        grantee: String,

        /// Role
        #[arg(short, long, value_enum, default_value = "viewer")]
        role: RoleArg,

        /// Explicit permissions instead of the role defaults (repeatable)
        #[arg(short, long = "permission")]
        permissions: Vec<String>,
    },

    /// List access grants
    Access {
        /// Project ID
        project: String,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum RoleArg {
    Owner,
    Editor,
    Viewer,
}

// ─────────────────────────────────────────────────────────────────────────────
// Conversations
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Args, Debug)]
pub struct ConversationCommand {
    #[command(subcommand)]
    pub action: ConversationAction,
}

#[derive(Subcommand, Debug)]
pub enum ConversationAction {
    /// Start a conversation
    Create {
        /// Project the conversation belongs to
        #[arg(short, long)]
        project: Option<String>,

        /// Title
        #[arg(short, long)]
        title: Option<String>,
    },

    /// Append a message
    Say {
        /// Conversation ID
        conversation: String,

        /// Message text
        content: String,

        /// Speaker role
        #[arg(short, long, default_value = "user")]
        role: String,
    },
}

// ─────────────────────────────────────────────────────────────────────────────
// Verification
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// Question to answer
    pub query: String,

    /// Ground the answer in this project's context
    #[arg(short, long)]
    pub project: Option<String>,

    /// Token budget for the grounding context
    #[arg(short, long, requires = "project")]
    pub max_tokens: Option<usize>,

    /// Show draft, questions and findings
    #[arg(short, long)]
    pub verbose: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_search() {
        let cli = Cli::try_parse_from([
            "aura", "--user", "u1", "search", "p1", "kinetic typography", "-t", "0.7", "-s", "document", "-s",
            "transcript",
        ])
        .unwrap();

        assert_eq!(cli.user, "u1");
        match cli.command {
            Commands::Search(args) => {
                assert_eq!(args.project, "p1");
                assert_eq!(args.threshold, Some(0.7));
                assert_eq!(args.source_types, vec!["document", "transcript"]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_knowledge_add_needs_content() {
        assert!(Cli::try_parse_from(["aura", "knowledge", "add", "p1", "--title", "t"]).is_err());
        assert!(Cli::try_parse_from(["aura", "knowledge", "add", "p1", "--title", "t", "--content", "c"]).is_ok());
    }

    #[test]
    fn test_verify_max_tokens_requires_project() {
        assert!(Cli::try_parse_from(["aura", "verify", "q", "--max-tokens", "100"]).is_err());
        assert!(Cli::try_parse_from(["aura", "verify", "q", "-p", "p1", "--max-tokens", "100"]).is_ok());
    }
}
