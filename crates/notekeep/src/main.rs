//! # notekeep CLI (`nk`)
//!
//! The `nk` binary drives the whole pipeline: user and document
//! management, index maintenance, semantic search, chat over the user's
//! own notes, and the zettel inbox with its suggest/apply workflow.
//!
//! ## Usage
//!
//! ```bash
//! nk --config ./config/nk.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `nk init` | Create the SQLite database and run schema migrations |
//! | `nk user set <id>` | Select a user's embedding and chat models |
//! | `nk doc add` | Store a markdown document and index it |
//! | `nk doc rm <id>` | Soft-delete a document and drop its vectors |
//! | `nk index --user <id>` | Run an index maintenance pass |
//! | `nk search --user <id> "<query>"` | Semantic search over the user's notes |
//! | `nk ask --user <id> "<question>"` | Answer a question from the user's notes |
//! | `nk zettel add --user <id>` | Capture a freeform note into the inbox |
//! | `nk suggest --user <id>` | Cluster the inbox and suggest insert positions |
//! | `nk apply --user <id> <file>` | Splice accepted suggestions into their documents |

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use notekeep::commands::{apply_cmd, ask_cmd, index_cmd, notes, search_cmd, suggest_cmd};
use notekeep::config;
use notekeep::db;
use notekeep_core::error::{CoreError, StatusClass};

/// notekeep: a personal knowledge base with per-user semantic search,
/// chat, and note insert suggestions.
#[derive(Parser)]
#[command(
    name = "nk",
    about = "notekeep — a personal knowledge base with semantic search, chat, and note filing",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/nk.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Idempotent.
    Init,

    /// Manage users and their model selection.
    User {
        #[command(subcommand)]
        action: UserAction,
    },

    /// Manage documents.
    Doc {
        #[command(subcommand)]
        action: DocAction,
    },

    /// Manage the zettel inbox of captured notes.
    Zettel {
        #[command(subcommand)]
        action: ZettelAction,
    },

    /// Run an index maintenance pass.
    ///
    /// With `--document` the named documents are re-chunked and
    /// re-embedded in place; `--delete` removes one document's vectors;
    /// `--recreate` rebuilds the index from every live document.
    Index {
        /// User whose index to maintain.
        #[arg(long)]
        user: String,

        /// Document id; repeatable for a batch update.
        #[arg(long = "document")]
        documents: Vec<String>,

        /// Rebuild the index from scratch.
        #[arg(long)]
        recreate: bool,

        /// Remove the named document's vectors instead of updating them.
        #[arg(long)]
        delete: bool,
    },

    /// Search a user's documents semantically.
    Search {
        /// User whose index to query.
        #[arg(long)]
        user: String,

        /// The search query string.
        query: String,
    },

    /// Answer a question using the user's notes as context.
    Ask {
        /// User whose notes to consult.
        #[arg(long)]
        user: String,

        /// The question.
        question: String,
    },

    /// Cluster the zettel inbox and print insert suggestions as JSON.
    Suggest {
        /// User whose inbox to process.
        #[arg(long)]
        user: String,

        /// Let the user's chat model pick among candidate documents
        /// instead of taking the top-ranked one.
        #[arg(long)]
        rerank: bool,
    },

    /// Apply suggestions produced by `suggest`: splice each snippet
    /// into its document, delete the consumed zettels, and reindex.
    Apply {
        /// User whose documents are updated.
        #[arg(long)]
        user: String,

        /// JSON file of suggestions, as printed by `suggest`.
        file: PathBuf,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// Create a user or change their model selection.
    Set {
        /// User id.
        id: String,

        /// Embedding model id (e.g. `text-embedding-3-small`).
        #[arg(long)]
        embedding_model: Option<String>,

        /// Chat model id (e.g. `gpt-4o-mini`).
        #[arg(long)]
        chat_model: Option<String>,
    },
    /// Show a user's model selection.
    Show {
        /// User id.
        id: String,
    },
}

#[derive(Subcommand)]
enum DocAction {
    /// Store a new document and index it.
    Add {
        /// Owning user id.
        #[arg(long)]
        user: String,

        /// Document title.
        #[arg(long)]
        title: String,

        /// Markdown file to read; stdin when omitted.
        file: Option<PathBuf>,
    },
    /// Soft-delete a document and drop its vectors.
    Rm {
        /// Document id.
        id: String,
    },
    /// Print a document.
    Show {
        /// Document id.
        id: String,
    },
}

#[derive(Subcommand)]
enum ZettelAction {
    /// Capture a freeform note into the inbox.
    Add {
        /// Owning user id.
        #[arg(long)]
        user: String,

        /// Note text; stdin when omitted.
        text: Option<String>,
    },
    /// List the inbox, oldest first.
    List {
        /// Owning user id.
        #[arg(long)]
        user: String,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("notekeep=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(err) = run(cli).await {
        eprintln!("error: {:#}", err);
        std::process::exit(exit_code(&err));
    }
}

/// 2 for invalid requests, 3 for missing entities, 1 otherwise.
fn exit_code(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<CoreError>().map(CoreError::status_class) {
        Some(StatusClass::BadRequest) => 2,
        Some(StatusClass::NotFound) => 3,
        _ => 1,
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let pool = db::connect(&cfg).await?;
            db::run_migrations(&pool).await?;
            pool.close().await;
            println!("Database initialized successfully.");
        }
        Commands::User { action } => match action {
            UserAction::Set {
                id,
                embedding_model,
                chat_model,
            } => {
                notes::run_user_set(&cfg, &id, embedding_model, chat_model).await?;
            }
            UserAction::Show { id } => {
                notes::run_user_show(&cfg, &id).await?;
            }
        },
        Commands::Doc { action } => match action {
            DocAction::Add { user, title, file } => {
                notes::run_doc_add(&cfg, &user, &title, file.as_deref()).await?;
            }
            DocAction::Rm { id } => {
                notes::run_doc_rm(&cfg, &id).await?;
            }
            DocAction::Show { id } => {
                notes::run_doc_show(&cfg, &id).await?;
            }
        },
        Commands::Zettel { action } => match action {
            ZettelAction::Add { user, text } => {
                notes::run_zettel_add(&cfg, &user, text).await?;
            }
            ZettelAction::List { user } => {
                notes::run_zettel_list(&cfg, &user).await?;
            }
        },
        Commands::Index {
            user,
            documents,
            recreate,
            delete,
        } => {
            index_cmd::run_index(&cfg, &user, documents, recreate, delete).await?;
        }
        Commands::Search { user, query } => {
            search_cmd::run_search(&cfg, &user, &query).await?;
        }
        Commands::Ask { user, question } => {
            ask_cmd::run_ask(&cfg, &user, &question).await?;
        }
        Commands::Suggest { user, rerank } => {
            suggest_cmd::run_suggest(&cfg, &user, rerank).await?;
        }
        Commands::Apply { user, file } => {
            apply_cmd::run_apply(&cfg, &user, &file).await?;
        }
    }

    Ok(())
}
