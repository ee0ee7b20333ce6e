//! Binary entry point for znanium.
//!
//! Manages the folder/note tree from the command line and runs the chat
//! front end as a line-based REPL.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print_stderr in main binary for CLI output
#![allow(clippy::print_stderr)]
#![allow(clippy::print_stdout)]
// Allow needless_pass_by_value for command functions
#![allow(clippy::needless_pass_by_value)]
// Allow multiple crate versions from transitive dependencies
#![allow(clippy::multiple_crate_versions)]

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use secrecy::ExposeSecret;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use znanium::chat::{ChatMachine, Command, Input, parse_line};
use znanium::config::ZnaniumConfig;
use znanium::observability;
use znanium::services::{display_path, full_tree, path_string};
use znanium::storage::{self, InMemoryTreeStore, TreeStore};
use znanium::{Answer, Assistant, FolderId, MatchSource, NoteId, OwnerId, llm};

/// Znanium - a personal knowledge base you can ask questions.
#[derive(Parser)]
#[command(name = "znanium")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Owner whose tree is used.
    #[arg(short, long, global = true, env = "ZNANIUM_OWNER", default_value = "local")]
    owner: String,

    /// Keep everything in memory for this run.
    #[arg(long, global = true)]
    ephemeral: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Manage folders.
    Folder {
        /// Folder subcommand.
        #[command(subcommand)]
        action: FolderAction,
    },

    /// Manage notes.
    Note {
        /// Note subcommand.
        #[command(subcommand)]
        action: NoteAction,
    },

    /// Print the whole folder tree.
    Tree,

    /// Print the full path of a folder.
    Path {
        /// Folder id.
        id: FolderId,
    },

    /// Match a candidate path against the tree without calling the model.
    Locate {
        /// Candidate path, e.g. `Work/Projects`.
        candidate: String,

        /// Query text used for the keyword fallback.
        query: Option<String>,
    },

    /// Ask a question.
    Ask {
        /// The question.
        question: String,

        /// Save a generated answer into the answers folder.
        #[arg(long)]
        save: bool,
    },

    /// Start an interactive chat session.
    Chat,

    /// Show configuration.
    Config {
        /// Show current configuration.
        #[arg(long)]
        show: bool,
    },
}

/// Folder subcommands.
#[derive(Subcommand)]
enum FolderAction {
    /// Create a folder.
    Add {
        /// Folder label.
        label: String,

        /// Parent folder id; a root folder when omitted.
        #[arg(short, long)]
        parent: Option<FolderId>,
    },

    /// Delete a folder with its whole subtree.
    Rm {
        /// Folder id.
        id: FolderId,
    },

    /// List child folders.
    Ls {
        /// Parent folder id; root folders when omitted.
        #[arg(short, long)]
        parent: Option<FolderId>,
    },
}

/// Note subcommands.
#[derive(Subcommand)]
enum NoteAction {
    /// Create a note in a folder.
    Add {
        /// Folder id.
        folder: FolderId,

        /// Note text.
        text: String,
    },

    /// Delete a note.
    Rm {
        /// Note id.
        id: NoteId,
    },

    /// Replace a note's text.
    Edit {
        /// Note id.
        id: NoteId,

        /// New text.
        text: String,
    },

    /// List the notes of a folder.
    Ls {
        /// Folder id.
        folder: FolderId,
    },
}

/// Main entry point.
fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = match ZnaniumConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        },
    };

    if let Err(e) = observability::init_from_settings(&config.logging, cli.verbose) {
        eprintln!("Failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    match run_command(cli, config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        },
    }
}

/// Runs the selected command.
fn run_command(cli: Cli, config: ZnaniumConfig) -> anyhow::Result<()> {
    if let Commands::Config { show } = cli.command {
        return cmd_config(&config, show);
    }

    let store: Arc<dyn TreeStore> = if cli.ephemeral {
        Arc::new(InMemoryTreeStore::new())
    } else {
        storage::open_store(&config).context("failed to open the knowledge base")?
    };
    let owner = OwnerId::from(cli.owner);

    match cli.command {
        Commands::Folder { action } => cmd_folder(store.as_ref(), &owner, action),
        Commands::Note { action } => cmd_note(store.as_ref(), &owner, action),
        Commands::Tree => {
            let tree = full_tree(store.as_ref(), &owner)?;
            if tree.is_empty() {
                println!("No folders yet.");
            } else {
                print!("{tree}");
            }
            Ok(())
        },
        Commands::Path { id } => {
            println!("{}", path_string(store.as_ref(), &owner, id)?);
            Ok(())
        },
        Commands::Locate { candidate, query } => {
            let assistant = build_assistant(store, &config);
            cmd_locate(&assistant, &owner, &candidate, query.as_deref().unwrap_or(""))
        },
        Commands::Ask { question, save } => {
            let assistant = build_assistant(store, &config);
            cmd_ask(&assistant, &owner, &question, save)
        },
        Commands::Chat => {
            let assistant = build_assistant(store, &config);
            cmd_chat(assistant, &owner)
        },
        Commands::Config { .. } => Ok(()),
    }
}

fn build_assistant(store: Arc<dyn TreeStore>, config: &ZnaniumConfig) -> Assistant {
    Assistant::from_config(store, llm::build_provider(&config.llm), config)
}

/// Folder command.
fn cmd_folder(store: &dyn TreeStore, owner: &OwnerId, action: FolderAction) -> anyhow::Result<()> {
    match action {
        FolderAction::Add { label, parent } => {
            let Some(folder) = store.create_folder(owner, &label, parent)? else {
                bail!("parent folder not found");
            };
            println!(
                "Created folder {} at {}",
                folder.id,
                path_string(store, owner, folder.id)?
            );
        },
        FolderAction::Rm { id } => {
            if !store.delete_folder(owner, id)? {
                bail!("folder {id} not found");
            }
            println!("Deleted folder {id}");
        },
        FolderAction::Ls { parent } => {
            println!("{}", display_path(store, owner, parent)?);
            for folder in store.list_children(owner, parent)? {
                println!("  {:>4}  {}", folder.id, folder.label);
            }
        },
    }
    Ok(())
}

/// Note command.
fn cmd_note(store: &dyn TreeStore, owner: &OwnerId, action: NoteAction) -> anyhow::Result<()> {
    match action {
        NoteAction::Add { folder, text } => {
            let Some(note) = store.create_note(owner, Some(folder), &text)? else {
                bail!("folder {folder} not found");
            };
            println!("Created note {}", note.id);
        },
        NoteAction::Rm { id } => {
            if !store.delete_note(owner, id)? {
                bail!("note {id} not found");
            }
            println!("Deleted note {id}");
        },
        NoteAction::Edit { id, text } => {
            if !store.update_note_text(owner, id, &text)? {
                bail!("note {id} not found");
            }
            println!("Updated note {id}");
        },
        NoteAction::Ls { folder } => {
            if store.get_folder(owner, folder)?.is_none() {
                bail!("folder {folder} not found");
            }
            println!("{}", display_path(store, owner, Some(folder))?);
            for (index, note) in store.list_notes(owner, folder)?.iter().enumerate() {
                println!("  {}. [{}] {}", index + 1, note.id, note.preview(80));
            }
        },
    }
    Ok(())
}

/// Locate command.
fn cmd_locate(
    assistant: &Assistant,
    owner: &OwnerId,
    candidate: &str,
    query: &str,
) -> anyhow::Result<()> {
    let matched = assistant
        .matcher()
        .locate(assistant.store(), owner, candidate, query)?;

    match &matched.folder {
        Some(best) => println!("Best folder: {} (score {})", best.path, best.score),
        None => println!("Best folder: none"),
    }
    match matched.source {
        MatchSource::None => println!("No matching notes."),
        source => {
            println!("Matched by {}:", source.as_str());
            for note in &matched.notes {
                println!("  [{}] {}", note.id, note.preview(80));
            }
        },
    }
    Ok(())
}

/// Ask command.
fn cmd_ask(assistant: &Assistant, owner: &OwnerId, question: &str, save: bool) -> anyhow::Result<()> {
    match assistant.ask(owner, question)? {
        Answer::FromKnowledgeBase { text, .. } => println!("{text}"),
        Answer::Generated { text } => {
            println!("{text}");
            if save {
                let (folder, note) = assistant.save_generated_answer(owner, &text)?;
                eprintln!("Saved as note {} in {}", note.id, folder.label);
            }
        },
        Answer::Unavailable => bail!("no answer available, try again later"),
    }
    Ok(())
}

/// Chat command: one input per line until EOF or `/quit`.
fn cmd_chat(assistant: Assistant, owner: &OwnerId) -> anyhow::Result<()> {
    let machine = ChatMachine::new(Arc::new(assistant));
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    println!("{}\n", machine.handle(owner, Input::Command(Command::Start)));
    print!("> ");
    stdout.flush()?;

    for line in stdin.lock().lines() {
        let line = line?;
        if line.trim() == "/quit" {
            break;
        }
        if !line.trim().is_empty() {
            match parse_line(&line) {
                Ok(input) => println!("{}\n", machine.handle(owner, input)),
                Err(e) => println!("{e}\n"),
            }
        }
        print!("> ");
        stdout.flush()?;
    }
    println!();
    Ok(())
}

/// Config command.
fn cmd_config(config: &ZnaniumConfig, show: bool) -> anyhow::Result<()> {
    if show {
        println!("Current Configuration");
        println!("=====================");
        println!();
        println!("Data Directory: {}", config.data_dir.display());
        println!("Database: {}", storage::database_path(config).display());
        println!("Match Threshold: {}", config.matcher.threshold);
        println!("AI Answers Folder: {}", config.ai_answers_folder);
        println!(
            "Prompts: {}",
            config
                .prompts_path
                .as_ref()
                .map_or_else(|| "(built in)".to_string(), |p| p.display().to_string())
        );
        println!();
        println!("LLM Configuration:");
        println!("  Model: {}", config.llm.model);
        println!(
            "  Base URL: {}",
            config.llm.base_url.as_deref().unwrap_or("(default)")
        );
        println!(
            "  API Key: {}",
            if config
                .llm
                .api_key
                .as_ref()
                .is_some_and(|key| !key.expose_secret().is_empty())
            {
                "(set)"
            } else {
                "(not set)"
            }
        );
    } else {
        println!("Use --show to display configuration");
    }

    Ok(())
}
