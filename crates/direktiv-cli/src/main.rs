//! direktiv CLI
//!
//! Command-line interface for direktiv - a categorized markdown library.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::EnvFilter;

use direktiv_core::config::resolve_library_root;
use direktiv_core::{Config, DocumentFilter, ImportOptions, Library, LibraryError};

mod commands;
mod output;

use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "direktiv")]
#[command(about = "direktiv - a categorized library of markdown documents")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Library root (default: $DIREKTIV_ROOT or ~/.direktiv)
    #[arg(long, global = true, value_name = "DIR")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// More log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a markdown file to the library
    Add {
        /// File to copy into the library
        file: PathBuf,
        /// Target category (default: configured default category)
        #[arg(short, long)]
        category: Option<String>,
        /// Display title (default: file name without extension)
        #[arg(short = 'T', long)]
        title: Option<String>,
    },
    /// Import a markdown file or a directory of them
    Import {
        /// File or directory to import
        source: PathBuf,
        /// Put everything into this category (default: one category per folder)
        #[arg(short, long)]
        category: Option<String>,
        /// Only import the top level of the directory
        #[arg(long)]
        no_recursive: bool,
        /// Include dot-files and dot-directories
        #[arg(long)]
        hidden: bool,
        /// Import files even when an identical copy is already managed
        #[arg(long, conflicts_with = "replace")]
        keep_duplicates: bool,
        /// Overwrite documents with the same name instead of suffixing
        #[arg(long)]
        replace: bool,
    },
    /// List documents
    #[command(alias = "ls")]
    List {
        /// Only this category
        #[arg(short, long)]
        category: Option<String>,
        /// Only unread documents
        #[arg(long, conflicts_with = "read")]
        unread: bool,
        /// Only read documents
        #[arg(long)]
        read: bool,
    },
    /// Search document titles and file names
    Search {
        /// Search text
        query: String,
    },
    /// Show document details
    Show {
        /// Document ID (full UUID or prefix)
        id: String,
        /// Print the markdown content instead
        #[arg(long)]
        content: bool,
    },
    /// Mark a document as read
    Read {
        /// Document ID (full UUID or prefix)
        id: String,
    },
    /// Mark a document as unread
    Unread {
        /// Document ID (full UUID or prefix)
        id: String,
    },
    /// Move a document to another category
    #[command(alias = "mv")]
    Move {
        /// Document ID (full UUID or prefix)
        id: String,
        /// Target category
        category: String,
    },
    /// Remove a document and its file
    #[command(alias = "rm")]
    Remove {
        /// Document ID (full UUID or prefix)
        id: String,
    },
    /// Manage categories
    Category {
        #[command(subcommand)]
        command: CategoryCommands,
    },
    /// Show library statistics
    Stats,
    /// Copy documents to a directory
    Export {
        /// Destination directory (must not exist or be empty)
        destination: PathBuf,
        /// Only this category
        #[arg(short, long)]
        category: Option<String>,
        /// Only documents matching this text
        #[arg(short, long)]
        search: Option<String>,
    },
    /// Check that records and files agree
    Reconcile {
        /// Remove records whose file is missing
        #[arg(long)]
        prune: bool,
    },
    /// Show or set configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand)]
enum CategoryCommands {
    /// List categories
    #[command(alias = "ls")]
    List,
    /// Create a category
    #[command(alias = "add")]
    Create {
        /// Category name
        name: String,
    },
    /// Delete a category
    #[command(alias = "rm")]
    Delete {
        /// Category name
        name: String,
        /// Also remove the documents it contains
        #[arg(long)]
        cascade: bool,
    },
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (default_category, theme, show_hidden_files, ...)
        key: String,
        /// Configuration value
        value: String,
    },
}

fn main() {
    let cli = Cli::parse();
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));

    if let Err(e) = run(cli, &output) {
        eprintln!("Error: {:#}", e);
        let hint = e
            .chain()
            .find_map(|cause| cause.downcast_ref::<LibraryError>())
            .and_then(LibraryError::recovery_suggestion);
        if let Some(hint) = hint {
            eprintln!("Hint: {}", hint);
        }
        std::process::exit(1);
    }
}

fn run(cli: Cli, output: &Output) -> Result<()> {
    let root = resolve_library_root(cli.root.as_deref())?;
    let config = Config::load(&root).context("Failed to load configuration")?;
    init_logging(&config, cli.verbose);
    debug!("Library root: {:?}", root);

    // Commands that don't need the library
    if let Commands::Config { command } = &cli.command {
        return handle_config_command(command.clone(), &root, output);
    }

    let mut library = Library::open_with(&root, &config.library_options())
        .with_context(|| format!("Failed to open library at {}", root.display()))?;

    match cli.command {
        Commands::Add {
            file,
            category,
            title,
        } => commands::document::add(&mut library, file, category, title, output),
        Commands::Import {
            source,
            category,
            no_recursive,
            hidden,
            keep_duplicates,
            replace,
        } => {
            let defaults = config.import_options();
            let options = ImportOptions {
                recursive: !no_recursive,
                include_hidden: hidden || defaults.include_hidden,
                skip_identical: !keep_duplicates,
                replace,
            };
            commands::document::import(&mut library, source, category, options, output)
        }
        Commands::List {
            category,
            unread,
            read,
        } => {
            let read = match (read, unread) {
                (true, _) => Some(true),
                (_, true) => Some(false),
                _ => None,
            };
            commands::document::list(&library, category, read, output)
        }
        Commands::Search { query } => commands::document::search(&library, query, output),
        Commands::Show { id, content } => {
            commands::document::show(&mut library, id, content, output)
        }
        Commands::Read { id } => commands::document::set_read(&mut library, id, true, output),
        Commands::Unread { id } => commands::document::set_read(&mut library, id, false, output),
        Commands::Move { id, category } => {
            commands::document::move_to(&mut library, id, category, output)
        }
        Commands::Remove { id } => commands::document::remove(&mut library, id, output),
        Commands::Category { command } => handle_category_command(command, &mut library, output),
        Commands::Stats => commands::library::stats(&library, output),
        Commands::Export {
            destination,
            category,
            search,
        } => {
            let filter = DocumentFilter {
                category,
                search_text: search,
                read: None,
            };
            commands::library::export(&library, destination, filter, output)
        }
        Commands::Reconcile { prune } => commands::library::reconcile(&mut library, prune, output),
        Commands::Config { .. } => unreachable!(), // Handled above
    }
}

fn handle_category_command(
    command: CategoryCommands,
    library: &mut Library,
    output: &Output,
) -> Result<()> {
    match command {
        CategoryCommands::List => commands::category::list(library, output),
        CategoryCommands::Create { name } => commands::category::create(library, name, output),
        CategoryCommands::Delete { name, cascade } => {
            commands::category::delete(library, name, cascade, output)
        }
    }
}

fn handle_config_command(
    command: Option<ConfigCommands>,
    root: &Path,
    output: &Output,
) -> Result<()> {
    match command {
        Some(ConfigCommands::Show) | None => commands::config::show(root, output),
        Some(ConfigCommands::Set { key, value }) => {
            commands::config::set(root, key, value, output)
        }
    }
}

/// Initialize logging
///
/// `RUST_LOG` wins over `-v`. Logs go to `log_file` when configured,
/// otherwise to stderr.
fn init_logging(config: &Config, verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("direktiv_core={},direktiv={}", level, level)));

    let (writer, ansi) = match config.log_file.as_ref() {
        Some(path) => match File::options().create(true).append(true).open(path) {
            Ok(file) => (BoxMakeWriter::new(Mutex::new(file)), false),
            Err(e) => {
                eprintln!("Warning: Could not open log file {:?}: {}", path, e);
                (BoxMakeWriter::new(std::io::stderr), true)
            }
        },
        None => (BoxMakeWriter::new(std::io::stderr), true),
    };

    // Ignore error if already initialized
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_ansi(ansi)
        .with_writer(writer)
        .try_init();
}
