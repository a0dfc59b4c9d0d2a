//! Document command handlers

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use tracing::debug;
use uuid::Uuid;

use direktiv_core::{DocumentFilter, ImportControl, ImportOptions, Library};

use crate::output::Output;

/// Copy one file into the library
pub fn add(
    library: &mut Library,
    file: PathBuf,
    category: Option<String>,
    title: Option<String>,
    output: &Output,
) -> Result<()> {
    let category = category.unwrap_or_else(|| library.default_category().to_string());

    let doc = library
        .add(&file, &category, title.as_deref())
        .with_context(|| format!("Failed to add {}", file.display()))?;

    output.success(&format!("Added {}", doc.stored_path));
    output.print_document(&doc);
    Ok(())
}

/// Import a file or directory
pub fn import(
    library: &mut Library,
    source: PathBuf,
    category: Option<String>,
    options: ImportOptions,
    output: &Output,
) -> Result<()> {
    let show_progress = !output.is_quiet() && !output.is_json();

    let summary = library
        .import_path_with_progress(&source, category.as_deref(), &options, |step| {
            if show_progress {
                eprintln!("[{}/{}] {}", step.index + 1, step.total, step.path.display());
            }
            ImportControl::Continue
        })
        .with_context(|| format!("Failed to import {}", source.display()))?;

    output.print_import_summary(&summary);
    Ok(())
}

/// List documents
pub fn list(
    library: &Library,
    category: Option<String>,
    read: Option<bool>,
    output: &Output,
) -> Result<()> {
    let filter = DocumentFilter {
        category,
        search_text: None,
        read,
    };

    let docs = library.list_documents(&filter)?;
    output.print_documents(&docs);
    Ok(())
}

/// Search titles and file names
pub fn search(library: &Library, query: String, output: &Output) -> Result<()> {
    let docs = library.search(&query)?;
    output.print_documents(&docs);
    Ok(())
}

/// Show a document, or its raw markdown
pub fn show(library: &mut Library, id: String, content: bool, output: &Output) -> Result<()> {
    let uuid = parse_document_id(&id, library)?;

    if content {
        let text = library
            .read_content(uuid)
            .with_context(|| format!("Failed to read document {}", id))?;
        // Viewing still works when another process holds the library
        if let Err(e) = library.touch_opened(uuid) {
            debug!("Could not record opening {}: {}", uuid, e);
        }
        if output.is_json() {
            output.print_json(&serde_json::json!({
                "id": uuid,
                "content": text
            }));
        } else {
            print!("{}", text);
        }
        return Ok(());
    }

    let doc = library
        .get(uuid)?
        .ok_or_else(|| anyhow::anyhow!("Document not found: {}", id))?;
    output.print_document(&doc);
    Ok(())
}

/// Mark a document read or unread
pub fn set_read(library: &mut Library, id: String, read: bool, output: &Output) -> Result<()> {
    let uuid = parse_document_id(&id, library)?;

    let doc = library
        .set_read(uuid, read)
        .context("Failed to update read state")?;

    output.success(&format!(
        "Marked '{}' as {}",
        doc.title,
        if read { "read" } else { "unread" }
    ));
    Ok(())
}

/// Move a document to another category
pub fn move_to(library: &mut Library, id: String, category: String, output: &Output) -> Result<()> {
    let uuid = parse_document_id(&id, library)?;

    let doc = library
        .move_document(uuid, &category)
        .context("Failed to move document")?;

    output.success(&format!("Moved '{}' to {}", doc.title, doc.stored_path));
    Ok(())
}

/// Remove a document and its file
pub fn remove(library: &mut Library, id: String, output: &Output) -> Result<()> {
    let uuid = parse_document_id(&id, library)?;

    let doc = library
        .remove_document(uuid)
        .context("Failed to remove document")?;

    output.success(&format!("Removed {}", doc.stored_path));
    Ok(())
}

/// Resolve a full UUID or a unique prefix of one
pub fn parse_document_id(id: &str, library: &Library) -> Result<Uuid> {
    // Try full UUID first
    if let Ok(uuid) = Uuid::parse_str(id) {
        return Ok(uuid);
    }

    // Try prefix match
    let docs = library.list_documents(&DocumentFilter::all())?;
    let matches: Vec<_> = docs
        .iter()
        .filter(|d| d.id.to_string().starts_with(id))
        .collect();

    match matches.len() {
        0 => bail!("No document found matching: {}", id),
        1 => Ok(matches[0].id),
        _ => {
            eprintln!("Multiple documents match '{}':", id);
            for doc in &matches {
                eprintln!("  {} - {}", doc.id, doc.title);
            }
            bail!("Ambiguous ID. Please provide more characters.");
        }
    }
}
