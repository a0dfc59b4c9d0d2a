//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use serde::Serialize;

use direktiv_core::{
    Category, Document, ExportSummary, ImportSummary, LibraryStats, ReconcileReport, SkipReason,
};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    /// The output format
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Check if output is in quiet mode
    pub fn is_quiet(&self) -> bool {
        matches!(self.format, OutputFormat::Quiet)
    }

    /// Check if output is JSON
    pub fn is_json(&self) -> bool {
        matches!(self.format, OutputFormat::Json)
    }

    /// Print a value as pretty JSON
    pub fn print_json<T: Serialize + ?Sized>(&self, value: &T) {
        match serde_json::to_string_pretty(value) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("Failed to serialize output: {}", e),
        }
    }

    /// Print a single document
    pub fn print_document(&self, doc: &Document) {
        match self.format {
            OutputFormat::Human => {
                println!("ID:        {}", doc.id);
                println!("Title:     {}", doc.title);
                println!("Category:  {}", doc.category);
                println!("Stored at: {}", doc.stored_path);
                if let Some(ref original) = doc.original_path {
                    println!("From:      {}", original);
                }
                println!("Read:      {}", if doc.read { "yes" } else { "no" });
                println!("Added:     {}", doc.added_at.format("%Y-%m-%d %H:%M"));
                if let Some(last_read) = doc.last_read_at {
                    println!("Last read: {}", last_read.format("%Y-%m-%d %H:%M"));
                }
                if let Some(opened) = doc.last_opened_at {
                    println!("Opened:    {}", opened.format("%Y-%m-%d %H:%M"));
                }
            }
            OutputFormat::Json => self.print_json(doc),
            OutputFormat::Quiet => {
                println!("{}", doc.id);
            }
        }
    }

    /// Print a list of documents
    pub fn print_documents(&self, docs: &[Document]) {
        match self.format {
            OutputFormat::Human => {
                if docs.is_empty() {
                    println!("No documents found.");
                    return;
                }
                for doc in docs {
                    println!(
                        "{} {} | {} | {}",
                        doc.short_id(),
                        if doc.read { " " } else { "*" },
                        truncate(&doc.category, 15),
                        truncate(&doc.title, 50)
                    );
                }
                let unread = docs.iter().filter(|d| !d.read).count();
                println!("\n{} document(s), {} unread", docs.len(), unread);
            }
            OutputFormat::Json => self.print_json(docs),
            OutputFormat::Quiet => {
                for doc in docs {
                    println!("{}", doc.id);
                }
            }
        }
    }

    /// Print categories with their document counts
    pub fn print_categories(&self, categories: &[(Category, usize)]) {
        match self.format {
            OutputFormat::Human => {
                if categories.is_empty() {
                    println!("No categories found.");
                    return;
                }
                for (category, count) in categories {
                    println!("{} ({})", category.name, count);
                }
                println!("\n{} categor{}", categories.len(), plural_y(categories.len()));
            }
            OutputFormat::Json => {
                let json: Vec<_> = categories
                    .iter()
                    .map(|(category, count)| {
                        serde_json::json!({
                            "name": category.name,
                            "created_at": category.created_at,
                            "documents": count
                        })
                    })
                    .collect();
                self.print_json(&json);
            }
            OutputFormat::Quiet => {
                for (category, _) in categories {
                    println!("{}", category.name);
                }
            }
        }
    }

    pub fn print_stats(&self, stats: &LibraryStats) {
        match self.format {
            OutputFormat::Human => {
                println!("Documents:  {}", stats.total_documents);
                println!("  Read:     {}", stats.read_count);
                println!("  Unread:   {}", stats.unread_count);
                println!("Categories: {}", stats.total_categories);
                for (name, count) in &stats.per_category {
                    println!("  {:<20} {}", truncate(name, 20), count);
                }
                println!("Size:       {}", human_size(stats.total_size_bytes));
            }
            OutputFormat::Json => self.print_json(stats),
            OutputFormat::Quiet => {
                println!("{}", stats.total_documents);
            }
        }
    }

    pub fn print_import_summary(&self, summary: &ImportSummary) {
        match self.format {
            OutputFormat::Human => {
                for doc in &summary.imported {
                    println!("+ {}", doc.stored_path);
                }
                for skipped in &summary.skipped {
                    let reason = match skipped.reason {
                        SkipReason::Hidden => "hidden",
                        SkipReason::Duplicate => "duplicate",
                    };
                    println!("- {} ({})", skipped.path.display(), reason);
                }
                for failure in &summary.failures {
                    println!("! {}: {}", failure.path.display(), failure.reason);
                }
                println!();
                println!(
                    "Imported {}, skipped {}, failed {}{}",
                    summary.imported_count(),
                    summary.skipped_count(),
                    summary.failure_count(),
                    if summary.cancelled { " (cancelled)" } else { "" }
                );
            }
            OutputFormat::Json => {
                self.print_json(&serde_json::json!({
                    "imported_count": summary.imported_count(),
                    "skipped_count": summary.skipped_count(),
                    "imported": summary.imported,
                    "skipped": summary.skipped,
                    "failures": summary.failures,
                    "cancelled": summary.cancelled
                }));
            }
            OutputFormat::Quiet => {
                for doc in &summary.imported {
                    println!("{}", doc.id);
                }
            }
        }
    }

    pub fn print_export_summary(&self, summary: &ExportSummary) {
        match self.format {
            OutputFormat::Human => {
                println!(
                    "Exported {} document(s) to {}",
                    summary.exported,
                    summary.destination.display()
                );
                if !summary.missing.is_empty() {
                    println!("Missing files for {} record(s):", summary.missing.len());
                    for id in &summary.missing {
                        println!("  {}", id);
                    }
                }
            }
            OutputFormat::Json => self.print_json(summary),
            OutputFormat::Quiet => {
                println!("{}", summary.destination.display());
            }
        }
    }

    pub fn print_reconcile_report(&self, report: &ReconcileReport) {
        match self.format {
            OutputFormat::Human => {
                if report.is_clean() {
                    println!("Library is consistent.");
                    return;
                }
                print_section("Records without files", &report.orphan_records);
                print_section("Files without records", &report.untracked_files);
                print_section("Categories without folders", &report.missing_category_dirs);
                print_section("Folders without categories", &report.unregistered_dirs);
            }
            OutputFormat::Json => self.print_json(report),
            OutputFormat::Quiet => {
                for id in &report.orphan_records {
                    println!("{}", id);
                }
            }
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": "success", "message": message})
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print an informational message
    pub fn message(&self, msg: &str) {
        match self.format {
            OutputFormat::Human => println!("{}", msg),
            OutputFormat::Json => {
                println!("{}", serde_json::json!({"message": msg}));
            }
            OutputFormat::Quiet => {}
        }
    }
}

fn print_section<T: std::fmt::Display>(heading: &str, items: &[T]) {
    if items.is_empty() {
        return;
    }
    println!("{} ({}):", heading, items.len());
    for item in items {
        println!("  {}", item);
    }
}

fn plural_y(n: usize) -> &'static str {
    if n == 1 {
        "y"
    } else {
        "ies"
    }
}

/// Truncate a string to max characters, adding "..." if truncated
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Format a byte count with a binary unit
fn human_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", size, UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_flags() {
        assert_eq!(OutputFormat::from_flags(false, false), OutputFormat::Human);
        assert_eq!(OutputFormat::from_flags(true, false), OutputFormat::Json);
        assert_eq!(OutputFormat::from_flags(false, true), OutputFormat::Quiet);
        // Quiet takes precedence
        assert_eq!(OutputFormat::from_flags(true, true), OutputFormat::Quiet);
    }

    #[test]
    fn test_format_predicates() {
        let json = Output::new(OutputFormat::Json);
        assert!(json.is_json());
        assert!(!json.is_quiet());

        let quiet = Output::new(OutputFormat::Quiet);
        assert!(quiet.is_quiet());
        assert!(!quiet.is_json());
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("this is a long string", 10), "this is...");
        assert_eq!(truncate("ääääääääääää", 5), "ää...");
    }

    #[test]
    fn test_human_size() {
        assert_eq!(human_size(0), "0 B");
        assert_eq!(human_size(1023), "1023 B");
        assert_eq!(human_size(1536), "1.5 KB");
        assert_eq!(human_size(5 * 1024 * 1024), "5.0 MB");
    }

    #[test]
    fn test_plural_y() {
        assert_eq!(plural_y(1), "y");
        assert_eq!(plural_y(3), "ies");
    }
}
