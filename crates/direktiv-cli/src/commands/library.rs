//! Library-wide command handlers

use std::path::PathBuf;

use anyhow::{Context, Result};

use direktiv_core::{DocumentFilter, Library};

use crate::output::Output;

/// Show document and category counts
pub fn stats(library: &Library, output: &Output) -> Result<()> {
    let stats = library.stats()?;
    output.print_stats(&stats);
    Ok(())
}

/// Copy documents out of the library
pub fn export(
    library: &Library,
    destination: PathBuf,
    filter: DocumentFilter,
    output: &Output,
) -> Result<()> {
    let summary = library
        .export(&destination, &filter)
        .with_context(|| format!("Failed to export to {}", destination.display()))?;

    output.print_export_summary(&summary);
    Ok(())
}

/// Report inconsistencies, and optionally drop orphan records
pub fn reconcile(library: &mut Library, prune: bool, output: &Output) -> Result<()> {
    let report = library.reconcile().context("Failed to reconcile library")?;
    output.print_reconcile_report(&report);

    if prune && !report.orphan_records.is_empty() {
        let pruned = library
            .prune_orphans(&report)
            .context("Failed to prune orphan records")?;
        output.success(&format!("Pruned {} orphan record(s)", pruned));
    }
    Ok(())
}
