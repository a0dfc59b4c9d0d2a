//! Category command handlers

use anyhow::{Context, Result};

use direktiv_core::{CategoryDeletion, Library};

use crate::output::Output;

/// List categories with document counts
pub fn list(library: &Library, output: &Output) -> Result<()> {
    let stats = library.stats()?;
    let categories: Vec<_> = library
        .list_categories()?
        .into_iter()
        .map(|category| {
            let count = stats.per_category.get(&category.name).copied().unwrap_or(0);
            (category, count)
        })
        .collect();

    output.print_categories(&categories);
    Ok(())
}

/// Create a category
pub fn create(library: &mut Library, name: String, output: &Output) -> Result<()> {
    let category = library
        .ensure_category(&name)
        .with_context(|| format!("Failed to create category '{}'", name))?;

    output.success(&format!("Category '{}' ready", category.name));
    Ok(())
}

/// Delete a category, optionally with its documents
pub fn delete(library: &mut Library, name: String, cascade: bool, output: &Output) -> Result<()> {
    let mode = if cascade {
        CategoryDeletion::Cascade
    } else {
        CategoryDeletion::RequireEmpty
    };

    let removed = library
        .delete_category(&name, mode)
        .with_context(|| format!("Failed to delete category '{}'", name))?;

    if removed > 0 {
        output.success(&format!(
            "Deleted category '{}' and {} document(s)",
            name, removed
        ));
    } else {
        output.success(&format!("Deleted category '{}'", name));
    }
    Ok(())
}
