//! Config command handlers

use std::path::Path;

use anyhow::{bail, Context, Result};

use direktiv_core::category::validate_category_name;
use direktiv_core::Config;

use crate::output::{Output, OutputFormat};

const VALID_KEYS: &str =
    "default_category, theme, auto_mark_read_after_seconds, show_hidden_files, editor, log_file";

/// Show current configuration
pub fn show(root: &Path, output: &Output) -> Result<()> {
    let config = Config::load(root).context("Failed to load configuration")?;

    match output.format {
        OutputFormat::Json => output.print_json(&config),
        OutputFormat::Quiet => {
            println!("{}", root.display());
        }
        OutputFormat::Human => {
            println!("Configuration:");
            println!("  default_category:             {}", config.default_category);
            println!("  theme:                        {}", config.theme);
            println!(
                "  auto_mark_read_after_seconds: {}",
                config.auto_mark_read_after_seconds
            );
            println!("  show_hidden_files:            {}", config.show_hidden_files);
            println!(
                "  editor:                       {}",
                config.editor.as_deref().unwrap_or("(not set)")
            );
            println!(
                "  log_file:                     {}",
                config
                    .log_file
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "(not set)".to_string())
            );
            println!();
            println!("Library:     {}", root.display());
            println!("Config file: {}", Config::config_file_path(root).display());
        }
    }

    Ok(())
}

/// Set a configuration value
pub fn set(root: &Path, key: String, value: String, output: &Output) -> Result<()> {
    let mut config = Config::load(root).context("Failed to load configuration")?;

    apply_setting(&mut config, &key, &value)?;

    config
        .save_to_path(&Config::config_file_path(root))
        .context("Failed to save configuration")?;

    output.success(&format!("Set {} = {}", key, value));

    Ok(())
}

fn apply_setting(config: &mut Config, key: &str, value: &str) -> Result<()> {
    match key {
        "default_category" => {
            validate_category_name(value)?;
            config.default_category = value.to_string();
        }
        "theme" => {
            config.theme = value.to_string();
        }
        "auto_mark_read_after_seconds" => {
            config.auto_mark_read_after_seconds = value
                .parse()
                .context("Invalid value for auto_mark_read_after_seconds. Use a whole number.")?;
        }
        "show_hidden_files" => {
            config.show_hidden_files = value
                .parse()
                .context("Invalid value for show_hidden_files. Use 'true' or 'false'.")?;
        }
        "editor" => {
            config.editor = if value.is_empty() || value == "none" {
                None
            } else {
                Some(value.to_string())
            };
        }
        "log_file" => {
            config.log_file = if value.is_empty() || value == "none" {
                None
            } else {
                Some(value.into())
            };
        }
        _ => {
            bail!(
                "Unknown configuration key: '{}'\nValid keys: {}",
                key,
                VALID_KEYS
            );
        }
    }
    Ok(())
}
