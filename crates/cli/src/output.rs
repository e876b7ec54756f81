// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Text/JSON dual output, shared across every `ductile` subcommand.

use clap::ValueEnum;
use serde::Serialize;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Render `rows` as a JSON array, or as `format_row` text lines with a
/// trailing count — the pattern every list subcommand follows.
pub fn print_rows<T: Serialize>(
    rows: &[T],
    format: OutputFormat,
    noun: &str,
    format_row: impl Fn(&T) -> String,
) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(rows)?);
        }
        OutputFormat::Text => {
            if rows.is_empty() {
                println!("no {noun}");
                return Ok(());
            }
            for row in rows {
                println!("{}", format_row(row));
            }
            println!("\n{} {}", rows.len(), noun);
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "output_tests.rs"]
mod tests;
