//! Readers for the raw surface distribution tables.
//!
//! Two formats are supported:
//! - whitespace-separated heat-transfer/skin-friction tables with either six
//!   columns (`s h_c c_f T_e p U_e`) or the legacy three columns (`s h_c c_f`),
//! - comma-separated collection-efficiency tables (`s,beta`).
//!
//! The number of rows is the number of newline characters in the file, so an
//! unterminated last line is not read.

use crate::sim::thermo::import::{CollectionEfficiencyTable, EdgeColumns, SurfaceTable};
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing::warn;

/// Lines that count as table rows, numbered from 1.
fn table_rows(text: &str) -> impl Iterator<Item = (usize, &str)> {
    let rows = text.bytes().filter(|&b| b == b'\n').count();
    text.lines()
        .take(rows)
        .enumerate()
        .map(|(i, line)| (i + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty())
}

fn warn_unterminated(text: &str, source: &str) {
    let tail = text.rsplit('\n').next().unwrap_or("");
    if !tail.trim().is_empty() {
        warn!("{source}: last line has no newline and is ignored");
    }
}

fn parse_value(field: &str, line: usize, source: &str) -> Result<f64> {
    field
        .parse::<f64>()
        .with_context(|| format!("{source}:{line}: cannot parse '{field}' as a number"))
}

/// Parses a heat-transfer/skin-friction table.
///
/// `source` names the input in error messages.
pub fn parse_surface_table(text: &str, source: &str) -> Result<SurfaceTable> {
    warn_unterminated(text, source);
    let mut columns: Option<usize> = None;
    let mut values: Vec<Vec<f64>> = Vec::new();

    for (line, row) in table_rows(text) {
        let fields: Vec<&str> = row.split_whitespace().collect();
        let width = *columns.get_or_insert(fields.len());
        anyhow::ensure!(
            width == 3 || width == 6,
            "{source}:{line}: expected 3 or 6 columns, found {width}"
        );
        anyhow::ensure!(
            fields.len() == width,
            "{source}:{line}: expected {width} columns, found {}",
            fields.len()
        );
        if values.is_empty() {
            values = vec![Vec::new(); width];
        }
        for (col, field) in values.iter_mut().zip(&fields) {
            col.push(parse_value(field, line, source)?);
        }
    }
    anyhow::ensure!(!values.is_empty(), "{source}: table has no rows");

    let mut cols = values.into_iter();
    let mut next = || cols.next().unwrap_or_default();
    let arc_length = next();
    let heat_transfer = next();
    let skin_friction = next();
    let edge = (columns == Some(6)).then(|| EdgeColumns {
        temperature: next(),
        pressure: next(),
        velocity: next(),
    });
    let table = SurfaceTable {
        arc_length,
        heat_transfer,
        skin_friction,
        edge,
    };
    table.validate().with_context(|| format!("Invalid surface table: {source}"))?;
    Ok(table)
}

/// Reads a heat-transfer/skin-friction table from file.
pub fn read_surface_table(path: &Path) -> Result<SurfaceTable> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))?;
    parse_surface_table(&text, &path.display().to_string())
}

/// Parses a comma-separated collection-efficiency table.
pub fn parse_collection_efficiency(text: &str, source: &str) -> Result<CollectionEfficiencyTable> {
    warn_unterminated(text, source);
    let mut arc_length = Vec::new();
    let mut beta = Vec::new();
    for (line, row) in table_rows(text) {
        let fields: Vec<&str> = row.split(',').map(str::trim).collect();
        anyhow::ensure!(
            fields.len() == 2,
            "{source}:{line}: expected 2 comma-separated columns, found {}",
            fields.len()
        );
        arc_length.push(parse_value(fields[0], line, source)?);
        beta.push(parse_value(fields[1], line, source)?);
    }
    let table = CollectionEfficiencyTable { arc_length, beta };
    table
        .validate()
        .with_context(|| format!("Invalid collection efficiency table: {source}"))?;
    Ok(table)
}

/// Reads a collection-efficiency table from file.
pub fn read_collection_efficiency(path: &Path) -> Result<CollectionEfficiencyTable> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))?;
    parse_collection_efficiency(&text, &path.display().to_string())
}
