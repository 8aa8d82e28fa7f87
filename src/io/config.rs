//! JSON run description.

use crate::sim::thermo::{AirProperties, FluidScalars, SurfaceSide, ThermoConfig, WaterProperties};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

/// Everything needed for one solver run.
///
/// Relative input and output paths are resolved against the directory of the
/// JSON file by [`read_run_config`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default)]
    pub thermo: ThermoConfig,
    pub fluid: FluidScalars,
    #[serde(default)]
    pub water: WaterProperties,
    #[serde(default)]
    pub air: AirProperties,
    /// Heat-transfer/skin-friction table (three or six columns).
    pub surface_table: PathBuf,
    /// Comma-separated collection-efficiency table.
    pub collection_efficiency: PathBuf,
    /// Stagnation point in surface-table coordinates.
    pub stagnation_arc_length: f64,
    #[serde(default = "default_sides")]
    pub sides: Vec<SurfaceSide>,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

fn default_sides() -> Vec<SurfaceSide> {
    vec![SurfaceSide::Upper, SurfaceSide::Lower]
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

impl RunConfig {
    /// Makes relative paths relative to `base`.
    pub fn resolve_paths(&mut self, base: &Path) {
        for path in [
            &mut self.surface_table,
            &mut self.collection_efficiency,
            &mut self.output_dir,
        ] {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.thermo.validate()?;
        self.fluid.validate()?;
        anyhow::ensure!(!self.sides.is_empty(), "No surface side selected");
        Ok(())
    }
}

/// Reads a run description and resolves its paths.
pub fn read_run_config(path: &Path) -> Result<RunConfig> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open file: {}", path.display()))?;
    let reader = BufReader::new(file);
    let mut config: RunConfig = serde_json::from_reader(reader)
        .with_context(|| format!("Failed to deserialize run config from: {}", path.display()))?;
    let base = path.parent().unwrap_or_else(|| Path::new(""));
    config.resolve_paths(base);
    config
        .validate()
        .with_context(|| format!("Invalid run config: {}", path.display()))?;
    Ok(config)
}

/// Writes a run description as pretty-printed JSON.
pub fn write_run_config(path: &Path, config: &RunConfig) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create file: {}", path.display()))?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, config)
        .with_context(|| format!("Failed to serialize run config to: {}", path.display()))?;
    Ok(())
}
