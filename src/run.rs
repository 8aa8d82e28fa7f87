//! End-to-end run: read tables, solve each requested side, write results.

use crate::io::config::RunConfig;
use crate::io::solution::write_solution;
use crate::io::surface_table::{read_collection_efficiency, read_surface_table};
use crate::sim::thermo::{FixedStagnation, SurfaceFieldImporter, ThermoSolution, solve_surface};
use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;
use tracing::{info, warn};

/// Result of one surface side.
#[derive(Debug, Clone)]
pub struct SideOutput {
    pub solution: ThermoSolution,
    pub path: PathBuf,
}

/// Executes a run description.
pub fn run(config: &RunConfig) -> Result<Vec<SideOutput>> {
    config.validate()?;
    let table = read_surface_table(&config.surface_table)?;
    let beta = read_collection_efficiency(&config.collection_efficiency)?;
    let stagnation = FixedStagnation(config.stagnation_arc_length);
    fs::create_dir_all(&config.output_dir).with_context(|| {
        format!(
            "Failed to create output directory: {}",
            config.output_dir.display()
        )
    })?;

    let mut outputs = Vec::with_capacity(config.sides.len());
    for &side in &config.sides {
        let thermo = config.thermo.for_side(side);
        let importer = SurfaceFieldImporter::new(&thermo, &config.fluid, &config.air);
        let surface = importer
            .import(&table, &beta, &stagnation)
            .with_context(|| format!("Failed to import {} surface", side.tag()))?;
        let solution = solve_surface(&surface, &config.fluid, &config.water, &config.air, &thermo)?;
        if !solution.is_converged() {
            warn!("{} surface result is not fully converged", side.tag());
        }
        let path = write_solution(
            &config.output_dir,
            &solution,
            thermo.write_recovery_temperature,
        )?;
        info!("Wrote {}", path.display());
        outputs.push(SideOutput { solution, path });
    }
    Ok(outputs)
}
