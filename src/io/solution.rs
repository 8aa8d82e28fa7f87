//! Solver result files.
//!
//! One tab-separated file per surface side, named `THERMO_SOLN_<SIDE>.out`,
//! with six decimal places and one row per mesh node:
//!
//! ```text
//! s  h  T  m_ice  m_evap  tau  h_c  [T_rec]
//! ```

use crate::sim::thermo::{SurfaceSide, ThermoSolution};
use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Columns of a result file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SolutionTable {
    pub arc_length: Vec<f64>,
    pub film_height: Vec<f64>,
    pub temperature: Vec<f64>,
    pub ice_rate: Vec<f64>,
    pub evaporation: Vec<f64>,
    pub shear: Vec<f64>,
    pub heat_transfer: Vec<f64>,
    pub recovery_temperature: Option<Vec<f64>>,
}

impl SolutionTable {
    pub fn len(&self) -> usize {
        self.arc_length.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arc_length.is_empty()
    }
}

/// File name of the result for `side`.
pub fn solution_file_name(side: SurfaceSide) -> String {
    format!("THERMO_SOLN_{}.out", side.tag())
}

/// Writes `solution` to `writer`.
pub fn write_solution_to<W: Write>(
    writer: &mut W,
    solution: &ThermoSolution,
    with_recovery_temperature: bool,
) -> Result<()> {
    let s = solution.mesh.coordinates();
    let st = &solution.state;
    let c = &solution.coefficients;
    for i in 0..solution.len() {
        write!(
            writer,
            "{:.6}\t{:.6}\t{:.6}\t{:.6}\t{:.6}\t{:.6}\t{:.6}",
            s[i],
            st.film_height[i],
            st.temperature[i],
            st.ice_rate[i],
            st.evaporation[i],
            c.shear[i],
            c.heat_transfer[i]
        )?;
        if with_recovery_temperature {
            write!(writer, "\t{:.6}", c.recovery_temperature[i])?;
        }
        writeln!(writer)?;
    }
    Ok(())
}

/// Writes the result file for `solution` into `dir` and returns its path.
pub fn write_solution(
    dir: &Path,
    solution: &ThermoSolution,
    with_recovery_temperature: bool,
) -> Result<PathBuf> {
    let path = dir.join(solution_file_name(solution.side));
    let file = File::create(&path)
        .with_context(|| format!("Failed to create file: {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    write_solution_to(&mut writer, solution, with_recovery_temperature)
        .with_context(|| format!("Failed to write solution to: {}", path.display()))?;
    writer
        .flush()
        .with_context(|| format!("Failed to write solution to: {}", path.display()))?;
    Ok(path)
}

/// Parses result file contents.
pub fn parse_solution(text: &str, source: &str) -> Result<SolutionTable> {
    let mut table = SolutionTable::default();
    let mut recovery = Vec::new();
    let mut width = None;
    for (i, row) in text.lines().enumerate() {
        let line = i + 1;
        if row.trim().is_empty() {
            continue;
        }
        let values = row
            .split('\t')
            .map(|f| {
                f.trim().parse::<f64>().with_context(|| {
                    format!("{source}:{line}: cannot parse '{f}' as a number")
                })
            })
            .collect::<Result<Vec<f64>>>()?;
        let w = *width.get_or_insert(values.len());
        anyhow::ensure!(
            (w == 7 || w == 8) && values.len() == w,
            "{source}:{line}: expected 7 or 8 columns, found {}",
            values.len()
        );
        table.arc_length.push(values[0]);
        table.film_height.push(values[1]);
        table.temperature.push(values[2]);
        table.ice_rate.push(values[3]);
        table.evaporation.push(values[4]);
        table.shear.push(values[5]);
        table.heat_transfer.push(values[6]);
        if w == 8 {
            recovery.push(values[7]);
        }
    }
    if width == Some(8) {
        table.recovery_temperature = Some(recovery);
    }
    Ok(table)
}

/// Reads a result file.
pub fn read_solution(path: &Path) -> Result<SolutionTable> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))?;
    parse_solution(&text, &path.display().to_string())
}
