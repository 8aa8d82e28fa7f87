//! File I/O for surface tables, run descriptions and solver results.

pub mod config;
pub mod solution;
pub mod surface_table;

pub use config::{read_run_config, write_run_config};
pub use solution::{read_solution, write_solution};
pub use surface_table::{read_collection_efficiency, read_surface_table};
