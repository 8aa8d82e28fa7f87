pub mod io;
pub mod run;
pub mod sim;
pub mod vecutils;

// Prelude
pub use io::config::RunConfig;
pub use run::{SideOutput, run};
pub use sim::thermo::{
    ConstraintEnforcer, EnforcerStatus, FluidScalars, SurfaceMesh, SurfaceSide, SurfaceState,
    ThermoConfig, ThermoSolution, solve_surface,
};
