//! Surface thermodynamics of ice accretion.
//!
//! A thin water film driven by wall shear runs back from the stagnation
//! point. Mass and energy balances over the film give film height, surface
//! temperature and ice accretion rate on one side of the body.
//!
//! Typical flow:
//! 1. [`SurfaceFieldImporter`] resamples raw tables onto a [`SurfaceMesh`].
//! 2. [`FluxBalanceModel`] defines the residuals for that mesh.
//! 3. [`ConstraintEnforcer`] alternates the balance solves with
//!    phase-compatibility corrections.
//!
//! [`solve_surface`] runs steps 2 and 3.

pub mod balance;
pub mod boundary_layer;
pub mod config;
pub mod constraints;
pub mod evaporation;
pub mod import;
pub mod mesh;
pub mod properties;
pub mod solution;
pub mod solver;
pub mod state;

pub use balance::{BalanceKind, FluxBalanceModel};
pub use boundary_layer::{BoundaryLayerProfile, IntegralBoundaryLayerEstimator};
pub use config::{
    AlignmentMode, ConstraintSettings, ExplicitSettings, HeatTransferSource, MarchingSettings,
    NewtonKrylovSettings, Strategy, SurfaceSide, ThermoConfig,
};
pub use constraints::{Constraint, ConstraintEnforcer, EnforcerOutcome, EnforcerStatus, Stage};
pub use evaporation::EvaporationModel;
pub use import::{
    CollectionEfficiencyTable, EdgeColumns, FixedStagnation, ImportRange, ImportedSurface,
    StagnationPoint, StaticPressureField, SurfaceFieldImporter, SurfaceTable,
};
pub use mesh::{SurfaceCoefficients, SurfaceMesh};
pub use properties::{AirProperties, FluidScalars, WaterProperties};
pub use solution::{ThermoSolution, solve_surface};
pub use state::{ConvergenceRecord, SurfaceState};
