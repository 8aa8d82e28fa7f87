use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Which side of the body the surface mesh wraps, relative to the stagnation point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SurfaceSide {
    Upper,
    Lower,
}

impl SurfaceSide {
    /// Tag used in output file names.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Upper => "UPPER",
            Self::Lower => "LOWER",
        }
    }

    /// Arc-length span `[s_min, s_max]` relative to the stagnation point.
    pub fn span(&self, extent: f64) -> (f64, f64) {
        match self {
            Self::Upper => (0.0, extent),
            Self::Lower => (-extent, 0.0),
        }
    }
}

/// How the raw distributions are aligned to the stagnation point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlignmentMode {
    /// Use the geometry collaborator's stagnation arc-length as-is.
    Direct,
    /// Refine the stagnation point to the nearby sample of minimum wall shear.
    Recomputed,
}

/// Nonlinear solution strategy for a balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Pseudo-time relaxation with physical clipping.
    Explicit,
    /// Jacobian-free Newton–Krylov.
    NewtonKrylov,
    /// Node-by-node coupled point solve marching away from the stagnation point.
    Marching,
}

/// Source of the convective heat-transfer coefficient.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeatTransferSource {
    /// Use the coefficient column of the imported table.
    Imported,
    /// Estimate from the edge-velocity distribution with an integral boundary layer.
    IntegralBoundaryLayer {
        /// Equivalent sand-grain roughness height [m].
        roughness_height: f64,
    },
}

/// Settings for the explicit relaxation strategy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplicitSettings {
    /// Pseudo-time step.
    ///
    /// With `local_time_stepping` the update is scaled per node by the inverse
    /// residual diagonal, so the step is a dimensionless relaxation factor.
    pub step: f64,
    /// Relative convergence tolerance on max |residual|.
    pub rel_tolerance: f64,
    /// Absolute floor on max |residual|.
    pub abs_tolerance: f64,
    /// Iteration budget for the first attempt.
    pub max_iterations: usize,
    /// Total iteration budget including the escalated retry.
    pub max_iterations_retry: usize,
    /// Step multiplier applied once when the first budget is exhausted.
    pub step_escalation: f64,
    /// Scale each node's update by the inverse residual diagonal.
    pub local_time_stepping: bool,
}

impl Default for ExplicitSettings {
    fn default() -> Self {
        Self {
            step: 0.1,
            rel_tolerance: 1e-4,
            abs_tolerance: 1e-10,
            max_iterations: 50_000,
            max_iterations_retry: 75_000,
            step_escalation: 10.0,
            local_time_stepping: true,
        }
    }
}

/// Settings for the Jacobian-free Newton–Krylov strategy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewtonKrylovSettings {
    /// Outer Newton iteration budget.
    pub max_newton_iterations: usize,
    /// Absolute tolerance on the global nonlinear residual norm.
    pub global_tolerance: f64,
    /// Finite-difference perturbation for Jacobian-vector products.
    pub perturbation: f64,
    /// GMRES restart length.
    pub restart: usize,
    /// GMRES total iteration cap.
    pub max_krylov_iterations: usize,
    /// GMRES relative residual tolerance.
    pub krylov_tolerance: f64,
}

impl Default for NewtonKrylovSettings {
    fn default() -> Self {
        Self {
            max_newton_iterations: 20,
            global_tolerance: 1e-8,
            perturbation: 1e-7,
            restart: 50,
            max_krylov_iterations: 2000,
            krylov_tolerance: 1e-3,
        }
    }
}

/// Settings for the marching point solve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarchingSettings {
    /// Local Newton iteration budget per node.
    pub max_iterations: usize,
    /// Convergence tolerance on the temperature update [K].
    pub tolerance: f64,
    /// Width of the freezing transition band [K].
    pub phase_band: f64,
    /// Largest temperature change per local Newton step [K].
    pub max_step: f64,
}

impl Default for MarchingSettings {
    fn default() -> Self {
        Self {
            max_iterations: 25,
            tolerance: 1e-8,
            phase_band: 0.1,
            max_step: 5.0,
        }
    }
}

/// Settings for the phase-compatibility constraint loop.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConstraintSettings {
    /// Outer iteration budget.
    pub max_iterations: usize,
    /// Film heights below this are treated as dry [m].
    pub film_floor: f64,
    /// Threshold on `h·T` below which liquid is flagged as too cold [m·K].
    pub water_tolerance: f64,
    /// Threshold on `T·m_ice` above which ice is flagged as too warm [K·kg/(m²·s)].
    pub ice_tolerance: f64,
    /// Tolerance on cumulative water supply for mass conservation [kg/(m·s)].
    pub mass_tolerance: f64,
}

impl Default for ConstraintSettings {
    fn default() -> Self {
        Self {
            max_iterations: 5,
            film_floor: 1e-12,
            water_tolerance: 1e-8,
            ice_tolerance: 1e-8,
            mass_tolerance: 1e-14,
        }
    }
}

/// Configuration of the surface thermodynamics solver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThermoConfig {
    /// Which side of the body to solve.
    pub side: SurfaceSide,
    /// Stagnation-point alignment mode.
    pub alignment: AlignmentMode,
    /// Number of mesh nodes.
    pub num_points: usize,
    /// Chord-normalised arc-length extent measured from the stagnation point.
    pub span: f64,
    /// Strategy for the mass balance.
    pub mass_strategy: Strategy,
    /// Strategy for the energy balance.
    pub energy_strategy: Strategy,
    pub explicit: ExplicitSettings,
    pub newton_krylov: NewtonKrylovSettings,
    pub marching: MarchingSettings,
    pub constraints: ConstraintSettings,
    /// Include evaporation/sublimation in the balances.
    pub evaporation: bool,
    /// Where the heat-transfer coefficient comes from.
    pub heat_transfer: HeatTransferSource,
    /// Upper clip for film height during relaxation [m].
    pub film_height_cap: f64,
    /// Upper clip for surface temperature during relaxation [°C].
    pub temperature_cap: f64,
    /// Append the recovery temperature column to the output file.
    pub write_recovery_temperature: bool,
}

impl ThermoConfig {
    pub fn new() -> Self {
        Self {
            side: SurfaceSide::Upper,
            alignment: AlignmentMode::Direct,
            num_points: 1000,
            span: 0.4,
            mass_strategy: Strategy::Explicit,
            energy_strategy: Strategy::Explicit,
            explicit: ExplicitSettings::default(),
            newton_krylov: NewtonKrylovSettings::default(),
            marching: MarchingSettings::default(),
            constraints: ConstraintSettings::default(),
            evaporation: true,
            heat_transfer: HeatTransferSource::Imported,
            film_height_cap: 1e-2,
            temperature_cap: 50.0,
            write_recovery_temperature: true,
        }
    }

    /// Same configuration for the opposite surface side.
    pub fn for_side(&self, side: SurfaceSide) -> Self {
        Self {
            side,
            ..self.clone()
        }
    }

    /// True if either balance asks for the coupled marching solve.
    pub fn uses_marching(&self) -> bool {
        self.mass_strategy == Strategy::Marching || self.energy_strategy == Strategy::Marching
    }

    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            self.num_points >= 3,
            "At least 3 mesh points are required, got {}",
            self.num_points
        );
        anyhow::ensure!(self.span > 0.0, "Span must be > 0, got {}", self.span);
        anyhow::ensure!(self.explicit.step > 0.0, "Explicit step must be > 0");
        anyhow::ensure!(
            self.explicit.max_iterations_retry >= self.explicit.max_iterations,
            "Retry budget must not be smaller than the primary budget"
        );
        anyhow::ensure!(self.newton_krylov.restart > 0, "GMRES restart must be > 0");
        anyhow::ensure!(
            self.newton_krylov.perturbation > 0.0,
            "Finite-difference perturbation must be > 0"
        );
        anyhow::ensure!(self.marching.phase_band > 0.0, "Phase band must be > 0");
        anyhow::ensure!(self.film_height_cap > 0.0, "Film height cap must be > 0");
        if let HeatTransferSource::IntegralBoundaryLayer { roughness_height } = self.heat_transfer
        {
            anyhow::ensure!(
                roughness_height > 0.0,
                "Roughness height must be > 0, got {roughness_height}"
            );
        }
        Ok(())
    }
}

impl Default for ThermoConfig {
    fn default() -> Self {
        Self::new()
    }
}
