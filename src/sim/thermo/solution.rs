use anyhow::Result;
use tracing::info;

use super::balance::FluxBalanceModel;
use super::config::{SurfaceSide, ThermoConfig};
use super::constraints::{ConstraintEnforcer, EnforcerStatus};
use super::import::ImportedSurface;
use super::mesh::{SurfaceCoefficients, SurfaceMesh};
use super::properties::{AirProperties, FluidScalars, WaterProperties};
use super::state::{ConvergenceRecord, SurfaceState};

/// Solved surface side in output coordinates.
///
/// The upper side is stored as solved. The lower side is mirrored back so its
/// arc-length is negative and increases towards the stagnation point.
#[derive(Debug, Clone)]
pub struct ThermoSolution {
    pub side: SurfaceSide,
    pub mesh: SurfaceMesh,
    pub coefficients: SurfaceCoefficients,
    pub state: SurfaceState,
    pub record: ConvergenceRecord,
    pub status: EnforcerStatus,
}

impl ThermoSolution {
    pub fn len(&self) -> usize {
        self.mesh.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mesh.is_empty()
    }

    pub fn is_converged(&self) -> bool {
        self.status.is_converged()
    }

    /// Same solution with mesh, coefficients and state mirrored.
    pub fn mirrored(&self) -> Self {
        Self {
            side: self.side,
            mesh: self.mesh.mirrored(),
            coefficients: self.coefficients.mirrored(),
            state: self.state.mirrored(),
            record: self.record.clone(),
            status: self.status.clone(),
        }
    }
}

/// Runs the constraint loop on an imported surface and returns the result in
/// output coordinates.
pub fn solve_surface(
    surface: &ImportedSurface,
    fluid: &FluidScalars,
    water: &WaterProperties,
    air: &AirProperties,
    config: &ThermoConfig,
) -> Result<ThermoSolution> {
    config.validate()?;
    let model = FluxBalanceModel::new(
        &surface.mesh,
        &surface.coefficients,
        fluid,
        water,
        air,
        config,
    )?;
    info!(
        "Solving {} surface: {} nodes, mass {:?}, energy {:?}",
        surface.side.tag(),
        model.len(),
        config.mass_strategy,
        config.energy_strategy
    );
    let outcome = ConstraintEnforcer::new(&model, config).run()?;

    let solution = ThermoSolution {
        side: surface.side,
        mesh: surface.mesh.clone(),
        coefficients: surface.coefficients.clone(),
        state: outcome.state,
        record: outcome.record,
        status: outcome.status,
    };
    Ok(match surface.side {
        SurfaceSide::Upper => solution,
        SurfaceSide::Lower => solution.mirrored(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::thermo::import::ImportRange;

    fn surface(side: SurfaceSide, n: usize) -> ImportedSurface {
        let fluid = FluidScalars::default();
        let air = AirProperties::default();
        let mesh = SurfaceMesh::uniform(0.0, 0.4, n, fluid.chord).unwrap();
        let mut coefficients = SurfaceCoefficients::uniform(
            n,
            1e-3,
            10.0,
            500.0,
            fluid.temperature_c(),
            fluid.velocity,
            fluid.pressure,
            fluid.recovery_temperature_c(&air),
        );
        coefficients.collection_efficiency = (0..n).map(|i| 1e-3 * (1.0 + i as f64)).collect();
        ImportedSurface {
            side,
            mesh,
            coefficients,
            range: ImportRange { first: 0, last: n - 1 },
            stagnation: 0.0,
        }
    }

    #[test]
    fn test_lower_side_is_mirrored_back() {
        let mut config = ThermoConfig::new();
        config.evaporation = false;
        let fluid = FluidScalars::default();
        let water = WaterProperties::default();
        let air = AirProperties::default();

        let upper = solve_surface(&surface(SurfaceSide::Upper, 30), &fluid, &water, &air, &config)
            .unwrap();
        let lower = solve_surface(&surface(SurfaceSide::Lower, 30), &fluid, &water, &air, &config)
            .unwrap();

        assert!(lower.mesh.coordinates().iter().all(|&s| s <= 0.0));
        assert_eq!(lower.mesh.mirrored(), upper.mesh);
        assert_eq!(lower.state.mirrored(), upper.state);
        assert_eq!(lower.coefficients.collection_efficiency[29], 1e-3);
        assert_eq!(lower.status, upper.status);
    }
}
