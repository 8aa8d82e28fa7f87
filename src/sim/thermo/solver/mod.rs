//! Nonlinear solution strategies for the surface balances.
//!
//! Explicit relaxation and Newton–Krylov drive any [`NonlinearSystem`] to a
//! zero residual. The marching point solve is different in kind: it couples
//! mass and energy node by node and writes the whole surface state.

pub mod explicit;
pub mod krylov;
pub mod marching;
pub mod newton_krylov;

use anyhow::Result;

use super::balance::{BalanceKind, FluxBalanceModel};
use super::config::{Strategy, ThermoConfig};
use super::state::{ConvergenceRecord, SurfaceState};

pub use explicit::ExplicitRelaxation;
pub use krylov::{Gmres, KrylovOutcome, KrylovSolver, LinearOperator};
pub use marching::MarchingSolver;
pub use newton_krylov::{FiniteDifferenceJacobian, NewtonKrylov};

/// A square nonlinear system `F(y) = 0`.
pub trait NonlinearSystem {
    fn dim(&self) -> usize;

    fn residual(&self, y: &[f64]) -> Vec<f64>;

    /// Approximate `dF_i/dy_i`, used for local pseudo-time stepping.
    fn diagonal(&self, _y: &[f64]) -> Option<Vec<f64>> {
        None
    }

    /// Maps `y` back onto the admissible set (bounds, pinned values).
    fn project(&self, _y: &mut [f64]) {}
}

/// Outcome of one nonlinear solve. Non-convergence is reported, not raised.
#[derive(Debug, Clone, Default)]
pub struct SolveReport {
    pub converged: bool,
    pub iterations: usize,
    pub initial_norm: f64,
    pub final_norm: f64,
    /// Convergence threshold the final norm was compared against.
    pub threshold: f64,
    pub history: ConvergenceRecord,
}

/// One balance of a [`FluxBalanceModel`] with every other field frozen.
pub struct BalanceSystem<'m, 'a> {
    model: &'m FluxBalanceModel<'a>,
    kind: BalanceKind,
    state: &'m SurfaceState,
}

impl<'m, 'a> BalanceSystem<'m, 'a> {
    pub fn new(
        model: &'m FluxBalanceModel<'a>,
        kind: BalanceKind,
        state: &'m SurfaceState,
    ) -> Self {
        Self { model, kind, state }
    }

    pub fn kind(&self) -> BalanceKind {
        self.kind
    }
}

impl NonlinearSystem for BalanceSystem<'_, '_> {
    fn dim(&self) -> usize {
        self.model.len()
    }

    fn residual(&self, y: &[f64]) -> Vec<f64> {
        self.model.residual(self.kind, y, self.state)
    }

    fn diagonal(&self, y: &[f64]) -> Option<Vec<f64>> {
        Some(self.model.diagonal(self.kind, y, self.state))
    }

    fn project(&self, y: &mut [f64]) {
        self.model.project(self.kind, y, &self.state.ice_rate)
    }
}

/// Solves `system` in place with a residual-driven strategy.
pub fn solve_system<S: NonlinearSystem + ?Sized>(
    strategy: Strategy,
    config: &ThermoConfig,
    system: &S,
    y: &mut [f64],
) -> Result<SolveReport> {
    match strategy {
        Strategy::Explicit => Ok(ExplicitRelaxation::new(config.explicit).solve(system, y)),
        Strategy::NewtonKrylov => {
            let nk = &config.newton_krylov;
            let gmres = Gmres::new(nk.restart, nk.max_krylov_iterations, nk.krylov_tolerance);
            Ok(NewtonKrylov::new(*nk, gmres).solve(system, y))
        }
        Strategy::Marching => {
            anyhow::bail!("Marching couples both balances and cannot solve a single residual")
        }
    }
}


#[cfg(test)]
mod tests {
    use super::test_systems::Bidiagonal;
    use super::*;

    #[test]
    fn test_marching_is_not_a_residual_strategy() {
        let system = Bidiagonal::new(4);
        let mut y = vec![0.0; 4];
        let result = solve_system(Strategy::Marching, &ThermoConfig::new(), &system, &mut y);
        assert!(result.is_err());
    }

    #[test]
    fn test_dispatch_strategies_agree() {
        let system = Bidiagonal::new(12);
        let mut config = ThermoConfig::new();
        config.explicit.rel_tolerance = 1e-12;
        let mut a = vec![0.0; 12];
        let mut b = vec![0.0; 12];
        let ra = solve_system(Strategy::Explicit, &config, &system, &mut a).unwrap();
        let rb = solve_system(Strategy::NewtonKrylov, &config, &system, &mut b).unwrap();
        assert!(ra.converged && rb.converged);
        for (x, y) in a.iter().zip(&b) {
            assert!((x - y).abs() < 1e-7, "{x} vs {y}");
        }
    }
}
