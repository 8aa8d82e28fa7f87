//! Outer loop coupling the mass and energy solves to the phase-compatibility
//! constraints.

use std::fmt;

use anyhow::Result;
use tracing::{debug, info, warn};

use super::balance::{BalanceKind, FluxBalanceModel};
use super::config::ThermoConfig;
use super::solver::{self, BalanceSystem, MarchingSolver, SolveReport};
use super::state::{ConvergenceRecord, SurfaceState};
use crate::vecutils;

/// A named physical condition the converged state must satisfy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Constraint {
    /// The cumulative water supply never goes negative along the surface.
    FilmConserved,
    /// Liquid water is not below freezing.
    WaterNotCold,
    /// Ice is not above freezing.
    IceNotWarm,
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::FilmConserved => "FilmConserved",
            Self::WaterNotCold => "WaterNotCold",
            Self::IceNotWarm => "IceNotWarm",
        };
        f.write_str(name)
    }
}

/// Where the enforcer is within one outer iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    SolveMass,
    SolveEnergy,
    /// Coupled point solve replacing both balance solves.
    March,
    Evaluate,
    Correct,
    Done,
}

/// Terminal outcome of the constraint loop. Neither variant is an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnforcerStatus {
    Converged { iterations: usize },
    BudgetExhausted {
        iterations: usize,
        violated: Vec<Constraint>,
    },
}

impl EnforcerStatus {
    pub fn is_converged(&self) -> bool {
        matches!(self, Self::Converged { .. })
    }

    pub fn iterations(&self) -> usize {
        match self {
            Self::Converged { iterations } | Self::BudgetExhausted { iterations, .. } => {
                *iterations
            }
        }
    }
}

/// Constraint violations found in one evaluation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Violations {
    pub film_conserved: bool,
    /// Nodes holding liquid below freezing.
    pub cold_water: Vec<usize>,
    /// Nodes holding ice above freezing.
    pub warm_ice: Vec<usize>,
}

impl Violations {
    pub fn is_empty(&self) -> bool {
        !self.film_conserved && self.cold_water.is_empty() && self.warm_ice.is_empty()
    }

    pub fn constraints(&self) -> Vec<Constraint> {
        let mut out = Vec::new();
        if self.film_conserved {
            out.push(Constraint::FilmConserved);
        }
        if !self.cold_water.is_empty() {
            out.push(Constraint::WaterNotCold);
        }
        if !self.warm_ice.is_empty() {
            out.push(Constraint::IceNotWarm);
        }
        out
    }
}

/// Final state of a constraint loop run.
#[derive(Debug, Clone)]
pub struct EnforcerOutcome {
    pub state: SurfaceState,
    pub record: ConvergenceRecord,
    pub status: EnforcerStatus,
}

/// State machine driving the balances to a phase-compatible solution.
///
/// Each outer iteration runs `SolveMass -> SolveEnergy` (or `March`), then
/// `Evaluate`, and if anything is violated, `Correct`. The loop ends in `Done`
/// once every constraint holds or the iteration budget is spent.
pub struct ConstraintEnforcer<'m, 'a> {
    model: &'m FluxBalanceModel<'a>,
    config: &'m ThermoConfig,
    stage: Stage,
    iteration: usize,
    state: SurfaceState,
    record: ConvergenceRecord,
    violations: Violations,
    status: Option<EnforcerStatus>,
}

impl<'m, 'a> ConstraintEnforcer<'m, 'a> {
    /// Starts from the neutral zero state.
    pub fn new(model: &'m FluxBalanceModel<'a>, config: &'m ThermoConfig) -> Self {
        Self::with_state(model, config, SurfaceState::zeros(model.len()))
    }

    /// Starts from a given state, e.g. the result of a previous time step.
    pub fn with_state(
        model: &'m FluxBalanceModel<'a>,
        config: &'m ThermoConfig,
        state: SurfaceState,
    ) -> Self {
        Self {
            model,
            config,
            stage: Self::solve_stage(config),
            iteration: 0,
            state,
            record: ConvergenceRecord::new(),
            violations: Violations::default(),
            status: None,
        }
    }

    fn solve_stage(config: &ThermoConfig) -> Stage {
        if config.uses_marching() {
            Stage::March
        } else {
            Stage::SolveMass
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn state(&self) -> &SurfaceState {
        &self.state
    }

    /// Runs to completion.
    pub fn run(mut self) -> Result<EnforcerOutcome> {
        anyhow::ensure!(
            self.state.len() == self.model.len(),
            "Initial state has {} nodes, mesh has {}",
            self.state.len(),
            self.model.len()
        );
        while self.stage != Stage::Done {
            self.step()?;
        }
        let status = self.status.unwrap_or(EnforcerStatus::BudgetExhausted {
            iterations: self.iteration,
            violated: self.violations.constraints(),
        });
        match &status {
            EnforcerStatus::Converged { iterations } => {
                info!("Constraint loop converged in {iterations} iterations")
            }
            EnforcerStatus::BudgetExhausted {
                iterations,
                violated,
            } => {
                let names: Vec<String> = violated.iter().map(|c| c.to_string()).collect();
                warn!(
                    "Constraint loop stopped after {} iterations with violations: {}",
                    iterations,
                    names.join(", ")
                );
            }
        }
        Ok(EnforcerOutcome {
            state: self.state,
            record: self.record,
            status,
        })
    }

    /// Performs one stage transition.
    pub fn step(&mut self) -> Result<()> {
        self.stage = match self.stage {
            Stage::SolveMass => {
                self.solve_mass()?;
                Stage::SolveEnergy
            }
            Stage::SolveEnergy => {
                self.solve_energy()?;
                Stage::Evaluate
            }
            Stage::March => {
                let report = MarchingSolver::new(self.config.marching)
                    .solve(self.model, &mut self.state);
                log_report("marching", &report);
                Stage::Evaluate
            }
            Stage::Evaluate => {
                self.violations = self.evaluate();
                let norm = self.residual_norm();
                self.record.push(norm);
                if self.violations.is_empty() {
                    self.status = Some(EnforcerStatus::Converged {
                        iterations: self.iteration + 1,
                    });
                    Stage::Done
                } else {
                    debug!(
                        "Iteration {}: violated {:?} (cold water at {} nodes, warm ice at {} nodes)",
                        self.iteration + 1,
                        self.violations.constraints(),
                        self.violations.cold_water.len(),
                        self.violations.warm_ice.len()
                    );
                    Stage::Correct
                }
            }
            Stage::Correct => {
                self.correct();
                self.iteration += 1;
                if self.iteration >= self.config.constraints.max_iterations {
                    self.status = Some(EnforcerStatus::BudgetExhausted {
                        iterations: self.iteration,
                        violated: self.violations.constraints(),
                    });
                    Stage::Done
                } else {
                    Self::solve_stage(self.config)
                }
            }
            Stage::Done => Stage::Done,
        };
        Ok(())
    }

    fn solve_mass(&mut self) -> Result<()> {
        let mut h = self
            .model
            .integrate_mass(&self.state.ice_rate, &self.state.evaporation);
        let system = BalanceSystem::new(self.model, BalanceKind::Mass, &self.state);
        let report = solver::solve_system(self.config.mass_strategy, self.config, &system, &mut h)?;
        log_report(system.kind().name(), &report);
        self.state.film_height = h;
        Ok(())
    }

    fn solve_energy(&mut self) -> Result<()> {
        let mut t = self.state.temperature.clone();
        let system = BalanceSystem::new(self.model, BalanceKind::Energy, &self.state);
        let report =
            solver::solve_system(self.config.energy_strategy, self.config, &system, &mut t)?;
        log_report(system.kind().name(), &report);
        self.state.evaporation = self.model.evaporation(&t);
        self.state.temperature = t;
        Ok(())
    }

    /// Checks every constraint against the current state.
    pub fn evaluate(&self) -> Violations {
        let limits = &self.config.constraints;
        let s = &self.state;
        let supply = self.model.cumulative_supply(&s.ice_rate, &s.evaporation);
        let film_conserved = supply.iter().any(|&m| m < -limits.mass_tolerance);
        let cold_water = (0..s.len())
            .filter(|&i| s.film_height[i] * s.temperature[i] < -limits.water_tolerance)
            .collect();
        let warm_ice = (0..s.len())
            .filter(|&i| s.temperature[i] * s.ice_rate[i] > limits.ice_tolerance)
            .collect();
        Violations {
            film_conserved,
            cold_water,
            warm_ice,
        }
    }

    /// Largest interior mass or energy residual of the current state.
    fn residual_norm(&self) -> f64 {
        let n = self.model.len();
        let s = &self.state;
        let mass = self
            .model
            .mass_residual(&s.film_height, &s.ice_rate, &s.evaporation);
        let energy = self
            .model
            .energy_residual(&s.film_height, &s.temperature, &s.ice_rate);
        vecutils::max_abs(&mass[1..n - 1]).max(vecutils::max_abs(&energy[1..n - 1]))
    }

    /// Moves the state towards compatibility with the violated constraints.
    fn correct(&mut self) {
        let floor = self.config.constraints.film_floor;
        let v = &self.violations;
        let s = &mut self.state;

        if v.film_conserved {
            let impingement = self.model.impingement();
            for i in 0..s.len() {
                if s.film_height[i] < floor {
                    s.ice_rate[i] = (impingement[i] - s.evaporation[i]).max(0.0);
                }
            }
        }

        if !v.cold_water.is_empty() || !v.warm_ice.is_empty() {
            for &i in v.cold_water.iter().chain(&v.warm_ice) {
                s.temperature[i] = 0.0;
            }
            s.evaporation = self.model.evaporation(&s.temperature);
            s.ice_rate = self.model.ice_rate_from_energy(&s.film_height, &s.temperature);
        }

        self.model.limit_ice_rate(&mut s.ice_rate, &s.evaporation);
        // Marching fluxes no longer match the corrected fields.
        s.outflow = None;
    }
}

fn log_report(what: &str, report: &SolveReport) {
    if report.converged {
        debug!(
            "{what} solve converged in {} iterations (norm {:.3e})",
            report.iterations, report.final_norm
        );
    } else {
        warn!(
            "{what} solve did not converge in {} iterations (norm {:.3e}, threshold {:.3e}), keeping best state",
            report.iterations, report.final_norm, report.threshold
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::thermo::mesh::{SurfaceCoefficients, SurfaceMesh};
    use crate::sim::thermo::properties::{AirProperties, FluidScalars, WaterProperties};

    struct Case {
        mesh: SurfaceMesh,
        coeffs: SurfaceCoefficients,
        fluid: FluidScalars,
        config: ThermoConfig,
    }

    impl Case {
        fn new(n: usize, beta: f64) -> Self {
            let fluid = FluidScalars::default();
            let air = AirProperties::default();
            let mesh = SurfaceMesh::uniform(0.0, 0.4, n, fluid.chord).unwrap();
            let coeffs = SurfaceCoefficients::uniform(
                n,
                beta,
                10.0,
                500.0,
                fluid.temperature_c(),
                fluid.velocity,
                fluid.pressure,
                fluid.recovery_temperature_c(&air),
            );
            let mut config = ThermoConfig::new();
            config.num_points = n;
            config.evaporation = false;
            Self {
                mesh,
                coeffs,
                fluid,
                config,
            }
        }

        fn model(&self) -> FluxBalanceModel<'_> {
            FluxBalanceModel::new(
                &self.mesh,
                &self.coeffs,
                &self.fluid,
                &WaterProperties::default(),
                &AirProperties::default(),
                &self.config,
            )
            .unwrap()
        }
    }

    #[test]
    fn test_stage_sequence() {
        let case = Case::new(20, 1e-3);
        let model = case.model();
        let mut enforcer = ConstraintEnforcer::new(&model, &case.config);
        assert_eq!(enforcer.stage(), Stage::SolveMass);
        enforcer.step().unwrap();
        assert_eq!(enforcer.stage(), Stage::SolveEnergy);
        enforcer.step().unwrap();
        assert_eq!(enforcer.stage(), Stage::Evaluate);
        enforcer.step().unwrap();
        // Supercooled film on the first pass.
        assert_eq!(enforcer.stage(), Stage::Correct);
        assert!(enforcer.violations.constraints().contains(&Constraint::WaterNotCold));
        enforcer.step().unwrap();
        assert_eq!(enforcer.stage(), Stage::SolveMass);
    }

    #[test]
    fn test_marching_stage() {
        let mut case = Case::new(20, 1e-3);
        case.config.energy_strategy = crate::sim::thermo::config::Strategy::Marching;
        let model = case.model();
        let enforcer = ConstraintEnforcer::new(&model, &case.config);
        assert_eq!(enforcer.stage(), Stage::March);
        let outcome = enforcer.run().unwrap();
        assert!(outcome.status.is_converged());
        assert!(outcome.state.outflow.is_some());
    }

    #[test]
    fn test_correction_discards_marching_outflow() {
        let mut case = Case::new(20, 1e-3);
        case.config.energy_strategy = crate::sim::thermo::config::Strategy::Marching;
        let model = case.model();
        let mut enforcer = ConstraintEnforcer::new(&model, &case.config);
        enforcer.step().unwrap();
        assert_eq!(enforcer.stage(), Stage::Evaluate);
        assert!(enforcer.state.outflow.is_some());
        enforcer.violations = Violations {
            cold_water: vec![3],
            ..Violations::default()
        };
        enforcer.correct();
        assert!(enforcer.state.outflow.is_none());
        assert_eq!(enforcer.state.temperature[3], 0.0);
    }

    #[test]
    fn test_cold_film_freezes() {
        let case = Case::new(50, 1e-3);
        let model = case.model();
        let outcome = ConstraintEnforcer::new(&model, &case.config).run().unwrap();
        assert!(outcome.status.is_converged(), "{:?}", outcome.status);
        assert_eq!(outcome.record.len(), outcome.status.iterations());
        let s = &outcome.state;
        assert_eq!(s.film_height[0], 0.0);
        for i in 1..49 {
            assert!(s.ice_rate[i] > 0.0, "node {i}");
        }
    }

    #[test]
    fn test_budget_exhaustion_is_not_an_error() {
        let mut case = Case::new(20, 1e-3);
        case.config.constraints.max_iterations = 1;
        let model = case.model();
        let outcome = ConstraintEnforcer::new(&model, &case.config).run().unwrap();
        match outcome.status {
            EnforcerStatus::BudgetExhausted {
                iterations,
                violated,
            } => {
                assert_eq!(iterations, 1);
                assert!(violated.contains(&Constraint::WaterNotCold));
            }
            other => panic!("unexpected status {other:?}"),
        }
        assert!(outcome.state.is_finite());
    }

    #[test]
    fn test_dry_node_rule() {
        let case = Case::new(10, 1e-3);
        let model = case.model();
        let mut enforcer = ConstraintEnforcer::new(&model, &case.config);
        enforcer.state.ice_rate = vec![1.0; 10];
        enforcer.violations = enforcer.evaluate();
        assert!(enforcer.violations.film_conserved);
        enforcer.correct();
        let imp = model.impingement();
        for i in 0..10 {
            assert!((enforcer.state.ice_rate[i] - imp[i]).abs() < 1e-20);
        }
        assert!(!enforcer.evaluate().film_conserved);
    }

    #[test]
    fn test_rejects_wrong_state_length() {
        let case = Case::new(10, 1e-3);
        let model = case.model();
        let enforcer =
            ConstraintEnforcer::with_state(&model, &case.config, SurfaceState::zeros(9));
        assert!(enforcer.run().is_err());
    }
}
