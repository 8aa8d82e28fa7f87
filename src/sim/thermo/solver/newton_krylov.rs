use tracing::{debug, warn};

use super::krylov::{KrylovSolver, LinearOperator};
use super::{NonlinearSystem, SolveReport};
use crate::sim::thermo::config::NewtonKrylovSettings;
use crate::sim::thermo::state::ConvergenceRecord;
use crate::vecutils;

/// Matrix-free Jacobian of a [`NonlinearSystem`] at a fixed base point.
///
/// `J·v ≈ ||v||·(F(u + eps·v/||v||) - F(u))/eps` with a fixed `eps`.
pub struct FiniteDifferenceJacobian<'s, S: NonlinearSystem + ?Sized> {
    system: &'s S,
    base: &'s [f64],
    base_residual: &'s [f64],
    perturbation: f64,
}

impl<'s, S: NonlinearSystem + ?Sized> FiniteDifferenceJacobian<'s, S> {
    pub fn new(
        system: &'s S,
        base: &'s [f64],
        base_residual: &'s [f64],
        perturbation: f64,
    ) -> Self {
        Self {
            system,
            base,
            base_residual,
            perturbation,
        }
    }
}

impl<S: NonlinearSystem + ?Sized> LinearOperator for FiniteDifferenceJacobian<'_, S> {
    fn dim(&self) -> usize {
        self.base.len()
    }

    fn apply(&self, v: &[f64]) -> Vec<f64> {
        let scale = vecutils::norm(v);
        if scale == 0.0 {
            return vec![0.0; v.len()];
        }
        let eps = self.perturbation;
        let shifted: Vec<f64> = self
            .base
            .iter()
            .zip(v)
            .map(|(u, vi)| u + eps * vi / scale)
            .collect();
        self.system
            .residual(&shifted)
            .iter()
            .zip(self.base_residual)
            .map(|(f1, f0)| scale * (f1 - f0) / eps)
            .collect()
    }
}

/// Jacobian-free Newton–Krylov iteration with an injected linear solver.
#[derive(Debug, Clone)]
pub struct NewtonKrylov<K: KrylovSolver> {
    settings: NewtonKrylovSettings,
    krylov: K,
}

impl<K: KrylovSolver> NewtonKrylov<K> {
    pub fn new(settings: NewtonKrylovSettings, krylov: K) -> Self {
        Self { settings, krylov }
    }

    /// Solves `system` in place starting from `y`.
    ///
    /// A step is accepted as final when the nonlinear residual at the new point
    /// is below the global tolerance and agrees with the linear prediction
    /// `F(u) + J·dx` to the same tolerance. Otherwise iteration continues until
    /// the Newton budget is spent.
    pub fn solve<S: NonlinearSystem + ?Sized>(&self, system: &S, y: &mut [f64]) -> SolveReport {
        let tol = self.settings.global_tolerance;
        system.project(y);
        let mut f0 = system.residual(y);
        let initial_norm = vecutils::norm(&f0);

        let mut report = SolveReport {
            converged: initial_norm < tol,
            iterations: 0,
            initial_norm,
            final_norm: initial_norm,
            threshold: tol,
            history: ConvergenceRecord::new(),
        };
        report.history.push(initial_norm);
        if report.converged || !initial_norm.is_finite() {
            return report;
        }

        let zeros = vec![0.0; y.len()];
        for iteration in 1..=self.settings.max_newton_iterations {
            let rhs: Vec<f64> = f0.iter().map(|v| -v).collect();
            let (step, predicted) = {
                let jac =
                    FiniteDifferenceJacobian::new(system, y, &f0, self.settings.perturbation);
                let outcome = self.krylov.solve(&jac, &rhs, &zeros);
                if !outcome.converged {
                    debug!(
                        "Krylov solve stopped after {} iterations, ||r|| = {:.3e}",
                        outcome.iterations, outcome.residual_norm
                    );
                }
                let jx = jac.apply(&outcome.solution);
                let predicted: Vec<f64> = f0.iter().zip(&jx).map(|(f, j)| f + j).collect();
                (outcome.solution, predicted)
            };

            let mut candidate: Vec<f64> = y.iter().zip(&step).map(|(u, dx)| u + dx).collect();
            system.project(&mut candidate);
            let f1 = system.residual(&candidate);
            let norm = vecutils::norm(&f1);
            if !norm.is_finite() {
                warn!("Newton–Krylov produced a non-finite residual at iteration {iteration}");
                report.iterations = iteration;
                return report;
            }
            let mismatch: Vec<f64> = f1.iter().zip(&predicted).map(|(a, b)| a - b).collect();
            let mismatch = vecutils::norm(&mismatch);

            y.copy_from_slice(&candidate);
            f0 = f1;
            report.iterations = iteration;
            report.final_norm = norm;
            report.history.push(norm);
            debug!(
                "Newton iteration {}: ||F|| = {:.3e}, linearization mismatch = {:.3e}",
                iteration, norm, mismatch
            );

            if norm < tol && mismatch < tol {
                report.converged = true;
                return report;
            }
        }

        warn!(
            "Newton–Krylov did not converge in {} iterations, ||F|| = {:.3e}",
            self.settings.max_newton_iterations, report.final_norm
        );
        report
    }
}
