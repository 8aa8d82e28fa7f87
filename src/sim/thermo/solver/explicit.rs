use tracing::{debug, warn};

use super::{NonlinearSystem, SolveReport};
use crate::sim::thermo::config::ExplicitSettings;
use crate::sim::thermo::state::ConvergenceRecord;
use crate::vecutils;

/// Pseudo-time relaxation `y <- y - step·r(y)/D(y)` with projection after
/// every step.
///
/// With local time stepping `D` is the residual diagonal of the system, which
/// makes `step` a dimensionless damping factor of a Jacobi sweep. Without it
/// `D = 1` and `step` is a true pseudo-time step.
#[derive(Debug, Clone, Copy)]
pub struct ExplicitRelaxation {
    settings: ExplicitSettings,
}

impl ExplicitRelaxation {
    pub fn new(settings: ExplicitSettings) -> Self {
        Self { settings }
    }

    /// Relaxes `y` in place.
    ///
    /// Converged once `max|r| < max(rel_tolerance·max|r0|, abs_tolerance)`.
    /// If the primary budget runs out the step is escalated once and the
    /// iteration continues up to the retry budget.
    pub fn solve<S: NonlinearSystem + ?Sized>(&self, system: &S, y: &mut [f64]) -> SolveReport {
        let s = &self.settings;
        system.project(y);
        let mut r = system.residual(y);
        let initial_norm = vecutils::max_abs(&r);
        let threshold = (s.rel_tolerance * initial_norm).max(s.abs_tolerance);

        let mut history = ConvergenceRecord::new();
        history.push(initial_norm);
        let mut report = SolveReport {
            converged: initial_norm < threshold,
            iterations: 0,
            initial_norm,
            final_norm: initial_norm,
            threshold,
            history: ConvergenceRecord::new(),
        };
        if report.converged || !initial_norm.is_finite() {
            report.history = history;
            return report;
        }

        let mut step = s.step;
        let mut budget = s.max_iterations;
        let mut previous = y.to_vec();
        let mut iteration = 0;
        'attempts: for attempt in 0..2 {
            if attempt == 1 {
                step *= s.step_escalation;
                budget = s.max_iterations_retry;
                warn!(
                    "Explicit relaxation did not converge in {} iterations (max|r| = {:.3e}), retrying with step {}",
                    iteration, report.final_norm, step
                );
            }
            while iteration < budget {
                previous.copy_from_slice(y);
                let diag = if s.local_time_stepping {
                    system.diagonal(y)
                } else {
                    None
                };
                match diag {
                    Some(d) => {
                        for ((yi, ri), di) in y.iter_mut().zip(&r).zip(&d) {
                            *yi -= step * ri / di;
                        }
                    }
                    None => {
                        for (yi, ri) in y.iter_mut().zip(&r) {
                            *yi -= step * ri;
                        }
                    }
                }
                system.project(y);
                r = system.residual(y);
                iteration += 1;

                let norm = vecutils::max_abs(&r);
                if !norm.is_finite() {
                    warn!("Explicit relaxation diverged at iteration {iteration}");
                    y.copy_from_slice(&previous);
                    break 'attempts;
                }
                history.push(norm);
                report.final_norm = norm;
                if norm < threshold {
                    report.converged = true;
                    break 'attempts;
                }
            }
        }

        report.iterations = iteration;
        report.history = history;
        if report.converged {
            debug!(
                "Explicit relaxation converged in {} iterations (max|r| {:.3e} -> {:.3e})",
                iteration, initial_norm, report.final_norm
            );
        } else {
            warn!(
                "Explicit relaxation stopped after {} iterations, max|r| = {:.3e} (threshold {:.3e})",
                iteration, report.final_norm, threshold
            );
        }
        report
    }
}
