//! Krylov linear solvers behind a small strategy interface.

use crate::vecutils;

/// A linear map `x -> A·x` that never needs to be assembled.
pub trait LinearOperator {
    fn dim(&self) -> usize;

    fn apply(&self, x: &[f64]) -> Vec<f64>;
}

/// Result of an approximate linear solve.
#[derive(Debug, Clone)]
pub struct KrylovOutcome {
    pub solution: Vec<f64>,
    pub converged: bool,
    /// Number of operator applications spent in the Krylov iterations.
    pub iterations: usize,
    /// `||b - A·x||` of the returned solution estimate.
    pub residual_norm: f64,
}

/// Any backend that approximately solves `A·x = b`.
pub trait KrylovSolver {
    fn solve(&self, op: &dyn LinearOperator, rhs: &[f64], x0: &[f64]) -> KrylovOutcome;
}

/// Restarted GMRES(m) with modified Gram–Schmidt and Givens rotations.
#[derive(Debug, Clone, Copy)]
pub struct Gmres {
    restart: usize,
    max_iterations: usize,
    tolerance: f64,
}

impl Gmres {
    pub fn new(restart: usize, max_iterations: usize, tolerance: f64) -> Self {
        Self {
            restart: restart.max(1),
            max_iterations,
            tolerance,
        }
    }
}

fn residual(op: &dyn LinearOperator, rhs: &[f64], x: &[f64]) -> Vec<f64> {
    op.apply(x).iter().zip(rhs).map(|(ax, b)| b - ax).collect()
}

impl KrylovSolver for Gmres {
    /// Stops once `||b - A·x|| <= tolerance·||b||` or the iteration cap is hit.
    fn solve(&self, op: &dyn LinearOperator, rhs: &[f64], x0: &[f64]) -> KrylovOutcome {
        let n = op.dim();
        let mut x = x0.to_vec();
        let target = self.tolerance * vecutils::norm(rhs);
        let m = self.restart.min(n.max(1));
        let mut iterations = 0;

        loop {
            let r = residual(op, rhs, &x);
            let beta = vecutils::norm(&r);
            if beta <= target || beta == 0.0 {
                return KrylovOutcome {
                    solution: x,
                    converged: true,
                    iterations,
                    residual_norm: beta,
                };
            }
            if iterations >= self.max_iterations {
                return KrylovOutcome {
                    solution: x,
                    converged: false,
                    iterations,
                    residual_norm: beta,
                };
            }

            let mut basis: Vec<Vec<f64>> = vec![r.iter().map(|v| v / beta).collect()];
            let mut h = vec![vec![0.0; m]; m + 1];
            let mut cs = vec![0.0; m];
            let mut sn = vec![0.0; m];
            let mut g = vec![0.0; m + 1];
            g[0] = beta;
            let mut k = 0;

            for j in 0..m {
                if iterations >= self.max_iterations {
                    break;
                }
                let mut w = op.apply(&basis[j]);
                iterations += 1;

                // Modified Gram–Schmidt
                for (i, v) in basis.iter().enumerate() {
                    let hij = vecutils::dot(&w, v);
                    h[i][j] = hij;
                    for (wk, vk) in w.iter_mut().zip(v) {
                        *wk -= hij * vk;
                    }
                }
                let next = vecutils::norm(&w);
                h[j + 1][j] = next;

                for i in 0..j {
                    let tmp = cs[i] * h[i][j] + sn[i] * h[i + 1][j];
                    h[i + 1][j] = -sn[i] * h[i][j] + cs[i] * h[i + 1][j];
                    h[i][j] = tmp;
                }
                let denom = h[j][j].hypot(h[j + 1][j]);
                (cs[j], sn[j]) = if denom > 0.0 {
                    (h[j][j] / denom, h[j + 1][j] / denom)
                } else {
                    (1.0, 0.0)
                };
                h[j][j] = cs[j] * h[j][j] + sn[j] * h[j + 1][j];
                h[j + 1][j] = 0.0;
                g[j + 1] = -sn[j] * g[j];
                g[j] *= cs[j];
                k = j + 1;

                // Happy breakdown: the Krylov space is invariant.
                if g[j + 1].abs() <= target || next <= f64::EPSILON * beta {
                    break;
                }
                basis.push(w.iter().map(|v| v / next).collect());
            }

            // Back substitution on the rotated Hessenberg matrix.
            let mut y = vec![0.0; k];
            for i in (0..k).rev() {
                let mut sum = g[i];
                for l in (i + 1)..k {
                    sum -= h[i][l] * y[l];
                }
                y[i] = if h[i][i].abs() > 0.0 { sum / h[i][i] } else { 0.0 };
            }
            for (yi, v) in y.iter().zip(&basis) {
                for (xk, vk) in x.iter_mut().zip(v) {
                    *xk += yi * vk;
                }
            }
        }
    }
}
