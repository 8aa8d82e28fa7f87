//! Heat-transfer coefficient from an integral boundary-layer model.
//!
//! Laminar part: Thwaites momentum integral with a Pohlhausen quartic
//! profile and the Smith–Spalding heat-transfer correlation. Transition is
//! triggered by the roughness Reynolds number. Turbulent part: power-law
//! momentum-thickness growth and a rough-wall Stanton number analogy.

use anyhow::Result;
use tracing::debug;

use super::properties::AirProperties;
use crate::vecutils;

const SMOOTHING_WINDOW: usize = 5;
const CRITICAL_ROUGHNESS_REYNOLDS: f64 = 600.0;
const LAMBDA_MIN: f64 = -0.09;
const LAMBDA_MAX: f64 = 0.25;
/// Range of the Pohlhausen shape parameter over which `lambda(Lambda)` is monotonic.
const SHAPE_RANGE: (f64, f64) = (-12.0, 12.0);

/// Boundary-layer quantities along the surface.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundaryLayerProfile {
    /// Momentum thickness [m].
    pub momentum_thickness: Vec<f64>,
    /// Displacement thickness [m], laminar region only (zero downstream).
    pub displacement_thickness: Vec<f64>,
    /// Pohlhausen pressure-gradient shape parameter, laminar region only.
    pub shape_parameter: Vec<f64>,
    /// First turbulent node, if transition occurs.
    pub transition_index: Option<usize>,
    /// Convective heat-transfer coefficient [W/(m²·K)].
    pub heat_transfer: Vec<f64>,
}

#[derive(Debug, Clone, Copy)]
pub struct IntegralBoundaryLayerEstimator {
    air: AirProperties,
    density: f64,
    roughness_height: f64,
}

/// `theta/delta` of the Pohlhausen profile.
fn thickness_ratio(shape: f64) -> f64 {
    37.0 / 315.0 - shape / 945.0 - shape * shape / 9072.0
}

/// Thwaites parameter `theta²·Ue'/nu` implied by a Pohlhausen shape parameter.
fn thwaites_parameter(shape: f64) -> f64 {
    let g = thickness_ratio(shape);
    g * g * shape
}

/// Inverts [`thwaites_parameter`] by bisection, clamping to the admissible range.
fn shape_from_thwaites(lambda: f64) -> f64 {
    let (mut lo, mut hi) = SHAPE_RANGE;
    if lambda <= thwaites_parameter(lo) {
        return lo;
    }
    if lambda >= thwaites_parameter(hi) {
        return hi;
    }
    for _ in 0..100 {
        let mid = 0.5 * (lo + hi);
        if thwaites_parameter(mid) < lambda {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    0.5 * (lo + hi)
}

/// Pohlhausen velocity profile `u/Ue` at `eta = y/delta`.
fn velocity_profile(eta: f64, shape: f64) -> f64 {
    let eta = eta.clamp(0.0, 1.0);
    let one_minus = 1.0 - eta;
    2.0 * eta - 2.0 * eta.powi(3) + eta.powi(4) + shape / 6.0 * eta * one_minus.powi(3)
}

impl IntegralBoundaryLayerEstimator {
    pub fn new(air: AirProperties, density: f64, roughness_height: f64) -> Self {
        Self {
            air,
            density,
            roughness_height,
        }
    }

    fn kinematic_viscosity(&self) -> f64 {
        self.air.viscosity / self.density
    }

    /// Estimates boundary-layer growth and heat transfer.
    ///
    /// `arc_length` is the physical distance from the stagnation point [m],
    /// `edge_velocity` the inviscid surface speed [m/s].
    pub fn estimate(
        &self,
        arc_length: &[f64],
        edge_velocity: &[f64],
    ) -> Result<BoundaryLayerProfile> {
        let n = arc_length.len();
        anyhow::ensure!(n >= 3, "Boundary layer needs at least 3 nodes, got {n}");
        anyhow::ensure!(
            edge_velocity.len() == n,
            "Edge velocity has {} entries, expected {n}",
            edge_velocity.len()
        );
        anyhow::ensure!(self.density > 0.0, "Density must be > 0");
        anyhow::ensure!(self.roughness_height > 0.0, "Roughness height must be > 0");

        let nu = self.kinematic_viscosity();
        let speed: Vec<f64> = edge_velocity.iter().map(|v| v.abs()).collect();
        let ue = vecutils::moving_average(&speed, SMOOTHING_WINDOW);
        let due = vecutils::gradient(arc_length, &ue);
        let d2ue = vecutils::gradient(arc_length, &due);

        let z = self.integrate_thwaites(arc_length, &ue, &due, &d2ue);

        let mut theta = vec![0.0; n];
        let mut delta_star = vec![0.0; n];
        let mut shape = vec![0.0; n];
        let mut transition = None;
        for i in 0..n {
            theta[i] = (nu * z[i]).sqrt();
            let lambda = (z[i] * due[i]).clamp(LAMBDA_MIN, LAMBDA_MAX);
            shape[i] = shape_from_thwaites(lambda);
            let delta = theta[i] / thickness_ratio(shape[i]);
            delta_star[i] = delta * (0.3 - shape[i] / 120.0);

            if transition.is_none() {
                let eta = if delta > 0.0 {
                    self.roughness_height / delta
                } else {
                    1.0
                };
                let u_k = ue[i] * velocity_profile(eta, shape[i]);
                if u_k * self.roughness_height / nu > CRITICAL_ROUGHNESS_REYNOLDS {
                    transition = Some(i);
                }
            }
        }

        let laminar_end = transition.unwrap_or(n);
        let mut heat_transfer = self.laminar_heat_transfer(arc_length, &ue, &due);
        if let Some(tr) = transition {
            self.turbulent_region(arc_length, &ue, tr, &mut theta, &mut heat_transfer);
            for i in tr..n {
                delta_star[i] = 0.0;
                shape[i] = 0.0;
            }
        }
        debug!(
            "Integral boundary layer: transition at {:?}, laminar nodes {}",
            transition.map(|i| arc_length[i]),
            laminar_end
        );

        Ok(BoundaryLayerProfile {
            momentum_thickness: theta,
            displacement_thickness: delta_star,
            shape_parameter: shape,
            transition_index: transition,
            heat_transfer,
        })
    }

    /// RK4 integration of `dZ/ds = (0.45 - 6·Z·Ue')/Ue` with `Z = theta²/nu`.
    fn integrate_thwaites(&self, s: &[f64], ue: &[f64], due: &[f64], d2ue: &[f64]) -> Vec<f64> {
        let n = s.len();
        let floor = 1e-6 * vecutils::max(ue).max(f64::MIN_POSITIVE);
        let slope0 = due[0].abs().max(f64::MIN_POSITIVE);

        let rhs = |i: usize, frac: f64, z: f64| -> f64 {
            let u = ue[i] + frac * (ue[i + 1] - ue[i]);
            let du = due[i] + frac * (due[i + 1] - due[i]);
            if u > floor {
                (0.45 - 6.0 * z * du) / u
            } else {
                // Stagnation limit of the Thwaites equation.
                let d2u = d2ue[i] + frac * (d2ue[i + 1] - d2ue[i]);
                -0.0652 * d2u / du.abs().max(f64::MIN_POSITIVE).powi(2)
            }
        };

        let mut z = vec![0.0; n];
        z[0] = 0.075 / slope0;
        for i in 0..n - 1 {
            let h = s[i + 1] - s[i];
            let k1 = rhs(i, 0.0, z[i]);
            let k2 = rhs(i, 0.5, z[i] + 0.5 * h * k1);
            let k3 = rhs(i, 0.5, z[i] + 0.5 * h * k2);
            let k4 = rhs(i, 1.0, z[i] + h * k3);
            z[i + 1] = (z[i] + h / 6.0 * (k1 + 2.0 * k2 + 2.0 * k3 + k4)).max(0.0);
        }
        z
    }

    /// Smith–Spalding laminar correlation.
    fn laminar_heat_transfer(&self, s: &[f64], ue: &[f64], due: &[f64]) -> Vec<f64> {
        let nu = self.kinematic_viscosity();
        let k = self.air.conductivity;
        let powered: Vec<f64> = ue.iter().map(|u| u.powf(1.87)).collect();
        let integral = vecutils::trapz(s, &powered);
        (0..s.len())
            .map(|i| {
                if integral[i] > 0.0 && ue[i] > 0.0 {
                    0.296 * k * ue[i].powf(1.435) / (nu * integral[i]).sqrt()
                } else {
                    0.296 * k * (2.87 * due[i].abs() / nu).sqrt()
                }
            })
            .collect()
    }

    /// Turbulent momentum thickness and rough-wall heat transfer from `tr` on.
    fn turbulent_region(
        &self,
        s: &[f64],
        ue: &[f64],
        tr: usize,
        theta: &mut [f64],
        heat_transfer: &mut [f64],
    ) {
        let nu = self.kinematic_viscosity();
        let ks = self.roughness_height;
        let theta_tr = theta[tr];
        let powered: Vec<f64> = ue[tr..].iter().map(|u| u.powf(3.86)).collect();
        let integral = vecutils::trapz(&s[tr..], &powered);
        let pr_factor = self.air.prandtl.powf(-0.8);

        for (j, i) in (tr..s.len()).enumerate() {
            let u = ue[i].max(f64::MIN_POSITIVE);
            theta[i] = theta_tr + 0.036 * nu.powf(0.2) * u.powf(-3.29) * integral[j].powf(0.8);

            let log = (864.0 * theta[i] / ks + 2.568).ln();
            let half_cf = 0.1681 / (log * log);
            let friction_velocity = u * half_cf.sqrt();
            let re_k = (friction_velocity * ks / nu).max(f64::MIN_POSITIVE);
            let stanton_k = 1.92 * re_k.powf(-0.45) * pr_factor;
            let stanton = half_cf / (self.air.turbulent_prandtl + half_cf.sqrt() / stanton_k);
            heat_transfer[i] = stanton * self.density * self.air.specific_heat * u;
        }
    }
}
