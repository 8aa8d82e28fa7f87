use tracing::warn;

use super::SolveReport;
use crate::sim::thermo::balance::FluxBalanceModel;
use crate::sim::thermo::config::MarchingSettings;
use crate::sim::thermo::state::{ConvergenceRecord, SurfaceState};

/// Node-by-node coupled mass/energy solve marching away from the stagnation point.
///
/// Each control volume receives the runback of its upstream neighbour, solves
/// a scalar energy balance for its surface temperature with a smoothed
/// freezing fraction, and passes the unfrozen water on.
#[derive(Debug, Clone, Copy)]
pub struct MarchingSolver {
    settings: MarchingSettings,
}

/// Energy balance of one control volume, per unit span.
struct NodeBalance<'m, 'a> {
    model: &'m FluxBalanceModel<'a>,
    node: usize,
    width: f64,
    inflow: f64,
    inflow_temperature: f64,
    band: f64,
}

impl NodeBalance<'_, '_> {
    fn freezing_fraction(&self, t: f64) -> (f64, f64) {
        let f = 0.5 - t / self.band;
        if f <= 0.0 {
            (0.0, 0.0)
        } else if f >= 1.0 {
            (1.0, 0.0)
        } else {
            (f, -1.0 / self.band)
        }
    }

    /// Evaporative flux and derivative.
    fn evaporation(&self, t: f64) -> (f64, f64) {
        let rate = self.model.evaporation_rate(self.node, t);
        (rate.flux, rate.derivative)
    }

    /// Water entering the volume [kg/(m·s)].
    ///
    /// Never negative: the evaporative flux is capped at the local impingement.
    fn water(&self, m_evap: f64) -> f64 {
        self.inflow + (self.model.impingement()[self.node] - m_evap) * self.width
    }

    /// Enthalpy carried in by runback and droplets [W/m].
    fn incoming(&self) -> f64 {
        let w = self.model.water();
        let (t_d, u_d) = self.model.droplet_conditions();
        self.inflow * w.specific_heat * self.inflow_temperature
            + self.model.impingement()[self.node]
                * self.width
                * (w.specific_heat * t_d + 0.5 * u_d * u_d)
    }

    /// Energy imbalance `E(T)` and `dE/dT`.
    fn residual(&self, t: f64) -> (f64, f64) {
        let w = self.model.water();
        let c = self.model.coefficients();
        let i = self.node;
        let (m_evap, dm_evap) = self.evaporation(t);
        let (f, df) = self.freezing_fraction(t);
        let latent = w.latent_vaporization(t);

        let water = self.water(m_evap);
        let d_water = -dm_evap * self.width;
        let g = (1.0 - f) * w.specific_heat * t + f * (w.ice_specific_heat * t - w.latent_fusion);
        let dg = (1.0 - f) * w.specific_heat
            + f * w.ice_specific_heat
            + df * (w.ice_specific_heat * t - w.latent_fusion - w.specific_heat * t);

        let out = c.heat_transfer[i] * self.width * (t - c.recovery_temperature[i])
            + m_evap * latent * self.width
            + water * g;
        let d_out = c.heat_transfer[i] * self.width
            + dm_evap * latent * self.width
            + d_water * g
            + water * dg;
        (self.incoming() - out, -d_out)
    }

    /// Freezing fraction that balances the volume exactly at 0 °C.
    fn fraction_at_freezing(&self) -> f64 {
        let w = self.model.water();
        let c = self.model.coefficients();
        let (m_evap, _) = self.evaporation(0.0);
        let water = self.water(m_evap);
        if water <= 0.0 {
            return 0.0;
        }
        let losses = m_evap * w.latent_vaporization(0.0) * self.width
            - c.heat_transfer[self.node] * self.width * c.recovery_temperature[self.node];
        ((losses - self.incoming()) / (water * w.latent_fusion)).clamp(0.0, 1.0)
    }
}

/// Converged quantities of one control volume.
struct NodeSolution {
    temperature: f64,
    fraction: f64,
    evaporation: f64,
    water: f64,
    iterations: usize,
    last_update: f64,
    converged: bool,
}

impl MarchingSolver {
    pub fn new(settings: MarchingSettings) -> Self {
        Self { settings }
    }

    fn solve_node(&self, balance: &NodeBalance, guess: f64) -> NodeSolution {
        let s = &self.settings;
        let mut t = guess;
        let mut last_update = f64::INFINITY;
        let mut converged = false;
        let mut iterations = 0;
        while iterations < s.max_iterations {
            let (e, de) = balance.residual(t);
            iterations += 1;
            if de.abs() < f64::MIN_POSITIVE {
                converged = e.abs() < f64::MIN_POSITIVE;
                break;
            }
            let dt = (-e / de).clamp(-s.max_step, s.max_step);
            t += dt;
            last_update = dt.abs();
            if last_update < s.tolerance {
                converged = true;
                break;
            }
        }

        let (mut fraction, _) = balance.freezing_fraction(t);
        if fraction > 0.0 && fraction < 1.0 {
            // Mixed glaze volume: pin to the freezing point and close the balance there.
            t = 0.0;
            fraction = balance.fraction_at_freezing();
        }
        let (evaporation, _) = balance.evaporation(t);
        NodeSolution {
            temperature: t,
            fraction,
            evaporation,
            water: balance.water(evaporation),
            iterations,
            last_update,
            converged,
        }
    }

    /// Solves every node in surface order and overwrites `state`.
    pub fn solve(&self, model: &FluxBalanceModel, state: &mut SurfaceState) -> SolveReport {
        let n = model.len();
        let mesh = model.mesh();
        let c = model.coefficients();
        let water = model.water();

        let mut history = ConvergenceRecord::new();
        let mut outflow = vec![0.0; n];
        let mut all_converged = true;
        let mut total_iterations = 0;
        let mut worst_update: f64 = 0.0;

        let mut inflow = 0.0;
        let mut inflow_temperature = 0.0;
        for i in 0..n {
            let balance = NodeBalance {
                model,
                node: i,
                width: mesh.cell_width(i),
                inflow,
                inflow_temperature,
                band: self.settings.phase_band,
            };
            let guess = if i == 0 {
                c.recovery_temperature[0]
            } else {
                state.temperature[i - 1]
            };
            let node = self.solve_node(&balance, guess);
            let m_out = (1.0 - node.fraction) * node.water;
            let tau = c.shear[i].abs().max(f64::MIN_POSITIVE);
            state.temperature[i] = node.temperature;
            state.evaporation[i] = node.evaporation;
            state.ice_rate[i] = node.fraction * node.water / balance.width;
            state.film_height[i] = (2.0 * water.viscosity * m_out / (water.density * tau)).sqrt();
            outflow[i] = m_out;

            total_iterations += node.iterations;
            all_converged &= node.converged;
            if node.last_update.is_finite() {
                worst_update = worst_update.max(node.last_update);
            }
            history.push(node.last_update);

            inflow = m_out;
            inflow_temperature = node.temperature;
        }
        state.outflow = Some(outflow);

        if !all_converged {
            warn!(
                "Marching solve: some nodes did not converge within {} local iterations",
                self.settings.max_iterations
            );
        }
        SolveReport {
            converged: all_converged,
            iterations: total_iterations,
            initial_norm: history.norms().first().copied().unwrap_or(0.0),
            final_norm: worst_update,
            threshold: self.settings.tolerance,
            history,
        }
    }
}
