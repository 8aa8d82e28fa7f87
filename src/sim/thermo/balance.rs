//! Finite-volume mass and energy balances of the runback film.
//!
//! Both balances share one discretisation: node-centred control volumes, a
//! Roe-type upwind face flux
//!
//! ```text
//! f_{i+1/2} = 0.5·(F_i + F_{i+1}) - 0.5·|A_{i+1/2}|·(y_{i+1} - y_i)
//! ```
//!
//! and a residual expressed as a per-area imbalance
//! `r_i = (rho_L / w_i)·(f_{i+1/2} - f_{i-1/2}) - S_i`.
//! The leading node carries a Dirichlet condition and the trailing residual is
//! linearly extrapolated from the two preceding ones.

use anyhow::Result;

use super::config::ThermoConfig;
use super::evaporation::{EvaporationInputs, EvaporationModel, EvaporationRate};
use super::mesh::{SurfaceCoefficients, SurfaceMesh};
use super::properties::{AirProperties, FluidScalars, WaterProperties};
use super::state::SurfaceState;
use crate::vecutils;

/// Diagonal entries below this fraction of the largest one are raised to it.
const DIAGONAL_FLOOR: f64 = 1e-3;

/// Ice at the leading node below this fraction of the peak counts as absent.
const LEADING_ICE_FRACTION: f64 = 0.01;

/// Which conservation law a residual describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BalanceKind {
    /// Film continuity; the unknown is the film height.
    Mass,
    /// Film enthalpy; the unknown is the surface temperature.
    Energy,
}

impl BalanceKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Mass => "mass",
            Self::Energy => "energy",
        }
    }
}

/// Residual definitions over a fixed mesh and coefficient set.
///
/// The model holds no solution fields. Every operation receives the state it
/// works on explicitly.
#[derive(Debug, Clone)]
pub struct FluxBalanceModel<'a> {
    mesh: &'a SurfaceMesh,
    coefficients: &'a SurfaceCoefficients,
    fluid: FluidScalars,
    water: WaterProperties,
    evaporation: EvaporationModel,
    impingement: Vec<f64>,
    /// Free-stream recovery temperature [°C].
    stagnation_temperature: f64,
    film_height_cap: f64,
    temperature_bounds: (f64, f64),
}

impl<'a> FluxBalanceModel<'a> {
    pub fn new(
        mesh: &'a SurfaceMesh,
        coefficients: &'a SurfaceCoefficients,
        fluid: &FluidScalars,
        water: &WaterProperties,
        air: &AirProperties,
        config: &ThermoConfig,
    ) -> Result<Self> {
        coefficients.check_len(mesh.len())?;
        fluid.validate()?;

        let impingement = coefficients
            .collection_efficiency
            .iter()
            .map(|&beta| fluid.impingement_flux(beta))
            .collect();
        let evaporation = if config.evaporation {
            EvaporationModel::new(fluid, air, true)
        } else {
            EvaporationModel::disabled()
        };
        let t_inf = fluid.temperature_c();
        let lower = (2.0 * t_inf).min(t_inf);

        Ok(Self {
            mesh,
            coefficients,
            fluid: *fluid,
            water: *water,
            evaporation,
            impingement,
            stagnation_temperature: fluid.recovery_temperature_c(air),
            film_height_cap: config.film_height_cap,
            temperature_bounds: (lower, config.temperature_cap),
        })
    }

    pub fn len(&self) -> usize {
        self.mesh.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mesh.is_empty()
    }

    pub fn mesh(&self) -> &SurfaceMesh {
        self.mesh
    }

    pub fn coefficients(&self) -> &SurfaceCoefficients {
        self.coefficients
    }

    pub fn water(&self) -> &WaterProperties {
        &self.water
    }

    /// Droplet temperature [°C] and impact velocity [m/s].
    pub fn droplet_conditions(&self) -> (f64, f64) {
        (self.fluid.droplet_temperature, self.fluid.droplet_velocity)
    }

    /// Impinging water mass flux per node [kg/(m²·s)].
    pub fn impingement(&self) -> &[f64] {
        &self.impingement
    }

    pub fn evaporation_model(&self) -> &EvaporationModel {
        &self.evaporation
    }

    pub fn evaporation_inputs(&self, i: usize) -> EvaporationInputs {
        EvaporationInputs {
            heat_transfer: self.coefficients.heat_transfer[i],
            static_pressure: self.coefficients.static_pressure[i],
            edge_temperature: self.coefficients.edge_temperature[i],
            impingement: self.impingement[i],
        }
    }

    pub fn evaporation_rate(&self, i: usize, temperature: f64) -> EvaporationRate {
        self.evaporation
            .compute(&self.evaporation_inputs(i), temperature)
    }

    /// Evaporative flux at every node for a temperature field.
    pub fn evaporation(&self, temperature: &[f64]) -> Vec<f64> {
        temperature
            .iter()
            .enumerate()
            .map(|(i, &t)| self.evaporation_rate(i, t).flux)
            .collect()
    }

    /// Leading-node temperature: free-stream recovery if the stagnation point
    /// is ice free, otherwise the freezing point.
    pub fn leading_temperature(&self, ice_rate: &[f64]) -> f64 {
        let peak = vecutils::max(ice_rate);
        match ice_rate.first() {
            Some(&ice) if ice > LEADING_ICE_FRACTION * peak => 0.0,
            _ => self.stagnation_temperature,
        }
    }

    /// Physical clipping interval of the unknown.
    pub fn bounds(&self, kind: BalanceKind) -> (f64, f64) {
        match kind {
            BalanceKind::Mass => (0.0, self.film_height_cap),
            BalanceKind::Energy => self.temperature_bounds,
        }
    }

    /// Body-centred convective flux at node `i` [m²/s or J·m²/(kg·s)].
    fn node_flux(&self, kind: BalanceKind, i: usize, h: f64, t: f64) -> f64 {
        let tau = self.coefficients.shear[i];
        let base = h * h * tau / (2.0 * self.water.viscosity);
        match kind {
            BalanceKind::Mass => base,
            BalanceKind::Energy => self.water.specific_heat * base * t,
        }
    }

    /// Flux Jacobian `dF/dy` evaluated at face `i + 1/2`.
    fn face_jacobian(&self, kind: BalanceKind, i: usize, h: &[f64]) -> f64 {
        let tau = 0.5 * (self.coefficients.shear[i] + self.coefficients.shear[i + 1]);
        let hf = 0.5 * (h[i] + h[i + 1]);
        match kind {
            BalanceKind::Mass => hf * tau / self.water.viscosity,
            BalanceKind::Energy => {
                self.water.specific_heat * tau * hf * hf / (2.0 * self.water.viscosity)
            }
        }
    }

    /// Roe-upwinded face fluxes, one per interval.
    fn face_fluxes(&self, kind: BalanceKind, h: &[f64], t: &[f64]) -> Vec<f64> {
        let y = match kind {
            BalanceKind::Mass => h,
            BalanceKind::Energy => t,
        };
        (0..self.len() - 1)
            .map(|i| {
                let fl = self.node_flux(kind, i, h[i], t[i]);
                let fr = self.node_flux(kind, i + 1, h[i + 1], t[i + 1]);
                let a = self.face_jacobian(kind, i, h);
                0.5 * (fl + fr) - 0.5 * a.abs() * (y[i + 1] - y[i])
            })
            .collect()
    }

    /// Net convective outflow of node `i` per unit area.
    fn flux_divergence(&self, faces: &[f64], i: usize) -> f64 {
        self.water.density / self.mesh.cell_width(i) * (faces[i] - faces[i - 1])
    }

    /// Energy sources at node `i` excluding the ice term [W/m²].
    fn energy_source_without_ice(&self, i: usize, t: f64, evaporation: f64) -> f64 {
        let c = self.coefficients;
        let w = &self.water;
        let (t_d, u_d) = self.droplet_conditions();
        let droplet = w.specific_heat * t_d + 0.5 * u_d * u_d;
        self.impingement[i] * droplet + c.heat_transfer[i] * (c.recovery_temperature[i] - t)
            - evaporation * w.latent_vaporization(t)
    }

    /// Latent plus sensible heat released per unit ice mass at `t` [J/kg].
    fn ice_enthalpy(&self, t: f64) -> f64 {
        self.water.latent_fusion - self.water.ice_specific_heat * t
    }

    /// Mass residual for film height `h` [kg/(m²·s)].
    pub fn mass_residual(&self, h: &[f64], ice_rate: &[f64], evaporation: &[f64]) -> Vec<f64> {
        let n = self.len();
        let faces = self.face_fluxes(BalanceKind::Mass, h, h);
        let mut r = vec![0.0; n];
        r[0] = h[0];
        for i in 1..n - 1 {
            let source = self.impingement[i] - ice_rate[i] - evaporation[i];
            r[i] = self.flux_divergence(&faces, i) - source;
        }
        r[n - 1] = 2.0 * r[n - 2] - r[n - 3];
        r
    }

    /// Energy residual for temperature `t` [W/m²].
    ///
    /// Evaporation is re-evaluated at `t`.
    pub fn energy_residual(&self, h: &[f64], t: &[f64], ice_rate: &[f64]) -> Vec<f64> {
        let n = self.len();
        let faces = self.face_fluxes(BalanceKind::Energy, h, t);
        let mut r = vec![0.0; n];
        r[0] = t[0] - self.leading_temperature(ice_rate);
        for i in 1..n - 1 {
            let m_evap = self.evaporation_rate(i, t[i]).flux;
            let source = self.energy_source_without_ice(i, t[i], m_evap)
                + ice_rate[i] * self.ice_enthalpy(t[i]);
            r[i] = self.flux_divergence(&faces, i) - source;
        }
        r[n - 1] = 2.0 * r[n - 2] - r[n - 3];
        r
    }

    /// Residual of `kind` with `y` as the unknown and the rest taken from `state`.
    pub fn residual(&self, kind: BalanceKind, y: &[f64], state: &SurfaceState) -> Vec<f64> {
        match kind {
            BalanceKind::Mass => self.mass_residual(y, &state.ice_rate, &state.evaporation),
            BalanceKind::Energy => self.energy_residual(&state.film_height, y, &state.ice_rate),
        }
    }

    /// Approximate residual diagonal `dr_i/dy_i`, floored away from zero.
    pub fn diagonal(&self, kind: BalanceKind, y: &[f64], state: &SurfaceState) -> Vec<f64> {
        let n = self.len();
        let h: &[f64] = match kind {
            BalanceKind::Mass => y,
            BalanceKind::Energy => &state.film_height,
        };
        let a: Vec<f64> = (0..n - 1)
            .map(|i| self.face_jacobian(kind, i, h).abs())
            .collect();

        let mut d = vec![0.0; n];
        for i in 1..n - 1 {
            d[i] = self.water.density / self.mesh.cell_width(i) * 0.5 * (a[i] + a[i - 1]);
            if kind == BalanceKind::Energy {
                let rate = self.evaporation_rate(i, y[i]);
                d[i] += self.coefficients.heat_transfer[i]
                    + state.ice_rate[i] * self.water.ice_specific_heat
                    + rate.derivative * self.water.latent_vaporization(y[i]);
            }
        }

        let floor = (DIAGONAL_FLOOR * vecutils::max(&d[1..n - 1])).max(f64::MIN_POSITIVE);
        for v in d[1..n - 1].iter_mut() {
            *v = v.max(floor);
        }
        d[0] = 1.0;
        d[n - 1] = d[n - 2];
        d
    }

    /// Pins the boundary values and clips `y` to its physical interval.
    pub fn project(&self, kind: BalanceKind, y: &mut [f64], ice_rate: &[f64]) {
        let n = y.len();
        y[n - 1] = 2.0 * y[n - 2] - y[n - 3];
        let (lo, hi) = self.bounds(kind);
        for v in y.iter_mut() {
            *v = v.clamp(lo, hi);
        }
        y[0] = match kind {
            BalanceKind::Mass => 0.0,
            BalanceKind::Energy => self.leading_temperature(ice_rate),
        };
    }

    /// Cumulative water supply from the stagnation point [kg/(m·s)].
    ///
    /// Trapezoidal integral of `m_imp - m_ice - m_evap` over physical arc length.
    pub fn cumulative_supply(&self, ice_rate: &[f64], evaporation: &[f64]) -> Vec<f64> {
        let net: Vec<f64> = (0..self.len())
            .map(|i| self.impingement[i] - ice_rate[i] - evaporation[i])
            .collect();
        vecutils::trapz(&self.mesh.physical_coordinates(), &net)
    }

    /// Closed-form film height from the cumulative supply.
    ///
    /// Treats the film flux at each node as the whole upstream supply, which
    /// gives `h = sqrt(2·mu/(rho·tau)·supply)`. Negative supply yields zero.
    pub fn integrate_mass(&self, ice_rate: &[f64], evaporation: &[f64]) -> Vec<f64> {
        let supply = self.cumulative_supply(ice_rate, evaporation);
        let mut h: Vec<f64> = supply
            .iter()
            .zip(&self.coefficients.shear)
            .map(|(&m, &tau)| {
                let h2 = 2.0 * self.water.viscosity / (self.water.density * tau.abs()) * m;
                h2.max(0.0).sqrt().min(self.film_height_cap)
            })
            .collect();
        h[0] = 0.0;
        h
    }

    /// Ice rate that zeroes the energy residual for given `h` and `t`.
    ///
    /// The result is unclipped; end nodes copy their interior neighbour.
    pub fn ice_rate_from_energy(&self, h: &[f64], t: &[f64]) -> Vec<f64> {
        let n = self.len();
        let faces = self.face_fluxes(BalanceKind::Energy, h, t);
        let mut ice = vec![0.0; n];
        for i in 1..n - 1 {
            let m_evap = self.evaporation_rate(i, t[i]).flux;
            let excess =
                self.flux_divergence(&faces, i) - self.energy_source_without_ice(i, t[i], m_evap);
            let enthalpy = self.ice_enthalpy(t[i]);
            ice[i] = if enthalpy.abs() > f64::EPSILON {
                excess / enthalpy
            } else {
                0.0
            };
        }
        ice[0] = ice[1];
        ice[n - 1] = ice[n - 2];
        ice
    }

    /// Clips `ice_rate` to `[0, available water]`, marching from the stagnation point.
    ///
    /// A node can freeze its own impingement net of evaporation plus whatever
    /// runback arrives from upstream, so the cumulative supply never goes negative.
    pub fn limit_ice_rate(&self, ice_rate: &mut [f64], evaporation: &[f64]) {
        let mut carry = 0.0;
        for i in 0..self.len() {
            let w = self.mesh.cell_width(i);
            let net = self.impingement[i] - evaporation[i];
            let available = carry / w + net.max(0.0);
            ice_rate[i] = ice_rate[i].max(0.0).min(available);
            carry = (carry + (net - ice_rate[i]) * w).max(0.0);
        }
    }
}
