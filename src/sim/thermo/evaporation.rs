//! Evaporation and sublimation mass transfer.
//!
//! Uses the Chilton–Colburn analogy between heat and mass transfer with an
//! empirical cubic fit of the saturation vapour pressure over a linear
//! temperature transform (`T' = 72 + 1.8·T`, i.e. degrees Fahrenheit shifted).

use super::properties::{AirProperties, FluidScalars};

/// Ratio of molecular weights of water vapour and dry air.
const MOLECULAR_WEIGHT_RATIO: f64 = 0.622;

/// Surface temperature substituted for NaN inputs [°C].
const NOMINAL_SURFACE_TEMPERATURE: f64 = 0.0;

/// Saturation vapour pressure [Pa] at `temperature` [°C].
pub fn saturation_pressure(temperature: f64) -> f64 {
    let t = transformed_temperature(temperature);
    3386.0 * (0.0039 + 6.8096e-6 * t * t + 3.5579e-7 * t * t * t)
}

/// Derivative of [`saturation_pressure`] with respect to temperature [Pa/K].
pub fn saturation_pressure_derivative(temperature: f64) -> f64 {
    let raw = 72.0 + 1.8 * temperature;
    if raw <= 0.0 {
        return 0.0;
    }
    3386.0 * 1.8 * (2.0 * 6.8096e-6 * raw + 3.0 * 3.5579e-7 * raw * raw)
}

fn transformed_temperature(temperature: f64) -> f64 {
    // The cubic fit is only meaningful above -40 °C.
    (72.0 + 1.8 * temperature).max(0.0)
}

/// Local inputs to the evaporation correlation.
#[derive(Debug, Clone, Copy)]
pub struct EvaporationInputs {
    /// Heat-transfer coefficient [W/(m²·K)].
    pub heat_transfer: f64,
    /// Static pressure at the boundary-layer edge [Pa].
    pub static_pressure: f64,
    /// Boundary-layer edge temperature [°C].
    pub edge_temperature: f64,
    /// Impinging water mass flux [kg/(m²·s)].
    pub impingement: f64,
}

/// Evaporative flux and its temperature derivative.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvaporationRate {
    /// Mass flux leaving the surface [kg/(m²·s)].
    pub flux: f64,
    /// `d(flux)/dT_s` [kg/(m²·s·K)]. Zero where the flux is clipped.
    pub derivative: f64,
}

impl EvaporationRate {
    const ZERO: Self = Self {
        flux: 0.0,
        derivative: 0.0,
    };
}

/// Empirical mass-transfer submodel.
#[derive(Debug, Clone, Copy)]
pub struct EvaporationModel {
    relative_humidity: f64,
    /// `(h_c/c_p)` multiplier: `(Pr/Sc)^(2/3)·0.622/c_p`.
    transfer_factor: f64,
    enabled: bool,
}

impl EvaporationModel {
    pub fn new(fluid: &FluidScalars, air: &AirProperties, enabled: bool) -> Self {
        let lewis = (air.prandtl / air.schmidt).powf(2.0 / 3.0);
        Self {
            relative_humidity: fluid.relative_humidity,
            transfer_factor: lewis * MOLECULAR_WEIGHT_RATIO / air.specific_heat,
            enabled,
        }
    }

    /// A model that always returns zero flux.
    pub fn disabled() -> Self {
        Self {
            relative_humidity: 1.0,
            transfer_factor: 0.0,
            enabled: false,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Evaporative flux at surface temperature `ts` [°C].
    ///
    /// The result is clipped to `[0, impingement]` so a node never loses more
    /// water to the air than it receives.
    pub fn compute(&self, inputs: &EvaporationInputs, ts: f64) -> EvaporationRate {
        if !self.enabled || inputs.impingement <= 0.0 || inputs.heat_transfer <= 0.0 {
            return EvaporationRate::ZERO;
        }
        let ts = if ts.is_nan() {
            NOMINAL_SURFACE_TEMPERATURE
        } else {
            ts
        };

        let e_surface = saturation_pressure(ts);
        let e_ambient = self.relative_humidity * saturation_pressure(inputs.edge_temperature);
        let denominator = inputs.static_pressure - e_surface;
        if denominator <= 0.0 {
            // Surface at or above boiling for the local pressure.
            return EvaporationRate {
                flux: inputs.impingement,
                derivative: 0.0,
            };
        }

        let k = inputs.heat_transfer * self.transfer_factor;
        let flux = k * (e_surface - e_ambient) / denominator;
        if flux <= 0.0 {
            return EvaporationRate::ZERO;
        }
        if flux >= inputs.impingement {
            return EvaporationRate {
                flux: inputs.impingement,
                derivative: 0.0,
            };
        }
        let derivative = k * saturation_pressure_derivative(ts)
            * (inputs.static_pressure - e_ambient)
            / (denominator * denominator);
        EvaporationRate { flux, derivative }
    }

    /// Flux only.
    pub fn flux(&self, inputs: &EvaporationInputs, ts: f64) -> f64 {
        self.compute(inputs, ts).flux
    }
}
