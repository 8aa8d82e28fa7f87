use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Specific gas constant of dry air [J/(kg·K)].
pub const R_AIR: f64 = 287.058;

/// Offset between Kelvin and Celsius.
pub const KELVIN_OFFSET: f64 = 273.15;

/// Thermophysical properties of water and ice.
///
/// Defaults are taken at 0 °C and 100 kPa.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaterProperties {
    /// Liquid density [kg/m³].
    pub density: f64,
    /// Liquid dynamic viscosity [Pa·s].
    pub viscosity: f64,
    /// Liquid specific heat [J/(kg·K)].
    pub specific_heat: f64,
    /// Ice specific heat [J/(kg·K)].
    pub ice_specific_heat: f64,
    /// Latent heat of fusion [J/kg].
    pub latent_fusion: f64,
    /// Latent heat of evaporation [J/kg].
    pub latent_evaporation: f64,
    /// Latent heat of sublimation [J/kg].
    pub latent_sublimation: f64,
}

impl WaterProperties {
    pub fn new() -> Self {
        Self {
            density: 1000.0,
            viscosity: 1.787e-3,
            specific_heat: 4217.6,
            ice_specific_heat: 2093.0,
            latent_fusion: 334_774.0,
            latent_evaporation: 2.50e6,
            latent_sublimation: 2.834e6,
        }
    }

    /// Latent heat of the vapour phase change at `surface_temperature` [°C].
    ///
    /// Liquid surfaces evaporate, frozen surfaces sublimate.
    pub fn latent_vaporization(&self, surface_temperature: f64) -> f64 {
        if surface_temperature >= 0.0 {
            self.latent_evaporation
        } else {
            self.latent_sublimation
        }
    }
}

impl Default for WaterProperties {
    fn default() -> Self {
        Self::new()
    }
}

/// Properties of the surrounding air used by the boundary-layer and
/// evaporation submodels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AirProperties {
    /// Specific heat at constant pressure [J/(kg·K)].
    pub specific_heat: f64,
    /// Dynamic viscosity [Pa·s].
    pub viscosity: f64,
    /// Thermal conductivity [W/(m·K)].
    pub conductivity: f64,
    /// Laminar Prandtl number.
    pub prandtl: f64,
    /// Turbulent Prandtl number.
    pub turbulent_prandtl: f64,
    /// Schmidt number of water vapour in air.
    pub schmidt: f64,
}

impl AirProperties {
    pub fn new() -> Self {
        Self {
            specific_heat: 1005.0,
            viscosity: 1.72e-5,
            conductivity: 0.0242,
            prandtl: 0.71,
            turbulent_prandtl: 0.9,
            schmidt: 0.6,
        }
    }

    /// Laminar recovery factor `r = sqrt(Pr)`.
    pub fn recovery_factor(&self) -> f64 {
        self.prandtl.sqrt()
    }

    /// Recovery temperature for a flow at `temperature` [°C] moving at `velocity` [m/s].
    pub fn recovery_temperature(&self, temperature: f64, velocity: f64) -> f64 {
        temperature + self.recovery_factor() * velocity * velocity / (2.0 * self.specific_heat)
    }
}

impl Default for AirProperties {
    fn default() -> Self {
        Self::new()
    }
}

/// Free-stream and reference quantities supplied by the flow solver.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FluidScalars {
    /// Free-stream density [kg/m³].
    pub density: f64,
    /// Free-stream static pressure [Pa].
    pub pressure: f64,
    /// Free-stream static temperature [K].
    pub temperature: f64,
    /// Liquid water content [kg/m³].
    pub liquid_water_content: f64,
    /// Free-stream velocity [m/s].
    pub velocity: f64,
    /// Droplet temperature at impact [°C].
    pub droplet_temperature: f64,
    /// Droplet impact velocity [m/s].
    pub droplet_velocity: f64,
    /// Reference chord [m].
    pub chord: f64,
    /// Ambient relative humidity (0..1).
    #[serde(default = "default_relative_humidity")]
    pub relative_humidity: f64,
}

fn default_relative_humidity() -> f64 {
    1.0
}

impl FluidScalars {
    /// Builds scalars from ambient pressure and temperature using the ideal-gas law.
    pub fn from_ambient(
        pressure: f64,
        temperature: f64,
        velocity: f64,
        liquid_water_content: f64,
        chord: f64,
    ) -> Self {
        Self {
            density: pressure / (R_AIR * temperature),
            pressure,
            temperature,
            liquid_water_content,
            velocity,
            droplet_temperature: temperature - KELVIN_OFFSET,
            droplet_velocity: 0.8 * velocity,
            chord,
            relative_humidity: 1.0,
        }
    }

    /// Free-stream static temperature in °C.
    pub fn temperature_c(&self) -> f64 {
        self.temperature - KELVIN_OFFSET
    }

    /// Free-stream dynamic pressure `0.5·rho·U²` [Pa].
    pub fn dynamic_pressure(&self) -> f64 {
        0.5 * self.density * self.velocity * self.velocity
    }

    /// Impinging water mass flux for a local collection efficiency [kg/(m²·s)].
    pub fn impingement_flux(&self, collection_efficiency: f64) -> f64 {
        collection_efficiency * self.liquid_water_content * self.velocity
    }

    /// Free-stream recovery temperature [°C].
    pub fn recovery_temperature_c(&self, air: &AirProperties) -> f64 {
        air.recovery_temperature(self.temperature_c(), self.velocity)
    }

    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.density > 0.0, "Free-stream density must be > 0");
        anyhow::ensure!(self.pressure > 0.0, "Free-stream pressure must be > 0");
        anyhow::ensure!(self.temperature > 0.0, "Free-stream temperature must be > 0 K");
        anyhow::ensure!(self.chord > 0.0, "Reference chord must be > 0");
        anyhow::ensure!(
            self.liquid_water_content >= 0.0,
            "Liquid water content must be >= 0"
        );
        anyhow::ensure!(
            (0.0..=1.0).contains(&self.relative_humidity),
            "Relative humidity must be within [0, 1], got {}",
            self.relative_humidity
        );
        Ok(())
    }
}

impl Default for FluidScalars {
    /// Representative rime/glaze icing condition: -10 °C, 100 m/s, LWC 0.55 g/m³.
    fn default() -> Self {
        Self::from_ambient(101_325.0, 263.15, 100.0, 5.5e-4, 0.5334)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ideal_gas_density() {
        let f = FluidScalars::from_ambient(101_325.0, 273.15, 50.0, 1e-3, 1.0);
        assert!((f.density - 1.2922).abs() < 1e-3, "density = {}", f.density);
        assert!(f.temperature_c().abs() < 1e-12);
    }

    #[test]
    fn test_recovery_temperature_exceeds_static() {
        let air = AirProperties::default();
        let f = FluidScalars::default();
        let t_rec = f.recovery_temperature_c(&air);
        // r * U^2 / (2 cp) = 0.8426 * 1e4 / 2010 ~ 4.19 K
        assert!((t_rec - f.temperature_c() - 4.19).abs() < 0.01, "t_rec = {t_rec}");
    }

    #[test]
    fn test_latent_heat_switches_at_freezing() {
        let w = WaterProperties::default();
        assert_eq!(w.latent_vaporization(1.0), w.latent_evaporation);
        assert_eq!(w.latent_vaporization(-1.0), w.latent_sublimation);
    }

    #[test]
    fn test_validate_rejects_bad_humidity() {
        let mut f = FluidScalars::default();
        f.relative_humidity = 1.5;
        assert!(f.validate().is_err());
    }

    #[test]
    fn test_deserialize_defaults_humidity() {
        let json = r#"{
            "density": 1.3, "pressure": 1e5, "temperature": 263.15,
            "liquid_water_content": 5.5e-4, "velocity": 100.0,
            "droplet_temperature": -10.0, "droplet_velocity": 80.0, "chord": 0.5
        }"#;
        let f: FluidScalars = serde_json::from_str(json).unwrap();
        assert_eq!(f.relative_humidity, 1.0);
    }
}
