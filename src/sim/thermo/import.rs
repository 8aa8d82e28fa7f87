//! Resampling of raw surface distributions onto the solver mesh.

use anyhow::Result;
use tracing::{debug, warn};

use super::boundary_layer::IntegralBoundaryLayerEstimator;
use super::config::{AlignmentMode, HeatTransferSource, SurfaceSide, ThermoConfig};
use super::mesh::{SurfaceCoefficients, SurfaceMesh};
use super::properties::{AirProperties, FluidScalars, KELVIN_OFFSET};
use crate::vecutils;

/// Half-width of the sample window searched for the minimum-shear stagnation point.
const STAGNATION_SEARCH: usize = 5;
/// Shear floor as a fraction of the largest shear magnitude.
const SHEAR_FLOOR_FRACTION: f64 = 0.01;

/// Geometry collaborator locating the stagnation point.
pub trait StagnationPoint {
    /// Chord-normalised arc-length of the stagnation point in raw table coordinates.
    fn stagnation_arc_length(&self) -> f64;
}

/// Stagnation point known up front.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedStagnation(pub f64);

impl StagnationPoint for FixedStagnation {
    fn stagnation_arc_length(&self) -> f64 {
        self.0
    }
}

/// Alternate source of static pressure along the surface.
pub trait StaticPressureField {
    /// Static pressure [Pa] at a stagnation-relative arc-length, if known there.
    fn static_pressure(&self, arc_length: f64) -> Option<f64>;
}

/// Boundary-layer edge columns of the six-column table.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeColumns {
    /// Edge temperature [K].
    pub temperature: Vec<f64>,
    /// Static pressure [Pa].
    pub pressure: Vec<f64>,
    /// Edge velocity [m/s].
    pub velocity: Vec<f64>,
}

/// Raw heat-transfer/skin-friction distribution as read from file.
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceTable {
    /// Chord-normalised arc-length in geometry coordinates.
    pub arc_length: Vec<f64>,
    /// Heat-transfer coefficient. Non-dimensional in legacy tables.
    pub heat_transfer: Vec<f64>,
    /// Skin-friction coefficient.
    pub skin_friction: Vec<f64>,
    /// Missing in legacy three-column tables.
    pub edge: Option<EdgeColumns>,
}

impl SurfaceTable {
    pub fn len(&self) -> usize {
        self.arc_length.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arc_length.is_empty()
    }

    pub fn is_legacy(&self) -> bool {
        self.edge.is_none()
    }

    pub fn validate(&self) -> Result<()> {
        let n = self.len();
        anyhow::ensure!(n >= 2, "Surface table needs at least 2 rows, got {n}");
        anyhow::ensure!(
            self.heat_transfer.len() == n && self.skin_friction.len() == n,
            "Surface table columns have inconsistent lengths"
        );
        if let Some(edge) = &self.edge {
            anyhow::ensure!(
                edge.temperature.len() == n && edge.pressure.len() == n && edge.velocity.len() == n,
                "Surface table edge columns have inconsistent lengths"
            );
        }
        check_increasing(&self.arc_length, "Surface table")
    }
}

/// Raw collection-efficiency distribution, stagnation-relative.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionEfficiencyTable {
    pub arc_length: Vec<f64>,
    pub beta: Vec<f64>,
}

impl CollectionEfficiencyTable {
    pub fn validate(&self) -> Result<()> {
        let n = self.arc_length.len();
        anyhow::ensure!(n >= 2, "Collection efficiency table needs at least 2 rows, got {n}");
        anyhow::ensure!(
            self.beta.len() == n,
            "Collection efficiency table columns have inconsistent lengths"
        );
        check_increasing(&self.arc_length, "Collection efficiency table")
    }
}

fn check_increasing(arc_length: &[f64], what: &str) -> Result<()> {
    for (i, w) in arc_length.windows(2).enumerate() {
        anyhow::ensure!(
            w[1] > w[0],
            "{what}: arc-length must be strictly increasing (rows {} and {})",
            i + 1,
            i + 2
        );
    }
    Ok(())
}

/// Raw sample range `[first, last]` spanning the imported segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportRange {
    pub first: usize,
    pub last: usize,
}

impl ImportRange {
    pub fn len(&self) -> usize {
        self.last - self.first + 1
    }

    pub fn is_empty(&self) -> bool {
        self.last < self.first
    }
}

/// Mesh and coefficients of one side, in the solver frame.
#[derive(Debug, Clone)]
pub struct ImportedSurface {
    pub side: SurfaceSide,
    pub mesh: SurfaceMesh,
    pub coefficients: SurfaceCoefficients,
    pub range: ImportRange,
    /// Stagnation arc-length the raw coordinates were shifted by.
    pub stagnation: f64,
}

#[derive(Debug, Clone, Copy)]
enum OutOfRange {
    Zero,
    Nearest,
}

/// Interpolates `(xs, ys)` at every target with the given fill policy.
fn resample(xs: &[f64], ys: &[f64], targets: &[f64], fill: OutOfRange) -> Vec<f64> {
    let n = xs.len();
    targets
        .iter()
        .map(|&x| match vecutils::interp_linear(xs, ys, x) {
            Some(v) => v,
            None => match fill {
                OutOfRange::Zero => 0.0,
                OutOfRange::Nearest if x < xs[0] => ys[0],
                OutOfRange::Nearest => ys[n - 1],
            },
        })
        .collect()
}

/// Index of the sample closest to `target`.
fn nearest_index(xs: &[f64], target: f64) -> usize {
    let mut best = 0;
    for (i, x) in xs.iter().enumerate() {
        if (x - target).abs() < (xs[best] - target).abs() {
            best = i;
        }
    }
    best
}

/// Builds solver meshes and coefficients from raw tables.
pub struct SurfaceFieldImporter<'a> {
    config: &'a ThermoConfig,
    fluid: &'a FluidScalars,
    air: &'a AirProperties,
    pressure_field: Option<&'a dyn StaticPressureField>,
}

impl<'a> SurfaceFieldImporter<'a> {
    pub fn new(config: &'a ThermoConfig, fluid: &'a FluidScalars, air: &'a AirProperties) -> Self {
        Self {
            config,
            fluid,
            air,
            pressure_field: None,
        }
    }

    /// Takes static pressure from `field` instead of the table column.
    pub fn with_pressure_field(mut self, field: &'a dyn StaticPressureField) -> Self {
        self.pressure_field = Some(field);
        self
    }

    /// Locates the raw segment covering the configured span and the stagnation point.
    fn locate(&self, table: &SurfaceTable, stagnation: f64) -> Result<(ImportRange, f64)> {
        let s = &table.arc_length;
        let (s_min, s_max) = self.config.side.span(self.config.span);
        let (lo, hi) = (stagnation + s_min, stagnation + s_max);
        anyhow::ensure!(
            lo >= s[0] && hi <= s[s.len() - 1],
            "Span [{lo}, {hi}] is outside the raw data range [{}, {}]",
            s[0],
            s[s.len() - 1]
        );
        let mut first = nearest_index(s, lo);
        let mut last = nearest_index(s, hi);
        let mut stagnation = stagnation;

        if self.config.alignment == AlignmentMode::Recomputed {
            let centre = match self.config.side {
                SurfaceSide::Upper => first,
                SurfaceSide::Lower => last,
            };
            let start = centre.saturating_sub(STAGNATION_SEARCH);
            let end = (centre + STAGNATION_SEARCH).min(s.len() - 1);
            let mut best = start;
            for i in start..=end {
                if table.skin_friction[i].abs() < table.skin_friction[best].abs() {
                    best = i;
                }
            }
            debug!(
                "Stagnation point moved from {} to {} (|cf| = {:.3e})",
                stagnation,
                s[best],
                table.skin_friction[best].abs()
            );
            match self.config.side {
                SurfaceSide::Upper => first = best,
                SurfaceSide::Lower => last = best,
            }
            stagnation = s[best];
        }

        anyhow::ensure!(
            first < last,
            "Span covers too few raw samples (first {first}, last {last})"
        );
        Ok((ImportRange { first, last }, stagnation))
    }

    /// Imports one surface side.
    pub fn import(
        &self,
        table: &SurfaceTable,
        beta: &CollectionEfficiencyTable,
        geometry: &dyn StagnationPoint,
    ) -> Result<ImportedSurface> {
        self.config.validate()?;
        self.fluid.validate()?;
        table.validate()?;
        beta.validate()?;

        let (range, stagnation) = self.locate(table, geometry.stagnation_arc_length())?;
        let segment = range.first..=range.last;
        let raw_s: Vec<f64> = table.arc_length[segment.clone()]
            .iter()
            .map(|s| s - stagnation)
            .collect();
        let coords = vecutils::linspace(raw_s[0], raw_s[raw_s.len() - 1], self.config.num_points);
        let mesh = SurfaceMesh::new(coords, self.fluid.chord)?;
        let s = mesh.coordinates();

        let fluid = self.fluid;
        let collection_efficiency = resample(&beta.arc_length, &beta.beta, s, OutOfRange::Nearest);
        if beta.arc_length[0] > s[0] || beta.arc_length[beta.arc_length.len() - 1] < s[s.len() - 1]
        {
            warn!("Collection efficiency table does not cover the mesh, extending edge values");
        }

        let scale = if table.is_legacy() {
            let p_over_rho = fluid.pressure / fluid.density;
            -fluid.density * p_over_rho.powf(1.5) / (KELVIN_OFFSET - fluid.temperature)
        } else {
            1.0
        };
        let ch = resample(&raw_s, &table.heat_transfer[segment.clone()], s, OutOfRange::Zero);
        let heat_transfer: Vec<f64> = ch.iter().map(|v| scale * v).collect();

        let q = fluid.dynamic_pressure();
        let cf = resample(&raw_s, &table.skin_friction[segment.clone()], s, OutOfRange::Zero);
        let shear: Vec<f64> = cf.iter().map(|c| q * c.abs()).collect();

        let n = mesh.len();
        let (edge_temperature, mut static_pressure, edge_velocity) = match &table.edge {
            Some(edge) => {
                let te = resample(&raw_s, &edge.temperature[segment.clone()], s, OutOfRange::Nearest);
                (
                    te.iter().map(|t| t - KELVIN_OFFSET).collect(),
                    resample(&raw_s, &edge.pressure[segment.clone()], s, OutOfRange::Nearest),
                    resample(&raw_s, &edge.velocity[segment], s, OutOfRange::Nearest),
                )
            }
            None => (
                vec![fluid.temperature_c(); n],
                vec![fluid.pressure; n],
                vec![fluid.velocity; n],
            ),
        };
        if let Some(field) = self.pressure_field {
            for (p, &si) in static_pressure.iter_mut().zip(s) {
                if let Some(value) = field.static_pressure(si) {
                    *p = value;
                }
            }
        }
        let recovery_temperature = edge_temperature
            .iter()
            .zip(&edge_velocity)
            .map(|(&t, &u)| self.air.recovery_temperature(t, u))
            .collect();

        let mut coefficients = SurfaceCoefficients {
            collection_efficiency,
            shear,
            heat_transfer,
            edge_temperature,
            edge_velocity,
            static_pressure,
            recovery_temperature,
        };
        coefficients.apply_shear_floor(SHEAR_FLOOR_FRACTION);

        let (mesh, mut coefficients) = match self.config.side {
            SurfaceSide::Upper => (mesh, coefficients),
            SurfaceSide::Lower => (mesh.mirrored(), coefficients.mirrored()),
        };

        if let HeatTransferSource::IntegralBoundaryLayer { roughness_height } =
            self.config.heat_transfer
        {
            let phys = mesh.physical_coordinates();
            let distance: Vec<f64> = phys.iter().map(|x| x - phys[0]).collect();
            let estimator =
                IntegralBoundaryLayerEstimator::new(*self.air, fluid.density, roughness_height);
            let profile = estimator.estimate(&distance, &coefficients.edge_velocity)?;
            coefficients.heat_transfer = profile.heat_transfer;
        }

        debug!(
            "Imported {} side: raw samples {}..={}, {} mesh nodes",
            self.config.side.tag(),
            range.first,
            range.last,
            mesh.len()
        );
        Ok(ImportedSurface {
            side: self.config.side,
            mesh,
            coefficients,
            range,
            stagnation,
        })
    }

    /// Interpolates an auxiliary raw field onto an imported surface's mesh.
    ///
    /// `raw_arc_length` uses the same geometry coordinates as the surface
    /// table; values are restricted to the surface's import range and
    /// returned in the solver frame.
    pub fn resample_auxiliary(
        &self,
        surface: &ImportedSurface,
        raw_arc_length: &[f64],
        values: &[f64],
    ) -> Result<Vec<f64>> {
        let ImportRange { first, last } = surface.range;
        anyhow::ensure!(
            raw_arc_length.len() == values.len(),
            "Auxiliary field has {} values for {} coordinates",
            values.len(),
            raw_arc_length.len()
        );
        anyhow::ensure!(
            last < raw_arc_length.len(),
            "Auxiliary field has {} samples, import range ends at {last}",
            raw_arc_length.len()
        );
        check_increasing(raw_arc_length, "Auxiliary field")?;
        let xs: Vec<f64> = raw_arc_length[first..=last]
            .iter()
            .map(|s| s - surface.stagnation)
            .collect();
        let out = match surface.side {
            SurfaceSide::Upper => resample(
                &xs,
                &values[first..=last],
                surface.mesh.coordinates(),
                OutOfRange::Zero,
            ),
            SurfaceSide::Lower => {
                let frame = surface.mesh.mirrored();
                vecutils::flip(&resample(
                    &xs,
                    &values[first..=last],
                    frame.coordinates(),
                    OutOfRange::Zero,
                ))
            }
        };
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Raw table on `[-1, 1]` with the stagnation point at `stagnation`.
    fn table(n: usize, stagnation: f64, legacy: bool) -> SurfaceTable {
        let arc_length = vecutils::linspace(-1.0, 1.0, n);
        let skin_friction = arc_length.iter().map(|s| 0.01 * (s - stagnation)).collect();
        let edge = (!legacy).then(|| EdgeColumns {
            temperature: vec![263.15; n],
            pressure: vec![90_000.0; n],
            velocity: arc_length.iter().map(|s| 100.0 * (s - stagnation).abs()).collect(),
        });
        SurfaceTable {
            heat_transfer: vec![300.0; n],
            arc_length,
            skin_friction,
            edge,
        }
    }

    fn beta_table() -> CollectionEfficiencyTable {
        CollectionEfficiencyTable {
            arc_length: vec![-0.1, 0.0, 0.1],
            beta: vec![0.0, 0.8, 0.0],
        }
    }

    fn config(side: SurfaceSide, alignment: AlignmentMode) -> ThermoConfig {
        let mut cfg = ThermoConfig::new();
        cfg.side = side;
        cfg.alignment = alignment;
        cfg.num_points = 41;
        cfg
    }

    #[test]
    fn test_upper_import() {
        let cfg = config(SurfaceSide::Upper, AlignmentMode::Direct);
        let fluid = FluidScalars::default();
        let air = AirProperties::default();
        let importer = SurfaceFieldImporter::new(&cfg, &fluid, &air);
        let surf = importer
            .import(&table(201, 0.0, false), &beta_table(), &FixedStagnation(0.0))
            .unwrap();
        let s = surf.mesh.coordinates();
        assert_eq!(s.len(), 41);
        assert!(s[0].abs() < 1e-12);
        assert!((s[40] - 0.4).abs() < 1e-12);
        let c = &surf.coefficients;
        assert!((c.collection_efficiency[0] - 0.8).abs() < 1e-9);
        // Beyond the beta table, the edge value is kept.
        assert_eq!(c.collection_efficiency[40], 0.0);
        assert!(c.shear.iter().all(|&t| t > 0.0));
        assert!((c.edge_temperature[10] + 10.0).abs() < 1e-9);
        assert!(c.heat_transfer.iter().all(|&h| (h - 300.0).abs() < 1e-9));
        let expected = air.recovery_temperature(c.edge_temperature[20], c.edge_velocity[20]);
        assert!((c.recovery_temperature[20] - expected).abs() < 1e-12);
    }

    #[test]
    fn test_lower_import_is_mirrored() {
        let cfg = config(SurfaceSide::Lower, AlignmentMode::Direct);
        let fluid = FluidScalars::default();
        let air = AirProperties::default();
        let importer = SurfaceFieldImporter::new(&cfg, &fluid, &air);
        let surf = importer
            .import(&table(201, 0.1, false), &beta_table(), &FixedStagnation(0.1))
            .unwrap();
        let s = surf.mesh.coordinates();
        assert!(s[0].abs() < 1e-12);
        assert!((s[40] - 0.4).abs() < 1e-12);
        // Edge velocity grows away from the stagnation point in the solver frame.
        let ue = &surf.coefficients.edge_velocity;
        assert!(ue[0] < 1e-9 && ue[40] > ue[0]);
    }

    #[test]
    fn test_end_nodes_are_interpolated_for_any_offset() {
        let fluid = FluidScalars::default();
        let air = AirProperties::default();
        let q = fluid.dynamic_pressure();
        for side in [SurfaceSide::Upper, SurfaceSide::Lower] {
            let mut cfg = config(side, AlignmentMode::Direct);
            cfg.num_points = 50;
            let importer = SurfaceFieldImporter::new(&cfg, &fluid, &air);
            for k in 0..200 {
                let stagnation = -0.02 + 2e-4 * k as f64;
                let surf = importer
                    .import(
                        &table(333, stagnation, true),
                        &beta_table(),
                        &FixedStagnation(stagnation),
                    )
                    .unwrap();
                let c = &surf.coefficients;
                let s = surf.mesh.coordinates();
                let h0 = c.heat_transfer[0];
                assert!(h0 != 0.0);
                for (i, &h) in c.heat_transfer.iter().enumerate() {
                    assert!(
                        (h - h0).abs() <= 1e-9 * h0.abs(),
                        "{side:?} offset {stagnation}: h_c[{i}] = {h}"
                    );
                }
                let expected = q * 0.01 * s[49].abs();
                assert!(
                    (c.shear[49] - expected).abs() <= 1e-9 * expected,
                    "{side:?} offset {stagnation}: shear {} vs {expected}",
                    c.shear[49]
                );
            }
        }
    }

    #[test]
    fn test_recomputed_alignment_finds_zero_shear() {
        let cfg = config(SurfaceSide::Upper, AlignmentMode::Recomputed);
        let fluid = FluidScalars::default();
        let air = AirProperties::default();
        let importer = SurfaceFieldImporter::new(&cfg, &fluid, &air);
        // True stagnation at s = 0.02, geometry reports 0.0.
        let surf = importer
            .import(&table(201, 0.02, false), &beta_table(), &FixedStagnation(0.0))
            .unwrap();
        assert!((surf.stagnation - 0.02).abs() < 1e-12);
        assert_eq!(surf.range.first, 102);
        assert!(surf.mesh.coordinates()[0].abs() < 1e-12);
    }

    #[test]
    fn test_legacy_table_scaling_and_defaults() {
        let cfg = config(SurfaceSide::Upper, AlignmentMode::Direct);
        let fluid = FluidScalars::default();
        let air = AirProperties::default();
        let importer = SurfaceFieldImporter::new(&cfg, &fluid, &air);
        let surf = importer
            .import(&table(201, 0.0, true), &beta_table(), &FixedStagnation(0.0))
            .unwrap();
        let c = &surf.coefficients;
        let p_over_rho: f64 = fluid.pressure / fluid.density;
        let scale = -fluid.density * p_over_rho.powf(1.5) / (KELVIN_OFFSET - fluid.temperature);
        assert!((c.heat_transfer[5] - 300.0 * scale).abs() < 1e-9 * scale.abs());
        assert!(c.static_pressure.iter().all(|&p| p == fluid.pressure));
        assert!(c.edge_velocity.iter().all(|&u| u == fluid.velocity));
    }

    struct Uniform(f64);

    impl StaticPressureField for Uniform {
        fn static_pressure(&self, _arc_length: f64) -> Option<f64> {
            Some(self.0)
        }
    }

    #[test]
    fn test_pressure_field_override() {
        let cfg = config(SurfaceSide::Upper, AlignmentMode::Direct);
        let fluid = FluidScalars::default();
        let air = AirProperties::default();
        let field = Uniform(75_000.0);
        let importer = SurfaceFieldImporter::new(&cfg, &fluid, &air).with_pressure_field(&field);
        let surf = importer
            .import(&table(201, 0.0, false), &beta_table(), &FixedStagnation(0.0))
            .unwrap();
        assert!(surf.coefficients.static_pressure.iter().all(|&p| p == 75_000.0));
    }

    #[test]
    fn test_span_outside_data_is_an_error() {
        let mut cfg = config(SurfaceSide::Upper, AlignmentMode::Direct);
        cfg.span = 2.0;
        let fluid = FluidScalars::default();
        let air = AirProperties::default();
        let importer = SurfaceFieldImporter::new(&cfg, &fluid, &air);
        let result = importer.import(&table(201, 0.0, false), &beta_table(), &FixedStagnation(0.0));
        assert!(result.is_err());
    }

    #[test]
    fn test_integral_boundary_layer_replaces_heat_transfer() {
        let mut cfg = config(SurfaceSide::Upper, AlignmentMode::Direct);
        cfg.heat_transfer = HeatTransferSource::IntegralBoundaryLayer {
            roughness_height: 5e-4,
        };
        let fluid = FluidScalars::default();
        let air = AirProperties::default();
        let importer = SurfaceFieldImporter::new(&cfg, &fluid, &air);
        let surf = importer
            .import(&table(201, 0.0, false), &beta_table(), &FixedStagnation(0.0))
            .unwrap();
        let hc = &surf.coefficients.heat_transfer;
        assert!(hc.iter().all(|h| h.is_finite() && *h > 0.0));
        assert!(hc.iter().any(|&h| (h - 300.0).abs() > 1.0));
    }

    #[test]
    fn test_resample_auxiliary() {
        let cfg = config(SurfaceSide::Lower, AlignmentMode::Direct);
        let fluid = FluidScalars::default();
        let air = AirProperties::default();
        let importer = SurfaceFieldImporter::new(&cfg, &fluid, &air);
        let raw = table(201, 0.0, false);
        let surf = importer
            .import(&raw, &beta_table(), &FixedStagnation(0.0))
            .unwrap();
        // A field linear in raw arc-length comes back as -s in the solver frame.
        let aux = importer
            .resample_auxiliary(&surf, &raw.arc_length, &raw.arc_length)
            .unwrap();
        for (a, s) in aux.iter().zip(surf.mesh.coordinates()) {
            assert!((a + s).abs() < 1e-12, "{a} vs {s}");
        }
        assert!(importer.resample_auxiliary(&surf, &[0.0, 1.0], &[0.0, 1.0]).is_err());
    }

    #[test]
    fn test_nearest_index() {
        assert_eq!(nearest_index(&[0.0, 1.0, 2.0], 1.4), 1);
        assert_eq!(nearest_index(&[0.0, 1.0, 2.0], -5.0), 0);
    }
}
