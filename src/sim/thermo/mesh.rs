use anyhow::Result;

use crate::vecutils;

/// One-dimensional arc-length mesh wrapping one side of the body.
///
/// Coordinates are chord-normalised and measured from the stagnation point.
/// The solver always works in a frame where coordinates increase away from
/// the stagnation point; the lower side is mirrored back on output.
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceMesh {
    coordinates: Vec<f64>,
    /// Reference chord [m].
    chord: f64,
}

impl SurfaceMesh {
    /// Creates a mesh from strictly increasing coordinates.
    pub fn new(coordinates: Vec<f64>, chord: f64) -> Result<Self> {
        anyhow::ensure!(
            coordinates.len() >= 3,
            "Surface mesh needs at least 3 nodes, got {}",
            coordinates.len()
        );
        anyhow::ensure!(chord > 0.0, "Chord must be > 0, got {chord}");
        for (i, w) in coordinates.windows(2).enumerate() {
            anyhow::ensure!(
                w[1] > w[0],
                "Surface mesh coordinates must be strictly increasing (node {} -> {}: {} -> {})",
                i,
                i + 1,
                w[0],
                w[1]
            );
        }
        Ok(Self { coordinates, chord })
    }

    /// Uniform mesh of `n` nodes spanning `[start, end]`.
    pub fn uniform(start: f64, end: f64, n: usize, chord: f64) -> Result<Self> {
        Self::new(vecutils::linspace(start, end, n), chord)
    }

    pub fn len(&self) -> usize {
        self.coordinates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coordinates.is_empty()
    }

    pub fn coordinates(&self) -> &[f64] {
        &self.coordinates
    }

    pub fn chord(&self) -> f64 {
        self.chord
    }

    /// Physical arc-length of every node [m].
    pub fn physical_coordinates(&self) -> Vec<f64> {
        self.coordinates.iter().map(|s| s * self.chord).collect()
    }

    /// Physical distance between node `i` and node `i + 1` [m].
    pub fn spacing(&self, i: usize) -> f64 {
        self.chord * (self.coordinates[i + 1] - self.coordinates[i])
    }

    /// Physical width of the control volume around node `i` [m].
    ///
    /// Interior nodes own half of each neighbouring interval; the end nodes own
    /// a half interval.
    pub fn cell_width(&self, i: usize) -> f64 {
        let n = self.len();
        if i == 0 {
            0.5 * self.spacing(0)
        } else if i == n - 1 {
            0.5 * self.spacing(n - 2)
        } else {
            0.5 * (self.spacing(i - 1) + self.spacing(i))
        }
    }

    /// Index-reversed, sign-flipped copy of this mesh.
    pub fn mirrored(&self) -> Self {
        Self {
            coordinates: self.coordinates.iter().rev().map(|s| -s).collect(),
            chord: self.chord,
        }
    }
}

/// Per-node aerodynamic and thermal fields, fixed once imported.
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceCoefficients {
    /// Collection efficiency (beta).
    pub collection_efficiency: Vec<f64>,
    /// Wall shear stress driving the film [Pa].
    pub shear: Vec<f64>,
    /// Convective heat-transfer coefficient [W/(m²·K)].
    pub heat_transfer: Vec<f64>,
    /// Boundary-layer edge temperature [°C].
    pub edge_temperature: Vec<f64>,
    /// Boundary-layer edge velocity [m/s].
    pub edge_velocity: Vec<f64>,
    /// Static pressure [Pa].
    pub static_pressure: Vec<f64>,
    /// Recovery temperature [°C].
    pub recovery_temperature: Vec<f64>,
}

impl SurfaceCoefficients {
    pub fn len(&self) -> usize {
        self.shear.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shear.is_empty()
    }

    /// Checks that every field has `n` entries.
    pub fn check_len(&self, n: usize) -> Result<()> {
        let fields: [(&str, &Vec<f64>); 7] = [
            ("collection_efficiency", &self.collection_efficiency),
            ("shear", &self.shear),
            ("heat_transfer", &self.heat_transfer),
            ("edge_temperature", &self.edge_temperature),
            ("edge_velocity", &self.edge_velocity),
            ("static_pressure", &self.static_pressure),
            ("recovery_temperature", &self.recovery_temperature),
        ];
        for (name, field) in fields {
            anyhow::ensure!(
                field.len() == n,
                "Coefficient {name} has {} entries, expected {n}",
                field.len()
            );
        }
        Ok(())
    }

    /// Raises every shear value to at least `fraction` of the largest magnitude.
    ///
    /// Film fluxes scale with shear, so near-zero values make the balances singular.
    pub fn apply_shear_floor(&mut self, fraction: f64) {
        let floor = fraction * vecutils::max_abs(&self.shear);
        for tau in self.shear.iter_mut() {
            if tau.abs() < floor {
                *tau = floor;
            }
        }
    }

    /// Index-reversed copy of every field.
    pub fn mirrored(&self) -> Self {
        Self {
            collection_efficiency: vecutils::flip(&self.collection_efficiency),
            shear: vecutils::flip(&self.shear),
            heat_transfer: vecutils::flip(&self.heat_transfer),
            edge_temperature: vecutils::flip(&self.edge_temperature),
            edge_velocity: vecutils::flip(&self.edge_velocity),
            static_pressure: vecutils::flip(&self.static_pressure),
            recovery_temperature: vecutils::flip(&self.recovery_temperature),
        }
    }

    /// Uniform coefficients, mostly useful for tests and synthetic cases.
    #[allow(clippy::too_many_arguments)]
    pub fn uniform(
        n: usize,
        collection_efficiency: f64,
        shear: f64,
        heat_transfer: f64,
        edge_temperature: f64,
        edge_velocity: f64,
        static_pressure: f64,
        recovery_temperature: f64,
    ) -> Self {
        Self {
            collection_efficiency: vec![collection_efficiency; n],
            shear: vec![shear; n],
            heat_transfer: vec![heat_transfer; n],
            edge_temperature: vec![edge_temperature; n],
            edge_velocity: vec![edge_velocity; n],
            static_pressure: vec![static_pressure; n],
            recovery_temperature: vec![recovery_temperature; n],
        }
    }
}
