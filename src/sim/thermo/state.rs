use crate::vecutils;

/// Mutable per-node solution of the surface balances.
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceState {
    /// Liquid film height [m].
    pub film_height: Vec<f64>,
    /// Surface temperature [°C].
    pub temperature: Vec<f64>,
    /// Ice accretion rate [kg/(m²·s)].
    pub ice_rate: Vec<f64>,
    /// Evaporative/sublimating mass flux [kg/(m²·s)].
    pub evaporation: Vec<f64>,
    /// Water mass flux leaving each node per unit span [kg/(m·s)].
    ///
    /// Only the marching strategy produces this field.
    pub outflow: Option<Vec<f64>>,
}

impl SurfaceState {
    /// Neutral zero guess for `n` nodes.
    pub fn zeros(n: usize) -> Self {
        Self {
            film_height: vec![0.0; n],
            temperature: vec![0.0; n],
            ice_rate: vec![0.0; n],
            evaporation: vec![0.0; n],
            outflow: None,
        }
    }

    pub fn len(&self) -> usize {
        self.film_height.len()
    }

    pub fn is_empty(&self) -> bool {
        self.film_height.is_empty()
    }

    /// Index-reversed copy.
    pub fn mirrored(&self) -> Self {
        Self {
            film_height: vecutils::flip(&self.film_height),
            temperature: vecutils::flip(&self.temperature),
            ice_rate: vecutils::flip(&self.ice_rate),
            evaporation: vecutils::flip(&self.evaporation),
            outflow: self.outflow.as_deref().map(vecutils::flip),
        }
    }

    /// True if every field is finite.
    pub fn is_finite(&self) -> bool {
        self.film_height
            .iter()
            .chain(&self.temperature)
            .chain(&self.ice_rate)
            .chain(&self.evaporation)
            .all(|v| v.is_finite())
    }
}

/// Ordered residual norms, one per iteration. Diagnostic only.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConvergenceRecord {
    norms: Vec<f64>,
}

impl ConvergenceRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, norm: f64) {
        self.norms.push(norm);
    }

    pub fn norms(&self) -> &[f64] {
        &self.norms
    }

    pub fn len(&self) -> usize {
        self.norms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.norms.is_empty()
    }

    pub fn last(&self) -> Option<f64> {
        self.norms.last().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zeros() {
        let s = SurfaceState::zeros(4);
        assert_eq!(s.len(), 4);
        assert!(s.outflow.is_none());
        assert!(s.is_finite());
    }

    #[test]
    fn test_mirror_is_involutive() {
        let s = SurfaceState {
            film_height: vec![0.0, 1e-5, 2e-5],
            temperature: vec![-3.0, 0.0, 1.5],
            ice_rate: vec![1e-3, 5e-4, 0.0],
            evaporation: vec![1e-6, 2e-6, 3e-6],
            outflow: Some(vec![0.0, 1e-4, 2e-4]),
        };
        let m = s.mirrored();
        assert_eq!(m.temperature, vec![1.5, 0.0, -3.0]);
        assert_eq!(m.outflow.as_deref(), Some(&[2e-4, 1e-4, 0.0][..]));
        assert_eq!(m.mirrored(), s);
    }

    #[test]
    fn test_record() {
        let mut r = ConvergenceRecord::new();
        assert!(r.last().is_none());
        r.push(1.0);
        r.push(0.5);
        assert_eq!(r.norms(), &[1.0, 0.5]);
        assert_eq!(r.last(), Some(0.5));
    }
}
