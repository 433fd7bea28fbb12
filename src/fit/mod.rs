//! Line decomposition: the [`LineFinder`] seam and its built-in implementation.
//!
//! ```text
//!   velocity grid + flux
//!          │
//!          ▼
//!   ┌──────────────┐
//!   │  LineFinder   │  detect minima → seed components → refine
//!   └──────────────┘
//!          │
//!          ▼
//!   LineFit { components, equivalent_width, dv90 }
//! ```

use serde::{Deserialize, Serialize};

use crate::error::PairError;
use crate::ion::Ion;

pub mod finder;
pub mod stats;

pub use finder::OpticalDepthFinder;

// ---------------------------------------------------------------------------
// Fit configuration
// ---------------------------------------------------------------------------

/// Global settings handed to the line finder for every (sightline, ion) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitConfig {
    /// Absorber redshift.
    pub redshift: f64,
    /// Bounds on recovered log10 column density.
    pub column_density_bounds: (f64, f64),
    /// Bounds on recovered Doppler parameter (km/s).
    pub doppler_bounds: (f64, f64),
    /// Minimum flux decrement `1 - F` for a minimum to count as a detection.
    pub threshold: f64,
    /// Minimum separation between detected minima (km/s).
    pub min_distance: f64,
    /// Iteration budget of the refinement.
    pub max_iter: usize,
    /// Relative parameter change below which the refinement has converged.
    pub tolerance: f64,
}

impl Default for FitConfig {
    fn default() -> Self {
        FitConfig {
            redshift: 0.0,
            column_density_bounds: (10.0, 17.0),
            doppler_bounds: (3.0, 1.0e3),
            threshold: 0.01,
            min_distance: 2.0,
            max_iter: 2000,
            tolerance: 1.0e-6,
        }
    }
}

// ---------------------------------------------------------------------------
// Fit results
// ---------------------------------------------------------------------------

/// One component recovered by the line finder.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FittedComponent {
    /// log10 column density (cm^-2).
    pub col_dens: f64,
    /// Doppler parameter (km/s).
    pub doppler: f64,
    /// Velocity centroid (km/s).
    pub velocity: f64,
}

/// Outcome of decomposing one flux profile.
#[derive(Debug, Clone, PartialEq)]
pub struct LineFit {
    /// Components in recovery order.
    pub components: Vec<FittedComponent>,
    /// Equivalent width in km/s.
    pub equivalent_width: f64,
    /// Velocity width enclosing 90% of the optical depth (km/s).
    pub dv90: f64,
}

impl LineFit {
    /// Total log column density, `log10(Σ 10^N)`; `None` without components.
    pub fn total_column(&self) -> Option<f64> {
        stats::log_sum_columns(self.components.iter().map(|c| c.col_dens))
    }
}

/// Automated line finding and fitting on a flux profile.
///
/// Implementations must be deterministic for identical input.
pub trait LineFinder: Send + Sync {
    fn fit(
        &self,
        ion: Ion,
        velocity: &[f64],
        flux: &[f64],
        config: &FitConfig,
    ) -> Result<LineFit, PairError>;
}
