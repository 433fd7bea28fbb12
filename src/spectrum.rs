//! Synthetic absorption spectra in velocity space.
//!
//! Each component contributes a Voigt optical-depth profile; the flux is
//! `exp(-Σ τ)`. Profiles use the Tepper-García (2006) approximation to the
//! Voigt-Hjerting function, which is accurate to ~1e-4 for the damping
//! parameters of metal lines.

use std::f64::consts::PI;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::data::model::Component;
use crate::error::PairError;
use crate::ion::Ion;

/// `sqrt(pi) e^2 / (m_e c)` for N in cm^-2, wavelength in Angstrom and b in km/s.
pub(crate) const TAU_PREFACTOR: f64 = 1.4974e-15;

/// Clipping range for log10 column densities fed to the synthesizer.
pub const LOG_N_LIMITS: (f64, f64) = (0.0, 23.0);
/// Clipping range for Doppler parameters (km/s) fed to the synthesizer.
pub const DOPPLER_LIMITS: (f64, f64) = (0.1, 1.0e4);

// ---------------------------------------------------------------------------
// Velocity grid
// ---------------------------------------------------------------------------

/// Half-open velocity grid `[start, stop)` sampled every `step` km/s.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VelocityGrid {
    pub start: f64,
    pub stop: f64,
    pub step: f64,
}

impl Default for VelocityGrid {
    fn default() -> Self {
        VelocityGrid {
            start: -500.0,
            stop: 500.0,
            step: 2.0,
        }
    }
}

impl VelocityGrid {
    /// Number of samples; zero for a degenerate grid.
    pub fn len(&self) -> usize {
        if !(self.step > 0.0) || !(self.stop > self.start) {
            return 0;
        }
        ((self.stop - self.start) / self.step).ceil() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sample points in km/s.
    pub fn points(&self) -> Vec<f64> {
        (0..self.len())
            .map(|i| self.start + i as f64 * self.step)
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Line profiles
// ---------------------------------------------------------------------------

/// Voigt-Hjerting function `H(a, u)`.
pub fn voigt_hjerting(a: f64, u: f64) -> f64 {
    let u2 = u * u;
    let h0 = (-u2).exp();
    if u2 < 1e-4 {
        // The expansion below cancels catastrophically near the line centre.
        return h0 - 2.0 * a / PI.sqrt() * (1.0 - 2.0 * u2);
    }
    let q = 1.5 / u2;
    let correction = h0 * h0 * (4.0 * u2 * u2 + 7.0 * u2 + 4.0 + q) - q - 1.0;
    h0 - a / (PI.sqrt() * u2) * correction
}

fn clip(value: f64, (lo, hi): (f64, f64)) -> f64 {
    value.clamp(lo, hi)
}

/// Clamp a component into the range the profile evaluation can handle.
pub fn sanitize_component(ion: Ion, component: &Component) -> Component {
    let clipped = Component {
        col_dens: clip(component.col_dens, LOG_N_LIMITS),
        doppler: clip(component.doppler, DOPPLER_LIMITS),
        velocity: component.velocity,
    };
    if clipped != *component {
        warn!(
            "{ion}: clipped component (logN {}, b {}) to (logN {}, b {})",
            component.col_dens, component.doppler, clipped.col_dens, clipped.doppler
        );
    }
    clipped
}

/// Optical depth of one component at velocity `v` (km/s).
pub fn optical_depth(ion: Ion, component: &Component, v: f64) -> f64 {
    let line = ion.transition();
    let b = component.doppler;
    let n = 10f64.powf(component.col_dens);
    let tau0 = TAU_PREFACTOR * n * line.f_value * line.wavelength / b;
    let a = line.gamma * line.wavelength * 1.0e-13 / (4.0 * PI * b);
    let u = (v - component.velocity) / b;
    (tau0 * voigt_hjerting(a, u)).max(0.0)
}

// ---------------------------------------------------------------------------
// Synthetic spectrum
// ---------------------------------------------------------------------------

/// Flux sampled on a velocity grid for one (sightline, ion) pair.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticSpectrum<'a> {
    pub velocity: &'a [f64],
    pub flux: Vec<f64>,
}

impl SyntheticSpectrum<'_> {
    /// Index of the first non-finite flux sample, if any.
    pub fn check_finite(&self) -> Result<(), PairError> {
        match self.flux.iter().position(|f| !f.is_finite()) {
            Some(index) => Err(PairError::NonFiniteFlux { index }),
            None => Ok(()),
        }
    }
}

/// Superpose all components of an ion on the velocity grid.
///
/// An empty component list yields unit flux everywhere. Components are
/// summed in the given order, so identical input gives identical output.
pub fn synthesize<'a>(ion: Ion, components: &[Component], velocity: &'a [f64]) -> SyntheticSpectrum<'a> {
    let sane: Vec<Component> = components
        .iter()
        .map(|c| sanitize_component(ion, c))
        .collect();

    let flux = velocity
        .iter()
        .map(|&v| {
            let tau: f64 = sane.iter().map(|c| optical_depth(ion, c, v)).sum();
            (-tau).exp()
        })
        .collect();

    SyntheticSpectrum { velocity, flux }
}
