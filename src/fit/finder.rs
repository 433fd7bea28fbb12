use std::f64::consts::PI;

use log::debug;

use super::stats::{
    apparent_optical_depth, column_from_integrated_tau, delta_v_90, equivalent_width,
    sample_widths,
};
use super::{FitConfig, FittedComponent, LineFinder, LineFit};
use crate::error::PairError;
use crate::ion::Ion;

// ---------------------------------------------------------------------------
// OpticalDepthFinder
// ---------------------------------------------------------------------------

/// Decomposes a flux profile into Gaussian optical-depth components.
///
/// 1. convert flux to apparent optical depth;
/// 2. find flux minima deeper than the threshold, at least `min_distance` apart;
/// 3. seed one component per minimum from the moments of its segment;
/// 4. refine all components jointly by expectation-maximisation on τ.
///
/// Saturated pixels are floored at `flux_floor`, so column densities of
/// saturated lines are lower limits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OpticalDepthFinder {
    pub flux_floor: f64,
}

impl Default for OpticalDepthFinder {
    fn default() -> Self {
        OpticalDepthFinder { flux_floor: 1.0e-5 }
    }
}

/// Working parameters of one Gaussian in τ: integrated optical depth,
/// centroid and Doppler width.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Gaussian {
    area: f64,
    centre: f64,
    width: f64,
}

impl Gaussian {
    fn eval(&self, v: f64) -> f64 {
        let u = (v - self.centre) / self.width;
        self.area / (PI.sqrt() * self.width) * (-u * u).exp()
    }
}

impl LineFinder for OpticalDepthFinder {
    fn fit(
        &self,
        ion: Ion,
        velocity: &[f64],
        flux: &[f64],
        config: &FitConfig,
    ) -> Result<LineFit, PairError> {
        if velocity.len() != flux.len() {
            return Err(PairError::GridMismatch {
                grid: velocity.len(),
                flux: flux.len(),
            });
        }
        if let Some(index) = flux.iter().position(|f| !f.is_finite()) {
            return Err(PairError::NonFiniteFlux { index });
        }

        let tau = apparent_optical_depth(flux, self.flux_floor);
        let widths = sample_widths(velocity);
        let equivalent_width = equivalent_width(velocity, flux);
        let dv90 = delta_v_90(velocity, &tau);

        let minima = find_minima(velocity, flux, config.threshold, config.min_distance);
        debug!("{ion}: {} absorption minima above threshold", minima.len());
        if minima.is_empty() {
            return Ok(LineFit {
                components: Vec::new(),
                equivalent_width,
                dv90,
            });
        }

        let seeds = seed_components(velocity, flux, &tau, &widths, &minima, config);
        let refined = refine(velocity, &tau, &widths, seeds, config)?;

        let (n_lo, n_hi) = config.column_density_bounds;
        let (b_lo, b_hi) = config.doppler_bounds;
        let components = refined
            .into_iter()
            .filter_map(|g| {
                let col_dens = column_from_integrated_tau(ion, g.area).log10();
                if !col_dens.is_finite() || col_dens < n_lo {
                    debug!("{ion}: dropping component at {:.1} km/s (logN {col_dens:.2})", g.centre);
                    return None;
                }
                Some(FittedComponent {
                    col_dens: col_dens.min(n_hi),
                    doppler: g.width.clamp(b_lo, b_hi),
                    velocity: g.centre,
                })
            })
            .collect();

        Ok(LineFit {
            components,
            equivalent_width,
            dv90,
        })
    }
}

// ---------------------------------------------------------------------------
// Minimum detection
// ---------------------------------------------------------------------------

/// Indices of local flux minima whose decrement exceeds `threshold`, keeping
/// the deepest of any minima closer than `min_distance`. Sorted by velocity.
fn find_minima(velocity: &[f64], flux: &[f64], threshold: f64, min_distance: f64) -> Vec<usize> {
    let n = flux.len();
    let mut candidates: Vec<usize> = (0..n)
        .filter(|&i| 1.0 - flux[i] > threshold)
        .filter(|&i| i == 0 || flux[i] <= flux[i - 1])
        .filter(|&i| i == n - 1 || flux[i] < flux[i + 1])
        .collect();

    // Deepest first; ties resolved by position so the result is stable.
    candidates.sort_by(|&a, &b| flux[a].total_cmp(&flux[b]).then(a.cmp(&b)));

    let mut accepted: Vec<usize> = Vec::new();
    for i in candidates {
        if accepted
            .iter()
            .all(|&j| (velocity[i] - velocity[j]).abs() >= min_distance)
        {
            accepted.push(i);
        }
    }
    accepted.sort_unstable();
    accepted
}

/// Split the grid at the flux maximum between consecutive minima and take
/// the τ-weighted moments of each segment as starting parameters.
fn seed_components(
    velocity: &[f64],
    flux: &[f64],
    tau: &[f64],
    widths: &[f64],
    minima: &[usize],
    config: &FitConfig,
) -> Vec<Gaussian> {
    let n = velocity.len();
    let mut bounds = Vec::with_capacity(minima.len() + 1);
    bounds.push(0);
    for pair in minima.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        let split = (a..=b)
            .max_by(|&i, &j| flux[i].total_cmp(&flux[j]).then(j.cmp(&i)))
            .unwrap_or(a);
        bounds.push(split);
    }
    bounds.push(n);

    let (b_lo, b_hi) = config.doppler_bounds;
    minima
        .iter()
        .enumerate()
        .map(|(k, &m)| {
            let segment = bounds[k]..bounds[k + 1].max(bounds[k] + 1).min(n);
            let mut area = 0.0;
            let mut first = 0.0;
            for i in segment.clone() {
                area += tau[i] * widths[i];
                first += tau[i] * widths[i] * velocity[i];
            }
            let centre = if area > 0.0 { first / area } else { velocity[m] };
            let second: f64 = segment
                .map(|i| tau[i] * widths[i] * (velocity[i] - centre).powi(2))
                .sum();
            let width = if area > 0.0 {
                (2.0 * second / area).sqrt()
            } else {
                b_lo
            };
            Gaussian {
                area,
                centre,
                width: width.clamp(b_lo, b_hi),
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Refinement
// ---------------------------------------------------------------------------

/// Expectation-maximisation of a Gaussian mixture against the observed τ.
///
/// Each iteration shares every pixel's optical depth among components in
/// proportion to their current model, then re-estimates area, centroid and
/// width from the shares. Components whose share vanishes are dropped.
fn refine(
    velocity: &[f64],
    tau: &[f64],
    widths: &[f64],
    mut components: Vec<Gaussian>,
    config: &FitConfig,
) -> Result<Vec<Gaussian>, PairError> {
    let (b_lo, b_hi) = config.doppler_bounds;
    let n = velocity.len();
    let mut model = vec![0.0; n];

    for iteration in 1..=config.max_iter {
        for (i, &v) in velocity.iter().enumerate() {
            model[i] = components.iter().map(|g| g.eval(v)).sum();
        }

        let mut change: f64 = 0.0;
        let mut next = Vec::with_capacity(components.len());
        for g in &components {
            let mut area = 0.0;
            let mut first = 0.0;
            let mut second = 0.0;
            for i in 0..n {
                if model[i] <= f64::MIN_POSITIVE {
                    continue;
                }
                let share = tau[i] * widths[i] * g.eval(velocity[i]) / model[i];
                area += share;
                first += share * velocity[i];
                second += share * velocity[i] * velocity[i];
            }
            if !(area > 0.0) {
                change = f64::INFINITY;
                continue;
            }
            let centre = first / area;
            let variance = (second / area - centre * centre).max(0.0);
            let width = (2.0 * variance).sqrt().clamp(b_lo, b_hi);

            change = change
                .max((area - g.area).abs() / area)
                .max((centre - g.centre).abs() / width)
                .max((width - g.width).abs() / width);
            next.push(Gaussian {
                area,
                centre,
                width,
            });
        }

        components = next;
        if components.is_empty() {
            return Ok(components);
        }
        if change < config.tolerance {
            debug!("refinement converged after {iteration} iterations");
            return Ok(components);
        }
    }

    Err(PairError::NonConvergence {
        iterations: config.max_iter,
    })
}
