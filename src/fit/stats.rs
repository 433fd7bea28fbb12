//! Non-parametric line statistics.

use std::f64::consts::PI;

use crate::ion::Ion;
use crate::spectrum::TAU_PREFACTOR;

/// Integration weight of each sample (trapezoid rule on a possibly
/// non-uniform grid).
pub fn sample_widths(velocity: &[f64]) -> Vec<f64> {
    let n = velocity.len();
    if n < 2 {
        return vec![0.0; n];
    }
    (0..n)
        .map(|i| {
            let left = if i == 0 { velocity[0] } else { velocity[i - 1] };
            let right = if i == n - 1 { velocity[n - 1] } else { velocity[i + 1] };
            (right - left) / 2.0
        })
        .collect()
}

/// Apparent optical depth `-ln F`, with the flux floored at `floor` so
/// saturated pixels stay finite.
pub fn apparent_optical_depth(flux: &[f64], floor: f64) -> Vec<f64> {
    flux.iter()
        .map(|&f| (-f.max(floor).ln()).max(0.0))
        .collect()
}

/// Equivalent width `∫ (1 - F) dv` in km/s.
pub fn equivalent_width(velocity: &[f64], flux: &[f64]) -> f64 {
    sample_widths(velocity)
        .iter()
        .zip(flux)
        .map(|(w, f)| w * (1.0 - f))
        .sum()
}

/// Velocity interval containing the central 90% of the optical depth.
///
/// Returns NaN when there is no optical depth to integrate.
pub fn delta_v_90(velocity: &[f64], tau: &[f64]) -> f64 {
    let n = velocity.len().min(tau.len());
    if n < 2 {
        return f64::NAN;
    }

    let mut cumulative = Vec::with_capacity(n);
    cumulative.push(0.0);
    for i in 1..n {
        let area = 0.5 * (tau[i] + tau[i - 1]) * (velocity[i] - velocity[i - 1]);
        cumulative.push(cumulative[i - 1] + area);
    }
    let total = cumulative[n - 1];
    if !(total > 0.0) {
        return f64::NAN;
    }

    let at_fraction = |frac: f64| -> f64 {
        let target = frac * total;
        let i = cumulative.partition_point(|&c| c < target).clamp(1, n - 1);
        let (c0, c1) = (cumulative[i - 1], cumulative[i]);
        let t = if c1 > c0 { (target - c0) / (c1 - c0) } else { 0.0 };
        velocity[i - 1] + t * (velocity[i] - velocity[i - 1])
    };

    at_fraction(0.95) - at_fraction(0.05)
}

/// Linear column density (cm^-2) from an integrated optical depth
/// `∫ τ dv` in km/s.
pub fn column_from_integrated_tau(ion: Ion, integrated_tau: f64) -> f64 {
    let line = ion.transition();
    integrated_tau / (TAU_PREFACTOR * PI.sqrt() * line.f_value * line.wavelength)
}

/// log10 column density at which a Gaussian line of width `doppler` has a
/// central flux decrement equal to `threshold`.
pub fn min_detectable_column(ion: Ion, threshold: f64, doppler: f64) -> f64 {
    let line = ion.transition();
    let tau_limit = -(1.0 - threshold).ln();
    (tau_limit * doppler / (TAU_PREFACTOR * line.f_value * line.wavelength)).log10()
}

/// `log10(Σ 10^N)` over log column densities, or `None` for no columns.
pub fn log_sum_columns<I: IntoIterator<Item = f64>>(columns: I) -> Option<f64> {
    let cols: Vec<f64> = columns.into_iter().collect();
    let max = cols.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if cols.is_empty() || !max.is_finite() {
        return None;
    }
    let sum: f64 = cols.iter().map(|c| 10f64.powf(c - max)).sum();
    Some(max + sum.log10())
}
