//! End-to-end driver: catalog → grouped sightlines → per-ion fits → tables.
//!
//! ```text
//!   load_catalog ─► group_catalog ─► Pipeline::run ─► write_outputs
//!                                        │
//!                      for each sightline × ion:
//!                      synthesize ─► LineFinder::fit ─► SightlineResult::record
//! ```

use std::path::Path;

use anyhow::{Context, Result};
use log::{debug, info, warn};
use rayon::prelude::*;

use crate::aggregate::{IonSummary, ResultTables, SightlineResult};
use crate::config::{OutputFiles, PipelineConfig};
use crate::data::group::{Sightline, GroupedCatalog, group_catalog};
use crate::data::loader::load_catalog;
use crate::data::model::Component;
use crate::error::PairError;
use crate::fit::{LineFinder, LineFit, OpticalDepthFinder};
use crate::ion::Ion;
use crate::spectrum::synthesize;
use crate::table::write_fixed_width;

/// Runs the line finder over every (sightline, ion) pair of a catalog.
pub struct Pipeline<F: LineFinder = OpticalDepthFinder> {
    config: PipelineConfig,
    finder: F,
    velocity: Vec<f64>,
}

impl<F: LineFinder> Pipeline<F> {
    pub fn new(config: PipelineConfig, finder: F) -> Self {
        let velocity = config.grid.points();
        Pipeline {
            config,
            finder,
            velocity,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Velocity grid shared by every synthesized spectrum (km/s).
    pub fn velocity(&self) -> &[f64] {
        &self.velocity
    }

    /// Process all sightlines. Row order always follows the catalog,
    /// whether or not the work is spread over threads.
    pub fn run(&self, catalog: &GroupedCatalog) -> ResultTables {
        info!(
            "analysing {} sightlines at z = {} on {} velocity samples",
            catalog.len(),
            self.config.fit.redshift,
            self.velocity.len()
        );

        if self.config.parallel {
            catalog
                .sightlines
                .par_iter()
                .map(|s| self.process_sightline(s))
                .fold(ResultTables::default, |mut acc, result| {
                    acc.push(result);
                    acc
                })
                .reduce(ResultTables::default, |mut left, right| {
                    left.merge(right);
                    left
                })
        } else {
            let mut tables = ResultTables::default();
            for sightline in &catalog.sightlines {
                tables.push(self.process_sightline(sightline));
            }
            tables
        }
    }

    /// Analyse all four ions of one sightline.
    pub fn process_sightline(&self, sightline: &Sightline) -> SightlineResult {
        let mut result = SightlineResult::new(&sightline.name, sightline.hi_col);
        for ion in Ion::ALL {
            let components = sightline.components(ion);
            info!(
                "{} {}: {} catalogued components",
                sightline.name,
                ion,
                components.len()
            );

            if components.is_empty() {
                result.summary.ions[ion] = IonSummary::no_detection(ion, 0, &self.config.fit);
                continue;
            }

            let outcome = self.analyze_pair(ion, &components);
            match &outcome {
                Ok(fit) => {
                    for (i, c) in fit.components.iter().enumerate() {
                        debug!(
                            "{} {} component {i}: logN = {:.3}, b = {:.2} km/s, v = {:.1} km/s",
                            sightline.name, ion, c.col_dens, c.doppler, c.velocity
                        );
                    }
                }
                Err(e) => warn!("{} {}: {e}", sightline.name, ion),
            }
            result.record(ion, components.len(), &outcome, &self.config.fit);
        }
        result
    }

    /// Synthesize the flux of one (sightline, ion) pair and decompose it.
    pub fn analyze_pair(&self, ion: Ion, components: &[Component]) -> Result<LineFit, PairError> {
        let spectrum = synthesize(ion, components, &self.velocity);
        spectrum.check_finite()?;
        if spectrum.flux.len() != self.velocity.len() {
            return Err(PairError::GridMismatch {
                grid: self.velocity.len(),
                flux: spectrum.flux.len(),
            });
        }
        self.finder
            .fit(ion, spectrum.velocity, &spectrum.flux, &self.config.fit)
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// Write the summary table and the four detail tables into `dir`,
/// replacing earlier files of the same name.
pub fn write_outputs(tables: &ResultTables, dir: &Path, files: &OutputFiles) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("creating output directory {}", dir.display()))?;

    let summary_path = dir.join(&files.summary);
    write_fixed_width(&tables.summary_table(), &summary_path)?;
    info!(
        "wrote {} sightlines to {}",
        tables.summary.len(),
        summary_path.display()
    );

    for ion in Ion::ALL {
        let path = dir.join(files.detail(ion));
        write_fixed_width(&tables.detail_table(ion), &path)?;
        info!(
            "wrote {} {} components to {}",
            tables.details[ion].len(),
            ion,
            path.display()
        );
    }
    Ok(())
}

/// Load `catalog`, analyse it with the built-in finder and write the five
/// output tables into `out_dir`.
pub fn run_catalog(catalog: &Path, out_dir: &Path, config: &PipelineConfig) -> Result<ResultTables> {
    config.validate().context("invalid configuration")?;

    let grouped = group_catalog(&load_catalog(catalog)?);
    let pipeline = Pipeline::new(config.clone(), OpticalDepthFinder::default());
    let tables = pipeline.run(&grouped);

    write_outputs(&tables, out_dir, &config.outputs)?;
    Ok(tables)
}
