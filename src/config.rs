use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail, ensure};
use serde::{Deserialize, Serialize};

use crate::fit::FitConfig;
use crate::ion::{Ion, PerIon};
use crate::spectrum::VelocityGrid;

// ---------------------------------------------------------------------------
// Output file names
// ---------------------------------------------------------------------------

/// File names of the summary table and the four per-ion detail tables,
/// relative to the output directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputFiles {
    pub summary: PathBuf,
    pub si2: PathBuf,
    pub si4: PathBuf,
    pub c4: PathBuf,
    pub o6: PathBuf,
}

impl Default for OutputFiles {
    fn default() -> Self {
        let detail = |ion: Ion| PathBuf::from(format!("kodiaq_spectacle_{}.dat", ion.file_tag()));
        OutputFiles {
            summary: PathBuf::from("kodiaq_spectacle_all.dat"),
            si2: detail(Ion::SiII),
            si4: detail(Ion::SiIV),
            c4: detail(Ion::CIV),
            o6: detail(Ion::OVI),
        }
    }
}

impl OutputFiles {
    /// Detail file name for one ion.
    pub fn detail(&self, ion: Ion) -> &Path {
        match ion {
            Ion::SiII => &self.si2,
            Ion::SiIV => &self.si4,
            Ion::CIV => &self.c4,
            Ion::OVI => &self.o6,
        }
    }

    /// All detail file names, keyed by ion.
    pub fn details(&self) -> PerIon<PathBuf> {
        PerIon::from_fn(|ion| self.detail(ion).to_path_buf())
    }
}

// ---------------------------------------------------------------------------
// Pipeline configuration
// ---------------------------------------------------------------------------

/// Everything a run needs besides the catalog itself.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub grid: VelocityGrid,
    pub fit: FitConfig,
    pub outputs: OutputFiles,
    /// Process sightlines on the rayon thread pool.
    pub parallel: bool,
}

impl PipelineConfig {
    /// Read a JSON configuration file. Missing keys take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: PipelineConfig = serde_json::from_str(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        let grid = &self.grid;
        ensure!(
            grid.step > 0.0,
            "velocity grid step must be positive, got {}",
            grid.step
        );
        ensure!(
            !grid.is_empty(),
            "velocity grid [{}, {}) is empty",
            grid.start,
            grid.stop
        );

        let fit = &self.fit;
        check_bounds("column_density_bounds", fit.column_density_bounds)?;
        check_bounds("doppler_bounds", fit.doppler_bounds)?;
        ensure!(
            fit.doppler_bounds.0 > 0.0,
            "doppler_bounds must be positive, got {:?}",
            fit.doppler_bounds
        );
        ensure!(
            fit.threshold > 0.0 && fit.threshold < 1.0,
            "threshold must lie in (0, 1), got {}",
            fit.threshold
        );
        ensure!(fit.max_iter > 0, "max_iter must be at least 1");
        ensure!(
            fit.tolerance > 0.0,
            "tolerance must be positive, got {}",
            fit.tolerance
        );
        ensure!(
            fit.min_distance >= 0.0,
            "min_distance must not be negative, got {}",
            fit.min_distance
        );
        ensure!(fit.redshift.is_finite(), "redshift must be finite");

        let names = self.outputs.details();
        for (ion, name) in names.iter() {
            if name == &self.outputs.summary {
                bail!("{ion} detail file and summary file share the name {}", name.display());
            }
        }
        Ok(())
    }
}

fn check_bounds(name: &str, (lo, hi): (f64, f64)) -> Result<()> {
    ensure!(
        lo.is_finite() && hi.is_finite() && lo < hi,
        "{name} must be finite with lower < upper, got ({lo}, {hi})"
    );
    Ok(())
}
