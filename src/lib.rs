//! Decomposition of KODIAQ absorption-line sightlines into per-ion
//! component tables.
//!
//! A fit catalog lists Voigt components (column density, Doppler parameter,
//! velocity) of SiII, SiIV, CIV and OVI along many sightlines. For every
//! sightline and ion the components are turned back into a synthetic flux
//! profile, decomposed again by a [`fit::LineFinder`], and the results are
//! collected into one summary table and four per-ion detail tables.

pub mod aggregate;
pub mod config;
pub mod data;
pub mod error;
pub mod fit;
pub mod ion;
pub mod pipeline;
pub mod spectrum;
pub mod table;

pub use aggregate::ResultTables;
pub use config::{OutputFiles, PipelineConfig};
pub use error::{CatalogError, PairError};
pub use fit::{FitConfig, LineFinder, LineFit, OpticalDepthFinder};
pub use ion::Ion;
pub use pipeline::{Pipeline, run_catalog, write_outputs};
