use thiserror::Error;

use crate::ion::UnknownIon;

/// Row-local integrity problems in the fit catalog. A row that raises one of
/// these is skipped; the rest of the catalog is still processed.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CatalogError {
    #[error("row {row}: {source}")]
    UnknownIon {
        row: usize,
        #[source]
        source: UnknownIon,
    },

    #[error("row {row}: missing value for column '{column}'")]
    MissingField { row: usize, column: &'static str },

    #[error("row {row}: column '{column}' value '{value}' is not a number")]
    MalformedNumber {
        row: usize,
        column: &'static str,
        value: String,
    },

    #[error("row {row}: column '{column}' is not finite ({value})")]
    NonFinite {
        row: usize,
        column: &'static str,
        value: f64,
    },
}

impl CatalogError {
    /// Zero-based data row the error refers to.
    pub fn row(&self) -> usize {
        match self {
            CatalogError::UnknownIon { row, .. }
            | CatalogError::MissingField { row, .. }
            | CatalogError::MalformedNumber { row, .. }
            | CatalogError::NonFinite { row, .. } => *row,
        }
    }
}

/// Failure of one (sightline, ion) analysis. Never aborts the run: the pair
/// gets sentinel summary values and no detail rows.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PairError {
    #[error("line fit did not converge within {iterations} iterations")]
    NonConvergence { iterations: usize },

    #[error("synthesized flux is not finite at grid index {index}")]
    NonFiniteFlux { index: usize },

    #[error("velocity grid has {grid} samples but flux has {flux}")]
    GridMismatch { grid: usize, flux: usize },

    #[error("line finder failed: {0}")]
    Fitter(String),
}
