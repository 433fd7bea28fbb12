use crate::error::PairError;
use crate::fit::stats::min_detectable_column;
use crate::fit::{FitConfig, LineFit};
use crate::ion::{Ion, PerIon};
use crate::table::{Cell, Table};

/// Summary value reported for a quantity that was not measured.
pub const NO_DETECTION: f64 = f64::NAN;

/// Column names of every per-ion detail table.
pub const DETAIL_COLUMNS: [&str; 5] = ["los", "tot_col", "component", "comp_col", "comp_b"];

// ---------------------------------------------------------------------------
// Summary rows
// ---------------------------------------------------------------------------

/// Headline statistics of one ion along one sightline.
#[derive(Debug, Clone, PartialEq)]
pub struct IonSummary {
    /// Total recovered log column density, or [`NO_DETECTION`].
    pub col: f64,
    /// Minimum detectable log column density.
    pub nmin: f64,
    /// Components in the input catalog.
    pub n_input: usize,
    /// Components recovered by the line finder; `None` if the fit failed.
    pub n_comp: Option<usize>,
    /// Equivalent width (km/s).
    pub ew: f64,
    /// Velocity width of 90% of the optical depth (km/s).
    pub dv90: f64,
}

impl IonSummary {
    /// Statistics of a successful fit. Without recovered components the
    /// column density is [`NO_DETECTION`], never zero.
    pub fn from_fit(ion: Ion, n_input: usize, fit: &LineFit, config: &FitConfig) -> Self {
        let b_ref = fit
            .components
            .iter()
            .map(|c| c.doppler)
            .fold(f64::INFINITY, f64::min);
        let b_ref = if b_ref.is_finite() {
            b_ref
        } else {
            config.doppler_bounds.0
        };

        IonSummary {
            col: fit.total_column().unwrap_or(NO_DETECTION),
            nmin: min_detectable_column(ion, config.threshold, b_ref),
            n_input,
            n_comp: Some(fit.components.len()),
            ew: fit.equivalent_width,
            dv90: fit.dv90,
        }
    }

    /// Entry for an ion with nothing to fit: unit flux, no components.
    pub fn no_detection(ion: Ion, n_input: usize, config: &FitConfig) -> Self {
        IonSummary {
            col: NO_DETECTION,
            nmin: min_detectable_column(ion, config.threshold, config.doppler_bounds.0),
            n_input,
            n_comp: Some(0),
            ew: 0.0,
            dv90: NO_DETECTION,
        }
    }

    /// Sentinel entry for a pair whose analysis failed.
    pub fn failed(n_input: usize) -> Self {
        IonSummary {
            col: NO_DETECTION,
            nmin: NO_DETECTION,
            n_input,
            n_comp: None,
            ew: NO_DETECTION,
            dv90: NO_DETECTION,
        }
    }

    fn cells(&self) -> [Cell; 5] {
        [
            Cell::Float(self.col),
            Cell::Float(self.nmin),
            match self.n_comp {
                Some(n) => Cell::from(n),
                None => Cell::Float(NO_DETECTION),
            },
            Cell::Float(self.ew),
            Cell::Float(self.dv90),
        ]
    }
}

impl Default for IonSummary {
    fn default() -> Self {
        IonSummary::failed(0)
    }
}

/// One summary-table row: a sightline with every ion's statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryRow {
    pub los: String,
    pub hi_col: f64,
    pub ions: PerIon<IonSummary>,
}

/// Summary table header: `los`, `HI_col`, then five columns per ion.
pub fn summary_columns() -> Vec<String> {
    let mut names = vec!["los".to_string(), "HI_col".to_string()];
    for ion in Ion::ALL {
        let p = ion.column_prefix();
        for suffix in ["col", "Nmin", "Ncomp", "EW", "dv90"] {
            names.push(format!("{p}_{suffix}"));
        }
    }
    names
}

// ---------------------------------------------------------------------------
// Detail rows
// ---------------------------------------------------------------------------

/// One recovered component in a per-ion detail table.
#[derive(Debug, Clone, PartialEq)]
pub struct DetailRow {
    pub los: String,
    /// Total log column density of the ion along the sightline.
    pub tot_col: f64,
    /// Zero-based index in recovery order.
    pub component: usize,
    pub comp_col: f64,
    pub comp_b: f64,
}

/// Detail rows for one fit: indices `0..N` in recovery order, all sharing
/// the log-summed total column density.
pub fn detail_rows(los: &str, fit: &LineFit) -> Vec<DetailRow> {
    let Some(tot_col) = fit.total_column() else {
        return Vec::new();
    };
    fit.components
        .iter()
        .enumerate()
        .map(|(component, c)| DetailRow {
            los: los.to_string(),
            tot_col,
            component,
            comp_col: c.col_dens,
            comp_b: c.doppler,
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Accumulation
// ---------------------------------------------------------------------------

/// Everything one sightline contributes to the output tables.
#[derive(Debug, Clone, PartialEq)]
pub struct SightlineResult {
    pub summary: SummaryRow,
    pub details: PerIon<Vec<DetailRow>>,
}

impl SightlineResult {
    pub fn new(los: &str, hi_col: f64) -> Self {
        SightlineResult {
            summary: SummaryRow {
                los: los.to_string(),
                hi_col,
                ions: PerIon::default(),
            },
            details: PerIon::default(),
        }
    }

    /// Record the outcome of one (sightline, ion) analysis.
    pub fn record(
        &mut self,
        ion: Ion,
        n_input: usize,
        outcome: &Result<LineFit, PairError>,
        config: &FitConfig,
    ) {
        match outcome {
            Ok(fit) => {
                self.summary.ions[ion] = IonSummary::from_fit(ion, n_input, fit, config);
                self.details[ion] = detail_rows(&self.summary.los, fit);
            }
            Err(_) => {
                self.summary.ions[ion] = IonSummary::failed(n_input);
                self.details[ion].clear();
            }
        }
    }
}

/// The summary table plus one detail table per ion.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResultTables {
    pub summary: Vec<SummaryRow>,
    pub details: PerIon<Vec<DetailRow>>,
}

impl ResultTables {
    /// Append one sightline's rows.
    pub fn push(&mut self, result: SightlineResult) {
        self.summary.push(result.summary);
        for (ion, rows) in result.details {
            self.details[ion].extend(rows);
        }
    }

    /// Append all rows of another accumulator after this one's.
    pub fn merge(&mut self, other: ResultTables) {
        self.summary.extend(other.summary);
        for (ion, rows) in other.details {
            self.details[ion].extend(rows);
        }
    }

    pub fn summary_table(&self) -> Table {
        let mut table = Table::new(summary_columns());
        for row in &self.summary {
            let mut cells = vec![Cell::from(row.los.as_str()), Cell::Float(row.hi_col)];
            for (_, ion) in row.ions.iter() {
                cells.extend(ion.cells());
            }
            table.push_row(cells);
        }
        table
    }

    pub fn detail_table(&self, ion: Ion) -> Table {
        let mut table = Table::new(DETAIL_COLUMNS);
        for row in &self.details[ion] {
            table.push_row(vec![
                Cell::from(row.los.as_str()),
                Cell::Float(row.tot_col),
                Cell::from(row.component),
                Cell::Float(row.comp_col),
                Cell::Float(row.comp_b),
            ]);
        }
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fit::FittedComponent;
    use approx::assert_relative_eq;

    fn fit_with(cols: &[(f64, f64)]) -> LineFit {
        LineFit {
            components: cols
                .iter()
                .map(|&(col_dens, doppler)| FittedComponent {
                    col_dens,
                    doppler,
                    velocity: 0.0,
                })
                .collect(),
            equivalent_width: 12.0,
            dv90: 40.0,
        }
    }

    #[test]
    fn detail_rows_use_log_sum_and_contiguous_indices() {
        let fit = fit_with(&[(13.0, 10.0), (13.0, 20.0), (14.0, 5.0)]);
        let rows = detail_rows("J1", &fit);
        let indices: Vec<usize> = rows.iter().map(|r| r.component).collect();
        assert_eq!(indices, vec![0, 1, 2]);

        let expected = (2.0 * 1e13 + 1e14f64).log10();
        for row in &rows {
            assert_relative_eq!(row.tot_col, expected, epsilon = 1e-12);
        }
        assert!((rows[0].tot_col - 40.0).abs() > 1.0);
    }

    #[test]
    fn zero_components_report_no_detection() {
        let summary = IonSummary::from_fit(Ion::CIV, 0, &fit_with(&[]), &FitConfig::default());
        assert!(summary.col.is_nan());
        assert_eq!(summary.n_comp, Some(0));
        assert!(summary.nmin.is_finite());
        assert!(detail_rows("J1", &fit_with(&[])).is_empty());
    }

    #[test]
    fn no_detection_matches_empty_fit() {
        let config = FitConfig::default();
        let empty = LineFit {
            components: Vec::new(),
            equivalent_width: 0.0,
            dv90: f64::NAN,
        };
        let direct = IonSummary::no_detection(Ion::SiIV, 0, &config);
        let fitted = IonSummary::from_fit(Ion::SiIV, 0, &empty, &config);
        assert_eq!(direct.n_comp, fitted.n_comp);
        assert_eq!(direct.nmin, fitted.nmin);
        assert_eq!(direct.ew, fitted.ew);
        assert!(direct.col.is_nan() && direct.dv90.is_nan());
    }

    #[test]
    fn failed_pair_contributes_sentinels_only() {
        let mut result = SightlineResult::new("J1", 20.1);
        let config = FitConfig::default();
        result.record(Ion::SiII, 1, &Ok(fit_with(&[(14.5, 25.0)])), &config);
        result.record(
            Ion::OVI,
            2,
            &Err(PairError::NonConvergence { iterations: 2000 }),
            &config,
        );

        assert_eq!(result.details[Ion::SiII].len(), 1);
        assert!(result.details[Ion::OVI].is_empty());
        let ovi = &result.summary.ions[Ion::OVI];
        assert_eq!(ovi.n_input, 2);
        assert_eq!(ovi.n_comp, None);
        assert!(ovi.col.is_nan() && ovi.ew.is_nan() && ovi.dv90.is_nan());
    }

    #[test]
    fn summary_table_layout() {
        let mut tables = ResultTables::default();
        let mut result = SightlineResult::new("J1", 20.1);
        result.record(Ion::SiII, 1, &Ok(fit_with(&[(14.5, 25.0)])), &FitConfig::default());
        tables.push(result);

        let summary = tables.summary_table();
        assert_eq!(summary.names.len(), 22);
        assert_eq!(summary.names[2], "Si_II_col");
        assert_eq!(summary.names[21], "O_VI_dv90");
        assert_eq!(summary.column("HI_col").unwrap()[0].as_f64(), Some(20.1));
        assert_eq!(summary.column("Si_II_Ncomp").unwrap()[0], &Cell::Int(1));
        assert!(summary.column("C_IV_col").unwrap()[0].as_f64().unwrap().is_nan());

        let detail = tables.detail_table(Ion::SiII);
        assert_eq!(detail.names, DETAIL_COLUMNS.to_vec());
        assert_eq!(detail.len(), 1);
        assert!(tables.detail_table(Ion::CIV).is_empty());
    }

    #[test]
    fn merge_preserves_order() {
        let mut first = ResultTables::default();
        first.push(SightlineResult::new("A", 20.0));
        let mut second = ResultTables::default();
        let mut b = SightlineResult::new("B", 19.0);
        b.record(Ion::CIV, 1, &Ok(fit_with(&[(13.0, 9.0)])), &FitConfig::default());
        second.push(b);

        first.merge(second);
        let names: Vec<&str> = first.summary.iter().map(|r| r.los.as_str()).collect();
        assert_eq!(names, vec!["A", "B"]);
        assert_eq!(first.details[Ion::CIV][0].los, "B");
    }
}
