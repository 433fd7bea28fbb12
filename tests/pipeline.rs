use std::path::Path;

use approx::assert_relative_eq;
use tempfile::TempDir;

use kodiaq_absorbers::data::group::group_catalog;
use kodiaq_absorbers::data::loader::load_catalog;
use kodiaq_absorbers::fit::FittedComponent;
use kodiaq_absorbers::table::{read_fixed_width, Cell, Table};
use kodiaq_absorbers::{
    FitConfig, Ion, LineFinder, LineFit, OutputFiles, PairError, Pipeline, PipelineConfig,
    run_catalog, write_outputs,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn write_catalog(dir: &Path, body: &str) -> std::path::PathBuf {
    let path = dir.join("tab_fit_result.txt");
    std::fs::write(&path, format!("Name logN_HI Ion v_i log_N_i b_i\n{body}")).unwrap();
    path
}

fn read(dir: &Path, name: &str) -> Table {
    read_fixed_width(&dir.join(name)).unwrap()
}

fn cell_f64(table: &Table, column: &str, row: usize) -> f64 {
    table.column(column).unwrap()[row].as_f64().unwrap()
}

/// Returns the same two components for every ion, except OVI which fails.
struct FixedFinder;

impl LineFinder for FixedFinder {
    fn fit(&self, ion: Ion, _: &[f64], _: &[f64], config: &FitConfig) -> Result<LineFit, PairError> {
        if ion == Ion::OVI {
            return Err(PairError::NonConvergence { iterations: config.max_iter });
        }
        Ok(LineFit {
            components: vec![
                FittedComponent { col_dens: 13.0, doppler: 12.0, velocity: -20.0 },
                FittedComponent { col_dens: 13.0, doppler: 8.0, velocity: 30.0 },
            ],
            equivalent_width: 25.0,
            dv90: 80.0,
        })
    }
}

// ---------------------------------------------------------------------------
// End to end with the built-in finder
// ---------------------------------------------------------------------------

#[test]
fn single_siii_component_sightline() {
    let dir = TempDir::new().unwrap();
    let catalog = write_catalog(dir.path(), "J1234+5678 20.1 SiII 10.0 13.0 25.0\n");

    run_catalog(&catalog, dir.path(), &PipelineConfig::default()).unwrap();

    let summary = read(dir.path(), "kodiaq_spectacle_all.dat");
    assert_eq!(summary.len(), 1);
    assert_eq!(summary.column("los").unwrap()[0].as_str(), Some("J1234+5678"));
    assert_relative_eq!(cell_f64(&summary, "HI_col", 0), 20.1);
    assert_eq!(summary.column("Si_II_Ncomp").unwrap()[0], &Cell::Int(1));
    assert_relative_eq!(cell_f64(&summary, "Si_II_col", 0), 13.0, epsilon = 0.05);
    for ion in ["Si_IV", "C_IV", "O_VI"] {
        assert!(cell_f64(&summary, &format!("{ion}_col"), 0).is_nan());
        assert_eq!(summary.column(&format!("{ion}_Ncomp")).unwrap()[0], &Cell::Int(0));
    }

    let si2 = read(dir.path(), "kodiaq_spectacle_si2.dat");
    assert_eq!(si2.names, vec!["los", "tot_col", "component", "comp_col", "comp_b"]);
    assert_eq!(si2.len(), 1);
    assert_eq!(si2.column("component").unwrap()[0], &Cell::Int(0));

    for tag in ["si4", "c4", "o6"] {
        let table = read(dir.path(), &format!("kodiaq_spectacle_{tag}.dat"));
        assert!(table.is_empty());
        assert_eq!(table.names.len(), 5);
    }
}

#[test]
fn unknown_ion_rows_are_skipped() {
    let dir = TempDir::new().unwrap();
    let catalog = write_catalog(
        dir.path(),
        "Q1 19.5 CIV -30.0 13.4 15.0\n\
         Q1 19.5 MgII 0.0 12.9 7.0\n\
         Q2 18.0 OVI 40.0 14.0 30.0\n",
    );

    let loaded = load_catalog(&catalog).unwrap();
    assert_eq!(loaded.len(), 2);
    assert_eq!(loaded.skipped.len(), 1);
    assert_eq!(loaded.skipped[0].row(), 1);

    let tables = run_catalog(&catalog, dir.path(), &PipelineConfig::default()).unwrap();
    let names: Vec<&str> = tables.summary.iter().map(|r| r.los.as_str()).collect();
    assert_eq!(names, vec!["Q1", "Q2"]);
    assert_eq!(tables.summary[0].ions[Ion::CIV].n_input, 1);
}

#[test]
fn reruns_are_byte_identical() {
    let dir = TempDir::new().unwrap();
    let catalog = write_catalog(
        dir.path(),
        "A 20.0 CIV -60.0 13.2 12.0\n\
         A 20.0 CIV 45.0 13.6 20.0\n\
         B 19.0 SiIV 0.0 12.8 9.0\n",
    );
    let files = OutputFiles::default();
    let all_files = |d: &Path| -> Vec<Vec<u8>> {
        let mut out = vec![std::fs::read(d.join(&files.summary)).unwrap()];
        for ion in Ion::ALL {
            out.push(std::fs::read(d.join(files.detail(ion))).unwrap());
        }
        out
    };

    run_catalog(&catalog, dir.path(), &PipelineConfig::default()).unwrap();
    let first = all_files(dir.path());
    run_catalog(&catalog, dir.path(), &PipelineConfig::default()).unwrap();
    assert_eq!(first, all_files(dir.path()));

    let parallel = PipelineConfig { parallel: true, ..PipelineConfig::default() };
    run_catalog(&catalog, dir.path(), &parallel).unwrap();
    assert_eq!(first, all_files(dir.path()));
}

#[test]
fn empty_catalog_is_fatal() {
    let dir = TempDir::new().unwrap();
    let catalog = write_catalog(dir.path(), "X 19.0 FeII 0.0 13.0 10.0\n");
    assert!(run_catalog(&catalog, dir.path(), &PipelineConfig::default()).is_err());
    assert!(!dir.path().join("kodiaq_spectacle_all.dat").exists());
}

// ---------------------------------------------------------------------------
// With a stub finder
// ---------------------------------------------------------------------------

#[test]
fn stub_finder_results_flow_into_tables() {
    let dir = TempDir::new().unwrap();
    let catalog = write_catalog(
        dir.path(),
        "J1 20.1 SiII 10.0 14.5 25.0\n\
         J1 20.1 OVI 0.0 14.0 30.0\n\
         J2 18.3 CIV 0.0 13.0 10.0\n",
    );
    let grouped = group_catalog(&load_catalog(&catalog).unwrap());
    let tables = Pipeline::new(PipelineConfig::default(), FixedFinder).run(&grouped);

    let out = dir.path().join("out");
    write_outputs(&tables, &out, &OutputFiles::default()).unwrap();

    let summary = read(&out, "kodiaq_spectacle_all.dat");
    assert_eq!(summary.len(), 2);
    let expected_total = 13.0 + 2f64.log10();
    assert_relative_eq!(cell_f64(&summary, "Si_II_col", 0), expected_total, epsilon = 1e-9);
    assert_relative_eq!(cell_f64(&summary, "C_IV_EW", 1), 25.0);
    assert_relative_eq!(cell_f64(&summary, "Si_IV_dv90", 0), 80.0);

    // The failed ion carries sentinels in every field.
    for field in ["col", "Nmin", "Ncomp", "EW", "dv90"] {
        assert!(cell_f64(&summary, &format!("O_VI_{field}"), 0).is_nan());
    }
    assert!(read(&out, "kodiaq_spectacle_o6.dat").is_empty());

    let c4 = read(&out, "kodiaq_spectacle_c4.dat");
    assert_eq!(c4.len(), 4);
    let indices: Vec<&Cell> = c4.column("component").unwrap();
    assert_eq!(indices, vec![&Cell::Int(0), &Cell::Int(1), &Cell::Int(0), &Cell::Int(1)]);
    let los: Vec<Option<&str>> = c4.column("los").unwrap().iter().map(|c| c.as_str()).collect();
    assert_eq!(los, vec![Some("J1"), Some("J1"), Some("J2"), Some("J2")]);
    for row in 0..c4.len() {
        assert_relative_eq!(cell_f64(&c4, "tot_col", row), expected_total, epsilon = 1e-9);
    }
    assert_relative_eq!(cell_f64(&c4, "comp_b", 1), 8.0);
}
