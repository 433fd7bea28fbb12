use std::collections::HashMap;

use log::warn;

use super::model::{Catalog, CatalogRow, Component};
use crate::ion::{Ion, PerIon};

// ---------------------------------------------------------------------------
// Sightline – all catalogued components along one line of sight
// ---------------------------------------------------------------------------

/// One line of sight with its HI column density and per-ion component sets.
#[derive(Debug, Clone, PartialEq)]
pub struct Sightline {
    pub name: String,
    /// log10 HI column density, taken from the first row of the sightline.
    pub hi_col: f64,
    /// Catalog rows per ion, in catalog order. Empty when the ion was not
    /// catalogued for this sightline.
    pub ions: PerIon<Vec<CatalogRow>>,
}

impl Sightline {
    fn new(first: &CatalogRow) -> Self {
        Sightline {
            name: first.sightline.clone(),
            hi_col: first.hi_col,
            ions: PerIon::default(),
        }
    }

    /// Component parameters for one ion, in catalog order.
    pub fn components(&self, ion: Ion) -> Vec<Component> {
        self.ions[ion].iter().map(CatalogRow::component).collect()
    }

    /// Total number of catalogued components across all ions.
    pub fn component_count(&self) -> usize {
        self.ions.iter().map(|(_, rows)| rows.len()).sum()
    }
}

// ---------------------------------------------------------------------------
// GroupedCatalog
// ---------------------------------------------------------------------------

/// Catalog rows partitioned by sightline (encounter order) and then by ion.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupedCatalog {
    pub sightlines: Vec<Sightline>,
}

impl GroupedCatalog {
    /// Number of sightlines.
    pub fn len(&self) -> usize {
        self.sightlines.len()
    }

    /// Whether there are no sightlines.
    pub fn is_empty(&self) -> bool {
        self.sightlines.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Sightline> {
        self.sightlines.iter().find(|s| s.name == name)
    }
}

/// Partition catalog rows by sightline, then by ion.
///
/// Sightlines appear in the order they are first encountered. A later row
/// that disagrees on the HI column density is still grouped, but the first
/// value wins and a warning is logged.
pub fn group_catalog(catalog: &Catalog) -> GroupedCatalog {
    let mut sightlines: Vec<Sightline> = Vec::new();
    let mut by_name: HashMap<String, usize> = HashMap::new();

    for row in &catalog.rows {
        let idx = *by_name.entry(row.sightline.clone()).or_insert_with(|| {
            sightlines.push(Sightline::new(row));
            sightlines.len() - 1
        });
        let sightline = &mut sightlines[idx];

        if row.hi_col != sightline.hi_col {
            warn!(
                "sightline {}: logN_HI {} disagrees with first value {}; keeping first",
                sightline.name, row.hi_col, sightline.hi_col
            );
        }
        sightline.ions[row.ion].push(row.clone());
    }

    GroupedCatalog { sightlines }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(name: &str, hi: f64, ion: Ion, v: f64) -> CatalogRow {
        CatalogRow {
            sightline: name.to_string(),
            ion,
            hi_col: hi,
            velocity: v,
            col_dens: 13.5,
            doppler: 10.0,
        }
    }

    fn catalog(rows: Vec<CatalogRow>) -> Catalog {
        Catalog {
            rows,
            skipped: Vec::new(),
        }
    }

    #[test]
    fn groups_in_encounter_order() {
        let cat = catalog(vec![
            row("J2", 19.0, Ion::CIV, 0.0),
            row("J1", 20.1, Ion::SiII, 10.0),
            row("J2", 19.0, Ion::CIV, -40.0),
            row("J1", 20.1, Ion::OVI, 5.0),
        ]);
        let grouped = group_catalog(&cat);
        let names: Vec<&str> = grouped.sightlines.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["J2", "J1"]);

        let j2 = grouped.get("J2").unwrap();
        let velocities: Vec<f64> = j2.components(Ion::CIV).iter().map(|c| c.velocity).collect();
        assert_eq!(velocities, vec![0.0, -40.0]);
        assert!(j2.ions[Ion::SiII].is_empty());
        assert_eq!(j2.component_count(), 2);
    }

    #[test]
    fn first_hi_value_wins() {
        let cat = catalog(vec![
            row("J1", 20.1, Ion::SiII, 0.0),
            row("J1", 18.0, Ion::SiIV, 0.0),
        ]);
        let grouped = group_catalog(&cat);
        assert_eq!(grouped.len(), 1);
        assert_eq!(grouped.sightlines[0].hi_col, 20.1);
        assert_eq!(grouped.sightlines[0].component_count(), 2);
    }

    #[test]
    fn grouping_is_deterministic() {
        let cat = catalog(vec![
            row("A", 20.0, Ion::SiII, 1.0),
            row("B", 19.0, Ion::OVI, 2.0),
            row("A", 20.0, Ion::SiII, 3.0),
        ]);
        assert_eq!(group_catalog(&cat), group_catalog(&cat));
    }
}
