use std::fmt;

use log::warn;

use crate::error::CatalogError;
use crate::ion::Ion;

// ---------------------------------------------------------------------------
// Column – the required catalog columns
// ---------------------------------------------------------------------------

/// Columns every fit catalog must provide. Any other column is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    Name,
    LogNHi,
    Ion,
    Velocity,
    LogN,
    Doppler,
}

impl Column {
    pub const ALL: [Column; 6] = [
        Column::Name,
        Column::LogNHi,
        Column::Ion,
        Column::Velocity,
        Column::LogN,
        Column::Doppler,
    ];

    /// Header name as written by the upstream fitting tool.
    pub fn header(self) -> &'static str {
        match self {
            Column::Name => "Name",
            Column::LogNHi => "logN_HI",
            Column::Ion => "Ion",
            Column::Velocity => "v_i",
            Column::LogN => "log_N_i",
            Column::Doppler => "b_i",
        }
    }

    fn slot(self) -> usize {
        self as usize
    }
}

// ---------------------------------------------------------------------------
// RawValue – a single untyped cell as read from disk
// ---------------------------------------------------------------------------

/// A catalog cell before validation. Text formats yield `Text`, typed formats
/// (JSON, Parquet) may yield `Number` directly.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Text(String),
    Number(f64),
    Null,
}

impl RawValue {
    /// Build from an optional token; empty tokens count as missing.
    pub fn from_token(token: Option<&str>) -> Self {
        match token.map(str::trim) {
            Some(t) if !t.is_empty() => RawValue::Text(t.to_string()),
            _ => RawValue::Null,
        }
    }
}

impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawValue::Text(s) => write!(f, "{s}"),
            RawValue::Number(v) => write!(f, "{v}"),
            RawValue::Null => write!(f, "<null>"),
        }
    }
}

/// The six required cells of one catalog line, in [`Column::ALL`] order.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    values: [RawValue; 6],
}

impl RawRecord {
    pub fn from_fn(mut f: impl FnMut(Column) -> RawValue) -> Self {
        RawRecord {
            values: Column::ALL.map(&mut f),
        }
    }

    pub fn get(&self, column: Column) -> &RawValue {
        &self.values[column.slot()]
    }

    fn text(&self, row: usize, column: Column) -> Result<String, CatalogError> {
        match self.get(column) {
            RawValue::Text(s) => Ok(s.clone()),
            RawValue::Number(v) => Ok(v.to_string()),
            RawValue::Null => Err(CatalogError::MissingField {
                row,
                column: column.header(),
            }),
        }
    }

    fn number(&self, row: usize, column: Column) -> Result<f64, CatalogError> {
        let value = match self.get(column) {
            RawValue::Number(v) => *v,
            RawValue::Text(s) => s.parse::<f64>().map_err(|_| CatalogError::MalformedNumber {
                row,
                column: column.header(),
                value: s.clone(),
            })?,
            RawValue::Null => {
                return Err(CatalogError::MissingField {
                    row,
                    column: column.header(),
                })
            }
        };
        if !value.is_finite() {
            return Err(CatalogError::NonFinite {
                row,
                column: column.header(),
                value,
            });
        }
        Ok(value)
    }
}

// ---------------------------------------------------------------------------
// CatalogRow – one fitted absorption component
// ---------------------------------------------------------------------------

/// Absorption-line parameters of one component.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Component {
    /// log10 column density (cm^-2).
    pub col_dens: f64,
    /// Doppler parameter (km/s).
    pub doppler: f64,
    /// Velocity centroid offset (km/s).
    pub velocity: f64,
}

/// One catalogued component, as reported by the upstream fit.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogRow {
    pub sightline: String,
    pub ion: Ion,
    /// log10 HI column density of the sightline.
    pub hi_col: f64,
    pub velocity: f64,
    pub col_dens: f64,
    pub doppler: f64,
}

impl CatalogRow {
    /// Validate a raw record. `row` is the zero-based data row, used in errors.
    pub fn from_raw(row: usize, raw: &RawRecord) -> Result<Self, CatalogError> {
        let sightline = raw.text(row, Column::Name)?;
        let ion_label = raw.text(row, Column::Ion)?;
        let ion = ion_label
            .parse::<Ion>()
            .map_err(|source| CatalogError::UnknownIon { row, source })?;

        Ok(CatalogRow {
            sightline,
            ion,
            hi_col: raw.number(row, Column::LogNHi)?,
            velocity: raw.number(row, Column::Velocity)?,
            col_dens: raw.number(row, Column::LogN)?,
            doppler: raw.number(row, Column::Doppler)?,
        })
    }

    pub fn component(&self) -> Component {
        Component {
            col_dens: self.col_dens,
            doppler: self.doppler,
            velocity: self.velocity,
        }
    }
}

// ---------------------------------------------------------------------------
// Catalog – the complete loaded fit table
// ---------------------------------------------------------------------------

/// Validated catalog rows in file order plus the rows that were rejected.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    pub rows: Vec<CatalogRow>,
    pub skipped: Vec<CatalogError>,
}

impl Catalog {
    /// Validate every record, keeping good rows and logging the bad ones.
    pub fn from_records(records: Vec<RawRecord>) -> Self {
        let mut catalog = Catalog::default();
        for (row, raw) in records.iter().enumerate() {
            match CatalogRow::from_raw(row, raw) {
                Ok(parsed) => catalog.rows.push(parsed),
                Err(err) => {
                    warn!("skipping catalog {err}");
                    catalog.skipped.push(err);
                }
            }
        }
        catalog
    }

    /// Number of usable rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether no usable rows were read.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(tokens: [&str; 6]) -> RawRecord {
        RawRecord::from_fn(|col| RawValue::from_token(Some(tokens[col as usize])))
    }

    #[test]
    fn parses_valid_row() {
        let raw = record(["J1234+5678", "20.1", "SiII", "10", "14.5", "25"]);
        let row = CatalogRow::from_raw(0, &raw).unwrap();
        assert_eq!(row.sightline, "J1234+5678");
        assert_eq!(row.ion, Ion::SiII);
        assert_eq!(row.hi_col, 20.1);
        assert_eq!(
            row.component(),
            Component {
                col_dens: 14.5,
                doppler: 25.0,
                velocity: 10.0
            }
        );
    }

    #[test]
    fn unknown_ion_is_integrity_error() {
        let raw = record(["J1", "20.1", "MgII", "0", "13.0", "10"]);
        let err = CatalogRow::from_raw(4, &raw).unwrap_err();
        assert!(matches!(err, CatalogError::UnknownIon { row: 4, .. }));
    }

    #[test]
    fn malformed_and_missing_numbers() {
        let bad = record(["J1", "20.1", "CIV", "abc", "13.0", "10"]);
        assert_eq!(
            CatalogRow::from_raw(1, &bad).unwrap_err(),
            CatalogError::MalformedNumber {
                row: 1,
                column: "v_i",
                value: "abc".to_string()
            }
        );

        let missing = record(["J1", "20.1", "CIV", "0", "", "10"]);
        assert_eq!(
            CatalogRow::from_raw(2, &missing).unwrap_err(),
            CatalogError::MissingField {
                row: 2,
                column: "log_N_i"
            }
        );
    }

    #[test]
    fn non_finite_values_are_rejected() {
        let raw = record(["J1", "20.1", "OVI", "0", "nan", "10"]);
        assert!(matches!(
            CatalogRow::from_raw(0, &raw),
            Err(CatalogError::NonFinite { column: "log_N_i", .. })
        ));
    }

    #[test]
    fn catalog_keeps_good_rows_and_records_skips() {
        let catalog = Catalog::from_records(vec![
            record(["J1", "20.1", "SiII", "10", "14.5", "25"]),
            record(["J1", "20.1", "MgII", "0", "13.0", "10"]),
            record(["J2", "19.0", "OVI", "-5", "14.0", "30"]),
        ]);
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.skipped.len(), 1);
        assert_eq!(catalog.skipped[0].row(), 1);
    }
}
