use std::fmt;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result, bail};
use tempfile::NamedTempFile;

// ---------------------------------------------------------------------------
// Cell – a single value in an output table
// ---------------------------------------------------------------------------

/// A table cell. Floats print with the shortest representation that reads
/// back to the same value; NaN prints as `nan`.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Int(i64),
    Float(f64),
    Null,
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Text(s) => write!(f, "{s}"),
            Cell::Int(i) => write!(f, "{i}"),
            Cell::Float(v) if v.is_nan() => write!(f, "nan"),
            Cell::Float(v) if v.is_infinite() => {
                write!(f, "{}", if *v > 0.0 { "inf" } else { "-inf" })
            }
            Cell::Float(v) => write!(f, "{v}"),
            Cell::Null => Ok(()),
        }
    }
}

impl Cell {
    /// Numeric view of the cell.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Float(v) => Some(*v),
            Cell::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Guess the type of a token read back from a table.
    fn parse(token: &str) -> Self {
        if token.is_empty() {
            return Cell::Null;
        }
        if let Ok(i) = token.parse::<i64>() {
            return Cell::Int(i);
        }
        if let Ok(f) = token.parse::<f64>() {
            return Cell::Float(f);
        }
        Cell::Text(token.to_string())
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::Text(s.to_string())
    }
}

impl From<f64> for Cell {
    fn from(v: f64) -> Self {
        Cell::Float(v)
    }
}

impl From<usize> for Cell {
    fn from(v: usize) -> Self {
        Cell::Int(v as i64)
    }
}

// ---------------------------------------------------------------------------
// Table
// ---------------------------------------------------------------------------

/// Named columns and rows of cells, in a fixed column order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    pub names: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new<S: Into<String>>(names: impl IntoIterator<Item = S>) -> Self {
        Table {
            names: names.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Append a row; it must have one cell per column.
    pub fn push_row(&mut self, row: Vec<Cell>) {
        debug_assert_eq!(row.len(), self.names.len(), "row width mismatch");
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// All cells of a named column, top to bottom.
    pub fn column(&self, name: &str) -> Option<Vec<&Cell>> {
        let idx = self.names.iter().position(|n| n == name)?;
        Some(self.rows.iter().map(|r| &r[idx]).collect())
    }
}

// ---------------------------------------------------------------------------
// Fixed-width text format
// ---------------------------------------------------------------------------

/// Render in the `|`-delimited fixed-width layout:
///
/// ```text
/// |  los | HI_col |
/// | J123 |   20.1 |
/// ```
pub fn format_fixed_width(table: &Table) -> String {
    let rendered: Vec<Vec<String>> = table
        .rows
        .iter()
        .map(|row| row.iter().map(Cell::to_string).collect())
        .collect();

    let widths: Vec<usize> = table
        .names
        .iter()
        .enumerate()
        .map(|(c, name)| {
            rendered
                .iter()
                .filter_map(|r| r.get(c).map(String::len))
                .fold(name.len(), usize::max)
        })
        .collect();

    let mut out = render_line(table.names.iter().map(String::as_str), &widths);
    for row in &rendered {
        out.push_str(&render_line(row.iter().map(String::as_str), &widths));
    }
    out
}

fn render_line<'a>(cells: impl Iterator<Item = &'a str>, widths: &[usize]) -> String {
    let padded: Vec<String> = cells
        .zip(widths)
        .map(|(s, &w)| format!("{s:>w$}"))
        .collect();
    format!("| {} |\n", padded.join(" | "))
}

/// Parse the layout written by [`format_fixed_width`].
pub fn parse_fixed_width(text: &str) -> Result<Table> {
    let mut lines = text.lines().filter(|l| !l.trim().is_empty());
    let header = lines.next().context("fixed-width table has no header")?;
    let mut table = Table::new(split_fixed_width(header));

    for (row_no, line) in lines.enumerate() {
        let cells: Vec<Cell> = split_fixed_width(line)
            .into_iter()
            .map(|t| Cell::parse(&t))
            .collect();
        if cells.len() != table.names.len() {
            bail!(
                "row {row_no} has {} cells, expected {}",
                cells.len(),
                table.names.len()
            );
        }
        table.push_row(cells);
    }
    Ok(table)
}

fn split_fixed_width(line: &str) -> Vec<String> {
    let trimmed = line.trim();
    let inner = trimmed.strip_prefix('|').unwrap_or(trimmed);
    let inner = inner.strip_suffix('|').unwrap_or(inner);
    inner.split('|').map(|c| c.trim().to_string()).collect()
}

/// Write a table, replacing any existing file atomically: the content goes
/// to a temporary file in the target directory which is then renamed over
/// `path`.
pub fn write_fixed_width(table: &Table, path: &Path) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)
        .with_context(|| format!("creating temporary file in {}", dir.display()))?;
    tmp.write_all(format_fixed_width(table).as_bytes())
        .context("writing table")?;
    tmp.as_file().sync_all().context("flushing table")?;
    tmp.persist(path)
        .map_err(|e| e.error)
        .with_context(|| format!("replacing {}", path.display()))?;
    Ok(())
}

/// Read a table written by [`write_fixed_width`].
pub fn read_fixed_width(path: &Path) -> Result<Table> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    parse_fixed_width(&text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample() -> Table {
        let mut t = Table::new(["los", "tot_col", "component"]);
        t.push_row(vec!["J1234+5678".into(), Cell::Float(14.5), 0usize.into()]);
        t.push_row(vec!["Q2".into(), f64::NAN.into(), 1usize.into()]);
        t
    }

    #[test]
    fn formats_aligned_columns() {
        let text = format_fixed_width(&sample());
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "|        los | tot_col | component |");
        assert_eq!(lines[1], "| J1234+5678 |    14.5 |         0 |");
        assert_eq!(lines[2], "|         Q2 |     nan |         1 |");
    }

    #[test]
    fn reads_back_what_it_writes() {
        let table = sample();
        let parsed = parse_fixed_width(&format_fixed_width(&table)).unwrap();
        assert_eq!(parsed.names, table.names);
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed.rows[0][0].as_str(), Some("J1234+5678"));
        assert_eq!(parsed.rows[0][1].as_f64(), Some(14.5));
        assert!(parsed.rows[1][1].as_f64().unwrap().is_nan());
        assert_eq!(parsed.column("component").unwrap(), vec![&Cell::Int(0), &Cell::Int(1)]);
    }

    #[test]
    fn header_only_table() {
        let table = Table::new(["los", "tot_col"]);
        let parsed = parse_fixed_width(&format_fixed_width(&table)).unwrap();
        assert!(parsed.is_empty());
        assert_eq!(parsed.names, vec!["los", "tot_col"]);
    }

    #[test]
    fn write_replaces_previous_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.dat");
        std::fs::write(&path, "stale content\nthat is much longer than the table\n".repeat(20))
            .unwrap();

        write_fixed_width(&sample(), &path).unwrap();
        let first = std::fs::read(&path).unwrap();
        write_fixed_width(&sample(), &path).unwrap();
        let second = std::fs::read(&path).unwrap();

        assert_eq!(first, second);
        assert_eq!(read_fixed_width(&path).unwrap().len(), 2);
        // Only the target remains; the temporary file was renamed away.
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
