use std::collections::HashMap;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{PipelineError, Result};

/// A loosely typed CSV table. Cells are kept as trimmed strings; typed access
/// goes through the `get*` helpers, which treat pandas-style NA markers as
/// missing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(name: impl Into<String>, headers: Vec<String>) -> Self {
        Self {
            name: name.into(),
            headers,
            rows: Vec::new(),
        }
    }

    pub fn from_reader<R: Read>(name: impl Into<String>, rdr: R) -> Result<Self, csv::Error> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(rdr);
        let headers = reader
            .headers()?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').to_string())
            .collect::<Vec<_>>();
        let name = name.into();
        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            let mut row: Vec<String> = record.iter().map(|c| c.to_string()).collect();
            if row.len() > headers.len() && row[headers.len()..].iter().any(|c| !c.is_empty()) {
                debug!(
                    "{name}: dropping {} cells past the last header on line {}",
                    row.len() - headers.len(),
                    record.position().map_or(0, |p| p.line())
                );
            }
            row.resize(headers.len(), String::new());
            rows.push(row);
        }
        Ok(Self {
            name,
            headers,
            rows,
        })
    }

    pub fn read_csv(path: &Path) -> Result<Self> {
        let file = fs::File::open(path).map_err(|source| PipelineError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self::from_reader(name, file).map_err(|source| PipelineError::Csv {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn write_csv(&self, path: &Path) -> Result<()> {
        write_records(path, &self.headers, self.rows.iter())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// First alias present in the header row.
    pub fn find_column(&self, aliases: &[String]) -> Option<usize> {
        aliases.iter().find_map(|alias| self.column_index(alias))
    }

    pub fn require_column(&self, aliases: &[String]) -> Result<usize> {
        self.find_column(aliases).ok_or_else(|| PipelineError::Schema {
            table: self.name.clone(),
            column: aliases.join(" | "),
            available: self.headers.clone(),
        })
    }

    pub fn get<'a>(&self, row: &'a [String], idx: usize) -> Option<&'a str> {
        row.get(idx)
            .map(|s| s.trim())
            .filter(|s| !is_missing(s))
    }

    pub fn get_f64(&self, row: &[String], idx: usize) -> Option<f64> {
        self.get(row, idx)
            .and_then(|s| s.parse::<f64>().ok())
            .filter(|v| v.is_finite())
    }

    pub fn index(&self) -> HashMap<&str, usize> {
        self.headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h.as_str(), i))
            .collect()
    }
}

pub fn is_missing(cell: &str) -> bool {
    matches!(
        cell.trim().to_ascii_lowercase().as_str(),
        "" | "na" | "n/a" | "nan" | "null" | "none"
    )
}

/// Fail with a schema error naming the first absent column.
pub fn check_columns(table: &str, headers: &[String], required: &[&str]) -> Result<()> {
    for column in required {
        if !headers.iter().any(|h| h == column) {
            return Err(PipelineError::Schema {
                table: table.to_string(),
                column: column.to_string(),
                available: headers.to_vec(),
            });
        }
    }
    Ok(())
}

pub(crate) fn write_records<'a, I>(path: &Path, headers: &[String], rows: I) -> Result<()>
where
    I: IntoIterator<Item = &'a Vec<String>>,
{
    ensure_parent(path)?;
    let csv_err = |source| PipelineError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut writer = csv::Writer::from_path(path).map_err(csv_err)?;
    writer.write_record(headers).map_err(csv_err)?;
    for row in rows {
        writer.write_record(row).map_err(csv_err)?;
    }
    writer.flush().map_err(|source| PipelineError::Io {
        path: path.to_path_buf(),
        source,
    })
}

pub(crate) fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|source| PipelineError::Io {
            path: PathBuf::from(parent),
            source,
        })?;
    }
    Ok(())
}

pub(crate) fn fmt_f64(v: f64) -> String {
    format!("{v}")
}

pub(crate) fn fmt_opt(v: Option<f64>) -> String {
    v.map(fmt_f64).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_ragged_rows_and_flags_missing() {
        let raw = "a,b,c\n1, NaN ,x\n2\n";
        let t = Table::from_reader("t", raw.as_bytes()).unwrap();
        assert_eq!(t.len(), 2);
        assert_eq!(t.get(&t.rows[0], 1), None);
        assert_eq!(t.get(&t.rows[0], 2), Some("x"));
        assert_eq!(t.get(&t.rows[1], 2), None);
        assert_eq!(t.get_f64(&t.rows[1], 0), Some(2.0));
    }

    #[test]
    fn extra_cells_past_the_header_are_dropped() {
        let raw = "a,b\n1,2,stray\n3,4,\n";
        let t = Table::from_reader("t", raw.as_bytes()).unwrap();
        assert_eq!(t.rows[0], vec!["1".to_string(), "2".to_string()]);
        assert_eq!(t.rows[1].len(), 2);
    }

    #[test]
    fn missing_column_lists_available() {
        let t = Table::new("matches.csv", vec!["home".into(), "away".into()]);
        let err = t.require_column(&["date".to_string()]).unwrap_err();
        match err {
            PipelineError::Schema { column, available, .. } => {
                assert_eq!(column, "date");
                assert_eq!(available, vec!["home".to_string(), "away".to_string()]);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
}
