//! Spatial-keyword records and the CSV files they are loaded from.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{HarnessError, Result};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DataRow {
    pub file_id: u32,
    pub x: u64,
    pub y: u64,
    pub keywords: Vec<String>,
}

impl DataRow {
    pub fn new(file_id: u32, x: u64, y: u64, keywords: Vec<String>) -> Self {
        Self {
            file_id,
            x,
            y,
            keywords,
        }
    }

    pub fn point(&self) -> Point {
        Point {
            x: self.x,
            y: self.y,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Point {
    pub x: u64,
    pub y: u64,
}

pub trait DatasetSource {
    fn load(&self, label: &str) -> Result<Vec<DataRow>>;
}

/// `<dir>/<prefix><label>.csv`, e.g. `dataset/spatial_data_set_10W.csv`.
#[derive(Clone, Debug)]
pub struct CsvDataset {
    dir: PathBuf,
    prefix: String,
}

impl CsvDataset {
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
        }
    }

    pub fn path_for(&self, label: &str) -> PathBuf {
        self.dir.join(format!("{}{}.csv", self.prefix, label))
    }
}

impl DatasetSource for CsvDataset {
    fn load(&self, label: &str) -> Result<Vec<DataRow>> {
        let path = self.path_for(label);
        let rows = load_csv(&path)?;
        log::info!("loaded {} rows from {}", rows.len(), path.display());
        Ok(rows)
    }
}

pub fn load_csv(path: &Path) -> Result<Vec<DataRow>> {
    let text = fs::read_to_string(path).map_err(|e| HarnessError::Dataset {
        path: path.to_path_buf(),
        line: 0,
        reason: e.to_string(),
    })?;
    parse_rows(&text).map_err(|(line, reason)| HarnessError::Dataset {
        path: path.to_path_buf(),
        line,
        reason,
    })
}

/// Parses `fileID,x,y,kw...` lines. Keywords may be split by further commas
/// or by whitespace. Errors carry the 1-based line number.
pub fn parse_rows(text: &str) -> std::result::Result<Vec<DataRow>, (usize, String)> {
    let mut rows = Vec::new();
    for (i, raw) in text.lines().enumerate() {
        let line_no = i + 1;
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }

        let mut fields = line.splitn(4, ',').map(str::trim);
        let id_field = fields.next().unwrap_or_default();
        let file_id = match id_field.parse::<u32>() {
            Ok(v) => v,
            // header
            Err(_) if rows.is_empty() && line_no == 1 => continue,
            Err(e) => return Err((line_no, format!("bad file id `{id_field}`: {e}"))),
        };

        let mut coord = |name: &str| -> std::result::Result<u64, (usize, String)> {
            let f = fields
                .next()
                .ok_or_else(|| (line_no, format!("missing {name}")))?;
            f.parse::<u64>()
                .map_err(|e| (line_no, format!("bad {name} `{f}`: {e}")))
        };
        let x = coord("x")?;
        let y = coord("y")?;

        let keywords = fields
            .next()
            .map(|rest| {
                rest.split(|c: char| c == ',' || c.is_whitespace())
                    .filter(|k| !k.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        rows.push(DataRow::new(file_id, x, y, keywords));
    }
    Ok(rows)
}
