//! Fixed-width result tables and the report file that collects them.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::{HarnessError, Result};

const ROW_LABEL_WIDTH: usize = 10;
const CELL_WIDTH: usize = 12;

/// A grid of milliseconds keyed by a row axis and a column axis. Every cell
/// must be set exactly once before [`ResultTable::render`] succeeds.
#[derive(Clone, Debug, PartialEq)]
pub struct ResultTable {
    pub title: String,
    pub corner: String,
    pub row_labels: Vec<String>,
    pub col_labels: Vec<String>,
    cells: Vec<Option<f64>>,
}

impl ResultTable {
    pub fn new(
        title: impl Into<String>,
        corner: impl Into<String>,
        row_labels: Vec<String>,
        col_labels: Vec<String>,
    ) -> Self {
        let n = row_labels.len() * col_labels.len();
        Self {
            title: title.into(),
            corner: corner.into(),
            row_labels,
            col_labels,
            cells: vec![None; n],
        }
    }

    pub fn rows(&self) -> usize {
        self.row_labels.len()
    }

    pub fn cols(&self) -> usize {
        self.col_labels.len()
    }

    /// Fills one cell. Setting a cell twice is a config error.
    pub fn set(&mut self, row: usize, col: usize, ms: f64) -> Result<()> {
        if row >= self.rows() || col >= self.cols() {
            return Err(HarnessError::config(format!(
                "table `{}` has no cell ({row}, {col})",
                self.title
            )));
        }
        let cell = &mut self.cells[row * self.col_labels.len() + col];
        if cell.is_some() {
            return Err(HarnessError::config(format!(
                "table `{}` cell ({row}, {col}) set twice",
                self.title
            )));
        }
        *cell = Some(ms);
        Ok(())
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        self.cells.get(row * self.col_labels.len() + col).copied().flatten()
    }

    pub fn is_complete(&self) -> bool {
        self.cells.iter().all(Option::is_some)
    }

    fn first_missing(&self) -> Option<(usize, usize)> {
        let cols = self.cols().max(1);
        self.cells
            .iter()
            .position(Option::is_none)
            .map(|i| (i / cols, i % cols))
    }

    pub fn render(&self) -> Result<String> {
        if let Some((row, col)) = self.first_missing() {
            return Err(HarnessError::IncompleteTable {
                title: self.title.clone(),
                row,
                col,
            });
        }

        let mut s = String::new();
        s.push_str(&format!("Table: {}\n", self.title));
        s.push_str(&format!("{:<w$}", self.corner, w = ROW_LABEL_WIDTH));
        for c in &self.col_labels {
            s.push_str(&format!("| {:<w$}", c, w = CELL_WIDTH));
        }
        s.push_str("|\n");
        s.push_str(&"-".repeat(ROW_LABEL_WIDTH + self.cols() * (CELL_WIDTH + 2)));
        s.push('\n');

        for (r, label) in self.row_labels.iter().enumerate() {
            s.push_str(&format!("{:<w$}", label, w = ROW_LABEL_WIDTH));
            for c in 0..self.cols() {
                let v = self.get(r, c).unwrap_or_default();
                s.push_str(&format!("| {:<w$.4}", v, w = CELL_WIDTH));
            }
            s.push_str("|\n");
        }
        Ok(s)
    }
}

/// All tables of one experiment binary, written to one file in insertion order.
#[derive(Clone, Debug, Default)]
pub struct Report {
    pub title: String,
    pub notes: Vec<String>,
    pub tables: Vec<ResultTable>,
}

impl Report {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn note(&mut self, line: impl Into<String>) {
        self.notes.push(line.into());
    }

    pub fn push(&mut self, table: ResultTable) {
        self.tables.push(table);
    }

    pub fn extend(&mut self, tables: impl IntoIterator<Item = ResultTable>) {
        self.tables.extend(tables);
    }

    pub fn render(&self) -> Result<String> {
        let mut s = format!(">>> {} <<<\n", self.title);
        for n in &self.notes {
            s.push_str(n);
            s.push('\n');
        }
        s.push('\n');
        for t in &self.tables {
            s.push_str(&t.render()?);
            s.push('\n');
        }
        Ok(s)
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        let text = self.render()?;
        let mut out = BufWriter::new(File::create(path)?);
        out.write_all(text.as_bytes())?;
        out.flush()?;
        Ok(())
    }

    /// Writes the report, logging instead of failing on I/O trouble.
    /// Returns whether the file was written.
    pub fn persist(&self, path: &Path) -> bool {
        match self.write_to(path) {
            Ok(()) => {
                log::info!("results written to {}", path.display());
                true
            }
            Err(e) => {
                log::error!("could not write {}: {e}", path.display());
                for t in &self.tables {
                    log::debug!("unsaved table `{}`", t.title);
                }
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(xs: &[&str]) -> Vec<String> {
        xs.iter().map(|s| s.to_string()).collect()
    }

    fn filled(r: usize, c: usize) -> ResultTable {
        let rows: Vec<String> = (0..r).map(|i| format!("{}", 8 + 2 * i)).collect();
        let cols: Vec<String> = (0..c).map(|j| format!("2^{}", 18 + j)).collect();
        let mut t = ResultTable::new("Search Avg Time (ms)", "H \\ L", rows, cols);
        for i in 0..r {
            for j in 0..c {
                t.set(i, j, (i * c + j) as f64 / 8.0).unwrap();
            }
        }
        t
    }

    #[test]
    fn rendered_shape_matches_axes() {
        let out = filled(3, 7).render().unwrap();
        let lines: Vec<&str> = out.lines().collect();
        // title, header, divider, 3 rows
        assert_eq!(lines.len(), 6);
        assert_eq!(lines[0], "Table: Search Avg Time (ms)");
        assert!(lines[1].starts_with("H \\ L     | 2^18"));
        assert_eq!(lines[1].matches('|').count(), 8);
        assert_eq!(lines[2], "-".repeat(10 + 7 * 14));
        assert!(lines[3].starts_with("8         | 0.0000"));
        assert!(lines[5].contains("| 2.6250"));
    }

    #[test]
    fn unfilled_cell_refuses_to_render() {
        let mut t = ResultTable::new("t", "h", labels(&["8", "10"]), labels(&["A", "B"]));
        t.set(0, 0, 1.0).unwrap();
        t.set(0, 1, 1.0).unwrap();
        t.set(1, 1, 1.0).unwrap();
        let err = t.render().unwrap_err();
        assert!(matches!(err, HarnessError::IncompleteTable { row: 1, col: 0, .. }));
        assert!(!t.is_complete());
    }

    #[test]
    fn cells_are_set_once() {
        let mut t = ResultTable::new("t", "h", labels(&["8"]), labels(&["A"]));
        t.set(0, 0, 1.0).unwrap();
        assert!(t.set(0, 0, 2.0).is_err());
        assert!(t.set(1, 0, 2.0).is_err());
        assert_eq!(t.get(0, 0), Some(1.0));
    }

    #[test]
    fn four_decimal_cells() {
        let mut t = ResultTable::new("t", "R(%)", labels(&["3"]), labels(&["SchemeA"]));
        t.set(0, 0, 1.0 / 3.0).unwrap();
        let out = t.render().unwrap();
        assert!(out.contains("| 0.3333      |"));
    }

    #[test]
    fn full_table_text() {
        let mut t = ResultTable::new("t", "R(%)", labels(&["1", "5"]), labels(&["SchemeA", "SchemeB"]));
        t.set(0, 0, 0.5).unwrap();
        t.set(0, 1, 1.25).unwrap();
        t.set(1, 0, 2.0).unwrap();
        t.set(1, 1, 10.0).unwrap();
        let expected = concat!(
            "Table: t\n",
            "R(%)      | SchemeA     | SchemeB     |\n",
            "--------------------------------------\n",
            "1         | 0.5000      | 1.2500      |\n",
            "5         | 2.0000      | 10.0000     |\n",
        );
        assert_eq!(t.render().unwrap(), expected);
    }

    #[test]
    fn report_keeps_table_order_and_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        let mut r = Report::new("Experiment");
        r.note("Dataset: 10W");
        let mut a = filled(1, 1);
        a.title = "first".into();
        let mut b = filled(1, 1);
        b.title = "second".into();
        r.extend([a, b]);
        assert!(r.persist(&path));

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with(">>> Experiment <<<\nDataset: 10W\n\n"));
        let first = text.find("Table: first").unwrap();
        let second = text.find("Table: second").unwrap();
        assert!(first < second);
    }

    #[test]
    fn unwritable_path_degrades() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("out.txt");
        let mut r = Report::new("x");
        r.push(filled(1, 1));
        assert!(!r.persist(&path));
    }
}
