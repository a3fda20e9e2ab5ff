//! Randomized range + keyword queries.
//!
//! Every trial draws a fresh window and a fresh keyword sample so repeated
//! searches never hit the same predicate by construction.

use rand::Rng;

use crate::dataset::DataRow;
use crate::error::{HarnessError, Result};
use crate::hilbert::{build_matrix, CellMatrix, HilbertCurve};

pub const DEFAULT_DIVISOR: u64 = 100;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SearchWindow {
    pub x_start: u64,
    pub y_start: u64,
    pub side_length: u64,
}

/// `E * R / D`, truncated. A side longer than the edge is a config error.
pub fn side_length(edge: u64, range_percent: u64, divisor: u64) -> Result<u64> {
    if divisor == 0 {
        return Err(HarnessError::config("range divisor must be non-zero"));
    }
    let side = edge * range_percent / divisor;
    if side > edge {
        return Err(HarnessError::config(format!(
            "range {range_percent}/{divisor} gives side {side} on a grid of edge {edge}"
        )));
    }
    Ok(side)
}

pub fn draw_window(
    rng: &mut impl Rng,
    edge: u64,
    range_percent: u64,
    divisor: u64,
) -> Result<SearchWindow> {
    let side = side_length(edge, range_percent, divisor)?;
    let span = (edge - side).max(1);
    Ok(SearchWindow {
        x_start: rng.gen_range(0..span),
        y_start: rng.gen_range(0..span),
        side_length: side,
    })
}

/// Keywords of one uniformly drawn record, truncated to the first `k` when
/// the record holds at least `k`.
pub fn draw_keywords(rng: &mut impl Rng, rows: &[DataRow], k: Option<usize>) -> Result<Vec<String>> {
    if rows.is_empty() {
        return Err(HarnessError::config("cannot sample keywords from an empty dataset"));
    }
    let row = &rows[rng.gen_range(0..rows.len())];
    Ok(truncate_keywords(&row.keywords, k))
}

pub fn truncate_keywords(keywords: &[String], k: Option<usize>) -> Vec<String> {
    match k {
        Some(k) if keywords.len() >= k => keywords[..k].to_vec(),
        Some(k) => {
            log::trace!("record holds {} keywords, wanted {k}; using all", keywords.len());
            keywords.to_vec()
        }
        None => keywords.to_vec(),
    }
}

/// One trial's predicate, shared by every scheme searched in that trial.
#[derive(Clone, Debug)]
pub struct Query {
    pub window: SearchWindow,
    pub cells: CellMatrix,
    pub keywords: Vec<String>,
}

#[derive(Clone, Copy, Debug)]
pub struct QueryGen {
    curve: HilbertCurve,
    range_percent: u64,
    divisor: u64,
    keyword_count: Option<usize>,
}

impl QueryGen {
    pub fn new(
        curve: HilbertCurve,
        range_percent: u64,
        divisor: u64,
        keyword_count: Option<usize>,
    ) -> Result<Self> {
        side_length(curve.edge_length(), range_percent, divisor)?;
        if keyword_count == Some(0) {
            return Err(HarnessError::config("query keyword count must be positive"));
        }
        Ok(Self {
            curve,
            range_percent,
            divisor,
            keyword_count,
        })
    }

    pub fn curve(&self) -> &HilbertCurve {
        &self.curve
    }

    pub fn cells(&self, rng: &mut impl Rng) -> Result<(SearchWindow, CellMatrix)> {
        let w = draw_window(rng, self.curve.edge_length(), self.range_percent, self.divisor)?;
        let cells = build_matrix(&self.curve, w.x_start, w.y_start, w.side_length, w.side_length)?;
        Ok((w, cells))
    }

    pub fn keywords(&self, rng: &mut impl Rng, rows: &[DataRow]) -> Result<Vec<String>> {
        draw_keywords(rng, rows, self.keyword_count)
    }

    pub fn draw(&self, rng: &mut impl Rng, rows: &[DataRow]) -> Result<Query> {
        let (window, cells) = self.cells(rng)?;
        let keywords = self.keywords(rng, rows)?;
        Ok(Query {
            window,
            cells,
            keywords,
        })
    }
}
