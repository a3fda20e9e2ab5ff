//! Rescales raw dataset coordinates onto the `[0, 2^h - 1]` grid.

use crate::dataset::DataRow;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Bounds {
    pub max_x: u64,
    pub max_y: u64,
}

impl Bounds {
    pub fn of(rows: &[DataRow]) -> Self {
        rows.iter().fold(Bounds { max_x: 0, max_y: 0 }, |b, r| Bounds {
            max_x: b.max_x.max(r.x),
            max_y: b.max_y.max(r.y),
        })
    }
}

/// `floor(c * (2^h - 1) / max)`, with `max == 0` read as 1. Values above
/// `max` are clamped so the result never leaves the grid.
pub fn normalize_coord(c: u64, max: u64, order: u32) -> u64 {
    let max_val = (1u64 << order) - 1;
    let max = max.max(1);
    let scaled = (u128::from(c.min(max)) * u128::from(max_val)) / u128::from(max);
    scaled as u64
}

/// New rows rescaled against `bounds`; the input is left untouched.
pub fn normalize_with(rows: &[DataRow], order: u32, bounds: Bounds) -> Vec<DataRow> {
    rows.iter()
        .map(|r| DataRow {
            file_id: r.file_id,
            x: normalize_coord(r.x, bounds.max_x, order),
            y: normalize_coord(r.y, bounds.max_y, order),
            keywords: r.keywords.clone(),
        })
        .collect()
}

/// Normalizes against the dataset's own maxima.
pub fn normalize(rows: &[DataRow], order: u32) -> Vec<DataRow> {
    normalize_with(rows, order, Bounds::of(rows))
}
