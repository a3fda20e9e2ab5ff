//! 2-D Hilbert curve encoding and the cell matrix used as the spatial
//! search predicate.

use crate::error::{HarnessError, Result};

/// Largest supported order: codes are `2 * order` bits wide and must fit a `u64`.
pub const MAX_ORDER: u32 = 31;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HilbertCurve {
    order: u32,
    dimension: u32,
}

impl HilbertCurve {
    pub fn new(order: u32, dimension: u32) -> Result<Self> {
        if dimension != 2 {
            return Err(HarnessError::config(format!(
                "only 2-dimensional curves are supported, got dimension {dimension}"
            )));
        }
        if order == 0 || order > MAX_ORDER {
            return Err(HarnessError::config(format!(
                "hilbert order must be in 1..={MAX_ORDER}, got {order}"
            )));
        }
        Ok(Self { order, dimension })
    }

    pub fn order(&self) -> u32 {
        self.order
    }

    pub fn dimension(&self) -> u32 {
        self.dimension
    }

    /// Grid edge length `2^order`.
    pub fn edge_length(&self) -> u64 {
        1u64 << self.order
    }

    /// Curve position of grid cell `(x, y)`. Both coordinates must be below
    /// `edge_length()`.
    pub fn index(&self, x: u64, y: u64) -> u64 {
        let n = self.edge_length();
        debug_assert!(x < n && y < n);
        let (mut x, mut y) = (x, y);
        let mut d = 0u64;
        let mut s = n / 2;
        while s > 0 {
            let rx = u64::from(x & s != 0);
            let ry = u64::from(y & s != 0);
            d += s * s * ((3 * rx) ^ ry);
            if ry == 0 {
                if rx == 1 {
                    x = n - 1 - x;
                    y = n - 1 - y;
                }
                std::mem::swap(&mut x, &mut y);
            }
            s /= 2;
        }
        d
    }
}

/// Row-major `height x width` matrix of curve codes covering one search window.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CellMatrix {
    pub x_start: u64,
    pub y_start: u64,
    pub width: u64,
    pub height: u64,
    cells: Vec<u64>,
}

impl CellMatrix {
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn cells(&self) -> &[u64] {
        &self.cells
    }

    pub fn get(&self, row: u64, col: u64) -> Option<u64> {
        if row >= self.height || col >= self.width {
            return None;
        }
        self.cells.get((row * self.width + col) as usize).copied()
    }

    pub fn rows(&self) -> impl Iterator<Item = &[u64]> {
        // chunks(0) panics; an empty matrix has no rows anyway
        self.cells.chunks(self.width.max(1) as usize)
    }
}

pub fn build_matrix(
    curve: &HilbertCurve,
    x_start: u64,
    y_start: u64,
    width: u64,
    height: u64,
) -> Result<CellMatrix> {
    let n = curve.edge_length();
    if x_start + width > n || y_start + height > n {
        return Err(HarnessError::config(format!(
            "window ({x_start},{y_start}) {width}x{height} exceeds the {n}x{n} grid"
        )));
    }

    let mut cells = Vec::with_capacity((width * height) as usize);
    for row in 0..height {
        let y = y_start + row;
        for col in 0..width {
            cells.push(curve.index(x_start + col, y));
        }
    }

    Ok(CellMatrix {
        x_start,
        y_start,
        width,
        height,
        cells,
    })
}
