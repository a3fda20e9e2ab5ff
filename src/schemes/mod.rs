//! The three searchable-encryption constructions under comparison, behind
//! one capability interface.
//!
//! The harness only times these calls. Nothing here is audited cryptography;
//! the constructions exist so the harness has real index work to measure.

pub mod scheme_a;
pub mod scheme_b;
pub mod scheme_c;

use std::fmt;

use rand_chacha::ChaCha20Rng;

use crate::dataset::Point;
use crate::error::HarnessError;
use crate::workload::Query;

pub use scheme_a::PrefixIndex;
pub use scheme_b::KeywordChain;
pub use scheme_c::AxisTrees;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UpdateOp {
    Add,
    Del,
}

impl UpdateOp {
    pub fn as_str(self) -> &'static str {
        match self {
            UpdateOp::Add => "add",
            UpdateOp::Del => "del",
        }
    }

    fn to_byte(self) -> u8 {
        match self {
            UpdateOp::Add => 1,
            UpdateOp::Del => 2,
        }
    }

    fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(UpdateOp::Add),
            2 => Some(UpdateOp::Del),
            _ => None,
        }
    }
}

impl fmt::Display for UpdateOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SchemeKind {
    /// Hilbert-prefix inverted index, range + keyword.
    SchemeA,
    /// Forward-private per-keyword update chain, filtered by cell.
    SchemeB,
    /// Range-only per-axis bitmap trees over a fixed population.
    SchemeC,
}

impl SchemeKind {
    pub fn label(self) -> &'static str {
        match self {
            SchemeKind::SchemeA => "SchemeA",
            SchemeKind::SchemeB => "SchemeB",
            SchemeKind::SchemeC => "SchemeC",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SchemeError {
    #[error("file id {file_id} outside file space of {max_files}")]
    FileOutOfRange { file_id: u32, max_files: u32 },

    #[error("point ({x}, {y}) outside the {edge}x{edge} grid")]
    PointOutOfGrid { x: u64, y: u64, edge: u64 },

    #[error("hilbert code {code} exceeds range predicate {bound}")]
    BeyondRangePredicate { code: u64, bound: u64 },

    #[error("file id {0} is not part of the indexed population")]
    UnknownObject(u32),

    #[error("corrupt index entry: {0}")]
    Corrupt(&'static str),

    #[error("AEAD failure")]
    Aead,

    #[error("unsupported parameter: {0}")]
    Unsupported(String),
}

impl From<chacha20poly1305::aead::Error> for SchemeError {
    fn from(_: chacha20poly1305::aead::Error) -> Self {
        SchemeError::Aead
    }
}

/// Search result; the harness only keeps it alive long enough to time the call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SearchOutcome {
    pub matches: usize,
}

pub trait Scheme {
    fn kind(&self) -> SchemeKind;

    fn update(
        &mut self,
        point: Point,
        keywords: &[String],
        op: UpdateOp,
        file_ids: &[u32],
    ) -> Result<(), SchemeError>;

    fn search(&mut self, query: &Query) -> Result<SearchOutcome, SchemeError>;
}

/// Construction parameters, one variant per scheme.
#[derive(Clone, Debug)]
pub enum SchemeParams {
    SchemeA {
        max_files: u32,
        order: u32,
        dimension: u32,
    },
    SchemeB {
        security_bits: u32,
        range_predicate: u64,
        max_files: u32,
        order: u32,
        dimension: u32,
    },
    SchemeC {
        security_bits: u32,
        order: u32,
        objects: Vec<(u32, Point)>,
    },
}

impl SchemeParams {
    pub fn kind(&self) -> SchemeKind {
        match self {
            SchemeParams::SchemeA { .. } => SchemeKind::SchemeA,
            SchemeParams::SchemeB { .. } => SchemeKind::SchemeB,
            SchemeParams::SchemeC { .. } => SchemeKind::SchemeC,
        }
    }
}

pub fn construct(
    params: SchemeParams,
    rng: &mut ChaCha20Rng,
) -> Result<Box<dyn Scheme>, HarnessError> {
    let kind = params.kind();
    let wrap = |source: SchemeError| HarnessError::Scheme {
        scheme: kind.label(),
        source,
    };
    let scheme: Box<dyn Scheme> = match params {
        SchemeParams::SchemeA {
            max_files,
            order,
            dimension,
        } => Box::new(PrefixIndex::new(max_files, order, dimension, rng).map_err(wrap)?),
        SchemeParams::SchemeB {
            security_bits,
            range_predicate,
            max_files,
            order,
            dimension,
        } => Box::new(
            KeywordChain::new(security_bits, range_predicate, max_files, order, dimension, rng)
                .map_err(wrap)?,
        ),
        SchemeParams::SchemeC {
            security_bits,
            order,
            objects,
        } => Box::new(AxisTrees::new(security_bits, order, &objects, rng).map_err(wrap)?),
    };
    log::debug!("constructed {}", kind.label());
    Ok(scheme)
}

/// Wraps a scheme failure with the scheme's label.
pub fn lift<T>(kind: SchemeKind, r: Result<T, SchemeError>) -> Result<T, HarnessError> {
    r.map_err(|source| HarnessError::Scheme {
        scheme: kind.label(),
        source,
    })
}

pub(crate) fn check_security_bits(bits: u32) -> Result<(), SchemeError> {
    match bits {
        128 | 256 => Ok(()),
        other => Err(SchemeError::Unsupported(format!("security parameter {other}"))),
    }
}

pub(crate) fn check_dimension(dimension: u32) -> Result<(), SchemeError> {
    if dimension == 2 {
        Ok(())
    } else {
        Err(SchemeError::Unsupported(format!("dimension {dimension}")))
    }
}

pub(crate) fn check_point(point: Point, order: u32) -> Result<(), SchemeError> {
    let edge = 1u64 << order;
    if point.x >= edge || point.y >= edge {
        return Err(SchemeError::PointOutOfGrid {
            x: point.x,
            y: point.y,
            edge,
        });
    }
    Ok(())
}

/// Folds an ordered op log into the set of live file ids.
pub(crate) fn apply_op(live: &mut std::collections::HashSet<u32>, op: UpdateOp, file_id: u32) {
    match op {
        UpdateOp::Add => {
            live.insert(file_id);
        }
        UpdateOp::Del => {
            live.remove(&file_id);
        }
    }
}

/// Intersection of per-keyword result sets; no keywords means no match.
pub(crate) fn intersect_all(mut sets: Vec<std::collections::HashSet<u32>>) -> usize {
    sets.sort_by_key(|s| s.len());
    let mut iter = sets.into_iter();
    let Some(first) = iter.next() else {
        return 0;
    };
    let rest: Vec<_> = iter.collect();
    first
        .iter()
        .filter(|id| rest.iter().all(|s| s.contains(*id)))
        .count()
}


#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use std::collections::HashSet;

    #[test]
    fn intersection_of_keyword_sets() {
        let a: HashSet<u32> = [1, 2, 3].into_iter().collect();
        let b: HashSet<u32> = [2, 3, 4].into_iter().collect();
        assert_eq!(intersect_all(vec![a.clone(), b]), 2);
        assert_eq!(intersect_all(vec![a]), 3);
        assert_eq!(intersect_all(vec![]), 0);
    }

    #[test]
    fn construct_dispatches_on_params() {
        let mut rng = ChaCha20Rng::seed_from_u64(0);
        let a = construct(
            SchemeParams::SchemeA {
                max_files: 1 << 10,
                order: 4,
                dimension: 2,
            },
            &mut rng,
        )
        .unwrap();
        assert_eq!(a.kind(), SchemeKind::SchemeA);

        let err = construct(
            SchemeParams::SchemeB {
                security_bits: 100,
                range_predicate: 1 << 30,
                max_files: 16,
                order: 4,
                dimension: 2,
            },
            &mut rng,
        )
        .err()
        .unwrap();
        assert!(matches!(err, HarnessError::Scheme { scheme: "SchemeB", .. }));
    }

    #[test]
    fn op_bytes_round_trip() {
        for op in [UpdateOp::Add, UpdateOp::Del] {
            assert_eq!(UpdateOp::from_byte(op.to_byte()), Some(op));
        }
        assert_eq!(UpdateOp::from_byte(0), None);
    }
}
