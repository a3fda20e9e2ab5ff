//! Update-history checkpoints.
//!
//! One test object's update count is driven through increasing target
//! depths by alternating `del`/`add` on the same identity. After each target
//! is reached every scheme runs one timed search with the object's keywords.

use rand::Rng;

use crate::dataset::{DataRow, Point};
use crate::error::{HarnessError, Result};
use crate::schemes::{lift, Scheme, UpdateOp};
use crate::timing::{time_call_ns, NANOS_PER_MS};
use crate::workload::{Query, QueryGen};

/// The object whose history grows. Keywords double as the search predicate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TestObject {
    pub file_id: u32,
    pub point: Point,
    pub keywords: Vec<String>,
}

impl From<&DataRow> for TestObject {
    fn from(row: &DataRow) -> Self {
        Self {
            file_id: row.file_id,
            point: row.point(),
            keywords: row.keywords.clone(),
        }
    }
}

/// A scheme instance paired with the object it accumulates history on.
pub struct Subject {
    pub scheme: Box<dyn Scheme>,
    pub object: TestObject,
}

/// Depth `d` is reached by the operation issued at depth `d - 1`; the first
/// one (depth 0) is a `del` because the object starts out indexed.
pub fn op_at(depth: u64) -> UpdateOp {
    if depth % 2 == 0 {
        UpdateOp::Del
    } else {
        UpdateOp::Add
    }
}

pub fn validate_checkpoints(depths: &[u64]) -> Result<()> {
    if depths.is_empty() {
        return Err(HarnessError::config("checkpoint list is empty"));
    }
    if let Some(w) = depths.windows(2).find(|w| w[1] <= w[0]) {
        return Err(HarnessError::config(format!(
            "checkpoints must strictly increase, got {} after {}",
            w[1], w[0]
        )));
    }
    Ok(())
}

/// Runs every checkpoint for one set of subjects, starting from depth 0.
/// Returns nanoseconds as `[subject][checkpoint]`.
pub fn run_object<R: Rng>(
    subjects: &mut [Subject],
    checkpoints: &[u64],
    queries: &QueryGen,
    rng: &mut R,
) -> Result<Vec<Vec<u64>>> {
    validate_checkpoints(checkpoints)?;
    let mut out = vec![vec![0u64; checkpoints.len()]; subjects.len()];
    let mut depth = 0u64;

    for (cp, &target) in checkpoints.iter().enumerate() {
        let need = target.checked_sub(depth).ok_or_else(|| {
            HarnessError::config(format!("checkpoint {target} is below current depth {depth}"))
        })?;
        for u in 0..need {
            let op = op_at(depth + u);
            for s in subjects.iter_mut() {
                let kind = s.scheme.kind();
                let o = &s.object;
                lift(kind, s.scheme.update(o.point, &o.keywords, op, &[o.file_id]))?;
            }
        }
        depth = target;
        log::debug!("reached depth {depth}");

        // one window per checkpoint, shared by every subject
        let (window, cells) = queries.cells(rng)?;
        let mut query = Query {
            window,
            cells,
            keywords: Vec::new(),
        };
        for (lane, s) in subjects.iter_mut().enumerate() {
            query.keywords.clone_from(&s.object.keywords);
            let kind = s.scheme.kind();
            let (r, ns) = time_call_ns(|| s.scheme.search(&query));
            lift(kind, r)?;
            out[lane][cp] = ns;
        }
    }
    Ok(out)
}

/// Per-checkpoint sums over test objects.
#[derive(Clone, Debug, PartialEq)]
pub struct HistoryTotals {
    pub checkpoints: Vec<u64>,
    pub objects: usize,
    /// `[subject][checkpoint]` nanoseconds summed over objects.
    pub sums_ns: Vec<Vec<u64>>,
}

impl HistoryTotals {
    pub fn new(checkpoints: &[u64], lanes: usize) -> Self {
        Self {
            checkpoints: checkpoints.to_vec(),
            objects: 0,
            sums_ns: vec![vec![0; checkpoints.len()]; lanes],
        }
    }

    pub fn add_object(&mut self, per_object: &[Vec<u64>]) {
        for (sum, obj) in self.sums_ns.iter_mut().zip(per_object) {
            for (s, &ns) in sum.iter_mut().zip(obj) {
                *s += ns;
            }
        }
        self.objects += 1;
    }

    /// Mean milliseconds across objects, `[subject][checkpoint]`.
    pub fn mean_ms(&self) -> Vec<Vec<f64>> {
        let n = self.objects.max(1) as f64;
        self.sums_ns
            .iter()
            .map(|lane| lane.iter().map(|&ns| ns as f64 / n / NANOS_PER_MS).collect())
            .collect()
    }
}

/// Repeats [`run_object`] for `test_objects` rounds. `setup` builds fresh
/// subjects for each round; they are dropped before the next one starts.
pub fn simulate<R, F>(
    checkpoints: &[u64],
    lanes: usize,
    test_objects: usize,
    queries: &QueryGen,
    rng: &mut R,
    mut setup: F,
) -> Result<HistoryTotals>
where
    R: Rng,
    F: FnMut(&mut R) -> Result<Vec<Subject>>,
{
    validate_checkpoints(checkpoints)?;
    if test_objects == 0 {
        return Err(HarnessError::config("need at least one test object"));
    }

    let mut totals = HistoryTotals::new(checkpoints, lanes);
    for t in 0..test_objects {
        let mut subjects = setup(rng)?;
        if subjects.len() != lanes {
            return Err(HarnessError::config(format!(
                "setup produced {} subjects, expected {lanes}",
                subjects.len()
            )));
        }
        let per_object = run_object(&mut subjects, checkpoints, queries, rng)?;
        totals.add_object(&per_object);
        log::info!("test object {}/{test_objects} done", t + 1);
    }
    Ok(totals)
}
