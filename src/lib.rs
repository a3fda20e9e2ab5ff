//! Latency benchmarks for spatial-keyword searchable encryption.
//!
//! The library holds the measurement machinery; each `src/bin/bench_*`
//! binary runs one experiment and writes one report file.

pub mod checkpoint;
pub mod config;
pub mod crypto;
pub mod dataset;
pub mod error;
pub mod hilbert;
pub mod normalize;
pub mod report;
pub mod schemes;
pub mod sweep;
pub mod timing;
pub mod workload;

pub use dataset::{CsvDataset, DataRow, DatasetSource, Point};
pub use error::{HarnessError, Result};
pub use hilbert::{build_matrix, CellMatrix, HilbertCurve};
pub use report::{Report, ResultTable};
pub use schemes::{Scheme, SchemeError, SchemeKind, SearchOutcome, UpdateOp};
pub use timing::PhasedTiming;
pub use workload::{Query, QueryGen, SearchWindow};
