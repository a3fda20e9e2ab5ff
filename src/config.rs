//! Experiment constants. Binaries take no flags; every knob lives here with
//! the values the published runs used.

use std::path::PathBuf;

use rand_chacha::ChaCha20Rng;
use rand_core::SeedableRng;

use crate::checkpoint::validate_checkpoints;
use crate::dataset::CsvDataset;
use crate::error::{HarnessError, Result};
use crate::hilbert::MAX_ORDER;
use crate::timing::check_phases;
use crate::workload::{side_length, DEFAULT_DIVISOR};

pub const DEFAULT_WARM_UP: usize = 9000;
pub const DEFAULT_FORMAL: usize = 1000;
pub const DEFAULT_SECURITY_BITS: u32 = 128;
pub const DEFAULT_RANGE_PREDICATE: u64 = 1 << 30;
pub const DEFAULT_RANGE_PERCENT: u64 = 3;
pub const DIMENSION: u32 = 2;

/// Deterministic 32-byte seed for one experiment stage.
pub fn seed_for(tag: &[u8], a: u64, b: u64) -> [u8; 32] {
    let mut h = blake3::Hasher::new();
    h.update(tag);
    h.update(&a.to_le_bytes());
    h.update(&b.to_le_bytes());
    let out = h.finalize();
    let mut seed = [0u8; 32];
    seed.copy_from_slice(out.as_bytes());
    seed
}

pub fn rng_for(tag: &[u8], a: u64, b: u64) -> ChaCha20Rng {
    ChaCha20Rng::from_seed(seed_for(tag, a, b))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimingConfig {
    pub warm_up: usize,
    pub formal: usize,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            warm_up: DEFAULT_WARM_UP,
            formal: DEFAULT_FORMAL,
        }
    }
}

impl TimingConfig {
    pub fn total_loops(&self) -> usize {
        self.warm_up + self.formal
    }

    pub fn validate(&self) -> Result<()> {
        check_phases(self.total_loops(), self.warm_up)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueryConfig {
    pub range_percent: u64,
    pub divisor: u64,
    pub security_bits: u32,
    pub range_predicate: u64,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            range_percent: DEFAULT_RANGE_PERCENT,
            divisor: DEFAULT_DIVISOR,
            security_bits: DEFAULT_SECURITY_BITS,
            range_predicate: DEFAULT_RANGE_PREDICATE,
        }
    }
}

impl QueryConfig {
    pub fn validate_for(&self, order: u32) -> Result<()> {
        check_order(order)?;
        side_length(1u64 << order, self.range_percent, self.divisor)?;
        if !matches!(self.security_bits, 128 | 256) {
            return Err(HarnessError::config(format!(
                "security parameter {} not in {{128, 256}}",
                self.security_bits
            )));
        }
        Ok(())
    }
}

/// Where `spatial_data_set_<label>.csv` files live.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DatasetConfig {
    pub dir: PathBuf,
    pub prefix: String,
    pub label: String,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("dataset"),
            prefix: "spatial_data_set_".into(),
            label: "10W".into(),
        }
    }
}

impl DatasetConfig {
    pub fn source(&self) -> CsvDataset {
        CsvDataset::new(&self.dir, self.prefix.as_str())
    }
}

fn check_order(order: u32) -> Result<()> {
    if order == 0 || order > MAX_ORDER {
        return Err(HarnessError::config(format!("hilbert order {order} out of range")));
    }
    Ok(())
}

fn non_empty<T>(name: &str, xs: &[T]) -> Result<()> {
    if xs.is_empty() {
        return Err(HarnessError::config(format!("{name} list is empty")));
    }
    Ok(())
}

/// File-space x order grid plus the keyword-count sweep.
#[derive(Clone, Debug, PartialEq)]
pub struct FilesOrdersConfig {
    pub dataset: DatasetConfig,
    pub timing: TimingConfig,
    pub query: QueryConfig,
    /// Columns: `max_files = 2^p`.
    pub file_powers: Vec<u32>,
    /// Rows.
    pub orders: Vec<u32>,
    pub keyword_counts: Vec<usize>,
    pub keyword_file_power: u32,
    pub keyword_order: u32,
    pub seed_tag: String,
    pub out_path: PathBuf,
}

impl Default for FilesOrdersConfig {
    fn default() -> Self {
        Self {
            dataset: DatasetConfig::default(),
            timing: TimingConfig::default(),
            query: QueryConfig::default(),
            file_powers: (18..=24).collect(),
            orders: vec![8, 10, 12],
            keyword_counts: vec![2, 4, 6, 8, 10, 12],
            keyword_file_power: 20,
            keyword_order: 10,
            seed_tag: "bench_files_orders".into(),
            out_path: PathBuf::from("experiment_1_files_orders.txt"),
        }
    }
}

impl FilesOrdersConfig {
    pub fn validate(&self) -> Result<()> {
        self.timing.validate()?;
        non_empty("file power", &self.file_powers)?;
        non_empty("order", &self.orders)?;
        non_empty("keyword count", &self.keyword_counts)?;
        for &p in self.file_powers.iter().chain([&self.keyword_file_power]) {
            if p == 0 || p > 31 {
                return Err(HarnessError::config(format!("file power {p} out of range")));
            }
        }
        for &h in self.orders.iter().chain([&self.keyword_order]) {
            self.query.validate_for(h)?;
        }
        if self.keyword_counts.contains(&0) {
            return Err(HarnessError::config("keyword count must be positive"));
        }
        Ok(())
    }
}

/// Order, range and dataset-size sweeps over all three schemes.
#[derive(Clone, Debug, PartialEq)]
pub struct AllSchemesConfig {
    pub dataset: DatasetConfig,
    pub timing: TimingConfig,
    pub query: QueryConfig,
    pub max_files: u32,
    pub orders: Vec<u32>,
    pub range_percents: Vec<u64>,
    pub fixed_order: u32,
    pub size_labels: Vec<String>,
    pub seed_tag: String,
    pub out_path: PathBuf,
}

impl Default for AllSchemesConfig {
    fn default() -> Self {
        Self {
            dataset: DatasetConfig::default(),
            timing: TimingConfig::default(),
            query: QueryConfig::default(),
            max_files: 1 << 20,
            orders: vec![8, 10, 12],
            range_percents: vec![1, 5, 10, 15, 20],
            fixed_order: 10,
            size_labels: ["2W", "4W", "6W", "8W", "10W"].map(String::from).to_vec(),
            seed_tag: "bench_all_schemes".into(),
            out_path: PathBuf::from("experiment_2_all_schemes.txt"),
        }
    }
}

impl AllSchemesConfig {
    pub fn validate(&self) -> Result<()> {
        self.timing.validate()?;
        non_empty("order", &self.orders)?;
        non_empty("range", &self.range_percents)?;
        non_empty("dataset size", &self.size_labels)?;
        if self.max_files == 0 {
            return Err(HarnessError::config("file space must be non-empty"));
        }
        for &h in self.orders.iter().chain([&self.fixed_order]) {
            self.query.validate_for(h)?;
        }
        for &r in &self.range_percents {
            let q = QueryConfig {
                range_percent: r,
                ..self.query.clone()
            };
            q.validate_for(self.fixed_order)?;
        }
        Ok(())
    }
}

/// Update-history checkpoints.
#[derive(Clone, Debug, PartialEq)]
pub struct HistoryConfig {
    pub dataset: DatasetConfig,
    pub query: QueryConfig,
    pub max_files: u32,
    pub order: u32,
    pub checkpoints: Vec<u64>,
    pub test_objects: usize,
    /// Whether the range-only scheme joins the run.
    pub include_range_only: bool,
    pub seed_tag: String,
    pub out_path: PathBuf,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            dataset: DatasetConfig::default(),
            query: QueryConfig::default(),
            max_files: 1 << 20,
            order: 10,
            checkpoints: vec![100, 1000, 5000, 10000, 20000],
            test_objects: 20,
            include_range_only: true,
            seed_tag: "bench_history/all".into(),
            out_path: PathBuf::from("experiment_3_history_all.txt"),
        }
    }
}

impl HistoryConfig {
    /// Schemes A and B only, on a coarser grid with a shallower history.
    pub fn order_8() -> Self {
        Self {
            order: 8,
            checkpoints: (1..=7).map(|i| i * 500).collect(),
            include_range_only: false,
            seed_tag: "bench_history/h8".into(),
            out_path: PathBuf::from("experiment_3_history_h8.txt"),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.query.validate_for(self.order)?;
        validate_checkpoints(&self.checkpoints)?;
        if self.test_objects == 0 {
            return Err(HarnessError::config("need at least one test object"));
        }
        if self.max_files == 0 {
            return Err(HarnessError::config("file space must be non-empty"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_core::RngCore;

    #[test]
    fn defaults_validate() {
        FilesOrdersConfig::default().validate().unwrap();
        AllSchemesConfig::default().validate().unwrap();
        HistoryConfig::default().validate().unwrap();
        HistoryConfig::order_8().validate().unwrap();
    }

    #[test]
    fn published_constants() {
        let t = TimingConfig::default();
        assert_eq!((t.warm_up, t.formal, t.total_loops()), (9000, 1000, 10_000));
        assert_eq!(FilesOrdersConfig::default().file_powers, vec![18, 19, 20, 21, 22, 23, 24]);
        assert_eq!(
            HistoryConfig::order_8().checkpoints,
            vec![500, 1000, 1500, 2000, 2500, 3000, 3500]
        );
    }

    #[test]
    fn malformed_configs_are_rejected() {
        let mut t = TimingConfig::default();
        t.formal = 0;
        assert!(t.validate().is_err());

        let mut h = HistoryConfig::default();
        h.checkpoints = vec![1000, 100];
        assert!(h.validate().is_err());

        let mut a = AllSchemesConfig::default();
        a.range_percents.push(150);
        assert!(a.validate().is_err());

        let mut f = FilesOrdersConfig::default();
        f.orders.clear();
        assert!(f.validate().is_err());

        let mut q = HistoryConfig::default();
        q.query.security_bits = 80;
        assert!(q.validate().is_err());
    }

    #[test]
    fn seeds_separate_tags_and_axes() {
        assert_eq!(seed_for(b"x", 1, 2), seed_for(b"x", 1, 2));
        assert_ne!(seed_for(b"x", 1, 2), seed_for(b"y", 1, 2));
        assert_ne!(seed_for(b"x", 1, 2), seed_for(b"x", 2, 1));
        let mut a = rng_for(b"t", 0, 0);
        let mut b = rng_for(b"t", 0, 0);
        assert_eq!(a.next_u64(), b.next_u64());
    }
}
