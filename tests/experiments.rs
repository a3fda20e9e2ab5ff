use std::fs;
use std::path::Path;

use skq_bench::config::{
    rng_for, AllSchemesConfig, DatasetConfig, FilesOrdersConfig, HistoryConfig, QueryConfig,
    TimingConfig,
};
use skq_bench::dataset::DatasetSource;
use skq_bench::normalize::normalize;
use skq_bench::report::Report;
use skq_bench::timing::run_phased_single;
use skq_bench::workload::DEFAULT_DIVISOR;
use skq_bench::{sweep, HarnessError, HilbertCurve, QueryGen};

const KEYWORDS: [&str; 6] = ["cafe", "park", "wifi", "bar", "museum", "gym"];

fn write_dataset(dir: &Path, label: &str, n: u32) {
    let mut text = String::from("fileID,x,y,keywords\n");
    for i in 0..n {
        let kws: Vec<&str> = (0..4).map(|k| KEYWORDS[(i as usize + k) % KEYWORDS.len()]).collect();
        text.push_str(&format!(
            "{},{},{},{}\n",
            i,
            (i * 7919) % 50_000,
            (i * 104_729) % 30_000,
            kws.join(" ")
        ));
    }
    fs::write(dir.join(format!("spatial_data_set_{label}.csv")), text).unwrap();
}

fn dataset(dir: &Path, label: &str) -> DatasetConfig {
    DatasetConfig {
        dir: dir.to_path_buf(),
        label: label.into(),
        ..DatasetConfig::default()
    }
}

fn quick() -> TimingConfig {
    TimingConfig {
        warm_up: 4,
        formal: 3,
    }
}

fn wide_query() -> QueryConfig {
    QueryConfig {
        range_percent: 20,
        ..QueryConfig::default()
    }
}

#[test]
fn all_schemes_experiment_writes_complete_report() {
    let dir = tempfile::tempdir().unwrap();
    write_dataset(dir.path(), "A", 40);
    write_dataset(dir.path(), "B", 80);

    let cfg = AllSchemesConfig {
        dataset: dataset(dir.path(), "B"),
        timing: quick(),
        query: wide_query(),
        orders: vec![4, 5],
        range_percents: vec![10, 50],
        fixed_order: 5,
        size_labels: vec!["A".into(), "B".into()],
        out_path: dir.path().join("experiment_2_all_schemes.txt"),
        ..AllSchemesConfig::default()
    };
    let source = cfg.dataset.source();
    let raw = source.load(&cfg.dataset.label).unwrap();
    assert_eq!(raw.len(), 80);

    let mut rng = rng_for(cfg.seed_tag.as_bytes(), 0, 0);
    let (update, search) = sweep::orders(&cfg, &raw, &mut rng).unwrap();
    let ranges = sweep::ranges(&cfg, &raw, &mut rng).unwrap();
    let sizes = sweep::dataset_sizes(&cfg, &source, &mut rng).unwrap();

    let mut report = Report::new("Experiment 2");
    report.extend([update, search, ranges, sizes]);
    assert!(report.persist(&cfg.out_path));

    let text = fs::read_to_string(&cfg.out_path).unwrap();
    let titles: Vec<&str> = text.lines().filter(|l| l.starts_with("Table: ")).collect();
    assert_eq!(titles.len(), 4);
    assert!(titles[0].contains("Update Time"));
    assert!(titles[3].contains("vs N"));
    // header of the size table lists every scheme
    assert!(text.contains("N         | SchemeA     | SchemeB     | SchemeC     |"));
    assert!(text.lines().any(|l| l.starts_with("50        | ")));
}

#[test]
fn files_orders_experiment_runs_both_sweeps() {
    let dir = tempfile::tempdir().unwrap();
    write_dataset(dir.path(), "S", 30);
    let cfg = FilesOrdersConfig {
        dataset: dataset(dir.path(), "S"),
        timing: quick(),
        query: wide_query(),
        file_powers: vec![6, 7],
        orders: vec![4],
        keyword_counts: vec![1, 2, 8],
        keyword_file_power: 7,
        keyword_order: 4,
        ..FilesOrdersConfig::default()
    };
    let raw = cfg.dataset.source().load("S").unwrap();
    let mut rng = rng_for(b"it/files_orders", 0, 0);

    let grid = sweep::file_space_grid(&cfg, &raw, &mut rng).unwrap();
    assert_eq!(grid.len(), 8);
    assert!(grid.iter().all(|t| t.is_complete()));
    assert_eq!(grid[0].col_labels, vec!["2^6", "2^7"]);

    let kw = sweep::keyword_counts(&cfg, &raw, &mut rng).unwrap();
    assert_eq!(kw.row_labels, vec!["SchemeA", "SchemeB"]);
    assert_eq!(kw.col_labels, vec!["1", "2", "8"]);
    assert!(kw.render().is_ok());
}

#[test]
fn history_experiment_reports_every_checkpoint() {
    let dir = tempfile::tempdir().unwrap();
    write_dataset(dir.path(), "H", 25);
    let cfg = HistoryConfig {
        dataset: dataset(dir.path(), "H"),
        query: wide_query(),
        order: 4,
        checkpoints: vec![3, 10, 21],
        test_objects: 2,
        ..HistoryConfig::default()
    };
    let raw = cfg.dataset.source().load("H").unwrap();
    let mut rng = rng_for(b"it/history", 4, 0);
    let table = sweep::history(&cfg, &raw, &mut rng).unwrap();
    assert_eq!(table.row_labels, vec!["3", "10", "21"]);
    assert_eq!(table.col_labels, vec!["SchemeA", "SchemeB", "SchemeC"]);
    assert!(table.is_complete());
    assert!(table.get(2, 0).unwrap() >= 0.0);
}

#[test]
fn five_row_dataset_at_order_eight() {
    let dir = tempfile::tempdir().unwrap();
    write_dataset(dir.path(), "five", 5);
    let raw = dataset(dir.path(), "five").source().load("five").unwrap();
    assert_eq!(raw.len(), 5);
    let rows = normalize(&raw, 8);
    assert!(rows.iter().all(|r| r.x <= 255 && r.y <= 255));

    let gen = QueryGen::new(HilbertCurve::new(8, 2).unwrap(), 3, DEFAULT_DIVISOR, None).unwrap();
    let mut rng = rng_for(b"it/five", 8, 0);
    let duration_ns = 40_000u64;
    let t = run_phased_single(100, 90, |_| {
        let q = gen.draw(&mut rng, &rows)?;
        assert_eq!(q.window.side_length, 7);
        assert!(q.window.x_start + 7 <= 256 && q.window.y_start + 7 <= 256);
        assert_eq!(q.cells.len(), 49);
        Ok(duration_ns)
    })
    .unwrap();

    assert_eq!(t.formal_count(), 10);
    assert_eq!(t.total_ns, 100 * duration_ns);
    assert!((t.total_ms() - 4.0).abs() < 1e-9);
    assert!((t.formal_avg_ms() - 0.04).abs() < 1e-12);
}

#[test]
fn missing_dataset_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = dataset(dir.path(), "nope");
    let err = cfg.source().load(&cfg.label).unwrap_err();
    assert!(matches!(err, HarnessError::Dataset { .. }));
}

#[test]
fn decreasing_checkpoints_abort_before_any_work() {
    let cfg = HistoryConfig {
        checkpoints: vec![500, 100],
        ..HistoryConfig::default()
    };
    let mut rng = rng_for(b"it/bad", 0, 0);
    let err = sweep::history(&cfg, &[], &mut rng).unwrap_err();
    assert!(matches!(err, HarnessError::Config(_)));
}
