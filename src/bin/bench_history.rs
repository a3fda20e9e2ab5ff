use skq_bench::config::{rng_for, HistoryConfig};
use skq_bench::dataset::DatasetSource;
use skq_bench::report::Report;
use skq_bench::{sweep, HarnessError};

fn run(cfg: &HistoryConfig) -> Result<(), HarnessError> {
    cfg.validate()?;
    let raw = cfg.dataset.source().load(&cfg.dataset.label)?;
    let mut rng = rng_for(cfg.seed_tag.as_bytes(), u64::from(cfg.order), 0);

    log::info!(
        "history h={} checkpoints {:?}, {} test objects",
        cfg.order,
        cfg.checkpoints,
        cfg.test_objects
    );
    let table = sweep::history(cfg, &raw, &mut rng)?;

    let mut report = Report::new("Experiment 3: Keyword History (o_w) vs Search Time");
    report.note(format!(
        "Dataset: {}, R: {}%, h: {}, test objects: {}",
        cfg.dataset.label, cfg.query.range_percent, cfg.order, cfg.test_objects
    ));
    if cfg.include_range_only {
        report.note("SchemeC indexes a random subset of 2^h rows and ignores keywords");
    }
    report.push(table);
    report.persist(&cfg.out_path);
    Ok(())
}

fn main() -> Result<(), HarnessError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    run(&HistoryConfig::default())?;
    run(&HistoryConfig::order_8())?;
    Ok(())
}
