use skq_bench::config::{rng_for, FilesOrdersConfig};
use skq_bench::dataset::DatasetSource;
use skq_bench::report::Report;
use skq_bench::{sweep, HarnessError};

fn main() -> Result<(), HarnessError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cfg = FilesOrdersConfig::default();
    cfg.validate()?;
    let raw = cfg.dataset.source().load(&cfg.dataset.label)?;
    let mut rng = rng_for(cfg.seed_tag.as_bytes(), 0, 0);

    let mut report = Report::new("Experiment 1: SchemeA vs SchemeB");
    report.note(format!("Dataset: {} ({} rows)", cfg.dataset.label, raw.len()));
    report.note(format!(
        "R: {}%, search loops: {} warm-up + {} formal",
        cfg.query.range_percent, cfg.timing.warm_up, cfg.timing.formal
    ));
    report.note("Update: add fileID then del (fileID+1) mod l per record");

    // ---- file space x order ----
    log::info!(
        "file space x order: {} x {} points",
        cfg.file_powers.len(),
        cfg.orders.len()
    );
    report.extend(sweep::file_space_grid(&cfg, &raw, &mut rng)?);

    // ---- query keyword count ----
    log::info!("query keyword counts {:?}", cfg.keyword_counts);
    report.push(sweep::keyword_counts(&cfg, &raw, &mut rng)?);

    report.persist(&cfg.out_path);
    Ok(())
}
