use skq_bench::config::{rng_for, AllSchemesConfig};
use skq_bench::dataset::DatasetSource;
use skq_bench::report::Report;
use skq_bench::{sweep, HarnessError};

fn main() -> Result<(), HarnessError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cfg = AllSchemesConfig::default();
    cfg.validate()?;
    let source = cfg.dataset.source();
    let mut rng = rng_for(cfg.seed_tag.as_bytes(), 0, 0);

    let mut report = Report::new("Experiment 2: SchemeA vs SchemeB vs SchemeC");
    report.note(format!(
        "Order sweep: SchemeA/SchemeB index the full {} dataset; SchemeC indexes a random subset of 2^h rows",
        cfg.dataset.label
    ));
    report.note("SchemeC update time is one diagonal move per subset object");
    report.note(format!(
        "Search loops: {} warm-up + {} formal",
        cfg.timing.warm_up, cfg.timing.formal
    ));

    {
        let raw = source.load(&cfg.dataset.label)?;

        // ---- order ----
        let (update, search) = sweep::orders(&cfg, &raw, &mut rng)?;
        report.push(update);
        report.push(search);

        // ---- range ----
        report.push(sweep::ranges(&cfg, &raw, &mut rng)?);
    }

    // ---- dataset size ----
    report.push(sweep::dataset_sizes(&cfg, &source, &mut rng)?);

    report.persist(&cfg.out_path);
    Ok(())
}
