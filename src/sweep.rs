//! Sweep controller.
//!
//! Each configuration point builds its own scheme instances, loads the
//! normalized dataset through `update`, runs the phased search and drops the
//! instances before the next point. Nothing is shared across points apart
//! from the caller's random source.

use rand::seq::SliceRandom;
use rand::Rng;
use rand_chacha::ChaCha20Rng;

use crate::checkpoint::{self, Subject, TestObject};
use crate::config::{
    AllSchemesConfig, FilesOrdersConfig, HistoryConfig, QueryConfig, TimingConfig, DIMENSION,
};
use crate::dataset::{DataRow, DatasetSource, Point};
use crate::error::{HarnessError, Result};
use crate::hilbert::HilbertCurve;
use crate::normalize::{normalize, normalize_with, Bounds};
use crate::report::ResultTable;
use crate::schemes::{construct, lift, Scheme, SchemeKind, SchemeParams, UpdateOp};
use crate::timing::{run_phased, time_call_ns, PhasedTiming, NANOS_PER_MS};
use crate::workload::{Query, QueryGen};

/// One scheme under search, with the rows its query keywords are drawn from.
pub struct Lane<'a> {
    pub scheme: Box<dyn Scheme>,
    pub keyword_pool: &'a [DataRow],
}

// ---- building blocks ----

/// Feeds every row through `update` as an add. With `churn = Some(l)` each
/// add is followed by a del of `(file_id + 1) mod l`. Returns elapsed ns.
pub fn bulk_load(scheme: &mut dyn Scheme, rows: &[DataRow], churn: Option<u32>) -> Result<u64> {
    let kind = scheme.kind();
    let (r, ns) = time_call_ns(|| -> Result<()> {
        for row in rows {
            let p = row.point();
            lift(kind, scheme.update(p, &row.keywords, UpdateOp::Add, &[row.file_id]))?;
            if let Some(l) = churn {
                let shifted = ((u64::from(row.file_id) + 1) % u64::from(l)) as u32;
                lift(kind, scheme.update(p, &row.keywords, UpdateOp::Del, &[shifted]))?;
            }
        }
        Ok(())
    });
    r?;
    log::debug!(
        "{} loaded {} rows in {:.3} ms",
        kind.label(),
        rows.len(),
        ms(ns)
    );
    Ok(ns)
}

/// Moves every object one cell diagonally (clamped to the grid) as a del at
/// the old point followed by an add at the new one. Returns elapsed ns.
pub fn shift_all(scheme: &mut dyn Scheme, objects: &[DataRow], order: u32) -> Result<u64> {
    let kind = scheme.kind();
    let max = (1u64 << order) - 1;
    let (r, ns) = time_call_ns(|| -> Result<()> {
        for row in objects {
            let from = row.point();
            let to = Point {
                x: (from.x + 1).min(max),
                y: (from.y + 1).min(max),
            };
            lift(kind, scheme.update(from, &row.keywords, UpdateOp::Del, &[row.file_id]))?;
            lift(kind, scheme.update(to, &row.keywords, UpdateOp::Add, &[row.file_id]))?;
        }
        Ok(())
    });
    r?;
    Ok(ns)
}

/// Phased search over all lanes. Each trial draws one window shared by every
/// lane and a fresh keyword sample per lane.
pub fn search_phase(
    lanes: &mut [Lane<'_>],
    queries: &QueryGen,
    timing: &TimingConfig,
    rng: &mut ChaCha20Rng,
) -> Result<Vec<PhasedTiming>> {
    run_phased(timing.total_loops(), timing.warm_up, lanes.len(), |_, elapsed| {
        let (window, cells) = queries.cells(rng)?;
        let mut query = Query {
            window,
            cells,
            keywords: Vec::new(),
        };
        for (lane, ns) in lanes.iter_mut().zip(elapsed.iter_mut()) {
            query.keywords = queries.keywords(rng, lane.keyword_pool)?;
            let kind = lane.scheme.kind();
            let (r, t) = time_call_ns(|| lane.scheme.search(&query));
            lift(kind, r)?;
            *ns = t;
        }
        Ok(())
    })
}

/// A shuffled copy of `rows` cut to at most `size` entries.
pub fn subset(rows: &[DataRow], size: usize, rng: &mut ChaCha20Rng) -> Vec<DataRow> {
    let mut out = rows.to_vec();
    out.shuffle(rng);
    out.truncate(size);
    out
}

pub fn scheme_a(max_files: u32, order: u32, rng: &mut ChaCha20Rng) -> Result<Box<dyn Scheme>> {
    construct(
        SchemeParams::SchemeA {
            max_files,
            order,
            dimension: DIMENSION,
        },
        rng,
    )
}

pub fn scheme_b(
    query: &QueryConfig,
    max_files: u32,
    order: u32,
    rng: &mut ChaCha20Rng,
) -> Result<Box<dyn Scheme>> {
    construct(
        SchemeParams::SchemeB {
            security_bits: query.security_bits,
            range_predicate: query.range_predicate,
            max_files,
            order,
            dimension: DIMENSION,
        },
        rng,
    )
}

pub fn scheme_c(
    query: &QueryConfig,
    order: u32,
    objects: &[DataRow],
    rng: &mut ChaCha20Rng,
) -> Result<Box<dyn Scheme>> {
    construct(
        SchemeParams::SchemeC {
            security_bits: query.security_bits,
            order,
            objects: objects.iter().map(|r| (r.file_id, r.point())).collect(),
        },
        rng,
    )
}

fn query_gen(query: &QueryConfig, order: u32, keyword_count: Option<usize>) -> Result<QueryGen> {
    let curve = HilbertCurve::new(order, DIMENSION)?;
    QueryGen::new(curve, query.range_percent, query.divisor, keyword_count)
}

fn labels<T: ToString>(xs: &[T]) -> Vec<String> {
    xs.iter().map(ToString::to_string).collect()
}

fn scheme_labels(kinds: &[SchemeKind]) -> Vec<String> {
    kinds.iter().map(|k| k.label().to_string()).collect()
}

fn ms(ns: u64) -> f64 {
    ns as f64 / NANOS_PER_MS
}

fn require_rows(rows: &[DataRow]) -> Result<()> {
    if rows.is_empty() {
        return Err(HarnessError::config("dataset has no rows"));
    }
    Ok(())
}

// ---- file space x order ----

const AB: [SchemeKind; 2] = [SchemeKind::SchemeA, SchemeKind::SchemeB];
const ABC: [SchemeKind; 3] = [SchemeKind::SchemeA, SchemeKind::SchemeB, SchemeKind::SchemeC];

/// Schemes A and B over `max_files = 2^p` (columns) x order (rows), with
/// churn construction. Eight tables: update total, update average per
/// record, search total over all loops, search formal average; A before B
/// within each pair.
pub fn file_space_grid(
    cfg: &FilesOrdersConfig,
    raw: &[DataRow],
    rng: &mut ChaCha20Rng,
) -> Result<Vec<ResultTable>> {
    cfg.validate()?;
    require_rows(raw)?;
    let bounds = Bounds::of(raw);
    let rows_l = labels(&cfg.orders);
    let cols_l: Vec<String> = cfg.file_powers.iter().map(|p| format!("2^{p}")).collect();

    let metrics = [
        "Update Total Time (ms)",
        "Update Avg Time (ms)",
        "Search Total Time (ms)",
        "Search Avg Time (ms)",
    ];
    // [metric][scheme]
    let mut tables: Vec<[ResultTable; 2]> = metrics
        .iter()
        .map(|m| {
            AB.map(|k| {
                ResultTable::new(
                    format!("{} - {m}", k.label()),
                    "H \\ L",
                    rows_l.clone(),
                    cols_l.clone(),
                )
            })
        })
        .collect();

    for (c, &power) in cfg.file_powers.iter().enumerate() {
        let max_files = 1u32 << power;
        for (r, &order) in cfg.orders.iter().enumerate() {
            log::info!("file space 2^{power}, order {order}");
            let rows = normalize_with(raw, order, bounds);
            let queries = query_gen(&cfg.query, order, None)?;

            let mut lanes = vec![
                Lane {
                    scheme: scheme_a(max_files, order, rng)?,
                    keyword_pool: &rows,
                },
                Lane {
                    scheme: scheme_b(&cfg.query, max_files, order, rng)?,
                    keyword_pool: &rows,
                },
            ];
            let mut update_ns = [0u64; 2];
            for (lane, ns) in lanes.iter_mut().zip(update_ns.iter_mut()) {
                *ns = bulk_load(lane.scheme.as_mut(), &rows, Some(max_files))?;
            }
            let search = search_phase(&mut lanes, &queries, &cfg.timing, rng)?;
            drop(lanes);

            for s in 0..AB.len() {
                let total = ms(update_ns[s]);
                tables[0][s].set(r, c, total)?;
                tables[1][s].set(r, c, total / rows.len() as f64)?;
                tables[2][s].set(r, c, search[s].total_ms())?;
                tables[3][s].set(r, c, search[s].formal_avg_ms())?;
            }
            log::info!(
                "file space 2^{power}, order {order}: search avg A {:.4} ms, B {:.4} ms",
                search[0].formal_avg_ms(),
                search[1].formal_avg_ms()
            );
        }
    }
    Ok(tables.into_iter().flatten().collect())
}

/// Formal search average against the number of query keywords, schemes A
/// and B at a fixed file space and order. Add-only construction, fresh
/// instances per keyword count.
pub fn keyword_counts(
    cfg: &FilesOrdersConfig,
    raw: &[DataRow],
    rng: &mut ChaCha20Rng,
) -> Result<ResultTable> {
    cfg.validate()?;
    require_rows(raw)?;
    let order = cfg.keyword_order;
    let max_files = 1u32 << cfg.keyword_file_power;
    let rows = normalize(raw, order);
    let mut table = ResultTable::new(
        format!(
            "Search Avg Time vs |W_Q| (l=2^{}, h={order}) (ms)",
            cfg.keyword_file_power
        ),
        "|W_Q|",
        scheme_labels(&AB),
        labels(&cfg.keyword_counts),
    );

    for (c, &k) in cfg.keyword_counts.iter().enumerate() {
        log::info!("query keywords {k}");
        let queries = query_gen(&cfg.query, order, Some(k))?;
        let mut lanes = vec![
            Lane {
                scheme: scheme_a(max_files, order, rng)?,
                keyword_pool: &rows,
            },
            Lane {
                scheme: scheme_b(&cfg.query, max_files, order, rng)?,
                keyword_pool: &rows,
            },
        ];
        for lane in lanes.iter_mut() {
            bulk_load(lane.scheme.as_mut(), &rows, None)?;
        }
        let search = search_phase(&mut lanes, &queries, &cfg.timing, rng)?;
        for (s, t) in search.iter().enumerate() {
            table.set(s, c, t.formal_avg_ms())?;
        }
    }
    Ok(table)
}

// ---- all three schemes ----

/// Update totals and search averages against the order. A and B hold the
/// full dataset; C holds a shuffled subset of `min(2^h, N)` rows and its
/// update cost is one diagonal move per subset object.
pub fn orders(
    cfg: &AllSchemesConfig,
    raw: &[DataRow],
    rng: &mut ChaCha20Rng,
) -> Result<(ResultTable, ResultTable)> {
    cfg.validate()?;
    require_rows(raw)?;
    let bounds = Bounds::of(raw);
    let mut update = ResultTable::new(
        "Update Time (Total) vs h (ms)",
        "h",
        labels(&cfg.orders),
        scheme_labels(&ABC),
    );
    let mut search = ResultTable::new(
        "Search Time (Avg) vs h (ms)",
        "h",
        labels(&cfg.orders),
        scheme_labels(&ABC),
    );

    for (r, &order) in cfg.orders.iter().enumerate() {
        log::info!("order {order}");
        let rows = normalize_with(raw, order, bounds);
        let sub = subset(&rows, 1usize << order, rng);
        log::debug!("range-only subset holds {} rows", sub.len());
        let queries = query_gen(&cfg.query, order, None)?;

        let mut lanes = vec![
            Lane {
                scheme: scheme_a(cfg.max_files, order, rng)?,
                keyword_pool: &rows,
            },
            Lane {
                scheme: scheme_b(&cfg.query, cfg.max_files, order, rng)?,
                keyword_pool: &rows,
            },
        ];
        for (s, lane) in lanes.iter_mut().enumerate() {
            update.set(r, s, ms(bulk_load(lane.scheme.as_mut(), &rows, None)?))?;
        }
        lanes.push(Lane {
            scheme: scheme_c(&cfg.query, order, &sub, rng)?,
            keyword_pool: &sub,
        });

        let timings = search_phase(&mut lanes, &queries, &cfg.timing, rng)?;
        for (s, t) in timings.iter().enumerate() {
            search.set(r, s, t.formal_avg_ms())?;
        }
        let moved = shift_all(lanes[2].scheme.as_mut(), &sub, order)?;
        update.set(r, 2, ms(moved))?;
    }
    Ok((update, search))
}

/// Formal search average against the range percentage at the fixed order.
pub fn ranges(cfg: &AllSchemesConfig, raw: &[DataRow], rng: &mut ChaCha20Rng) -> Result<ResultTable> {
    cfg.validate()?;
    require_rows(raw)?;
    let order = cfg.fixed_order;
    let rows = normalize(raw, order);
    let mut table = ResultTable::new(
        format!("Search Time (Avg) vs R (h={order}) (ms)"),
        "R(%)",
        labels(&cfg.range_percents),
        scheme_labels(&ABC),
    );

    for (r, &percent) in cfg.range_percents.iter().enumerate() {
        log::info!("range {percent}%");
        let query = QueryConfig {
            range_percent: percent,
            ..cfg.query.clone()
        };
        let queries = query_gen(&query, order, None)?;
        let sub = subset(&rows, 1usize << order, rng);
        let mut lanes = load_abc(cfg, &rows, &sub, order, rng)?;
        let timings = search_phase(&mut lanes, &queries, &cfg.timing, rng)?;
        for (s, t) in timings.iter().enumerate() {
            table.set(r, s, t.formal_avg_ms())?;
        }
    }
    Ok(table)
}

/// Formal search average against the dataset size. Each dataset is
/// normalized against its own maxima and C indexes all of it.
pub fn dataset_sizes(
    cfg: &AllSchemesConfig,
    source: &dyn DatasetSource,
    rng: &mut ChaCha20Rng,
) -> Result<ResultTable> {
    cfg.validate()?;
    let order = cfg.fixed_order;
    let mut table = ResultTable::new(
        format!("Search Time (Avg) vs N (h={order}, R={}%) (ms)", cfg.query.range_percent),
        "N",
        cfg.size_labels.clone(),
        scheme_labels(&ABC),
    );

    for (r, label) in cfg.size_labels.iter().enumerate() {
        let raw = source.load(label)?;
        require_rows(&raw)?;
        log::info!("dataset {label}: {} rows", raw.len());
        let rows = normalize(&raw, order);
        drop(raw);
        let queries = query_gen(&cfg.query, order, None)?;
        let mut lanes = load_abc(cfg, &rows, &rows, order, rng)?;
        let timings = search_phase(&mut lanes, &queries, &cfg.timing, rng)?;
        for (s, t) in timings.iter().enumerate() {
            table.set(r, s, t.formal_avg_ms())?;
        }
    }
    Ok(table)
}

/// A and B loaded with `rows`, C set up over `c_rows`.
fn load_abc<'a>(
    cfg: &AllSchemesConfig,
    rows: &'a [DataRow],
    c_rows: &'a [DataRow],
    order: u32,
    rng: &mut ChaCha20Rng,
) -> Result<Vec<Lane<'a>>> {
    let mut a = scheme_a(cfg.max_files, order, rng)?;
    bulk_load(a.as_mut(), rows, None)?;
    let mut b = scheme_b(&cfg.query, cfg.max_files, order, rng)?;
    bulk_load(b.as_mut(), rows, None)?;
    let c = scheme_c(&cfg.query, order, c_rows, rng)?;
    Ok(vec![
        Lane {
            scheme: a,
            keyword_pool: rows,
        },
        Lane {
            scheme: b,
            keyword_pool: rows,
        },
        Lane {
            scheme: c,
            keyword_pool: c_rows,
        },
    ])
}

// ---- update history ----

/// Mean search time at each history checkpoint. Every test object gets
/// freshly built instances: A and B over the full dataset, C (when enabled)
/// over a `min(2^h, N)` subset with its own object drawn from that subset.
pub fn history(cfg: &HistoryConfig, raw: &[DataRow], rng: &mut ChaCha20Rng) -> Result<ResultTable> {
    cfg.validate()?;
    require_rows(raw)?;
    let order = cfg.order;
    let rows = normalize(raw, order);
    let kinds: &[SchemeKind] = if cfg.include_range_only { &ABC } else { &AB };
    let queries = query_gen(&cfg.query, order, None)?;

    let totals = checkpoint::simulate(
        &cfg.checkpoints,
        kinds.len(),
        cfg.test_objects,
        &queries,
        rng,
        |rng| {
            let target = TestObject::from(&rows[rng.gen_range(0..rows.len())]);
            let mut a = scheme_a(cfg.max_files, order, rng)?;
            bulk_load(a.as_mut(), &rows, None)?;
            let mut b = scheme_b(&cfg.query, cfg.max_files, order, rng)?;
            bulk_load(b.as_mut(), &rows, None)?;
            let mut subjects = vec![
                Subject {
                    scheme: a,
                    object: target.clone(),
                },
                Subject {
                    scheme: b,
                    object: target,
                },
            ];
            if cfg.include_range_only {
                let sub = subset(&rows, 1usize << order, rng);
                let object = TestObject::from(&sub[rng.gen_range(0..sub.len())]);
                subjects.push(Subject {
                    scheme: scheme_c(&cfg.query, order, &sub, rng)?,
                    object,
                });
            }
            Ok(subjects)
        },
    )?;

    let mut table = ResultTable::new(
        format!("Search Time vs o_w (h={order}, R={}%) (ms)", cfg.query.range_percent),
        "o_w",
        labels(&cfg.checkpoints),
        scheme_labels(kinds),
    );
    for (s, lane) in totals.mean_ms().iter().enumerate() {
        for (r, &v) in lane.iter().enumerate() {
            table.set(r, s, v)?;
        }
    }
    Ok(table)
}
