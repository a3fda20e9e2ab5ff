//! Warm-up / formal phase timing.
//!
//! A run of `total_loops` trials is split into a discarded warm-up prefix
//! and a measured formal suffix. Each trial may time several lanes (one per
//! scheme) against the same drawn workload.

use std::hint::black_box;
use std::time::Instant;

use crate::error::{HarnessError, Result};

pub const NANOS_PER_MS: f64 = 1e6;

/// Wall-clock nanoseconds spent in `f`, output kept alive via `black_box`.
pub fn time_call_ns<R>(f: impl FnOnce() -> R) -> (R, u64) {
    let t0 = Instant::now();
    let out = black_box(f());
    (out, t0.elapsed().as_nanos() as u64)
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PhasedTiming {
    pub total_loops: usize,
    pub warm_up: usize,
    /// Sum over every trial, warm-up included.
    pub total_ns: u64,
    /// Sum over trials `i >= warm_up` only.
    pub formal_ns: u64,
}

impl PhasedTiming {
    pub fn formal_count(&self) -> usize {
        self.total_loops - self.warm_up
    }

    pub fn total_ms(&self) -> f64 {
        self.total_ns as f64 / NANOS_PER_MS
    }

    pub fn formal_total_ms(&self) -> f64 {
        self.formal_ns as f64 / NANOS_PER_MS
    }

    pub fn formal_avg_ms(&self) -> f64 {
        self.formal_total_ms() / self.formal_count() as f64
    }

    fn record(&mut self, i: usize, ns: u64) {
        self.total_ns += ns;
        if i >= self.warm_up {
            self.formal_ns += ns;
        }
    }
}

pub fn check_phases(total_loops: usize, warm_up: usize) -> Result<()> {
    if warm_up >= total_loops {
        return Err(HarnessError::config(format!(
            "warm-up {warm_up} must be below total loops {total_loops}"
        )));
    }
    Ok(())
}

/// Runs `total_loops` trials. `trial(i, elapsed)` performs trial `i` and
/// writes the nanoseconds of each lane into `elapsed` (length `lanes`).
pub fn run_phased<F>(
    total_loops: usize,
    warm_up: usize,
    lanes: usize,
    mut trial: F,
) -> Result<Vec<PhasedTiming>>
where
    F: FnMut(usize, &mut [u64]) -> Result<()>,
{
    check_phases(total_loops, warm_up)?;
    let mut out = vec![
        PhasedTiming {
            total_loops,
            warm_up,
            ..Default::default()
        };
        lanes
    ];
    let mut elapsed = vec![0u64; lanes];

    for i in 0..total_loops {
        elapsed.fill(0);
        trial(i, &mut elapsed)?;
        for (t, &ns) in out.iter_mut().zip(&elapsed) {
            t.record(i, ns);
        }
        if i + 1 == warm_up {
            log::debug!("warm-up done after {warm_up} trials");
        }
    }
    Ok(out)
}

/// Single-lane convenience: `op(i)` returns the elapsed nanoseconds of trial `i`.
pub fn run_phased_single<F>(total_loops: usize, warm_up: usize, mut op: F) -> Result<PhasedTiming>
where
    F: FnMut(usize) -> Result<u64>,
{
    let mut lanes = run_phased(total_loops, warm_up, 1, |i, elapsed| {
        elapsed[0] = op(i)?;
        Ok(())
    })?;
    Ok(lanes.remove(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warm_up_samples_never_reach_the_average() {
        // first 9000 samples are huge, last 1000 are 1..=1000
        let t = run_phased_single(10_000, 9_000, |i| {
            Ok(if i < 9_000 { 1_000_000_000 } else { (i - 8_999) as u64 })
        })
        .unwrap();
        let formal_sum: u64 = (1..=1000u64).sum();
        assert_eq!(t.formal_ns, formal_sum);
        assert_eq!(t.formal_count(), 1000);
        assert_eq!(t.total_ns, 9_000 * 1_000_000_000 + formal_sum);
        let expected_avg = formal_sum as f64 / 1000.0 / NANOS_PER_MS;
        assert!((t.formal_avg_ms() - expected_avg).abs() < 1e-12);
    }

    #[test]
    fn fixed_duration_operation() {
        let duration_ns = 250_000u64;
        let t = run_phased_single(100, 90, |_| Ok(duration_ns)).unwrap();
        assert_eq!(t.total_ns, 100 * duration_ns);
        assert!((t.total_ms() - 25.0).abs() < 1e-9);
        assert!((t.formal_avg_ms() - 0.25).abs() < 1e-12);
    }

    #[test]
    fn lanes_are_tracked_independently() {
        let t = run_phased(10, 5, 2, |i, e| {
            e[0] = 1;
            e[1] = i as u64;
            Ok(())
        })
        .unwrap();
        assert_eq!((t[0].total_ns, t[0].formal_ns), (10, 5));
        assert_eq!((t[1].total_ns, t[1].formal_ns), (45, 5 + 6 + 7 + 8 + 9));
    }

    #[test]
    fn rejects_warm_up_covering_whole_run() {
        assert!(run_phased_single(10, 10, |_| Ok(1)).is_err());
        assert!(run_phased_single(10, 0, |_| Ok(1)).is_ok());
    }

    #[test]
    fn trial_errors_abort_the_run() {
        let mut calls = 0;
        let r = run_phased_single(10, 2, |i| {
            calls += 1;
            if i == 3 {
                Err(HarnessError::config("boom"))
            } else {
                Ok(1)
            }
        });
        assert!(r.is_err());
        assert_eq!(calls, 4);
    }

    #[test]
    fn time_call_returns_output() {
        let (v, ns) = time_call_ns(|| 2 + 2);
        assert_eq!(v, 4);
        assert!(ns < 1_000_000_000);
    }
}
