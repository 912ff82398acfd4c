use msgslot_icc::BUF_LEN;
use std::path::PathBuf;
use std::time::Instant;

// ─── Statistics ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Stats {
    pub min: u64,
    pub max: u64,
    pub mean: f64,
    pub stddev: f64,
    pub p50: u64,
    pub p90: u64,
    pub p99: u64,
    pub p999: u64,
    pub count: usize,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct BenchResult {
    pub name: String,
    pub unit: String,
    pub stats: Stats,
}

pub fn compute_stats(samples: &mut [u64]) -> Stats {
    assert!(!samples.is_empty(), "cannot compute stats on empty samples");
    samples.sort_unstable();

    let count = samples.len();
    let sum: u64 = samples.iter().sum();
    let mean = sum as f64 / count as f64;

    let variance = samples
        .iter()
        .map(|&x| {
            let diff = x as f64 - mean;
            diff * diff
        })
        .sum::<f64>()
        / count as f64;

    Stats {
        min: samples[0],
        max: samples[count - 1],
        mean,
        stddev: variance.sqrt(),
        p50: percentile_sorted(samples, 50.0),
        p90: percentile_sorted(samples, 90.0),
        p99: percentile_sorted(samples, 99.0),
        p999: percentile_sorted(samples, 99.9),
        count,
    }
}

fn percentile_sorted(sorted: &[u64], pct: f64) -> u64 {
    let len = sorted.len();
    if len == 1 {
        return sorted[0];
    }
    let rank = (pct / 100.0 * len as f64).ceil() as usize;
    let idx = rank.saturating_sub(1).min(len - 1);
    sorted[idx]
}

// ─── Measurement Harness ────────────────────────────────────────────────────

/// Times `batches` runs of `batch_size` calls and reports ns per call.
/// Batching keeps `Instant::now()` overhead out of sub-100ns operations.
pub fn measure_batched<F: FnMut()>(
    name: &str,
    batches: usize,
    batch_size: usize,
    warmup: usize,
    mut f: F,
) -> BenchResult {
    for _ in 0..warmup * batch_size {
        f();
    }

    let mut samples = Vec::with_capacity(batches);
    for _ in 0..batches {
        let start = Instant::now();
        for _ in 0..batch_size {
            f();
        }
        let total = start.elapsed().as_nanos();
        let per_op = ((total + (batch_size as u128 / 2)) / batch_size as u128) as u64;
        samples.push(per_op.max(1));
    }

    BenchResult {
        name: name.to_string(),
        unit: "ns/op".to_string(),
        stats: compute_stats(&mut samples),
    }
}

// ─── Helpers ────────────────────────────────────────────────────────────────

pub fn temp_device_dir(label: &str) -> PathBuf {
    let pid = std::process::id();
    PathBuf::from(format!("/tmp/msgslot_bench_{label}_{pid}"))
}

/// A message of `len` bytes (clamped to 1..=BUF_LEN).
pub fn make_test_message(len: usize) -> Vec<u8> {
    let len = len.clamp(1, BUF_LEN);
    (0..len).map(|i| b'a' + (i % 26) as u8).collect()
}

pub fn print_table_header() {
    println!(
        "{:<36} {:>8} {:>8} {:>8} {:>8} {:>10}",
        "benchmark", "p50", "p90", "p99", "p99.9", "max"
    );
    println!("{}", "-".repeat(84));
}

pub fn print_result_row(r: &BenchResult) {
    let s = &r.stats;
    println!(
        "{:<36} {:>8} {:>8} {:>8} {:>8} {:>10}",
        r.name, s.p50, s.p90, s.p99, s.p999, s.max
    );
}

pub fn section_header(title: &str) {
    println!();
    println!("── {title} {}", "─".repeat(80usize.saturating_sub(title.len() + 4)));
}
