use std::hint::black_box;
use std::mem::{align_of, size_of};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};
use std::time::Instant;

use msgslot_icc::{
    BUF_LEN, Channel, EndpointId, EndpointRegistry, MessageBuffer, Session, ShmEndpoint,
    TableConfig,
};
use msgslot_perf::*;

const BATCHES: usize = 2_000;
const BATCH_SIZE: usize = 256;
const WARMUP: usize = 50;
const CONTENDED_SAMPLES: usize = 200_000;

fn main() {
    let json = std::env::args().any(|a| a == "--json");
    let mut results: Vec<BenchResult> = Vec::new();

    section_header("Memory Layout");
    println!("MessageBuffer  size={:>4}  align={:>2}", size_of::<MessageBuffer>(), align_of::<MessageBuffer>());
    println!("Channel        size={:>4}  align={:>2}", size_of::<Channel>(), align_of::<Channel>());
    if let Some(bytes) = msgslot_icc::shm_layout::bytes_for_endpoint(TableConfig::DEFAULT_SLOTS) {
        println!("Shared endpoint file ({} slots): {bytes} bytes", TableConfig::DEFAULT_SLOTS);
    }

    section_header("Uncontended (in-process)");
    print_table_header();
    section_uncontended(&mut results);

    section_header("Uncontended (shared file)");
    print_table_header();
    section_shared(&mut results);

    section_header("Contended read (one writer thread spinning)");
    print_table_header();
    section_contended(&mut results);

    if json {
        match serde_json::to_string_pretty(&results) {
            Ok(s) => println!("{s}"),
            Err(e) => eprintln!("failed to serialise results: {e}"),
        }
    }
}

fn record(results: &mut Vec<BenchResult>, r: BenchResult) {
    print_result_row(&r);
    results.push(r);
}

fn section_uncontended(results: &mut Vec<BenchResult>) {
    let registry = EndpointRegistry::new();
    let mut session = registry.open(EndpointId(0));
    session.bind(1).expect("bind failed");
    let mut buf = [0u8; BUF_LEN];

    for len in [1usize, 64, BUF_LEN] {
        let msg = make_test_message(len);
        record(
            results,
            measure_batched(&format!("write {len}B"), BATCHES, BATCH_SIZE, WARMUP, || {
                black_box(session.write(black_box(&msg))).ok();
            }),
        );
    }

    record(
        results,
        measure_batched("read 128B", BATCHES, BATCH_SIZE, WARMUP, || {
            black_box(session.read(&mut buf)).ok();
        }),
    );

    record(
        results,
        measure_batched("open + bind", BATCHES, BATCH_SIZE, WARMUP, || {
            let mut s = registry.open(EndpointId(1));
            black_box(s.bind(3)).ok();
        }),
    );
}

fn section_shared(results: &mut Vec<BenchResult>) {
    let dir = temp_device_dir("report");
    let endpoint = match ShmEndpoint::open_in(&dir, EndpointId(0), TableConfig::default()) {
        Ok(e) => Arc::new(e),
        Err(e) => {
            eprintln!("skipping shared section: {e}");
            return;
        }
    };
    let mut session = Session::open(Arc::clone(&endpoint));
    session.bind(1).expect("bind failed");
    let msg = make_test_message(64);
    let mut buf = [0u8; BUF_LEN];

    record(
        results,
        measure_batched("shared write 64B", BATCHES, BATCH_SIZE, WARMUP, || {
            black_box(session.write(black_box(&msg))).ok();
        }),
    );
    record(
        results,
        measure_batched("shared read 128B", BATCHES, BATCH_SIZE, WARMUP, || {
            black_box(session.read(&mut buf)).ok();
        }),
    );

    drop(session);
    drop(endpoint);
    let _ = std::fs::remove_dir_all(&dir);
}

fn section_contended(results: &mut Vec<BenchResult>) {
    let registry = Arc::new(EndpointRegistry::new());
    let stop = Arc::new(AtomicBool::new(false));
    let barrier = Arc::new(Barrier::new(2));

    let writer = {
        let registry = Arc::clone(&registry);
        let stop = Arc::clone(&stop);
        let barrier = Arc::clone(&barrier);
        std::thread::spawn(move || {
            let mut session = registry.open(EndpointId(0));
            session.bind(1).expect("bind failed");
            let msg = make_test_message(BUF_LEN);
            barrier.wait();
            let mut writes = 0u64;
            while !stop.load(Ordering::Relaxed) {
                session.write(&msg).ok();
                writes += 1;
            }
            writes
        })
    };

    let mut session = registry.open(EndpointId(0));
    session.bind(1).expect("bind failed");
    let mut buf = [0u8; BUF_LEN];
    barrier.wait();

    let mut samples = Vec::with_capacity(CONTENDED_SAMPLES);
    for _ in 0..CONTENDED_SAMPLES {
        let start = Instant::now();
        black_box(session.read(&mut buf)).ok();
        samples.push(start.elapsed().as_nanos() as u64);
    }
    stop.store(true, Ordering::Relaxed);
    let writes = writer.join().expect("writer thread panicked");

    record(
        results,
        BenchResult {
            name: "read under write load".to_string(),
            unit: "ns/op".to_string(),
            stats: compute_stats(&mut samples),
        },
    );
    println!("writer published {writes} messages during the run");
}
