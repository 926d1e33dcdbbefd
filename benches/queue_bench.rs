#![allow(missing_docs, clippy::cast_possible_truncation)]

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use std::thread;
use std::time::Duration;

use quatre::{QueueError, mpmc, mpsc, spmc, spsc};

#[cfg(feature = "dev-profiling")]
mod profiling {
    use criterion::profiler::Profiler;
    use pprof::ProfilerGuard;
    use std::{fs::File, path::Path};

    pub struct FlamegraphProfiler<'a> {
        frequency: i32,
        active_profiler: Option<ProfilerGuard<'a>>,
    }

    impl FlamegraphProfiler<'_> {
        #[allow(dead_code)]
        pub const fn new(frequency: i32) -> Self {
            FlamegraphProfiler {
                frequency,
                active_profiler: None,
            }
        }
    }

    impl Profiler for FlamegraphProfiler<'_> {
        fn start_profiling(&mut self, _benchmark_id: &str, _benchmark_dir: &Path) {
            self.active_profiler = Some(ProfilerGuard::new(self.frequency).unwrap());
        }

        fn stop_profiling(&mut self, _benchmark_id: &str, benchmark_dir: &Path) {
            std::fs::create_dir_all(benchmark_dir).unwrap();
            let flamegraph_path = benchmark_dir.join("flamegraph.svg");
            let flamegraph_file = File::create(&flamegraph_path)
                .expect("File system error while creating flamegraph.svg");

            if let Some(profiler) = self.active_profiler.take() {
                profiler
                    .report()
                    .build()
                    .unwrap()
                    .flamegraph(flamegraph_file)
                    .expect("Error writing flamegraph");
            }
        }
    }
}

/// Single-threaded ping-pong: one offer immediately followed by one poll,
/// measuring the per-operation cost of each endpoint protocol.
fn bench_latency(c: &mut Criterion) {
    let mut group = c.benchmark_group("latency_ns_per_pair");
    group.measurement_time(Duration::from_secs(5));

    group.bench_function("spsc", |b| {
        let (mut producer, mut consumer) = spsc::channel::<u64>(1024).unwrap();
        b.iter(|| {
            producer.offer(black_box(42)).ok();
            black_box(consumer.poll().unwrap());
        });
    });

    group.bench_function("mpsc", |b| {
        let (producer, mut consumer) = mpsc::channel::<u64>(1024).unwrap();
        b.iter(|| {
            producer.offer(black_box(42)).ok();
            black_box(consumer.poll().unwrap());
        });
    });

    group.bench_function("spmc", |b| {
        let (mut producer, consumer) = spmc::channel::<u64>(1024).unwrap();
        b.iter(|| {
            producer.offer(black_box(42)).ok();
            black_box(consumer.poll().unwrap());
        });
    });

    group.bench_function("mpmc", |b| {
        let (producer, consumer) = mpmc::channel::<u64>(1024).unwrap();
        b.iter(|| {
            producer.offer(black_box(42)).ok();
            black_box(consumer.poll().unwrap());
        });
    });

    group.finish();
}

/// Batched drain against one-at-a-time polls on the SPSC endpoint.
fn bench_drain(c: &mut Criterion) {
    const BATCH: usize = 64;

    let mut group = c.benchmark_group("consume_batch_of_64");
    group.throughput(Throughput::Elements(BATCH as u64));

    group.bench_function("poll_loop", |b| {
        let (mut producer, mut consumer) = spsc::channel::<u64>(BATCH).unwrap();
        b.iter(|| {
            for i in 0..BATCH as u64 {
                producer.offer(i).unwrap();
            }
            while let Ok(value) = consumer.poll() {
                black_box(value);
            }
        });
    });

    group.bench_function("drain", |b| {
        let (mut producer, mut consumer) = spsc::channel::<u64>(BATCH).unwrap();
        b.iter(|| {
            for i in 0..BATCH as u64 {
                producer.offer(i).unwrap();
            }
            consumer.drain(
                |value| {
                    black_box(value);
                },
                BATCH,
            );
        });
    });

    group.finish();
}

fn run_mpmc_workload(producers: usize, consumers: usize, ops_per_producer: usize) {
    let (producer, consumer) = mpmc::channel::<u64>(4096).unwrap();
    let total = producers * ops_per_producer;

    let mut workers = Vec::with_capacity(producers + consumers);
    for _ in 0..producers {
        let producer = producer.clone();
        workers.push(thread::spawn(move || {
            for i in 0..ops_per_producer {
                let mut value = i as u64;
                loop {
                    match producer.offer(value) {
                        Ok(()) => break,
                        Err((v, QueueError::Full)) => {
                            value = v;
                            std::hint::spin_loop();
                        }
                        Err((_, e)) => panic!("unexpected queue error: {e:?}"),
                    }
                }
            }
        }));
    }

    let share = total / consumers;
    for _ in 0..consumers {
        let consumer = consumer.clone();
        workers.push(thread::spawn(move || {
            let mut taken = 0;
            while taken < share {
                match consumer.poll() {
                    Ok(value) => {
                        black_box(value);
                        taken += 1;
                    }
                    Err(QueueError::Empty) => std::hint::spin_loop(),
                    Err(e) => panic!("unexpected queue error: {e:?}"),
                }
            }
        }));
    }

    for worker in workers {
        worker.join().unwrap();
    }
}

/// Threaded MPMC throughput at a few contention levels.
fn bench_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("mpmc_throughput_ops_per_sec");
    group.sample_size(10);
    group.measurement_time(Duration::from_secs(10));

    for (producers, consumers, ops_per_producer) in [(1, 1, 100_000), (2, 2, 50_000), (4, 4, 25_000)]
    {
        let total = producers * ops_per_producer;
        group.throughput(Throughput::Elements(total as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{producers}p_{consumers}c")),
            &(producers, consumers, ops_per_producer),
            |b, &(producers, consumers, ops_per_producer)| {
                b.iter(|| run_mpmc_workload(producers, consumers, ops_per_producer));
            },
        );
    }

    group.finish();
}

#[cfg(feature = "dev-profiling")]
criterion_group! {
    name = benches;
    config = Criterion::default()
        .with_profiler(profiling::FlamegraphProfiler::new(100));
    targets = bench_latency, bench_drain, bench_throughput
}

#[cfg(not(feature = "dev-profiling"))]
criterion_group!(benches, bench_latency, bench_drain, bench_throughput);

criterion_main!(benches);
