use criterion::{black_box, criterion_group, criterion_main, Criterion};
use gatekeeper_rs::{CircuitBreaker, ManualClock, Strategy};
use std::error::Error;
use std::fmt;
use std::time::Duration;

// Custom error type that implements Error trait
#[derive(Debug)]
struct BenchError(String);

impl BenchError {
    fn new(msg: &str) -> Self {
        BenchError(msg.to_string())
    }
}

impl fmt::Display for BenchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Benchmark error: {}", self.0)
    }
}

impl Error for BenchError {}

fn successful_operation() -> Result<(), BenchError> {
    Ok(())
}

fn failing_operation() -> Result<(), BenchError> {
    Err(BenchError::new("Simulated failure"))
}

fn bench_allow_report_closed(c: &mut Criterion) {
    let breaker = CircuitBreaker::builder()
        .strategy(Strategy::failure_ratio(100, 0.5))
        .closed_window(Duration::from_secs(10))
        .build();

    c.bench_function("allow_report_closed", |b| {
        b.iter(|| {
            if let Ok(permit) = breaker.allow() {
                permit.success();
            }
        });
    });

    c.bench_function("call_closed_success", |b| {
        b.iter(|| black_box(breaker.call(successful_operation)));
    });
}

fn bench_open_rejection(c: &mut Criterion) {
    let breaker = CircuitBreaker::builder()
        .strategy(Strategy::consecutive_failures(1))
        .open_timeout(Duration::from_secs(3600))
        .build();
    let _ = breaker.call(failing_operation);

    c.bench_function("allow_open_rejected", |b| {
        b.iter(|| black_box(breaker.allow().is_err()));
    });
}

fn bench_trip_and_recover(c: &mut Criterion) {
    let clock = ManualClock::new();
    let breaker = CircuitBreaker::builder()
        .strategy(Strategy::consecutive_failures(5))
        .max_probes(3)
        .open_timeout(Duration::from_secs(1))
        .clock(clock.clone())
        .build();

    c.bench_function("trip_and_recover", |b| {
        b.iter(|| {
            // Make 5 failing calls to trip the breaker
            for _ in 0..5 {
                let _ = black_box(breaker.call(failing_operation));
            }

            // One open-circuit rejection
            let _ = black_box(breaker.call(successful_operation));

            clock.advance(Duration::from_secs(1));
            for _ in 0..3 {
                let _ = black_box(breaker.call(successful_operation));
            }
        });
    });
}

fn bench_concurrent(c: &mut Criterion) {
    use std::sync::{Arc, Barrier};
    use std::thread;

    let breaker = CircuitBreaker::builder()
        .strategy(Strategy::consecutive_failures(100))
        .build();

    const THREAD_COUNT: usize = 4;
    const ITERATIONS_PER_THREAD: usize = 1000;

    c.bench_function("concurrent_allow_report", |b| {
        b.iter(|| {
            let barrier = Arc::new(Barrier::new(THREAD_COUNT + 1));
            let mut handles = Vec::with_capacity(THREAD_COUNT);

            for _ in 0..THREAD_COUNT {
                let thread_breaker = breaker.clone();
                let thread_barrier = Arc::clone(&barrier);

                handles.push(thread::spawn(move || {
                    thread_barrier.wait();
                    for _ in 0..ITERATIONS_PER_THREAD {
                        let _ = black_box(thread_breaker.call(successful_operation));
                    }
                }));
            }

            // Start all threads simultaneously
            barrier.wait();

            for handle in handles {
                handle.join().unwrap();
            }
        });
    });
}

criterion_group!(
    benches,
    bench_allow_report_closed,
    bench_open_rejection,
    bench_trip_and_recover,
    bench_concurrent
);
criterion_main!(benches);
