//! Throughput comparison: lock-free ring buffer vs. a lock-guarded queue.
//!
//! One producer thread moves the integers `1..=N` to one consumer thread,
//! which checks that they arrive in order.
//!
//! Usage:
//!     cargo run --release --bin spsc-bench
//!
//! Environment variables:
//!     SPSC_ITEMS=50000000  Values moved per run
//!     SPSC_CAPACITY=256    Ring buffer capacity
//!     SPSC_TRIALS=1        Runs per variant
//!     PRODUCER_CPU=0       Pin the producer thread (default: unpinned)
//!     CONSUMER_CPU=2       Pin the consumer thread (default: unpinned)

use std::collections::VecDeque;
use std::env;
use std::io;
use std::num::ParseIntError;
use std::sync::RwLock;
use std::thread;

use spsc_ring::wait::{Timeout, Yield};
use spsc_ring::{DEFAULT_CAPACITY, RingBuffer, Trials, init_tracing, mono_time_ns};
use thiserror::Error;

/// Mismatches reported individually before the output is cut short.
const REPORTED_MISMATCHES: u64 = 10;

#[derive(Debug, Error)]
enum ConfigError {
    #[error("{name}={value:?} is not a valid count: {source}")]
    Invalid {
        name: &'static str,
        value: String,
        source: ParseIntError,
    },
    #[error("{name} must be greater than zero")]
    Zero { name: &'static str },
}

#[derive(Debug, Clone, Copy)]
struct BenchConfig {
    items: u64,
    capacity: usize,
    trials: usize,
    producer_cpu: Option<usize>,
    consumer_cpu: Option<usize>,
}

impl BenchConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|name| env::var(name).ok())
    }

    /// Builds the configuration from a variable lookup.
    fn from_vars(var: impl Fn(&'static str) -> Option<String>) -> Result<Self, ConfigError> {
        let count = |name: &'static str| parse_count(name, var(name));
        Ok(Self {
            items: nonzero("SPSC_ITEMS", count("SPSC_ITEMS")?.unwrap_or(50_000_000))?,
            capacity: nonzero(
                "SPSC_CAPACITY",
                count("SPSC_CAPACITY")?.unwrap_or(DEFAULT_CAPACITY as u64),
            )? as usize,
            trials: nonzero("SPSC_TRIALS", count("SPSC_TRIALS")?.unwrap_or(1))? as usize,
            producer_cpu: count("PRODUCER_CPU")?.map(|id| id as usize),
            consumer_cpu: count("CONSUMER_CPU")?.map(|id| id as usize),
        })
    }
}

/// Parses an optional variable as a count; a missing variable is `None`.
fn parse_count(name: &'static str, value: Option<String>) -> Result<Option<u64>, ConfigError> {
    let Some(value) = value else {
        return Ok(None);
    };
    value
        .trim()
        .parse()
        .map(Some)
        .map_err(|source| ConfigError::Invalid {
            name,
            value,
            source,
        })
}

fn nonzero(name: &'static str, count: u64) -> Result<u64, ConfigError> {
    if count == 0 {
        Err(ConfigError::Zero { name })
    } else {
        Ok(count)
    }
}

fn pin_to_cpu(cpu: Option<usize>) {
    if let Some(id) = cpu
        && !core_affinity::set_for_current(core_affinity::CoreId { id })
    {
        eprintln!("could not pin thread to CPU {id}");
    }
}

/// Timings of one run, in nanoseconds.
#[derive(Debug, Clone, Copy)]
struct Run {
    producer_ns: u64,
    consumer_ns: u64,
    mismatches: u64,
}

impl Run {
    fn report(&self) {
        println!("producer finished: {}ms", self.producer_ns / 1_000_000);
        println!("consumer finished: {}ms", self.consumer_ns / 1_000_000);
        if self.mismatches > 0 {
            println!("mismatches: {}", self.mismatches);
        }
    }
}

/// Consumer-side order check shared by both variants.
#[derive(Debug, Default)]
struct OrderCheck {
    mismatches: u64,
}

impl OrderCheck {
    #[inline(always)]
    fn check(&mut self, value: u64, expected: u64) {
        if value != expected {
            self.mismatches += 1;
            if self.mismatches <= REPORTED_MISMATCHES {
                println!("Error: unexpected value: ({value}) expected: ({expected})");
            }
        }
    }
}

fn joined<T>(result: thread::Result<T>, role: &str) -> io::Result<T> {
    result.map_err(|_| io::Error::other(format!("{role} thread panicked")))
}

fn run_lockfree(config: &BenchConfig) -> io::Result<Run> {
    let ring = RingBuffer::<u64>::new(config.capacity);
    let producer = ring
        .acquire_producer_end()
        .ok_or_else(|| io::Error::other("producer end already acquired"))?;
    let consumer = ring
        .acquire_consumer_end()
        .ok_or_else(|| io::Error::other("consumer end already acquired"))?;
    let BenchConfig {
        items,
        producer_cpu,
        consumer_cpu,
        ..
    } = *config;

    thread::scope(|s| {
        let producer = s.spawn(move || {
            pin_to_cpu(producer_cpu);
            let start = mono_time_ns();
            for i in 1..=items {
                if producer.enqueue_with(i, &mut Yield, Timeout::Infinite).is_err() {
                    break;
                }
            }
            mono_time_ns() - start
        });

        let consumer = s.spawn(move || {
            pin_to_cpu(consumer_cpu);
            let mut check = OrderCheck::default();
            let start = mono_time_ns();
            for expected in 1..=items {
                let Some(value) = consumer.dequeue_with(&mut Yield, Timeout::Infinite) else {
                    break;
                };
                check.check(value, expected);
            }
            (mono_time_ns() - start, check.mismatches)
        });

        let producer_ns = joined(producer.join(), "producer")?;
        let (consumer_ns, mismatches) = joined(consumer.join(), "consumer")?;
        Ok(Run {
            producer_ns,
            consumer_ns,
            mismatches,
        })
    })
}

/// The contrast queue: a reader-writer lock around a `VecDeque`. The
/// consumer peeks under the shared lock and pops under the exclusive one.
fn run_mutex(config: &BenchConfig) -> io::Result<Run> {
    let queue = RwLock::new(VecDeque::<u64>::new());
    let queue = &queue;
    let poisoned = || io::Error::other("queue lock poisoned");
    let BenchConfig {
        items,
        producer_cpu,
        consumer_cpu,
        ..
    } = *config;

    thread::scope(|s| {
        let producer = s.spawn(move || {
            pin_to_cpu(producer_cpu);
            let start = mono_time_ns();
            for i in 1..=items {
                queue.write().map_err(|_| poisoned())?.push_back(i);
            }
            Ok::<_, io::Error>(mono_time_ns() - start)
        });

        let consumer = s.spawn(move || {
            pin_to_cpu(consumer_cpu);
            let mut check = OrderCheck::default();
            let start = mono_time_ns();
            for expected in 1..=items {
                let value = loop {
                    let front = queue.read().map_err(|_| poisoned())?.front().copied();
                    match front {
                        Some(value) => break value,
                        None => thread::yield_now(),
                    }
                };
                // Only this thread pops, so the front is still `value`.
                queue.write().map_err(|_| poisoned())?.pop_front();
                check.check(value, expected);
            }
            Ok::<_, io::Error>((mono_time_ns() - start, check.mismatches))
        });

        let producer_ns = joined(producer.join(), "producer")??;
        let (consumer_ns, mismatches) = joined(consumer.join(), "consumer")??;
        Ok(Run {
            producer_ns,
            consumer_ns,
            mismatches,
        })
    })
}

fn main() -> io::Result<()> {
    init_tracing();

    let config = BenchConfig::from_env()
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err))?;
    println!(
        "items={} capacity={} trials={}",
        config.items, config.capacity, config.trials
    );

    let mut lockfree = Trials::with_capacity(config.trials);
    let mut mutex = Trials::with_capacity(config.trials);
    let mut mismatches = 0;

    for _ in 0..config.trials {
        println!("--- lockfree ---");
        let run = run_lockfree(&config)?;
        run.report();
        mismatches += run.mismatches;
        lockfree.push(run.consumer_ns.max(run.producer_ns) / 1_000);

        println!("--- mutex approach ---");
        let run = run_mutex(&config)?;
        run.report();
        mismatches += run.mismatches;
        mutex.push(run.consumer_ns.max(run.producer_ns) / 1_000);
    }

    // Wall time per run in microseconds.
    lockfree.sort();
    mutex.sort();
    lockfree.print_csv("lockfree_us");
    mutex.print_csv("mutex_us");

    if mismatches > 0 {
        return Err(io::Error::other(format!(
            "{mismatches} values arrived out of order"
        )));
    }
    Ok(())
}

#[cfg(all(test, not(loom)))]
mod tests {
    use super::*;

    fn config(items: u64, capacity: usize) -> BenchConfig {
        BenchConfig {
            items,
            capacity,
            trials: 1,
            producer_cpu: None,
            consumer_cpu: None,
        }
    }

    #[test]
    fn lockfree_run_delivers_in_order() {
        let run = run_lockfree(&config(100_000, 8)).unwrap();
        assert_eq!(run.mismatches, 0);
    }

    #[test]
    fn mutex_run_delivers_in_order() {
        let run = run_mutex(&config(100_000, 8)).unwrap();
        assert_eq!(run.mismatches, 0);
    }

    #[test]
    fn order_check_counts_mismatches() {
        let mut check = OrderCheck::default();
        check.check(1, 1);
        check.check(3, 2);
        assert_eq!(check.mismatches, 1);
    }

    fn vars(pairs: &[(&'static str, &'static str)]) -> impl Fn(&'static str) -> Option<String> {
        let pairs = pairs.to_vec();
        move |name| {
            pairs
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| value.to_string())
        }
    }

    #[test]
    fn missing_variables_use_defaults() {
        let config = BenchConfig::from_vars(vars(&[])).unwrap();
        assert_eq!(config.items, 50_000_000);
        assert_eq!(config.capacity, DEFAULT_CAPACITY);
        assert_eq!(config.trials, 1);
        assert_eq!(config.producer_cpu, None);
        assert_eq!(config.consumer_cpu, None);
    }

    #[test]
    fn variables_override_defaults() {
        let config = BenchConfig::from_vars(vars(&[
            ("SPSC_ITEMS", "1000"),
            ("SPSC_CAPACITY", " 16 "),
            ("SPSC_TRIALS", "3"),
            ("PRODUCER_CPU", "0"),
            ("CONSUMER_CPU", "2"),
        ]))
        .unwrap();
        assert_eq!(config.items, 1000);
        assert_eq!(config.capacity, 16);
        assert_eq!(config.trials, 3);
        assert_eq!(config.producer_cpu, Some(0));
        assert_eq!(config.consumer_cpu, Some(2));
    }

    #[test]
    fn malformed_count_is_reported_with_its_name() {
        let err = BenchConfig::from_vars(vars(&[("SPSC_ITEMS", "abc")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "SPSC_ITEMS", .. }));
        assert!(err.to_string().starts_with("SPSC_ITEMS=\"abc\" is not a valid count"));

        let err = BenchConfig::from_vars(vars(&[("PRODUCER_CPU", "-1")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "PRODUCER_CPU", .. }));
    }

    #[test]
    fn zero_counts_are_rejected() {
        for name in ["SPSC_ITEMS", "SPSC_CAPACITY", "SPSC_TRIALS"] {
            let err = BenchConfig::from_vars(vars(&[(name, "0")])).unwrap_err();
            assert!(
                matches!(err, ConfigError::Zero { name: rejected } if rejected == name),
                "{name}=0 must be rejected, got {err}"
            );
        }
    }

    #[test]
    fn parse_count_missing_is_none() {
        assert_eq!(parse_count("SPSC_ITEMS", None).unwrap(), None);
        assert_eq!(parse_count("SPSC_ITEMS", Some("42".into())).unwrap(), Some(42));
    }
}
