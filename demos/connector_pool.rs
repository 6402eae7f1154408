//! Connector pool example for singleton-pool.
//!
//! Demonstrates:
//! - Many threads racing to build the one connector pool for a key
//! - Exactly one (slow) construction, every thread sharing the same pool
//! - Threads beyond the pool's capacity being told it is exhausted
//!
//! Run with: `cargo run --example connector_pool -- --threads 10 --capacity 5`
//! Set `RUST_LOG=singleton_pool=debug` to watch the registry at work.

use anyhow::Context;
use clap::Parser;
use singleton_pool::{BoundedPool, RegistryEvent, SingletonRegistry, DEFAULT_CAPACITY};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "connector_pool")]
#[command(about = "Race threads on a lazily built connector pool", long_about = None)]
struct Cli {
    /// Number of threads asking for a connector
    #[arg(long, default_value_t = 10)]
    threads: usize,

    /// Connectors in the pool
    #[arg(long, default_value_t = DEFAULT_CAPACITY)]
    capacity: usize,

    /// Time the pool takes to build, which widens the construction race
    #[arg(long, default_value_t = 100)]
    init_delay_ms: u64,

    /// Registry key of the pool
    #[arg(long, default_value = "connectors")]
    key: String,
}

fn main() -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive("singleton_pool=info".parse().context("invalid log directive")?);
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();

    println!("=== singleton-pool: Connector Pool ===\n");

    let registry: Arc<SingletonRegistry<String>> = Arc::new(SingletonRegistry::new());

    let waits = Arc::new(AtomicUsize::new(0));
    let waits_clone = waits.clone();
    registry.set_trace_callback(move |event| {
        if matches!(event, RegistryEvent::Wait { .. }) {
            waits_clone.fetch_add(1, Ordering::Relaxed);
        }
    });

    // -------------------------------------------------------------------------
    // 1. Race the threads on first access
    // -------------------------------------------------------------------------
    println!(
        "1. Spawning {} threads for key {:?} (capacity {})...",
        cli.threads, cli.key, cli.capacity
    );

    let constructions = Arc::new(AtomicUsize::new(0));
    let handles: Vec<_> = (0..cli.threads)
        .map(|i| {
            let registry = registry.clone();
            let constructions = constructions.clone();
            let key = cli.key.clone();
            let capacity = cli.capacity;
            let delay = Duration::from_millis(cli.init_delay_ms);

            thread::spawn(move || -> anyhow::Result<()> {
                let pool = registry.get_or_init(key, || {
                    thread::sleep(delay);
                    constructions.fetch_add(1, Ordering::SeqCst);
                    BoundedPool::new(capacity)
                })?;

                match pool.acquire() {
                    Some(handle) => println!(
                        "   thread {:>2}: pool {} -> connector {}",
                        i,
                        pool.id(),
                        handle.unit()
                    ),
                    None => println!("   thread {:>2}: pool {} -> exhausted", i, pool.id()),
                }
                Ok(())
            })
        })
        .collect();

    for handle in handles {
        handle
            .join()
            .map_err(|_| anyhow::anyhow!("worker thread panicked"))??;
    }

    // -------------------------------------------------------------------------
    // 2. Summary
    // -------------------------------------------------------------------------
    println!("\n2. Summary...");

    let pool: Arc<BoundedPool> = registry.get(&cli.key)?;
    println!("   constructions:          {}", constructions.load(Ordering::SeqCst));
    println!("   threads that waited:    {}", waits.load(Ordering::Relaxed));
    println!("   connectors handed out:  {}", pool.outstanding());
    println!("   connectors left:        {}", pool.available());

    println!("\n=== Example completed successfully! ===");
    Ok(())
}
