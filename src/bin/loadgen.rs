//! benchtable Load Generator
//!
//! Preloads a table with random key-value pairs, then drives it from worker
//! threads that sample live keys, send them through the wire codec, and
//! check every HIT against the sampled item.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use benchtable::protocol::{self, ReplyType};
use benchtable::{Config, HashTable, KeyMatch, TableError};
use clap::Parser;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing_subscriber::{fmt, EnvFilter};

/// benchtable load generator
#[derive(Parser, Debug)]
#[command(name = "benchtable-loadgen")]
#[command(about = "Drive a benchtable hash table with a sampled GET/PUT/DELETE mix")]
#[command(version)]
struct Args {
    /// The table has 2^hash_power buckets
    #[arg(long, default_value = "16")]
    hash_power: u8,

    /// Number of key-value pairs to preload
    #[arg(short = 'n', long, default_value = "100000")]
    items: usize,

    /// Maximum key length (keys are 1..=max_key bytes)
    #[arg(long, default_value = "32")]
    max_key: usize,

    /// Maximum value length (values are 1..=max_value bytes)
    #[arg(long, default_value = "256")]
    max_value: usize,

    /// Use exactly max_key / max_value for every pair
    #[arg(long)]
    uniform: bool,

    /// Worker threads
    #[arg(short, long, default_value = "4")]
    threads: usize,

    /// Run time in seconds
    #[arg(short, long, default_value = "5")]
    seconds: u64,

    /// Percentage of operations that are PUTs
    #[arg(long, default_value = "10")]
    put_pct: u8,

    /// Percentage of operations that are DELETEs
    #[arg(long, default_value = "5")]
    delete_pct: u8,

    /// Seed for key generation and sampling
    #[arg(long)]
    seed: Option<u64>,

    /// Memory budget in MB
    #[arg(short = 'm', long, default_value = "1024")]
    memory_limit_mb: u64,

    /// Compare full keys instead of tags only
    #[arg(long)]
    exact_keys: bool,
}

/// Per-run operation counters
#[derive(Default)]
struct Counters {
    gets: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    mismatches: AtomicU64,
    puts: AtomicU64,
    put_rejections: AtomicU64,
    deletes: AtomicU64,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,benchtable=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    if args.max_key == 0 || args.max_value == 0 {
        tracing::error!("max_key and max_value must be at least 1");
        std::process::exit(1);
    }
    if u16::from(args.put_pct) + u16::from(args.delete_pct) > 100 {
        tracing::error!("put_pct + delete_pct must not exceed 100");
        std::process::exit(1);
    }

    tracing::info!("benchtable load generator v{}", benchtable::VERSION);

    let seed = args.seed.unwrap_or_else(rand::random);
    let mut builder = Config::builder()
        .hash_power(args.hash_power)
        .memory_limit(megabytes(args.memory_limit_mb))
        .sampler_seed(seed);
    if args.exact_keys {
        builder = builder.key_match(KeyMatch::Exact);
    }

    let table = match HashTable::new(builder.build()) {
        Ok(t) => t,
        Err(e) => {
            tracing::error!("Failed to create table: {}", e);
            std::process::exit(1);
        }
    };

    let started = Instant::now();
    let mut rng = StdRng::seed_from_u64(seed);
    let mut loaded = 0usize;
    for _ in 0..args.items {
        let (key, value) = random_pair(&mut rng, &args);
        match table.put(&key, &value) {
            Ok(_) => loaded += 1,
            Err(TableError::OutOfBudget { .. }) => {
                tracing::warn!(loaded, "memory budget reached during preload");
                break;
            }
            Err(e) => tracing::debug!("preload put failed: {}", e),
        }
    }
    tracing::info!(
        loaded,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "preload complete"
    );

    let counters = Counters::default();
    let stop = AtomicBool::new(false);
    let deadline = Duration::from_secs(args.seconds);

    let run = crossbeam::scope(|s| {
        for worker in 0..args.threads {
            let table = &table;
            let counters = &counters;
            let stop = &stop;
            let args = &args;
            s.spawn(move |_| {
                let mut rng = StdRng::seed_from_u64(seed ^ (worker as u64 + 1));
                while !stop.load(Ordering::Relaxed) {
                    run_one(table, counters, &mut rng, args);
                }
            });
        }

        std::thread::sleep(deadline);
        stop.store(true, Ordering::Relaxed);
    });

    if run.is_err() {
        tracing::error!("worker thread panicked");
        std::process::exit(1);
    }

    report(&table, &counters, deadline);

    if let Err(e) = table.tree().check_invariants() {
        tracing::error!("index invariant violated: {}", e);
        std::process::exit(1);
    }
    if let Err(e) = table.teardown() {
        tracing::error!("teardown failed: {}", e);
        std::process::exit(1);
    }
}

/// One sampled GET, PUT, or DELETE
fn run_one(table: &HashTable, counters: &Counters, rng: &mut StdRng, args: &Args) {
    let roll: u8 = rng.gen_range(0..100);

    if roll < args.put_pct {
        let (key, value) = random_pair(rng, args);
        counters.puts.fetch_add(1, Ordering::Relaxed);
        if table.put(&key, &value).is_err() {
            counters.put_rejections.fetch_add(1, Ordering::Relaxed);
        }
        return;
    }

    // Resolve the key and drop the pin before deleting in its bucket.
    let guard = match table.pick_random_live_item() {
        Ok(g) => g,
        Err(_) => return,
    };
    let frame = match protocol::encode_get_request(&guard) {
        Ok(f) => f,
        Err(e) => {
            tracing::debug!("skipping sample: {}", e);
            return;
        }
    };

    if roll < args.put_pct + args.delete_pct {
        let key = guard.key().to_vec();
        drop(guard);
        if let Ok(true) = table.delete(&key) {
            counters.deletes.fetch_add(1, Ordering::Relaxed);
        }
        return;
    }

    counters.gets.fetch_add(1, Ordering::Relaxed);
    let reply = protocol::decode_request(&frame)
        .and_then(|request| protocol::serve(table, &request))
        .and_then(|reply| protocol::encode_reply(&reply))
        .and_then(|bytes| protocol::decode_reply(&bytes));

    match reply {
        Ok(reply) if reply.reply_type == ReplyType::Miss => {
            counters.misses.fetch_add(1, Ordering::Relaxed);
        }
        Ok(reply) => {
            counters.hits.fetch_add(1, Ordering::Relaxed);
            if !protocol::verify_reply(&guard, &reply) {
                counters.mismatches.fetch_add(1, Ordering::Relaxed);
            }
        }
        Err(e) => tracing::debug!("request failed: {}", e),
    }
}

/// Megabytes to bytes, saturating at `u64::MAX`
fn megabytes(mb: u64) -> u64 {
    mb.saturating_mul(1024 * 1024)
}

/// Random alphabetic key and value sized per the command line
fn random_pair(rng: &mut StdRng, args: &Args) -> (Vec<u8>, Vec<u8>) {
    let key_len = if args.uniform {
        args.max_key
    } else {
        rng.gen_range(1..=args.max_key)
    };
    let value_len = if args.uniform {
        args.max_value
    } else {
        rng.gen_range(1..=args.max_value)
    };
    (random_alpha(rng, key_len), random_alpha(rng, value_len))
}

fn random_alpha(rng: &mut StdRng, len: usize) -> Vec<u8> {
    (0..len).map(|_| rng.gen_range(b'a'..=b'z')).collect()
}

fn report(table: &HashTable, counters: &Counters, elapsed: Duration) {
    let gets = counters.gets.load(Ordering::Relaxed);
    let puts = counters.puts.load(Ordering::Relaxed);
    let deletes = counters.deletes.load(Ordering::Relaxed);
    let total = gets + puts + deletes;
    let secs = elapsed.as_secs_f64().max(f64::EPSILON);

    println!("operations:   {} ({:.0} ops/s)", total, total as f64 / secs);
    println!(
        "gets:         {} (hit {} / miss {} / mismatch {})",
        gets,
        counters.hits.load(Ordering::Relaxed),
        counters.misses.load(Ordering::Relaxed),
        counters.mismatches.load(Ordering::Relaxed)
    );
    println!(
        "puts:         {} ({} rejected)",
        puts,
        counters.put_rejections.load(Ordering::Relaxed)
    );
    println!("deletes:      {}", deletes);
    println!("table:        {}", table.stats());
}
