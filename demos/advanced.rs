//! Advanced features: hooks, idle eviction, stale-borrow repair, Prometheus

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;
use tiered_pool::{Factory, ManagedResourcePool, PoolConfiguration, PoolHooks, SweepReport};

#[derive(Debug)]
struct Connection {
    id: usize,
    open: bool,
}

static NEXT_ID: AtomicUsize = AtomicUsize::new(1);

impl Connection {
    fn connect() -> Self {
        Self {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            open: true,
        }
    }
}

struct ConnectionHooks;

impl PoolHooks<Connection> for ConnectionHooks {
    fn on_borrow_check(&self, conn: &Connection) -> bool {
        conn.open
    }

    fn on_return_check(&self, conn: &Connection) -> bool {
        conn.open
    }

    fn on_destroy(&self, conn: Connection) {
        println!("   Closing connection {}", conn.id);
    }

    fn on_sweep(&self, report: &SweepReport) {
        println!(
            "   Sweep: {} stale, {} evicted in {:?}",
            report.stale_reclaimed,
            report.evicted(),
            report.elapsed
        );
    }
}

fn main() {
    println!("=== tiered_pool - Advanced Features ===\n");

    // Example 1: Lifecycle hooks
    lifecycle_hooks();

    // Example 2: Idle eviction
    idle_eviction();

    // Example 3: Stale-borrow repair
    stale_borrow_repair();

    // Example 4: Prometheus metrics
    prometheus_export();
}

fn lifecycle_hooks() {
    println!("1. Lifecycle Hooks:");

    let pool = ManagedResourcePool::with_hooks(
        Factory::new(Connection::connect),
        PoolConfiguration::new().with_max(3),
        ConnectionHooks,
    )
    .unwrap();

    {
        let mut conn = pool.take().unwrap();
        println!("   Using: {:?}", *conn);
        // Broken connections are refused on return
        conn.open = false;
    }
    println!("   Free after broken return: {}", pool.free_count());

    {
        let conn = pool.take().unwrap();
        println!("   Using: {:?}", *conn);
    }
    println!("   Cleared {}\n", pool.clear());
}

fn idle_eviction() {
    println!("2. Idle Eviction:");

    let config = PoolConfiguration::new()
        .with_name("idle")
        .with_min(1)
        .with_max(10)
        .with_idle_eviction(Duration::from_millis(200))
        .with_sweep_interval(Duration::from_millis(100));

    let pool = ManagedResourcePool::with_hooks(Factory::new(Connection::connect), config, ConnectionHooks).unwrap();

    {
        let leases: Vec<_> = (0..4).map(|_| pool.take().unwrap()).collect();
        println!("   Borrowed {}", leases.len());
    }
    println!("   Free after return: {}", pool.free_count());

    println!("   Waiting for the sweeper...");
    thread::sleep(Duration::from_millis(500));
    println!("   Free after eviction: {}\n", pool.free_count());
}

fn stale_borrow_repair() {
    println!("3. Stale-borrow Repair:");

    let config = PoolConfiguration::new()
        .with_max(1)
        .with_stale_borrow(Duration::from_millis(100));

    let pool = ManagedResourcePool::with_hooks(Factory::new(Connection::connect), config, ConnectionHooks).unwrap();

    let leaked = pool.take().unwrap();
    println!("   Leaked connection {}", leaked.id);
    match pool.take() {
        Ok(_) => println!("   Second take: Success"),
        Err(e) => println!("   Second take: {}", e),
    }

    thread::sleep(Duration::from_millis(150));
    pool.sweep_now();
    println!("   Busy after repair: {}", pool.busy_count());

    let fresh = pool.take().unwrap();
    println!("   Fresh connection {}", fresh.id);
    println!("   Late return kept: {}\n", pool.put(leaked));
}

fn prometheus_export() {
    println!("4. Prometheus Metrics Export:");

    let pool = ManagedResourcePool::new(
        Factory::new(|| 0u32),
        PoolConfiguration::new().with_name("example_pool").with_max(5),
    )
    .unwrap();

    {
        let _lease1 = pool.take().unwrap();
        let _lease2 = pool.take().unwrap();

        let mut tags = HashMap::new();
        tags.insert("service".to_string(), "example".to_string());
        tags.insert("env".to_string(), "dev".to_string());

        match pool.export_metrics_prometheus(Some(&tags)) {
            Ok(text) => println!("{}", text),
            Err(e) => println!("   Export failed: {}", e),
        }
    }
}
