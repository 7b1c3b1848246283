//! Basic usage examples for the lock-free cache and the managed pool

use tiered_pool::{Factory, LockFreePool, ManagedResourcePool, PoolConfiguration};

fn main() {
    println!("=== tiered_pool - Basic Examples ===\n");

    // Example 1: Lock-free object cache
    lockfree_cache();

    // Example 2: Managed pool with configuration
    configured_pool();

    // Example 3: Exhaustion never blocks
    exhaustion();

    // Example 4: Metrics and health
    metrics_and_health();
}

fn lockfree_cache() {
    println!("1. Lock-free Cache:");
    let pool = LockFreePool::with_capacity(Factory::new(|| Vec::<u8>::with_capacity(256)), 4)
        .with_recycle(|buffer: &mut Vec<u8>| {
            buffer.clear();
            true
        });

    {
        let mut buffer = pool.rent().unwrap();
        buffer.extend_from_slice(b"hello");
        println!("   Rented buffer holding {} bytes", buffer.len());
        // Buffer automatically cached again when dropped
    }

    let buffer = pool.get().unwrap();
    println!("   Reused buffer is empty: {}", buffer.is_empty());
    println!("   Hits: {}, misses: {}\n", pool.hits(), pool.misses());
}

fn configured_pool() {
    println!("2. Configured Pool:");

    let config = PoolConfiguration::new()
        .with_name("connections")
        .with_min(2)
        .with_max(5);

    let pool = ManagedResourcePool::new(Factory::new(|| String::from("conn")), config).unwrap();

    {
        let _conn1 = pool.take().unwrap();
        let _conn2 = pool.take().unwrap();
        let _conn3 = pool.take().unwrap();
        println!("   Busy resources: {}", pool.busy_count());
        println!("   Free resources: {}", pool.free_count());
    }

    println!(
        "   After return - free: {} (hot {}, overflow {})\n",
        pool.free_count(),
        pool.hot_count(),
        pool.overflow_count()
    );
}

fn exhaustion() {
    println!("3. Exhaustion:");
    let pool = ManagedResourcePool::new(Factory::new(|| 42), PoolConfiguration::new().with_max(1)).unwrap();

    let first = pool.take();
    assert!(first.is_ok());
    println!("   First take: Success");

    match pool.take() {
        Ok(_) => println!("   Second take: Success"),
        Err(e) => println!("   Second take: {}", e),
    }

    drop(first);

    let third = pool.take();
    assert!(third.is_ok());
    println!("   Third take: Success\n");
}

fn metrics_and_health() {
    println!("4. Metrics and Health:");
    let pool = ManagedResourcePool::new(Factory::new(|| 0u64), PoolConfiguration::new().with_max(5)).unwrap();

    // Use some resources
    for _ in 0..10 {
        let _lease = pool.take().unwrap();
    }

    let metrics = pool.metrics();
    println!("   Total requests: {}", metrics.total_requests);
    println!("   Created: {}, reused: {}", metrics.created, metrics.reused);
    println!("   Hit rate: {:.1}%", metrics.hit_rate() * 100.0);
    println!("   Average take latency: {:?}", metrics.average_latency);

    let health = pool.health_status();
    println!("   Healthy: {}", health.is_healthy);
    println!("   Utilization: {:.1}%", health.utilization * 100.0);
}
