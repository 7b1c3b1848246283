// tiered_pool demo binary
// Run the fuller examples with: cargo run --example basic

use std::time::Duration;
use tiered_pool::{Factory, ManagedResourcePool, PoolConfiguration, PoolResult};
use tracing_subscriber::EnvFilter;

fn main() -> PoolResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")))
        .init();

    println!("=== tiered_pool ===");
    println!("See demos/ directory for usage examples");
    println!();

    let config = PoolConfiguration::new()
        .with_name("demo")
        .with_min(1)
        .with_max(4)
        .with_idle_eviction(Duration::from_millis(200))
        .with_sweep_interval(Duration::from_millis(100));
    let pool = ManagedResourcePool::new(Factory::new(|| String::from("connection")), config)?;

    {
        let leases = (0..3).map(|_| pool.take()).collect::<PoolResult<Vec<_>>>()?;
        println!("  Borrowed {} resources, busy = {}", leases.len(), pool.busy_count());
    }
    println!("  Returned all, free = {}", pool.free_count());

    std::thread::sleep(Duration::from_millis(500));
    println!("  After idle eviction, free = {}", pool.free_count());
    println!("  Cleared {} resources", pool.clear());
    Ok(())
}
