//! Async usage examples

use std::sync::Arc;
use std::time::Duration;
use tiered_pool::{Factory, ManagedResourcePool, PoolConfiguration};
use tokio::time::sleep;

#[tokio::main]
async fn main() {
    println!("=== tiered_pool - Async Examples ===\n");

    // Example 1: Async take
    async_take().await;

    // Example 2: Async with timeout
    async_with_timeout().await;

    // Example 3: Warmup off the runtime threads
    warmup().await;

    // Example 4: Concurrent access
    concurrent_access().await;
}

async fn async_take() {
    println!("1. Async Take:");
    let pool = ManagedResourcePool::new(Factory::new(|| 7), PoolConfiguration::default()).unwrap();

    {
        let lease = pool.take_async().await.unwrap();
        println!("   Got resource asynchronously: {}", *lease);
    }

    println!();
}

async fn async_with_timeout() {
    println!("2. Async with Timeout:");

    let config = PoolConfiguration::new()
        .with_max(1)
        .with_acquire_timeout(Duration::from_millis(100));

    let pool = ManagedResourcePool::new(Factory::new(|| 42), config).unwrap();

    // Hold the only resource
    let _held = pool.take().unwrap();

    // Wait for another (should time out)
    match pool.take_async().await {
        Ok(_) => println!("   Got resource"),
        Err(e) => println!("   Error: {}", e),
    }

    println!();
}

async fn warmup() {
    println!("3. Warmup:");

    let pool = ManagedResourcePool::new(
        Factory::new(|| {
            println!("   Creating new resource...");
            42
        }),
        PoolConfiguration::new().with_min(2).with_max(10),
    )
    .unwrap();

    println!("   Warming up pool with 5 resources...");
    let warmed = pool.warmup_async(5).await.unwrap();
    println!("   Warmed: {}, free: {}", warmed, pool.health_status().free_resources);

    // Take (should not create a new one)
    {
        let lease = pool.take().unwrap();
        println!("   Got pre-created resource: {}", *lease);
    }

    println!();
}

async fn concurrent_access() {
    println!("4. Concurrent Access:");

    let pool = Arc::new(
        ManagedResourcePool::new(
            Factory::new(|| 1),
            PoolConfiguration::new()
                .with_max(5)
                .with_acquire_timeout(Duration::from_millis(20)),
        )
        .unwrap(),
    );

    let mut handles = vec![];

    for i in 0..10 {
        let pool = Arc::clone(&pool);
        let handle = tokio::spawn(async move {
            match pool.take_async().await {
                Ok(lease) => {
                    println!("   Task {} got resource: {}", i, *lease);
                    sleep(Duration::from_millis(50)).await;
                }
                Err(e) => println!("   Task {} couldn't get resource: {}", i, e),
            }
        });
        handles.push(handle);
    }

    for handle in handles {
        handle.await.unwrap();
    }

    println!("   Final free: {}, busy: {}", pool.free_count(), pool.busy_count());
}
