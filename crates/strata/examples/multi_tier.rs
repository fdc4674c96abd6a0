// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Two memory tiers behind one manager: write-through, promotion, and
//! optimistic updates.

use std::time::Duration;

use strata::{CacheManager, UpdateMode};
use strata_memory::MemoryHandle;
use strata_tier::{CacheHandle, CacheItem, ExpirationMode};

#[tokio::main(flavor = "current_thread")]
async fn main() -> strata::Result<()> {
    let l1 = MemoryHandle::<u64>::builder().name("l1").build();
    let l2 = MemoryHandle::<u64>::builder().name("l2").build();

    let cache = CacheManager::builder("example")
        .handle(l1.clone())
        .handle(l2.clone())
        .update_mode(UpdateMode::Up)
        .build()?;

    // Writes go through every tier.
    cache.put(CacheItem::new("hits", 0)?).await?;
    println!("l1 holds {} entries, l2 holds {}", l1.count(), l2.count());

    // A value evicted from the first tier is promoted back on read.
    l1.remove("hits", None).await?;
    let value = cache.get("hits").await?;
    println!("read through: {value:?}, l1 now holds {}", l1.count());

    // Optimistic increments never lose writes, even with racing callers.
    for _ in 0..10 {
        cache.update("hits", |hits| Some(hits + 1), 50).await?;
    }
    println!("after 10 updates: {:?}", cache.get("hits").await?);

    // Sliding entries stay alive while they are being read.
    let session = CacheItem::new("session", 1)?
        .with_expiration(ExpirationMode::Sliding, Duration::from_millis(200))?;
    cache.add(session).await?;
    tokio::time::sleep(Duration::from_millis(100)).await;
    println!("still cached: {:?}", cache.get("session").await?);
    tokio::time::sleep(Duration::from_millis(300)).await;
    println!("after idling: {:?}", cache.get("session").await?);

    for (name, stats) in cache.handle_stats() {
        let snapshot = stats.snapshot();
        println!(
            "{name}: {} gets, {} hits, {} misses",
            snapshot.get_calls, snapshot.hits, snapshot.misses
        );
    }

    Ok(())
}
