// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Two managers sharing a distributed tier stand-in, kept coherent over
//! the channel backplane.

use std::time::Duration;

use strata::CacheManager;
use strata_backplane::ChannelBackplane;
use strata_memory::MemoryHandle;
use strata_tier::CacheItem;

#[tokio::main(flavor = "multi_thread")]
async fn main() -> strata::Result<()> {
    // One shared handle plays the role of the distributed tier.
    let shared = MemoryHandle::<String>::builder().name("shared").build();

    let node_a = CacheManager::builder("node-a")
        .handle(MemoryHandle::builder().name("a-local").build())
        .source_handle(shared.clone())
        .backplane(ChannelBackplane::new("sessions"))
        .build()?;

    let node_b = CacheManager::builder("node-b")
        .handle(MemoryHandle::builder().name("b-local").build())
        .source_handle(shared.clone())
        .backplane(ChannelBackplane::new("sessions"))
        .build()?;

    node_a.put(CacheItem::new("user:1", "alice".to_string())?).await?;
    println!("node b reads: {:?}", node_b.get("user:1").await?);

    // Node A overwrites; the backplane evicts node B's stale local copy.
    node_a.put(CacheItem::new("user:1", "alice2".to_string())?).await?;
    tokio::time::sleep(Duration::from_millis(50)).await;
    println!("node b reads after invalidation: {:?}", node_b.get("user:1").await?);

    node_a.remove("user:1").await?;
    tokio::time::sleep(Duration::from_millis(50)).await;
    println!("node b reads after removal: {:?}", node_b.get("user:1").await?);

    Ok(())
}
