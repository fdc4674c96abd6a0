// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Cross-manager coherence tests: two managers sharing one distributed tier
//! stand-in, each with its own local tier and backplane instance.

use std::time::{Duration, Instant};

use strata::CacheManager;
use strata_backplane::ChannelBackplane;
use strata_memory::MemoryHandle;
use strata_tier::{CacheHandle, CacheItem};

/// Builds one "node": a private local tier in front of the shared tier,
/// coordinated over the given channel.
fn node(
    name: &str,
    shared: &MemoryHandle<String>,
    channel: &str,
) -> (CacheManager<String>, MemoryHandle<String>) {
    let local = MemoryHandle::<String>::builder()
        .name(format!("{name}-local"))
        .build();
    let manager = CacheManager::builder(name)
        .handle(local.clone())
        .source_handle(shared.clone())
        .backplane(ChannelBackplane::new(channel))
        .build()
        .unwrap();
    (manager, local)
}

/// Polls until the manager observes the expected value or the deadline
/// passes.
async fn eventually(
    manager: &CacheManager<String>,
    key: &str,
    expected: Option<&str>,
    within: Duration,
) {
    let deadline = Instant::now() + within;
    loop {
        let observed = manager.get(key).await.unwrap();
        if observed.as_deref() == expected {
            return;
        }
        assert!(
            Instant::now() < deadline,
            "value did not converge to {expected:?} within {within:?}, still {observed:?}"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn a_change_invalidates_peer_local_tiers() {
    let shared = MemoryHandle::<String>::builder().name("shared").build();
    let (a, _a_local) = node("a", &shared, "coherence-change");
    let (b, b_local) = node("b", &shared, "coherence-change");

    a.put(CacheItem::new("k", "v1".to_string()).unwrap()).await.unwrap();

    // B reads through and fills its local tier with v1.
    assert_eq!(b.get("k").await.unwrap().as_deref(), Some("v1"));
    assert!(b_local.get("k", None).await.unwrap().is_some());

    a.put(CacheItem::new("k", "v2".to_string()).unwrap()).await.unwrap();

    // The invalidation evicts B's stale local copy, so the next read
    // falls through to the shared tier.
    eventually(&b, "k", Some("v2"), Duration::from_millis(200)).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn a_nodes_own_messages_do_not_evict_its_local_tier() {
    let shared = MemoryHandle::<String>::builder().name("shared").build();
    let (a, a_local) = node("a", &shared, "coherence-loopback");
    let (_b, _b_local) = node("b", &shared, "coherence-loopback");

    a.put(CacheItem::new("k", "v1".to_string()).unwrap()).await.unwrap();

    // Give the listener time to (wrongly) react if loopback suppression
    // were broken.
    tokio::time::sleep(Duration::from_millis(100)).await;
    let local = a_local.get("k", None).await.unwrap();
    assert_eq!(local.map(|item| item.into_value()).as_deref(), Some("v1"));
}

#[tokio::test(flavor = "multi_thread")]
async fn a_remove_converges_on_the_peer() {
    let shared = MemoryHandle::<String>::builder().name("shared").build();
    let (a, _a_local) = node("a", &shared, "coherence-remove");
    let (b, _b_local) = node("b", &shared, "coherence-remove");

    assert!(a.add(CacheItem::new("k", "v".to_string()).unwrap()).await.unwrap());
    assert_eq!(b.get("k").await.unwrap().as_deref(), Some("v"));

    assert!(a.remove("k").await.unwrap());

    eventually(&b, "k", None, Duration::from_millis(200)).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn a_clear_empties_peer_local_tiers() {
    let shared = MemoryHandle::<String>::builder().name("shared").build();
    let (a, _a_local) = node("a", &shared, "coherence-clear");
    let (b, b_local) = node("b", &shared, "coherence-clear");

    a.put(CacheItem::new("k1", "v".to_string()).unwrap()).await.unwrap();
    a.put(CacheItem::new("k2", "v".to_string()).unwrap()).await.unwrap();
    assert_eq!(b.get("k1").await.unwrap().as_deref(), Some("v"));
    assert_eq!(b.get("k2").await.unwrap().as_deref(), Some("v"));

    a.clear().await.unwrap();

    let deadline = Instant::now() + Duration::from_millis(200);
    loop {
        if b_local.count() == 0 {
            break;
        }
        assert!(Instant::now() < deadline, "peer local tier was not cleared");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(b.get("k1").await.unwrap(), None);
}

#[tokio::test(flavor = "multi_thread")]
async fn a_region_clear_leaves_other_regions_on_the_peer() {
    let shared = MemoryHandle::<String>::builder().name("shared").build();
    let (a, _a_local) = node("a", &shared, "coherence-clear-region");
    let (b, b_local) = node("b", &shared, "coherence-clear-region");

    a.put(CacheItem::in_region("k", "r1", "one".to_string()).unwrap()).await.unwrap();
    a.put(CacheItem::in_region("k", "r2", "two".to_string()).unwrap()).await.unwrap();
    assert_eq!(b.get_in("k", "r1").await.unwrap().as_deref(), Some("one"));
    assert_eq!(b.get_in("k", "r2").await.unwrap().as_deref(), Some("two"));

    a.clear_region("r1").await.unwrap();

    let deadline = Instant::now() + Duration::from_millis(200);
    loop {
        if b_local.get("k", Some("r1")).await.unwrap().is_none() {
            break;
        }
        assert!(Instant::now() < deadline, "peer region was not cleared");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    assert_eq!(b.get_in("k", "r1").await.unwrap(), None);
    assert_eq!(b.get_in("k", "r2").await.unwrap().as_deref(), Some("two"));
}

#[tokio::test(flavor = "multi_thread")]
async fn managers_on_different_channels_do_not_interfere() {
    let shared = MemoryHandle::<String>::builder().name("shared").build();
    let (a, _a_local) = node("a", &shared, "coherence-iso-1");
    let (c, c_local) = node("c", &shared, "coherence-iso-2");

    a.put(CacheItem::new("k", "v1".to_string()).unwrap()).await.unwrap();
    assert_eq!(c.get("k").await.unwrap().as_deref(), Some("v1"));

    a.put(CacheItem::new("k", "v2".to_string()).unwrap()).await.unwrap();

    // C listens on a different channel, so its stale local copy survives.
    tokio::time::sleep(Duration::from_millis(100)).await;
    let local = c_local.get("k", None).await.unwrap();
    assert_eq!(local.map(|item| item.into_value()).as_deref(), Some("v1"));
}
