// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Integration tests for builder validation and factory construction.

use std::time::Duration;

use strata::{
    CacheConfig, CacheFactory, CacheManager, ExpirationConfig, HandleConfig, UpdateMode,
};
use strata_memory::MemoryHandle;
use strata_tier::{CacheItem, DynamicHandle, ExpirationMode};

fn memory_factory() -> CacheFactory<i32> {
    CacheFactory::new().register_handle("memory", |config: &HandleConfig| {
        let mut builder = MemoryHandle::builder()
            .name(config.name.clone())
            .stats_enabled(config.stats);
        if let Some(expiration) = config.expiration {
            builder = builder.default_expiration(expiration.mode, expiration.timeout);
        }
        Ok(DynamicHandle::new(builder.build()))
    })
}

fn handle_config(name: &str) -> HandleConfig {
    HandleConfig {
        kind: "memory".to_string(),
        name: name.to_string(),
        backplane_source: false,
        expiration: None,
        stats: true,
    }
}

#[test]
fn a_manager_requires_at_least_one_handle() {
    let err = CacheManager::<i32>::builder("empty")
        .build()
        .expect_err("empty tier stack should be rejected");
    assert!(err.is_configuration());
}

#[test]
fn duplicate_handle_names_are_rejected() {
    let err = CacheManager::builder("dupes")
        .handle(MemoryHandle::<i32>::builder().name("l1").build())
        .handle(MemoryHandle::<i32>::builder().name("l1").build())
        .build()
        .expect_err("duplicate names should be rejected");
    assert!(err.is_configuration());
    assert!(err.to_string().contains("l1"));
}

#[tokio::test]
async fn a_backplane_requires_a_source_handle() {
    let err = CacheManager::builder("no-source")
        .handle(MemoryHandle::<i32>::new())
        .backplane(stub::StubBackplane)
        .build()
        .expect_err("backplane without source should be rejected");
    assert!(err.is_configuration());
}

/// A do-nothing backplane, enough to exercise builder validation without
/// pulling the real transport crate into this crate's dev-dependencies.
mod stub {
    use strata_tier::{Backplane, BackplaneEvent, Result};
    use tokio::sync::mpsc;

    #[derive(Debug)]
    pub struct StubBackplane;

    impl Backplane for StubBackplane {
        fn instance_id(&self) -> &str {
            "stub"
        }

        fn channel(&self) -> &str {
            "stub"
        }

        async fn publish(&self, _event: BackplaneEvent) -> Result<()> {
            Ok(())
        }

        fn subscribe(&self) -> mpsc::UnboundedReceiver<BackplaneEvent> {
            let (_tx, rx) = mpsc::unbounded_channel();
            rx
        }
    }
}

#[tokio::test]
async fn the_factory_builds_a_working_manager_from_config() {
    let config = CacheConfig {
        name: "from-config".to_string(),
        update_mode: UpdateMode::Up,
        handles: vec![handle_config("l1"), handle_config("l2")],
        backplane: None,
        serializer: None,
    };

    let manager = memory_factory().build(&config).unwrap();
    assert_eq!(manager.handle_count(), 2);
    assert_eq!(manager.name(), "from-config");
    assert_eq!(manager.update_mode(), UpdateMode::Up);

    manager.put(CacheItem::new("k", 1).unwrap()).await.unwrap();
    assert_eq!(manager.get("k").await.unwrap(), Some(1));
}

#[tokio::test]
async fn the_factory_applies_handle_expiration_defaults() {
    let mut config = CacheConfig {
        name: "expiring".to_string(),
        update_mode: UpdateMode::Up,
        handles: vec![handle_config("l1")],
        backplane: None,
        serializer: None,
    };
    config.handles[0].expiration = Some(ExpirationConfig {
        mode: ExpirationMode::Absolute,
        timeout: Duration::from_millis(60),
    });

    let manager = memory_factory().build(&config).unwrap();
    manager.put(CacheItem::new("k", 1).unwrap()).await.unwrap();

    tokio::time::sleep(Duration::from_millis(120)).await;
    assert_eq!(manager.get("k").await.unwrap(), None);
}

#[test]
fn an_unknown_handle_kind_names_the_offending_entry() {
    let config = CacheConfig {
        name: "unknown".to_string(),
        update_mode: UpdateMode::Up,
        handles: vec![HandleConfig {
            kind: "redis".to_string(),
            name: "shared".to_string(),
            backplane_source: false,
            expiration: None,
            stats: true,
        }],
        backplane: None,
        serializer: None,
    };

    let err = memory_factory().build(&config).expect_err("unknown kind should fail");
    assert!(err.is_configuration());
    let message = err.to_string();
    assert!(message.contains("redis"));
    assert!(message.contains("shared"));
}

#[test]
fn an_unknown_backplane_kind_names_the_offending_entry() {
    let config = CacheConfig {
        name: "unknown-backplane".to_string(),
        update_mode: UpdateMode::Up,
        handles: vec![handle_config("l1")],
        backplane: Some(strata::BackplaneConfig {
            kind: "redis".to_string(),
            channel: "c".to_string(),
        }),
        serializer: None,
    };

    let err = memory_factory().build(&config).expect_err("unknown kind should fail");
    assert!(err.is_configuration());
    assert!(err.to_string().contains("redis"));
}

#[test]
fn factory_errors_surface_before_any_handle_is_built() {
    // The factory resolves constructors in declared order; a bad entry in
    // the middle fails the whole build.
    let config = CacheConfig {
        name: "mixed".to_string(),
        update_mode: UpdateMode::Full,
        handles: vec![
            handle_config("l1"),
            HandleConfig {
                kind: "nope".to_string(),
                name: "l2".to_string(),
                backplane_source: false,
                expiration: None,
                stats: true,
            },
        ],
        backplane: None,
        serializer: None,
    };

    assert!(memory_factory().build(&config).is_err());
}
