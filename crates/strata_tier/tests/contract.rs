// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg(feature = "test-util")]

//! Contract tests driven through the mock handle and the type-erased
//! wrapper.

use strata_tier::testing::{HandleOp, MockHandle};
use strata_tier::{CacheHandle, CacheItem, DynamicHandle, DynamicHandleExt, UpdateOutcome};

#[tokio::test]
async fn erased_handles_delegate_every_operation() {
    let mock = MockHandle::<i32>::new("erased");
    let handle: DynamicHandle<i32> = mock.clone().into_dynamic();

    assert!(handle.add(CacheItem::new("k", 1).unwrap()).await.unwrap());
    assert_eq!(*handle.get("k", None).await.unwrap().unwrap().value(), 1);
    assert_eq!(handle.count(), 1);
    assert_eq!(handle.name(), "erased");

    let outcome = handle.update("k", None, &|v| Some(v * 2), 3).await.unwrap();
    assert_eq!(*outcome.into_item().unwrap().value(), 2);

    assert!(handle.remove("k", None).await.unwrap());
    assert_eq!(handle.count(), 0);

    assert_eq!(
        mock.operations(),
        vec![
            HandleOp::Add("k".to_string(), None),
            HandleOp::Get("k".to_string(), None),
            HandleOp::Update("k".to_string(), None),
            HandleOp::Remove("k".to_string(), None),
        ]
    );
}

#[tokio::test]
async fn erased_handles_are_clone_and_share_state() {
    let handle = MockHandle::<i32>::new("shared").into_dynamic();
    let clone = handle.clone();

    handle.put(CacheItem::new("k", 1).unwrap()).await.unwrap();
    assert_eq!(*clone.get("k", None).await.unwrap().unwrap().value(), 1);
}

#[tokio::test]
async fn update_outcome_helpers() {
    let handle = MockHandle::<i32>::new("outcomes");

    let missing = handle.update("absent", None, &|v| Some(*v), 0).await.unwrap();
    assert_eq!(missing, UpdateOutcome::Missing);
    assert!(!missing.is_updated());
    assert!(missing.into_item().is_none());

    handle.add(CacheItem::new("k", 1).unwrap()).await.unwrap();
    let canceled = handle.update("k", None, &|_| None, 0).await.unwrap();
    assert_eq!(canceled, UpdateOutcome::Canceled);
}

#[test]
fn contract_types_are_send_and_sync() {
    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}
    assert_send::<DynamicHandle<String>>();
    assert_sync::<DynamicHandle<String>>();
    assert_send::<CacheItem<String>>();
    assert_sync::<CacheItem<String>>();
}
