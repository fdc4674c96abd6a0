// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! In-process channel backplane.
//!
//! [`ChannelBackplane`] connects managers living in the same process over a
//! shared per-channel broadcast hub. Messages cross the hub in their
//! serialized wire form, exactly as a networked transport would carry them,
//! and loopback suppression happens on the subscriber side by comparing the
//! sender identity.
//!
//! The hub is process-global and keyed by channel name: two instances
//! created with the same channel name see each other, instances on
//! different channels do not.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;

use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc};

use strata_tier::{Backplane, BackplaneEvent, BackplaneMessage, Error, Result};

/// Broadcast capacity per channel. A subscriber that falls further behind
/// than this loses invalidations (and logs that it did); delivery is
/// best-effort by contract.
const CHANNEL_CAPACITY: usize = 256;

static HUBS: OnceLock<Mutex<HashMap<String, broadcast::Sender<Vec<u8>>>>> = OnceLock::new();
static INSTANCE_COUNTER: AtomicU64 = AtomicU64::new(0);

fn hub(channel: &str) -> broadcast::Sender<Vec<u8>> {
    let hubs = HUBS.get_or_init(|| Mutex::new(HashMap::new()));
    let mut hubs = hubs.lock();
    hubs.entry(channel.to_string())
        .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
        .clone()
}

fn next_instance_id() -> String {
    format!(
        "{}-{}",
        std::process::id(),
        INSTANCE_COUNTER.fetch_add(1, Ordering::Relaxed)
    )
}

/// An in-process [`Backplane`] over a shared broadcast channel.
///
/// Each instance gets a process-unique identity; give every manager its own
/// instance so their messages can be told apart. Subscribing spawns a
/// forwarding task and therefore requires a running tokio runtime.
///
/// # Examples
///
/// ```no_run
/// use strata_backplane::ChannelBackplane;
/// use strata_tier::{Backplane, BackplaneEvent};
/// # async fn example() -> strata_tier::Result<()> {
///
/// let node_a = ChannelBackplane::new("sessions");
/// let node_b = ChannelBackplane::new("sessions");
///
/// let mut events = node_b.subscribe();
/// node_a
///     .publish(BackplaneEvent::Removed { key: "k".to_string(), region: None })
///     .await?;
/// let event = events.recv().await;
/// # let _ = event;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ChannelBackplane {
    instance_id: String,
    channel: String,
    sender: broadcast::Sender<Vec<u8>>,
}

impl ChannelBackplane {
    /// Creates a new instance on the given channel.
    #[must_use]
    pub fn new(channel: impl Into<String>) -> Self {
        let channel = channel.into();
        Self {
            instance_id: next_instance_id(),
            sender: hub(&channel),
            channel,
        }
    }
}

impl Backplane for ChannelBackplane {
    fn instance_id(&self) -> &str {
        &self.instance_id
    }

    fn channel(&self) -> &str {
        &self.channel
    }

    async fn publish(&self, event: BackplaneEvent) -> Result<()> {
        let message = BackplaneMessage {
            sender: self.instance_id.clone(),
            event,
        };
        let bytes = serde_json::to_vec(&message).map_err(Error::serialization)?;
        // A send error only means there are no subscribers right now, which
        // is not a failure for a best-effort transport.
        let _ = self.sender.send(bytes);
        Ok(())
    }

    fn subscribe(&self) -> mpsc::UnboundedReceiver<BackplaneEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut source = self.sender.subscribe();
        let own_id = self.instance_id.clone();

        tokio::spawn(async move {
            loop {
                match source.recv().await {
                    Ok(bytes) => {
                        let message: BackplaneMessage = match serde_json::from_slice(&bytes) {
                            Ok(message) => message,
                            Err(error) => {
                                tracing::warn!(error = %error, "dropping undecodable backplane message");
                                continue;
                            }
                        };
                        if message.sender == own_id {
                            continue;
                        }
                        if tx.send(message.event).is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "backplane subscriber lagged; invalidations were dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn events_reach_other_instances_on_the_channel() {
        let a = ChannelBackplane::new("test-events-reach");
        let b = ChannelBackplane::new("test-events-reach");

        let mut events = b.subscribe();
        a.publish(BackplaneEvent::Changed {
            key: "k".to_string(),
            region: Some("r".to_string()),
        })
        .await
        .unwrap();

        let event = events.recv().await.unwrap();
        assert_eq!(
            event,
            BackplaneEvent::Changed {
                key: "k".to_string(),
                region: Some("r".to_string()),
            }
        );
    }

    #[tokio::test]
    async fn own_events_are_suppressed() {
        let a = ChannelBackplane::new("test-loopback");
        let b = ChannelBackplane::new("test-loopback");

        let mut own = a.subscribe();
        let mut peer = b.subscribe();

        a.publish(BackplaneEvent::Cleared).await.unwrap();

        // The peer sees the event; the publisher's own subscription stays
        // quiet.
        assert_eq!(peer.recv().await.unwrap(), BackplaneEvent::Cleared);
        assert!(own.try_recv().is_err());
    }

    #[tokio::test]
    async fn channels_are_isolated() {
        let a = ChannelBackplane::new("test-isolated-1");
        let b = ChannelBackplane::new("test-isolated-2");

        let mut events = b.subscribe();
        a.publish(BackplaneEvent::Cleared).await.unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn publishing_without_subscribers_succeeds() {
        let a = ChannelBackplane::new("test-no-subscribers");
        a.publish(BackplaneEvent::Cleared).await.unwrap();
    }

    #[test]
    fn instance_ids_are_process_unique() {
        let a = ChannelBackplane::new("test-ids");
        let b = ChannelBackplane::new("test-ids");
        assert_ne!(a.instance_id(), b.instance_id());
    }
}
