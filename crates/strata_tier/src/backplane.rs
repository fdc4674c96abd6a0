// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The backplane contract: out-of-band invalidation across nodes.
//!
//! A backplane is a pub/sub channel that keeps in-process tiers on multiple
//! nodes coherent with a shared distributed tier. Delivery is best-effort:
//! messages may be lost, duplicated, or reordered across keys, so the
//! operations applied by subscribers are idempotent (removals and clears,
//! never writes).

use std::fmt::Debug;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::Result;

/// A coherency event carried over the backplane.
///
/// `Changed` and `Removed` identify a single `(key, region)` entry; `Cleared`
/// and `ClearedRegion` are bulk invalidations. Subscribers react by removing
/// the affected entries from their local (non-source) tiers so the next read
/// falls through to the shared tier.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op")]
pub enum BackplaneEvent {
    /// An entry was written; local copies are stale.
    Changed {
        /// Key of the affected entry.
        key: String,
        /// Region of the affected entry, if any.
        region: Option<String>,
    },
    /// An entry was removed.
    Removed {
        /// Key of the affected entry.
        key: String,
        /// Region of the affected entry, if any.
        region: Option<String>,
    },
    /// Every entry was removed.
    Cleared,
    /// Every entry in one region was removed.
    ClearedRegion {
        /// The cleared region.
        region: String,
    },
}

/// The wire form of a backplane message: the originating node's identity
/// plus the event.
///
/// The channel name is part of the transport address, not the payload. The
/// sender identity is an opaque per-process value used for loopback
/// suppression: a node's own messages must never cause it to re-apply the
/// operation locally.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackplaneMessage {
    /// Opaque identity of the publishing backplane instance.
    pub sender: String,
    /// The coherency event.
    #[serde(flatten)]
    pub event: BackplaneEvent,
}

/// Trait for backplane transports.
///
/// Implementations publish [`BackplaneEvent`]s tagged with their own
/// instance identity and deliver events from *other* instances on the same
/// channel through the receiver handed out by [`subscribe`](Self::subscribe).
/// Loopback suppression is the implementation's responsibility; subscribers
/// must never see their own events.
///
/// Event delivery is single-consumer: each subscription feeds exactly one
/// receiver, and the manager drains it from a single task.
pub trait Backplane: Send + Sync + 'static {
    /// The opaque identity of this instance, unique per process.
    fn instance_id(&self) -> &str;

    /// The channel this instance publishes on and listens to.
    fn channel(&self) -> &str;

    /// Publishes an event to every other instance on the channel.
    ///
    /// Best-effort: transports may drop messages; implementations should not
    /// fail the publishing operation for missing subscribers.
    fn publish(&self, event: BackplaneEvent) -> impl Future<Output = Result<()>> + Send;

    /// Opens a subscription delivering events originated by other instances.
    fn subscribe(&self) -> mpsc::UnboundedReceiver<BackplaneEvent>;
}

/// Object-safe mirror of [`Backplane`].
trait ErasedBackplane: Send + Sync {
    fn instance_id(&self) -> &str;
    fn channel(&self) -> &str;
    fn publish<'a>(&'a self, event: BackplaneEvent) -> BoxFuture<'a, Result<()>>;
    fn subscribe(&self) -> mpsc::UnboundedReceiver<BackplaneEvent>;
}

impl<B> ErasedBackplane for B
where
    B: Backplane,
{
    fn instance_id(&self) -> &str {
        Backplane::instance_id(self)
    }

    fn channel(&self) -> &str {
        Backplane::channel(self)
    }

    fn publish<'a>(&'a self, event: BackplaneEvent) -> BoxFuture<'a, Result<()>> {
        Box::pin(Backplane::publish(self, event))
    }

    fn subscribe(&self) -> mpsc::UnboundedReceiver<BackplaneEvent> {
        Backplane::subscribe(self)
    }
}

/// A clonable, type-erased backplane.
pub struct DynamicBackplane(Arc<dyn ErasedBackplane>);

impl DynamicBackplane {
    /// Creates a new dynamic backplane from any [`Backplane`] implementation.
    pub fn new<B>(backplane: B) -> Self
    where
        B: Backplane,
    {
        Self(Arc::new(backplane))
    }
}

impl Debug for DynamicBackplane {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamicBackplane")
            .field("channel", &self.0.channel())
            .field("instance_id", &self.0.instance_id())
            .finish()
    }
}

impl Clone for DynamicBackplane {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl Backplane for DynamicBackplane {
    fn instance_id(&self) -> &str {
        self.0.instance_id()
    }

    fn channel(&self) -> &str {
        self.0.channel()
    }

    async fn publish(&self, event: BackplaneEvent) -> Result<()> {
        self.0.publish(event).await
    }

    fn subscribe(&self) -> mpsc::UnboundedReceiver<BackplaneEvent> {
        self.0.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_wire_format_is_flat() {
        let message = BackplaneMessage {
            sender: "node-1".to_string(),
            event: BackplaneEvent::Changed {
                key: "k".to_string(),
                region: Some("r".to_string()),
            },
        };

        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["sender"], "node-1");
        assert_eq!(json["op"], "Changed");
        assert_eq!(json["key"], "k");
        assert_eq!(json["region"], "r");
    }

    #[test]
    fn messages_round_trip() {
        let messages = [
            BackplaneMessage {
                sender: "a".to_string(),
                event: BackplaneEvent::Removed {
                    key: "k".to_string(),
                    region: None,
                },
            },
            BackplaneMessage {
                sender: "b".to_string(),
                event: BackplaneEvent::Cleared,
            },
            BackplaneMessage {
                sender: "c".to_string(),
                event: BackplaneEvent::ClearedRegion {
                    region: "r".to_string(),
                },
            },
        ];

        for message in messages {
            let bytes = serde_json::to_vec(&message).unwrap();
            let decoded: BackplaneMessage = serde_json::from_slice(&bytes).unwrap();
            assert_eq!(decoded, message);
        }
    }
}
