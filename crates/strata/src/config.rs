// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Declarative configuration model for cache managers.
//!
//! A [`CacheConfig`] describes a manager the way a deployment manifest
//! would: an ordered list of handle descriptions, the update mode, and an
//! optional backplane. The model is plain data (serde-derived); feeding it
//! to a [`CacheFactory`](crate::CacheFactory) with registered constructors
//! produces a running manager. Programmatic construction through
//! [`CacheManagerBuilder`](crate::CacheManagerBuilder) does not use this
//! model at all.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use strata_tier::ExpirationMode;

/// Policy for propagating a successful update to other tiers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpdateMode {
    /// Leave other tiers untouched; earlier tiers re-fill on the next read.
    /// Reads do not promote either.
    None,
    /// Write the new value into the tiers above the one that performed the
    /// write.
    #[default]
    Up,
    /// Rewrite every tier with the new value.
    Full,
}

/// Default expiration a handle applies to items that defer to it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpirationConfig {
    /// The expiration mode.
    pub mode: ExpirationMode,
    /// The timeout; must be greater than zero for timed modes.
    pub timeout: Duration,
}

/// Declarative description of one handle in the tier stack.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandleConfig {
    /// Registry identifier of the handle implementation.
    pub kind: String,
    /// The handle's name, unique within the manager.
    pub name: String,
    /// Whether this handle is the shared tier whose changes the backplane
    /// broadcasts. Backplane invalidations skip source handles.
    #[serde(default)]
    pub backplane_source: bool,
    /// Default expiration for items that carry
    /// [`ExpirationMode::Default`].
    #[serde(default)]
    pub expiration: Option<ExpirationConfig>,
    /// Whether the handle records statistics.
    #[serde(default = "enabled")]
    pub stats: bool,
}

fn enabled() -> bool {
    true
}

/// Declarative description of a backplane.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackplaneConfig {
    /// Registry identifier of the backplane implementation.
    pub kind: String,
    /// The pub/sub channel name. Managers sharing a distributed tier must
    /// agree on it.
    pub channel: String,
}

/// Declarative description of a cache manager.
///
/// # Examples
///
/// ```
/// use strata::{CacheConfig, HandleConfig, UpdateMode};
///
/// let config = CacheConfig {
///     name: "orders".to_string(),
///     update_mode: UpdateMode::Up,
///     handles: vec![HandleConfig {
///         kind: "memory".to_string(),
///         name: "l1".to_string(),
///         backplane_source: false,
///         expiration: None,
///         stats: true,
///     }],
///     backplane: None,
///     serializer: None,
/// };
/// assert_eq!(config.handles.len(), 1);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// The manager's name, used in telemetry attributes.
    pub name: String,
    /// How successful writes propagate across tiers.
    #[serde(default)]
    pub update_mode: UpdateMode,
    /// Ordered handle descriptions, fastest tier first.
    pub handles: Vec<HandleConfig>,
    /// Optional backplane description.
    #[serde(default)]
    pub backplane: Option<BackplaneConfig>,
    /// Registry identifier of the serializer byte-oriented handle factories
    /// should use. The core never touches payload bytes itself.
    #[serde(default)]
    pub serializer: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_mode_defaults_to_up() {
        assert_eq!(UpdateMode::default(), UpdateMode::Up);
    }

    #[test]
    fn config_round_trips_through_serde() {
        let config = CacheConfig {
            name: "sessions".to_string(),
            update_mode: UpdateMode::Full,
            handles: vec![
                HandleConfig {
                    kind: "memory".to_string(),
                    name: "l1".to_string(),
                    backplane_source: false,
                    expiration: Some(ExpirationConfig {
                        mode: ExpirationMode::Sliding,
                        timeout: Duration::from_secs(60),
                    }),
                    stats: true,
                },
                HandleConfig {
                    kind: "memory".to_string(),
                    name: "shared".to_string(),
                    backplane_source: true,
                    expiration: None,
                    stats: false,
                },
            ],
            backplane: Some(BackplaneConfig {
                kind: "channel".to_string(),
                channel: "sessions".to_string(),
            }),
            serializer: Some("json".to_string()),
        };

        let json = serde_json::to_string(&config).unwrap();
        let decoded: CacheConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, config);
    }

    #[test]
    fn omitted_fields_take_defaults() {
        let json = r#"{
            "name": "c",
            "handles": [{"kind": "memory", "name": "l1"}]
        }"#;

        let config: CacheConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.update_mode, UpdateMode::Up);
        assert!(config.backplane.is_none());
        assert!(config.handles[0].stats);
        assert!(!config.handles[0].backplane_source);
    }
}
