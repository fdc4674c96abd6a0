// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Error types for cache operations.

use std::error::Error as StdError;

/// An error from a cache operation.
///
/// The variants mirror the failure classes of the cache system:
/// configuration problems are fatal and surface at construction or at the
/// first offending call, argument problems are reported to the caller
/// unchanged, and store failures wrap the underlying error from a handle or
/// backplane transport while preserving the original typed error.
///
/// Not-found conditions are *not* errors: `get` returns `None`, `remove`
/// returns `false`, and `update` reports [`UpdateOutcome::Missing`].
///
/// [`UpdateOutcome::Missing`]: crate::UpdateOutcome::Missing
///
/// # For `CacheHandle` Implementers
///
/// Wrap storage-specific errors using [`store`](Self::store):
///
/// ```ignore
/// impl CacheHandle<V> for RedisHandle {
///     async fn get(&self, key: &str, region: Option<&str>) -> Result<Option<CacheItem<V>>> {
///         self.client.get(self.store_key(key, region)).await.map_err(Error::store)
///     }
/// }
/// ```
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Missing or invalid configuration. Raised at construction or at the
    /// first offending call; not recoverable.
    #[error("invalid cache configuration: {0}")]
    Configuration(String),

    /// An empty key or region, or a similarly malformed argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A failure inside a handle or backplane transport. Not retried by the
    /// manager; callers retry via `update` where applicable.
    #[error("store operation failed")]
    Store {
        /// The underlying transport or storage error.
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    /// A value could not be encoded or decoded by the configured serializer.
    #[error("serialization failed")]
    Serialization {
        /// The underlying serializer error.
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
}

impl Error {
    /// Creates a configuration error from a message.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Creates an argument error from a message.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Creates a store error wrapping a source error.
    ///
    /// This preserves the original error type for later extraction via
    /// [`source_as`](Self::source_as).
    ///
    /// # Examples
    ///
    /// ```
    /// use strata_tier::Error;
    ///
    /// let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "connection lost");
    /// let error = Error::store(io_err);
    ///
    /// assert!(error.source_as::<std::io::Error>().is_some());
    /// ```
    pub fn store(source: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        Self::Store {
            source: source.into(),
        }
    }

    /// Creates a serialization error wrapping a source error.
    pub fn serialization(source: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        Self::Serialization {
            source: source.into(),
        }
    }

    /// Returns `true` if this is a configuration error.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    /// Returns `true` if the source error is of type `T`.
    #[must_use]
    pub fn is_source<T: StdError + 'static>(&self) -> bool {
        self.source_as::<T>().is_some()
    }

    /// Returns the source error as type `T` if it matches.
    ///
    /// # Examples
    ///
    /// ```
    /// use strata_tier::Error;
    /// use std::io::{self, ErrorKind};
    ///
    /// let error = Error::store(io::Error::new(ErrorKind::TimedOut, "timeout"));
    ///
    /// if let Some(io_err) = error.source_as::<io::Error>() {
    ///     assert_eq!(io_err.kind(), ErrorKind::TimedOut);
    /// }
    /// ```
    #[must_use]
    pub fn source_as<T: StdError + 'static>(&self) -> Option<&T> {
        match self {
            Self::Store { source } | Self::Serialization { source } => {
                source.downcast_ref::<T>()
            }
            _ => None,
        }
    }
}

/// A specialized [`Result`] type for cache operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, ErrorKind};

    #[test]
    fn display_contains_message() {
        let error = Error::configuration("no handles configured");
        assert!(error.to_string().contains("configuration"));

        let error = Error::invalid_argument("key must not be empty");
        assert!(error.to_string().contains("key must not be empty"));
    }

    #[test]
    fn store_preserves_source_type() {
        let io_err = io::Error::new(ErrorKind::ConnectionRefused, "connection refused");
        let error = Error::store(io_err);

        assert!(error.is_source::<io::Error>());
        let extracted = error.source_as::<io::Error>().expect("should extract io::Error");
        assert_eq!(extracted.kind(), ErrorKind::ConnectionRefused);
    }

    #[test]
    fn source_as_returns_none_for_wrong_type() {
        let error = Error::store(io::Error::new(ErrorKind::NotFound, "not found"));

        assert!(error.source_as::<io::Error>().is_some());
        assert!(error.source_as::<std::fmt::Error>().is_none());
    }

    #[test]
    fn configuration_has_no_source() {
        let error = Error::configuration("bad");
        assert!(!error.is_source::<io::Error>());
    }

    #[test]
    fn result_alias_propagates() {
        fn fails() -> Result<i32> {
            Err(Error::invalid_argument("expected failure"))
        }

        let err = fails().expect_err("should return an error");
        assert!(err.to_string().contains("expected failure"));
    }
}
