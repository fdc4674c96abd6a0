// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Value serialization for handles that store bytes.
//!
//! In-process handles keep values as native Rust types; handles backed by an
//! external store need a byte representation. The cache core never inspects
//! serialized payloads; it only carries a [`Serializer`] from configuration
//! to the handles that ask for one.

use serde::{de::DeserializeOwned, Serialize};

use crate::{Error, Result};

/// Encodes and decodes cache values for byte-oriented handles.
///
/// Implementations must round-trip primitive numeric, boolean, byte-array,
/// and string values unchanged; user-defined types round-trip modulo the
/// chosen format's capabilities.
pub trait Serializer: Send + Sync + 'static {
    /// Encodes a value to bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Serialization`] when the value cannot be encoded.
    fn serialize<T: Serialize>(&self, value: &T) -> Result<Vec<u8>>;

    /// Decodes a value from bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Serialization`] when the payload cannot be decoded
    /// as `T`.
    fn deserialize<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T>;
}

/// A [`Serializer`] producing JSON payloads.
///
/// # Examples
///
/// ```
/// use strata_tier::{JsonSerializer, Serializer};
///
/// let serializer = JsonSerializer;
/// let bytes = serializer.serialize(&42_u64)?;
/// let value: u64 = serializer.deserialize(&bytes)?;
/// assert_eq!(value, 42);
/// # Ok::<(), strata_tier::Error>(())
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonSerializer;

impl Serializer for JsonSerializer {
    fn serialize<T: Serialize>(&self, value: &T) -> Result<Vec<u8>> {
        serde_json::to_vec(value).map_err(Error::serialization)
    }

    fn deserialize<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T> {
        serde_json::from_slice(bytes).map_err(Error::serialization)
    }
}
