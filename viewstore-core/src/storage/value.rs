//! Conversion of typed keys and values into the bytes kept by the store

use crate::storage::errors::{StorageError, StorageResult};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// A value that can be stored in an index
///
/// Implemented for every serde type through bincode.
pub trait StorageValue: Sized {
    fn to_bytes(&self) -> StorageResult<Vec<u8>>;
    fn from_bytes(bytes: &[u8]) -> StorageResult<Self>;
}

impl<T: Serialize + DeserializeOwned> StorageValue for T {
    fn to_bytes(&self) -> StorageResult<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    fn from_bytes(bytes: &[u8]) -> StorageResult<Self> {
        Ok(bincode::deserialize(bytes)?)
    }
}

/// A map key
///
/// The encoding defines the iteration order of a map index, so integer keys
/// are stored big-endian.
pub trait StorageKey: Sized {
    fn encode_key(&self) -> Vec<u8>;
    fn decode_key(bytes: &[u8]) -> StorageResult<Self>;
}

impl StorageKey for Vec<u8> {
    fn encode_key(&self) -> Vec<u8> {
        self.clone()
    }

    fn decode_key(bytes: &[u8]) -> StorageResult<Self> {
        Ok(bytes.to_vec())
    }
}

impl StorageKey for String {
    fn encode_key(&self) -> Vec<u8> {
        self.as_bytes().to_vec()
    }

    fn decode_key(bytes: &[u8]) -> StorageResult<Self> {
        String::from_utf8(bytes.to_vec())
            .map_err(|e| StorageError::Serialization(format!("invalid UTF-8 key: {}", e)))
    }
}

impl StorageKey for u64 {
    fn encode_key(&self) -> Vec<u8> {
        self.to_be_bytes().to_vec()
    }

    fn decode_key(bytes: &[u8]) -> StorageResult<Self> {
        let array: [u8; 8] = bytes.try_into().map_err(|_| {
            StorageError::Serialization(format!("expected 8 key bytes, got {}", bytes.len()))
        })?;
        Ok(u64::from_be_bytes(array))
    }
}
