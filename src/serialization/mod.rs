//! Canonical CBOR encoding for persisted state and derived identifiers.
//!
//! - CBOR via `ciborium` for state snapshots
//! - Every id is SHA-256 over the CBOR encoding of `(domain tag, value)`, so
//!   two structurally equal values always hash to the same id and values from
//!   different domains never collide.

use crate::types::Digest32;
use serde::{de::DeserializeOwned, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Serialization errors.
#[derive(Debug, Error)]
pub enum SerializationError {
    /// CBOR encoding failed.
    #[error("CBOR encoding failed: {0}")]
    Encode(String),

    /// CBOR decoding failed.
    #[error("CBOR decoding failed: {0}")]
    Decode(String),
}

/// Serialize to CBOR bytes.
pub fn to_cbor<T: Serialize>(value: &T) -> Result<Vec<u8>, SerializationError> {
    let mut bytes = Vec::new();
    ciborium::into_writer(value, &mut bytes)
        .map_err(|e| SerializationError::Encode(format!("{:?}", e)))?;
    Ok(bytes)
}

/// Deserialize from CBOR bytes.
pub fn from_cbor<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, SerializationError> {
    ciborium::from_reader(bytes).map_err(|e| SerializationError::Decode(format!("{:?}", e)))
}

/// Domain-separated digest of a value's canonical encoding.
pub fn digest_of<T: Serialize>(tag: &str, value: &T) -> Result<Digest32, SerializationError> {
    let bytes = to_cbor(&(tag, value))?;
    let mut out = [0u8; 32];
    out.copy_from_slice(&Sha256::digest(&bytes));
    Ok(Digest32(out))
}
