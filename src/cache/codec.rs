//! JSON payload codec for cached values.

use bytes::Bytes;
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::store::CacheError;

pub fn encode<T: Serialize>(value: &T) -> Result<Bytes, CacheError> {
    Ok(Bytes::from(serde_json::to_vec(value)?))
}

pub fn decode<T: DeserializeOwned>(payload: &[u8]) -> Result<T, CacheError> {
    Ok(serde_json::from_slice(payload)?)
}
