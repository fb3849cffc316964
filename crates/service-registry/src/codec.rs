use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;

use crate::error::{RegistryError, Result};

/// How values are turned into stored bytes and back.
///
/// The caller picks the codec per call, so reads and writes of a key agree on
/// the same format.
pub trait ValueCodec {
    type Value;

    fn encode(value: &Self::Value) -> Result<Vec<u8>>;

    fn decode(key: &str, bytes: Vec<u8>) -> Result<Self::Value>;
}

/// Stores bytes verbatim.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawCodec;

impl ValueCodec for RawCodec {
    type Value = Vec<u8>;

    fn encode(value: &Vec<u8>) -> Result<Vec<u8>> {
        Ok(value.clone())
    }

    fn decode(_key: &str, bytes: Vec<u8>) -> Result<Vec<u8>> {
        Ok(bytes)
    }
}

/// Stores values as JSON documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec<T>(PhantomData<T>);

impl<T> ValueCodec for JsonCodec<T>
where
    T: Serialize + DeserializeOwned,
{
    type Value = T;

    fn encode(value: &T) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(value)?)
    }

    fn decode(key: &str, bytes: Vec<u8>) -> Result<T> {
        decode_json(key, &bytes)
    }
}

pub(crate) fn decode_json<T: DeserializeOwned>(key: &str, bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes).map_err(|source| RegistryError::Decode {
        key: key.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Limits {
        workers: u32,
        region: String,
    }

    #[test]
    fn raw_codec_is_identity() {
        let bytes = vec![0u8, 159, 146, 150, b'{'];
        assert_eq!(RawCodec::encode(&bytes).unwrap(), bytes);
        assert_eq!(RawCodec::decode("k", bytes.clone()).unwrap(), bytes);
    }

    #[test]
    fn json_codec_decodes_structured_values() {
        let limits = Limits {
            workers: 4,
            region: "eu".to_string(),
        };
        let encoded = JsonCodec::<Limits>::encode(&limits).unwrap();
        assert_eq!(JsonCodec::<Limits>::decode("limits", encoded).unwrap(), limits);
    }

    #[test]
    fn json_codec_reports_decode_errors_with_key() {
        let err = JsonCodec::<Limits>::decode("limits", b"not json".to_vec()).unwrap_err();
        match err {
            RegistryError::Decode { key, .. } => assert_eq!(key, "limits"),
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
