//! Values accepted by the cache service and decoders for reading them back.

use crate::error::DecodeError;
use serde::Serialize;

/// A value the cache service can store.
///
/// Numbers are written as decimal text, the same representation Redis uses
/// for counters, so `get_int` reads back both stored integers and counters.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CacheValue {
    /// Raw bytes, written verbatim
    Bytes(Vec<u8>),
    /// UTF-8 text
    Text(String),
    /// Signed integer
    Int(i64),
    /// Floating point number
    Float(f64),
}

impl CacheValue {
    /// The bytes written to the store for this value.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Self::Bytes(bytes) => bytes.clone(),
            Self::Text(text) => text.as_bytes().to_vec(),
            Self::Int(n) => n.to_string().into_bytes(),
            Self::Float(n) => n.to_string().into_bytes(),
        }
    }
}

impl From<Vec<u8>> for CacheValue {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

impl From<&[u8]> for CacheValue {
    fn from(value: &[u8]) -> Self {
        Self::Bytes(value.to_vec())
    }
}

impl From<String> for CacheValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for CacheValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<i64> for CacheValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for CacheValue {
    fn from(value: i32) -> Self {
        Self::Int(value.into())
    }
}

impl From<f64> for CacheValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

/// Decode bytes as UTF-8 text.
pub fn utf8(bytes: Vec<u8>) -> Result<String, DecodeError> {
    Ok(String::from_utf8(bytes)?)
}

/// Decode bytes as a decimal integer.
pub fn integer(bytes: Vec<u8>) -> Result<i64, DecodeError> {
    let text = utf8(bytes)?;
    text.trim().parse().map_err(|_| DecodeError::Integer(text))
}

/// Decode bytes as a floating point number.
pub fn float(bytes: Vec<u8>) -> Result<f64, DecodeError> {
    let text = utf8(bytes)?;
    text.trim().parse().map_err(|_| DecodeError::Float(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_bytes() {
        assert_eq!(CacheValue::from("cake").to_bytes(), b"cake".to_vec());
        assert_eq!(CacheValue::from(42).to_bytes(), b"42".to_vec());
        assert_eq!(CacheValue::from(-7i64).to_bytes(), b"-7".to_vec());
        assert_eq!(CacheValue::from(2.5).to_bytes(), b"2.5".to_vec());
        assert_eq!(CacheValue::from(vec![0u8, 159]).to_bytes(), vec![0u8, 159]);
    }

    #[test]
    fn test_serializes_as_plain_json() {
        assert_eq!(serde_json::to_string(&CacheValue::from("a")).unwrap(), r#""a""#);
        assert_eq!(serde_json::to_string(&CacheValue::from(42)).unwrap(), "42");
        assert_eq!(serde_json::to_string(&CacheValue::from(1.5)).unwrap(), "1.5");
    }

    #[test]
    fn test_decoders() {
        assert_eq!(utf8(b"cake".to_vec()).unwrap(), "cake");
        assert_eq!(integer(b"42".to_vec()).unwrap(), 42);
        assert_eq!(float(b"2.5".to_vec()).unwrap(), 2.5);
    }

    #[test]
    fn test_decoder_failures() {
        assert!(matches!(utf8(vec![0xff, 0xfe]), Err(DecodeError::Utf8(_))));
        assert!(matches!(integer(b"cake".to_vec()), Err(DecodeError::Integer(_))));
        assert!(matches!(integer(b"2.5".to_vec()), Err(DecodeError::Integer(_))));
        assert!(matches!(float(b"pie".to_vec()), Err(DecodeError::Float(_))));
    }
}
