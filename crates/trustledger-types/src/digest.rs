//! Fixed-size content digest.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::ser::Formatter;
use serde_json::Value;
use sha2::{Digest as _, Sha256};
use std::io;
use thiserror::Error;

/// Errors produced when parsing a hex digest.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseDigestError {
    /// The input is not valid hex.
    #[error("digest is not valid hex")]
    InvalidHex,
    /// The input decoded to the wrong number of bytes.
    #[error("digest must be 32 bytes, got {0}")]
    InvalidLength(usize),
}

/// An opaque 32-byte digest (`dataHash`, `requestHash`, `responseHash`).
///
/// Encoded on the wire as 64 lowercase hex characters. A leading `0x` is
/// accepted when parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Digest(pub [u8; 32]);

impl Digest {
    /// The all-zero digest.
    pub const ZERO: Digest = Digest([0u8; 32]);

    /// SHA-256 of raw bytes.
    pub fn of_bytes(bytes: &[u8]) -> Self {
        Self(Sha256::digest(bytes).into())
    }

    /// SHA-256 of the canonical text of `value`.
    ///
    /// A JSON string hashes as its raw UTF-8 contents. Anything else is
    /// encoded with sorted keys, `", "` and `": "` separators and non-ASCII
    /// escaped as `\uXXXX`, so agents hashing documents with Python's
    /// `json.dumps(data, sort_keys=True)` produce the same digest.
    pub fn of_json(value: &Value) -> Self {
        if let Value::String(text) = value {
            return Self::of_bytes(text.as_bytes());
        }
        let canonical = canonicalize(value);
        let mut encoded = Vec::new();
        let mut serializer =
            serde_json::Serializer::with_formatter(&mut encoded, SortedAsciiFormatter);
        // Writing a `Value` into a `Vec` cannot fail.
        if canonical.serialize(&mut serializer).is_err() {
            encoded.clear();
        }
        Self::of_bytes(&encoded)
    }

    /// Parses a 64-character hex string, with or without `0x`.
    pub fn from_hex(input: &str) -> Result<Self, ParseDigestError> {
        let trimmed = input.trim();
        let digits = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        let bytes = hex::decode(digits).map_err(|_| ParseDigestError::InvalidHex)?;
        Self::from_slice(&bytes)
    }

    /// Builds a digest from exactly 32 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ParseDigestError> {
        let array: [u8; 32] = bytes
            .try_into()
            .map_err(|_| ParseDigestError::InvalidLength(bytes.len()))?;
        Ok(Self(array))
    }

    /// Lowercase hex encoding without prefix.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Borrows the raw bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl std::fmt::Display for Digest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl std::str::FromStr for Digest {
    type Err = ParseDigestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for Digest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// JSON formatter matching Python's default `json.dumps` layout.
struct SortedAsciiFormatter;

impl Formatter for SortedAsciiFormatter {
    fn begin_array_value<W: ?Sized + io::Write>(
        &mut self,
        writer: &mut W,
        first: bool,
    ) -> io::Result<()> {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_key<W: ?Sized + io::Write>(
        &mut self,
        writer: &mut W,
        first: bool,
    ) -> io::Result<()> {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        writer.write_all(b": ")
    }

    // Quotes, backslashes and control characters arrive through
    // `write_char_escape`; everything else outside printable ASCII is
    // escaped here, as UTF-16 code units.
    fn write_string_fragment<W: ?Sized + io::Write>(
        &mut self,
        writer: &mut W,
        fragment: &str,
    ) -> io::Result<()> {
        for ch in fragment.chars() {
            if (' '..='~').contains(&ch) {
                writer.write_all(&[ch as u8])?;
            } else {
                let mut units = [0u16; 2];
                for unit in ch.encode_utf16(&mut units) {
                    write!(writer, "\\u{:04x}", unit)?;
                }
            }
        }
        Ok(())
    }
}

fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut sorted = serde_json::Map::new();
            for key in keys {
                sorted.insert(key.clone(), canonicalize(&map[key]));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}
