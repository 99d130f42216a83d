//! Identities and Addresses
//!
//! 32-byte newtypes for parties and game records.
//! Serialized as hex strings in human-readable formats (JSON)
//! and as raw bytes otherwise (bincode).

use std::fmt;

use serde::de::{self, Visitor};

use crate::core::hash::{hash_with_domain, PLAYER_IDENTITY_DOMAIN};

/// Error parsing a 32-byte hex value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseBytesError {
    /// Not valid hex.
    #[error("invalid hex: {0}")]
    InvalidHex(String),
    /// Wrong decoded length.
    #[error("expected 32 bytes, got {0}")]
    WrongLength(usize),
}

/// Decode a hex string into exactly 32 bytes.
pub fn decode_hex32(s: &str) -> Result<[u8; 32], ParseBytesError> {
    let bytes = hex::decode(s).map_err(|e| ParseBytesError::InvalidHex(e.to_string()))?;
    if bytes.len() != 32 {
        return Err(ParseBytesError::WrongLength(bytes.len()));
    }
    let mut arr = [0u8; 32];
    arr.copy_from_slice(&bytes);
    Ok(arr)
}

macro_rules! bytes32_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
        pub struct $name(pub [u8; 32]);

        impl $name {
            /// Create from raw bytes.
            pub const fn new(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }

            /// Parse from a 64-character hex string.
            pub fn from_hex(s: &str) -> Result<Self, $crate::core::identity::ParseBytesError> {
                $crate::core::identity::decode_hex32(s).map(Self)
            }

            /// Full hex encoding.
            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }

            /// First four bytes as hex, for log lines.
            pub fn short(&self) -> String {
                hex::encode(&self.0[..4])
            }

            /// Get raw bytes.
            pub fn as_bytes(&self) -> &[u8; 32] {
                &self.0
            }
        }

        impl ::std::fmt::Debug for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                write!(f, "{}({})", stringify!($name), self.short())
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(&self.to_hex())
            }
        }

        impl ::serde::Serialize for $name {
            fn serialize<S: ::serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                if serializer.is_human_readable() {
                    serializer.serialize_str(&self.to_hex())
                } else {
                    ::serde::Serialize::serialize(&self.0, serializer)
                }
            }
        }

        impl<'de> ::serde::Deserialize<'de> for $name {
            fn deserialize<D: ::serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                if deserializer.is_human_readable() {
                    deserializer
                        .deserialize_str($crate::core::identity::HexVisitor)
                        .map(Self)
                } else {
                    <[u8; 32] as ::serde::Deserialize>::deserialize(deserializer).map(Self)
                }
            }
        }
    };
}

pub(crate) use bytes32_newtype;

pub(crate) struct HexVisitor;

impl<'de> Visitor<'de> for HexVisitor {
    type Value = [u8; 32];

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a 64-character hex string")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        decode_hex32(v).map_err(E::custom)
    }
}

bytes32_newtype!(
    /// Identity of a party (creator, opponent or house).
    ///
    /// Signature checks happen before the core runs; the core
    /// trusts whatever identity it is handed.
    Identity
);

bytes32_newtype!(
    /// Deterministic address of a game record.
    Address
);

impl Identity {
    /// Derive an identity from an external auth subject.
    pub fn from_subject(sub: &str) -> Self {
        Self(hash_with_domain(PLAYER_IDENTITY_DOMAIN, sub.as_bytes()))
    }
}

impl Address {
    /// The all-zero address is reserved and never assigned to a record.
    pub const RESERVED: Address = Address([0u8; 32]);

    /// Check whether this is the reserved address.
    pub fn is_reserved(&self) -> bool {
        self.0 == [0u8; 32]
    }
}
