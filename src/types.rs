//! Primitive identities and quantities shared by every governance component.
//!
//! - `Address`: opaque 20-byte account identity (hex display)
//! - `Sequence`: externally advanced monotonic counter (block height)
//! - `Amount`: token / native-value quantity in base units
//! - `Digest32`: SHA-256 output backing every derived id

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Point in the externally ordered timeline.
pub type Sequence = u64;

/// Quantity in base units (18 decimals).
pub type Amount = u128;

/// One whole token / native unit in base units.
pub const UNIT: Amount = 1_000_000_000_000_000_000;

/// Serde codec writing an [`Amount`] as a decimal string.
///
/// TOML integers stop at `i64`, so configuration carries amounts as strings.
/// Deserialization also accepts plain integers.
pub mod amount_str {
    use super::Amount;
    use serde::de::{self, Visitor};
    use serde::{Deserializer, Serializer};
    use std::fmt;

    pub fn serialize<S: Serializer>(amount: &Amount, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&amount.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Amount, D::Error> {
        struct AmountVisitor;

        impl<'de> Visitor<'de> for AmountVisitor {
            type Value = Amount;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a non-negative integer or decimal string")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Amount, E> {
                Ok(v as Amount)
            }

            fn visit_u128<E: de::Error>(self, v: u128) -> Result<Amount, E> {
                Ok(v)
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Amount, E> {
                Amount::try_from(v).map_err(|_| E::custom("amount must not be negative"))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Amount, E> {
                v.replace('_', "").parse().map_err(E::custom)
            }
        }

        d.deserialize_any(AmountVisitor)
    }
}

/// Errors produced when parsing identities from text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseIdError {
    #[error("invalid hex: {0}")]
    Hex(String),

    #[error("expected {expected} bytes, got {actual}")]
    Length { expected: usize, actual: usize },
}

fn decode_fixed<const N: usize>(s: &str) -> Result<[u8; N], ParseIdError> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    let bytes = hex::decode(s).map_err(|e| ParseIdError::Hex(e.to_string()))?;
    if bytes.len() != N {
        return Err(ParseIdError::Length {
            expected: N,
            actual: bytes.len(),
        });
    }
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes);
    Ok(out)
}

/// Account identity.
///
/// Serialized as a `0x`-prefixed hex string in every format.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address([u8; 20]);

impl Address {
    /// The burn address. Never a valid delegatee or recipient.
    pub const ZERO: Address = Address([0u8; 20]);

    pub const fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Address whose low 8 bytes are `n` big-endian; handy for fixtures and
    /// scenarios.
    pub const fn from_low_u64(n: u64) -> Self {
        let mut bytes = [0u8; 20];
        let be = n.to_be_bytes();
        let mut i = 0;
        while i < 8 {
            bytes[12 + i] = be[i];
            i += 1;
        }
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self)
    }
}

impl FromStr for Address {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_fixed::<20>(s).map(Self)
    }
}

impl TryFrom<String> for Address {
    type Error = ParseIdError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Address> for String {
    fn from(addr: Address) -> Self {
        addr.to_string()
    }
}

/// 32-byte digest, serialized as hex like [`Address`].
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Digest32(pub [u8; 32]);

impl Digest32 {
    pub const ZERO: Digest32 = Digest32([0u8; 32]);

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for Digest32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Digest32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

impl FromStr for Digest32 {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_fixed::<32>(s).map(Self)
    }
}

impl TryFrom<String> for Digest32 {
    type Error = ParseIdError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Digest32> for String {
    fn from(digest: Digest32) -> Self {
        digest.to_string()
    }
}

macro_rules! digest_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub Digest32);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.parse::<Digest32>().map(Self)
            }
        }
    };
}

digest_id!(
    /// Deterministic proposal identifier.
    ProposalId
);

digest_id!(
    /// Deterministic timelock operation identifier.
    OperationId
);

digest_id!(
    /// SHA-256 of a proposal's description text.
    DescriptionHash
);

impl DescriptionHash {
    pub fn of(description: &str) -> Self {
        use sha2::{Digest, Sha256};
        let out = Sha256::digest(description.as_bytes());
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&out);
        Self(Digest32(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_display_roundtrip() {
        let addr = Address::from_low_u64(0xabcd);
        let text = addr.to_string();
        assert_eq!(text.len(), 42);
        assert!(text.ends_with("abcd"));
        assert_eq!(text.parse::<Address>().unwrap(), addr);
    }

    #[test]
    fn test_address_parse_rejects_wrong_length() {
        let err = "0x1234".parse::<Address>().unwrap_err();
        assert_eq!(
            err,
            ParseIdError::Length {
                expected: 20,
                actual: 2
            }
        );
    }

    #[test]
    fn test_address_serializes_as_hex_string() {
        let addr = Address::from_low_u64(7);
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, format!("\"{}\"", addr));
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, addr);
    }

    #[test]
    fn test_amount_str_accepts_strings_and_integers() {
        #[derive(Deserialize)]
        struct Holder {
            #[serde(with = "amount_str")]
            amount: Amount,
        }

        let from_str: Holder = toml::from_str(r#"amount = "15_000_000000000000000000""#).unwrap();
        assert_eq!(from_str.amount, 15_000 * UNIT);
        let from_int: Holder = toml::from_str("amount = 42").unwrap();
        assert_eq!(from_int.amount, 42);
        assert!(toml::from_str::<Holder>("amount = -1").is_err());
    }

    #[test]
    fn test_zero_address() {
        assert!(Address::ZERO.is_zero());
        assert!(!Address::from_low_u64(1).is_zero());
    }

    #[test]
    fn test_description_hash_is_stable() {
        let a = DescriptionHash::of("Send 1 unit to voter1");
        let b = DescriptionHash::of("Send 1 unit to voter1");
        let c = DescriptionHash::of("Send 2 units to voter1");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
