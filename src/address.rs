//! 20-byte Ethereum-style account address used as a masternode's CRA
//! (Collateral / Reward / Authentication) address.

use std::fmt;
use std::str::FromStr;

pub const ADDRESS_LEN: usize = 20;

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; ADDRESS_LEN]);

impl Address {
    pub const fn new(bytes: [u8; ADDRESS_LEN]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, AddressError> {
        if bytes.len() != ADDRESS_LEN {
            return Err(AddressError::InvalidLength);
        }
        let mut out = [0u8; ADDRESS_LEN];
        out.copy_from_slice(bytes);
        Ok(Self(out))
    }

    /// Derive an address from an uncompressed secp256k1 public key's 64-byte
    /// body (i.e. without the leading `0x04` prefix): the last 20 bytes of
    /// `Keccak-256(pubkey)`.
    pub fn from_uncompressed_pubkey_body(pubkey_body: &[u8; 64]) -> Self {
        use sha3::{Digest, Keccak256};
        let hash = Keccak256::digest(pubkey_body);
        let mut out = [0u8; ADDRESS_LEN];
        out.copy_from_slice(&hash[12..32]);
        Self(out)
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let stripped = s.strip_prefix("0x").unwrap_or(s);
        if stripped.len() != ADDRESS_LEN * 2 {
            return Err(AddressError::InvalidLength);
        }
        let bytes = hex::decode(stripped).map_err(|_| AddressError::InvalidHex)?;
        Self::from_slice(&bytes)
    }
}

impl serde::Serialize for Address {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> serde::Deserialize<'de> for Address {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Address::from_str(&s).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AddressError {
    #[error("address must be exactly 20 bytes")]
    InvalidLength,
    #[error("address is not valid hex")]
    InvalidHex,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_display_and_from_str() {
        let addr = Address::new([0x11; ADDRESS_LEN]);
        let s = addr.to_string();
        assert!(s.starts_with("0x"));
        let parsed: Address = s.parse().unwrap();
        assert_eq!(addr, parsed);
    }

    #[test]
    fn rejects_wrong_length() {
        assert!(Address::from_str("0x1234").is_err());
    }

    #[test]
    fn derives_from_pubkey_body_via_keccak_last_20() {
        let body = [0x42u8; 64];
        let addr = Address::from_uncompressed_pubkey_body(&body);
        use sha3::{Digest, Keccak256};
        let hash = Keccak256::digest(body);
        assert_eq!(addr.as_bytes(), &hash[12..32]);
    }
}
