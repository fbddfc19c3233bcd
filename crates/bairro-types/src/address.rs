use crate::error::TypesError;
use std::fmt;
use std::str::FromStr;

/// 20-byte account address.
/// Display format: `0x`-prefixed lowercase hex.
///
/// Named accounts derive their address from a label
/// (`blake3("bairro.account" || label)[0..20]`), deployed components
/// from their deployer and deployment nonce.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address([u8; 20]);

impl Address {
    pub const ZERO: Self = Self([0u8; 20]);
    pub const LEN: usize = 20;

    const ACCOUNT_DOMAIN: &'static [u8] = b"bairro.account";
    const CONTRACT_DOMAIN: &'static [u8] = b"bairro.contract";

    pub const fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Create from a byte slice
    pub fn from_slice(slice: &[u8]) -> Result<Self, TypesError> {
        if slice.len() != 20 {
            return Err(TypesError::InvalidAddressLength(slice.len()));
        }
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(slice);
        Ok(Self(bytes))
    }

    /// Derive the address of a named account ("proposer", "voter-1", ...).
    pub fn from_label(label: &str) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(Self::ACCOUNT_DOMAIN);
        hasher.update(label.as_bytes());
        Self::truncate(hasher.finalize().as_bytes())
    }

    /// Derive the address of a component deployed by `deployer`.
    pub fn contract(deployer: &Address, nonce: u64) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(Self::CONTRACT_DOMAIN);
        hasher.update(&deployer.0);
        hasher.update(&nonce.to_le_bytes());
        Self::truncate(hasher.finalize().as_bytes())
    }

    fn truncate(digest: &[u8; 32]) -> Self {
        let mut addr = [0u8; 20];
        addr.copy_from_slice(&digest[..20]);
        Self(addr)
    }

    /// Check if this is the zero address
    pub fn is_zero(&self) -> bool {
        self == &Self::ZERO
    }

    /// Convert to hex string without 0x prefix
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Abbreviated form for log lines: `0x1234…cdef`.
    pub fn short(&self) -> String {
        let hex = self.to_hex();
        format!("0x{}…{}", &hex[..4], &hex[36..])
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", self.to_hex())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address(0x{})", hex::encode(self.0))
    }
}

impl fmt::LowerHex for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for Address {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            Some(digits) => {
                let bytes = hex::decode(digits)?;
                Self::from_slice(&bytes)
            }
            None => Err(TypesError::InvalidAddressFormat(s.to_string())),
        }
    }
}

impl AsRef<[u8]> for Address {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_zero() {
        assert_eq!(Address::ZERO.as_bytes(), &[0u8; 20]);
        assert!(Address::ZERO.is_zero());
    }

    #[test]
    fn test_address_from_label() {
        let alice = Address::from_label("alice");
        assert!(!alice.is_zero());
        assert_eq!(alice, Address::from_label("alice"));
        assert_ne!(alice, Address::from_label("bob"));
    }

    #[test]
    fn test_contract_address_depends_on_nonce() {
        let deployer = Address::from_label("deployer");
        let first = Address::contract(&deployer, 0);
        let second = Address::contract(&deployer, 1);
        assert_ne!(first, second);
        assert_eq!(first, Address::contract(&deployer, 0));
        assert_ne!(first, Address::from_label("deployer"));
    }

    #[test]
    fn test_address_hex_roundtrip() {
        let addr = Address::from_bytes([0xabu8; 20]);
        let parsed: Address = addr.to_string().parse().unwrap();
        assert_eq!(addr, parsed);
        assert!(addr.to_string().starts_with("0x"));
    }

    #[test]
    fn test_address_from_str_invalid() {
        assert!(Address::from_str("invalid").is_err());
        assert!(Address::from_str("0x1234").is_err());
        assert!(Address::from_str("0xzz").is_err());
    }

    #[test]
    fn test_address_short() {
        let addr = Address::from_bytes([0x11u8; 20]);
        assert_eq!(addr.short(), "0x1111…1111");
    }
}
