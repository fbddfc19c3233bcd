//! Bairro Types - Core type definitions for the Bairro governance ledger.
//!
//! This crate provides the primitive types shared by the vote ledger,
//! the treasury and the governor:
//! - Addresses (20-byte, hex encoded)
//! - Hashes (32-byte, blake3 digests)
//! - Token amounts and block heights

pub mod address;
pub mod amount;
pub mod hash;
pub mod error;

#[cfg(any(feature = "serde", feature = "borsh"))]
mod serialization;

pub use address::Address;
pub use amount::{format_units, parse_units, Amount, DECIMALS, UNIT};
pub use hash::Hash;
pub use error::TypesError;

/// Height of a block in the ledger's ordered sequence of time steps.
pub type BlockNumber = u64;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{Address, Amount, BlockNumber, Hash, TypesError};
}
