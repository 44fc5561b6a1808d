use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Errors that can occur when parsing an address or consensus id string.
#[derive(Debug, thiserror::Error)]
pub enum AddressError {
    #[error("address must start with 't'")]
    InvalidPrefix,
    #[error("address must be {expected} characters, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
    #[error("payload is not valid hexadecimal")]
    InvalidHex(#[from] hex::FromHexError),
    #[error("payload must be exactly 32 bytes")]
    InvalidPayloadLength,
}

/// Number of raw bytes contained in an address.
pub const ADDRESS_BYTES: usize = 32;
/// Expected string length of an encoded address (prefix + 64 hex chars).
pub const ADDRESS_STRING_LENGTH: usize = 1 + ADDRESS_BYTES * 2;

/// Encode a 32-byte account identifier into its human readable form.
///
/// The encoded address always begins with the character `t` followed by the
/// hexadecimal representation of the raw bytes.
pub fn encode_address(bytes: &[u8; ADDRESS_BYTES]) -> String {
    let mut encoded = String::with_capacity(ADDRESS_STRING_LENGTH);
    encoded.push('t');
    encoded.push_str(&hex::encode(bytes));
    encoded
}

/// Decode a human readable address string into the raw bytes.
pub fn decode_address(address: &str) -> Result<[u8; ADDRESS_BYTES], AddressError> {
    if !address.starts_with('t') {
        return Err(AddressError::InvalidPrefix);
    }

    if address.len() != ADDRESS_STRING_LENGTH {
        return Err(AddressError::InvalidLength {
            expected: ADDRESS_STRING_LENGTH,
            actual: address.len(),
        });
    }

    decode_payload(&address[1..])
}

fn decode_payload(payload: &str) -> Result<[u8; ADDRESS_BYTES], AddressError> {
    let decoded = hex::decode(payload)?;
    decoded
        .try_into()
        .map_err(|_| AddressError::InvalidPayloadLength)
}

/// Derive a protocol-owned custody account from a module name.
/// `account = BLAKE3("TALLY_MODULE" || name)`
///
/// Nobody holds a key for these accounts; funds only leave them through
/// treasury payouts.
pub fn module_account(name: &str) -> Address {
    let mut hasher = blake3::Hasher::new();
    hasher.update(b"TALLY_MODULE");
    hasher.update(name.as_bytes());
    Address(*hasher.finalize().as_bytes())
}

/// Account address. Ordering is bytewise, which is also the order of its
/// encoded storage keys.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(pub [u8; ADDRESS_BYTES]);

impl Address {
    pub fn as_bytes(&self) -> &[u8; ADDRESS_BYTES] {
        &self.0
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, AddressError> {
        let raw: [u8; ADDRESS_BYTES] = bytes
            .try_into()
            .map_err(|_| AddressError::InvalidPayloadLength)?;
        Ok(Address(raw))
    }
}

impl From<[u8; ADDRESS_BYTES]> for Address {
    fn from(value: [u8; ADDRESS_BYTES]) -> Self {
        Address(value)
    }
}

impl From<Address> for String {
    fn from(value: Address) -> Self {
        encode_address(&value.0)
    }
}

impl TryFrom<String> for Address {
    type Error = AddressError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        decode_address(&value).map(Address)
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_address(s).map(Address)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&encode_address(&self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}

/// Consensus key of a validator as reported in the voting power table.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ConsensusId(pub [u8; ADDRESS_BYTES]);

impl From<ConsensusId> for String {
    fn from(value: ConsensusId) -> Self {
        hex::encode(value.0)
    }
}

impl TryFrom<String> for ConsensusId {
    type Error = AddressError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        decode_payload(&value).map(ConsensusId)
    }
}

impl fmt::Debug for ConsensusId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConsensusId({})", hex::encode(self.0))
    }
}
