//! Error types that can be emitted from this library

use miette::Diagnostic;
use thiserror::Error;

use crate::options::{LoaderMode, Mutability};
use crate::types::Address;

/// Error type for library
#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    /// Transparent warpper for [`std::io::Error`]
    #[error(transparent)]
    IOError(#[from] std::io::Error),

    /// Transparent warpper for [`binrw::Error`]
    #[error(transparent)]
    BinRWError(#[from] binrw::Error),

    /// caller supplied options are invalid
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// the container violates the data center format
    #[error(transparent)]
    InvalidData(#[from] DataError),

    /// an argument to a node mutator is invalid
    #[error(transparent)]
    Argument(#[from] ArgumentError),

    /// mutation attempted on an immutable node
    #[error("cannot mutate an immutable data center node")]
    ImmutableNode,
}

impl Error {
    /// Whether this error was caused by malformed input rather than by the caller or the I/O layer.
    pub fn is_invalid_data(&self) -> bool {
        match self {
            Error::InvalidData(_) => true,
            Error::BinRWError(binrw::Error::Io(_)) => false,
            Error::BinRWError(_) => true,
            _ => false,
        }
    }
}

/// Errors caused by invalid load or save options
#[derive(Error, Diagnostic, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// key must be 16 bytes
    #[error("key must be 16 bytes long, got {0}")]
    InvalidKeyLength(usize),

    /// iv must be 16 bytes
    #[error("iv must be 16 bytes long, got {0}")]
    InvalidIvLength(usize),

    /// the loader cannot produce the requested kind of tree
    #[error("{0:?} loading does not support {1:?} trees")]
    UnsupportedMode(LoaderMode, Mutability),
}

/// Structural violations found while decoding or encoding a data center
#[derive(Error, Diagnostic, Debug, PartialEq, Eq)]
pub enum DataError {
    /// the header does not start with the expected magic
    #[error("invalid magic {0:02x?}")]
    BadMagic([u8; 4]),

    /// the header declares an unknown format version
    #[error("unsupported format version {0}")]
    UnsupportedVersion(u32),

    /// the header holds an unknown architecture or compression code
    #[error("invalid header: {0}")]
    InvalidHeader(String),

    /// the decoded payload does not have the declared size
    #[error("payload size {actual} does not match declared size {expected}")]
    PayloadSize {
        /// size recorded in the envelope
        expected: u32,
        /// size actually decoded
        actual: u64,
    },

    /// a value lies outside of the range it must be in
    #[error("{field} {value} is out of bounds ({}..{})", .bounds.start, .bounds.end)]
    OutOfBounds {
        /// name of the offending field
        field: &'static str,
        /// the offending value
        value: i64,
        /// the valid range
        bounds: std::ops::Range<i64>,
    },

    /// a range of elements lies outside of its segment
    #[error("{field} range {}..{} is out of bounds (0..{bound})", .range.start, .range.end)]
    RangeOutOfBounds {
        /// name of the offending field
        field: &'static str,
        /// the offending range
        range: std::ops::Range<i64>,
        /// the number of elements in the segment
        bound: i64,
    },

    /// a region holds more segments than an address can reach
    #[error("{region} region is too large ({segments} segments)")]
    RegionTooLarge {
        /// name of the region
        region: &'static str,
        /// number of segments
        segments: usize,
    },

    /// a single item does not fit into a segment
    #[error("{what} of length {length} does not fit into a segment of {capacity} elements")]
    SegmentOverflow {
        /// what was being stored
        what: &'static str,
        /// number of elements requested
        length: usize,
        /// segment capacity
        capacity: usize,
    },

    /// too many distinct items to be addressed by a record field
    #[error("too many {what} ({count}, at most {max})")]
    TooMany {
        /// what was being counted
        what: &'static str,
        /// how many there are
        count: usize,
        /// the maximum allowed
        max: usize,
    },

    /// the stored string address does not match the address index
    #[error("string address {actual} does not match expected address {expected}")]
    AddressMismatch {
        /// the address recorded in the descriptor
        actual: Address,
        /// the address recorded in the address index
        expected: Address,
    },

    /// the stored string hash does not match the computed hash
    #[error("string hash 0x{actual:08x} does not match expected hash 0x{expected:08x}")]
    HashMismatch {
        /// the hash recorded in the descriptor
        actual: u32,
        /// the hash computed from the string
        expected: u32,
    },

    /// hashes within a bucket are not sorted
    #[error("string hash 0x{hash:08x} is less than previous hash 0x{previous:08x}")]
    HashOrder {
        /// the offending hash
        hash: u32,
        /// the hash of the previous descriptor in the bucket
        previous: u32,
    },

    /// a descriptor is stored in the wrong bucket
    #[error("string bucket {actual} does not match expected bucket {expected}")]
    BucketMismatch {
        /// the bucket the descriptor was found in
        actual: usize,
        /// the bucket computed from its hash
        expected: usize,
    },

    /// two strings share an address
    #[error("string address {0} already recorded earlier")]
    DuplicateAddress(Address),

    /// two descriptors claim the same position in the table
    #[error("string index {0} already recorded earlier")]
    DuplicateIndex(u32),

    /// a string table lookup by address failed
    #[error("string table address {0} is invalid")]
    UnknownAddress(Address),

    /// string data is not valid UTF-16
    #[error("string at {0} is not valid UTF-16")]
    InvalidString(Address),

    /// invalid string descriptor length
    #[error("string at {0} has invalid length 0")]
    EmptyLength(Address),

    /// unknown attribute type information
    #[error("attribute {name} has invalid type information 0x{type_info:04x}")]
    InvalidAttributeType {
        /// attribute name
        name: String,
        /// raw type information
        type_info: u16,
    },

    /// a boolean attribute holds something other than 0 or 1
    #[error("attribute {name} has invalid boolean value {value}")]
    InvalidBoolean {
        /// attribute name
        name: String,
        /// raw value
        value: u32,
    },

    /// the value attribute is not a string
    #[error("node {0} has a non-string value attribute")]
    InvalidValueAttribute(Address),

    /// an attribute name occurs twice on one node
    #[error("node {node} has duplicate attribute {name}")]
    DuplicateAttribute {
        /// node address
        node: Address,
        /// attribute name
        name: String,
    },

    /// unknown node flags
    #[error("node {node} has unknown flags 0x{flags:x}")]
    InvalidNodeFlags {
        /// node address
        node: Address,
        /// the flag bits
        flags: u16,
    },

    /// a node record is a child of more than one node
    #[error("node {0} is referenced more than once")]
    SharedNode(Address),

    /// the node region holds no root
    #[error("data center has no root node")]
    MissingRoot,
}

/// Errors caused by invalid arguments to node mutators
#[derive(Error, Diagnostic, Debug, PartialEq, Eq)]
pub enum ArgumentError {
    /// attribute already exists
    #[error("attribute {0} already exists")]
    AttributeExists(String),

    /// attribute name is reserved by the format
    #[error("attribute name {0} is reserved")]
    ReservedAttribute(String),

    /// names must not be empty
    #[error("names must not be empty")]
    EmptyName,

    /// too many key names
    #[error("keys hold at most 4 attribute names, got {0}")]
    TooManyKeys(usize),
}

/// Generic result type with crate's Error as its error variant
pub type Result<T> = core::result::Result<T, Error>;
