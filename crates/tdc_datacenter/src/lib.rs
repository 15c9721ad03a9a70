//! This library handles reading from and creating **Data Center** files used by *TERA*.
//!
//! # Data Center Format Documentation
//!
//! A data center stores the client's configuration data as a single tree of named nodes. Every node carries
//! typed attributes, an optional text value and an ordered list of children. The tree is flattened into
//! fixed-size records kept in segmented regions that refer to each other by address, next to two interned string
//! tables. The whole payload is compressed and encrypted.
//!
//! ## File Structure
//!
//! A data center consists of a plaintext header followed by the encrypted payload.
//!
//! | Offset (bytes) | Field                  | Description                                                |
//! |----------------|------------------------|------------------------------------------------------------|
//! | 0x0000         | Magic number           | 4 bytes: 0x46434454 ("TDCF")                               |
//! | 0x0004         | Version                | 4 bytes: Fixed value 6                                     |
//! | 0x0008         | Revision               | 4 bytes: Data revision of the client                       |
//! | 0x000C         | Architecture           | 4 bytes: 1 for 32-bit clients, 2 for 64-bit clients        |
//! | 0x0010         | Compression            | 4 bytes: Compression method of the payload                 |
//! | 0x0014         | Payload                | AES-128-CFB encrypted remainder of the file                |
//!
//! ### Envelope
//!
//! Everything after the header is encrypted with AES-128 in CFB mode with a 128-bit feedback segment and no
//! padding. Unless a key and IV are given, the pair published for the header's revision is used, see
//! [`KeyPair::for_revision`]. The plaintext starts with a 4-byte size of the decompressed payload, followed by the
//! payload, compressed with the method named in the header:
//!   - `0`: None (no compression)
//!   - `2`: Zlib (compressed with Zlib)
//!
//! ### Regions
//!
//! The payload is a sequence of regions. A simple region is a count followed by that many records. A segmented
//! region is a count of segments, each of which is a simple region of at most 65535 records. Counts are 4 bytes
//! wide for 32-bit clients and 8 bytes wide for 64-bit clients. Records in a segmented region are located by an
//! address, a 2-byte segment index followed by a 2-byte element index.
//!
//! | Order | Region                 | Description                                                |
//! |-------|------------------------|------------------------------------------------------------|
//! | 1     | Names                  | String table of node, attribute and key names, 512 buckets |
//! | 2     | Values                 | String table of string attribute values, 1024 buckets      |
//! | 3     | Keys                   | Simple region of key sets, 4 name indices each             |
//! | 4     | Nodes                  | Segmented region of node records, the root at (0, 0)       |
//! | 5     | Attributes             | Segmented region of attribute records                      |
//!
//! ### String Tables
//!
//! A string table is made of three regions:
//!
//! - **Characters**: segmented region of UTF-16 code units. Each string is followed by a terminator unless it
//!   runs up to the end of its segment.
//! - **Descriptors**: segmented region with one segment per bucket. Each descriptor holds the hash, the length
//!   including the terminator, the one-based index and the address of a string. A descriptor lives in bucket
//!   `(hash ^ hash >> 16) % buckets` and descriptors within a bucket are sorted by hash.
//! - **Addresses**: simple region holding the address of every string by index. Its count is stored plus one.
//!
//! The hash is CRC-32/BZIP2 over the UTF-16LE bytes of the string.
//!
//! ### Node Records
//!
//! | Offset (bytes) | Field                  | Description                                             |
//! |----------------|------------------------|---------------------------------------------------------|
//! | 0x0000         | Name                   | 2 bytes: One-based index into the names table           |
//! | 0x0002         | Keys                   | 2 bytes: Keys region index shifted left by 4, and flags |
//! | 0x0004         | Attribute Count        | 2 bytes: Number of attributes                           |
//! | 0x0006         | Child Count            | 2 bytes: Number of children                             |
//! | 0x0008         | Attributes             | 4 bytes: Address of the first attribute                 |
//! | 0x000C         | Children               | 4 bytes: Address of the first child                     |
//!
//! ### Attribute Records
//!
//! | Offset (bytes) | Field                  | Description                                             |
//! |----------------|------------------------|---------------------------------------------------------|
//! | 0x0000         | Name                   | 2 bytes: One-based index into the names table           |
//! | 0x0002         | Type                   | 2 bytes: Type code, extended code shifted left by 2     |
//! | 0x0004         | Value                  | 4 bytes: Integer, float bits, or address of a value     |
//!
//! Type codes are `1` for integers (extended code `1` for booleans), `2` for floats and `3` for strings. A node's
//! text value is stored as a string attribute named `__value__`.
//!
//! ## Loading
//!
//! [`LoadOptions`] selects how the tree is materialized and whether it may be changed:
//!
//! - [`LoaderMode::Eager`] builds every node up front and releases the raw regions.
//! - [`LoaderMode::Lazy`] builds each node on first access, after the same up-front check as eager loading.
//! - [`LoaderMode::Transient`] never keeps nodes around, every access decodes the record again.
//!
//! All modes validate every reachable record before returning. Strict loading additionally verifies the
//! redundant bookkeeping of the string tables.
//!

pub mod cipher;
pub mod compression;
pub mod data_center;
pub mod error;
pub mod node;
pub mod options;
pub mod payload;
pub mod read;
pub mod region;
#[cfg(feature = "serde")]
mod serde;
pub mod string_table;
pub mod types;
pub mod value;
pub mod write;

pub use cipher::KeyPair;
pub use compression::CompressionMethod;
pub use data_center::DataCenter;
pub use node::{Node, NodeMut};
pub use options::{LoadOptions, LoaderMode, Mutability, SaveOptions};
pub use types::{Address, Architecture};
pub use value::{DataCenterKeys, DataCenterValue};
