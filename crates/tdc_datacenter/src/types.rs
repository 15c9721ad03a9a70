//! Base types for structure of a data center file.

use std::fmt;

use binrw::{BinRead, BinWrite};

use crate::compression::CompressionMethod;

/// The only container format version understood by this crate
pub const FORMAT_VERSION: u32 = 6;

/// Data center file header
///
/// Defines the plaintext header of the file which always starts with "TDCF". Everything after the header is
/// encrypted. All data is stored in little endian format.
#[derive(BinRead, BinWrite, Debug, Copy, Clone, PartialEq)]
#[brw(magic = b"TDCF", little)]
pub struct ContainerHeader {
    /// The format version, always [`FORMAT_VERSION`]
    pub version: u32,

    /// The data revision of the client the file was built for
    pub revision: u32,

    /// The width of the count fields in the payload
    pub architecture: Architecture,

    /// The compression applied to the payload before encryption
    pub compression: CompressionMethod,
}

impl ContainerHeader {
    /// Size of the header in bytes
    pub const SIZE: usize = 20;
}

impl Default for ContainerHeader {
    fn default() -> Self {
        Self {
            version: FORMAT_VERSION,
            revision: crate::cipher::LATEST_REVISION,
            architecture: Default::default(),
            compression: Default::default(),
        }
    }
}

/// The client architecture a data center was built for
///
/// Selects the width of every count field in the payload regions.
#[derive(BinRead, BinWrite, Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
#[brw(repr = u32)]
pub enum Architecture {
    /// Counts are stored as 32-bit integers
    X86 = 1,

    /// Counts are stored as 64-bit integers
    #[default]
    X64 = 2,
}

/// A (segment, element) pair locating a record inside a segmented region.
///
/// Ordering is segment-major.
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[brw(little)]
pub struct Address {
    /// Index of the segment
    pub segment: u16,

    /// Index of the element within the segment
    pub element: u16,
}

impl Address {
    /// The highest address reachable
    pub const MAX: Address = Address {
        segment: u16::MAX,
        element: u16::MAX,
    };

    /// Create a new address
    pub const fn new(segment: u16, element: u16) -> Self {
        Self { segment, element }
    }

    /// Pack the address the way it is stored inside an attribute value
    pub const fn to_bits(self) -> u32 {
        self.segment as u32 | (self.element as u32) << 16
    }

    /// Unpack an address stored inside an attribute value
    pub const fn from_bits(bits: u32) -> Self {
        Self {
            segment: bits as u16,
            element: (bits >> 16) as u16,
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.segment, self.element)
    }
}

/// String table descriptor
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq, Eq)]
#[brw(little)]
pub struct RawString {
    /// Hash of the string, see [`crate::string_table::string_hash`]
    pub hash: u32,

    /// Number of characters including the terminator
    pub length: u32,

    /// One-based position of the string in the table
    pub index: u32,

    /// Location of the first character in the character region
    pub address: Address,
}

/// Attribute names used by the client to look up children of a node
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
#[brw(little)]
pub struct RawKeys {
    /// One-based name indices, zero when unused
    pub names: [u16; 4],
}

/// Node record
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq, Eq)]
#[brw(little)]
pub struct RawNode {
    /// One-based index into the names table
    pub name_index: u16,

    /// Index into the keys region, shifted left by 4, with flags in the low bits
    pub keys_info: u16,

    /// Number of attributes, including the value attribute
    pub attribute_count: u16,

    /// Number of children
    pub child_count: u16,

    /// Location of the first attribute
    pub attribute_address: Address,

    /// Location of the first child
    pub child_address: Address,
}

impl RawNode {
    /// Index into the keys region
    pub const fn keys_index(&self) -> u16 {
        self.keys_info >> 4
    }

    /// Flag bits, currently always zero
    pub const fn flags(&self) -> u16 {
        self.keys_info & 0xf
    }
}

/// Attribute record
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq, Eq)]
#[brw(little)]
pub struct RawAttribute {
    /// One-based index into the names table
    pub name_index: u16,

    /// Type code in the low 2 bits, extended code above
    pub type_info: u16,

    /// Integer or float bits, or a packed [`Address`] into the values table
    pub value: u32,
}

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use binrw::BinRead;
    use binrw::BinWrite;
    use pretty_assertions::assert_eq;

    use crate::compression::CompressionMethod;
    use crate::error::Result;
    use crate::types::{Address, Architecture, ContainerHeader, RawAttribute, RawNode};

    #[test]
    fn read_header() -> Result<()> {
        #[rustfmt::skip]
        let mut input = Cursor::new(vec![
            0x54, 0x44, 0x43, 0x46,
            0x06, 0x00, 0x00, 0x00,
            0x87, 0xE9, 0x05, 0x00,
            0x01, 0x00, 0x00, 0x00,
            0x02, 0x00, 0x00, 0x00,
        ]);

        let expected = ContainerHeader {
            version: 6,
            revision: 387463,
            architecture: Architecture::X86,
            compression: CompressionMethod::Zlib,
        };

        assert_eq!(ContainerHeader::read(&mut input)?, expected);

        Ok(())
    }

    #[test]
    fn write_header() -> Result<()> {
        #[rustfmt::skip]
        let expected: Vec<u8> = vec![
            0x54, 0x44, 0x43, 0x46,
            0x06, 0x00, 0x00, 0x00,
            0x87, 0xE9, 0x05, 0x00,
            0x02, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00,
        ];

        let header = ContainerHeader {
            compression: CompressionMethod::None,
            ..Default::default()
        };

        let mut actual = Vec::new();
        header.write(&mut Cursor::new(&mut actual))?;

        assert_eq!(actual.len(), ContainerHeader::SIZE);
        assert_eq!(actual, expected);

        Ok(())
    }

    #[test]
    fn read_bad_magic() {
        #[rustfmt::skip]
        let mut input = Cursor::new(vec![
            0x45, 0x45, 0x52, 0x54,
            0x06, 0x00, 0x00, 0x00,
            0x87, 0xE9, 0x05, 0x00,
            0x01, 0x00, 0x00, 0x00,
            0x02, 0x00, 0x00, 0x00,
        ]);

        assert!(ContainerHeader::read(&mut input).is_err());
    }

    #[test]
    fn read_node() -> Result<()> {
        #[rustfmt::skip]
        let mut input = Cursor::new(vec![
            0x03, 0x00,
            0x20, 0x00,
            0x02, 0x00,
            0x01, 0x00,
            0x00, 0x00, 0x05, 0x00,
            0x01, 0x00, 0x07, 0x00,
        ]);

        let expected = RawNode {
            name_index: 3,
            keys_info: 2 << 4,
            attribute_count: 2,
            child_count: 1,
            attribute_address: Address::new(0, 5),
            child_address: Address::new(1, 7),
        };

        let node = RawNode::read(&mut input)?;
        assert_eq!(node, expected);
        assert_eq!(node.keys_index(), 2);
        assert_eq!(node.flags(), 0);

        Ok(())
    }

    #[test]
    fn write_attribute() -> Result<()> {
        #[rustfmt::skip]
        let expected = vec![
            0x01, 0x00,
            0x03, 0x00,
            0x02, 0x00, 0x09, 0x00,
        ];

        let attribute = RawAttribute {
            name_index: 1,
            type_info: 3,
            value: Address::new(2, 9).to_bits(),
        };

        let mut actual = Vec::new();
        attribute.write(&mut Cursor::new(&mut actual))?;

        assert_eq!(actual, expected);

        Ok(())
    }

    #[test]
    fn address_ordering_is_segment_major() {
        assert!(Address::new(0, 500) < Address::new(1, 0));
        assert!(Address::new(1, 1) < Address::new(1, 2));
        assert_eq!(Address::from_bits(Address::new(7, 3).to_bits()), Address::new(7, 3));
    }
}
