//! Interned string tables.
//!
//! A table is stored as three regions: the UTF-16 characters, the string descriptors grouped into buckets by
//! hash, and an index mapping every one-based string index to the address of its characters. Strings may run to
//! the very end of a character segment, in which case the terminator is omitted.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::io::{Cursor, Seek, Write};
use std::sync::Arc;

use crc::{Crc, CRC_32_BZIP2};
use tracing::{debug, instrument};

use crate::error::{DataError, Result};
use crate::region::{Region, SegmentedRegion, SEGMENT_CAPACITY};
use crate::types::{Address, Architecture, RawString};

static HASHER: Crc<u32> = Crc::<u32>::new(&CRC_32_BZIP2);

/// Hash of a string as stored in its descriptor
pub fn string_hash(value: &str) -> u32 {
    let mut digest = HASHER.digest();
    for unit in value.encode_utf16() {
        digest.update(&unit.to_le_bytes());
    }
    digest.finalize()
}

/// The descriptor segment a string with the given hash belongs in
pub fn bucket_of(hash: u32, buckets: usize) -> usize {
    ((hash ^ hash >> 16) as usize) % buckets
}

/// The three regions making up a string table, as stored
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawStringTable {
    /// UTF-16 code units
    pub chars: SegmentedRegion<u16>,
    /// Descriptors, one segment per bucket
    pub strings: SegmentedRegion<RawString>,
    /// Address of every string, by one-based index
    pub addresses: Region<Address>,
}

impl RawStringTable {
    /// Decode the regions of a string table
    #[instrument(skip(reader), err)]
    pub fn read(reader: &mut Cursor<&[u8]>, architecture: Architecture) -> Result<Self> {
        Ok(Self {
            chars: SegmentedRegion::read(reader, architecture)?,
            strings: SegmentedRegion::read(reader, architecture)?,
            addresses: Region::read(reader, architecture, true)?,
        })
    }

    /// Encode the regions of a string table
    #[instrument(skip_all, err)]
    pub fn write<W: Write + Seek>(&self, writer: &mut W, architecture: Architecture) -> Result<()> {
        self.chars.write(writer, architecture)?;
        self.strings.write(writer, architecture)?;
        self.addresses.write(writer, architecture, true)
    }
}

/// A decoded string table supporting lookup by index and by address
#[derive(Debug, Clone, Default)]
pub struct StringTable {
    by_index: Vec<Option<Arc<str>>>,
    by_address: HashMap<Address, Arc<str>>,
}

impl StringTable {
    /// Decode and validate a string table
    pub fn read(reader: &mut Cursor<&[u8]>, architecture: Architecture, strict: bool) -> Result<Self> {
        Self::from_raw(&RawStringTable::read(reader, architecture)?, strict)
    }

    /// Resolve every descriptor of a raw table.
    ///
    /// Bounds are always checked. With `strict` the redundant bookkeeping is verified as well: the address index,
    /// the hashes, their order within a bucket and the bucket each descriptor is stored in.
    #[instrument(skip(raw), err)]
    pub fn from_raw(raw: &RawStringTable, strict: bool) -> Result<Self> {
        if strict {
            raw.chars.check_addressable("string characters")?;
        }

        let count = raw.addresses.elements.len();
        let buckets = raw.strings.segments.len();

        let mut by_index = vec![None; count];
        let mut by_address = HashMap::with_capacity(count);

        for (bucket, segment) in raw.strings.segments.iter().enumerate() {
            let mut previous: Option<u32> = None;

            for descriptor in segment {
                let index = (descriptor.index as usize)
                    .checked_sub(1)
                    .filter(|index| *index < count)
                    .ok_or(DataError::OutOfBounds {
                        field: "string index",
                        value: descriptor.index as i64 - 1,
                        bounds: 0..count as i64,
                    })?;

                let address = descriptor.address;
                let length = (descriptor.length as usize)
                    .checked_sub(1)
                    .ok_or(DataError::EmptyLength(address))?;

                let units = raw.chars.get_range(address, length, "string")?;
                let value: Arc<str> = String::from_utf16(units)
                    .map_err(|_| DataError::InvalidString(address))?
                    .into();

                if strict {
                    let expected = raw.addresses.elements[index];
                    if address != expected {
                        return Err(DataError::AddressMismatch {
                            actual: address,
                            expected,
                        }
                        .into());
                    }

                    let hash = descriptor.hash;
                    let expected = string_hash(&value);
                    if hash != expected {
                        return Err(DataError::HashMismatch {
                            actual: hash,
                            expected,
                        }
                        .into());
                    }

                    if let Some(previous) = previous.filter(|previous| hash < *previous) {
                        return Err(DataError::HashOrder { hash, previous }.into());
                    }
                    previous = Some(hash);

                    let expected = bucket_of(hash, buckets);
                    if bucket != expected {
                        return Err(DataError::BucketMismatch {
                            actual: bucket,
                            expected,
                        }
                        .into());
                    }
                }

                match by_address.entry(address) {
                    Entry::Occupied(_) => return Err(DataError::DuplicateAddress(address).into()),
                    Entry::Vacant(entry) => {
                        entry.insert(value.clone());
                    }
                }

                if by_index[index].replace(value).is_some() {
                    return Err(DataError::DuplicateIndex(descriptor.index).into());
                }
            }
        }

        debug!(strings = by_address.len(), buckets, "decoded string table");

        Ok(Self {
            by_index,
            by_address,
        })
    }

    /// Number of string slots in the table
    pub fn len(&self) -> usize {
        self.by_index.len()
    }

    /// Whether the table holds no strings
    pub fn is_empty(&self) -> bool {
        self.by_index.is_empty()
    }

    /// Look up a string by its zero-based index
    pub fn get_by_index(&self, index: usize) -> Result<&Arc<str>> {
        self.by_index
            .get(index)
            .and_then(Option::as_ref)
            .ok_or_else(|| {
                DataError::OutOfBounds {
                    field: "string table index",
                    value: index as i64,
                    bounds: 0..self.by_index.len() as i64,
                }
                .into()
            })
    }

    /// Look up a string by the address of its characters
    pub fn get_by_address(&self, address: Address) -> Result<&Arc<str>> {
        self.by_address
            .get(&address)
            .ok_or_else(|| DataError::UnknownAddress(address).into())
    }

    /// All strings, ordered by index
    pub fn iter(&self) -> impl Iterator<Item = &Arc<str>> {
        self.by_index.iter().flatten()
    }
}

/// Location of an interned string
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct StringEntry {
    /// One-based index
    pub index: u32,
    /// Address of the first character
    pub address: Address,
}

#[derive(Debug, Clone)]
struct PendingString {
    entry: StringEntry,
    length: u32,
    hash: u32,
}

/// Builds a string table, interning every distinct string once
#[derive(Debug, Clone)]
pub struct StringTableWriter {
    chars: SegmentedRegion<u16>,
    strings: Vec<PendingString>,
    lookup: HashMap<String, usize>,
    buckets: usize,
}

impl StringTableWriter {
    /// Create a writer distributing descriptors over `buckets` segments
    pub fn new(buckets: usize) -> Self {
        Self::with_segment_capacity(buckets, SEGMENT_CAPACITY)
    }

    /// Create a writer whose character segments hold at most `capacity` code units
    pub fn with_segment_capacity(buckets: usize, capacity: usize) -> Self {
        Self {
            chars: SegmentedRegion::with_capacity(capacity),
            strings: Vec::new(),
            lookup: HashMap::new(),
            buckets: buckets.max(1),
        }
    }

    /// Number of distinct strings added so far
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    /// Whether no strings have been added
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    /// Intern a string, returning where it is stored
    pub fn add(&mut self, value: &str) -> Result<StringEntry> {
        if let Some(&position) = self.lookup.get(value) {
            return Ok(self.strings[position].entry);
        }

        let units: Vec<u16> = value.encode_utf16().collect();
        let length = units.len();
        let capacity = self.chars.capacity();

        if length > capacity {
            return Err(DataError::SegmentOverflow {
                what: "string",
                length,
                capacity,
            }
            .into());
        }

        let remaining = self.chars.remaining();
        let terminated = if length < remaining {
            true
        } else if length == remaining && length != 0 {
            // Ends exactly at the segment boundary, the reader tolerates the missing terminator.
            false
        } else {
            self.chars.start_segment("string characters")?;
            length < capacity
        };

        let address = self
            .chars
            .allocate(length + usize::from(terminated), "string")?;
        let start = address.element as usize;
        self.chars.segments[address.segment as usize][start..start + length]
            .copy_from_slice(&units);

        let index = u32::try_from(self.strings.len() + 1).map_err(|_| DataError::TooMany {
            what: "strings",
            count: self.strings.len() + 1,
            max: u32::MAX as usize,
        })?;
        let entry = StringEntry { index, address };

        self.lookup.insert(value.to_owned(), self.strings.len());
        self.strings.push(PendingString {
            entry,
            length: length as u32 + 1,
            hash: string_hash(value),
        });

        Ok(entry)
    }

    /// Lay out descriptors in their buckets, sorted by hash, and produce the regions
    #[instrument(skip(self), fields(strings = self.strings.len(), buckets = self.buckets))]
    pub fn finish(self) -> RawStringTable {
        let mut strings = SegmentedRegion::with_segments(self.buckets);

        for pending in &self.strings {
            strings.segments[bucket_of(pending.hash, self.buckets)].push(RawString {
                hash: pending.hash,
                length: pending.length,
                index: pending.entry.index,
                address: pending.entry.address,
            });
        }

        // Stable, so equal hashes keep insertion order.
        for segment in &mut strings.segments {
            segment.sort_by_key(|descriptor| descriptor.hash);
        }

        RawStringTable {
            chars: self.chars,
            strings,
            addresses: Region {
                elements: self.strings.iter().map(|s| s.entry.address).collect(),
            },
        }
    }
}
