//! Simple and segmented regions of fixed-size records.
//!
//! A simple region is a count followed by that many records. A segmented region is a count of segments followed
//! by that many simple regions, each holding at most [`SEGMENT_CAPACITY`] records so that every record can be
//! located with an [`Address`].

use std::io::{Cursor, Seek, Write};

use binrw::{BinRead, BinWrite};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use tracing::{instrument, trace};

use crate::error::{DataError, Result};
use crate::types::{Address, Architecture, RawAttribute, RawKeys, RawNode, RawString};

/// Maximum number of records in one segment
pub const SEGMENT_CAPACITY: usize = u16::MAX as usize;

/// Maximum number of segments an [`Address`] can reach
pub const MAX_SEGMENTS: usize = u16::MAX as usize + 1;

/// A fixed-size record stored in a region
pub trait Record:
    for<'a> BinRead<Args<'a> = ()> + for<'a> BinWrite<Args<'a> = ()> + Copy + Default
{
    /// Encoded size in bytes
    const SIZE: usize;
}

impl Record for u16 {
    const SIZE: usize = 2;
}

impl Record for Address {
    const SIZE: usize = 4;
}

impl Record for RawString {
    const SIZE: usize = 16;
}

impl Record for RawKeys {
    const SIZE: usize = 8;
}

impl Record for RawNode {
    const SIZE: usize = 16;
}

impl Record for RawAttribute {
    const SIZE: usize = 8;
}

fn read_count(reader: &mut Cursor<&[u8]>, architecture: Architecture) -> Result<u64> {
    Ok(match architecture {
        Architecture::X86 => reader.read_u32::<LittleEndian>()? as u64,
        Architecture::X64 => reader.read_u64::<LittleEndian>()?,
    })
}

fn write_count<W: Write>(writer: &mut W, architecture: Architecture, count: usize) -> Result<()> {
    match architecture {
        Architecture::X86 => {
            let count = u32::try_from(count).map_err(|_| DataError::TooMany {
                what: "records",
                count,
                max: u32::MAX as usize,
            })?;
            writer.write_u32::<LittleEndian>(count)?
        }
        Architecture::X64 => writer.write_u64::<LittleEndian>(count as u64)?,
    }
    Ok(())
}

fn read_records<T: Record>(reader: &mut Cursor<&[u8]>, count: u64) -> Result<Vec<T>> {
    let remaining = (reader.get_ref().len() as u64).saturating_sub(reader.position());
    let available = remaining / T::SIZE as u64;

    if count > available {
        return Err(DataError::OutOfBounds {
            field: "region element count",
            value: count as i64,
            bounds: 0..available as i64 + 1,
        }
        .into());
    }

    (0..count)
        .map(|_| T::read_le(reader).map_err(Into::into))
        .collect()
}

/// A count followed by that many records
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Region<T> {
    /// The records of this region
    pub elements: Vec<T>,
}

impl<T: Record> Region<T> {
    /// Create an empty region
    pub fn new() -> Self {
        Self {
            elements: Vec::new(),
        }
    }

    /// Decode a region.
    ///
    /// With `off_by_one` the stored count is one larger than the number of records and must not be zero.
    #[instrument(skip(reader), err)]
    pub fn read(
        reader: &mut Cursor<&[u8]>,
        architecture: Architecture,
        off_by_one: bool,
    ) -> Result<Self> {
        let mut count = read_count(reader, architecture)?;

        if off_by_one {
            count = count.checked_sub(1).ok_or(DataError::OutOfBounds {
                field: "off-by-one region count",
                value: 0,
                bounds: 1..i64::MAX,
            })?;
        }

        let elements = read_records(reader, count)?;
        trace!(count = elements.len(), "read region");

        Ok(Self { elements })
    }

    /// Encode the region
    #[instrument(skip_all, err)]
    pub fn write<W: Write + Seek>(
        &self,
        writer: &mut W,
        architecture: Architecture,
        off_by_one: bool,
    ) -> Result<()> {
        write_count(
            writer,
            architecture,
            self.elements.len() + usize::from(off_by_one),
        )?;

        for element in &self.elements {
            element.write_le(writer)?;
        }

        Ok(())
    }

    /// Look up a record, failing with a data error naming `field` when out of bounds
    pub fn get(&self, index: usize, field: &'static str) -> Result<&T> {
        self.elements.get(index).ok_or_else(|| {
            DataError::OutOfBounds {
                field,
                value: index as i64,
                bounds: 0..self.elements.len() as i64,
            }
            .into()
        })
    }
}

/// Records split across capacity-bounded segments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentedRegion<T> {
    /// The segments of this region, in address order
    pub segments: Vec<Vec<T>>,
    capacity: usize,
}

impl<T: Record> Default for SegmentedRegion<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Record> SegmentedRegion<T> {
    /// Create an empty region with the default segment capacity
    pub fn new() -> Self {
        Self::with_capacity(SEGMENT_CAPACITY)
    }

    /// Create an empty region whose segments hold at most `capacity` records
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            segments: Vec::new(),
            capacity: capacity.clamp(1, SEGMENT_CAPACITY),
        }
    }

    /// Create a region with `count` empty segments
    pub fn with_segments(count: usize) -> Self {
        Self {
            segments: vec![Vec::new(); count],
            capacity: SEGMENT_CAPACITY,
        }
    }

    /// Maximum number of records in a segment
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total number of records across all segments
    pub fn len(&self) -> usize {
        self.segments.iter().map(Vec::len).sum()
    }

    /// Whether the region holds no records
    pub fn is_empty(&self) -> bool {
        self.segments.iter().all(Vec::is_empty)
    }

    /// Decode a region
    #[instrument(skip(reader), err)]
    pub fn read(reader: &mut Cursor<&[u8]>, architecture: Architecture) -> Result<Self> {
        let count = read_count(reader, architecture)?;
        // Every segment needs at least its own count field.
        let minimum = match architecture {
            Architecture::X86 => 4,
            Architecture::X64 => 8,
        };
        let remaining = (reader.get_ref().len() as u64).saturating_sub(reader.position());

        if count > remaining / minimum {
            return Err(DataError::OutOfBounds {
                field: "region segment count",
                value: count as i64,
                bounds: 0..(remaining / minimum) as i64 + 1,
            }
            .into());
        }

        let segments = (0..count)
            .map(|_| {
                let length = read_count(reader, architecture)?;
                read_records(reader, length)
            })
            .collect::<Result<Vec<_>>>()?;

        trace!(segments = segments.len(), "read segmented region");

        Ok(Self {
            segments,
            capacity: SEGMENT_CAPACITY,
        })
    }

    /// Encode the region
    #[instrument(skip_all, err)]
    pub fn write<W: Write + Seek>(&self, writer: &mut W, architecture: Architecture) -> Result<()> {
        write_count(writer, architecture, self.segments.len())?;

        for segment in &self.segments {
            write_count(writer, architecture, segment.len())?;
            for element in segment {
                element.write_le(writer)?;
            }
        }

        Ok(())
    }

    /// Fail unless every segment can be reached by an [`Address`]
    pub fn check_addressable(&self, region: &'static str) -> Result<()> {
        if self.segments.len() > MAX_SEGMENTS {
            return Err(DataError::RegionTooLarge {
                region,
                segments: self.segments.len(),
            }
            .into());
        }
        Ok(())
    }

    /// The records of one segment
    pub fn segment(&self, segment: usize, field: &'static str) -> Result<&[T]> {
        self.segments
            .get(segment)
            .map(Vec::as_slice)
            .ok_or_else(|| {
                DataError::OutOfBounds {
                    field,
                    value: segment as i64,
                    bounds: 0..self.segments.len() as i64,
                }
                .into()
            })
    }

    /// `count` contiguous records starting at `start`
    pub fn get_range(&self, start: Address, count: usize, field: &'static str) -> Result<&[T]> {
        let elements = self.segment(start.segment as usize, field)?;
        let first = start.element as usize;

        elements.get(first..first + count).ok_or_else(|| {
            DataError::RangeOutOfBounds {
                field,
                range: first as i64..(first + count) as i64,
                bound: elements.len() as i64,
            }
            .into()
        })
    }

    /// A single record
    pub fn get(&self, address: Address, field: &'static str) -> Result<&T> {
        Ok(&self.get_range(address, 1, field)?[0])
    }

    /// Reserve `count` contiguous default records and return the address of the first one.
    ///
    /// A new segment is started when the current one cannot hold them all. Reserving nothing returns the null
    /// address without touching the region.
    pub fn allocate(&mut self, count: usize, what: &'static str) -> Result<Address> {
        if count == 0 {
            return Ok(Address::default());
        }

        if count > self.capacity {
            return Err(DataError::SegmentOverflow {
                what,
                length: count,
                capacity: self.capacity,
            }
            .into());
        }

        let fits = self
            .segments
            .last()
            .is_some_and(|segment| self.capacity - segment.len() >= count);

        if !fits {
            self.start_segment(what)?;
        }

        let segment = self.segments.len() - 1;
        let elements = &mut self.segments[segment];
        let address = Address::new(segment as u16, elements.len() as u16);
        elements.resize(elements.len() + count, T::default());

        Ok(address)
    }

    /// Free space in the last segment
    pub fn remaining(&self) -> usize {
        self.segments
            .last()
            .map_or(0, |segment| self.capacity - segment.len())
    }

    /// Open a new, empty segment
    pub fn start_segment(&mut self, region: &'static str) -> Result<()> {
        if self.segments.len() == MAX_SEGMENTS {
            return Err(DataError::RegionTooLarge {
                region,
                segments: self.segments.len() + 1,
            }
            .into());
        }
        self.segments.push(Vec::new());
        Ok(())
    }

    /// Mutable access to a record previously handed out by [`SegmentedRegion::allocate`]
    pub fn get_mut(&mut self, address: Address) -> Option<&mut T> {
        self.segments
            .get_mut(address.segment as usize)?
            .get_mut(address.element as usize)
    }

    /// Position of every segment's first record when all segments are laid end to end
    pub fn offsets(&self) -> Vec<usize> {
        self.segments
            .iter()
            .scan(0, |total, segment| {
                let start = *total;
                *total += segment.len();
                Some(start)
            })
            .collect()
    }
}

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use pretty_assertions::assert_eq;

    use crate::error::{DataError, Error, Result};
    use crate::region::{Region, SegmentedRegion};
    use crate::types::{Address, Architecture};

    #[test]
    fn read_segmented_x86() -> Result<()> {
        #[rustfmt::skip]
        let input = [
            0x02, 0x00, 0x00, 0x00,
            0x02, 0x00, 0x00, 0x00,
            0x41, 0x00, 0x42, 0x00,
            0x01, 0x00, 0x00, 0x00,
            0x43, 0x00,
        ];

        let region = SegmentedRegion::<u16>::read(&mut Cursor::new(&input[..]), Architecture::X86)?;

        assert_eq!(region.segments, vec![vec![0x41, 0x42], vec![0x43]]);
        assert_eq!(region.len(), 3);
        assert_eq!(region.offsets(), vec![0, 2]);

        Ok(())
    }

    #[test]
    fn write_segmented_x64() -> Result<()> {
        #[rustfmt::skip]
        let expected = vec![
            0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x41, 0x00,
        ];

        let mut region = SegmentedRegion::<u16>::new();
        let address = region.allocate(1, "characters")?;
        *region.get_mut(address).unwrap() = 0x41;

        let mut actual = Cursor::new(Vec::new());
        region.write(&mut actual, Architecture::X64)?;

        assert_eq!(actual.into_inner(), expected);

        Ok(())
    }

    #[test]
    fn off_by_one_region() -> Result<()> {
        let mut region = Region::<Address>::new();
        region.elements.push(Address::new(0, 4));

        let mut buffer = Cursor::new(Vec::new());
        region.write(&mut buffer, Architecture::X86, true)?;
        let bytes = buffer.into_inner();
        assert_eq!(&bytes[..4], &[0x02, 0x00, 0x00, 0x00]);

        let decoded = Region::<Address>::read(&mut Cursor::new(&bytes[..]), Architecture::X86, true)?;
        assert_eq!(decoded, region);

        let zero = [0u8; 4];
        assert!(Region::<Address>::read(&mut Cursor::new(&zero[..]), Architecture::X86, true).is_err());

        Ok(())
    }

    #[test]
    fn truncated_region_is_rejected() {
        #[rustfmt::skip]
        let input = [
            0x01, 0x00, 0x00, 0x00,
            0xFF, 0x00, 0x00, 0x00,
            0x41, 0x00,
        ];

        let err = SegmentedRegion::<u16>::read(&mut Cursor::new(&input[..]), Architecture::X86)
            .unwrap_err();
        assert!(err.is_invalid_data());
    }

    #[test]
    fn get_range_reports_bounds() -> Result<()> {
        let mut region = SegmentedRegion::<u16>::new();
        region.allocate(4, "characters")?;

        assert_eq!(region.get_range(Address::new(0, 1), 3, "characters")?.len(), 3);

        let err = region
            .get_range(Address::new(0, 2), 3, "characters")
            .unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidData(DataError::RangeOutOfBounds { range, bound: 4, .. }) if range == (2..5)
        ));

        let err = region
            .get_range(Address::new(1, 0), 1, "characters")
            .unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidData(DataError::OutOfBounds { value: 1, .. })
        ));

        Ok(())
    }

    #[test]
    fn allocate_starts_new_segment_when_full() -> Result<()> {
        let mut region = SegmentedRegion::<u16>::with_capacity(4);

        assert_eq!(region.allocate(3, "nodes")?, Address::new(0, 0));
        assert_eq!(region.allocate(2, "nodes")?, Address::new(1, 0));
        assert_eq!(region.allocate(2, "nodes")?, Address::new(1, 2));
        assert_eq!(region.allocate(0, "nodes")?, Address::default());
        assert!(region.allocate(5, "nodes").is_err());

        Ok(())
    }
}
