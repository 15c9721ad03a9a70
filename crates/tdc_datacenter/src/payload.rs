//! The envelope around the payload and the raw regions inside it.

use std::io::{Cursor, Read, Seek, Write};

use binrw::{BinRead, BinWrite};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use tracing::{debug, instrument};

use crate::cipher::Cipher;
use crate::compression::{PayloadReader, PayloadWriter};
use crate::error::{DataError, Error, Result};
use crate::region::{Region, SegmentedRegion};
use crate::string_table::RawStringTable;
use crate::types::{Architecture, ContainerHeader, RawAttribute, RawKeys, RawNode, FORMAT_VERSION};

/// Number of descriptor buckets in the names table
pub const NAME_BUCKETS: usize = 512;

/// Number of descriptor buckets in the values table
pub const VALUE_BUCKETS: usize = 1024;

/// How many times the size of the encrypted body is reserved up front for the decoded payload
const MAX_PRESIZE_RATIO: usize = 4;

/// Read and check the plaintext header
#[instrument(skip(reader), err)]
pub fn read_header<R: Read + Seek>(reader: &mut R) -> Result<ContainerHeader> {
    let mut magic = [0; 4];
    reader.read_exact(&mut magic)?;
    if &magic != b"TDCF" {
        return Err(DataError::BadMagic(magic).into());
    }
    reader.seek(std::io::SeekFrom::Current(-4))?;

    let header = ContainerHeader::read(reader).map_err(|e| match e {
        binrw::Error::Io(e) => Error::from(e),
        other => DataError::InvalidHeader(other.to_string()).into(),
    })?;
    if header.version != FORMAT_VERSION {
        return Err(DataError::UnsupportedVersion(header.version).into());
    }

    Ok(header)
}

/// Decrypt and decompress the payload following the header
#[instrument(skip(cipher, body), fields(body = body.len()), err)]
pub fn open_payload(header: &ContainerHeader, cipher: &Cipher, body: &[u8]) -> Result<Vec<u8>> {
    let mut decrypted = cipher.decryptor(body);
    let expected = decrypted.read_u32::<LittleEndian>()?;

    // The declared size is untrusted until the payload has been decoded, so it only bounds the read.
    let capacity = (expected as usize).min(body.len().saturating_mul(MAX_PRESIZE_RATIO));
    let mut payload = Vec::with_capacity(capacity);
    PayloadReader::new(decrypted, header.compression)
        .take(u64::from(expected) + 1)
        .read_to_end(&mut payload)?;

    if payload.len() as u64 != expected as u64 {
        return Err(DataError::PayloadSize {
            expected,
            actual: payload.len() as u64,
        }
        .into());
    }

    debug!(size = payload.len(), "opened payload");

    Ok(payload)
}

/// Write the header, then compress and encrypt the payload after it
#[instrument(skip(cipher, payload, writer), fields(payload = payload.len()), err)]
pub fn seal_payload<W: Write + Seek>(
    header: &ContainerHeader,
    cipher: &Cipher,
    payload: &[u8],
    writer: &mut W,
) -> Result<()> {
    header.write(writer)?;

    let size = u32::try_from(payload.len()).map_err(|_| DataError::TooMany {
        what: "payload bytes",
        count: payload.len(),
        max: u32::MAX as usize,
    })?;

    let mut encrypted = cipher.encryptor(writer);
    encrypted.write_u32::<LittleEndian>(size)?;

    let mut compressed = PayloadWriter::new(encrypted, header.compression);
    compressed.write_all(payload)?;
    debug!(size = compressed.total_in(), "sealed payload");
    compressed.finalize()?.finish()?;

    Ok(())
}

/// Every region of a payload, as stored
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawDataCenter {
    /// Names of nodes, attributes and keys
    pub names: RawStringTable,
    /// String attribute values
    pub values: RawStringTable,
    /// Deduplicated key sets
    pub keys: Region<RawKeys>,
    /// Node records, the root first
    pub nodes: SegmentedRegion<RawNode>,
    /// Attribute records
    pub attributes: SegmentedRegion<RawAttribute>,
}

impl RawDataCenter {
    /// Decode the regions of a decompressed payload
    #[instrument(skip(payload), fields(payload = payload.len()), err)]
    pub fn read(payload: &[u8], architecture: Architecture) -> Result<Self> {
        let mut reader = Cursor::new(payload);

        Ok(Self {
            names: RawStringTable::read(&mut reader, architecture)?,
            values: RawStringTable::read(&mut reader, architecture)?,
            keys: Region::read(&mut reader, architecture, false)?,
            nodes: SegmentedRegion::read(&mut reader, architecture)?,
            attributes: SegmentedRegion::read(&mut reader, architecture)?,
        })
    }

    /// Encode all regions into a payload
    #[instrument(skip(self), err)]
    pub fn write(&self, architecture: Architecture) -> Result<Vec<u8>> {
        let mut writer = Cursor::new(Vec::new());

        self.names.write(&mut writer, architecture)?;
        self.values.write(&mut writer, architecture)?;
        self.keys.write(&mut writer, architecture, false)?;
        self.nodes.write(&mut writer, architecture)?;
        self.attributes.write(&mut writer, architecture)?;

        Ok(writer.into_inner())
    }

    /// Decode a complete container without interpreting its regions
    pub fn unseal(bytes: &[u8], key: Option<&[u8]>, iv: Option<&[u8]>) -> Result<(ContainerHeader, Self)> {
        let mut reader = Cursor::new(bytes);
        let header = read_header(&mut reader)?;
        let cipher = Cipher::resolve(key, iv, header.revision)?;
        let payload = open_payload(&header, &cipher, &bytes[ContainerHeader::SIZE..])?;

        Ok((header, Self::read(&payload, header.architecture)?))
    }

    /// Encode a complete container from these regions
    pub fn seal(&self, header: &ContainerHeader, key: Option<&[u8]>, iv: Option<&[u8]>) -> Result<Vec<u8>> {
        let cipher = Cipher::resolve(key, iv, header.revision)?;
        let payload = self.write(header.architecture)?;

        let mut writer = Cursor::new(Vec::new());
        seal_payload(header, &cipher, &payload, &mut writer)?;

        Ok(writer.into_inner())
    }
}
