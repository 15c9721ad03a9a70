//! Payload compression and decompression handling.

use std::io::{self, Read, Write};

use binrw::{BinRead, BinWrite};
use flate2::{read::ZlibDecoder, write::ZlibEncoder, Compression};
use tracing::instrument;

/// Identifies the storage format used to compress the payload inside the envelope
///
/// When creating data center files, you may choose the method via [`crate::options::SaveOptions`].
#[derive(BinRead, BinWrite, Debug, Copy, Clone, Default, PartialEq, Eq)]
#[brw(repr=u32)]
pub enum CompressionMethod {
    /// Stores the payload as it is
    None = 0,

    /// Compress the payload using Zlib
    #[default]
    Zlib = 2,
}

pub(crate) enum PayloadReader<R: Read> {
    Raw(R),
    Compressed(Box<ZlibDecoder<R>>),
}

impl<R: Read> PayloadReader<R> {
    #[tracing::instrument(skip(reader))]
    pub fn new(reader: R, compression: CompressionMethod) -> Self {
        match compression {
            CompressionMethod::None => PayloadReader::Raw(reader),
            CompressionMethod::Zlib => PayloadReader::Compressed(Box::new(ZlibDecoder::new(reader))),
        }
    }
}

impl<R: Read> Read for PayloadReader<R> {
    #[instrument(skip_all, err)]
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            PayloadReader::Raw(r) => r.read(buf),
            PayloadReader::Compressed(r) => r.read(buf),
        }
    }

    #[instrument(skip_all, err)]
    fn read_to_end(&mut self, buf: &mut Vec<u8>) -> io::Result<usize> {
        match self {
            PayloadReader::Raw(r) => r.read_to_end(buf),
            PayloadReader::Compressed(r) => r.read_to_end(buf),
        }
    }
}

pub(crate) enum PayloadWriter<W: Write> {
    Raw(W, usize),
    Compressed(Box<ZlibEncoder<W>>),
}

impl<W: Write> PayloadWriter<W> {
    #[tracing::instrument(skip(writer))]
    pub fn new(writer: W, compression: CompressionMethod) -> Self {
        match compression {
            CompressionMethod::None => PayloadWriter::Raw(writer, 0),
            CompressionMethod::Zlib => PayloadWriter::Compressed(Box::new(ZlibEncoder::new(
                writer,
                Compression::default(),
            ))),
        }
    }

    #[instrument(skip(self), err)]
    pub fn finalize(self) -> io::Result<W> {
        match self {
            PayloadWriter::Raw(w, _) => Ok(w),
            PayloadWriter::Compressed(w) => w.finish(),
        }
    }

    pub fn total_in(&self) -> u64 {
        match self {
            PayloadWriter::Raw(_, c) => *c as u64,
            PayloadWriter::Compressed(w) => w.total_in(),
        }
    }
}

impl<W: Write> Write for PayloadWriter<W> {
    #[instrument(skip_all, err)]
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            PayloadWriter::Raw(w, c) => {
                let written = w.write(buf)?;
                *c += written;
                Ok(written)
            }
            PayloadWriter::Compressed(w) => w.write(buf),
        }
    }

    #[instrument(skip(self), err)]
    fn flush(&mut self) -> io::Result<()> {
        match self {
            PayloadWriter::Raw(w, _) => w.flush(),
            PayloadWriter::Compressed(w) => w.flush(),
        }
    }
}

#[cfg(test)]
mod test {
    use std::io::{Read, Write};

    use crate::compression::{CompressionMethod, PayloadReader, PayloadWriter};
    use crate::error::Result;

    #[test]
    fn zlib_round_trip() -> Result<()> {
        let data = b"Hello World Hello World Hello World";

        let mut writer = PayloadWriter::new(Vec::new(), CompressionMethod::Zlib);
        writer.write_all(data)?;
        assert_eq!(writer.total_in(), data.len() as u64);
        let compressed = writer.finalize()?;
        assert_ne!(compressed.as_slice(), data.as_slice());

        let mut actual = Vec::new();
        PayloadReader::new(compressed.as_slice(), CompressionMethod::Zlib).read_to_end(&mut actual)?;
        assert_eq!(actual, data);

        Ok(())
    }

    #[test]
    fn uncompressed_is_passthrough() -> Result<()> {
        let mut writer = PayloadWriter::new(Vec::new(), CompressionMethod::None);
        writer.write_all(&[1, 2, 3])?;
        assert_eq!(writer.total_in(), 3);
        assert_eq!(writer.finalize()?, vec![1, 2, 3]);

        Ok(())
    }
}
