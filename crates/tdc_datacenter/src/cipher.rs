//! AES-128 in CFB mode with 128-bit feedback, wrapping the payload of a data center.
//!
//! The payload is never padded, the envelope encrypts exactly as many bytes as it is given.

use std::io::{self, Read, Write};

use cfb_mode::cipher::KeyIvInit;
use tracing::instrument;

use crate::error::{ConfigError, Result};

type Aes128CfbDec = cfb_mode::BufDecryptor<aes::Aes128>;
type Aes128CfbEnc = cfb_mode::BufEncryptor<aes::Aes128>;

/// Length of both the key and the IV
pub const KEY_LENGTH: usize = 16;

/// The first revision encrypted with [`KeyPair::LATEST`]
pub const LATEST_REVISION: u32 = 387463;

/// A published key and IV
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct KeyPair {
    /// AES-128 key
    pub key: [u8; KEY_LENGTH],
    /// CFB initialization vector
    pub iv: [u8; KEY_LENGTH],
}

impl KeyPair {
    /// Key pair used by current clients
    pub const LATEST: KeyPair = KeyPair {
        key: [
            0x33, 0x47, 0xa1, 0x74, 0xf9, 0x04, 0x0d, 0x47, 0x68, 0xa0, 0xb0, 0x55, 0x58, 0xdc, 0x86,
            0x6b,
        ],
        iv: [
            0xe4, 0x90, 0x56, 0x28, 0x21, 0xaf, 0x3e, 0x11, 0x76, 0xc9, 0x8d, 0x3c, 0xb9, 0xec, 0x46,
            0x01,
        ],
    };

    /// Key pair used by build 100 clients
    pub const BUILD_100: KeyPair = KeyPair {
        key: [
            0x1c, 0x01, 0xc9, 0x04, 0xff, 0x76, 0xff, 0x06, 0xc2, 0x11, 0x18, 0x7e, 0x19, 0x7b, 0x57,
            0x16,
        ],
        iv: [
            0x39, 0x6c, 0x34, 0x2c, 0x52, 0xa0, 0xc1, 0x2d, 0x51, 0x1d, 0xd0, 0x20, 0x9f, 0x90, 0xca,
            0x7d,
        ],
    };

    /// The default key pair for a data revision
    pub const fn for_revision(revision: u32) -> KeyPair {
        if revision >= LATEST_REVISION {
            KeyPair::LATEST
        } else {
            KeyPair::BUILD_100
        }
    }
}

/// A validated key and IV
#[derive(Clone)]
pub struct Cipher {
    key: [u8; KEY_LENGTH],
    iv: [u8; KEY_LENGTH],
}

impl std::fmt::Debug for Cipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Cipher(..)")
    }
}

impl Cipher {
    /// Validate a caller supplied key and IV
    pub fn new(key: &[u8], iv: &[u8]) -> Result<Self> {
        let key: [u8; KEY_LENGTH] = key
            .try_into()
            .map_err(|_| ConfigError::InvalidKeyLength(key.len()))?;
        let iv: [u8; KEY_LENGTH] = iv
            .try_into()
            .map_err(|_| ConfigError::InvalidIvLength(iv.len()))?;

        Ok(Self { key, iv })
    }

    /// Use the key and IV supplied by the caller, falling back to the pair published for `revision`
    pub fn resolve(key: Option<&[u8]>, iv: Option<&[u8]>, revision: u32) -> Result<Self> {
        let defaults = KeyPair::for_revision(revision);
        Self::new(key.unwrap_or(&defaults.key), iv.unwrap_or(&defaults.iv))
    }

    /// Wrap a reader so that everything read from it is decrypted
    pub fn decryptor<R: Read>(&self, reader: R) -> DecryptReader<R> {
        DecryptReader {
            inner: reader,
            cipher: Aes128CfbDec::new(&self.key.into(), &self.iv.into()),
        }
    }

    /// Wrap a writer so that everything written to it is encrypted
    pub fn encryptor<W: Write>(&self, writer: W) -> EncryptWriter<W> {
        EncryptWriter {
            inner: writer,
            cipher: Aes128CfbEnc::new(&self.key.into(), &self.iv.into()),
            scratch: Vec::new(),
        }
    }
}

impl From<KeyPair> for Cipher {
    fn from(value: KeyPair) -> Self {
        Self {
            key: value.key,
            iv: value.iv,
        }
    }
}

/// Reader decrypting its inner stream
pub struct DecryptReader<R> {
    inner: R,
    cipher: Aes128CfbDec,
}

impl<R> DecryptReader<R> {
    /// Unwrap and return the inner reader object
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> Read for DecryptReader<R> {
    #[instrument(skip_all, level = "trace", err)]
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let read = self.inner.read(buf)?;
        self.cipher.decrypt(&mut buf[..read]);
        Ok(read)
    }
}

/// Writer encrypting everything before passing it to its inner stream
pub struct EncryptWriter<W> {
    inner: W,
    cipher: Aes128CfbEnc,
    scratch: Vec<u8>,
}

impl<W: Write> EncryptWriter<W> {
    /// Flush and return the inner writer object
    pub fn finish(mut self) -> io::Result<W> {
        self.inner.flush()?;
        Ok(self.inner)
    }
}

impl<W: Write> Write for EncryptWriter<W> {
    #[instrument(skip_all, level = "trace", err)]
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        // The keystream advances with every byte, so partial writes are not an option.
        self.scratch.clear();
        self.scratch.extend_from_slice(buf);
        self.cipher.encrypt(&mut self.scratch);
        self.inner.write_all(&self.scratch)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod test {
    use std::io::{Read, Write};

    use pretty_assertions::assert_eq;

    use crate::cipher::{Cipher, KeyPair, LATEST_REVISION};
    use crate::error::{ConfigError, Error, Result};

    #[test]
    fn rejects_short_key() {
        let err = Cipher::new(&[0u8; 15], &[0u8; 16]).unwrap_err();
        assert!(matches!(
            err,
            Error::Config(ConfigError::InvalidKeyLength(15))
        ));
    }

    #[test]
    fn rejects_long_iv() {
        let err = Cipher::new(&[0u8; 16], &[0u8; 17]).unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::InvalidIvLength(17))));
    }

    #[test]
    fn defaults_follow_revision() {
        assert_eq!(KeyPair::for_revision(LATEST_REVISION), KeyPair::LATEST);
        assert_eq!(KeyPair::for_revision(LATEST_REVISION + 10), KeyPair::LATEST);
        assert_eq!(KeyPair::for_revision(100), KeyPair::BUILD_100);
    }

    #[test]
    fn round_trip_without_padding() -> Result<()> {
        let cipher = Cipher::from(KeyPair::LATEST);
        // Deliberately not a multiple of the block size.
        let plain: Vec<u8> = (0..37u8).collect();

        let mut encrypted = cipher.encryptor(Vec::new());
        encrypted.write_all(&plain[..5])?;
        encrypted.write_all(&plain[5..])?;
        let encrypted = encrypted.finish()?;

        assert_eq!(encrypted.len(), plain.len());
        assert_ne!(encrypted, plain);

        let mut decrypted = Vec::new();
        cipher
            .decryptor(encrypted.as_slice())
            .read_to_end(&mut decrypted)?;

        assert_eq!(decrypted, plain);

        Ok(())
    }

    #[test]
    fn wrong_key_garbles() -> Result<()> {
        let plain = b"data center payload".to_vec();

        let mut encrypted = Cipher::from(KeyPair::LATEST).encryptor(Vec::new());
        encrypted.write_all(&plain)?;
        let encrypted = encrypted.finish()?;

        let mut decrypted = Vec::new();
        Cipher::from(KeyPair::BUILD_100)
            .decryptor(encrypted.as_slice())
            .read_to_end(&mut decrypted)?;

        assert_ne!(decrypted, plain);

        Ok(())
    }
}
