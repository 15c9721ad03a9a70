//! Options controlling how data centers are loaded and saved

use std::fmt;

use bon::Builder;

use crate::cipher::{Cipher, LATEST_REVISION};
use crate::compression::CompressionMethod;
use crate::error::{ConfigError, Result};
use crate::types::Architecture;

/// When node records are turned into nodes
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub enum LoaderMode {
    /// Never; every access decodes the record again
    Transient,

    /// On first access to a node
    ///
    /// Loading still decodes and checks every reachable record once, so it takes about as long as
    /// [`LoaderMode::Eager`]. What is saved is the memory of the nodes that are never visited.
    #[default]
    Lazy,

    /// All at once while loading, after which the raw regions are released
    Eager,
}

/// Whether the nodes of a loaded tree may be changed
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub enum Mutability {
    /// All mutators are available
    #[default]
    Mutable,

    /// Every mutator fails with [`crate::error::Error::ImmutableNode`]
    Immutable,
}

/// Options for how a data center should be read
#[derive(Clone, Default, Builder)]
pub struct LoadOptions {
    /// AES key, defaults to the key published for the file's revision
    pub key: Option<Vec<u8>>,

    /// AES IV, defaults to the IV published for the file's revision
    pub iv: Option<Vec<u8>>,

    /// Cross-check the redundant bookkeeping of the string tables and node records
    #[builder(default)]
    pub strict: bool,

    /// When nodes are materialized
    #[builder(default)]
    pub mode: LoaderMode,

    /// Whether the resulting tree may be changed
    #[builder(default)]
    pub mutability: Mutability,
}

/// Renders whether a key or IV is set without showing it
fn redacted(secret: &Option<Vec<u8>>) -> Option<&'static str> {
    secret.as_ref().map(|_| "..")
}

impl fmt::Debug for LoadOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadOptions")
            .field("key", &redacted(&self.key))
            .field("iv", &redacted(&self.iv))
            .field("strict", &self.strict)
            .field("mode", &self.mode)
            .field("mutability", &self.mutability)
            .finish()
    }
}

impl LoadOptions {
    /// Reject combinations no loader can produce
    pub fn validate(&self) -> Result<()> {
        if let Some(key) = &self.key {
            if key.len() != crate::cipher::KEY_LENGTH {
                return Err(ConfigError::InvalidKeyLength(key.len()).into());
            }
        }

        if let Some(iv) = &self.iv {
            if iv.len() != crate::cipher::KEY_LENGTH {
                return Err(ConfigError::InvalidIvLength(iv.len()).into());
            }
        }

        if self.mode == LoaderMode::Transient && self.mutability == Mutability::Mutable {
            return Err(ConfigError::UnsupportedMode(self.mode, self.mutability).into());
        }

        Ok(())
    }

    pub(crate) fn cipher(&self, revision: u32) -> Result<Cipher> {
        Cipher::resolve(self.key.as_deref(), self.iv.as_deref(), revision)
    }
}

/// Options for how a data center should be written
#[derive(Clone, Builder)]
pub struct SaveOptions {
    /// AES key, defaults to the key published for `revision`
    pub key: Option<Vec<u8>>,

    /// AES IV, defaults to the IV published for `revision`
    pub iv: Option<Vec<u8>>,

    /// Data revision recorded in the header
    #[builder(default = LATEST_REVISION)]
    pub revision: u32,

    /// Width of the count fields
    #[builder(default)]
    pub architecture: Architecture,

    /// Compression applied to the payload before encryption
    #[builder(default)]
    pub compression: CompressionMethod,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl fmt::Debug for SaveOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SaveOptions")
            .field("key", &redacted(&self.key))
            .field("iv", &redacted(&self.iv))
            .field("revision", &self.revision)
            .field("architecture", &self.architecture)
            .field("compression", &self.compression)
            .finish()
    }
}

impl SaveOptions {
    /// Reject invalid keys before anything is written
    pub fn validate(&self) -> Result<()> {
        self.cipher().map(|_| ())
    }

    pub(crate) fn cipher(&self) -> Result<Cipher> {
        Cipher::resolve(self.key.as_deref(), self.iv.as_deref(), self.revision)
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use crate::cipher::LATEST_REVISION;
    use crate::compression::CompressionMethod;
    use crate::error::{ConfigError, Error};
    use crate::options::{LoadOptions, LoaderMode, Mutability, SaveOptions};
    use crate::types::Architecture;

    #[test]
    fn load_defaults() {
        let options = LoadOptions::builder().build();

        assert!(!options.strict);
        assert_eq!(options.mode, LoaderMode::Lazy);
        assert_eq!(options.mutability, Mutability::Mutable);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn save_defaults() {
        let options = SaveOptions::default();

        assert_eq!(options.revision, LATEST_REVISION);
        assert_eq!(options.architecture, Architecture::X64);
        assert_eq!(options.compression, CompressionMethod::Zlib);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn transient_mutable_is_rejected() {
        let options = LoadOptions::builder()
            .mode(LoaderMode::Transient)
            .mutability(Mutability::Mutable)
            .build();

        let err = options.validate().unwrap_err();
        assert!(matches!(
            err,
            Error::Config(ConfigError::UnsupportedMode(
                LoaderMode::Transient,
                Mutability::Mutable
            ))
        ));
    }

    #[test]
    fn debug_hides_key_material() {
        let load = LoadOptions::builder()
            .key(vec![0x42; 16])
            .iv(vec![0x24; 16])
            .build();
        let save = SaveOptions::builder().key(vec![0x42; 16]).build();

        for rendered in [format!("{load:?}"), format!("{save:?}")] {
            assert!(!rendered.contains("66"));
            assert!(rendered.contains("key: Some(\"..\")"));
        }
        assert!(format!("{save:?}").contains("iv: None"));
    }

    #[test]
    fn bad_key_is_rejected_before_io() {
        let options = SaveOptions::builder().key(vec![0; 8]).build();
        assert!(matches!(
            options.validate().unwrap_err(),
            Error::Config(ConfigError::InvalidKeyLength(8))
        ));

        let options = LoadOptions::builder().iv(vec![0; 32]).build();
        assert!(matches!(
            options.validate().unwrap_err(),
            Error::Config(ConfigError::InvalidIvLength(32))
        ));
    }
}
