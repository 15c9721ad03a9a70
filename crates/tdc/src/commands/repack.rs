use clap::{Args, ValueEnum};
use miette::{Context, IntoDiagnostic, Result};
use std::{
    fs::File,
    io::{BufReader, BufWriter},
    path::PathBuf,
};
use tdc_datacenter::{
    Architecture, CompressionMethod, DataCenter, LoadOptions, LoaderMode, Mutability, SaveOptions,
};
use tracing::info;

use super::keys::{parse_hex, KeyArgs};

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, ValueEnum)]
enum Arch {
    X86,
    #[default]
    X64,
}

impl From<Arch> for Architecture {
    fn from(value: Arch) -> Self {
        match value {
            Arch::X86 => Architecture::X86,
            Arch::X64 => Architecture::X64,
        }
    }
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, ValueEnum)]
enum Compression {
    None,
    #[default]
    Zlib,
}

impl From<Compression> for CompressionMethod {
    fn from(value: Compression) -> Self {
        match value {
            Compression::None => CompressionMethod::None,
            Compression::Zlib => CompressionMethod::Zlib,
        }
    }
}

#[derive(Args)]
pub struct RepackArgs {
    /// An input data center file
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    /// A target data center file
    #[arg(short, long, value_name = "FILE")]
    output: PathBuf,

    /// Check the input strictly while loading
    #[arg(long, default_value_t = false)]
    strict: bool,

    #[command(flatten)]
    keys: KeyArgs,

    /// AES key for the output as hex, defaults to the key published for the revision
    #[arg(long, value_name = "HEX")]
    out_key: Option<String>,

    /// AES IV for the output as hex, defaults to the IV published for the revision
    #[arg(long, value_name = "HEX")]
    out_iv: Option<String>,

    /// Data revision recorded in the output
    #[arg(long)]
    revision: Option<u32>,

    /// Architecture of the output
    #[arg(long, value_enum, default_value_t)]
    architecture: Arch,

    /// Compression of the output payload
    #[arg(long, value_enum, default_value_t)]
    compression: Compression,

    /// Allow overwriting the target
    #[arg(long, default_value_t = false)]
    overwrite: bool,
}

impl RepackArgs {
    pub fn handle(&self) -> Result<()> {
        let save = SaveOptions::builder()
            .maybe_key(self.out_key.as_deref().map(parse_hex).transpose()?)
            .maybe_iv(self.out_iv.as_deref().map(parse_hex).transpose()?)
            .maybe_revision(self.revision)
            .architecture(self.architecture.into())
            .compression(self.compression.into())
            .build();
        save.validate()?;

        let f = File::open(&self.file)
            .into_diagnostic()
            .context(format!("path: {}", &self.file.display()))?;

        let load = LoadOptions::builder()
            .maybe_key(self.keys.key()?)
            .maybe_iv(self.keys.iv()?)
            .strict(self.strict)
            .mode(LoaderMode::Lazy)
            .mutability(Mutability::Immutable)
            .build();

        info!("loading {}", &self.file.display());
        let dc = DataCenter::load(BufReader::new(f), &load)?;

        let out = if !self.overwrite {
            File::create_new(&self.output)
        } else {
            File::create(&self.output)
        }
        .into_diagnostic()
        .context(format!("creating {}", &self.output.display()))?;

        info!("writing {}", &self.output.display());
        dc.save(BufWriter::new(out), &save)
            .context(format!("writing {}", &self.output.display()))?;

        Ok(())
    }
}
