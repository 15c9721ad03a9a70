use clap::Args;
use miette::{Context, IntoDiagnostic, Result};
use std::{fs::File, io::BufReader, path::PathBuf};
use tdc_datacenter::{DataCenter, LoadOptions, LoaderMode, Mutability};
use tracing::info;

use super::keys::KeyArgs;

#[derive(Args)]
pub struct VerifyArgs {
    /// An input data center file
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    /// Also check hashes, buckets and addresses of the string tables
    #[arg(long, default_value_t = false)]
    strict: bool,

    #[command(flatten)]
    keys: KeyArgs,
}

impl VerifyArgs {
    pub fn handle(&self) -> Result<()> {
        let f = File::open(&self.file)
            .into_diagnostic()
            .context(format!("path: {}", &self.file.display()))?;

        let options = LoadOptions::builder()
            .maybe_key(self.keys.key()?)
            .maybe_iv(self.keys.iv()?)
            .strict(self.strict)
            .mode(LoaderMode::Transient)
            .mutability(Mutability::Immutable)
            .build();

        let dc = DataCenter::load(BufReader::new(f), &options)
            .context(format!("verifying {}", &self.file.display()))?;

        info!(
            "{} is valid, root has {} children",
            &self.file.display(),
            dc.root().child_count()
        );

        Ok(())
    }
}
