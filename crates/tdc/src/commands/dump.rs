use clap::Args;
use miette::{Context, IntoDiagnostic, Result};
use std::{
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::PathBuf,
};
use tdc_datacenter::{DataCenter, LoadOptions, LoaderMode, Mutability};
use tracing::info;

use super::keys::KeyArgs;

#[derive(Args)]
pub struct DumpArgs {
    /// An input data center file
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    /// A target JSON file, standard output when omitted
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Only dump the children of the root with this name
    #[arg(long, value_name = "NAME")]
    sheet: Option<String>,

    /// Allow overwriting the target
    #[arg(long, default_value_t = false)]
    overwrite: bool,

    #[command(flatten)]
    keys: KeyArgs,
}

impl DumpArgs {
    pub fn handle(&self) -> Result<()> {
        let f = File::open(&self.file)
            .into_diagnostic()
            .context(format!("path: {}", &self.file.display()))?;

        let options = LoadOptions::builder()
            .maybe_key(self.keys.key()?)
            .maybe_iv(self.keys.iv()?)
            .mode(LoaderMode::Transient)
            .mutability(Mutability::Immutable)
            .build();

        let dc = DataCenter::load(BufReader::new(f), &options)?;

        let mut out: Box<dyn Write> = match &self.output {
            Some(path) => {
                info!("writing {}", path.display());
                let file = if !self.overwrite {
                    File::create_new(path)
                } else {
                    File::create(path)
                };
                Box::new(BufWriter::new(
                    file.into_diagnostic()
                        .context(format!("creating {}", path.display()))?,
                ))
            }
            None => Box::new(BufWriter::new(std::io::stdout().lock())),
        };

        let root = dc.root();
        match &self.sheet {
            Some(sheet) => {
                let sheets = root.children_named(sheet).collect::<Vec<_>>();
                serde_json::to_writer_pretty(&mut out, &sheets).into_diagnostic()?;
            }
            None => serde_json::to_writer_pretty(&mut out, &root).into_diagnostic()?,
        }

        writeln!(out).into_diagnostic()?;
        out.flush().into_diagnostic()?;

        Ok(())
    }
}
