pub mod dump;
pub mod keys;
pub mod repack;
pub mod verify;

#[derive(clap::Subcommand)]
pub enum Commands {
    /// Check that a data center decodes, without keeping its tree
    Verify(verify::VerifyArgs),
    /// Write the tree of a data center as JSON
    Dump(dump::DumpArgs),
    /// Re-encode a data center with different options
    Repack(repack::RepackArgs),
}

impl Commands {
    pub fn handle(&self) -> miette::Result<()> {
        match self {
            Commands::Verify(verify) => verify.handle(),
            Commands::Dump(dump) => dump.handle(),
            Commands::Repack(repack) => repack.handle(),
        }
    }
}
