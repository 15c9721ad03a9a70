use clap::Args;
use miette::{miette, Result};

/// Parse a 16-byte key or IV given as 32 hex digits
pub fn parse_hex(value: &str) -> Result<Vec<u8>> {
    let value = value.trim();
    if value.len() % 2 != 0 || !value.is_ascii() {
        return Err(miette!("expected an even number of hex digits, got {value:?}"));
    }

    (0..value.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&value[i..i + 2], 16)
                .map_err(|e| miette!("invalid hex digits {:?}: {e}", &value[i..i + 2]))
        })
        .collect()
}

#[derive(Args, Debug, Clone, Default)]
pub struct KeyArgs {
    /// AES key as hex, defaults to the key published for the file's revision
    #[arg(long, value_name = "HEX")]
    pub key: Option<String>,

    /// AES IV as hex, defaults to the IV published for the file's revision
    #[arg(long, value_name = "HEX")]
    pub iv: Option<String>,
}

impl KeyArgs {
    pub fn key(&self) -> Result<Option<Vec<u8>>> {
        self.key.as_deref().map(parse_hex).transpose()
    }

    pub fn iv(&self) -> Result<Option<Vec<u8>>> {
        self.iv.as_deref().map(parse_hex).transpose()
    }
}
