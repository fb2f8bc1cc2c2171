use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::str::FromStr;

/// Hex-encoded bytes given on the command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HexArg(pub Vec<u8>);

impl FromStr for HexArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().trim_start_matches("0x");
        hex::decode(trimmed)
            .map(HexArg)
            .map_err(|e| format!("Invalid hex: {e}"))
    }
}

#[derive(Debug, Parser)]
#[command(name = "apdu-block-host", about = "Talk to a signing app over APDU")]
pub struct Opt {
    #[arg(long, global = true, help = "TOML settings file")]
    pub config: Option<PathBuf>,
    #[arg(long, global = true, help = "Emulator APDU socket as HOST:PORT")]
    pub addr: Option<String>,
    #[arg(long, global = true, help = "Use the block protocol for every command")]
    pub blocks: bool,
    #[arg(short, long, global = true, help = "Log every protocol round")]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    #[command(name = "version", about = "Print the application name and version")]
    Version,
    #[command(name = "pubkey", about = "Get the public key for a derivation path")]
    Pubkey {
        #[arg(long, help = "Derivation path, e.g. m/44'/535348'/0'")]
        path: String,
        #[arg(long, help = "Show the key on the device for approval")]
        confirm: bool,
    },
    #[command(name = "sign", about = "Sign a transaction")]
    Sign {
        #[arg(long, help = "Derivation path of the signing key")]
        path: String,
        #[arg(long = "tx-hex", conflicts_with = "tx_file", help = "Transaction bytes as hex")]
        tx_hex: Option<HexArg>,
        #[arg(long = "tx-file", help = "File holding the raw transaction")]
        tx_file: Option<PathBuf>,
    },
    #[command(
        name = "chunks",
        about = "Print the chunk manifest for a payload without contacting a device"
    )]
    Chunks {
        #[arg(long = "chunk-size", help = "Payload bytes per chunk")]
        chunk_size: Option<usize>,
        #[arg(long, conflicts_with = "file", help = "Payload as hex")]
        hex: Option<HexArg>,
        #[arg(long, help = "File holding the payload")]
        file: Option<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_arg() {
        assert_eq!("0xdead".parse::<HexArg>().unwrap(), HexArg(vec![0xde, 0xad]));
        assert!("xyz".parse::<HexArg>().is_err());
    }

    #[test]
    fn test_parse_sign_command() {
        let opt = Opt::try_parse_from([
            "apdu-block-host",
            "--blocks",
            "sign",
            "--path",
            "m/44'/0'",
            "--tx-hex",
            "0102",
        ])
        .unwrap();
        assert!(opt.blocks);
        match opt.command {
            Command::Sign { path, tx_hex, tx_file } => {
                assert_eq!(path, "m/44'/0'");
                assert_eq!(tx_hex, Some(HexArg(vec![1, 2])));
                assert!(tx_file.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_conflicting_sources_rejected() {
        let parsed = Opt::try_parse_from([
            "apdu-block-host",
            "chunks",
            "--hex",
            "00",
            "--file",
            "payload.bin",
        ]);
        assert!(parsed.is_err());
    }
}
