//! CLI argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Parse a string as a hex or decimal u32
fn parse_hex_u32(s: &str) -> Result<u32, String> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex value: {}", e))
    } else {
        s.parse::<u32>().map_err(|e| format!("Invalid number: {}", e))
    }
}

/// Bytes given as hex on the command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HexBytes(pub Vec<u8>);

/// Parse hex bytes: "deadbeef", "de ad be ef", "0xde,0xad" or "de:ad"
pub fn parse_hex_bytes(s: &str) -> Result<HexBytes, String> {
    let mut bytes = Vec::new();
    for token in s
        .split(|c: char| c.is_whitespace() || c == ',' || c == ':')
        .filter(|t| !t.is_empty())
    {
        let digits = token
            .strip_prefix("0x")
            .or_else(|| token.strip_prefix("0X"))
            .unwrap_or(token);
        // A lone 1-2 digit token is one byte, longer runs are digit pairs
        if digits.is_empty() || !digits.is_ascii() || (digits.len() > 2 && digits.len() % 2 != 0) {
            return Err(format!("Invalid hex bytes: '{}'", token));
        }
        let mut rest = digits;
        while !rest.is_empty() {
            let (byte, tail) = rest.split_at(rest.len().min(2));
            bytes.push(
                u8::from_str_radix(byte, 16)
                    .map_err(|e| format!("Invalid hex byte '{}': {}", byte, e))?,
            );
            rest = tail;
        }
    }
    if bytes.is_empty() {
        return Err("No bytes given".into());
    }
    Ok(HexBytes(bytes))
}

/// Parse a `name=value` field assignment
fn parse_assignment(s: &str) -> Result<(String, String), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("Expected NAME=VALUE, got '{}'", s))?;
    if name.trim().is_empty() {
        return Err(format!("Missing field name in '{}'", s));
    }
    Ok((name.trim().to_string(), value.trim().to_string()))
}

#[derive(Parser)]
#[command(name = "rdyspi")]
#[command(author, version, about = "Handshake-gated SPI transfers", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// Device options shared across commands
#[derive(clap::Args, Debug, Clone, Default)]
pub struct DeviceArgs {
    /// spidev node (e.g. /dev/spidev0.0)
    #[arg(short, long)]
    pub device: Option<PathBuf>,

    /// Device configuration file (TOML format)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Set a field by name (repeatable, see `rdyspi fields`)
    #[arg(long = "set", value_name = "NAME=VALUE", value_parser = parse_assignment)]
    pub set: Vec<(String, String)>,

    /// SPI clock mode (0-3)
    #[arg(long, value_parser = parse_hex_u32)]
    pub mode: Option<u32>,

    /// Bus clock in Hz (hex or decimal)
    #[arg(long, value_parser = parse_hex_u32)]
    pub speed: Option<u32>,

    /// GPIO number of the write strobe
    #[arg(long)]
    pub wr_pin: Option<u32>,

    /// GPIO number of the ready line
    #[arg(long)]
    pub rdy_pin: Option<u32>,

    /// Treat the ready line as a busy line (low means ready)
    #[arg(long)]
    pub invert_rdy: bool,

    /// Give up when the peer is not ready after this many microseconds
    #[arg(long)]
    pub timeout_us: Option<u64>,

    /// Run against the simulated bus instead of hardware
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List configurable fields with their defaults
    Fields,

    /// List compiled-in backends
    Backends,

    /// Show the resolved device configuration as TOML
    Show {
        #[command(flatten)]
        args: DeviceArgs,
    },

    /// Run one full-duplex transfer
    Transfer {
        #[command(flatten)]
        args: DeviceArgs,

        /// Bytes to send (hex)
        #[arg(short, long, value_parser = parse_hex_bytes)]
        write: Option<HexBytes>,

        /// Number of bytes to receive
        #[arg(short, long)]
        read: Option<usize>,
    },

    /// Stream a file to the device, one transfer per chunk
    Send {
        #[command(flatten)]
        args: DeviceArgs,

        /// Input file path
        #[arg(short, long)]
        input: PathBuf,

        /// Save the bytes received during the stream
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Bytes per transfer
        #[arg(long, default_value_t = 256, value_parser = clap::value_parser!(u32).range(1..))]
        chunk: u32,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_hex_bytes() {
        assert_eq!(parse_hex_bytes("deadbeef").unwrap().0, vec![0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(parse_hex_bytes("de ad").unwrap().0, vec![0xde, 0xad]);
        assert_eq!(parse_hex_bytes("0x1,0x02").unwrap().0, vec![0x01, 0x02]);
        assert_eq!(parse_hex_bytes("AA:bb").unwrap().0, vec![0xaa, 0xbb]);
        assert!(parse_hex_bytes("abc").is_err());
        assert!(parse_hex_bytes("zz").is_err());
        assert!(parse_hex_bytes("").is_err());
    }

    #[test]
    fn test_parse_assignment() {
        assert_eq!(
            parse_assignment("maxSpeed=500000").unwrap(),
            ("maxSpeed".to_string(), "500000".to_string())
        );
        assert!(parse_assignment("loopback").is_err());
        assert!(parse_assignment("=1").is_err());
    }

    #[test]
    fn test_transfer_args() {
        let cli = Cli::try_parse_from([
            "rdyspi",
            "transfer",
            "-d",
            "/dev/spidev0.0",
            "--wr-pin",
            "17",
            "--set",
            "invertRdy=true",
            "-w",
            "9f",
            "-r",
            "1",
        ])
        .unwrap();
        match cli.command {
            Commands::Transfer { args, write, read } => {
                assert_eq!(args.wr_pin, Some(17));
                assert_eq!(args.set, vec![("invertRdy".into(), "true".into())]);
                assert_eq!(write, Some(HexBytes(vec![0x9f])));
                assert_eq!(read, Some(1));
            }
            _ => panic!("expected transfer"),
        }
    }

    #[test]
    fn test_send_rejects_zero_chunk() {
        assert!(Cli::try_parse_from(["rdyspi", "send", "-i", "x.bin", "--chunk", "0"]).is_err());
    }
}
