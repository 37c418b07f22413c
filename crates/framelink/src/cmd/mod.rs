use clap::{Args, Subcommand};
use std::path::PathBuf;

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod decode;
pub mod encode;
pub mod loopback;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Encode a request frame.
    Encode(EncodeArgs),
    /// Decode every frame in a byte stream.
    Decode(DecodeArgs),
    /// Run a read-memory request through two in-process endpoints.
    Loopback(LoopbackArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Encode(args) => encode::run(args, format),
        Command::Decode(args) => decode::run(args, format),
        Command::Loopback(args) => loopback::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    /// Service id (0-7).
    #[arg(long, short = 's')]
    pub service: u8,
    /// Subfunction (0-3).
    #[arg(long, default_value = "0")]
    pub subfunction: u8,
    /// Payload as hex (e.g. "00 10 00 20" or "0x00100020").
    #[arg(long, short = 'd', default_value = "")]
    pub data: String,
    /// Append a CRC-8 to the frame.
    #[arg(long)]
    pub crc: bool,
    /// Tag the frame as big endian instead of the host order.
    #[arg(long)]
    pub big_endian: bool,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Wire bytes as hex.
    #[arg(conflicts_with = "file", required_unless_present = "file")]
    pub hex: Option<String>,
    /// Read raw wire bytes from a file.
    #[arg(long, conflicts_with = "hex")]
    pub file: Option<PathBuf>,
    /// Largest payload to accept (1-127).
    #[arg(long, default_value = "127")]
    pub max_payload: usize,
}

#[derive(Args, Debug)]
pub struct LoopbackArgs {
    /// File whose bytes form the responder's memory image.
    #[arg(long)]
    pub image: PathBuf,
    /// Address the image is mapped at (decimal or 0x-prefixed hex).
    #[arg(long, default_value = "0")]
    pub base: String,
    /// Address to read (decimal or 0x-prefixed hex).
    #[arg(long)]
    pub address: String,
    /// 1 reads a word, 2 reads a byte; anything else is refused by the responder.
    #[arg(long, default_value = "1")]
    pub subfunction: u8,
    /// Protect the request (and so the response) with a CRC-8.
    #[arg(long)]
    pub crc: bool,
    /// Requester tags its frames big endian.
    #[arg(long)]
    pub big_endian: bool,
    /// Bytes pulled per read of the held response.
    #[arg(long, default_value = "8")]
    pub chunk: usize,
    /// Endpoint configuration (JSON) for the responder.
    #[arg(long, value_name = "FILE", env = "FRAMELINK_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Parse hex text into bytes.
///
/// Whitespace, commas, colons and `0x` prefixes are ignored, so
/// `"F0 01"`, `"0xF0,0x01"` and `"f001"` are all accepted.
pub fn parse_hex(input: &str) -> CliResult<Vec<u8>> {
    let digits: String = input
        .split(|c: char| c.is_whitespace() || c == ',' || c == ':')
        .map(|token| {
            token
                .strip_prefix("0x")
                .or_else(|| token.strip_prefix("0X"))
                .unwrap_or(token)
        })
        .collect();

    if digits.len() % 2 != 0 {
        return Err(CliError::new(
            USAGE,
            format!("hex input has an odd number of digits: {input:?}"),
        ));
    }

    (0..digits.len())
        .step_by(2)
        .map(|i| {
            digits
                .get(i..i + 2)
                .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                .ok_or_else(|| CliError::new(USAGE, format!("invalid hex input: {input:?}")))
        })
        .collect()
}

/// Parse a decimal or `0x`-prefixed hex u32.
pub fn parse_u32(input: &str) -> CliResult<u32> {
    let input = input.trim();
    let parsed = match input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
    {
        Some(hex) => u32::from_str_radix(&hex.replace('_', ""), 16),
        None => input.replace('_', "").parse(),
    };
    parsed.map_err(|_| CliError::new(USAGE, format!("invalid address: {input}")))
}
