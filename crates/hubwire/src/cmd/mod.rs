use std::path::PathBuf;

use clap::{Args, Subcommand};

use crate::exit::{io_error, CliError, CliResult};
use crate::output::OutputFormat;

pub mod crc;
pub mod decode;
pub mod pack;
pub mod plan;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Compute the padded CRC32 of a file.
    Crc(CrcArgs),
    /// Frame a raw message payload for the wire.
    Pack(PackArgs),
    /// Reassemble packets and decode the messages they carry.
    Decode(DecodeArgs),
    /// Show the requests an upload of a file would send.
    Plan(PlanArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Crc(args) => crc::run(args, format),
        Command::Pack(args) => pack::run(args, format),
        Command::Decode(args) => decode::run(args, format),
        Command::Plan(args) => plan::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct CrcArgs {
    /// File to checksum.
    pub file: PathBuf,
    /// Seed, e.g. the previous chunk's CRC (decimal or 0x-prefixed hex).
    #[arg(long, default_value = "0", value_parser = parse_u32)]
    pub seed: u32,
    /// Zero-pad the data to a multiple of this many bytes.
    #[arg(long, default_value_t = hubwire_frame::DEFAULT_ALIGN)]
    pub align: usize,
}

#[derive(Args, Debug)]
pub struct PackArgs {
    /// Message bytes as hex, type byte first.
    pub payload: String,
    /// Split the frame into packets of at most this many bytes.
    #[arg(long)]
    pub packet_size: Option<usize>,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Received packets as hex, in arrival order.
    #[arg(required = true)]
    pub packets: Vec<String>,
}

#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Program file to upload.
    pub file: PathBuf,
    /// Chunk size, normally the hub's negotiated max chunk size.
    #[arg(long)]
    pub chunk_size: usize,
    /// File name stored on the hub.
    #[arg(long, default_value = "program.py")]
    pub name: String,
    /// Program slot.
    #[arg(long, default_value = "0")]
    pub slot: u8,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Accept `1234`, `0x04d2` or `0X04D2`.
pub fn parse_u32(input: &str) -> Result<u32, String> {
    let parsed = match input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
    {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => input.parse(),
    };
    parsed.map_err(|err| format!("invalid value '{input}': {err}"))
}

/// Hex bytes, ignoring whitespace, `:` separators and a `0x` prefix.
pub fn parse_hex(input: &str) -> CliResult<Vec<u8>> {
    let trimmed = input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
        .unwrap_or(input);
    let digits: String = trimmed
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ':')
        .collect();
    hex::decode(&digits).map_err(|err| CliError::usage(format!("invalid hex '{input}': {err}")))
}

pub fn read_file(path: &std::path::Path) -> CliResult<Vec<u8>> {
    std::fs::read(path).map_err(|err| io_error(&path.display().to_string(), err))
}
