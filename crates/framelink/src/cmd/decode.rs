use std::fs;
use std::io::{Cursor, Read};

use framelink_frame::{FrameConfig, FrameError, FrameReader, Packet};
use tracing::warn;

use crate::cmd::{parse_hex, DecodeArgs};
use crate::exit::{frame_error, io_error, CliError, CliResult, DATA_INVALID, SUCCESS, USAGE};
use crate::output::{print_packets, DecodedPacket, OutputFormat};

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    if args.max_payload == 0 || args.max_payload > 127 {
        return Err(CliError::new(USAGE, "--max-payload must be 1..=127"));
    }

    let wire = match (&args.hex, &args.file) {
        (_, Some(path)) => fs::read(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err))?,
        (Some(hex), None) => parse_hex(hex)?,
        (None, None) => return Err(CliError::new(USAGE, "no input given")),
    };

    let config = FrameConfig {
        max_payload_size: args.max_payload,
        ..FrameConfig::default()
    };
    let packets = read_all(Cursor::new(wire), config)?;
    if packets.is_empty() {
        return Err(CliError::new(DATA_INVALID, "no valid frames in input"));
    }

    let out: Vec<DecodedPacket> = packets.iter().map(DecodedPacket::from).collect();
    print_packets(&out, format);
    Ok(SUCCESS)
}

/// Read packets until the stream ends. Oversized frames are skipped.
fn read_all<R: Read>(stream: R, config: FrameConfig) -> CliResult<Vec<Packet>> {
    let mut reader = FrameReader::with_config(stream, config);
    let mut packets = Vec::new();
    loop {
        match reader.read_packet() {
            Ok(packet) => packets.push(packet),
            Err(FrameError::ConnectionClosed) => return Ok(packets),
            Err(err @ FrameError::FrameTooLarge { .. }) => {
                warn!(error = %err, "skipping oversized frame");
            }
            Err(err) => return Err(frame_error("decode failed", err)),
        }
    }
}
