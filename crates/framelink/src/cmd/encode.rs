use framelink_frame::{encode_to_bytes, native_byte_order, ByteOrder, Checksum, Crc8, Packet};
use tracing::debug;

use crate::cmd::{parse_hex, EncodeArgs};
use crate::exit::{frame_error, CliResult, SUCCESS};
use crate::output::{print_encoded, to_hex, EncodedFrame, OutputFormat};

pub fn run(args: EncodeArgs, format: OutputFormat) -> CliResult<i32> {
    let payload = parse_hex(&args.data)?;
    let byte_order = if args.big_endian {
        ByteOrder::Big
    } else {
        native_byte_order()
    };

    let packet = Packet::request(args.service, args.subfunction, byte_order, payload)
        .map_err(|err| frame_error("invalid request", err))?;
    let checksum = args.crc.then_some(&Crc8 as &dyn Checksum);
    let wire = encode_to_bytes(&packet, checksum).map_err(|err| frame_error("encode failed", err))?;
    debug!(size = wire.len(), "frame encoded");

    let frame = EncodedFrame {
        service: packet.service.get(),
        subfunction: packet.subfunction.get(),
        byte_order: byte_order.to_string(),
        crc: args.crc,
        payload_size: packet.payload.len(),
        frame_size: wire.len(),
        frame: to_hex(&wire),
    };
    print_encoded(&frame, &wire, format);
    Ok(SUCCESS)
}
