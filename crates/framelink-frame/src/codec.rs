use std::sync::Arc;

use bytes::Bytes;
use tracing::trace;

use crate::bits::{
    classify, clear_reserved, escape_byte, fold_length, is_control, restore_reserved,
    unfold_length, Control, Delimiter, DelimiterKind, ESCAPE_WINDOW, MAX_LENGTH,
};
use crate::buffer::FrameBuffer;
use crate::crc::{Checksum, Crc8};
use crate::error::{FrameError, Result};
use crate::packet::{ByteOrder, Command, Packet};

/// Default maximum payload size in bytes.
pub const DEFAULT_MAX_PAYLOAD: usize = 64;

/// HEAD + length + command + TAIL.
pub const OVERHEAD: usize = 4;

/// Worst-case wire size of a frame carrying `payload_len` bytes.
///
/// Assumes every payload (and CRC) byte collides with the control pattern,
/// which costs one ESCAPE byte per started window. Lengths past the 127-byte
/// payload limit are clamped to it, since no larger frame can be encoded.
pub fn max_frame_size(payload_len: usize, crc: bool) -> usize {
    let run = payload_len.min(usize::from(MAX_LENGTH)) + usize::from(crc);
    let escapes = run.div_ceil(usize::from(ESCAPE_WINDOW));
    OVERHEAD + run + escapes
}

/// Configuration for the frame codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameConfig {
    /// Maximum payload size in bytes. Capped at 127 by the length byte.
    pub max_payload_size: usize,
    /// Append a CRC byte to outgoing frames.
    pub use_crc: bool,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            use_crc: false,
        }
    }
}

fn frame_check(checksum: &dyn Checksum, len: u8, command: u8, payload: &[u8]) -> u8 {
    [len, command]
        .iter()
        .chain(payload)
        .fold(checksum.init(), |crc, &byte| checksum.update(crc, byte))
}

/// Encode a packet into the wire format.
///
/// Wire format:
/// ```text
/// ┌──────┬──────────┬─────────┬─────────────────────────────┬──────┐
/// │ HEAD │ Length   │ Command │ Payload [+ CRC]             │ TAIL │
/// │      │ (folded) │ (raw)   │ (escaped, 5-byte windows)   │      │
/// └──────┴──────────┴─────────┴─────────────────────────────┴──────┘
/// ```
///
/// `dst` is cleared first. Passing a checksum sets the CRC bit on HEAD and
/// TAIL and folds the check byte into the escaped run.
pub fn encode_frame(
    packet: &Packet,
    checksum: Option<&dyn Checksum>,
    dst: &mut FrameBuffer,
) -> Result<()> {
    encode_parts(
        packet.command(),
        packet.byte_order,
        &packet.payload,
        checksum,
        dst,
    )
}

/// [`encode_frame`] from borrowed parts, for callers that keep the payload
/// in their own buffer.
pub fn encode_parts(
    command: Command,
    byte_order: ByteOrder,
    payload: &[u8],
    checksum: Option<&dyn Checksum>,
    dst: &mut FrameBuffer,
) -> Result<()> {
    let size = payload.len();
    if size > usize::from(MAX_LENGTH) {
        return Err(FrameError::PayloadTooLarge {
            size,
            max: usize::from(MAX_LENGTH),
        });
    }
    let len = size as u8;
    let crc = checksum.is_some();
    let command = command.to_byte();
    let check = checksum.map(|checksum| frame_check(checksum, len, command, payload));

    dst.clear();
    dst.push(Delimiter::new(DelimiterKind::Head, byte_order, crc).to_byte())?;
    dst.push(fold_length(len))?;
    dst.push(command)?;

    let mut window: Option<usize> = None;
    let mut remaining = 0u8;

    for byte in payload.iter().copied().chain(check) {
        let mut wire = byte;

        if is_control(byte) {
            let escape_at = match window {
                Some(at) => {
                    remaining -= 1;
                    at
                }
                None => {
                    let at = dst.len();
                    dst.push(escape_byte(0))?;
                    remaining = ESCAPE_WINDOW - 1;
                    window = Some(at);
                    at
                }
            };
            if let Some(escape) = dst.get_mut(escape_at) {
                *escape |= 1 << ((ESCAPE_WINDOW - 1) - remaining);
            }
            wire = clear_reserved(byte);
        } else if remaining > 0 {
            remaining -= 1;
        }

        if window.is_some() && remaining == 0 {
            window = None;
        }

        dst.push(wire)?;
    }

    dst.push(Delimiter::new(DelimiterKind::Tail, byte_order, crc).to_byte())?;
    Ok(())
}

/// Encode a packet into a freshly allocated buffer. Repeated senders keep a
/// [`FrameBuffer`] and call [`encode_frame`] instead.
pub fn encode_to_bytes(packet: &Packet, checksum: Option<&dyn Checksum>) -> Result<Bytes> {
    let mut buf = FrameBuffer::new(max_frame_size(packet.payload.len(), checksum.is_some()));
    encode_frame(packet, checksum, &mut buf)?;
    Ok(buf.freeze())
}

/// Reassembles packets from a byte stream, one byte at a time.
///
/// The frame buffer is allocated once. A completed packet's payload is a
/// view into it, so the region is reused for the next frame as soon as the
/// previous packet has been dropped.
///
/// Malformed frames (HEAD/TAIL mismatch, unknown control byte, bad length,
/// bad command or CRC) are dropped without an error; decoding resumes at the
/// next HEAD. A frame that would overrun the buffer is reported as
/// [`FrameError::FrameTooLarge`].
#[derive(Debug)]
pub struct FrameDecoder {
    buf: FrameBuffer,
    escape: u8,
    head: Option<Delimiter>,
    last_crc: bool,
    max_payload: usize,
    checksum: Arc<dyn Checksum>,
}

impl FrameDecoder {
    /// Create a decoder using the default CRC-8 check.
    pub fn new(max_payload: usize) -> Self {
        Self::with_checksum(max_payload, Arc::new(Crc8))
    }

    /// Create a decoder with an explicit check algorithm.
    pub fn with_checksum(max_payload: usize, checksum: Arc<dyn Checksum>) -> Self {
        let max_payload = max_payload.min(usize::from(MAX_LENGTH));
        Self {
            // length + command + payload + CRC
            buf: FrameBuffer::new(max_payload + 3),
            escape: 0,
            head: None,
            last_crc: false,
            max_payload,
            checksum,
        }
    }

    /// Largest payload this decoder accepts.
    pub fn max_payload(&self) -> usize {
        self.max_payload
    }

    /// Whether the most recently completed packet carried a CRC.
    pub fn last_had_crc(&self) -> bool {
        self.last_crc
    }

    /// True between a HEAD and the matching TAIL.
    pub fn in_frame(&self) -> bool {
        self.head.is_some()
    }

    /// Abandon any frame in progress.
    pub fn reset(&mut self) {
        self.buf.clear();
        self.escape = 0;
        self.head = None;
    }

    /// Feed one wire byte. Returns a packet when a TAIL completes a valid frame.
    pub fn feed(&mut self, byte: u8) -> Result<Option<Packet>> {
        match classify(byte) {
            None => {
                self.push_data(byte)?;
                Ok(None)
            }
            Some(Control::Escape(mask)) => {
                if self.in_frame() {
                    self.escape = mask;
                }
                Ok(None)
            }
            Some(Control::Delimiter(delim)) => match delim.kind {
                DelimiterKind::Head => {
                    if self.in_frame() {
                        trace!("HEAD inside frame, restarting");
                    }
                    self.buf.clear();
                    self.escape = 0;
                    self.head = Some(delim);
                    Ok(None)
                }
                DelimiterKind::Tail => Ok(self.finish(delim)),
            },
            Some(Control::Unknown(byte)) => {
                trace!(byte, "unknown control byte, dropping frame");
                self.reset();
                Ok(None)
            }
        }
    }

    /// Feed a slice, handing every completed packet to `on_packet`.
    ///
    /// An overrun is reported after the rest of the slice has been consumed,
    /// so a frame that follows the oversized one is not lost.
    pub fn feed_slice(&mut self, bytes: &[u8], mut on_packet: impl FnMut(Packet)) -> Result<()> {
        let mut overrun = None;
        for &byte in bytes {
            match self.feed(byte) {
                Ok(Some(packet)) => on_packet(packet),
                Ok(None) => {}
                Err(err) => {
                    overrun.get_or_insert(err);
                }
            }
        }
        match overrun {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn push_data(&mut self, byte: u8) -> Result<()> {
        if !self.in_frame() {
            return Ok(());
        }

        let byte = if self.escape & 1 != 0 {
            restore_reserved(byte)
        } else {
            byte
        };
        self.escape >>= 1;

        if let Err(err) = self.buf.push(byte) {
            trace!("frame overruns decoder buffer, dropping");
            self.reset();
            return Err(err);
        }
        Ok(())
    }

    fn finish(&mut self, tail: Delimiter) -> Option<Packet> {
        let head = self.head.take()?;
        self.escape = 0;
        let Some((command, len)) = self.unpack(&head, &tail) else {
            self.buf.clear();
            return None;
        };
        self.last_crc = head.crc;
        // length + command precede the payload
        let payload = self.buf.split_frozen(2, len);
        Some(Packet::new(command, head.byte_order, payload))
    }

    /// Validate the buffered frame, returning its command and payload length.
    fn unpack(&self, head: &Delimiter, tail: &Delimiter) -> Option<(Command, usize)> {
        if !head.matches(tail) {
            trace!(?head, ?tail, "HEAD/TAIL mismatch, dropping frame");
            return None;
        }

        let body = self.buf.as_slice();
        let (&len_byte, rest) = body.split_first()?;
        let (&command_byte, rest) = rest.split_first()?;
        let len = unfold_length(len_byte);
        let expected = usize::from(len) + usize::from(head.crc);

        if rest.len() != expected || usize::from(len) > self.max_payload {
            trace!(len, received = rest.len(), "length mismatch, dropping frame");
            return None;
        }

        let command = match Command::from_byte(command_byte) {
            Ok(command) => command,
            Err(err) => {
                trace!(error = %err, "dropping frame");
                return None;
            }
        };

        let (payload, crc) = rest.split_at(usize::from(len));
        if head.crc {
            let actual = frame_check(self.checksum.as_ref(), len, command_byte, payload);
            if crc.first() != Some(&actual) {
                trace!(expected = actual, "CRC mismatch, dropping frame");
                return None;
            }
        }

        Some((command, usize::from(len)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bits::ESCAPE_BYTE;
    use crate::packet::{ServiceId, Status, Subfunction};

    fn packet(payload: &[u8], byte_order: ByteOrder) -> Packet {
        Packet::request(0, 1, byte_order, payload.to_vec()).unwrap()
    }

    fn decode_all(decoder: &mut FrameDecoder, wire: &[u8]) -> Vec<Packet> {
        let mut out = Vec::new();
        decoder.feed_slice(wire, |p| out.push(p)).unwrap();
        out
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let original = packet(b"hello", ByteOrder::Little);
        let wire = encode_to_bytes(&original, None).unwrap();

        let mut decoder = FrameDecoder::new(DEFAULT_MAX_PAYLOAD);
        let packets = decode_all(&mut decoder, &wire);

        assert_eq!(packets, vec![original]);
    }

    #[test]
    fn test_known_wire_bytes() {
        let wire = encode_to_bytes(&packet(&[0xC1], ByteOrder::Little), None).unwrap();
        assert_eq!(wire.as_ref(), &[0xF0, 0x01, 0x20, 0xC1, 0x41, 0xE0]);
    }

    #[test]
    fn test_escape_window_shared_and_reopened() {
        let payload = [0xC0, 0x00, 0xC0, 0x11, 0x22, 0x33, 0xFF];
        let wire = encode_to_bytes(&packet(&payload, ByteOrder::Little), None).unwrap();

        assert_eq!(
            &wire[3..wire.len() - 1],
            &[0xC5, 0x40, 0x00, 0x40, 0x11, 0x22, 0x33, 0xC1, 0x7F]
        );

        let mut decoder = FrameDecoder::new(DEFAULT_MAX_PAYLOAD);
        let packets = decode_all(&mut decoder, &wire);
        assert_eq!(packets[0].payload.as_ref(), &payload);
    }

    #[test]
    fn test_six_colliding_bytes_need_two_escapes() {
        let payload = [0xFF; 6];
        let wire = encode_to_bytes(&packet(&payload, ByteOrder::Big), None).unwrap();
        let escapes = wire[3..wire.len() - 1]
            .iter()
            .filter(|&&b| is_control(b))
            .count();
        assert_eq!(escapes, 2);
        assert_eq!(wire.len(), OVERHEAD + 6 + 2);
        assert_eq!(wire.len(), max_frame_size(6, false));
    }

    #[test]
    fn test_only_structural_control_bytes_after_encoding() {
        let payload: Vec<u8> = (0..MAX_LENGTH).map(|i| i.wrapping_mul(37) | 0xC0).collect();
        let wire = encode_to_bytes(&packet(&payload, ByteOrder::Little), Some(&Crc8)).unwrap();

        let last = wire.len() - 1;
        for (i, &byte) in wire.iter().enumerate() {
            match classify(byte) {
                None => {}
                Some(Control::Delimiter(d)) if i == 0 => assert_eq!(d.kind, DelimiterKind::Head),
                Some(Control::Delimiter(d)) if i == last => {
                    assert_eq!(d.kind, DelimiterKind::Tail)
                }
                Some(Control::Escape(mask)) => assert_ne!(mask, 0, "empty escape at {i}"),
                other => panic!("unexpected control {other:?} at {i}"),
            }
        }
        assert!(wire.len() <= max_frame_size(payload.len(), true));
    }

    #[test]
    fn test_roundtrip_every_byte_value() {
        let mut decoder = FrameDecoder::new(usize::from(MAX_LENGTH));
        for chunk in (0..=255u8).collect::<Vec<_>>().chunks(100) {
            for byte_order in [ByteOrder::Little, ByteOrder::Big] {
                for crc in [None, Some(&Crc8 as &dyn Checksum)] {
                    let original = packet(chunk, byte_order);
                    let wire = encode_to_bytes(&original, crc).unwrap();
                    assert_eq!(decode_all(&mut decoder, &wire), vec![original]);
                }
            }
        }
    }

    #[test]
    fn test_roundtrip_preserves_command_fields() {
        let command = Command {
            service: ServiceId::new(6).unwrap(),
            subfunction: Subfunction::new(2).unwrap(),
            status: Status::NegativeResponse,
        };
        let original = Packet::new(command, ByteOrder::Big, Bytes::new());
        let wire = encode_to_bytes(&original, Some(&Crc8)).unwrap();

        let mut decoder = FrameDecoder::new(DEFAULT_MAX_PAYLOAD);
        let packets = decode_all(&mut decoder, &wire);
        assert_eq!(packets, vec![original]);
    }

    #[test]
    fn test_payload_too_large() {
        let original = packet(&[0u8; 128], ByteOrder::Little);
        let err = encode_to_bytes(&original, None).unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { size: 128, max: 127 }));
    }

    #[test]
    fn test_encode_into_small_buffer_is_rejected() {
        let mut buf = FrameBuffer::new(5);
        let err = encode_frame(&packet(b"abc", ByteOrder::Little), None, &mut buf).unwrap_err();
        assert!(matches!(err, FrameError::FrameTooLarge { capacity: 5 }));
    }

    #[test]
    fn test_head_tail_mismatch_is_dropped() {
        let mut wire = encode_to_bytes(&packet(b"x", ByteOrder::Little), None)
            .unwrap()
            .to_vec();
        let last = wire.len() - 1;

        wire[last] = Delimiter::new(DelimiterKind::Tail, ByteOrder::Big, false).to_byte();
        let mut decoder = FrameDecoder::new(DEFAULT_MAX_PAYLOAD);
        assert!(decode_all(&mut decoder, &wire).is_empty());

        wire[last] = Delimiter::new(DelimiterKind::Tail, ByteOrder::Little, true).to_byte();
        assert!(decode_all(&mut decoder, &wire).is_empty());
    }

    #[test]
    fn test_crc_mismatch_is_dropped() {
        let mut wire = encode_to_bytes(&packet(&[1, 2, 3], ByteOrder::Little), Some(&Crc8))
            .unwrap()
            .to_vec();
        wire[4] ^= 0x01;

        let mut decoder = FrameDecoder::new(DEFAULT_MAX_PAYLOAD);
        assert!(decode_all(&mut decoder, &wire).is_empty());
    }

    #[test]
    fn test_unknown_control_drops_frame_and_resyncs() {
        let good = encode_to_bytes(&packet(b"ok", ByteOrder::Little), None).unwrap();
        let mut wire = good[..4].to_vec();
        wire.push(0b1111_0001);
        wire.extend_from_slice(&good[4..]);
        wire.extend_from_slice(&good);

        let mut decoder = FrameDecoder::new(DEFAULT_MAX_PAYLOAD);
        let packets = decode_all(&mut decoder, &wire);
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].payload.as_ref(), b"ok");
    }

    #[test]
    fn test_bytes_before_head_are_ignored() {
        let good = encode_to_bytes(&packet(b"sync", ByteOrder::Little), None).unwrap();
        let mut wire = vec![0x01, 0x02, ESCAPE_BYTE | 1, 0x03];
        wire.extend_from_slice(&good);

        let mut decoder = FrameDecoder::new(DEFAULT_MAX_PAYLOAD);
        let packets = decode_all(&mut decoder, &wire);
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].payload.as_ref(), b"sync");
    }

    #[test]
    fn test_truncated_frame_is_dropped() {
        let good = encode_to_bytes(&packet(b"abcd", ByteOrder::Little), None).unwrap();
        let mut wire = good[..good.len() - 2].to_vec();
        wire.push(good[good.len() - 1]);

        let mut decoder = FrameDecoder::new(DEFAULT_MAX_PAYLOAD);
        assert!(decode_all(&mut decoder, &wire).is_empty());
    }

    #[test]
    fn test_oversized_frame_reports_and_resyncs() {
        let big = encode_to_bytes(&packet(&[7u8; 20], ByteOrder::Little), None).unwrap();
        let small = encode_to_bytes(&packet(b"hi", ByteOrder::Little), None).unwrap();
        let mut wire = big.to_vec();
        wire.extend_from_slice(&small);

        let mut decoder = FrameDecoder::new(4);
        let mut packets = Vec::new();
        let err = decoder.feed_slice(&wire, |p| packets.push(p)).unwrap_err();

        assert!(matches!(err, FrameError::FrameTooLarge { capacity: 7 }));
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].payload.as_ref(), b"hi");
    }

    #[test]
    fn test_head_restarts_frame() {
        let good = encode_to_bytes(&packet(b"second", ByteOrder::Little), None).unwrap();
        let mut wire = good[..5].to_vec();
        wire.extend_from_slice(&good);

        let mut decoder = FrameDecoder::new(DEFAULT_MAX_PAYLOAD);
        let packets = decode_all(&mut decoder, &wire);
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].payload.as_ref(), b"second");
        assert!(!decoder.in_frame());
    }

    #[test]
    fn test_escape_state_resets_at_head() {
        let good = encode_to_bytes(&packet(&[0x01, 0x02], ByteOrder::Little), None).unwrap();
        let mut wire = vec![good[0], ESCAPE_BYTE | 0b1_1111];
        wire.extend_from_slice(&good);

        let mut decoder = FrameDecoder::new(DEFAULT_MAX_PAYLOAD);
        let packets = decode_all(&mut decoder, &wire);
        assert_eq!(packets[0].payload.as_ref(), &[0x01, 0x02]);
    }

    #[test]
    fn test_custom_checksum_must_match() {
        #[derive(Debug)]
        struct Sum;
        impl Checksum for Sum {
            fn update(&self, crc: u8, byte: u8) -> u8 {
                crc.wrapping_add(byte)
            }
        }

        let original = packet(&[0x10, 0x20], ByteOrder::Little);
        let wire = encode_to_bytes(&original, Some(&Sum)).unwrap();

        let mut crc8 = FrameDecoder::new(DEFAULT_MAX_PAYLOAD);
        assert!(decode_all(&mut crc8, &wire).is_empty());

        let mut summing = FrameDecoder::with_checksum(DEFAULT_MAX_PAYLOAD, Arc::new(Sum));
        assert_eq!(decode_all(&mut summing, &wire), vec![original]);
        assert!(summing.last_had_crc());

        let plain = encode_to_bytes(&packet(b"p", ByteOrder::Little), None).unwrap();
        decode_all(&mut summing, &plain);
        assert!(!summing.last_had_crc());
    }

    #[test]
    fn test_max_frame_size() {
        assert_eq!(max_frame_size(0, false), OVERHEAD);
        assert_eq!(max_frame_size(0, true), OVERHEAD + 2);
        assert_eq!(max_frame_size(127, true), OVERHEAD + 128 + 26);
        assert!(max_frame_size(usize::from(MAX_LENGTH), true) <= usize::from(u8::MAX));
    }

    #[test]
    fn test_max_frame_size_clamps_huge_payloads() {
        assert_eq!(max_frame_size(usize::MAX, true), max_frame_size(127, true));
        assert_eq!(max_frame_size(4096, false), max_frame_size(127, false));
    }

    #[test]
    fn test_encode_parts_matches_encode_frame() {
        let original = packet(&[0xC1, 0x02], ByteOrder::Big);
        let mut from_packet = FrameBuffer::new(max_frame_size(2, true));
        let mut from_parts = FrameBuffer::new(max_frame_size(2, true));
        encode_frame(&original, Some(&Crc8), &mut from_packet).unwrap();
        encode_parts(
            original.command(),
            ByteOrder::Big,
            &[0xC1, 0x02],
            Some(&Crc8),
            &mut from_parts,
        )
        .unwrap();
        assert_eq!(from_packet.as_slice(), from_parts.as_slice());
    }

    #[test]
    fn test_decoder_reuses_frame_buffer() {
        let first = encode_to_bytes(&packet(b"one", ByteOrder::Little), None).unwrap();
        let second = encode_to_bytes(&packet(b"two", ByteOrder::Little), Some(&Crc8)).unwrap();
        let mut decoder = FrameDecoder::new(DEFAULT_MAX_PAYLOAD);

        let packets = decode_all(&mut decoder, &first);
        let at = packets[0].payload.as_ptr();
        drop(packets);

        let packets = decode_all(&mut decoder, &second);
        assert_eq!(packets[0].payload.as_ref(), b"two");
        assert_eq!(packets[0].payload.as_ptr(), at);
    }

    #[test]
    fn test_held_packet_is_not_overwritten() {
        let first = encode_to_bytes(&packet(b"keep", ByteOrder::Little), None).unwrap();
        let second = encode_to_bytes(&packet(b"next", ByteOrder::Little), None).unwrap();
        let mut decoder = FrameDecoder::new(DEFAULT_MAX_PAYLOAD);

        let kept = decode_all(&mut decoder, &first);
        let next = decode_all(&mut decoder, &second);
        assert_eq!(kept[0].payload.as_ref(), b"keep");
        assert_eq!(next[0].payload.as_ref(), b"next");
    }
}
