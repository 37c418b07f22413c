//! Control-byte layout and the bit helpers built on it.
//!
//! Every byte whose top two bits are set is a control byte. Data bytes that
//! happen to match that pattern travel with bit 7 cleared and are restored
//! by the receiver under the coverage mask of a preceding ESCAPE byte.
//!
//! ```text
//!   7   6   5   4   3   2   1   0
//! ┌───┬───┬───┬───────────────────┐
//! │ 1 │ 1 │ 0 │  coverage mask    │  ESCAPE
//! ├───┼───┼───┼───┬───┬───┬───────┤
//! │ 1 │ 1 │ 1 │ h │ e │ c │ 0   0 │  HEAD (h = 1) / TAIL (h = 0)
//! └───┴───┴───┴───┴───┴───┴───────┘
//!   e = sender is big endian, c = CRC byte present
//! ```

use crate::packet::ByteOrder;

/// Bits that mark a control byte.
pub const CONTROL_MASK: u8 = 0b1100_0000;

/// The marker bit cleared on escaped data bytes.
pub const RESERVED_BIT: u8 = 1 << 7;

/// Set on HEAD/TAIL, clear on ESCAPE.
pub const DELIMITER_BIT: u8 = 1 << 5;

/// Set on HEAD, clear on TAIL.
pub const HEAD_BIT: u8 = 1 << 4;

/// Sender byte order (set = big endian).
pub const BIG_ENDIAN_BIT: u8 = 1 << 3;

/// A CRC byte precedes the TAIL.
pub const CRC_BIT: u8 = 1 << 2;

/// Low delimiter bits that must stay zero.
pub const DELIMITER_RESERVED_MASK: u8 = 0b0000_0011;

/// Number of bytes one ESCAPE byte can cover.
pub const ESCAPE_WINDOW: u8 = 5;

/// Coverage bits of an ESCAPE byte.
pub const ESCAPE_MASK: u8 = (1 << ESCAPE_WINDOW) - 1;

/// An ESCAPE byte with an empty coverage mask.
pub const ESCAPE_BYTE: u8 = CONTROL_MASK;

/// Largest payload length the folded length byte can carry.
pub const MAX_LENGTH: u8 = 0x7F;

const FOLD_TX_HIGH: u8 = 0b0100_0000;
const FOLD_RX_HIGH: u8 = 0b1000_0000;
const FOLD_LOW: u8 = 0b0011_1111;

/// Returns true if `byte` would be read as a control byte on the wire.
pub const fn is_control(byte: u8) -> bool {
    byte & CONTROL_MASK == CONTROL_MASK
}

/// Clear the marker bit of a colliding data byte before transmission.
pub const fn clear_reserved(byte: u8) -> u8 {
    byte & !RESERVED_BIT
}

/// Restore the marker bit of an escaped data byte.
pub const fn restore_reserved(byte: u8) -> u8 {
    byte | RESERVED_BIT
}

/// Fold a payload length so the length byte can never look like a control byte.
///
/// Bit 6 moves up to bit 7 and bit 6 is left clear. Only lengths up to
/// [`MAX_LENGTH`] survive the round trip.
pub const fn fold_length(len: u8) -> u8 {
    ((len & FOLD_TX_HIGH) << 1) | (len & FOLD_LOW)
}

/// Reverse of [`fold_length`].
pub const fn unfold_length(byte: u8) -> u8 {
    ((byte & FOLD_RX_HIGH) >> 1) | (byte & FOLD_LOW)
}

/// Build an ESCAPE byte carrying `mask` as its coverage bits.
pub const fn escape_byte(mask: u8) -> u8 {
    ESCAPE_BYTE | (mask & ESCAPE_MASK)
}

/// Which end of a frame a delimiter marks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelimiterKind {
    Head,
    Tail,
}

/// A decoded HEAD or TAIL byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delimiter {
    pub kind: DelimiterKind,
    pub byte_order: ByteOrder,
    pub crc: bool,
}

impl Delimiter {
    /// Create a delimiter description.
    pub const fn new(kind: DelimiterKind, byte_order: ByteOrder, crc: bool) -> Self {
        Self {
            kind,
            byte_order,
            crc,
        }
    }

    /// The wire byte for this delimiter.
    pub const fn to_byte(self) -> u8 {
        let mut byte = CONTROL_MASK | DELIMITER_BIT;
        if matches!(self.kind, DelimiterKind::Head) {
            byte |= HEAD_BIT;
        }
        if matches!(self.byte_order, ByteOrder::Big) {
            byte |= BIG_ENDIAN_BIT;
        }
        if self.crc {
            byte |= CRC_BIT;
        }
        byte
    }

    /// HEAD and TAIL of one frame must agree on byte order and CRC presence.
    pub fn matches(&self, other: &Delimiter) -> bool {
        self.byte_order == other.byte_order && self.crc == other.crc
    }
}

/// Classification of a control byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    /// ESCAPE with its coverage mask.
    Escape(u8),
    /// HEAD or TAIL.
    Delimiter(Delimiter),
    /// A delimiter with reserved bits set.
    Unknown(u8),
}

/// Classify `byte`, or `None` if it is a data byte.
pub fn classify(byte: u8) -> Option<Control> {
    if !is_control(byte) {
        return None;
    }

    if byte & DELIMITER_BIT == 0 {
        return Some(Control::Escape(byte & ESCAPE_MASK));
    }

    if byte & DELIMITER_RESERVED_MASK != 0 {
        return Some(Control::Unknown(byte));
    }

    let kind = if byte & HEAD_BIT != 0 {
        DelimiterKind::Head
    } else {
        DelimiterKind::Tail
    };
    let byte_order = if byte & BIG_ENDIAN_BIT != 0 {
        ByteOrder::Big
    } else {
        ByteOrder::Little
    };

    Some(Control::Delimiter(Delimiter {
        kind,
        byte_order,
        crc: byte & CRC_BIT != 0,
    }))
}
