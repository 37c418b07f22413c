use std::fmt;

use bytes::Bytes;

use crate::error::{FrameError, Result};

/// Number of addressable services.
pub const SERVICE_COUNT: usize = 8;

const SERVICE_MASK: u8 = 0b0000_0111;
const STATUS_SHIFT: u8 = 3;
const STATUS_MASK: u8 = 0b0001_1000;
const SUBFUNCTION_SHIFT: u8 = 5;
const SUBFUNCTION_MASK: u8 = 0b0110_0000;
const COMMAND_RESERVED: u8 = 0b1000_0000;

/// Byte order a sender tags its frames with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum ByteOrder {
    Little,
    Big,
}

impl ByteOrder {
    /// Probe the byte order of the running host.
    pub fn native() -> Self {
        let probe = 1u32.to_ne_bytes();
        if probe[0] == 1 {
            Self::Little
        } else {
            Self::Big
        }
    }
}

impl fmt::Display for ByteOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Little => f.write_str("little"),
            Self::Big => f.write_str("big"),
        }
    }
}

/// Runtime endianness probe.
pub fn native_byte_order() -> ByteOrder {
    ByteOrder::native()
}

/// Rebuild a 4-byte value sent by a peer.
///
/// When the peer's declared order equals `reference` the bytes are taken
/// low byte first; otherwise the order is reversed.
pub fn read_u32(bytes: [u8; 4], declared: ByteOrder, reference: ByteOrder) -> u32 {
    if declared == reference {
        u32::from(bytes[0])
            | (u32::from(bytes[1]) << 8)
            | (u32::from(bytes[2]) << 16)
            | (u32::from(bytes[3]) << 24)
    } else {
        u32::from(bytes[3])
            | (u32::from(bytes[2]) << 8)
            | (u32::from(bytes[1]) << 16)
            | (u32::from(bytes[0]) << 24)
    }
}

/// Lay out `value` so that [`read_u32`] on a receiver whose reference
/// order is `reference` yields `value` again.
pub fn write_u32(value: u32, declared: ByteOrder, reference: ByteOrder) -> [u8; 4] {
    if declared == reference {
        value.to_le_bytes()
    } else {
        value.to_be_bytes()
    }
}

/// Selects a handler in the service table (0..=7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServiceId(u8);

impl ServiceId {
    /// The reference read-memory service.
    pub const READ_MEMORY: ServiceId = ServiceId(0);

    /// Checked constructor.
    pub fn new(id: u8) -> Result<Self> {
        if usize::from(id) < SERVICE_COUNT {
            Ok(Self(id))
        } else {
            Err(FrameError::InvalidService(id))
        }
    }

    /// Raw id.
    pub fn get(self) -> u8 {
        self.0
    }

    /// Table slot for this id.
    pub fn index(self) -> usize {
        usize::from(self.0)
    }

    /// Every valid id in ascending order.
    pub fn all() -> impl Iterator<Item = ServiceId> {
        (0..SERVICE_COUNT as u8).map(ServiceId)
    }
}

impl TryFrom<u8> for ServiceId {
    type Error = FrameError;

    fn try_from(value: u8) -> Result<Self> {
        Self::new(value)
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Handler-defined sub-operation (0..=3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Subfunction(u8);

impl Subfunction {
    /// Largest subfunction the command byte can carry.
    pub const MAX: u8 = 3;

    /// Checked constructor.
    pub fn new(value: u8) -> Result<Self> {
        if value <= Self::MAX {
            Ok(Self(value))
        } else {
            Err(FrameError::InvalidSubfunction(value))
        }
    }

    /// Raw value.
    pub fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Subfunction {
    type Error = FrameError;

    fn try_from(value: u8) -> Result<Self> {
        Self::new(value)
    }
}

impl fmt::Display for Subfunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Position of a packet in the request/response lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Status {
    Request = 0,
    Pending = 1,
    PositiveResponse = 2,
    NegativeResponse = 3,
}

impl Status {
    fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0 => Self::Request,
            1 => Self::Pending,
            2 => Self::PositiveResponse,
            _ => Self::NegativeResponse,
        }
    }

    /// Short lowercase name for logs and CLI output.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Request => "request",
            Self::Pending => "pending",
            Self::PositiveResponse => "positive",
            Self::NegativeResponse => "negative",
        }
    }
}

/// The packed command byte: service, status and subfunction.
///
/// ```text
///   7   6   5   4   3   2   1   0
/// ┌───┬───────┬───────┬───────────┐
/// │ 0 │ subfn │status │  service  │
/// └───┴───────┴───────┴───────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Command {
    pub service: ServiceId,
    pub subfunction: Subfunction,
    pub status: Status,
}

impl Command {
    /// Pack into the wire byte. Bit 7 is always clear.
    pub fn to_byte(self) -> u8 {
        self.service.get()
            | ((self.status as u8) << STATUS_SHIFT)
            | (self.subfunction.get() << SUBFUNCTION_SHIFT)
    }

    /// Unpack a wire byte.
    pub fn from_byte(byte: u8) -> Result<Self> {
        if byte & COMMAND_RESERVED != 0 {
            return Err(FrameError::InvalidCommand(byte));
        }
        Ok(Self {
            service: ServiceId(byte & SERVICE_MASK),
            status: Status::from_bits((byte & STATUS_MASK) >> STATUS_SHIFT),
            subfunction: Subfunction((byte & SUBFUNCTION_MASK) >> SUBFUNCTION_SHIFT),
        })
    }
}

/// The decoded logical unit carried inside a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub service: ServiceId,
    pub subfunction: Subfunction,
    pub status: Status,
    pub byte_order: ByteOrder,
    pub payload: Bytes,
}

impl Packet {
    /// Create a packet.
    pub fn new(
        command: Command,
        byte_order: ByteOrder,
        payload: impl Into<Bytes>,
    ) -> Self {
        Self {
            service: command.service,
            subfunction: command.subfunction,
            status: command.status,
            byte_order,
            payload: payload.into(),
        }
    }

    /// Create a request packet from raw ids.
    pub fn request(
        service: u8,
        subfunction: u8,
        byte_order: ByteOrder,
        payload: impl Into<Bytes>,
    ) -> Result<Self> {
        let command = Command {
            service: ServiceId::new(service)?,
            subfunction: Subfunction::new(subfunction)?,
            status: Status::Request,
        };
        Ok(Self::new(command, byte_order, payload))
    }

    /// The command byte fields of this packet.
    pub fn command(&self) -> Command {
        Command {
            service: self.service,
            subfunction: self.subfunction,
            status: self.status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn native_probe_matches_target() {
        let expected = if cfg!(target_endian = "little") {
            ByteOrder::Little
        } else {
            ByteOrder::Big
        };
        assert_eq!(native_byte_order(), expected);
    }

    #[test]
    fn native_probe_agrees_with_first_stored_byte() {
        let reference = 0x0102_0304u32.to_ne_bytes();
        match native_byte_order() {
            ByteOrder::Little => assert_eq!(reference[0], 0x04),
            ByteOrder::Big => assert_eq!(reference[0], 0x01),
        }
    }

    #[test]
    fn read_u32_same_order_is_low_byte_first() {
        let bytes = [0x78, 0x56, 0x34, 0x12];
        assert_eq!(read_u32(bytes, ByteOrder::Little, ByteOrder::Little), 0x1234_5678);
        assert_eq!(read_u32(bytes, ByteOrder::Big, ByteOrder::Big), 0x1234_5678);
    }

    #[test]
    fn read_u32_mixed_order_reverses() {
        let bytes = [0x12, 0x34, 0x56, 0x78];
        assert_eq!(read_u32(bytes, ByteOrder::Big, ByteOrder::Little), 0x1234_5678);
        assert_eq!(read_u32(bytes, ByteOrder::Little, ByteOrder::Big), 0x1234_5678);
    }

    #[test]
    fn write_u32_inverts_read_u32() {
        let orders = [ByteOrder::Little, ByteOrder::Big];
        for declared in orders {
            for reference in orders {
                let bytes = write_u32(0x2000_0104, declared, reference);
                assert_eq!(read_u32(bytes, declared, reference), 0x2000_0104);
            }
        }
    }

    #[test]
    fn service_id_range() {
        assert!(ServiceId::new(7).is_ok());
        assert!(matches!(ServiceId::new(8), Err(FrameError::InvalidService(8))));
        assert_eq!(ServiceId::all().count(), SERVICE_COUNT);
    }

    #[test]
    fn subfunction_range() {
        assert!(Subfunction::new(3).is_ok());
        assert!(matches!(
            Subfunction::try_from(4),
            Err(FrameError::InvalidSubfunction(4))
        ));
    }

    #[test]
    fn command_byte_packing() {
        let command = Command {
            service: ServiceId::new(5).unwrap(),
            subfunction: Subfunction::new(3).unwrap(),
            status: Status::NegativeResponse,
        };
        let byte = command.to_byte();
        assert_eq!(byte, 0b0111_1101);
        assert_eq!(Command::from_byte(byte).unwrap(), command);
    }

    #[test]
    fn command_byte_is_never_control() {
        for service in ServiceId::all() {
            for sub in 0..=Subfunction::MAX {
                for status in [
                    Status::Request,
                    Status::Pending,
                    Status::PositiveResponse,
                    Status::NegativeResponse,
                ] {
                    let byte = Command {
                        service,
                        subfunction: Subfunction::new(sub).unwrap(),
                        status,
                    }
                    .to_byte();
                    assert!(!crate::bits::is_control(byte));
                }
            }
        }
    }

    #[test]
    fn command_with_reserved_bit_is_rejected() {
        assert!(matches!(
            Command::from_byte(0x80),
            Err(FrameError::InvalidCommand(0x80))
        ));
    }

    #[test]
    fn request_constructor_validates() {
        let packet = Packet::request(0, 1, ByteOrder::Little, vec![1, 2, 3, 4]).unwrap();
        assert_eq!(packet.status, Status::Request);
        assert_eq!(packet.service, ServiceId::READ_MEMORY);
        assert!(Packet::request(9, 1, ByteOrder::Little, Bytes::new()).is_err());
    }
}
