use std::fmt::Debug;

/// Frame check appended before the TAIL when a frame carries a CRC.
///
/// The check covers the unfolded length, the command byte and the payload,
/// fed one byte at a time through [`Checksum::update`].
pub trait Checksum: Debug + Send + Sync {
    /// Starting value.
    fn init(&self) -> u8 {
        0
    }

    /// Fold one byte into the running check.
    fn update(&self, crc: u8, byte: u8) -> u8;

    /// Check over a whole slice.
    fn checksum(&self, data: &[u8]) -> u8 {
        data.iter()
            .fold(self.init(), |crc, &byte| self.update(crc, byte))
    }
}

/// CRC-8 with polynomial 0x07, zero init, no reflection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Crc8;

const POLY: u8 = 0x07;

impl Checksum for Crc8 {
    fn update(&self, crc: u8, byte: u8) -> u8 {
        let mut crc = crc ^ byte;
        for _ in 0..8 {
            crc = if crc & 0x80 != 0 {
                (crc << 1) ^ POLY
            } else {
                crc << 1
            };
        }
        crc
    }
}
