//! u-blox UBX binary messages sent to the receiver.
//!
//! Frame: `B5 62 class id len(LE u16) payload ck_a ck_b`, with the 8-bit
//! Fletcher checksum taken over class through the end of the payload.

pub mod generator;
pub mod packets;

pub use generator::SendablePacket;
pub use packets::MgaIniTimeUtc;

pub const SYNC_1: u8 = 0xb5;
pub const SYNC_2: u8 = 0x62;

#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct UbxChecksum(pub u8, pub u8);

impl UbxChecksum {
    pub fn new() -> Self {
        Self(0, 0)
    }

    pub fn next(self, byte: u8) -> Self {
        let Self(a, b) = self;
        let a = a.wrapping_add(byte);
        Self(a, b.wrapping_add(a))
    }
}

impl PartialEq<(u8, u8)> for UbxChecksum {
    fn eq(&self, (other_a, other_b): &(u8, u8)) -> bool {
        let Self(a, b) = self;
        a == other_a && b == other_b
    }
}
