use embedded_hal::serial;

use super::{UbxChecksum, SYNC_1, SYNC_2};

pub trait SendablePacket: Sized {
    type I: Iterator<Item = u8>;

    fn class(&self) -> u8;
    fn id(&self) -> u8;
    fn payload_len(&self) -> usize;
    fn payload_bytes(self) -> Self::I;

    fn to_bytes(self) -> UbxGenerator<Self, Self::I> {
        UbxGenerator(Some(GeneratorState::Sync1 { packet: self }))
    }

    fn packet_len(&self) -> usize {
        8 + self.payload_len()
    }

    /// Writes the whole frame, waiting on the port as needed. Returns the
    /// number of bytes written.
    fn write_blocking<S: serial::Write<u8>>(self, serial: &mut S) -> Result<usize, S::Error> {
        let mut count = 0;
        for byte in self.to_bytes() {
            nb::block!(serial.write(byte))?;
            count += 1;
        }
        nb::block!(serial.flush())?;
        Ok(count)
    }
}

// States are named for the portion of the packet which is *about to be sent*
enum GeneratorState<T, I>
where
    T: SendablePacket<I = I>,
{
    Sync1 { packet: T },
    Sync2 { packet: T },
    Class { packet: T },
    Id { packet: T, checksum: UbxChecksum },
    Len1 { packet: T, checksum: UbxChecksum },
    Len2 { packet: T, checksum: UbxChecksum },
    Payload { iter: I, checksum: UbxChecksum },
    Checksum2 { checksum: UbxChecksum },
    Done,
}
use GeneratorState::*;

pub struct UbxGenerator<T, I>(Option<GeneratorState<T, I>>)
where
    T: SendablePacket<I = I>;

impl<T, I> UbxGenerator<T, I>
where
    T: SendablePacket<I = I>,
{
    pub fn done(&self) -> bool {
        matches!(self.0, Some(Done) | None)
    }
}

impl<T, I> Iterator for UbxGenerator<T, I>
where
    T: SendablePacket<I = I>,
    I: Iterator<Item = u8>,
{
    type Item = u8;

    fn next(&mut self) -> Option<Self::Item> {
        let (state, val) = match self.0.take()? {
            Sync1 { packet } => (Sync2 { packet }, SYNC_1),
            Sync2 { packet } => (Class { packet }, SYNC_2),
            Class { packet } => {
                let val = packet.class();
                let checksum = UbxChecksum::new().next(val);
                (Id { packet, checksum }, val)
            }
            Id { packet, checksum } => {
                let val = packet.id();
                let checksum = checksum.next(val);
                (Len1 { packet, checksum }, val)
            }
            Len1 { packet, checksum } => {
                let val = (packet.payload_len() as u16).to_le_bytes()[0];
                let checksum = checksum.next(val);
                (Len2 { packet, checksum }, val)
            }
            Len2 { packet, checksum } => {
                let val = (packet.payload_len() as u16).to_le_bytes()[1];
                let checksum = checksum.next(val);
                (
                    Payload {
                        iter: packet.payload_bytes(),
                        checksum,
                    },
                    val,
                )
            }
            Payload { mut iter, checksum } => match iter.next() {
                Some(val) => (
                    Payload {
                        iter,
                        checksum: checksum.next(val),
                    },
                    val,
                ),
                None => (Checksum2 { checksum }, checksum.0),
            },
            Checksum2 { checksum } => (Done, checksum.1),
            Done => {
                self.0 = Some(Done);
                return None;
            }
        };
        self.0 = Some(state);
        Some(val)
    }
}
