//! BGB link cable packet framing: 8 bytes, little-endian timestamp.
//!
//! See <https://bgb.bircd.org/bgblink.html>.

pub const PACKET_SIZE_BYTES: usize = 8;

pub const CMD_VERSION: u8 = 1;
pub const CMD_JOYPAD: u8 = 101;
pub const CMD_SYNC1: u8 = 104;
pub const CMD_MASTER: u8 = 104;
pub const CMD_SYNC2: u8 = 105;
pub const CMD_SLAVE: u8 = 105;
pub const CMD_SYNC3: u8 = 106;
pub const CMD_STATUS: u8 = 108;
pub const CMD_WANT_DISCONNECT: u8 = 109;

pub const PROTOCOL_VERSION: (u8, u8, u8) = (1, 4, 0);

/// Outbound control byte for a MASTER-role SIO transfer.
pub const MASTER_CONTROL: u8 = 0x81;
/// Outbound control byte for a SLAVE-role SIO transfer.
pub const SLAVE_CONTROL: u8 = 0x80;

/// Classification of an inbound packet's command byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketKind {
    Version,
    JoypadUpdate,
    /// SIO transfer, either as the BGB "master" (SYNC1) or "slave" (SYNC2) role.
    Sio,
    Sync3,
    Status,
    WantDisconnect,
    Unknown(u8),
}

/// One 8-byte BGB link packet: `type, b2, b3, b4, timestamp(LE u32)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Packet {
    pub cmd: u8,
    pub b2: u8,
    pub b3: u8,
    pub b4: u8,
    pub timestamp: u32,
}

impl Packet {
    pub fn new(cmd: u8, b2: u8, b3: u8, b4: u8, timestamp: u32) -> Self {
        Self {
            cmd,
            b2,
            b3,
            b4,
            timestamp,
        }
    }

    pub fn kind(&self) -> PacketKind {
        match self.cmd {
            CMD_VERSION => PacketKind::Version,
            CMD_JOYPAD => PacketKind::JoypadUpdate,
            CMD_SYNC1 | CMD_SYNC2 => PacketKind::Sio,
            CMD_SYNC3 => PacketKind::Sync3,
            CMD_STATUS => PacketKind::Status,
            CMD_WANT_DISCONNECT => PacketKind::WantDisconnect,
            other => PacketKind::Unknown(other),
        }
    }

    pub fn to_bytes(self) -> [u8; PACKET_SIZE_BYTES] {
        let mut buf = [0u8; PACKET_SIZE_BYTES];
        buf[0] = self.cmd;
        buf[1] = self.b2;
        buf[2] = self.b3;
        buf[3] = self.b4;
        buf[4..8].copy_from_slice(&self.timestamp.to_le_bytes());
        buf
    }

    pub fn from_bytes(buf: &[u8; PACKET_SIZE_BYTES]) -> Self {
        Self {
            cmd: buf[0],
            b2: buf[1],
            b3: buf[2],
            b4: buf[3],
            timestamp: u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]),
        }
    }

    pub fn version() -> Self {
        Self::new(CMD_VERSION, PROTOCOL_VERSION.0, PROTOCOL_VERSION.1, PROTOCOL_VERSION.2, 0)
    }

    pub fn status(running: bool) -> Self {
        Self::new(CMD_STATUS, running as u8, 0, 0, 0)
    }

    pub fn master(data: u8) -> Self {
        Self::new(CMD_MASTER, data, MASTER_CONTROL, 0, 0)
    }

    pub fn slave(data: u8) -> Self {
        Self::new(CMD_SLAVE, data, SLAVE_CONTROL, 0, 0)
    }

    pub fn sync3_echo(reply_to: &Packet) -> Self {
        Self::new(CMD_SYNC3, reply_to.b2, reply_to.b3, reply_to.b4, 0)
    }
}

/// Tracks the last timestamp seen from the peer. Every outbound packet is
/// stamped with this value: the server fakes perfect sync rather than
/// modeling real Game Boy clock timing.
#[derive(Debug, Default)]
pub struct PeerClock {
    last: u32,
}

impl PeerClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, timestamp: u32) {
        self.last = timestamp;
    }

    pub fn stamp(&self, mut packet: Packet) -> Packet {
        packet.timestamp = self.last;
        packet
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_bytes() {
        let packet = Packet::new(CMD_SYNC1, 0x42, 0x81, 0, 0x1234_5678);
        assert_eq!(Packet::from_bytes(&packet.to_bytes()), packet);
    }

    #[test]
    fn master_and_slave_share_the_sio_kind() {
        assert_eq!(Packet::master(1).kind(), PacketKind::Sio);
        assert_eq!(Packet::slave(1).kind(), PacketKind::Sio);
    }

    #[test]
    fn peer_clock_stamps_outbound_packets() {
        let mut clock = PeerClock::new();
        clock.observe(99);
        let stamped = clock.stamp(Packet::version());
        assert_eq!(stamped.timestamp, 99);
    }

    #[test]
    fn sync3_echo_preserves_payload_not_timestamp() {
        let inbound = Packet::new(CMD_SYNC3, 7, 8, 9, 555);
        let echoed = Packet::sync3_echo(&inbound);
        assert_eq!((echoed.b2, echoed.b3, echoed.b4), (7, 8, 9));
        assert_eq!(echoed.timestamp, 0);
    }
}
