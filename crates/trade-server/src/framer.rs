//! Reads and writes framed BGB packets over a TCP connection, stamping
//! every outbound packet with the peer's last-seen timestamp.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::Mutex;

use trade_core::packet::{Packet, PACKET_SIZE_BYTES};
use trade_core::PeerClock;

use crate::error::ConnectionError;

/// Reads one 8-byte packet at a time from a raw stream handle. Owned
/// exclusively by the connection's reader thread.
pub fn read_packet(stream: &mut TcpStream) -> Result<Packet, ConnectionError> {
    let mut buf = [0u8; PACKET_SIZE_BYTES];
    stream.read_exact(&mut buf).map_err(|_| ConnectionError::EndOfStream)?;
    Ok(Packet::from_bytes(&buf))
}

/// Shared, thread-safe write half of a connection. Every outbound write
/// goes through the write lock so VERSION/STATUS/SYNC3 replies and SIO
/// traffic never interleave on the wire.
pub struct LinkWriter {
    stream: Mutex<TcpStream>,
    peer_clock: Mutex<PeerClock>,
}

impl LinkWriter {
    pub fn new(stream: TcpStream) -> Self {
        Self { stream: Mutex::new(stream), peer_clock: Mutex::new(PeerClock::new()) }
    }

    pub fn observe_timestamp(&self, timestamp: u32) {
        self.peer_clock.lock().unwrap().observe(timestamp);
    }

    pub fn write_packet(&self, packet: Packet) -> Result<(), ConnectionError> {
        let stamped = self.peer_clock.lock().unwrap().stamp(packet);
        let mut stream = self.stream.lock().unwrap();
        stream.write_all(&stamped.to_bytes()).map_err(ConnectionError::InternalWriteError)?;
        stream.flush().map_err(ConnectionError::InternalWriteError)
    }

    pub fn write_version(&self) -> Result<(), ConnectionError> {
        self.write_packet(Packet::version())
    }

    pub fn write_status(&self, running: bool) -> Result<(), ConnectionError> {
        self.write_packet(Packet::status(running))
    }

    /// Frames and sends a MASTER-role SIO byte. Symmetric with
    /// [`LinkWriter::write_slave`]; this server always answers as the
    /// link's slave, but the helper exists so a caller that ever needs
    /// to drive the master side doesn't have to touch the framing layer.
    pub fn write_master(&self, data: u8) -> Result<(), ConnectionError> {
        self.write_packet(Packet::master(data))
    }

    pub fn write_slave(&self, data: u8) -> Result<(), ConnectionError> {
        self.write_packet(Packet::slave(data))
    }

    pub fn write_sync3_echo(&self, reply_to: &Packet) -> Result<(), ConnectionError> {
        self.write_packet(Packet::sync3_echo(reply_to))
    }

    /// Forces the socket closed; unblocks the reader thread's blocking read.
    pub fn shutdown(&self) {
        if let Ok(stream) = self.stream.lock() {
            let _ = stream.shutdown(std::net::Shutdown::Both);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[test]
    fn write_packet_stamps_peer_timestamp() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).unwrap();
        let (server_stream, _) = listener.accept().unwrap();

        let writer = LinkWriter::new(server_stream);
        writer.observe_timestamp(0xABCD);
        writer.write_version().unwrap();

        let mut reader = client;
        let packet = read_packet(&mut reader).unwrap();
        assert_eq!(packet.timestamp, 0xABCD);
    }

    #[test]
    fn write_master_frames_as_sync1() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).unwrap();
        let (server_stream, _) = listener.accept().unwrap();

        let writer = LinkWriter::new(server_stream);
        writer.write_master(0x42).unwrap();

        let mut reader = client;
        let packet = read_packet(&mut reader).unwrap();
        assert_eq!(packet.cmd, trade_core::packet::CMD_MASTER);
        assert_eq!(packet.b2, 0x42);
    }
}
