//! Per-connection actor: a reader thread classifies inbound packets, one
//! thread per control-packet kind handles them, and a state-machine
//! thread drives the trade over the inbound SIO byte queue. All writes
//! go through the connection's single [`LinkWriter`].

use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Receiver};
use log::{debug, info, trace, warn};

use trade_core::packet::{Packet, PacketKind, PROTOCOL_VERSION};
use trade_core::{ByteSink, ByteSource, Party, TradeError, TradeMachine};

use crate::error::ConnectionError;
use crate::framer::{read_packet, LinkWriter};

struct ChannelSource(Receiver<u8>);

impl ByteSource for ChannelSource {
    fn recv(&mut self) -> Option<u8> {
        self.0.recv().ok()
    }
}

struct WriterSink<'a> {
    writer: &'a LinkWriter,
}

impl ByteSink for WriterSink<'_> {
    fn send(&mut self, byte: u8) -> Result<(), TradeError> {
        self.writer.write_slave(byte).map_err(|_| TradeError::InternalWriteError)
    }
}

/// Join handles for every thread spawned on behalf of one connection.
pub struct ConnectionHandle {
    threads: Vec<JoinHandle<()>>,
}

impl ConnectionHandle {
    pub fn join(self) {
        for thread in self.threads {
            let _ = thread.join();
        }
    }
}

/// Spawns the reader, per-kind handler, and state-machine threads for one
/// accepted connection. Returns immediately; the connection runs until
/// the peer disconnects or the version handshake fails.
pub fn spawn_connection(stream: TcpStream, peer_addr: SocketAddr, party: Party) -> ConnectionHandle {
    let read_stream = stream.try_clone().expect("clone accepted socket for reader thread");
    let writer = Arc::new(LinkWriter::new(stream));
    if let Err(e) = writer.write_version() {
        warn!("{peer_addr}: failed to send initial VERSION: {e}");
    }

    let (version_tx, version_rx) = unbounded::<Packet>();
    let (sync3_tx, sync3_rx) = unbounded::<Packet>();
    let (status_tx, status_rx) = unbounded::<Packet>();
    let (joypad_tx, joypad_rx) = unbounded::<Packet>();
    let (want_disconnect_tx, want_disconnect_rx) = unbounded::<Packet>();
    let (sio_tx, sio_rx) = unbounded::<u8>();

    let mut threads = Vec::with_capacity(7);

    threads.push(spawn_reader(
        read_stream,
        peer_addr,
        writer.clone(),
        version_tx,
        sync3_tx,
        status_tx,
        joypad_tx,
        want_disconnect_tx,
        sio_tx,
    ));
    threads.push(spawn_version_handler(peer_addr, writer.clone(), version_rx));
    threads.push(spawn_sync3_handler(writer.clone(), sync3_rx));
    threads.push(spawn_status_handler(peer_addr, writer.clone(), status_rx));
    threads.push(spawn_joypad_handler(joypad_rx));
    threads.push(spawn_want_disconnect_handler(peer_addr, want_disconnect_rx));
    threads.push(spawn_trade_thread(peer_addr, writer, party, sio_rx));

    ConnectionHandle { threads }
}

#[allow(clippy::too_many_arguments)]
fn spawn_reader(
    mut read_stream: TcpStream,
    peer_addr: SocketAddr,
    writer: Arc<LinkWriter>,
    version_tx: crossbeam_channel::Sender<Packet>,
    sync3_tx: crossbeam_channel::Sender<Packet>,
    status_tx: crossbeam_channel::Sender<Packet>,
    joypad_tx: crossbeam_channel::Sender<Packet>,
    want_disconnect_tx: crossbeam_channel::Sender<Packet>,
    sio_tx: crossbeam_channel::Sender<u8>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        loop {
            let packet = match read_packet(&mut read_stream) {
                Ok(packet) => packet,
                Err(_) => break,
            };
            writer.observe_timestamp(packet.timestamp);
            trace!(
                "{peer_addr}: recv cmd={} b2=0x{:02X} b3=0x{:02X} b4=0x{:02X} ts={}",
                packet.cmd, packet.b2, packet.b3, packet.b4, packet.timestamp
            );
            match packet.kind() {
                PacketKind::Version => {
                    let _ = version_tx.send(packet);
                }
                PacketKind::JoypadUpdate => {
                    let _ = joypad_tx.send(packet);
                }
                PacketKind::Sio => {
                    let _ = sio_tx.send(packet.b2);
                }
                PacketKind::Sync3 => {
                    let _ = sync3_tx.send(packet);
                }
                PacketKind::Status => {
                    let _ = status_tx.send(packet);
                }
                PacketKind::WantDisconnect => {
                    let _ = want_disconnect_tx.send(packet);
                }
                PacketKind::Unknown(cmd) => {
                    trace!("{peer_addr}: ignoring unknown command {cmd}");
                }
            }
        }
        debug!("{peer_addr}: reader thread exiting, connection closing");
        // Dropping the channel senders above (end of scope) tells every
        // handler thread and the state machine thread to wind down.
    })
}

fn spawn_version_handler(peer_addr: SocketAddr, writer: Arc<LinkWriter>, rx: Receiver<Packet>) -> JoinHandle<()> {
    thread::spawn(move || {
        for packet in rx {
            let (major, minor, patch) = (packet.b2, packet.b3, packet.b4);
            if (major, minor, patch) != PROTOCOL_VERSION {
                let e = ConnectionError::UnsupportedVersion(major, minor, patch);
                warn!("{peer_addr}: {e}, disconnecting");
                writer.shutdown();
                break;
            }
            if let Err(e) = writer.write_version() {
                warn!("{peer_addr}: failed to reply to VERSION: {e}");
                break;
            }
        }
    })
}

fn spawn_sync3_handler(writer: Arc<LinkWriter>, rx: Receiver<Packet>) -> JoinHandle<()> {
    thread::spawn(move || {
        for packet in rx {
            let _ = writer.write_sync3_echo(&packet);
        }
    })
}

fn spawn_status_handler(peer_addr: SocketAddr, writer: Arc<LinkWriter>, rx: Receiver<Packet>) -> JoinHandle<()> {
    thread::spawn(move || {
        for packet in rx {
            debug!(
                "{peer_addr}: status running={} paused={} supports_reconnect={}",
                packet.b2 & 1 != 0,
                packet.b2 & 2 != 0,
                packet.b2 & 4 != 0
            );
            // The BGB docs advise against replying to STATUS with STATUS,
            // but not doing so causes link instability in practice.
            let _ = writer.write_status(true);
        }
    })
}

fn spawn_joypad_handler(rx: Receiver<Packet>) -> JoinHandle<()> {
    thread::spawn(move || {
        for _packet in rx {
            // Remote joypad control is not implemented; drop.
        }
    })
}

fn spawn_want_disconnect_handler(peer_addr: SocketAddr, rx: Receiver<Packet>) -> JoinHandle<()> {
    thread::spawn(move || {
        for _packet in rx {
            info!("{peer_addr}: peer initiated disconnect");
        }
    })
}

fn spawn_trade_thread(peer_addr: SocketAddr, writer: Arc<LinkWriter>, party: Party, sio_rx: Receiver<u8>) -> JoinHandle<()> {
    thread::spawn(move || {
        let mut machine = TradeMachine::new(party);
        let mut source = ChannelSource(sio_rx);
        let mut sink = WriterSink { writer: &writer };
        match machine.run(&mut source, &mut sink) {
            Ok(()) => unreachable!("trade machine only returns on error"),
            Err(TradeError::EndOfStream) => info!("{peer_addr}: connection closed"),
            Err(e) => warn!("{peer_addr}: trade session ended with error: {e}"),
        }
        writer.shutdown();
    })
}
