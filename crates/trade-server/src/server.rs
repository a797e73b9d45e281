//! TCP accept loop: one [`dispatcher::spawn_connection`] per socket, with
//! graceful, pollable shutdown.

use std::net::{SocketAddr, TcpListener};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use log::{info, warn};

use trade_core::Party;

use crate::dispatcher::{spawn_connection, ConnectionHandle};

const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(10);

pub struct Server {
    listener: TcpListener,
    running: AtomicBool,
    connections: Mutex<Vec<ConnectionHandle>>,
}

impl Server {
    pub fn bind(addr: SocketAddr) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr)?;
        listener.set_nonblocking(true)?;
        Ok(Self { listener, running: AtomicBool::new(true), connections: Mutex::new(Vec::new()) })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts connections until [`Server::stop`] is called. `party` is
    /// cloned fresh for every accepted connection.
    pub fn serve(&self, party: &Party) {
        info!("listening on {}", self.local_addr().map(|a| a.to_string()).unwrap_or_default());
        while self.running.load(Ordering::SeqCst) {
            match self.listener.accept() {
                Ok((stream, peer_addr)) => {
                    if let Err(e) = stream.set_nonblocking(false) {
                        warn!("failed to set blocking mode for {peer_addr}: {e}");
                        continue;
                    }
                    info!("accepted connection from {peer_addr}");
                    let handle = spawn_connection(stream, peer_addr, party.clone());
                    self.connections.lock().unwrap().push(handle);
                }
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
                Err(e) => {
                    warn!("accept error: {e}");
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
            }
        }
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Waits for every spawned connection's threads to finish.
    pub fn join(&self) {
        let mut connections = self.connections.lock().unwrap();
        for handle in connections.drain(..) {
            handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::net::TcpStream;
    use std::sync::Arc;
    use trade_core::dex::{build_party, FixtureSpeciesLookup};
    use trade_core::packet::{Packet, PACKET_SIZE_BYTES};

    #[test]
    fn accepts_a_connection_and_sends_version() {
        let server = Arc::new(Server::bind("127.0.0.1:0".parse().unwrap()).unwrap());
        let addr = server.local_addr().unwrap();

        let spec = crate::config::demo_party_spec("RED");
        let lookup = FixtureSpeciesLookup::new();
        let party = build_party(&spec, &lookup).unwrap();

        let serve_server = server.clone();
        let serve_thread = thread::spawn(move || serve_server.serve(&party));

        let mut client = TcpStream::connect(addr).unwrap();
        let mut buf = [0u8; PACKET_SIZE_BYTES];
        client.read_exact(&mut buf).unwrap();
        let packet = Packet::from_bytes(&buf);
        assert_eq!(packet.cmd, trade_core::packet::CMD_VERSION);

        drop(client);
        server.stop();
        serve_thread.join().unwrap();
        server.join();
    }
}
