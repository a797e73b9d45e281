//! End-to-end tests driving `pkm-trade-server` over a real TCP socket,
//! playing the BGB "master" side of the link. Deeper trade-state-machine
//! coverage (full interchange, selection, confirm/cancel, commit) lives
//! in `trade-core`'s own unit tests against a fake byte source/sink; here
//! we only check that the transport and handshake wiring behave.

use std::io::Read;
use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;
use std::time::Duration;

use trade_core::dex::{build_party, FixtureSpeciesLookup};
use trade_core::packet::{Packet, PACKET_SIZE_BYTES};
use trade_core::trade::{CONNECTED, IN_TRADE_ROOM, MASTER, SLAVE, TERMINATOR};

use trade_server::config;
use trade_server::server::Server;

fn spawn_demo_server() -> (Arc<Server>, SocketAddr, std::thread::JoinHandle<()>) {
    let server = Arc::new(Server::bind("127.0.0.1:0".parse().unwrap()).unwrap());
    let addr = server.local_addr().unwrap();
    let lookup = FixtureSpeciesLookup::new();
    let spec = config::demo_party_spec("RED");
    let party = build_party(&spec, &lookup).unwrap();
    let serve_server = server.clone();
    let thread = std::thread::spawn(move || serve_server.serve(&party));
    (server, addr, thread)
}

fn shut_down(server: Arc<Server>, thread: std::thread::JoinHandle<()>) {
    server.stop();
    thread.join().unwrap();
    server.join();
}

fn read_packet(stream: &mut TcpStream) -> Packet {
    let mut buf = [0u8; PACKET_SIZE_BYTES];
    stream.read_exact(&mut buf).unwrap();
    Packet::from_bytes(&buf)
}

fn write_master_byte(stream: &mut TcpStream, data: u8) -> Packet {
    use std::io::Write as _;
    stream.write_all(&Packet::master(data).to_bytes()).unwrap();
    read_packet(stream)
}

/// Reads reply packets until the socket goes quiet for a short window,
/// used where one inbound byte can fan out into more than one reply.
fn drain_replies(stream: &mut TcpStream) -> Vec<u8> {
    stream.set_read_timeout(Some(Duration::from_millis(200))).unwrap();
    let mut replies = Vec::new();
    loop {
        let mut buf = [0u8; PACKET_SIZE_BYTES];
        match stream.read_exact(&mut buf) {
            Ok(()) => replies.push(Packet::from_bytes(&buf).b2),
            Err(_) => break,
        }
    }
    stream.set_read_timeout(None).unwrap();
    replies
}

#[test]
fn sends_version_on_connect() {
    let (server, addr, thread) = spawn_demo_server();
    let mut client = TcpStream::connect(addr).unwrap();
    let version = read_packet(&mut client);
    assert_eq!(version.cmd, trade_core::packet::CMD_VERSION);
    assert_eq!((version.b2, version.b3, version.b4), trade_core::packet::PROTOCOL_VERSION);

    drop(client);
    shut_down(server, thread);
}

#[test]
fn unsupported_version_closes_the_connection() {
    let (server, addr, thread) = spawn_demo_server();
    let mut client = TcpStream::connect(addr).unwrap();
    let _version = read_packet(&mut client);

    use std::io::Write as _;
    client.write_all(&Packet::new(trade_core::packet::CMD_VERSION, 1, 3, 0, 0).to_bytes()).unwrap();

    let mut buf = [0u8; 1];
    client.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
    let result = client.read(&mut buf);
    assert!(matches!(result, Ok(0) | Err(_)));

    shut_down(server, thread);
}

#[test]
fn status_always_gets_a_running_reply() {
    let (server, addr, thread) = spawn_demo_server();
    let mut client = TcpStream::connect(addr).unwrap();
    let _version = read_packet(&mut client);

    use std::io::Write as _;
    client.write_all(&Packet::new(trade_core::packet::CMD_STATUS, 0x02, 0, 0, 0).to_bytes()).unwrap();
    let reply = read_packet(&mut client);
    assert_eq!(reply.cmd, trade_core::packet::CMD_STATUS);
    assert_eq!(reply.b2, 1);

    drop(client);
    shut_down(server, thread);
}

#[test]
fn joypad_updates_get_no_reply() {
    let (server, addr, thread) = spawn_demo_server();
    let mut client = TcpStream::connect(addr).unwrap();
    let _version = read_packet(&mut client);

    use std::io::Write as _;
    client.write_all(&Packet::new(trade_core::packet::CMD_JOYPAD, 0xFF, 0, 0, 0).to_bytes()).unwrap();
    let replies = drain_replies(&mut client);
    assert!(replies.is_empty());

    drop(client);
    shut_down(server, thread);
}

#[test]
fn handshake_into_trade_room() {
    let (server, addr, thread) = spawn_demo_server();
    let mut client = TcpStream::connect(addr).unwrap();
    let _version = read_packet(&mut client);

    let reply = write_master_byte(&mut client, MASTER);
    assert_eq!(reply.b2, SLAVE);

    let reply = write_master_byte(&mut client, CONNECTED);
    assert_eq!(reply.b2, CONNECTED);

    let reply = write_master_byte(&mut client, IN_TRADE_ROOM);
    assert_eq!(reply.b2, IN_TRADE_ROOM);

    drop(client);
    shut_down(server, thread);
}

/// After entering the trade room, the first `TERMINATOR` byte carries the
/// session through two zero-length pass-through states (trade room, then
/// waiting to send the random seed) before it settles on waiting for the
/// peer's party data, echoing `TERMINATOR` twice along the way.
#[test]
fn terminator_passes_through_trade_room_and_seed_wait() {
    let (server, addr, thread) = spawn_demo_server();
    let mut client = TcpStream::connect(addr).unwrap();
    let _version = read_packet(&mut client);

    write_master_byte(&mut client, CONNECTED);
    write_master_byte(&mut client, IN_TRADE_ROOM);

    use std::io::Write as _;
    client.write_all(&Packet::master(TERMINATOR).to_bytes()).unwrap();
    let replies = drain_replies(&mut client);
    assert_eq!(replies, vec![TERMINATOR, TERMINATOR]);

    drop(client);
    shut_down(server, thread);
}
