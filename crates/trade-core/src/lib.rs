//! Pure protocol logic for impersonating a second Game Boy over a BGB
//! link-cable connection and driving a Generation II trade: packet
//! framing, the party/Pokémon binary codec, and the trade state machine.
//! No sockets or threads live here; see `trade-server` for the I/O shell.

pub mod codec;
pub mod dex;
pub mod error;
pub mod packet;
pub mod trade;

pub use codec::{Party, Pokemon};
pub use error::{CodecError, PartyBuildError, TradeError};
pub use packet::{Packet, PacketKind, PeerClock};
pub use trade::{ByteSink, ByteSource, TradeMachine};
