use thiserror::Error;

/// Failures from encoding or decoding the Generation II party/Pokémon binary layout.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("name {0:?} exceeds the maximum pokestr length of 10 glyphs")]
    InvalidName(String),
    #[error("invalid party layout: {0}")]
    InvalidLayout(&'static str),
}

/// Failures building a [`crate::codec::Party`] from a [`crate::dex::PartySpec`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PartyBuildError {
    #[error("no species data for dex id {0}")]
    UnknownSpecies(u8),
    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Failures from the trade state machine.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TradeError {
    #[error("protocol violation: {0}")]
    ProtocolViolation(&'static str),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("sio stream closed")]
    EndOfStream,
    #[error("write to sio sink failed")]
    InternalWriteError,
}
