use thiserror::Error;
use trade_core::TradeError;

/// Connection-level failures. A single connection's error never affects
/// another connection or the server shell.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("connection closed")]
    EndOfStream,
    #[error("unsupported protocol version {0}.{1}.{2}")]
    UnsupportedVersion(u8, u8, u8),
    #[error("write to peer failed: {0}")]
    InternalWriteError(#[source] std::io::Error),
    #[error(transparent)]
    Trade(#[from] TradeError),
}
