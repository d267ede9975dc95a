use thiserror::Error;

pub type Result<T> = std::result::Result<T, CpiscanError>;

#[derive(Error, Debug)]
pub enum CpiscanError {
    #[error("IDL parsing error: {0}")]
    IdlParse(String),

    /// The registry resolved a discriminator to an event name that has no
    /// registered layout. This is a malformed registry, not malformed
    /// transaction data, and is never absorbed by the scan loop.
    #[error("event registry inconsistent: {0}")]
    Registry(String),

    /// A known event's payload failed borsh decoding. Recoverable: the
    /// scanner skips the instruction and keeps going.
    #[error("event decoding error: {0}")]
    EventDecode(String),

    #[error("transaction format error: {0}")]
    Transaction(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Solana client error: {0}")]
    SolanaClient(String),
}
