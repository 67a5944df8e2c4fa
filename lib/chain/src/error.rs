use alloy::{providers::PendingTransactionError, transports::TransportError};

/// Errors surfaced by a [`crate::ChainClient`].
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The node could not serve the request.
    #[error("rpc request failed")]
    Rpc(#[from] TransportError),
    /// A submitted transaction could not be watched to a receipt.
    #[error("transaction was not confirmed")]
    Pending(#[from] PendingTransactionError),
    /// Return data did not decode into the expected type.
    #[error("unexpected return data")]
    Abi(#[from] alloy::sol_types::Error),
    /// The transaction was refused before inclusion, e.g. for insufficient
    /// funds or a stale nonce.
    #[error("transaction rejected: {0}")]
    Rejected(String),
    /// The client is unable to answer at all.
    #[error("chain unavailable: {0}")]
    Unavailable(String),
}
