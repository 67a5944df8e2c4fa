use alloy::primitives::{Address, Bytes, TxHash, U256};

use crate::{ClientError, Receipt, TxRequest};

/// Operations the upgrade stages need from a node and a signing identity.
///
/// Implementations perform no retries; every error is handed back to the
/// caller as is.
#[allow(async_fn_in_trait)]
pub trait ChainClient {
    /// Address of the identity signing submitted transactions.
    fn signer(&self) -> Address;

    /// Native balance of `account`.
    ///
    /// # Errors
    ///
    /// If the node cannot be queried.
    async fn balance(&self, account: Address) -> Result<U256, ClientError>;

    /// Raw storage word of `account` at `slot`.
    ///
    /// # Errors
    ///
    /// If the node cannot be queried.
    async fn storage_at(
        &self,
        account: Address,
        slot: U256,
    ) -> Result<U256, ClientError>;

    /// Execute a read-only call against `to` at the latest block.
    ///
    /// # Errors
    ///
    /// If the node cannot be queried or the call reverts.
    async fn call(&self, to: Address, input: Bytes)
        -> Result<Bytes, ClientError>;

    /// Sign and broadcast `request`, returning the transaction hash.
    ///
    /// # Errors
    ///
    /// If the transaction is refused before inclusion.
    async fn submit(&self, request: &TxRequest) -> Result<TxHash, ClientError>;

    /// Block until the transaction `tx_hash` has a receipt.
    ///
    /// A receipt is returned for reverted transactions too; check
    /// [`Receipt::success`].
    ///
    /// # Errors
    ///
    /// If the receipt cannot be obtained.
    async fn await_receipt(
        &self,
        tx_hash: TxHash,
    ) -> Result<Receipt, ClientError>;
}
