use alloy::{
    network::TransactionBuilder,
    primitives::{Address, Bytes},
    rpc::types::TransactionRequest,
};
use serde::Deserialize;

/// Envelope used when signing a transaction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TxScheme {
    /// Pre-EIP-1559 transaction priced by a single gas price (type 0).
    Legacy,
    /// EIP-1559 transaction with a fee cap and a priority fee (type 2).
    #[default]
    FeeMarket,
}

impl TxScheme {
    /// EIP-2718 transaction type byte.
    #[must_use]
    pub const fn type_id(self) -> u8 {
        match self {
            TxScheme::Legacy => 0,
            TxScheme::FeeMarket => 2,
        }
    }
}

/// A transaction that is ready to be signed and submitted.
///
/// The gas limit is part of the request from the moment it is built. Nothing
/// downstream estimates it: a contract whose execution path depends on its
/// own state (e.g. a swap that only fires past a threshold) makes estimates
/// unreliable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxRequest {
    to: Option<Address>,
    input: Bytes,
    gas_limit: u64,
    scheme: TxScheme,
}

impl TxRequest {
    /// A call to the contract at `to` with abi-encoded `input`.
    #[must_use]
    pub fn call(
        to: Address,
        input: impl Into<Bytes>,
        gas_limit: u64,
        scheme: TxScheme,
    ) -> Self {
        Self { to: Some(to), input: input.into(), gas_limit, scheme }
    }

    /// A contract creation running `code` as init code.
    #[must_use]
    pub fn deploy(
        code: impl Into<Bytes>,
        gas_limit: u64,
        scheme: TxScheme,
    ) -> Self {
        Self { to: None, input: code.into(), gas_limit, scheme }
    }

    /// Recipient of the transaction, `None` for a contract creation.
    #[must_use]
    pub fn to(&self) -> Option<Address> {
        self.to
    }

    /// Call data, or init code for a contract creation.
    #[must_use]
    pub fn input(&self) -> &Bytes {
        &self.input
    }

    /// Maximum amount of gas the transaction may consume.
    #[must_use]
    pub fn gas_limit(&self) -> u64 {
        self.gas_limit
    }

    /// Envelope the transaction is signed with.
    #[must_use]
    pub fn scheme(&self) -> TxScheme {
        self.scheme
    }

    /// Whether this request creates a contract.
    #[must_use]
    pub fn is_deploy(&self) -> bool {
        self.to.is_none()
    }

    /// Convert into an `alloy` request sent from `from`.
    ///
    /// Fee fields are left empty; they are priced by the client right
    /// before submission.
    #[must_use]
    pub fn to_transaction_request(&self, from: Address) -> TransactionRequest {
        let tx = TransactionRequest::default()
            .with_from(from)
            .with_gas_limit(self.gas_limit);

        let mut tx = match self.to {
            Some(to) => tx.with_to(to).with_input(self.input.clone()),
            None => tx.with_deploy_code(self.input.clone()),
        };
        tx.transaction_type = Some(self.scheme.type_id());
        tx
    }
}
