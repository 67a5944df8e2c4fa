use alloy::{
    network::ReceiptResponse,
    primitives::{Address, TxHash},
    rpc::types::TransactionReceipt,
};

/// Confirmation record of an included transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Receipt {
    /// Hash of the transaction.
    pub tx_hash: TxHash,
    /// Block the transaction was included in.
    pub block_number: Option<u64>,
    /// Address of the created contract, if the transaction deployed one.
    pub contract_address: Option<Address>,
    /// Gas consumed by the transaction.
    pub gas_used: u64,
    /// `false` when execution reverted.
    pub success: bool,
}

impl From<&TransactionReceipt> for Receipt {
    fn from(receipt: &TransactionReceipt) -> Self {
        Self {
            tx_hash: receipt.transaction_hash(),
            block_number: receipt.block_number(),
            contract_address: receipt.contract_address(),
            gas_used: receipt.gas_used(),
            success: receipt.status(),
        }
    }
}
