use alloy::primitives::TxHash;
use chain::{ClientError, Receipt};

/// Why a step did not reach its effect.
///
/// None of these is retried. Re-running the stage is the operator's call,
/// and it is safe for every stage guarded by a precondition.
#[derive(Debug, thiserror::Error)]
pub enum Failure {
    /// The precondition could not be evaluated; nothing was submitted.
    #[error("{step}: failed to query current state")]
    Query {
        /// Step that failed.
        step: &'static str,
        /// Underlying client error.
        source: ClientError,
    },
    /// The step needs an implementation address that is neither configured
    /// nor deployed earlier in the run; nothing was submitted.
    #[error("{step}: no implementation address to switch to")]
    Unresolved {
        /// Step that failed.
        step: &'static str,
    },
    /// The transaction was refused before inclusion.
    #[error("{step}: transaction rejected before inclusion")]
    Submission {
        /// Step that failed.
        step: &'static str,
        /// Underlying client error.
        source: ClientError,
    },
    /// The transaction was broadcast but no receipt could be obtained. It
    /// may still be included later.
    #[error("{step}: no receipt for transaction {tx_hash}")]
    Confirmation {
        /// Step that failed.
        step: &'static str,
        /// Hash of the broadcast transaction.
        tx_hash: TxHash,
        /// Underlying client error.
        source: ClientError,
    },
    /// The transaction was included and reverted.
    #[error(
        "{step}: transaction {} reverted in block {:?}",
        .receipt.tx_hash,
        .receipt.block_number
    )]
    Reverted {
        /// Step that failed.
        step: &'static str,
        /// Receipt of the reverted transaction.
        receipt: Receipt,
    },
    /// The transaction succeeded but the state read back afterwards does not
    /// show the intended effect.
    #[error("{step}: transaction {} succeeded but {reason}", .receipt.tx_hash)]
    Postcondition {
        /// Step that failed.
        step: &'static str,
        /// Receipt of the included transaction.
        receipt: Receipt,
        /// What did not match.
        reason: String,
    },
}

impl Failure {
    /// Name of the step that failed.
    #[must_use]
    pub fn step(&self) -> &'static str {
        match self {
            Failure::Query { step, .. }
            | Failure::Unresolved { step }
            | Failure::Submission { step, .. }
            | Failure::Confirmation { step, .. }
            | Failure::Reverted { step, .. }
            | Failure::Postcondition { step, .. } => *step,
        }
    }

    /// Receipt of the included transaction, if the failure happened after
    /// inclusion.
    #[must_use]
    pub fn receipt(&self) -> Option<&Receipt> {
        match self {
            Failure::Reverted { receipt, .. }
            | Failure::Postcondition { receipt, .. } => Some(receipt),
            _ => None,
        }
    }

    /// Whether a transaction may have reached the chain.
    #[must_use]
    pub fn submitted(&self) -> bool {
        matches!(
            self,
            Failure::Confirmation { .. }
                | Failure::Reverted { .. }
                | Failure::Postcondition { .. }
        )
    }
}
