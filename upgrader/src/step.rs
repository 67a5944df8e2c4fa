//! Step descriptors: what to check, what to send, what to expect.
use alloy::primitives::{Address, U256};
use chain::{
    abi::INoxV2, ChainClient, ClientError, ContractView, Receipt, TxRequest,
};

use crate::{status, Failure};

/// One mutating operation of an upgrade.
///
/// Built fresh for every invocation and never persisted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpgradeStep {
    /// Human readable name used in logs and errors.
    pub name: &'static str,
    /// Read-only check deciding whether the effect is already in place.
    pub precondition: Precondition,
    /// Transaction producing the effect.
    pub request: TxRequest,
    /// Check run against the state after inclusion.
    pub postcondition: Postcondition,
}

/// Read-only guard evaluated before submitting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Precondition {
    /// Nothing to check, the step always submits.
    Always,
    /// Skip once `v2Initialized()` reports `true`.
    NotInitialized {
        /// Proxy to query.
        proxy: Address,
    },
    /// Skip once `isPair(pair)` reports `true`.
    PairNotRegistered {
        /// Proxy to query.
        proxy: Address,
        /// Pair to look up.
        pair: Address,
    },
}

impl Precondition {
    /// Whether the effect guarded by this precondition is already in place.
    ///
    /// Queries the chain every time.
    ///
    /// # Errors
    ///
    /// If the state cannot be read.
    pub async fn already_applied<C: ChainClient>(
        &self,
        client: &C,
    ) -> Result<bool, ClientError> {
        match *self {
            Precondition::Always => Ok(false),
            Precondition::NotInitialized { proxy } => {
                ContractView::new(client, proxy)
                    .read(INoxV2::v2InitializedCall {})
                    .await
            }
            Precondition::PairNotRegistered { proxy, pair } => {
                ContractView::new(client, proxy)
                    .read(INoxV2::isPairCall { account: pair })
                    .await
            }
        }
    }
}

/// Expected state once the transaction is included.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Postcondition {
    /// The receipt reports a created contract.
    ContractCreated,
    /// The proxy is initialized with exactly these values.
    Configured {
        /// Proxy to query.
        proxy: Address,
        /// Expected router.
        router: Address,
        /// Expected swap threshold.
        swap_threshold: U256,
        /// Expected slippage bound.
        slippage_bps: u16,
    },
    /// `pair` is allow-listed.
    PairRegistered {
        /// Proxy to query.
        proxy: Address,
        /// Expected pair.
        pair: Address,
    },
    /// The ERC-1967 implementation slot holds `implementation`.
    ImplementationIs {
        /// Proxy to query.
        proxy: Address,
        /// Expected implementation.
        implementation: Address,
    },
}

/// Outcome of checking a [`Postcondition`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Verdict {
    /// The effect is visible.
    Holds,
    /// The effect is not visible, with a description of the mismatch.
    Violated(String),
}

impl Postcondition {
    /// Check the post-state reached by the transaction behind `receipt`.
    ///
    /// # Errors
    ///
    /// If the state cannot be read.
    pub async fn verify<C: ChainClient>(
        &self,
        client: &C,
        receipt: &Receipt,
    ) -> Result<Verdict, ClientError> {
        let verdict = match *self {
            Postcondition::ContractCreated => match receipt.contract_address {
                Some(_) => Verdict::Holds,
                None => Verdict::Violated(
                    "receipt carries no contract address".to_string(),
                ),
            },
            Postcondition::Configured {
                proxy,
                router,
                swap_threshold,
                slippage_bps,
            } => {
                let view = ContractView::new(client, proxy);
                let initialized =
                    view.read(INoxV2::v2InitializedCall {}).await?;
                let actual_router =
                    view.read(INoxV2::uniswapRouterCall {}).await?;
                let actual_threshold =
                    view.read(INoxV2::autoSwapThresholdCall {}).await?;
                let actual_slippage =
                    view.read(INoxV2::maxSlippageBpsCall {}).await?;

                if !initialized {
                    Verdict::Violated("v2Initialized() is still false".into())
                } else if actual_router != router {
                    Verdict::Violated(format!(
                        "router is {actual_router}, expected {router}"
                    ))
                } else if actual_threshold != swap_threshold {
                    Verdict::Violated(format!(
                        "swap threshold is {actual_threshold}, \
                         expected {swap_threshold}"
                    ))
                } else if actual_slippage != slippage_bps {
                    Verdict::Violated(format!(
                        "slippage is {actual_slippage} bps, \
                         expected {slippage_bps} bps"
                    ))
                } else {
                    Verdict::Holds
                }
            }
            Postcondition::PairRegistered { proxy, pair } => {
                let registered = ContractView::new(client, proxy)
                    .read(INoxV2::isPairCall { account: pair })
                    .await?;
                if registered {
                    Verdict::Holds
                } else {
                    Verdict::Violated(format!("isPair({pair}) is still false"))
                }
            }
            Postcondition::ImplementationIs { proxy, implementation } => {
                let actual = status::implementation(client, proxy).await?;
                if actual == implementation {
                    Verdict::Holds
                } else {
                    Verdict::Violated(format!(
                        "proxy points at {actual}, expected {implementation}"
                    ))
                }
            }
        };
        Ok(verdict)
    }
}

/// Result of executing one [`UpgradeStep`].
#[derive(Debug)]
pub enum StepResult {
    /// The transaction was included and its effect verified.
    Applied(Receipt),
    /// The effect was already in place; nothing was submitted.
    Skipped,
    /// The step did not reach its effect.
    Failed(Failure),
}

impl StepResult {
    /// Whether a transaction was included with the intended effect.
    #[must_use]
    pub fn is_applied(&self) -> bool {
        matches!(self, StepResult::Applied(_))
    }

    /// Whether the step found its effect already in place.
    #[must_use]
    pub fn is_skipped(&self) -> bool {
        matches!(self, StepResult::Skipped)
    }

    /// Whether the step failed.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self, StepResult::Failed(_))
    }

    /// Receipt of the applied transaction.
    #[must_use]
    pub fn receipt(&self) -> Option<&Receipt> {
        match self {
            StepResult::Applied(receipt) => Some(receipt),
            _ => None,
        }
    }

    /// The failure, if any.
    #[must_use]
    pub fn failure(&self) -> Option<&Failure> {
        match self {
            StepResult::Failed(failure) => Some(failure),
            _ => None,
        }
    }

    /// Convert into a `Result`, `Ok(None)` meaning skipped.
    ///
    /// # Errors
    ///
    /// If the step failed.
    pub fn into_result(self) -> Result<Option<Receipt>, Failure> {
        match self {
            StepResult::Applied(receipt) => Ok(Some(receipt)),
            StepResult::Skipped => Ok(None),
            StepResult::Failed(failure) => Err(failure),
        }
    }
}
