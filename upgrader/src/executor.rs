use chain::ChainClient;
use tracing::{debug, error, info};

use crate::{
    step::{StepResult, UpgradeStep, Verdict},
    Failure,
};

/// Runs a single [`UpgradeStep`] against a chain.
///
/// Per invocation the executor submits at most one transaction, and none
/// at all when the precondition reports the effect as already applied.
#[derive(Debug)]
pub struct Executor<'a, C> {
    client: &'a C,
}

impl<'a, C: ChainClient> Executor<'a, C> {
    /// An executor submitting through `client`.
    #[must_use]
    pub fn new(client: &'a C) -> Self {
        Self { client }
    }

    /// Check, submit, wait, verify.
    ///
    /// Blocks until the transaction has a receipt. Errors are returned as
    /// [`StepResult::Failed`] and never retried.
    pub async fn execute(&self, step: &UpgradeStep) -> StepResult {
        let name = step.name;

        match step.precondition.already_applied(self.client).await {
            Ok(true) => {
                info!(step = name, "effect already in place, skipping");
                return StepResult::Skipped;
            }
            Ok(false) => {
                debug!(
                    step = name,
                    precondition = ?step.precondition,
                    "effect not in place"
                );
            }
            Err(source) => {
                return fail(Failure::Query { step: name, source });
            }
        }

        let request = &step.request;
        info!(
            step = name,
            to = ?request.to(),
            gas_limit = request.gas_limit(),
            scheme = ?request.scheme(),
            "submitting transaction"
        );
        let tx_hash = match self.client.submit(request).await {
            Ok(tx_hash) => tx_hash,
            Err(source) => {
                return fail(Failure::Submission { step: name, source });
            }
        };

        info!(step = name, %tx_hash, "waiting for confirmation");
        let receipt = match self.client.await_receipt(tx_hash).await {
            Ok(receipt) => receipt,
            Err(source) => {
                return fail(Failure::Confirmation {
                    step: name,
                    tx_hash,
                    source,
                });
            }
        };

        if !receipt.success {
            return fail(Failure::Reverted { step: name, receipt });
        }

        match step.postcondition.verify(self.client, &receipt).await {
            Ok(Verdict::Holds) => {
                info!(
                    step = name,
                    %tx_hash,
                    block = ?receipt.block_number,
                    gas_used = receipt.gas_used,
                    "applied"
                );
                StepResult::Applied(receipt)
            }
            Ok(Verdict::Violated(reason)) => {
                fail(Failure::Postcondition { step: name, receipt, reason })
            }
            Err(e) => fail(Failure::Postcondition {
                step: name,
                receipt,
                reason: format!("state could not be read back: {e}"),
            }),
        }
    }
}

fn fail(failure: Failure) -> StepResult {
    error!(step = failure.step(), error = %failure, "step failed");
    StepResult::Failed(failure)
}

#[cfg(test)]
mod tests {
    use alloy::primitives::{address, bytes, uint, Address};
    use chain::{abi::INoxV2, ClientError, ContractView, TxRequest, TxScheme};
    use mockchain::MockChain;

    use super::*;
    use crate::step::{Postcondition, Precondition};

    const PROXY: Address = address!("0x0a26c80be4e060e688d7c23addb92cbb5d2c9eca");
    const V1: Address = address!("0x00000000000000000000000000000000000000a1");
    const PAIR: Address = address!("0x07ce5889d2eb681af3bd61db24ab2602c502bd1b");
    const ROUTER: Address = address!("0x7a250d5630b4cf539739df2c5dacb4c659f2488d");

    fn register_pair(chain: &MockChain, gas_limit: u64) -> UpgradeStep {
        UpgradeStep {
            name: "register pair",
            precondition: Precondition::PairNotRegistered {
                proxy: PROXY,
                pair: PAIR,
            },
            request: ContractView::new(chain, PROXY).write(
                &INoxV2::setPairCall { pair: PAIR, status: true },
                gas_limit,
                TxScheme::FeeMarket,
            ),
            postcondition: Postcondition::PairRegistered {
                proxy: PROXY,
                pair: PAIR,
            },
        }
    }

    #[tokio::test]
    async fn applies_then_skips() {
        let chain = MockChain::new().with_proxy(PROXY, V1);
        let step = register_pair(&chain, 100_000);
        let executor = Executor::new(&chain);

        let first = executor.execute(&step).await;
        assert!(first.is_applied());
        assert_eq!(chain.submitted().await.len(), 1);

        let second = executor.execute(&step).await;
        assert!(second.is_skipped());
        assert_eq!(chain.submitted().await.len(), 1);
    }

    #[tokio::test]
    async fn query_failure_submits_nothing() {
        let chain = MockChain::new().with_proxy(PROXY, V1);
        chain.set_unavailable(true).await;
        let step = register_pair(&chain, 100_000);

        let result = Executor::new(&chain).execute(&step).await;
        assert!(matches!(
            result.failure(),
            Some(Failure::Query { source: ClientError::Unavailable(_), .. })
        ));

        chain.set_unavailable(false).await;
        assert!(chain.submitted().await.is_empty());
    }

    #[tokio::test]
    async fn rejection_surfaces_as_submission_failure() {
        let chain = MockChain::new().with_proxy(PROXY, V1);
        chain.reject_next_submission("nonce too low").await;
        let step = register_pair(&chain, 100_000);

        let result = Executor::new(&chain).execute(&step).await;
        let failure = result.failure().expect("should fail");
        assert!(matches!(failure, Failure::Submission { .. }));
        assert!(!failure.submitted());
    }

    #[tokio::test]
    async fn missing_receipt_surfaces_as_confirmation_failure() {
        let chain = MockChain::new().with_proxy(PROXY, V1);
        chain.drop_next_receipt().await;
        let step = register_pair(&chain, 100_000);

        let result = Executor::new(&chain).execute(&step).await;
        let failure = result.failure().expect("should fail");
        assert!(matches!(failure, Failure::Confirmation { .. }));
        assert!(failure.submitted());
        assert!(failure.receipt().is_none());

        // The transaction did land; a re-run sees that and skips.
        let rerun = Executor::new(&chain).execute(&step).await;
        assert!(rerun.is_skipped());
    }

    #[tokio::test]
    async fn out_of_gas_surfaces_as_revert() {
        let chain = MockChain::new().with_proxy(PROXY, V1);
        let step = register_pair(&chain, 30_000);

        let result = Executor::new(&chain).execute(&step).await;
        let Some(Failure::Reverted { receipt, .. }) = result.failure() else {
            panic!("expected a revert, got {result:?}");
        };
        assert!(!receipt.success);
        assert_eq!(receipt.gas_used, 30_000);
        assert!(!chain.proxy(PROXY).await.unwrap().is_pair(PAIR));
    }

    #[tokio::test]
    async fn unexpected_post_state_is_a_failure() {
        let chain = MockChain::new().with_proxy(PROXY, V1);
        let step = UpgradeStep {
            name: "initialize configuration",
            precondition: Precondition::NotInitialized { proxy: PROXY },
            request: ContractView::new(&chain, PROXY).write(
                &INoxV2::initializeV2Call {
                    _router: ROUTER,
                    _swapThreshold: uint!(1000_U256),
                    _slippageBps: 100,
                },
                300_000,
                TxScheme::FeeMarket,
            ),
            postcondition: Postcondition::Configured {
                proxy: PROXY,
                router: ROUTER,
                swap_threshold: uint!(1000_U256),
                slippage_bps: 50,
            },
        };

        let result = Executor::new(&chain).execute(&step).await;
        let Some(Failure::Postcondition { reason, .. }) = result.failure()
        else {
            panic!("expected a postcondition failure, got {result:?}");
        };
        assert_eq!(reason, "slippage is 100 bps, expected 50 bps");
    }

    #[tokio::test]
    async fn deploy_without_precondition_always_submits() {
        let chain = MockChain::new();
        let step = UpgradeStep {
            name: "deploy implementation",
            precondition: Precondition::Always,
            request: TxRequest::deploy(
                bytes!("60806040"),
                8_000_000,
                TxScheme::Legacy,
            ),
            postcondition: Postcondition::ContractCreated,
        };
        let executor = Executor::new(&chain);

        let first = executor.execute(&step).await.into_result().unwrap();
        let second = executor.execute(&step).await.into_result().unwrap();

        let first = first.and_then(|r| r.contract_address).unwrap();
        let second = second.and_then(|r| r.contract_address).unwrap();
        assert_ne!(first, second);
    }
}
