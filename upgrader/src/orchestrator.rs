//! Drives an ordered list of stages through the [`Executor`].
use alloy::primitives::{utils::format_ether, Address};
use chain::{abi::INoxV2, ChainClient, ContractView, Receipt};
use tracing::{error, info, warn};

use crate::{
    stage::{Stage, StageLimits, StageState},
    status,
    step::StepResult,
    Executor, Failure,
};

/// Outcome of one stage within a run.
#[derive(Debug)]
pub struct StageReport {
    /// Name of the stage.
    pub stage: &'static str,
    /// What the step did.
    pub result: StepResult,
}

/// Outcome of a run.
#[derive(Debug)]
pub struct Report {
    /// Stages attempted, in order. Only the last one can have failed.
    pub stages: Vec<StageReport>,
    /// State reached.
    pub state: StageState,
    /// Implementation deployed during the run, if any.
    pub deployed: Option<Address>,
}

impl Report {
    /// The failure that stopped the run, if any.
    #[must_use]
    pub fn failure(&self) -> Option<&Failure> {
        self.stages.last().and_then(|stage| stage.result.failure())
    }

    /// `Err` with the failure that stopped the run, the report otherwise.
    ///
    /// # Errors
    ///
    /// If a stage failed.
    pub fn into_result(mut self) -> Result<Self, Failure> {
        match self.stages.pop() {
            Some(StageReport { result: StepResult::Failed(failure), .. }) => {
                Err(failure)
            }
            Some(last) => {
                self.stages.push(last);
                Ok(self)
            }
            None => Ok(self),
        }
    }
}

/// Runs stages in order and tracks how far the upgrade got.
#[derive(Debug)]
pub struct Orchestrator<'a, C> {
    client: &'a C,
    limits: StageLimits,
    state: StageState,
    deployed: Option<Address>,
}

impl<'a, C: ChainClient> Orchestrator<'a, C> {
    /// An orchestrator at [`StageState::NotDeployed`].
    #[must_use]
    pub fn new(client: &'a C, limits: StageLimits) -> Self {
        Self {
            client,
            limits,
            state: StageState::default(),
            deployed: None,
        }
    }

    /// Resume from a state reached in an earlier run.
    #[must_use]
    pub fn starting_at(mut self, state: StageState) -> Self {
        self.state = state;
        self
    }

    /// State reached so far.
    #[must_use]
    pub fn state(&self) -> StageState {
        self.state
    }

    /// Implementation deployed by this orchestrator, if any.
    #[must_use]
    pub fn deployed(&self) -> Option<Address> {
        self.deployed
    }

    /// Run a single stage.
    ///
    /// `Applied` and `Skipped` advance the state to the stage's target
    /// when that target directly follows the current state. Anything else,
    /// failures included, leaves the state where it was.
    pub async fn run_stage(&mut self, stage: &Stage) -> StepResult {
        let name = stage.name();
        let step = stage.step(self.client, &self.limits, self.deployed);
        let step = match step {
            Ok(step) => step,
            Err(failure) => {
                error!(step = name, error = %failure, "step failed");
                return StepResult::Failed(failure);
            }
        };

        if let Stage::DeployImplementation { artifact } = stage {
            info!(
                step = name,
                code_size = artifact.code_size(),
                "deploying implementation"
            );
            warn!(step = name, "deployment is not idempotent");
        }

        let result = Executor::new(self.client).execute(&step).await;
        match &result {
            StepResult::Applied(receipt) => {
                if let Stage::DeployImplementation { .. } = stage {
                    self.deployed = receipt.contract_address;
                }
                self.advance(stage.target());
                self.log_effect(stage, receipt).await;
            }
            StepResult::Skipped => self.advance(stage.target()),
            StepResult::Failed(_) => {}
        }
        result
    }

    /// Run `stages` in order, stopping at the first failure.
    pub async fn run(&mut self, stages: &[Stage]) -> Report {
        let signer = self.client.signer();
        match self.client.balance(signer).await {
            Ok(balance) => {
                info!(%signer, balance = %format_ether(balance), "signer");
            }
            Err(e) => warn!(%signer, error = %e, "signer balance unavailable"),
        }

        let mut reports = Vec::with_capacity(stages.len());
        for (i, stage) in stages.iter().enumerate() {
            let result = self.run_stage(stage).await;
            let failed = result.is_failed();
            reports.push(StageReport { stage: stage.name(), result });
            if failed {
                let remaining = stages.len() - i - 1;
                if remaining > 0 {
                    warn!(remaining, "stopping, later stages not attempted");
                }
                break;
            }
        }

        info!(state = %self.state, "run finished");
        Report { stages: reports, state: self.state, deployed: self.deployed }
    }

    fn advance(&mut self, reached: StageState) {
        let from = self.state;
        if self.state.advance(reached) {
            info!(%from, to = %self.state, "stage state advanced");
        }
    }

    /// Read back and log what an applied stage changed. Reads that fail are
    /// only logged; the postcondition already held.
    async fn log_effect(&self, stage: &Stage, receipt: &Receipt) {
        match stage {
            Stage::DeployImplementation { .. } => {
                if let Some(address) = receipt.contract_address {
                    info!(%address, "implementation deployed");
                }
            }
            Stage::InitializeConfiguration { proxy, .. } => {
                let view = ContractView::new(self.client, *proxy);
                let enabled = view.read(INoxV2::autoSwapEnabledCall {}).await;
                let router = view.read(INoxV2::uniswapRouterCall {}).await;
                let threshold =
                    view.read(INoxV2::autoSwapThresholdCall {}).await;
                match (enabled, router, threshold) {
                    (Ok(enabled), Ok(router), Ok(threshold)) => info!(
                        auto_swap_enabled = enabled,
                        %router,
                        %threshold,
                        "configuration set"
                    ),
                    _ => warn!("configuration could not be read back"),
                }
            }
            Stage::RegisterPair { proxy, pair } => {
                match ContractView::new(self.client, *proxy)
                    .read(INoxV2::isPairCall { account: *pair })
                    .await
                {
                    Ok(registered) => info!(%pair, registered, "isPair"),
                    Err(e) => warn!(%pair, error = %e, "isPair unavailable"),
                }
            }
            Stage::SwitchProxyTarget { proxy, .. } => {
                match status::implementation(self.client, *proxy).await {
                    Ok(implementation) => info!(
                        %proxy,
                        %implementation,
                        block = ?receipt.block_number,
                        "proxy upgraded"
                    ),
                    Err(e) => warn!(
                        %proxy,
                        error = %e,
                        "implementation slot unavailable"
                    ),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use alloy::primitives::{address, bytes, uint, Bytes};
    use mockchain::MockChain;

    use super::*;
    use crate::Artifact;

    const PROXY: Address = address!("0x0a26c80be4e060e688d7c23addb92cbb5d2c9eca");
    const V1: Address = address!("0x00000000000000000000000000000000000000a1");
    const ROUTER: Address = address!("0x7a250d5630b4cf539739df2c5dacb4c659f2488d");
    const PAIR: Address = address!("0x07ce5889d2eb681af3bd61db24ab2602c502bd1b");

    fn plan() -> Vec<Stage> {
        vec![
            Stage::DeployImplementation {
                artifact: Artifact::new(bytes!("60806040")).unwrap(),
            },
            Stage::InitializeConfiguration {
                proxy: PROXY,
                router: ROUTER,
                swap_threshold: uint!(1000_U256),
                slippage_bps: 100,
            },
            Stage::RegisterPair { proxy: PROXY, pair: PAIR },
            Stage::SwitchProxyTarget {
                proxy: PROXY,
                implementation: None,
                call_data: Bytes::new(),
            },
        ]
    }

    #[tokio::test]
    async fn full_run_goes_live_on_the_deployed_implementation() {
        let chain = MockChain::new().with_proxy(PROXY, V1);
        let mut orchestrator =
            Orchestrator::new(&chain, StageLimits::default());

        let report = orchestrator.run(&plan()).await.into_result().unwrap();

        assert_eq!(report.state, StageState::Live);
        assert_eq!(report.stages.len(), 4);
        assert!(report.stages.iter().all(|stage| stage.result.is_applied()));

        let deployed = report.deployed.unwrap();
        assert_eq!(chain.proxy(PROXY).await.unwrap().implementation, deployed);
    }

    #[tokio::test]
    async fn stops_at_first_failure() {
        let chain = MockChain::new().with_proxy(PROXY, V1);
        let mut orchestrator =
            Orchestrator::new(&chain, StageLimits::default());
        let stages = plan();

        assert!(orchestrator.run_stage(&stages[0]).await.is_applied());
        chain.revert_next().await;
        let report = orchestrator.run(&stages[1..]).await;

        assert_eq!(report.stages.len(), 1);
        assert!(matches!(report.failure(), Some(Failure::Reverted { .. })));
        assert_eq!(report.state, StageState::Deployed);
        assert_eq!(chain.submitted().await.len(), 2);
        assert!(report.into_result().is_err());
    }

    #[tokio::test]
    async fn skipped_stage_still_advances() {
        let chain = MockChain::new().with_proxy(PROXY, V1);
        chain.update_proxy(PROXY, |proxy| proxy.v2_initialized = true).await;
        let mut orchestrator = Orchestrator::new(&chain, StageLimits::default())
            .starting_at(StageState::Deployed);

        let result = orchestrator.run_stage(&plan()[1]).await;
        assert!(result.is_skipped());
        assert_eq!(orchestrator.state(), StageState::Initialized);
        assert!(chain.submitted().await.is_empty());
    }

    #[tokio::test]
    async fn state_does_not_regress_on_earlier_stage() {
        let chain = MockChain::new().with_proxy(PROXY, V1);
        let mut orchestrator = Orchestrator::new(&chain, StageLimits::default())
            .starting_at(StageState::Live);

        let result = orchestrator.run_stage(&plan()[2]).await;
        assert!(result.is_applied());
        assert_eq!(orchestrator.state(), StageState::Live);
    }

    #[tokio::test]
    async fn out_of_order_stage_does_not_advance() {
        let chain = MockChain::new().with_proxy(PROXY, V1);
        let mut orchestrator =
            Orchestrator::new(&chain, StageLimits::default());

        let result = orchestrator.run_stage(&plan()[2]).await;
        assert!(result.is_applied());
        assert_eq!(orchestrator.state(), StageState::NotDeployed);
    }

    #[tokio::test]
    async fn unresolved_switch_submits_nothing() {
        let chain = MockChain::new().with_proxy(PROXY, V1);
        let mut orchestrator =
            Orchestrator::new(&chain, StageLimits::default());

        let report = orchestrator.run(&plan()[3..]).await;
        assert!(matches!(report.failure(), Some(Failure::Unresolved { .. })));
        assert_eq!(report.state, StageState::NotDeployed);
        assert!(chain.submitted().await.is_empty());
    }
}
