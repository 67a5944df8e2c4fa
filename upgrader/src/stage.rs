//! The four stages of an upgrade and the state they move the proxy through.
use std::fmt;

use alloy::primitives::{Address, Bytes, U256};
use chain::{
    abi::{INoxV2, IUUPSUpgradeable},
    ChainClient, ContractView, TxRequest, TxScheme,
};
use serde::Deserialize;

use crate::{
    step::{Postcondition, Precondition, UpgradeStep},
    Artifact, Failure,
};

/// Gas limit of the implementation deployment, covering a worst-case
/// constructor.
pub const DEPLOY_GAS_LIMIT: u64 = 8_000_000;
/// Gas limit of `initializeV2`.
pub const INITIALIZE_GAS_LIMIT: u64 = 300_000;
/// Gas limit of `setPair`.
pub const REGISTER_PAIR_GAS_LIMIT: u64 = 100_000;
/// Gas limit of `upgradeToAndCall`.
pub const SWITCH_GAS_LIMIT: u64 = 200_000;

/// Explicit resource bound of one stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Bound {
    /// Gas limit attached to the transaction.
    pub gas_limit: u64,
    /// Envelope the transaction is signed with.
    pub scheme: TxScheme,
}

impl Bound {
    /// A bound of `gas_limit` signed with `scheme`.
    #[must_use]
    pub const fn new(gas_limit: u64, scheme: TxScheme) -> Self {
        Self { gas_limit, scheme }
    }
}

/// Resource bounds of every stage.
///
/// Deserialized field by field over [`StageLimits::default`]: a stage table
/// setting only `gas_limit` keeps that stage's default scheme.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(from = "LimitOverrides")]
pub struct StageLimits {
    /// Bound of [`Stage::DeployImplementation`].
    pub deploy: Bound,
    /// Bound of [`Stage::InitializeConfiguration`].
    pub initialize: Bound,
    /// Bound of [`Stage::RegisterPair`].
    pub register_pair: Bound,
    /// Bound of [`Stage::SwitchProxyTarget`].
    pub switch: Bound,
}

impl Default for StageLimits {
    fn default() -> Self {
        Self {
            deploy: Bound::new(DEPLOY_GAS_LIMIT, TxScheme::Legacy),
            initialize: Bound::new(INITIALIZE_GAS_LIMIT, TxScheme::FeeMarket),
            register_pair: Bound::new(
                REGISTER_PAIR_GAS_LIMIT,
                TxScheme::FeeMarket,
            ),
            switch: Bound::new(SWITCH_GAS_LIMIT, TxScheme::FeeMarket),
        }
    }
}

#[derive(Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct BoundOverride {
    gas_limit: Option<u64>,
    scheme: Option<TxScheme>,
}

impl BoundOverride {
    fn over(self, default: Bound) -> Bound {
        Bound {
            gas_limit: self.gas_limit.unwrap_or(default.gas_limit),
            scheme: self.scheme.unwrap_or(default.scheme),
        }
    }
}

#[derive(Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct LimitOverrides {
    deploy: BoundOverride,
    initialize: BoundOverride,
    register_pair: BoundOverride,
    switch: BoundOverride,
}

impl From<LimitOverrides> for StageLimits {
    fn from(overrides: LimitOverrides) -> Self {
        let defaults = StageLimits::default();
        Self {
            deploy: overrides.deploy.over(defaults.deploy),
            initialize: overrides.initialize.over(defaults.initialize),
            register_pair: overrides
                .register_pair
                .over(defaults.register_pair),
            switch: overrides.switch.over(defaults.switch),
        }
    }
}

/// Progress of an upgrade.
///
/// Variants are ordered; the state only ever moves forward.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
pub enum StageState {
    /// The new implementation does not exist yet.
    #[default]
    NotDeployed,
    /// The new implementation is deployed.
    Deployed,
    /// The V2 configuration is set.
    Initialized,
    /// The liquidity pair is allow-listed.
    PairRegistered,
    /// The proxy delegates to the new implementation.
    Live,
}

impl StageState {
    /// State following this one, `None` once live.
    #[must_use]
    pub fn next(self) -> Option<StageState> {
        match self {
            StageState::NotDeployed => Some(StageState::Deployed),
            StageState::Deployed => Some(StageState::Initialized),
            StageState::Initialized => Some(StageState::PairRegistered),
            StageState::PairRegistered => Some(StageState::Live),
            StageState::Live => None,
        }
    }

    /// Move to `reached` if it directly follows the current state.
    ///
    /// A stage succeeding out of order proves nothing about the stages
    /// skipped over, so any other `reached` leaves `self` untouched.
    ///
    /// Returns whether the state changed.
    pub fn advance(&mut self, reached: StageState) -> bool {
        if self.next() == Some(reached) {
            *self = reached;
            true
        } else {
            false
        }
    }
}

impl fmt::Display for StageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StageState::NotDeployed => "not deployed",
            StageState::Deployed => "deployed",
            StageState::Initialized => "initialized",
            StageState::PairRegistered => "pair registered",
            StageState::Live => "live",
        };
        f.write_str(name)
    }
}

/// One stage of an upgrade.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Stage {
    /// Create the new implementation contract.
    ///
    /// Not idempotent: every run creates another contract.
    DeployImplementation {
        /// Creation code to deploy.
        artifact: Artifact,
    },
    /// Call `initializeV2` through the proxy unless it already ran.
    InitializeConfiguration {
        /// Proxy to configure.
        proxy: Address,
        /// Swap router.
        router: Address,
        /// Token amount that triggers a swap.
        swap_threshold: U256,
        /// Slippage bound in basis points.
        slippage_bps: u16,
    },
    /// Allow-list `pair` unless it already is.
    RegisterPair {
        /// Proxy to configure.
        proxy: Address,
        /// Liquidity pair.
        pair: Address,
    },
    /// Point the proxy at the new implementation.
    ///
    /// No precondition: re-pointing at the current target is a no-op on
    /// chain, so the stage always submits.
    SwitchProxyTarget {
        /// Proxy to upgrade.
        proxy: Address,
        /// New implementation; falls back to the address deployed earlier
        /// in the same run.
        implementation: Option<Address>,
        /// Call forwarded to the new implementation, empty for none.
        call_data: Bytes,
    },
}

impl Stage {
    /// Name used in logs and errors.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Stage::DeployImplementation { .. } => "deploy implementation",
            Stage::InitializeConfiguration { .. } => "initialize configuration",
            Stage::RegisterPair { .. } => "register pair",
            Stage::SwitchProxyTarget { .. } => "switch proxy target",
        }
    }

    /// State reached once this stage succeeds.
    #[must_use]
    pub fn target(&self) -> StageState {
        match self {
            Stage::DeployImplementation { .. } => StageState::Deployed,
            Stage::InitializeConfiguration { .. } => StageState::Initialized,
            Stage::RegisterPair { .. } => StageState::PairRegistered,
            Stage::SwitchProxyTarget { .. } => StageState::Live,
        }
    }

    /// Describe this stage as a step, with the gas limit taken from
    /// `limits`.
    ///
    /// `deployed` is the implementation created earlier in the run, if any.
    ///
    /// # Errors
    ///
    /// [`Failure::Unresolved`] if a switch has no implementation to point
    /// at.
    pub fn step<C: ChainClient>(
        &self,
        client: &C,
        limits: &StageLimits,
        deployed: Option<Address>,
    ) -> Result<UpgradeStep, Failure> {
        let name = self.name();
        let step = match self {
            Stage::DeployImplementation { artifact } => UpgradeStep {
                name,
                precondition: Precondition::Always,
                request: TxRequest::deploy(
                    artifact.creation_code(),
                    limits.deploy.gas_limit,
                    limits.deploy.scheme,
                ),
                postcondition: Postcondition::ContractCreated,
            },
            Stage::InitializeConfiguration {
                proxy,
                router,
                swap_threshold,
                slippage_bps,
            } => UpgradeStep {
                name,
                precondition: Precondition::NotInitialized { proxy: *proxy },
                request: ContractView::new(client, *proxy).write(
                    &INoxV2::initializeV2Call {
                        _router: *router,
                        _swapThreshold: *swap_threshold,
                        _slippageBps: *slippage_bps,
                    },
                    limits.initialize.gas_limit,
                    limits.initialize.scheme,
                ),
                postcondition: Postcondition::Configured {
                    proxy: *proxy,
                    router: *router,
                    swap_threshold: *swap_threshold,
                    slippage_bps: *slippage_bps,
                },
            },
            Stage::RegisterPair { proxy, pair } => UpgradeStep {
                name,
                precondition: Precondition::PairNotRegistered {
                    proxy: *proxy,
                    pair: *pair,
                },
                request: ContractView::new(client, *proxy).write(
                    &INoxV2::setPairCall { pair: *pair, status: true },
                    limits.register_pair.gas_limit,
                    limits.register_pair.scheme,
                ),
                postcondition: Postcondition::PairRegistered {
                    proxy: *proxy,
                    pair: *pair,
                },
            },
            Stage::SwitchProxyTarget { proxy, implementation, call_data } => {
                let implementation = implementation
                    .or(deployed)
                    .ok_or(Failure::Unresolved { step: name })?;
                UpgradeStep {
                    name,
                    precondition: Precondition::Always,
                    request: ContractView::new(client, *proxy).write(
                        &IUUPSUpgradeable::upgradeToAndCallCall {
                            newImplementation: implementation,
                            data: call_data.clone(),
                        },
                        limits.switch.gas_limit,
                        limits.switch.scheme,
                    ),
                    postcondition: Postcondition::ImplementationIs {
                        proxy: *proxy,
                        implementation,
                    },
                }
            }
        };
        Ok(step)
    }
}
