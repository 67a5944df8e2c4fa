//! Storage and entrypoints of a mocked UUPS token proxy.
use std::collections::HashSet;

use alloy::{
    primitives::{Address, B256, U256},
    sol_types::{SolCall, SolInterface},
};
use chain::abi::{
    INoxV2::{self, INoxV2Calls},
    IUUPSUpgradeable::{self, IUUPSUpgradeableCalls},
    IMPLEMENTATION_SLOT,
};

/// Gas charged for `initializeV2`.
pub const INITIALIZE_GAS: u64 = 142_000;
/// Gas charged for `setPair`.
pub const SET_PAIR_GAS: u64 = 46_000;
/// Gas charged for `upgradeToAndCall`, excluding the forwarded call.
pub const UPGRADE_GAS: u64 = 38_000;
/// Intrinsic gas of any call.
pub const CALL_BASE_GAS: u64 = 21_000;

const MAX_SLIPPAGE_BPS: u16 = 10_000;

/// State reachable through the proxy.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProxyState {
    /// Account allowed to configure and upgrade.
    pub owner: Address,
    /// Current ERC-1967 implementation.
    pub implementation: Address,
    /// Whether `initializeV2` already ran.
    pub v2_initialized: bool,
    /// Turned on by `initializeV2`.
    pub auto_swap_enabled: bool,
    /// Swap router.
    pub router: Address,
    /// Token amount that triggers a swap.
    pub swap_threshold: U256,
    /// Slippage bound in basis points.
    pub slippage_bps: u16,
    /// Allow-listed liquidity pairs.
    pub pairs: HashSet<Address>,
    /// Implementation without the V2 entrypoints. While the proxy
    /// delegates to it, every V2 call reverts.
    pub legacy_implementation: Option<Address>,
}

impl ProxyState {
    /// A fresh proxy owned by `owner` pointing at `implementation`.
    #[must_use]
    pub fn new(owner: Address, implementation: Address) -> Self {
        Self { owner, implementation, ..Self::default() }
    }

    /// Whether the current implementation has the V2 entrypoints.
    #[must_use]
    pub fn serves_v2(&self) -> bool {
        self.legacy_implementation != Some(self.implementation)
    }

    /// Whether `account` is an allow-listed pair.
    #[must_use]
    pub fn is_pair(&self, account: Address) -> bool {
        self.pairs.contains(&account)
    }

    /// Answer an `eth_call`, `None` if it reverts.
    pub(crate) fn read(&self, input: &[u8]) -> Option<Vec<u8>> {
        if let Ok(call) = INoxV2Calls::abi_decode(input) {
            if !self.serves_v2() {
                return None;
            }
            let output = match call {
                INoxV2Calls::v2Initialized(_) => {
                    INoxV2::v2InitializedCall::abi_encode_returns(
                        &self.v2_initialized,
                    )
                }
                INoxV2Calls::autoSwapEnabled(_) => {
                    INoxV2::autoSwapEnabledCall::abi_encode_returns(
                        &self.auto_swap_enabled,
                    )
                }
                INoxV2Calls::uniswapRouter(_) => {
                    INoxV2::uniswapRouterCall::abi_encode_returns(&self.router)
                }
                INoxV2Calls::autoSwapThreshold(_) => {
                    INoxV2::autoSwapThresholdCall::abi_encode_returns(
                        &self.swap_threshold,
                    )
                }
                INoxV2Calls::maxSlippageBps(_) => {
                    INoxV2::maxSlippageBpsCall::abi_encode_returns(
                        &self.slippage_bps,
                    )
                }
                INoxV2Calls::isPair(call) => {
                    INoxV2::isPairCall::abi_encode_returns(
                        &self.is_pair(call.account),
                    )
                }
                INoxV2Calls::initializeV2(_) | INoxV2Calls::setPair(_) => {
                    Vec::new()
                }
            };
            return Some(output);
        }

        match IUUPSUpgradeableCalls::abi_decode(input).ok()? {
            IUUPSUpgradeableCalls::proxiableUUID(_) => Some(
                IUUPSUpgradeable::proxiableUUIDCall::abi_encode_returns(
                    &B256::from(IMPLEMENTATION_SLOT),
                ),
            ),
            IUUPSUpgradeableCalls::upgradeToAndCall(_) => Some(Vec::new()),
        }
    }

    /// Run a state-changing call from `caller` on a copy of the state and
    /// return the copy with the gas it consumed.
    ///
    /// `has_code` tells whether an address hosts a contract.
    pub(crate) fn execute(
        &self,
        caller: Address,
        input: &[u8],
        has_code: &dyn Fn(Address) -> bool,
    ) -> Result<(Self, u64), &'static str> {
        let mut next = self.clone();
        let gas = next.apply(caller, input, has_code)?;
        Ok((next, CALL_BASE_GAS + gas))
    }

    fn apply(
        &mut self,
        caller: Address,
        input: &[u8],
        has_code: &dyn Fn(Address) -> bool,
    ) -> Result<u64, &'static str> {
        if let Ok(call) = INoxV2Calls::abi_decode(input) {
            if !self.serves_v2() {
                return Err("function selector not recognized");
            }
            return match call {
                INoxV2Calls::initializeV2(call) => {
                    self.only_owner(caller)?;
                    if self.v2_initialized {
                        return Err("InvalidInitialization()");
                    }
                    if call._router.is_zero() {
                        return Err("router is the zero address");
                    }
                    if call._slippageBps > MAX_SLIPPAGE_BPS {
                        return Err("slippage above 100%");
                    }
                    self.router = call._router;
                    self.swap_threshold = call._swapThreshold;
                    self.slippage_bps = call._slippageBps;
                    self.auto_swap_enabled = true;
                    self.v2_initialized = true;
                    Ok(INITIALIZE_GAS)
                }
                INoxV2Calls::setPair(call) => {
                    self.only_owner(caller)?;
                    if call.status {
                        self.pairs.insert(call.pair);
                    } else {
                        self.pairs.remove(&call.pair);
                    }
                    Ok(SET_PAIR_GAS)
                }
                _ => Ok(0),
            };
        }

        match IUUPSUpgradeableCalls::abi_decode(input) {
            Ok(IUUPSUpgradeableCalls::upgradeToAndCall(call)) => {
                self.only_owner(caller)?;
                if !has_code(call.newImplementation) {
                    return Err("ERC1967InvalidImplementation(address)");
                }
                self.implementation = call.newImplementation;
                let mut gas = UPGRADE_GAS;
                if !call.data.is_empty() {
                    gas += self.apply(caller, &call.data, has_code)?;
                }
                Ok(gas)
            }
            Ok(IUUPSUpgradeableCalls::proxiableUUID(_)) => Ok(0),
            Err(_) => Err("unknown selector"),
        }
    }

    fn only_owner(&self, caller: Address) -> Result<(), &'static str> {
        if caller == self.owner {
            Ok(())
        } else {
            Err("OwnableUnauthorizedAccount(address)")
        }
    }
}

#[cfg(test)]
mod tests {
    use alloy::primitives::{address, uint};

    use super::*;

    const OWNER: Address = address!("0x1111111111111111111111111111111111111111");
    const ROUTER: Address = address!("0x7a250d5630b4cf539739df2c5dacb4c659f2488d");
    const PAIR: Address = address!("0x07ce5889d2eb681af3bd61db24ab2602c502bd1b");
    const V1: Address = address!("0x00000000000000000000000000000000000000a1");
    const V2: Address = address!("0x00000000000000000000000000000000000000a2");

    fn initialize() -> Vec<u8> {
        INoxV2::initializeV2Call {
            _router: ROUTER,
            _swapThreshold: uint!(1000_U256),
            _slippageBps: 100,
        }
        .abi_encode()
    }

    #[test]
    fn initialize_runs_once() {
        let proxy = ProxyState::new(OWNER, V1);
        let (proxy, gas) =
            proxy.execute(OWNER, &initialize(), &|_| true).expect("first run");
        assert_eq!(gas, CALL_BASE_GAS + INITIALIZE_GAS);
        assert!(proxy.v2_initialized);
        assert!(proxy.auto_swap_enabled);
        assert_eq!(proxy.router, ROUTER);

        let err = proxy.execute(OWNER, &initialize(), &|_| true).unwrap_err();
        assert_eq!(err, "InvalidInitialization()");
    }

    #[test]
    fn strangers_cannot_configure() {
        let proxy = ProxyState::new(OWNER, V1);
        let input =
            INoxV2::setPairCall { pair: PAIR, status: true }.abi_encode();
        let err = proxy.execute(PAIR, &input, &|_| true).unwrap_err();
        assert_eq!(err, "OwnableUnauthorizedAccount(address)");
        assert!(!proxy.is_pair(PAIR));
    }

    #[test]
    fn upgrade_forwards_call_data() {
        let proxy = ProxyState::new(OWNER, V1);
        let input = IUUPSUpgradeable::upgradeToAndCallCall {
            newImplementation: V2,
            data: initialize().into(),
        }
        .abi_encode();

        let (proxy, gas) =
            proxy.execute(OWNER, &input, &|_| true).expect("should upgrade");
        assert_eq!(proxy.implementation, V2);
        assert!(proxy.v2_initialized);
        assert_eq!(gas, CALL_BASE_GAS + UPGRADE_GAS + INITIALIZE_GAS);
    }

    #[test]
    fn upgrade_requires_code_at_target() {
        let proxy = ProxyState::new(OWNER, V1);
        let input = IUUPSUpgradeable::upgradeToAndCallCall {
            newImplementation: V2,
            data: Default::default(),
        }
        .abi_encode();

        let err = proxy.execute(OWNER, &input, &|a| a == V1).unwrap_err();
        assert_eq!(err, "ERC1967InvalidImplementation(address)");
    }

    #[test]
    fn legacy_implementation_has_no_v2_entrypoints() {
        let proxy = ProxyState {
            legacy_implementation: Some(V1),
            ..ProxyState::new(OWNER, V1)
        };
        assert!(!proxy.serves_v2());
        assert!(proxy
            .read(&INoxV2::v2InitializedCall {}.abi_encode())
            .is_none());
        let err = proxy.execute(OWNER, &initialize(), &|_| true).unwrap_err();
        assert_eq!(err, "function selector not recognized");

        let upgrade = IUUPSUpgradeable::upgradeToAndCallCall {
            newImplementation: V2,
            data: initialize().into(),
        }
        .abi_encode();
        let (proxy, _) =
            proxy.execute(OWNER, &upgrade, &|_| true).expect("should upgrade");
        assert!(proxy.serves_v2());
        assert!(proxy.v2_initialized);
    }

    #[test]
    fn reads_pair_membership() {
        let mut proxy = ProxyState::new(OWNER, V1);
        proxy.pairs.insert(PAIR);

        let output = proxy
            .read(&INoxV2::isPairCall { account: PAIR }.abi_encode())
            .expect("should answer");
        let flag = INoxV2::isPairCall::abi_decode_returns(&output)
            .expect("should decode");
        assert!(flag);
    }
}
