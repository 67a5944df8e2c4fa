//! Minimal interfaces of the contracts touched by an upgrade.
//!
//! Only the functions a stage needs are declared here.
#![allow(missing_docs)]
use alloy::{
    primitives::{uint, U256},
    sol,
};

/// Storage slot holding the address of the current implementation of an
/// [ERC-1967] proxy.
///
/// Equal to `keccak256("eip1967.proxy.implementation") - 1`.
///
/// [ERC-1967]: https://eips.ethereum.org/EIPS/eip-1967
pub const IMPLEMENTATION_SLOT: U256 = uint!(
    0x360894a13ba1a3210667c828492db98dca3e2076cc3735a920a3ca505d382bbc_U256
);

sol! {
    /// Configuration surface of the V2 token implementation, reached through
    /// the proxy.
    #[derive(Debug, PartialEq, Eq)]
    interface INoxV2 {
        function initializeV2(address _router, uint256 _swapThreshold, uint16 _slippageBps) external;
        function v2Initialized() external view returns (bool);
        function autoSwapEnabled() external view returns (bool);
        function uniswapRouter() external view returns (address);
        function autoSwapThreshold() external view returns (uint256);
        function maxSlippageBps() external view returns (uint16);

        function setPair(address pair, bool status) external;
        function isPair(address account) external view returns (bool);
    }

    /// Upgrade entrypoint of a UUPS proxy.
    #[derive(Debug, PartialEq, Eq)]
    interface IUUPSUpgradeable {
        function upgradeToAndCall(address newImplementation, bytes memory data) external payable;
        function proxiableUUID() external view returns (bytes32);
    }
}

#[cfg(test)]
mod tests {
    use alloy::{
        primitives::{keccak256, U256},
        sol_types::SolCall,
    };

    use super::{INoxV2, IMPLEMENTATION_SLOT};

    #[test]
    fn implementation_slot_matches_eip1967_derivation() {
        let hash = keccak256(b"eip1967.proxy.implementation");
        let expected = U256::from_be_bytes(hash.0) - U256::from(1);
        assert_eq!(IMPLEMENTATION_SLOT, expected);
    }

    #[test]
    fn selectors_match_solidity_signatures() {
        let initialize =
            keccak256(b"initializeV2(address,uint256,uint16)").0;
        assert_eq!(INoxV2::initializeV2Call::SELECTOR, initialize[..4]);

        let set_pair = keccak256(b"setPair(address,bool)").0;
        assert_eq!(INoxV2::setPairCall::SELECTOR, set_pair[..4]);
    }
}
