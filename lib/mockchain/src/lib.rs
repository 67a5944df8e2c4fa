//! # Mockchain - Unit Testing for Upgrade Stages
//!
//! An in-memory [`chain::ChainClient`] that models a UUPS token proxy well
//! enough to drive every upgrade stage without a node: deployments create
//! fresh addresses, configuration calls are guarded the way the on-chain
//! contract guards them, and every transaction carries the gas limit it was
//! submitted with.
//!
//! A proxy added with [`MockChain::with_v1_proxy`] only answers V2 calls
//! once upgraded away from its first implementation, like a real proxy
//! still delegating to V1. [`MockChain::with_proxy`] answers them
//! regardless.
//!
//! ```rust,ignore
//! let chain = MockChain::new().with_proxy(PROXY, OLD_IMPLEMENTATION);
//! chain.revert_next().await; // arm a fault
//! let result = Executor::new(&chain).execute(&step).await;
//! assert!(result.is_failed());
//! ```
mod node;
mod proxy;

pub use node::{
    MockChain, CODE_DEPOSIT_GAS, CREATE_BASE_GAS, DEFAULT_BALANCE,
    DEFAULT_SIGNER, GAS_PRICE,
};
pub use proxy::{
    ProxyState, CALL_BASE_GAS, INITIALIZE_GAS, SET_PAIR_GAS, UPGRADE_GAS,
};
