//! Chain boundary used by the proxy upgrade stages.
//!
//! Everything that touches a node lives behind [`ChainClient`]: reading
//! state, submitting a transaction and waiting for its receipt. [`Client`]
//! is the `alloy`-backed implementation used against real networks.
//!
//! Contract state is read and written through a [`ContractView`], a thin
//! typed wrapper over the minimal interfaces declared in [`abi`].
pub mod abi;
mod client;
mod error;
mod provider;
mod receipt;
mod request;
mod view;

pub use client::ChainClient;
pub use error::ClientError;
pub use provider::{Client, PRIVATE_KEY_ENV_VAR_NAME, RPC_URL_ENV_VAR_NAME};
pub use receipt::Receipt;
pub use request::{TxRequest, TxScheme};
pub use view::ContractView;
