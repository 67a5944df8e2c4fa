use alloy::{primitives::Address, sol_types::SolCall};

use crate::{ChainClient, ClientError, TxRequest, TxScheme};

/// Typed view over a contract deployed at a fixed address.
///
/// Reads go straight to the node every time; nothing is cached.
#[derive(Debug)]
pub struct ContractView<'a, C> {
    client: &'a C,
    address: Address,
}

impl<'a, C: ChainClient> ContractView<'a, C> {
    /// View the contract at `address` through `client`.
    #[must_use]
    pub fn new(client: &'a C, address: Address) -> Self {
        Self { client, address }
    }

    /// Address of the viewed contract.
    #[must_use]
    pub fn address(&self) -> Address {
        self.address
    }

    /// Execute `call` read-only and decode its return value.
    ///
    /// # Errors
    ///
    /// If the node cannot be queried or the return data does not decode.
    pub async fn read<T: SolCall>(
        &self,
        call: T,
    ) -> Result<T::Return, ClientError> {
        let output =
            self.client.call(self.address, call.abi_encode().into()).await?;
        Ok(T::abi_decode_returns(&output)?)
    }

    /// Build the transaction invoking `call` with an explicit `gas_limit`.
    pub fn write<T: SolCall>(
        &self,
        call: &T,
        gas_limit: u64,
        scheme: TxScheme,
    ) -> TxRequest {
        TxRequest::call(self.address, call.abi_encode(), gas_limit, scheme)
    }
}
