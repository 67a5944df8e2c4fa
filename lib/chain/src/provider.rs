use std::time::Duration;

use alloy::{
    network::{EthereumWallet, TransactionBuilder},
    primitives::{Address, Bytes, TxHash, U256},
    providers::{
        DynProvider, PendingTransactionBuilder, Provider, ProviderBuilder,
    },
    rpc::types::TransactionRequest,
    signers::local::PrivateKeySigner,
    transports::http::reqwest::Url,
};
use eyre::Context;
use tracing::debug;

use crate::{ChainClient, ClientError, Receipt, TxRequest, TxScheme};

/// Environment variable holding the node's HTTP endpoint.
pub const RPC_URL_ENV_VAR_NAME: &str = "RPC_URL";
/// Environment variable holding the hex-encoded signing key.
pub const PRIVATE_KEY_ENV_VAR_NAME: &str = "PRIVATE_KEY";

/// Load the `name` environment variable.
fn env(name: &str) -> eyre::Result<String> {
    std::env::var(name).wrap_err(format!("failed to load {name}"))
}

/// [`ChainClient`] backed by an `alloy` HTTP provider and a local private
/// key.
///
/// The provider is assembled without the gas filler, so a transaction
/// reaching it already carries the gas limit chosen by its stage. Fees are
/// priced from the node right before submission.
#[derive(Clone)]
pub struct Client {
    provider: DynProvider,
    signer: Address,
    confirmations: u64,
    timeout: Option<Duration>,
}

impl Client {
    /// Connect to `rpc_url`, signing with `private_key`.
    ///
    /// # Errors
    ///
    /// May fail if the url or the key cannot be parsed.
    pub fn connect(rpc_url: &str, private_key: &str) -> eyre::Result<Self> {
        let signer = private_key
            .parse::<PrivateKeySigner>()
            .wrap_err("failed to parse the private key")?;
        let rpc_url: Url = rpc_url
            .parse()
            .wrap_err("failed to parse RPC_URL string into a URL")?;

        let address = signer.address();
        let provider = ProviderBuilder::new()
            .disable_recommended_fillers()
            .with_simple_nonce_management()
            .fetch_chain_id()
            .wallet(EthereumWallet::from(signer))
            .connect_http(rpc_url)
            .erased();

        Ok(Self { provider, signer: address, confirmations: 1, timeout: None })
    }

    /// Connect using [`RPC_URL_ENV_VAR_NAME`] and
    /// [`PRIVATE_KEY_ENV_VAR_NAME`].
    ///
    /// # Errors
    ///
    /// May fail if a variable is missing or malformed.
    pub fn from_env() -> eyre::Result<Self> {
        let rpc_url = env(RPC_URL_ENV_VAR_NAME)?;
        let private_key = env(PRIVATE_KEY_ENV_VAR_NAME)?;
        Self::connect(&rpc_url, &private_key)
    }

    /// Number of blocks a receipt must be buried under before it is
    /// returned.
    #[must_use]
    pub fn with_confirmations(mut self, confirmations: u64) -> Self {
        self.confirmations = confirmations.max(1);
        self
    }

    /// Give up waiting for a receipt after `timeout`.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Price `tx` according to `scheme`.
    async fn price(
        &self,
        tx: &mut TransactionRequest,
        scheme: TxScheme,
    ) -> Result<(), ClientError> {
        match scheme {
            TxScheme::Legacy => {
                let gas_price = self.provider.get_gas_price().await?;
                tx.set_gas_price(gas_price);
            }
            TxScheme::FeeMarket => {
                let fees = self.provider.estimate_eip1559_fees().await?;
                tx.set_max_fee_per_gas(fees.max_fee_per_gas);
                tx.set_max_priority_fee_per_gas(fees.max_priority_fee_per_gas);
            }
        }
        Ok(())
    }
}

impl ChainClient for Client {
    fn signer(&self) -> Address {
        self.signer
    }

    async fn balance(&self, account: Address) -> Result<U256, ClientError> {
        Ok(self.provider.get_balance(account).await?)
    }

    async fn storage_at(
        &self,
        account: Address,
        slot: U256,
    ) -> Result<U256, ClientError> {
        Ok(self.provider.get_storage_at(account, slot).await?)
    }

    async fn call(
        &self,
        to: Address,
        input: Bytes,
    ) -> Result<Bytes, ClientError> {
        let tx = TransactionRequest::default()
            .with_from(self.signer)
            .with_to(to)
            .with_input(input);
        Ok(self.provider.call(tx).await?)
    }

    async fn submit(&self, request: &TxRequest) -> Result<TxHash, ClientError> {
        let mut tx = request.to_transaction_request(self.signer);
        self.price(&mut tx, request.scheme()).await?;
        debug!(
            gas_limit = request.gas_limit(),
            gas_price = ?tx.gas_price,
            max_fee_per_gas = ?tx.max_fee_per_gas,
            "sending transaction"
        );

        let pending = self.provider.send_transaction(tx).await?;
        Ok(*pending.tx_hash())
    }

    async fn await_receipt(
        &self,
        tx_hash: TxHash,
    ) -> Result<Receipt, ClientError> {
        let root = self.provider.root().clone();
        let receipt = PendingTransactionBuilder::new(root, tx_hash)
            .with_required_confirmations(self.confirmations)
            .with_timeout(self.timeout)
            .get_receipt()
            .await?;
        Ok(Receipt::from(&receipt))
    }
}
