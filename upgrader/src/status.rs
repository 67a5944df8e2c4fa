//! Read-only snapshot of the proxy.
use std::fmt;

use alloy::primitives::{Address, B256, U256};
use chain::{
    abi::{INoxV2, IMPLEMENTATION_SLOT},
    ChainClient, ClientError, ContractView,
};

/// Current implementation of the ERC-1967 proxy at `proxy`.
///
/// # Errors
///
/// If the slot cannot be read.
pub async fn implementation<C: ChainClient>(
    client: &C,
    proxy: Address,
) -> Result<Address, ClientError> {
    let word = client.storage_at(proxy, IMPLEMENTATION_SLOT).await?;
    Ok(Address::from_word(B256::from(word.to_be_bytes::<32>())))
}

/// Everything the upgrade stages touch, as currently stored on chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProxyStatus {
    /// Proxy address.
    pub proxy: Address,
    /// Implementation the proxy delegates to.
    pub implementation: Address,
    /// Whether `initializeV2` ran.
    pub v2_initialized: bool,
    /// Whether automatic swaps are on.
    pub auto_swap_enabled: bool,
    /// Configured swap router.
    pub router: Address,
    /// Configured swap threshold.
    pub swap_threshold: U256,
    /// Configured slippage bound in basis points.
    pub slippage_bps: u16,
    /// Pair looked up.
    pub pair: Address,
    /// Whether `pair` is allow-listed.
    pub pair_registered: bool,
}

impl ProxyStatus {
    /// Read the status of `proxy`, looking up `pair` in its allow-list.
    ///
    /// # Errors
    ///
    /// If any value cannot be read.
    pub async fn read<C: ChainClient>(
        client: &C,
        proxy: Address,
        pair: Address,
    ) -> Result<Self, ClientError> {
        let view = ContractView::new(client, proxy);
        Ok(Self {
            proxy,
            implementation: implementation(client, proxy).await?,
            v2_initialized: view.read(INoxV2::v2InitializedCall {}).await?,
            auto_swap_enabled: view
                .read(INoxV2::autoSwapEnabledCall {})
                .await?,
            router: view.read(INoxV2::uniswapRouterCall {}).await?,
            swap_threshold: view.read(INoxV2::autoSwapThresholdCall {}).await?,
            slippage_bps: view.read(INoxV2::maxSlippageBpsCall {}).await?,
            pair,
            pair_registered: view
                .read(INoxV2::isPairCall { account: pair })
                .await?,
        })
    }
}

impl fmt::Display for ProxyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "proxy:             {}", self.proxy)?;
        writeln!(f, "implementation:    {}", self.implementation)?;
        writeln!(f, "v2Initialized:     {}", self.v2_initialized)?;
        writeln!(f, "autoSwapEnabled:   {}", self.auto_swap_enabled)?;
        writeln!(f, "uniswapRouter:     {}", self.router)?;
        writeln!(f, "autoSwapThreshold: {}", self.swap_threshold)?;
        writeln!(f, "maxSlippageBps:    {}", self.slippage_bps)?;
        write!(f, "isPair({}): {}", self.pair, self.pair_registered)
    }
}

#[cfg(test)]
mod tests {
    use alloy::primitives::{address, uint};
    use mockchain::MockChain;

    use super::*;

    const PROXY: Address = address!("0x0a26c80be4e060e688d7c23addb92cbb5d2c9eca");
    const V1: Address = address!("0x00000000000000000000000000000000000000a1");
    const ROUTER: Address = address!("0x7a250d5630b4cf539739df2c5dacb4c659f2488d");
    const PAIR: Address = address!("0x07ce5889d2eb681af3bd61db24ab2602c502bd1b");

    #[tokio::test]
    async fn reads_implementation_slot() {
        let chain = MockChain::new().with_proxy(PROXY, V1);
        assert_eq!(implementation(&chain, PROXY).await.unwrap(), V1);
    }

    #[tokio::test]
    async fn snapshot_reflects_storage() {
        let chain = MockChain::new().with_proxy(PROXY, V1);
        chain
            .update_proxy(PROXY, |proxy| {
                proxy.v2_initialized = true;
                proxy.auto_swap_enabled = true;
                proxy.router = ROUTER;
                proxy.swap_threshold = uint!(1000_U256);
                proxy.slippage_bps = 100;
                proxy.pairs.insert(PAIR);
            })
            .await;

        let status = ProxyStatus::read(&chain, PROXY, PAIR).await.unwrap();
        assert_eq!(
            status,
            ProxyStatus {
                proxy: PROXY,
                implementation: V1,
                v2_initialized: true,
                auto_swap_enabled: true,
                router: ROUTER,
                swap_threshold: uint!(1000_U256),
                slippage_bps: 100,
                pair: PAIR,
                pair_registered: true,
            }
        );
    }
}
