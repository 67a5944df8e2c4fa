use std::collections::HashMap;

use alloy::primitives::{
    address, keccak256, uint, Address, Bytes, TxHash, U256,
};
use chain::{
    abi::IMPLEMENTATION_SLOT, ChainClient, ClientError, Receipt, TxRequest,
};
use tokio::sync::Mutex;
use tracing::trace;

use crate::proxy::{ProxyState, CALL_BASE_GAS};

/// Address signing every transaction submitted to a [`MockChain`].
pub const DEFAULT_SIGNER: Address =
    address!("0x3f1eae7d46d88f08fc2f8ed27fcb2ab183eb2d0e");
/// Price paid per unit of gas.
pub const GAS_PRICE: u128 = 1_000_000_000;
/// Funding of the signer on a fresh chain, 100 ETH.
pub const DEFAULT_BALANCE: U256 = uint!(100_000_000_000_000_000_000_U256);

/// Runtime code standing in for contracts the mock does not execute.
const PLACEHOLDER_CODE: Bytes = Bytes::from_static(&[0xfe]);

/// Intrinsic gas of a contract creation.
pub const CREATE_BASE_GAS: u64 = 53_000;
/// Gas charged per byte of init code.
pub const CODE_DEPOSIT_GAS: u64 = 200;

/// In-memory chain answering [`ChainClient`] requests.
///
/// Every accepted transaction is included immediately in its own block.
/// Faults can be armed to exercise the failure paths of a caller.
pub struct MockChain {
    signer: Address,
    world: Mutex<World>,
}

#[derive(Default)]
struct World {
    block: u64,
    nonce: u64,
    balances: HashMap<Address, U256>,
    code: HashMap<Address, Bytes>,
    proxies: HashMap<Address, ProxyState>,
    receipts: HashMap<TxHash, Receipt>,
    submitted: Vec<TxRequest>,
    faults: Faults,
}

#[derive(Default)]
struct Faults {
    unavailable: bool,
    reject_next: Option<String>,
    revert_next: bool,
    drop_next_receipt: bool,
}

/// Result of executing one transaction.
struct Execution {
    success: bool,
    gas_used: u64,
    contract_address: Option<Address>,
}

impl Execution {
    fn reverted(gas_used: u64, reason: &str) -> Self {
        trace!(reason, "execution reverted");
        Self { success: false, gas_used, contract_address: None }
    }
}

impl Default for MockChain {
    fn default() -> Self {
        Self::new()
    }
}

impl MockChain {
    /// A chain whose only account is [`DEFAULT_SIGNER`], funded with
    /// [`DEFAULT_BALANCE`].
    #[must_use]
    pub fn new() -> Self {
        let mut world = World::default();
        world.balances.insert(DEFAULT_SIGNER, DEFAULT_BALANCE);
        Self { signer: DEFAULT_SIGNER, world: Mutex::new(world) }
    }

    /// Add a proxy at `proxy` owned by the signer and delegating to
    /// `implementation`.
    #[must_use]
    pub fn with_proxy(
        mut self,
        proxy: Address,
        implementation: Address,
    ) -> Self {
        let owner = self.signer;
        let world = self.world.get_mut();
        world.code.insert(proxy, PLACEHOLDER_CODE);
        world.code.entry(implementation).or_insert(PLACEHOLDER_CODE);
        world.proxies.insert(proxy, ProxyState::new(owner, implementation));
        self
    }

    /// Like [`MockChain::with_proxy`], with `implementation` lacking the V2
    /// entrypoints: V2 reads and writes through the proxy revert until it
    /// is upgraded away from `implementation`.
    #[must_use]
    pub fn with_v1_proxy(
        self,
        proxy: Address,
        implementation: Address,
    ) -> Self {
        let mut chain = self.with_proxy(proxy, implementation);
        if let Some(state) = chain.world.get_mut().proxies.get_mut(&proxy) {
            state.legacy_implementation = Some(implementation);
        }
        chain
    }

    /// Place `code` at `account`.
    #[must_use]
    pub fn with_code(
        mut self,
        account: Address,
        code: impl Into<Bytes>,
    ) -> Self {
        self.world.get_mut().code.insert(account, code.into());
        self
    }

    /// Set the signer's balance.
    #[must_use]
    pub fn with_balance(mut self, balance: U256) -> Self {
        let signer = self.signer;
        self.world.get_mut().balances.insert(signer, balance);
        self
    }

    /// Snapshot of the proxy at `proxy`.
    pub async fn proxy(&self, proxy: Address) -> Option<ProxyState> {
        self.world.lock().await.proxies.get(&proxy).cloned()
    }

    /// Mutate the proxy at `proxy` directly, bypassing transactions.
    ///
    /// # Panics
    ///
    /// If there is no proxy at `proxy`.
    pub async fn update_proxy(
        &self,
        proxy: Address,
        update: impl FnOnce(&mut ProxyState),
    ) {
        let mut world = self.world.lock().await;
        let state = world.proxies.get_mut(&proxy).expect("proxy should exist");
        update(state);
    }

    /// Code stored at `account`.
    pub async fn code_at(&self, account: Address) -> Option<Bytes> {
        self.world.lock().await.code.get(&account).cloned()
    }

    /// Every transaction that passed submission checks, in order.
    pub async fn submitted(&self) -> Vec<TxRequest> {
        self.world.lock().await.submitted.clone()
    }

    /// Height of the latest block.
    pub async fn block_number(&self) -> u64 {
        self.world.lock().await.block
    }

    /// Make every request fail as if the node were unreachable.
    pub async fn set_unavailable(&self, unavailable: bool) {
        self.world.lock().await.faults.unavailable = unavailable;
    }

    /// Refuse the next submission with `reason`.
    pub async fn reject_next_submission(&self, reason: impl Into<String>) {
        self.world.lock().await.faults.reject_next = Some(reason.into());
    }

    /// Revert the next included transaction regardless of its effect.
    pub async fn revert_next(&self) {
        self.world.lock().await.faults.revert_next = true;
    }

    /// Include the next transaction but never hand out its receipt.
    pub async fn drop_next_receipt(&self) {
        self.world.lock().await.faults.drop_next_receipt = true;
    }
}

impl World {
    fn ensure_available(&self) -> Result<(), ClientError> {
        if self.faults.unavailable {
            Err(ClientError::Unavailable("connection refused".to_string()))
        } else {
            Ok(())
        }
    }

    fn balance(&self, account: Address) -> U256 {
        self.balances.get(&account).copied().unwrap_or_default()
    }

    fn execute(
        &mut self,
        caller: Address,
        nonce: u64,
        request: &TxRequest,
    ) -> Execution {
        let gas_limit = request.gas_limit();
        let input = request.input();

        let Some(to) = request.to() else {
            let code_len = u64::try_from(input.len()).unwrap_or(u64::MAX);
            let required = CREATE_BASE_GAS + CODE_DEPOSIT_GAS * code_len;
            if input.is_empty() {
                return Execution::reverted(
                    CREATE_BASE_GAS.min(gas_limit),
                    "empty init code",
                );
            }
            if gas_limit < required {
                return Execution::reverted(gas_limit, "out of gas");
            }
            let address = caller.create(nonce);
            self.code.insert(address, input.clone());
            return Execution {
                success: true,
                gas_used: required,
                contract_address: Some(address),
            };
        };

        let World { proxies, code, .. } = self;
        let Some(proxy) = proxies.get_mut(&to) else {
            return if gas_limit < CALL_BASE_GAS {
                Execution::reverted(gas_limit, "out of gas")
            } else {
                Execution {
                    success: true,
                    gas_used: CALL_BASE_GAS,
                    contract_address: None,
                }
            };
        };

        let has_code = |account: Address| code.contains_key(&account);
        match proxy.execute(caller, input, &has_code) {
            Ok((_, gas_used)) if gas_used > gas_limit => {
                Execution::reverted(gas_limit, "out of gas")
            }
            Ok((next, gas_used)) => {
                *proxy = next;
                Execution { success: true, gas_used, contract_address: None }
            }
            Err(reason) => {
                Execution::reverted(CALL_BASE_GAS.min(gas_limit), reason)
            }
        }
    }
}

impl ChainClient for MockChain {
    fn signer(&self) -> Address {
        self.signer
    }

    async fn balance(&self, account: Address) -> Result<U256, ClientError> {
        let world = self.world.lock().await;
        world.ensure_available()?;
        Ok(world.balance(account))
    }

    async fn storage_at(
        &self,
        account: Address,
        slot: U256,
    ) -> Result<U256, ClientError> {
        let world = self.world.lock().await;
        world.ensure_available()?;
        let word = match world.proxies.get(&account) {
            Some(proxy) if slot == IMPLEMENTATION_SLOT => {
                U256::from_be_bytes(proxy.implementation.into_word().0)
            }
            _ => U256::ZERO,
        };
        Ok(word)
    }

    async fn call(
        &self,
        to: Address,
        input: Bytes,
    ) -> Result<Bytes, ClientError> {
        let world = self.world.lock().await;
        world.ensure_available()?;
        match world.proxies.get(&to) {
            Some(proxy) => {
                proxy.read(&input).map(Bytes::from).ok_or_else(|| {
                    ClientError::Rejected("execution reverted".to_string())
                })
            }
            // Calling an account without code succeeds with no output.
            None => Ok(Bytes::new()),
        }
    }

    async fn submit(&self, request: &TxRequest) -> Result<TxHash, ClientError> {
        let mut world = self.world.lock().await;
        world.ensure_available()?;
        if let Some(reason) = world.faults.reject_next.take() {
            return Err(ClientError::Rejected(reason));
        }

        let price = U256::from(GAS_PRICE);
        let max_cost = U256::from(request.gas_limit()) * price;
        let balance = world.balance(self.signer);
        if balance < max_cost {
            return Err(ClientError::Rejected(format!(
                "insufficient funds for gas * price: \
                 have {balance} want {max_cost}"
            )));
        }

        world.submitted.push(request.clone());
        let nonce = world.nonce;
        world.nonce += 1;
        world.block += 1;

        let tx_hash =
            keccak256([self.signer.as_slice(), &nonce.to_be_bytes()].concat());

        let execution = if std::mem::take(&mut world.faults.revert_next) {
            Execution::reverted(
                CALL_BASE_GAS.min(request.gas_limit()),
                "armed revert",
            )
        } else {
            world.execute(self.signer, nonce, request)
        };

        let fee = U256::from(execution.gas_used) * price;
        world.balances.insert(self.signer, balance - fee);

        let receipt = Receipt {
            tx_hash,
            block_number: Some(world.block),
            contract_address: execution.contract_address,
            gas_used: execution.gas_used,
            success: execution.success,
        };
        trace!(?receipt, "transaction included");

        if !std::mem::take(&mut world.faults.drop_next_receipt) {
            world.receipts.insert(tx_hash, receipt);
        }
        Ok(tx_hash)
    }

    async fn await_receipt(
        &self,
        tx_hash: TxHash,
    ) -> Result<Receipt, ClientError> {
        let world = self.world.lock().await;
        world.ensure_available()?;
        world.receipts.get(&tx_hash).cloned().ok_or_else(|| {
            ClientError::Unavailable(format!(
                "transaction {tx_hash} was not mined"
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use alloy::{
        primitives::{address, bytes},
        sol_types::SolCall,
    };
    use chain::{abi::INoxV2, ContractView, TxScheme};

    use super::*;

    const PROXY: Address = address!("0x0a26c80be4e060e688d7c23addb92cbb5d2c9eca");
    const V1: Address = address!("0x00000000000000000000000000000000000000a1");
    const PAIR: Address = address!("0x07ce5889d2eb681af3bd61db24ab2602c502bd1b");

    #[tokio::test]
    async fn deploys_get_fresh_addresses() {
        let chain = MockChain::new();
        let request =
            TxRequest::deploy(bytes!("60806040"), 1_000_000, TxScheme::Legacy);

        let first = chain.submit(&request).await.unwrap();
        let second = chain.submit(&request).await.unwrap();
        assert_ne!(first, second);

        let first = chain.await_receipt(first).await.unwrap();
        let second = chain.await_receipt(second).await.unwrap();
        assert!(first.success && second.success);
        assert_eq!(first.contract_address, Some(DEFAULT_SIGNER.create(0)));
        assert_eq!(second.contract_address, Some(DEFAULT_SIGNER.create(1)));
        assert_eq!(first.block_number, Some(1));
        assert_eq!(second.block_number, Some(2));
    }

    #[tokio::test]
    async fn deploy_runs_out_of_gas_under_a_low_limit() {
        let chain = MockChain::new();
        let request =
            TxRequest::deploy(bytes!("60806040"), 50_000, TxScheme::Legacy);

        let hash = chain.submit(&request).await.unwrap();
        let receipt = chain.await_receipt(hash).await.unwrap();
        assert!(!receipt.success);
        assert_eq!(receipt.contract_address, None);
        assert_eq!(receipt.gas_used, 50_000);
    }

    #[tokio::test]
    async fn set_pair_through_view() {
        let chain = MockChain::new().with_proxy(PROXY, V1);
        let view = ContractView::new(&chain, PROXY);

        let is_pair = INoxV2::isPairCall { account: PAIR };
        assert!(!view.read(is_pair.clone()).await.unwrap());

        let request = view.write(
            &INoxV2::setPairCall { pair: PAIR, status: true },
            100_000,
            TxScheme::FeeMarket,
        );
        let hash = chain.submit(&request).await.unwrap();
        assert!(chain.await_receipt(hash).await.unwrap().success);

        assert!(view.read(is_pair).await.unwrap());
        assert_eq!(chain.submitted().await, vec![request]);
    }

    #[tokio::test]
    async fn rejects_when_gas_cannot_be_paid() {
        let chain = MockChain::new().with_balance(U256::from(GAS_PRICE));
        let request =
            TxRequest::deploy(bytes!("60806040"), 8_000_000, TxScheme::Legacy);

        let err = chain.submit(&request).await.unwrap_err();
        assert!(matches!(err, ClientError::Rejected(_)));
        assert!(chain.submitted().await.is_empty());
    }

    #[tokio::test]
    async fn armed_faults_fire_once() {
        let chain = MockChain::new().with_proxy(PROXY, V1);
        let input =
            INoxV2::setPairCall { pair: PAIR, status: true }.abi_encode();
        let request =
            TxRequest::call(PROXY, input, 100_000, TxScheme::FeeMarket);

        chain.revert_next().await;
        let hash = chain.submit(&request).await.unwrap();
        assert!(!chain.await_receipt(hash).await.unwrap().success);
        assert!(!chain.proxy(PROXY).await.unwrap().is_pair(PAIR));

        chain.drop_next_receipt().await;
        let hash = chain.submit(&request).await.unwrap();
        assert!(chain.await_receipt(hash).await.is_err());
        assert!(chain.proxy(PROXY).await.unwrap().is_pair(PAIR));

        let hash = chain.submit(&request).await.unwrap();
        assert!(chain.await_receipt(hash).await.unwrap().success);
    }

    #[tokio::test]
    async fn unavailable_chain_answers_nothing() {
        let chain = MockChain::new().with_proxy(PROXY, V1);
        chain.set_unavailable(true).await;

        let err =
            chain.storage_at(PROXY, IMPLEMENTATION_SLOT).await.unwrap_err();
        assert!(matches!(err, ClientError::Unavailable(_)));

        chain.set_unavailable(false).await;
        let word = chain.storage_at(PROXY, IMPLEMENTATION_SLOT).await.unwrap();
        assert_eq!(word, U256::from_be_bytes(V1.into_word().0));
    }
}
