//! Public-chain account operations used by the shield flow.
//!
//! # Responsibilities
//! - Read token allowances and balances for the signer
//! - Approve spenders and wrap native currency
//! - Sign, broadcast and confirm prepared transactions
//! - Sign the session key derivation message

use alloy::network::{EthereumWallet, TransactionBuilder};
use alloy::primitives::{Address, TxHash, U256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use alloy::signers::Signature;
use alloy::sol;
use alloy::sol_types::SolCall;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

use crate::blockchain::client::BlockchainClient;
use crate::blockchain::types::{BlockchainError, BlockchainResult, SubmittedTx};
use crate::blockchain::wallet::Wallet;

sol! {
    interface IERC20 {
        function allowance(address owner, address spender) external view returns (uint256);
        function approve(address spender, uint256 amount) external returns (bool);
        function balanceOf(address owner) external view returns (uint256);
    }

    interface IWETH {
        function deposit() external payable;
    }
}

/// Upper bound on waiting for a receipt once a transaction is broadcast.
const CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(300);

/// Signer-side chain access.
#[async_trait]
pub trait ChainAccess: Send + Sync {
    /// Public address of the connected signer.
    fn signer_address(&self) -> Address;

    async fn token_allowance(&self, token: Address, owner: Address, spender: Address)
        -> BlockchainResult<U256>;

    async fn token_balance(&self, token: Address, owner: Address) -> BlockchainResult<U256>;

    async fn native_balance(&self, owner: Address) -> BlockchainResult<U256>;

    /// Approve `spender` for `amount` of `token` and wait for `confirmations`.
    async fn approve(
        &self,
        token: Address,
        spender: Address,
        amount: U256,
        confirmations: u64,
    ) -> BlockchainResult<SubmittedTx>;

    /// Deposit `amount` of native currency into the wrapped token contract.
    async fn wrap_native(
        &self,
        wrapped_token: Address,
        amount: U256,
        confirmations: u64,
    ) -> BlockchainResult<SubmittedTx>;

    /// Sign and broadcast `tx`, then wait for `confirmations`.
    async fn send_transaction(
        &self,
        tx: TransactionRequest,
        confirmations: u64,
    ) -> BlockchainResult<SubmittedTx>;

    async fn sign_message(&self, message: &[u8]) -> BlockchainResult<Signature>;
}

/// [`ChainAccess`] backed by a local private key and an HTTP provider.
pub struct AlloyChainAccess {
    client: BlockchainClient,
    wallet: Wallet,
    /// Provider with the wallet filler attached, used for writes only.
    signing_provider: Arc<dyn Provider + Send + Sync>,
}

impl AlloyChainAccess {
    pub fn new(client: BlockchainClient, wallet: Wallet) -> BlockchainResult<Self> {
        let url: url::Url = client.config().rpc_url.parse().map_err(|e| {
            BlockchainError::Rpc(format!("Invalid RPC URL '{}': {}", client.config().rpc_url, e))
        })?;
        let signing_provider = Arc::new(
            ProviderBuilder::new()
                .wallet(EthereumWallet::from(wallet.signer().clone()))
                .connect_http(url),
        ) as Arc<dyn Provider + Send + Sync>;

        Ok(Self {
            client,
            wallet,
            signing_provider,
        })
    }

    async fn read_u256(&self, to: Address, input: Vec<u8>) -> BlockchainResult<U256> {
        let tx = TransactionRequest::default().with_to(to).with_input(input);
        let output = self.client.call(tx).await?;
        // Both reads return a single uint256 word.
        IERC20::balanceOfCall::abi_decode_returns(&output)
            .map_err(|e| BlockchainError::Contract(format!("Undecodable return data: {}", e)))
    }
}

#[async_trait]
impl ChainAccess for AlloyChainAccess {
    fn signer_address(&self) -> Address {
        self.wallet.address()
    }

    async fn token_allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> BlockchainResult<U256> {
        let input = IERC20::allowanceCall { owner, spender }.abi_encode();
        self.read_u256(token, input).await
    }

    async fn token_balance(&self, token: Address, owner: Address) -> BlockchainResult<U256> {
        let input = IERC20::balanceOfCall { owner }.abi_encode();
        self.read_u256(token, input).await
    }

    async fn native_balance(&self, owner: Address) -> BlockchainResult<U256> {
        self.client.get_balance(owner).await
    }

    async fn approve(
        &self,
        token: Address,
        spender: Address,
        amount: U256,
        confirmations: u64,
    ) -> BlockchainResult<SubmittedTx> {
        let input = IERC20::approveCall { spender, amount }.abi_encode();
        let tx = TransactionRequest::default().with_to(token).with_input(input);
        self.send_transaction(tx, confirmations).await
    }

    async fn wrap_native(
        &self,
        wrapped_token: Address,
        amount: U256,
        confirmations: u64,
    ) -> BlockchainResult<SubmittedTx> {
        let input = IWETH::depositCall {}.abi_encode();
        let tx = TransactionRequest::default()
            .with_to(wrapped_token)
            .with_value(amount)
            .with_input(input);
        self.send_transaction(tx, confirmations).await
    }

    async fn send_transaction(
        &self,
        tx: TransactionRequest,
        confirmations: u64,
    ) -> BlockchainResult<SubmittedTx> {
        let tx = tx
            .with_from(self.wallet.address())
            .with_chain_id(self.wallet.chain_id());

        let pending = self
            .signing_provider
            .send_transaction(tx)
            .await
            .map_err(|e| BlockchainError::Rpc(format!("Broadcast failed: {}", e)))?;
        let tx_hash: TxHash = *pending.tx_hash();
        tracing::info!(tx_hash = %tx_hash, confirmations, "Transaction broadcast");

        let receipt = timeout(
            CONFIRMATION_TIMEOUT,
            pending
                .with_required_confirmations(confirmations.max(1))
                .get_receipt(),
        )
        .await
        .map_err(|_| BlockchainError::ConfirmationTimeout(tx_hash))?
        .map_err(|e| BlockchainError::Rpc(format!("Receipt unavailable: {}", e)))?;

        if !receipt.status() {
            return Err(BlockchainError::Reverted(tx_hash));
        }

        tracing::info!(
            tx_hash = %tx_hash,
            block_number = ?receipt.block_number,
            gas_used = receipt.gas_used,
            "Transaction confirmed"
        );
        Ok(SubmittedTx { tx_hash, receipt })
    }

    async fn sign_message(&self, message: &[u8]) -> BlockchainResult<Signature> {
        self.wallet.sign_message(message).await
    }
}

impl std::fmt::Debug for AlloyChainAccess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlloyChainAccess")
            .field("client", &self.client)
            .field("signer", &self.wallet.address())
            .finish()
    }
}
