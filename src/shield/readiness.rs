//! Shield prerequisite checks against the public chain.

use alloy::primitives::{Address, U256};

use crate::blockchain::transaction::ChainAccess;
use crate::blockchain::types::BlockchainResult;
use crate::shield::types::ShieldReadiness;

/// Check, in order, token balance, allowance for `spender`, and native
/// balance for gas. The first shortfall found is reported.
pub async fn check_readiness(
    chain: &dyn ChainAccess,
    token: Address,
    spender: Address,
    amount: U256,
    min_gas_balance: U256,
) -> BlockchainResult<ShieldReadiness> {
    let owner = chain.signer_address();

    let balance = chain.token_balance(token, owner).await?;
    if balance < amount {
        return Ok(ShieldReadiness::InsufficientToken {
            shortfall: amount - balance,
        });
    }

    let allowance = chain.token_allowance(token, owner, spender).await?;
    if allowance < amount {
        return Ok(ShieldReadiness::InsufficientAllowance { current: allowance });
    }

    let native = chain.native_balance(owner).await?;
    if native < min_gas_balance {
        return Ok(ShieldReadiness::InsufficientGas {
            balance: native,
            required: min_gas_balance,
        });
    }

    tracing::debug!(token = %token, amount = %amount, "Shield prerequisites satisfied");
    Ok(ShieldReadiness::Ready)
}
