//! Raydium AMM v4 swap instructions

use borsh::BorshSerialize;
use solana_sdk::{
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
};

use crate::error::{SwapError, SwapResult};
use crate::pool_registry::PoolDescriptor;

pub const SWAP_BASE_IN_TAG: u8 = 9;
pub const SWAP_BASE_OUT_TAG: u8 = 11;

#[derive(BorshSerialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapBaseInArgs {
    pub amount_in: u64,
    pub minimum_amount_out: u64,
}

#[derive(BorshSerialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapBaseOutArgs {
    pub max_amount_in: u64,
    pub amount_out: u64,
}

/// User-side accounts of a swap
#[derive(Debug, Clone, Copy)]
pub struct UserSwapAccounts {
    pub source: Pubkey,
    pub destination: Pubkey,
    pub owner: Pubkey,
}

/// Sell an exact input amount
pub fn swap_base_in(
    pool: &PoolDescriptor,
    user: &UserSwapAccounts,
    args: SwapBaseInArgs,
) -> SwapResult<Instruction> {
    Ok(Instruction {
        program_id: pool.program_id,
        accounts: swap_accounts(pool, user),
        data: encode(SWAP_BASE_IN_TAG, &args)?,
    })
}

/// Buy an exact output amount
pub fn swap_base_out(
    pool: &PoolDescriptor,
    user: &UserSwapAccounts,
    args: SwapBaseOutArgs,
) -> SwapResult<Instruction> {
    Ok(Instruction {
        program_id: pool.program_id,
        accounts: swap_accounts(pool, user),
        data: encode(SWAP_BASE_OUT_TAG, &args)?,
    })
}

fn encode<T: BorshSerialize>(tag: u8, args: &T) -> SwapResult<Vec<u8>> {
    let mut data = vec![tag];
    args.serialize(&mut data)
        .map_err(|e| SwapError::Transaction(format!("Failed to encode swap arguments: {}", e)))?;
    Ok(data)
}

fn swap_accounts(pool: &PoolDescriptor, user: &UserSwapAccounts) -> Vec<AccountMeta> {
    vec![
        AccountMeta::new_readonly(spl_token::id(), false),
        AccountMeta::new(pool.id, false),
        AccountMeta::new_readonly(pool.authority, false),
        AccountMeta::new(pool.open_orders, false),
        AccountMeta::new(pool.target_orders, false),
        AccountMeta::new(pool.base_vault, false),
        AccountMeta::new(pool.quote_vault, false),
        AccountMeta::new_readonly(pool.market_program_id, false),
        AccountMeta::new(pool.market_id, false),
        AccountMeta::new(pool.market_bids, false),
        AccountMeta::new(pool.market_asks, false),
        AccountMeta::new(pool.market_event_queue, false),
        AccountMeta::new(pool.market_base_vault, false),
        AccountMeta::new(pool.market_quote_vault, false),
        AccountMeta::new_readonly(pool.market_authority, false),
        AccountMeta::new(user.source, false),
        AccountMeta::new(user.destination, false),
        AccountMeta::new_readonly(user.owner, true),
    ]
}
