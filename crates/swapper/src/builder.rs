//! Swap quoting and transaction assembly
//!
//! The builder turns a [`SwapRequest`] into exact [`SwapDetails`] and a fully
//! signed [`PreparedTransaction`]. Quoting is pure; the only inputs from the
//! chain are the reserves and the recent blockhash passed in by the caller.

use std::fmt;
use std::sync::Arc;

use base64::{engine::general_purpose, Engine};
use raydium_swap_math::{
    amount_in_for_exact_out, amount_out_for_exact_in, apply_slippage_down, apply_slippage_up,
    fee_on_input, price_impact, CurveReserves, MathError, RationalAmount,
};
use serde::{Deserialize, Serialize};
use solana_sdk::{
    compute_budget::ComputeBudgetInstruction,
    hash::Hash,
    instruction::Instruction,
    message::{v0, VersionedMessage},
    packet::PACKET_DATA_SIZE,
    pubkey::Pubkey,
    signature::{Keypair, Signature},
    signer::Signer,
    system_instruction,
    transaction::{Transaction, VersionedTransaction},
};
use spl_associated_token_account::{
    get_associated_token_address, instruction::create_associated_token_account_idempotent,
};
use tracing::debug;

use crate::amm_instruction::{
    swap_base_in, swap_base_out, SwapBaseInArgs, SwapBaseOutArgs, UserSwapAccounts,
};
use crate::config::FeeSettings;
use crate::error::{SwapError, SwapResult};
use crate::pool_registry::PoolDescriptor;

/// Base fee charged per transaction signature
pub const LAMPORTS_PER_SIGNATURE: u64 = 5_000;

/// Which side of the trade the caller fixes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SwapDirection {
    /// The amount is the exact input
    In,
    /// The amount is the desired output; the input is solved backward
    Out,
}

impl fmt::Display for SwapDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SwapDirection::In => write!(f, "in"),
            SwapDirection::Out => write!(f, "out"),
        }
    }
}

/// Raw vault balances of a pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolReserves {
    pub base: u64,
    pub quote: u64,
}

/// One swap to quote and assemble
#[derive(Debug, Clone)]
pub struct SwapRequest<'a> {
    pub pool: &'a PoolDescriptor,
    pub reserves: PoolReserves,
    pub direction: SwapDirection,
    /// Decimal token amount, input or output depending on `direction`
    pub amount: RationalAmount,
    pub output_token: Pubkey,
    /// Cap on the estimated network fee in lamports
    pub max_fee_budget: u64,
    pub use_versioned_encoding: bool,
}

/// Exact economics of a swap, amounts in token units and prices as output per input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapDetails {
    pub amount_in: RationalAmount,
    pub amount_out: RationalAmount,
    pub min_amount_out: RationalAmount,
    pub max_amount_in: RationalAmount,
    pub fee: RationalAmount,
    pub current_price: RationalAmount,
    pub execution_price: RationalAmount,
    pub price_impact: RationalAmount,
}

/// On-chain bounds of the swap instruction in raw units
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapLimits {
    ExactIn { amount_in: u64, minimum_amount_out: u64 },
    ExactOut { max_amount_in: u64, amount_out: u64 },
}

impl SwapLimits {
    /// Most the wallet can be charged
    pub fn max_input(&self) -> u64 {
        match self {
            SwapLimits::ExactIn { amount_in, .. } => *amount_in,
            SwapLimits::ExactOut { max_amount_in, .. } => *max_amount_in,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapQuote {
    pub input_mint: Pubkey,
    pub output_mint: Pubkey,
    pub details: SwapDetails,
    pub limits: SwapLimits,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionEncoding {
    Legacy,
    Versioned,
}

/// Signed transaction ready for broadcast or simulation
#[derive(Debug, Clone)]
pub enum PreparedTransaction {
    Legacy(Transaction),
    Versioned(VersionedTransaction),
}

impl PreparedTransaction {
    pub fn encoding(&self) -> TransactionEncoding {
        match self {
            PreparedTransaction::Legacy(_) => TransactionEncoding::Legacy,
            PreparedTransaction::Versioned(_) => TransactionEncoding::Versioned,
        }
    }

    /// Fee payer signature, which is also the transaction id
    pub fn signature(&self) -> Signature {
        let signatures = match self {
            PreparedTransaction::Legacy(tx) => &tx.signatures,
            PreparedTransaction::Versioned(tx) => &tx.signatures,
        };
        signatures.first().copied().unwrap_or_default()
    }

    pub fn recent_blockhash(&self) -> Hash {
        match self {
            PreparedTransaction::Legacy(tx) => tx.message.recent_blockhash,
            PreparedTransaction::Versioned(tx) => *tx.message.recent_blockhash(),
        }
    }

    pub fn is_fully_signed(&self) -> bool {
        match self {
            PreparedTransaction::Legacy(tx) => tx.is_signed() && tx.verify().is_ok(),
            PreparedTransaction::Versioned(tx) => {
                tx.verify_with_results().iter().all(|verified| *verified)
            }
        }
    }

    /// Wire bytes as sent to the cluster
    pub fn serialize(&self) -> SwapResult<Vec<u8>> {
        match self {
            PreparedTransaction::Legacy(tx) => bincode::serialize(tx),
            PreparedTransaction::Versioned(tx) => bincode::serialize(tx),
        }
        .map_err(|e| SwapError::Transaction(format!("Failed to serialize transaction: {}", e)))
    }

    pub fn serialized_size(&self) -> SwapResult<usize> {
        Ok(self.serialize()?.len())
    }

    /// Wire size, failing when it exceeds one network packet
    pub fn ensure_fits_packet(&self) -> SwapResult<usize> {
        let size = self.serialized_size()?;
        if size > PACKET_DATA_SIZE {
            return Err(SwapError::TransactionTooLarge {
                size,
                limit: PACKET_DATA_SIZE,
            });
        }
        Ok(size)
    }

    /// Base64 wire encoding, as accepted by `sendTransaction`/`simulateTransaction`
    pub fn to_base64(&self) -> SwapResult<String> {
        Ok(general_purpose::STANDARD.encode(self.serialize()?))
    }
}

pub struct SwapTransactionBuilder {
    payer: Arc<Keypair>,
    slippage: RationalAmount,
    fees: FeeSettings,
}

impl SwapTransactionBuilder {
    pub fn new(payer: Arc<Keypair>, slippage: RationalAmount, fees: FeeSettings) -> Self {
        Self {
            payer,
            slippage,
            fees,
        }
    }

    pub fn payer(&self) -> Pubkey {
        self.payer.pubkey()
    }

    /// Network fee the assembled transaction is expected to cost
    pub fn estimated_fee_lamports(&self) -> u64 {
        LAMPORTS_PER_SIGNATURE.saturating_add(self.fees.priority_fee_lamports())
    }

    /// Quote the swap and assemble a signed transaction
    pub fn build(
        &self,
        request: &SwapRequest<'_>,
        recent_blockhash: Hash,
    ) -> SwapResult<(PreparedTransaction, SwapDetails)> {
        let estimated = self.estimated_fee_lamports();
        if estimated > request.max_fee_budget {
            return Err(SwapError::FeeBudgetExceeded {
                estimated,
                budget: request.max_fee_budget,
            });
        }

        let quote = self.quote(request)?;
        let instructions = self.instructions(request.pool, &quote)?;
        let tx = self.sign(&instructions, recent_blockhash, request.use_versioned_encoding)?;

        let size = tx.ensure_fits_packet()?;

        debug!(
            "Built {:?} swap transaction {} ({} bytes, {} instructions)",
            tx.encoding(),
            tx.signature(),
            size,
            instructions.len()
        );
        Ok((tx, quote.details))
    }

    /// Exact swap economics without touching the chain
    pub fn quote(&self, request: &SwapRequest<'_>) -> SwapResult<SwapQuote> {
        let pool = request.pool;
        let output_mint = request.output_token;
        let input_mint = pool.counterpart(&output_mint).ok_or_else(|| {
            SwapError::Config(format!(
                "Output token {} is not part of pool {}",
                output_mint, pool.id
            ))
        })?;
        let input_is_base = input_mint == pool.base_mint;

        let (decimals_in, decimals_out) = if input_is_base {
            (pool.base_decimals, pool.quote_decimals)
        } else {
            (pool.quote_decimals, pool.base_decimals)
        };
        let (reserve_in, reserve_out) = if input_is_base {
            (request.reserves.base, request.reserves.quote)
        } else {
            (request.reserves.quote, request.reserves.base)
        };
        if reserve_in == 0 || reserve_out == 0 {
            return Err(SwapError::InsufficientLiquidity(format!(
                "Pool {} has an empty side (in {}, out {})",
                pool.id, reserve_in, reserve_out
            )));
        }

        let curve = CurveReserves::from_raw(reserve_in, reserve_out)?;
        let fee_rate = pool.trade_fee_rate()?;
        let unit_in = RationalAmount::from_raw_units(1, decimals_in);
        let unit_out = RationalAmount::from_raw_units(1, decimals_out);

        let (raw_in, raw_out, limits) = match request.direction {
            SwapDirection::In => {
                let amount_in = request.amount.to_raw_units_floor(decimals_in)?;
                if amount_in == 0 {
                    return Err(MathError::non_positive("amount_in", &request.amount).into());
                }
                let raw_in = RationalAmount::from(amount_in);
                let raw_out = amount_out_for_exact_in(&curve, &raw_in, &fee_rate)?;
                let minimum_amount_out =
                    apply_slippage_down(&raw_out, &self.slippage)?.to_raw_units_floor(0)?;
                if minimum_amount_out == 0 {
                    return Err(SwapError::InsufficientLiquidity(format!(
                        "Output of {} is below one unit after slippage",
                        raw_out
                    )));
                }
                (
                    raw_in,
                    raw_out,
                    SwapLimits::ExactIn {
                        amount_in,
                        minimum_amount_out,
                    },
                )
            }
            SwapDirection::Out => {
                let amount_out = request.amount.to_raw_units_floor(decimals_out)?;
                if amount_out == 0 {
                    return Err(MathError::non_positive("amount_out", &request.amount).into());
                }
                let raw_out = RationalAmount::from(amount_out);
                let raw_in = amount_in_for_exact_out(&curve, &raw_out, &fee_rate)?;
                let max_amount_in =
                    apply_slippage_up(&raw_in, &self.slippage)?.to_raw_units_ceil(0)?;
                (
                    raw_in,
                    raw_out,
                    SwapLimits::ExactOut {
                        max_amount_in,
                        amount_out,
                    },
                )
            }
        };

        let minimum_raw_out = RationalAmount::from(
            apply_slippage_down(&raw_out, &self.slippage)?.to_raw_units_floor(0)?,
        );
        let amount_in = &raw_in * &unit_in;
        let amount_out = &raw_out * &unit_out;
        let current_price = (&curve.spot_price()? * &unit_out).checked_div(&unit_in)?;
        let execution_price = amount_out.checked_div(&amount_in)?;

        let details = SwapDetails {
            fee: fee_on_input(&amount_in, &fee_rate)?,
            min_amount_out: &minimum_raw_out * &unit_out,
            max_amount_in: &RationalAmount::from(limits.max_input()) * &unit_in,
            price_impact: price_impact(&current_price, &execution_price)?,
            amount_in,
            amount_out,
            current_price,
            execution_price,
        };

        Ok(SwapQuote {
            input_mint,
            output_mint,
            details,
            limits,
        })
    }

    /// Compute budget, wrapped SOL handling, output account and the swap itself
    fn instructions(&self, pool: &PoolDescriptor, quote: &SwapQuote) -> SwapResult<Vec<Instruction>> {
        let owner = self.payer.pubkey();
        let token_program = spl_token::id();
        let native_mint = spl_token::native_mint::id();
        let source = get_associated_token_address(&owner, &quote.input_mint);
        let destination = get_associated_token_address(&owner, &quote.output_mint);

        let mut instructions = vec![
            ComputeBudgetInstruction::set_compute_unit_limit(self.fees.compute_unit_limit),
            ComputeBudgetInstruction::set_compute_unit_price(
                self.fees.compute_unit_price_micro_lamports,
            ),
        ];

        if quote.input_mint == native_mint {
            instructions.push(create_associated_token_account_idempotent(
                &owner,
                &owner,
                &native_mint,
                &token_program,
            ));
            instructions.push(system_instruction::transfer(
                &owner,
                &source,
                quote.limits.max_input(),
            ));
            instructions.push(
                spl_token::instruction::sync_native(&token_program, &source)
                    .map_err(|e| SwapError::Transaction(e.to_string()))?,
            );
        }

        instructions.push(create_associated_token_account_idempotent(
            &owner,
            &owner,
            &quote.output_mint,
            &token_program,
        ));

        let user = UserSwapAccounts {
            source,
            destination,
            owner,
        };
        instructions.push(match quote.limits {
            SwapLimits::ExactIn {
                amount_in,
                minimum_amount_out,
            } => swap_base_in(
                pool,
                &user,
                SwapBaseInArgs {
                    amount_in,
                    minimum_amount_out,
                },
            )?,
            SwapLimits::ExactOut {
                max_amount_in,
                amount_out,
            } => swap_base_out(
                pool,
                &user,
                SwapBaseOutArgs {
                    max_amount_in,
                    amount_out,
                },
            )?,
        });

        // Unwrap any wrapped SOL left on either side
        for (mint, account) in [(quote.input_mint, source), (quote.output_mint, destination)] {
            if mint == native_mint {
                instructions.push(
                    spl_token::instruction::close_account(
                        &token_program,
                        &account,
                        &owner,
                        &owner,
                        &[],
                    )
                    .map_err(|e| SwapError::Transaction(e.to_string()))?,
                );
            }
        }

        Ok(instructions)
    }

    fn sign(
        &self,
        instructions: &[Instruction],
        recent_blockhash: Hash,
        versioned: bool,
    ) -> SwapResult<PreparedTransaction> {
        let payer = self.payer.pubkey();
        if !versioned {
            return Ok(PreparedTransaction::Legacy(
                Transaction::new_signed_with_payer(
                    instructions,
                    Some(&payer),
                    &[self.payer.as_ref()],
                    recent_blockhash,
                ),
            ));
        }

        let message = v0::Message::try_compile(&payer, instructions, &[], recent_blockhash)
            .map_err(|e| SwapError::Transaction(format!("Failed to compile v0 message: {}", e)))?;
        let tx = VersionedTransaction::try_new(VersionedMessage::V0(message), &[self.payer.as_ref()])
            .map_err(|e| SwapError::Transaction(format!("Failed to sign transaction: {}", e)))?;
        Ok(PreparedTransaction::Versioned(tx))
    }
}
