#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use raydium_swap_math::rate_from_bps;
use raydium_swapper::{
    builder::SwapDirection, config::FeeSettings, LedgerClient, LedgerError, PoolDescriptor,
    PoolKeyRegistry, PreparedTransaction, RetryConfig, ScheduleConfig, SignatureOutcome,
    SimulationReport, SwapDetailReporter, SwapPlan, SwapScheduler, SwapTransactionBuilder,
};
use solana_sdk::{hash::Hash, pubkey::Pubkey, signature::Keypair, signature::Signature};

/// Ledger fake whose broadcast behaviour is scripted per test
#[derive(Default)]
pub struct ScriptedLedger {
    balances: HashMap<Pubkey, u64>,
    /// Broadcasts that fail with a transient error before one succeeds
    transient_failures: Mutex<u32>,
    /// Every broadcast is rejected outright
    reject_all: bool,
    confirmed: Mutex<HashSet<Signature>>,
    /// The first blockhash handed out expires before anything lands
    expire_first_blockhash: bool,
    expired: Mutex<Option<Hash>>,
    pub sends: AtomicU32,
    pub simulations: AtomicU32,
    pub balance_reads: AtomicU32,
}

impl ScriptedLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_balance(mut self, account: Pubkey, amount: u64) -> Self {
        self.balances.insert(account, amount);
        self
    }

    pub fn with_transient_failures(self, failures: u32) -> Self {
        *self.transient_failures.lock().unwrap() = failures;
        self
    }

    pub fn rejecting(mut self) -> Self {
        self.reject_all = true;
        self
    }

    pub fn expiring_first_blockhash(mut self) -> Self {
        self.expire_first_blockhash = true;
        self
    }

    pub fn sends(&self) -> u32 {
        self.sends.load(Ordering::SeqCst)
    }

    pub fn simulations(&self) -> u32 {
        self.simulations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LedgerClient for ScriptedLedger {
    async fn latest_blockhash(&self) -> Result<Hash, LedgerError> {
        let blockhash = Hash::new_unique();
        if self.expire_first_blockhash {
            self.expired.lock().unwrap().get_or_insert(blockhash);
        }
        Ok(blockhash)
    }

    async fn is_blockhash_valid(&self, blockhash: &Hash) -> Result<bool, LedgerError> {
        Ok(*self.expired.lock().unwrap() != Some(*blockhash))
    }

    async fn token_account_balance(&self, account: &Pubkey) -> Result<u64, LedgerError> {
        self.balance_reads.fetch_add(1, Ordering::SeqCst);
        self.balances
            .get(account)
            .copied()
            .ok_or_else(|| LedgerError::Rejected(format!("could not find account {}", account)))
    }

    async fn send_transaction(&self, tx: &PreparedTransaction) -> Result<Signature, LedgerError> {
        self.sends.fetch_add(1, Ordering::SeqCst);
        if self.reject_all {
            return Err(LedgerError::Rejected("custom program error: 0x1e".to_string()));
        }
        if *self.expired.lock().unwrap() == Some(tx.recent_blockhash()) {
            return Err(LedgerError::Transient("Blockhash not found".to_string()));
        }
        {
            let mut remaining = self.transient_failures.lock().unwrap();
            if *remaining > 0 {
                *remaining -= 1;
                return Err(LedgerError::Transient("connection reset".to_string()));
            }
        }
        let signature = tx.signature();
        self.confirmed.lock().unwrap().insert(signature);
        Ok(signature)
    }

    async fn signature_status(
        &self,
        signature: &Signature,
    ) -> Result<Option<SignatureOutcome>, LedgerError> {
        Ok(self
            .confirmed
            .lock()
            .unwrap()
            .contains(signature)
            .then_some(SignatureOutcome::Confirmed))
    }

    async fn simulate_transaction(
        &self,
        _tx: &PreparedTransaction,
    ) -> Result<SimulationReport, LedgerError> {
        self.simulations.fetch_add(1, Ordering::SeqCst);
        Ok(SimulationReport {
            err: None,
            logs: vec!["Program log: ray_log".to_string()],
            units_consumed: Some(31_000),
        })
    }
}

/// SOL/USDC-like pool: 9 and 6 decimals
pub fn pool(static_reserves: Option<(u64, u64)>) -> PoolDescriptor {
    let key = || Pubkey::new_unique().to_string();
    let mut raw = serde_json::json!({
        "id": key(), "baseMint": key(), "quoteMint": key(),
        "baseDecimals": 9, "quoteDecimals": 6,
        "programId": key(), "authority": key(), "openOrders": key(),
        "targetOrders": key(), "baseVault": key(), "quoteVault": key(),
        "marketProgramId": key(), "marketId": key(), "marketAuthority": key(),
        "marketBaseVault": key(), "marketQuoteVault": key(), "marketBids": key(),
        "marketAsks": key(), "marketEventQueue": key()
    });
    if let Some((base, quote)) = static_reserves {
        raw["baseReserve"] = base.into();
        raw["quoteReserve"] = quote.into();
    }
    serde_json::from_value(raw).unwrap()
}

pub fn plan(pool: &PoolDescriptor, execute: bool) -> SwapPlan {
    SwapPlan {
        token_a: pool.base_mint.to_string(),
        token_b: pool.quote_mint.to_string(),
        direction: SwapDirection::In,
        execute,
        use_versioned_encoding: true,
        max_retries: 5,
        max_fee_budget: 1_000_000,
        explorer_tx_url: "https://solscan.io/tx/".to_string(),
    }
}

pub fn schedule() -> ScheduleConfig {
    ScheduleConfig {
        enabled: true,
        min_amount: 0.001,
        max_amount: 0.01,
        min_interval_secs: 1,
        max_interval_secs: 2,
    }
}

pub fn scheduler(
    pools: Vec<PoolDescriptor>,
    ledger: Arc<ScriptedLedger>,
    plan: SwapPlan,
    report_path: &Path,
) -> SwapScheduler<ScriptedLedger> {
    let builder = SwapTransactionBuilder::new(
        Arc::new(Keypair::new()),
        rate_from_bps(100),
        FeeSettings::default(),
    );
    SwapScheduler::new(
        Arc::new(PoolKeyRegistry::from_descriptors(pools)),
        ledger,
        builder,
        SwapDetailReporter::new(report_path),
        plan,
        RetryConfig::default(),
        schedule(),
    )
}
