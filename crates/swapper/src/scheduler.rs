//! Swap cycle driver
//!
//! One cycle resolves the pool, reads reserves, builds a signed swap and then
//! either broadcasts and reports it or simulates it. [`SwapScheduler::run_until`]
//! repeats cycles with random amounts and pauses; a failed cycle is logged and
//! never ends the loop.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use raydium_swap_math::RationalAmount;
use rand::Rng;
use solana_sdk::{pubkey::Pubkey, signature::Signature};
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::builder::{PoolReserves, SwapDirection, SwapRequest, SwapTransactionBuilder};
use crate::config::{RetryConfig, ScheduleConfig, SwapperConfig, AMOUNT_PRECISION_DIGITS};
use crate::error::{SwapError, SwapResult};
use crate::ledger::{LedgerClient, SimulationReport};
use crate::pool_registry::{PoolDescriptor, PoolKeyRegistry};
use crate::reporter::{explorer_url, FinalReport, SwapDetailReporter};
use crate::submitter::TransactionSubmitter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CyclePhase {
    Idle,
    Resolving,
    Building,
    Executing,
    Reporting,
    Simulating,
    Sleeping,
}

impl fmt::Display for CyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CyclePhase::Idle => "idle",
            CyclePhase::Resolving => "resolving",
            CyclePhase::Building => "building",
            CyclePhase::Executing => "executing",
            CyclePhase::Reporting => "reporting",
            CyclePhase::Simulating => "simulating",
            CyclePhase::Sleeping => "sleeping",
        };
        f.write_str(name)
    }
}

/// What every cycle trades and how
#[derive(Debug, Clone)]
pub struct SwapPlan {
    pub token_a: String,
    /// Output token
    pub token_b: String,
    pub direction: SwapDirection,
    pub execute: bool,
    pub use_versioned_encoding: bool,
    pub max_retries: u32,
    pub max_fee_budget: u64,
    pub explorer_tx_url: String,
}

impl SwapPlan {
    pub fn from_config(config: &SwapperConfig) -> Self {
        Self {
            token_a: config.swap.token_a.clone(),
            token_b: config.swap.token_b.clone(),
            direction: config.swap.direction,
            execute: config.execute_swap,
            use_versioned_encoding: config.use_versioned_transaction,
            max_retries: config.max_retries,
            max_fee_budget: config.max_fee_budget_lamports,
            explorer_tx_url: config.explorer_tx_url.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum CycleOutcome {
    Executed {
        signature: Signature,
        report: FinalReport,
    },
    Simulated(SimulationReport),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub cycles: u64,
    pub succeeded: u64,
    pub failed: u64,
}

pub struct SwapScheduler<L: LedgerClient> {
    registry: Arc<PoolKeyRegistry>,
    ledger: Arc<L>,
    builder: SwapTransactionBuilder,
    submitter: TransactionSubmitter<L>,
    reporter: SwapDetailReporter,
    plan: SwapPlan,
    schedule: ScheduleConfig,
    phase: CyclePhase,
    stats: SchedulerStats,
}

impl<L: LedgerClient> SwapScheduler<L> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        registry: Arc<PoolKeyRegistry>,
        ledger: Arc<L>,
        builder: SwapTransactionBuilder,
        reporter: SwapDetailReporter,
        plan: SwapPlan,
        retry: RetryConfig,
        schedule: ScheduleConfig,
    ) -> Self {
        Self {
            submitter: TransactionSubmitter::new(ledger.clone(), retry),
            registry,
            ledger,
            builder,
            reporter,
            plan,
            schedule,
            phase: CyclePhase::Idle,
            stats: SchedulerStats::default(),
        }
    }

    pub fn stats(&self) -> SchedulerStats {
        self.stats
    }

    pub fn phase(&self) -> CyclePhase {
        self.phase
    }

    /// Run cycles until `shutdown` resolves
    ///
    /// Shutdown is only observed between cycles, so an in-flight swap always
    /// finishes; the pause after it is cut short.
    pub async fn run_until<F, R>(&mut self, shutdown: F, rng: &mut R) -> SchedulerStats
    where
        F: Future<Output = ()>,
        R: Rng + ?Sized,
    {
        tokio::pin!(shutdown);

        loop {
            let amount = sample_amount(&self.schedule, rng);
            // Errors are already logged and counted
            let _ = self.run_logged(amount).await;

            let pause = sample_pause(&self.schedule, rng);
            self.enter(CyclePhase::Sleeping);
            debug!("Sleeping {:?} before the next cycle", pause);

            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested, stopping after {} cycle(s)", self.stats.cycles);
                    break;
                }
                _ = sleep(pause) => {}
            }
            self.enter(CyclePhase::Idle);
        }

        self.enter(CyclePhase::Idle);
        self.stats
    }

    /// Run one cycle, log its outcome and count it
    pub async fn run_logged(&mut self, amount: RationalAmount) -> SwapResult<CycleOutcome> {
        self.stats.cycles += 1;
        let cycle = self.stats.cycles;
        info!(
            "Cycle {}: swapping {} ({}) of {} for {}",
            cycle,
            amount.to_decimal_string(AMOUNT_PRECISION_DIGITS),
            self.plan.direction,
            self.plan.token_a,
            self.plan.token_b
        );

        let result = self.run_cycle(amount).await;
        match &result {
            Ok(CycleOutcome::Executed { report, .. }) => {
                self.stats.succeeded += 1;
                info!("Cycle {} executed: {}", cycle, report.sol_scan_url);
            }
            Ok(CycleOutcome::Simulated(simulation)) => {
                self.stats.succeeded += 1;
                info!(
                    "Cycle {} simulated: err={:?} units={:?}",
                    cycle, simulation.err, simulation.units_consumed
                );
            }
            Err(e) => {
                self.stats.failed += 1;
                error!("Cycle {} failed: {}", cycle, e);
            }
        }
        result
    }

    /// Resolve, build and execute or simulate a single swap
    pub async fn run_cycle(&mut self, amount: RationalAmount) -> SwapResult<CycleOutcome> {
        self.enter(CyclePhase::Resolving);
        let registry = self.registry.clone();
        let pool = registry
            .find_pool_info_for_tokens(&self.plan.token_a, &self.plan.token_b)
            .ok_or_else(|| SwapError::PoolNotFound {
                token_a: self.plan.token_a.clone(),
                token_b: self.plan.token_b.clone(),
            })?;
        let output_token = output_mint(pool, &self.plan.token_b)?;
        debug!("Resolved pool {} (output {})", pool.id, output_token);

        self.enter(CyclePhase::Building);
        let reserves = self.reserves(pool).await?;
        let blockhash = self.ledger.latest_blockhash().await?;
        let request = SwapRequest {
            pool,
            reserves,
            direction: self.plan.direction,
            amount,
            output_token,
            max_fee_budget: self.plan.max_fee_budget,
            use_versioned_encoding: self.plan.use_versioned_encoding,
        };
        let (tx, details) = self.builder.build(&request, blockhash)?;
        debug!(
            "Quote: in {} out {} min out {} impact {}",
            details.amount_in, details.amount_out, details.min_amount_out, details.price_impact
        );

        if !self.plan.execute {
            self.enter(CyclePhase::Simulating);
            let simulation = self.submitter.simulate(&tx).await?;
            if let Some(err) = &simulation.err {
                warn!("Simulation reported an error: {}", err);
                if let Ok(encoded) = tx.to_base64() {
                    debug!("Simulated transaction: {}", encoded);
                }
            }
            for line in &simulation.logs {
                debug!("{}", line);
            }
            return Ok(CycleOutcome::Simulated(simulation));
        }

        self.enter(CyclePhase::Executing);
        let builder = &self.builder;
        let signature = self
            .submitter
            .send(tx, self.plan.max_retries, |blockhash| {
                builder.build(&request, blockhash).map(|(tx, _)| tx)
            })
            .await?;

        self.enter(CyclePhase::Reporting);
        let url = explorer_url(&self.plan.explorer_tx_url, &signature);
        let report = self.reporter.report(&details, url)?;
        Ok(CycleOutcome::Executed { signature, report })
    }

    /// Static reserves when the dataset carries them, vault balances otherwise
    ///
    /// Vault balances leave out funds parked in the OpenBook open orders and
    /// pending PnL, so quotes on pools with resting orders are approximate.
    async fn reserves(&self, pool: &PoolDescriptor) -> SwapResult<PoolReserves> {
        if let Some((base, quote)) = pool.static_reserves() {
            return Ok(PoolReserves { base, quote });
        }
        let base = self.ledger.token_account_balance(&pool.base_vault).await?;
        let quote = self.ledger.token_account_balance(&pool.quote_vault).await?;
        Ok(PoolReserves { base, quote })
    }

    fn enter(&mut self, phase: CyclePhase) {
        if self.phase != phase {
            debug!("Phase {} -> {}", self.phase, phase);
            self.phase = phase;
        }
    }
}

/// Pool mint matching the requested output token
fn output_mint(pool: &PoolDescriptor, token: &str) -> SwapResult<Pubkey> {
    let candidates = [pool.base_mint, pool.quote_mint];
    candidates
        .iter()
        .find(|mint| mint.to_string() == token)
        .or_else(|| {
            candidates
                .iter()
                .find(|mint| mint.to_string().eq_ignore_ascii_case(token))
        })
        .copied()
        .ok_or_else(|| {
            SwapError::Config(format!("Token {} is not part of pool {}", token, pool.id))
        })
}

/// Uniform amount in the configured range, on a 10^-9 grid
pub fn sample_amount<R: Rng + ?Sized>(schedule: &ScheduleConfig, rng: &mut R) -> RationalAmount {
    let (min, max) = schedule.amount_range_units();
    let units = rng.gen_range(min..=max.max(min));
    RationalAmount::from_raw_units(units, AMOUNT_PRECISION_DIGITS as u8)
}

/// Uniform pause in the configured range, millisecond resolution
pub fn sample_pause<R: Rng + ?Sized>(schedule: &ScheduleConfig, rng: &mut R) -> Duration {
    let min = schedule.min_interval_secs.saturating_mul(1_000);
    let max = schedule.max_interval_secs.saturating_mul(1_000).max(min);
    Duration::from_millis(rng.gen_range(min..=max))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    fn schedule(min_amount: f64, max_amount: f64) -> ScheduleConfig {
        ScheduleConfig {
            enabled: true,
            min_amount,
            max_amount,
            min_interval_secs: 5,
            max_interval_secs: 10,
        }
    }

    #[test]
    fn test_sample_amount_stays_on_grid() {
        let mut rng = StdRng::seed_from_u64(7);
        let schedule = schedule(0.001, 0.002);
        let low = RationalAmount::new(1, 1_000).unwrap();
        let high = RationalAmount::new(2, 1_000).unwrap();

        for _ in 0..200 {
            let amount = sample_amount(&schedule, &mut rng);
            assert!(amount >= low && amount <= high);
            assert_eq!(amount.floor_to_units(9), amount);
        }
    }

    #[test]
    fn test_degenerate_range() {
        let mut rng = StdRng::seed_from_u64(1);
        let amount = sample_amount(&schedule(0.5, 0.5), &mut rng);
        assert_eq!(amount, RationalAmount::new(1, 2).unwrap());
    }

    #[test]
    fn test_sample_pause_bounds() {
        let mut rng = StdRng::seed_from_u64(3);
        let schedule = schedule(0.1, 0.2);
        for _ in 0..200 {
            let pause = sample_pause(&schedule, &mut rng);
            assert!(pause >= Duration::from_secs(5) && pause <= Duration::from_secs(10));
        }
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(CyclePhase::Resolving.to_string(), "resolving");
        assert_eq!(CyclePhase::Sleeping.to_string(), "sleeping");
    }
}
