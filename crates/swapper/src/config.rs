use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use raydium_swap_math::{rate_from_bps, RationalAmount};
use serde::{Deserialize, Serialize};

use crate::builder::SwapDirection;
use crate::error::{SwapError, SwapResult};
use crate::wallet::WalletSource;

/// Fractional digits kept when sampling swap amounts
pub const AMOUNT_PRECISION_DIGITS: u32 = 9;

/// Upper bound for the fixed delay between submission attempts
const MAX_RETRY_DELAY_MS: u64 = 5_000;

/// Swapper configuration loaded from TOML file
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SwapperConfig {
    /// Solana RPC endpoint
    pub rpc_url: String,

    /// Pool dataset location, a file path or an http(s) URL
    pub liquidity_source: String,

    /// Broadcast swaps when true, simulate them otherwise
    pub execute_swap: bool,

    /// Encode transactions as v0 instead of legacy
    pub use_versioned_transaction: bool,

    /// Total submission attempts per swap
    pub max_retries: u32,

    /// Hard cap on the estimated network fee of one swap (lamports)
    pub max_fee_budget_lamports: u64,

    /// Where the final report of an executed swap is written
    pub report_path: PathBuf,

    /// Explorer prefix the transaction signature is appended to
    pub explorer_tx_url: String,

    /// Wallet used when the CLI does not select one
    pub default_wallet: u8,

    /// Pair, direction and amount of the swap
    pub swap: SwapSettings,

    /// Compute budget settings
    pub fees: FeeSettings,

    /// Submission retry configuration
    pub retry: RetryConfig,

    /// Perpetual loop configuration
    pub schedule: ScheduleConfig,

    /// Credential sources keyed by wallet number
    pub wallets: BTreeMap<String, WalletSource>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SwapSettings {
    /// Token sold in `in` direction
    pub token_a: String,

    /// Output token
    pub token_b: String,

    pub direction: SwapDirection,

    /// Decimal amount used by single-shot runs
    pub amount: String,

    /// Slippage tolerance in basis points
    pub slippage_bps: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FeeSettings {
    pub compute_unit_limit: u32,
    pub compute_unit_price_micro_lamports: u64,
}

/// Retry configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Fixed delay between submission attempts in milliseconds
    pub retry_delay_ms: u64,

    /// How long one broadcast may stay unconfirmed
    pub confirm_timeout_secs: u64,

    /// Signature status polling interval in milliseconds
    pub poll_interval_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Run the perpetual loop instead of a single swap
    pub enabled: bool,

    pub min_amount: f64,
    pub max_amount: f64,

    pub min_interval_secs: u64,
    pub max_interval_secs: u64,
}

impl SwapperConfig {
    /// Load configuration from TOML file
    pub fn load(path: impl AsRef<Path>) -> SwapResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            SwapError::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content).map_err(|e| match e {
            SwapError::Config(msg) => SwapError::Config(format!("{}: {}", path.display(), msg)),
            other => other,
        })
    }

    /// Parse without validating; overrides are applied before `validate`
    pub fn from_toml_str(content: &str) -> SwapResult<Self> {
        toml::from_str(content)
            .map_err(|e| SwapError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Validate configuration
    pub fn validate(&self) -> SwapResult<()> {
        if self.rpc_url.is_empty() {
            return Err(invalid("rpc_url", "empty", "an RPC endpoint"));
        }

        if self.liquidity_source.is_empty() {
            return Err(invalid("liquidity_source", "empty", "a file path or URL"));
        }

        if self.max_retries == 0 {
            return Err(invalid("max_retries", "0", "greater than 0"));
        }

        if self.report_path.as_os_str().is_empty() {
            return Err(invalid("report_path", "empty", "a file path"));
        }

        self.swap.validate()?;
        self.fees.validate()?;
        self.retry.validate()?;
        if self.schedule.enabled {
            self.schedule.validate()?;
        }

        Ok(())
    }

    /// Slippage tolerance as an exact fraction
    pub fn slippage_tolerance(&self) -> RationalAmount {
        rate_from_bps(self.swap.slippage_bps)
    }
}

impl SwapSettings {
    fn validate(&self) -> SwapResult<()> {
        if self.token_a.is_empty() || self.token_b.is_empty() {
            return Err(invalid("swap.token_a/token_b", "empty", "two token mint addresses"));
        }

        if self.token_a == self.token_b {
            return Err(invalid("swap.token_b", &self.token_b, "a token different from token_a"));
        }

        if self.slippage_bps >= 10_000 {
            return Err(invalid(
                "swap.slippage_bps",
                &self.slippage_bps.to_string(),
                "less than 10000 (100%)",
            ));
        }

        Ok(())
    }

    /// Exact single-shot amount
    pub fn amount(&self) -> SwapResult<RationalAmount> {
        let amount = RationalAmount::from_decimal_str(&self.amount)
            .map_err(|e| invalid("swap.amount", &self.amount, &e.to_string()))?;
        if !amount.is_positive() {
            return Err(invalid("swap.amount", &self.amount, "greater than 0"));
        }
        Ok(amount)
    }
}

impl FeeSettings {
    fn validate(&self) -> SwapResult<()> {
        if self.compute_unit_limit == 0 {
            return Err(invalid("fees.compute_unit_limit", "0", "greater than 0"));
        }
        Ok(())
    }

    /// Priority fee implied by the compute budget, rounded up to whole lamports
    pub fn priority_fee_lamports(&self) -> u64 {
        let micro_lamports =
            self.compute_unit_limit as u128 * self.compute_unit_price_micro_lamports as u128;
        let lamports = micro_lamports.div_ceil(1_000_000);
        u64::try_from(lamports).unwrap_or(u64::MAX)
    }
}

impl RetryConfig {
    /// Validate retry configuration
    fn validate(&self) -> SwapResult<()> {
        if self.retry_delay_ms > MAX_RETRY_DELAY_MS {
            return Err(invalid(
                "retry.retry_delay_ms",
                &self.retry_delay_ms.to_string(),
                &format!("at most {}", MAX_RETRY_DELAY_MS),
            ));
        }

        if self.confirm_timeout_secs == 0 {
            return Err(invalid("retry.confirm_timeout_secs", "0", "greater than 0"));
        }

        if self.poll_interval_ms == 0 {
            return Err(invalid("retry.poll_interval_ms", "0", "greater than 0"));
        }

        Ok(())
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn confirm_timeout(&self) -> Duration {
        Duration::from_secs(self.confirm_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl ScheduleConfig {
    fn validate(&self) -> SwapResult<()> {
        let (min, max) = self.amount_range_units();
        if min == 0 {
            return Err(invalid(
                "schedule.min_amount",
                &self.min_amount.to_string(),
                "at least 0.000000001",
            ));
        }

        if max < min {
            return Err(invalid(
                "schedule.max_amount",
                &self.max_amount.to_string(),
                &format!("greater than or equal to min_amount ({})", self.min_amount),
            ));
        }

        if self.max_interval_secs < self.min_interval_secs {
            return Err(invalid(
                "schedule.max_interval_secs",
                &self.max_interval_secs.to_string(),
                &format!(
                    "greater than or equal to min_interval_secs ({})",
                    self.min_interval_secs
                ),
            ));
        }

        Ok(())
    }

    /// Amount bounds in units of 10^-9
    pub fn amount_range_units(&self) -> (u64, u64) {
        let scale = 10f64.powi(AMOUNT_PRECISION_DIGITS as i32);
        let to_units = |value: f64| {
            if value.is_finite() && value > 0.0 {
                (value * scale).round() as u64
            } else {
                0
            }
        };
        (to_units(self.min_amount), to_units(self.max_amount))
    }
}

fn invalid(parameter: &str, value: &str, expected: &str) -> SwapError {
    SwapError::Config(format!(
        "Invalid parameter '{}': got {}, expected {}",
        parameter, value, expected
    ))
}

impl Default for SwapperConfig {
    fn default() -> Self {
        Self {
            rpc_url: "https://api.mainnet-beta.solana.com".to_string(),
            liquidity_source: "https://api.raydium.io/v2/sdk/liquidity/mainnet.json".to_string(),
            execute_swap: false,
            use_versioned_transaction: true,
            max_retries: 20,
            max_fee_budget_lamports: 1_000_000, // 0.001 SOL
            report_path: PathBuf::from("swapDetails.json"),
            explorer_tx_url: "https://solscan.io/tx/".to_string(),
            default_wallet: 1,
            swap: SwapSettings::default(),
            fees: FeeSettings::default(),
            retry: RetryConfig::default(),
            schedule: ScheduleConfig::default(),
            wallets: BTreeMap::new(),
        }
    }
}

impl Default for SwapSettings {
    fn default() -> Self {
        Self {
            token_a: "So11111111111111111111111111111111111111112".to_string(),
            token_b: "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v".to_string(),
            direction: SwapDirection::In,
            amount: "0.01".to_string(),
            slippage_bps: 100, // 1%
        }
    }
}

impl Default for FeeSettings {
    fn default() -> Self {
        Self {
            compute_unit_limit: 200_000,
            compute_unit_price_micro_lamports: 100_000,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            retry_delay_ms: 500,
            confirm_timeout_secs: 60,
            poll_interval_ms: 1_000,
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            min_amount: 0.0001,
            max_amount: 0.0005,
            min_interval_secs: 60,
            max_interval_secs: 300,
        }
    }
}
