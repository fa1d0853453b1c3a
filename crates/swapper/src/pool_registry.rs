//! Pool descriptor dataset and token-pair lookup
//!
//! The dataset is loaded once at startup and never mutated afterwards, so a
//! shared `Arc<PoolKeyRegistry>` can be read from anywhere without locking.

use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;

use raydium_swap_math::RationalAmount;
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use tracing::{debug, info};

use crate::error::{SwapError, SwapResult};

/// Raydium AMM v4 trade fee (0.25%)
pub const DEFAULT_TRADE_FEE_NUMERATOR: u64 = 25;
pub const DEFAULT_TRADE_FEE_DENOMINATOR: u64 = 10_000;

/// Static metadata of one AMM v4 pool and its OpenBook market
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolDescriptor {
    #[serde(with = "pubkey_serde")]
    pub id: Pubkey,
    #[serde(with = "pubkey_serde")]
    pub base_mint: Pubkey,
    #[serde(with = "pubkey_serde")]
    pub quote_mint: Pubkey,
    pub base_decimals: u8,
    pub quote_decimals: u8,
    #[serde(with = "pubkey_serde")]
    pub program_id: Pubkey,
    #[serde(with = "pubkey_serde")]
    pub authority: Pubkey,
    #[serde(with = "pubkey_serde")]
    pub open_orders: Pubkey,
    #[serde(with = "pubkey_serde")]
    pub target_orders: Pubkey,
    #[serde(with = "pubkey_serde")]
    pub base_vault: Pubkey,
    #[serde(with = "pubkey_serde")]
    pub quote_vault: Pubkey,
    #[serde(with = "pubkey_serde")]
    pub market_program_id: Pubkey,
    #[serde(with = "pubkey_serde")]
    pub market_id: Pubkey,
    #[serde(with = "pubkey_serde")]
    pub market_authority: Pubkey,
    #[serde(with = "pubkey_serde")]
    pub market_base_vault: Pubkey,
    #[serde(with = "pubkey_serde")]
    pub market_quote_vault: Pubkey,
    #[serde(with = "pubkey_serde")]
    pub market_bids: Pubkey,
    #[serde(with = "pubkey_serde")]
    pub market_asks: Pubkey,
    #[serde(with = "pubkey_serde")]
    pub market_event_queue: Pubkey,
    #[serde(default)]
    pub trade_fee_numerator: Option<u64>,
    #[serde(default)]
    pub trade_fee_denominator: Option<u64>,
    /// Fixed reserves for offline quoting; vault balances are read otherwise
    #[serde(default)]
    pub base_reserve: Option<u64>,
    #[serde(default)]
    pub quote_reserve: Option<u64>,
}

impl PoolDescriptor {
    /// Trade fee applied to the input leg
    pub fn trade_fee_rate(&self) -> SwapResult<RationalAmount> {
        let numerator = self.trade_fee_numerator.unwrap_or(DEFAULT_TRADE_FEE_NUMERATOR);
        let denominator = self
            .trade_fee_denominator
            .unwrap_or(DEFAULT_TRADE_FEE_DENOMINATOR);
        Ok(RationalAmount::new(numerator, denominator)?)
    }

    pub fn static_reserves(&self) -> Option<(u64, u64)> {
        self.base_reserve.zip(self.quote_reserve)
    }

    /// Mint on the other side of the pool
    pub fn counterpart(&self, mint: &Pubkey) -> Option<Pubkey> {
        if &self.base_mint == mint {
            Some(self.quote_mint)
        } else if &self.quote_mint == mint {
            Some(self.base_mint)
        } else {
            None
        }
    }
}

/// Where the dataset is read from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolSource {
    File(PathBuf),
    Url(String),
}

impl PoolSource {
    pub fn parse(location: &str) -> Self {
        if location.starts_with("http://") || location.starts_with("https://") {
            PoolSource::Url(location.to_string())
        } else {
            PoolSource::File(PathBuf::from(location))
        }
    }
}

impl std::fmt::Display for PoolSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PoolSource::File(path) => write!(f, "{}", path.display()),
            PoolSource::Url(url) => write!(f, "{}", url),
        }
    }
}

/// Raydium publishes official and unofficial pools in separate arrays
///
/// At least one of the two arrays must be present; any other object is not
/// a liquidity dataset.
#[derive(Deserialize)]
#[serde(untagged)]
enum PoolDataset {
    Split {
        official: Option<Vec<PoolDescriptor>>,
        #[serde(rename = "unOfficial")]
        un_official: Option<Vec<PoolDescriptor>>,
    },
    Flat(Vec<PoolDescriptor>),
}

/// In-memory index of pool descriptors keyed by unordered token pair
#[derive(Debug, Default)]
pub struct PoolKeyRegistry {
    pools: Vec<PoolDescriptor>,
    by_mints: HashMap<(Pubkey, Pubkey), usize>,
    by_lowercase: HashMap<(String, String), Vec<usize>>,
}

impl PoolKeyRegistry {
    /// Read and index the dataset
    pub async fn load(source: &PoolSource) -> SwapResult<Self> {
        let raw = match source {
            PoolSource::File(path) => tokio::fs::read_to_string(path).await.map_err(|e| {
                SwapError::Load(format!("Failed to read {}: {}", path.display(), e))
            })?,
            PoolSource::Url(url) => fetch_dataset(url).await?,
        };

        let registry = Self::from_json_str(&raw)?;
        info!("Loaded {} pool descriptors from {}", registry.len(), source);
        Ok(registry)
    }

    pub fn from_json_str(raw: &str) -> SwapResult<Self> {
        let dataset: PoolDataset = serde_json::from_str(raw)
            .map_err(|e| SwapError::Load(format!("Malformed pool dataset: {}", e)))?;

        let pools = match dataset {
            PoolDataset::Split {
                official: None,
                un_official: None,
            } => {
                return Err(SwapError::Load(
                    "Malformed pool dataset: expected an array or an object with \
                     `official`/`unOfficial` pool lists"
                        .to_string(),
                ))
            }
            PoolDataset::Split {
                official,
                un_official,
            } => {
                let mut pools = official.unwrap_or_default();
                pools.extend(un_official.unwrap_or_default());
                pools
            }
            PoolDataset::Flat(pools) => pools,
        };

        Ok(Self::from_descriptors(pools))
    }

    pub fn from_descriptors(pools: Vec<PoolDescriptor>) -> Self {
        let mut by_mints = HashMap::with_capacity(pools.len() * 2);
        let mut by_lowercase: HashMap<(String, String), Vec<usize>> = HashMap::new();

        for (index, pool) in pools.iter().enumerate() {
            // First listing wins, matching the dataset's official-first order
            by_mints.entry((pool.base_mint, pool.quote_mint)).or_insert(index);
            by_mints.entry((pool.quote_mint, pool.base_mint)).or_insert(index);

            let base = pool.base_mint.to_string().to_lowercase();
            let quote = pool.quote_mint.to_string().to_lowercase();
            by_lowercase
                .entry((base.clone(), quote.clone()))
                .or_default()
                .push(index);
            by_lowercase.entry((quote, base)).or_default().push(index);
        }

        Self {
            pools,
            by_mints,
            by_lowercase,
        }
    }

    pub fn len(&self) -> usize {
        self.pools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }

    /// Typed lookup; `(a, b)` and `(b, a)` resolve to the same pool
    pub fn find_pool_for_mints(&self, a: &Pubkey, b: &Pubkey) -> Option<&PoolDescriptor> {
        self.by_mints.get(&(*a, *b)).map(|&index| &self.pools[index])
    }

    /// Lookup by address strings
    ///
    /// Exact base58 matches win. Otherwise addresses are compared ignoring
    /// case, and a match is only returned when it is unambiguous.
    pub fn find_pool_info_for_tokens(&self, a: &str, b: &str) -> Option<&PoolDescriptor> {
        let exact = Pubkey::from_str(a.trim())
            .ok()
            .zip(Pubkey::from_str(b.trim()).ok())
            .and_then(|(a, b)| self.find_pool_for_mints(&a, &b));
        if exact.is_some() {
            return exact;
        }

        let key = (a.trim().to_lowercase(), b.trim().to_lowercase());
        let candidates = self.by_lowercase.get(&key)?;
        let first = *candidates.first()?;
        let first_pair = (self.pools[first].base_mint, self.pools[first].quote_mint);
        let unambiguous = candidates.iter().all(|&index| {
            let pool = &self.pools[index];
            (pool.base_mint, pool.quote_mint) == first_pair
                || (pool.quote_mint, pool.base_mint) == first_pair
        });
        if !unambiguous {
            debug!("Case-insensitive lookup for {} / {} is ambiguous", a, b);
            return None;
        }
        Some(&self.pools[first])
    }
}

async fn fetch_dataset(url: &str) -> SwapResult<String> {
    let response = reqwest::get(url)
        .await
        .map_err(|e| SwapError::Load(format!("Failed to fetch {}: {}", url, e)))?;
    let response = response
        .error_for_status()
        .map_err(|e| SwapError::Load(format!("Failed to fetch {}: {}", url, e)))?;
    response
        .text()
        .await
        .map_err(|e| SwapError::Load(format!("Failed to read body of {}: {}", url, e)))
}

// Custom serde module for Pubkey
mod pubkey_serde {
    use super::*;
    use serde::{Deserializer, Serializer};

    pub fn serialize<S>(pubkey: &Pubkey, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&pubkey.to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Pubkey, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Pubkey::from_str(&s).map_err(serde::de::Error::custom)
    }
}
