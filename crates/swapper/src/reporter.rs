//! Final swap report written after an executed swap

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use solana_sdk::signature::Signature;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::builder::SwapDetails;
use crate::error::SwapResult;

/// Decimal view of [`SwapDetails`] plus the explorer link
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalReport {
    pub sol_scan_url: String,
    pub amount_in: f64,
    pub amount_out: f64,
    pub min_amount_out: f64,
    pub max_amount_in: f64,
    pub fee: f64,
    pub current_price: f64,
    pub execution_price: f64,
    pub price_impact: f64,
}

impl FinalReport {
    pub fn from_details(details: &SwapDetails, explorer_url: String) -> Self {
        Self {
            sol_scan_url: explorer_url,
            amount_in: details.amount_in.to_decimal(),
            amount_out: details.amount_out.to_decimal(),
            min_amount_out: details.min_amount_out.to_decimal(),
            max_amount_in: details.max_amount_in.to_decimal(),
            fee: details.fee.to_decimal(),
            current_price: details.current_price.to_decimal(),
            execution_price: details.execution_price.to_decimal(),
            price_impact: details.price_impact.to_decimal(),
        }
    }
}

/// Explorer link for a transaction
pub fn explorer_url(base: &str, signature: &Signature) -> String {
    format!("{}{}", base, signature)
}

/// Single-writer sink for [`FinalReport`]
pub struct SwapDetailReporter {
    output_path: PathBuf,
}

impl SwapDetailReporter {
    pub fn new(output_path: impl Into<PathBuf>) -> Self {
        Self {
            output_path: output_path.into(),
        }
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    /// Remove a report left over from an earlier run
    pub fn reset(&self) -> SwapResult<bool> {
        if !self.output_path.exists() {
            return Ok(false);
        }
        fs::remove_file(&self.output_path)?;
        info!("Removed stale report {}", self.output_path.display());
        Ok(true)
    }

    /// Convert and persist, replacing any previous report in one rename
    pub fn report(&self, details: &SwapDetails, explorer_url: String) -> SwapResult<FinalReport> {
        let report = FinalReport::from_details(details, explorer_url);
        let json = serde_json::to_vec_pretty(&report)?;

        let dir = match self.output_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(&json)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.output_path).map_err(|e| e.error)?;

        debug!("Wrote report to {}", self.output_path.display());
        Ok(report)
    }
}
