//! Broadcast with bounded retries and confirmation polling
//!
//! A prepared transaction is signed once and every retry resends the same
//! bytes, so a broadcast that landed late can never turn into a second swap.
//! Before each retry the signature is checked: a confirmed swap ends the loop,
//! and an unconfirmed one whose blockhash has expired can no longer land, so
//! only then is the swap re-signed over a fresh blockhash.

use std::sync::Arc;

use solana_sdk::{hash::Hash, signature::Signature};
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::builder::PreparedTransaction;
use crate::config::RetryConfig;
use crate::error::{SwapError, SwapResult};
use crate::ledger::{LedgerClient, LedgerError, SignatureOutcome, SimulationReport};

pub struct TransactionSubmitter<L: LedgerClient> {
    ledger: Arc<L>,
    retry: RetryConfig,
}

impl<L: LedgerClient> TransactionSubmitter<L> {
    pub fn new(ledger: Arc<L>, retry: RetryConfig) -> Self {
        Self { ledger, retry }
    }

    /// Broadcast until confirmed, using at most `max_retries` attempts (at least one)
    ///
    /// `resign` rebuilds the same swap over a new blockhash. It is only called
    /// once the current transaction is known to be unable to land.
    pub async fn send<F>(
        &self,
        tx: PreparedTransaction,
        max_retries: u32,
        resign: F,
    ) -> SwapResult<Signature>
    where
        F: Fn(Hash) -> SwapResult<PreparedTransaction>,
    {
        let attempts = max_retries.max(1);
        let mut tx = tx;
        let mut last_error = None;

        for attempt in 1..=attempts {
            if attempt > 1 {
                sleep(self.retry.retry_delay()).await;

                let signature = tx.signature();
                match self.ledger.signature_status(&signature).await {
                    Ok(Some(SignatureOutcome::Confirmed)) => {
                        info!("Transaction {} confirmed before retry {}", signature, attempt);
                        return Ok(signature);
                    }
                    Ok(Some(SignatureOutcome::Failed(reason))) => {
                        return Err(SwapError::SubmissionFailed {
                            attempts: attempt - 1,
                            source: LedgerError::Failed(reason),
                        });
                    }
                    Ok(None) if self.blockhash_expired(&tx).await => {
                        match self.ledger.latest_blockhash().await {
                            Ok(blockhash) => {
                                let fresh = resign(blockhash)?;
                                info!(
                                    "Blockhash of {} expired unconfirmed, re-signed as {}",
                                    signature,
                                    fresh.signature()
                                );
                                tx = fresh;
                            }
                            Err(e) => {
                                warn!("Attempt {}/{}: no fresh blockhash: {}", attempt, attempts, e);
                                last_error = Some(e);
                                continue;
                            }
                        }
                    }
                    Ok(None) => {}
                    Err(e) => debug!("Status check before retry {} failed: {}", attempt, e),
                }
            }

            let signature = tx.signature();
            debug!("Submitting {} (attempt {}/{})", signature, attempt, attempts);
            match self.attempt(&tx).await {
                Ok(confirmed) => {
                    info!("Transaction {} confirmed after {} attempt(s)", confirmed, attempt);
                    return Ok(confirmed);
                }
                Err(err) if err.is_transient() => {
                    warn!("Attempt {}/{} for {} failed: {}", attempt, attempts, signature, err);
                    last_error = Some(err);
                }
                Err(err) => {
                    return Err(SwapError::SubmissionFailed {
                        attempts: attempt,
                        source: err,
                    });
                }
            }
        }

        Err(SwapError::SubmissionFailed {
            attempts,
            source: last_error
                .unwrap_or_else(|| LedgerError::Transient("no attempt was made".to_string())),
        })
    }

    /// Single dry run; simulation is never retried
    pub async fn simulate(&self, tx: &PreparedTransaction) -> SwapResult<SimulationReport> {
        Ok(self.ledger.simulate_transaction(tx).await?)
    }

    /// A failed validity check counts as still valid
    async fn blockhash_expired(&self, tx: &PreparedTransaction) -> bool {
        let blockhash = tx.recent_blockhash();
        match self.ledger.is_blockhash_valid(&blockhash).await {
            Ok(valid) => !valid,
            Err(e) => {
                debug!("Blockhash check for {} failed: {}", blockhash, e);
                false
            }
        }
    }

    async fn attempt(&self, tx: &PreparedTransaction) -> Result<Signature, LedgerError> {
        let signature = self.ledger.send_transaction(tx).await?;
        self.await_confirmation(&signature).await?;
        Ok(signature)
    }

    async fn await_confirmation(&self, signature: &Signature) -> Result<(), LedgerError> {
        let deadline = Instant::now() + self.retry.confirm_timeout();

        loop {
            match self.ledger.signature_status(signature).await {
                Ok(Some(SignatureOutcome::Confirmed)) => return Ok(()),
                Ok(Some(SignatureOutcome::Failed(reason))) => return Err(LedgerError::Failed(reason)),
                Ok(None) => {}
                Err(e) if e.is_transient() => debug!("Status poll for {} failed: {}", signature, e),
                Err(e) => return Err(e),
            }

            if Instant::now() >= deadline {
                return Err(LedgerError::Transient(format!(
                    "{} not confirmed within {}s",
                    signature,
                    self.retry.confirm_timeout_secs
                )));
            }
            sleep(self.retry.poll_interval()).await;
        }
    }
}
