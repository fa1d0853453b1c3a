//! Ledger capability: blockhashes, balances, broadcast and simulation
//!
//! The swapper only talks to the chain through [`LedgerClient`], which keeps
//! the submitter and scheduler testable without a cluster.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use solana_client::{
    client_error::{ClientError, ClientErrorKind},
    nonblocking::rpc_client::RpcClient,
    rpc_config::{RpcSendTransactionConfig, RpcSimulateTransactionConfig},
    rpc_custom_error::JSON_RPC_SERVER_ERROR_NODE_UNHEALTHY,
    rpc_request::RpcError,
};
use solana_sdk::{
    commitment_config::{CommitmentConfig, CommitmentLevel},
    hash::Hash,
    pubkey::Pubkey,
    signature::Signature,
    transaction::TransactionError,
};
use thiserror::Error;

use crate::builder::PreparedTransaction;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Worth retrying: network trouble, lagging node, unconfirmed broadcast
    #[error("Transient RPC failure: {0}")]
    Transient(String),

    /// The request or transaction was refused
    #[error("RPC request rejected: {0}")]
    Rejected(String),

    /// The transaction landed and failed on chain
    #[error("Transaction failed on chain: {0}")]
    Failed(String),
}

impl LedgerError {
    pub fn is_transient(&self) -> bool {
        matches!(self, LedgerError::Transient(_))
    }
}

/// Result of a dry run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SimulationReport {
    pub err: Option<String>,
    pub logs: Vec<String>,
    pub units_consumed: Option<u64>,
}

impl SimulationReport {
    pub fn succeeded(&self) -> bool {
        self.err.is_none()
    }
}

/// Status of a broadcast signature
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureOutcome {
    Confirmed,
    Failed(String),
}

#[async_trait]
pub trait LedgerClient: Send + Sync {
    async fn latest_blockhash(&self) -> Result<Hash, LedgerError>;

    /// Raw token balance of an SPL token account
    async fn token_account_balance(&self, account: &Pubkey) -> Result<u64, LedgerError>;

    /// Whether a transaction signed over `blockhash` can still be processed
    async fn is_blockhash_valid(&self, blockhash: &Hash) -> Result<bool, LedgerError>;

    async fn send_transaction(&self, tx: &PreparedTransaction) -> Result<Signature, LedgerError>;

    /// `None` while the signature is unknown or not yet confirmed
    async fn signature_status(
        &self,
        signature: &Signature,
    ) -> Result<Option<SignatureOutcome>, LedgerError>;

    async fn simulate_transaction(
        &self,
        tx: &PreparedTransaction,
    ) -> Result<SimulationReport, LedgerError>;
}

/// [`LedgerClient`] backed by the Solana JSON-RPC API
pub struct RpcLedger {
    rpc: Arc<RpcClient>,
}

impl RpcLedger {
    pub fn new(rpc_url: String) -> Self {
        Self {
            rpc: Arc::new(RpcClient::new_with_commitment(
                rpc_url,
                CommitmentConfig::confirmed(),
            )),
        }
    }

    fn send_config() -> RpcSendTransactionConfig {
        RpcSendTransactionConfig {
            skip_preflight: false,
            preflight_commitment: Some(CommitmentLevel::Confirmed),
            // The submitter owns the retry policy
            max_retries: Some(0),
            ..RpcSendTransactionConfig::default()
        }
    }

    fn simulate_config() -> RpcSimulateTransactionConfig {
        RpcSimulateTransactionConfig {
            sig_verify: true,
            commitment: Some(CommitmentConfig::confirmed()),
            ..RpcSimulateTransactionConfig::default()
        }
    }
}

#[async_trait]
impl LedgerClient for RpcLedger {
    async fn latest_blockhash(&self) -> Result<Hash, LedgerError> {
        self.rpc.get_latest_blockhash().await.map_err(classify)
    }

    async fn is_blockhash_valid(&self, blockhash: &Hash) -> Result<bool, LedgerError> {
        self.rpc
            .is_blockhash_valid(blockhash, CommitmentConfig::confirmed())
            .await
            .map_err(classify)
    }

    async fn token_account_balance(&self, account: &Pubkey) -> Result<u64, LedgerError> {
        let balance = self
            .rpc
            .get_token_account_balance(account)
            .await
            .map_err(classify)?;
        balance.amount.parse().map_err(|_| {
            LedgerError::Rejected(format!(
                "Unparseable balance '{}' for {}",
                balance.amount, account
            ))
        })
    }

    async fn send_transaction(&self, tx: &PreparedTransaction) -> Result<Signature, LedgerError> {
        let result = match tx {
            PreparedTransaction::Legacy(tx) => {
                self.rpc
                    .send_transaction_with_config(tx, Self::send_config())
                    .await
            }
            PreparedTransaction::Versioned(tx) => {
                self.rpc
                    .send_transaction_with_config(tx, Self::send_config())
                    .await
            }
        };
        result.map_err(classify)
    }

    async fn signature_status(
        &self,
        signature: &Signature,
    ) -> Result<Option<SignatureOutcome>, LedgerError> {
        let status = self
            .rpc
            .get_signature_status_with_commitment(signature, CommitmentConfig::confirmed())
            .await
            .map_err(classify)?;
        Ok(status.map(|result| match result {
            Ok(()) => SignatureOutcome::Confirmed,
            Err(err) => SignatureOutcome::Failed(err.to_string()),
        }))
    }

    async fn simulate_transaction(
        &self,
        tx: &PreparedTransaction,
    ) -> Result<SimulationReport, LedgerError> {
        let response = match tx {
            PreparedTransaction::Legacy(tx) => {
                self.rpc
                    .simulate_transaction_with_config(tx, Self::simulate_config())
                    .await
            }
            PreparedTransaction::Versioned(tx) => {
                self.rpc
                    .simulate_transaction_with_config(tx, Self::simulate_config())
                    .await
            }
        }
        .map_err(classify)?;

        let result = response.value;
        Ok(SimulationReport {
            err: result.err.map(|err| err.to_string()),
            logs: result.logs.unwrap_or_default(),
            units_consumed: result.units_consumed,
        })
    }
}

/// Sort client errors into retryable and final
fn classify(err: ClientError) -> LedgerError {
    if matches!(
        err.get_transaction_error(),
        Some(TransactionError::BlockhashNotFound)
    ) {
        // Usually a node that has not seen the blockhash yet
        return LedgerError::Transient(err.to_string());
    }

    match err.kind() {
        ClientErrorKind::Io(_) | ClientErrorKind::Reqwest(_) => {
            LedgerError::Transient(err.to_string())
        }
        ClientErrorKind::RpcError(RpcError::RpcResponseError { code, .. })
            if *code == JSON_RPC_SERVER_ERROR_NODE_UNHEALTHY =>
        {
            LedgerError::Transient(err.to_string())
        }
        _ => LedgerError::Rejected(err.to_string()),
    }
}
