pub mod amm_instruction;
pub mod builder;
pub mod config;
pub mod error;
pub mod ledger;
pub mod pool_registry;
pub mod reporter;
pub mod scheduler;
pub mod submitter;
pub mod wallet;

pub use builder::{
    PoolReserves, PreparedTransaction, SwapDetails, SwapDirection, SwapRequest,
    SwapTransactionBuilder, TransactionEncoding,
};
pub use config::{RetryConfig, ScheduleConfig, SwapperConfig};
pub use error::{SwapError, SwapResult};
pub use ledger::{LedgerClient, LedgerError, RpcLedger, SignatureOutcome, SimulationReport};
pub use pool_registry::{PoolDescriptor, PoolKeyRegistry, PoolSource};
pub use reporter::{FinalReport, SwapDetailReporter};
pub use scheduler::{CycleOutcome, CyclePhase, SchedulerStats, SwapPlan, SwapScheduler};
pub use submitter::TransactionSubmitter;
pub use wallet::WalletBook;
