mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{plan, pool, scheduler, ScriptedLedger};
use rand::{rngs::StdRng, SeedableRng};
use raydium_swap_math::RationalAmount;
use raydium_swapper::{CycleOutcome, CyclePhase, FinalReport, SwapError};

#[tokio::test(start_paused = true)]
async fn loop_survives_missing_pool() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = Arc::new(ScriptedLedger::new());
    // The plan names a pool that is not in the (empty) registry
    let mut scheduler = scheduler(
        Vec::new(),
        ledger.clone(),
        plan(&pool(None), true),
        &dir.path().join("swapDetails.json"),
    );
    let mut rng = StdRng::seed_from_u64(42);

    // Pauses are 1-2s, so ten minutes of virtual time is at least 300 cycles
    let stats = scheduler
        .run_until(tokio::time::sleep(Duration::from_secs(600)), &mut rng)
        .await;

    assert!(stats.cycles >= 300, "only {} cycles ran", stats.cycles);
    assert_eq!(stats.failed, stats.cycles);
    assert_eq!(stats.succeeded, 0);
    assert_eq!(ledger.sends(), 0);
    assert_eq!(scheduler.phase(), CyclePhase::Idle);
}

#[tokio::test(start_paused = true)]
async fn loop_survives_rejected_submissions() {
    let dir = tempfile::tempdir().unwrap();
    let pool = pool(Some((1_000_000_000_000, 2_000_000_000)));
    let ledger = Arc::new(ScriptedLedger::new().rejecting());
    let report_path = dir.path().join("swapDetails.json");
    let mut scheduler = scheduler(vec![pool.clone()], ledger.clone(), plan(&pool, true), &report_path);
    let mut rng = StdRng::seed_from_u64(9);

    let stats = scheduler
        .run_until(tokio::time::sleep(Duration::from_secs(60)), &mut rng)
        .await;

    assert!(stats.cycles >= 30);
    assert_eq!(stats.failed, stats.cycles);
    // Rejections are final, one broadcast per cycle
    assert_eq!(u64::from(ledger.sends()), stats.cycles);
    assert!(!report_path.exists());
}

#[tokio::test]
async fn single_cycle_reports_missing_pool() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = Arc::new(ScriptedLedger::new());
    let mut scheduler = scheduler(
        Vec::new(),
        ledger,
        plan(&pool(None), false),
        &dir.path().join("swapDetails.json"),
    );

    let result = scheduler.run_logged(RationalAmount::new(1, 100).unwrap()).await;

    assert!(matches!(result, Err(SwapError::PoolNotFound { .. })));
    assert_eq!(scheduler.stats().failed, 1);
}

#[tokio::test]
async fn simulate_cycle_reads_vault_reserves() {
    let dir = tempfile::tempdir().unwrap();
    let pool = pool(None);
    let ledger = Arc::new(
        ScriptedLedger::new()
            .with_balance(pool.base_vault, 1_000_000_000_000)
            .with_balance(pool.quote_vault, 2_000_000_000),
    );
    let report_path = dir.path().join("swapDetails.json");
    let mut scheduler = scheduler(vec![pool.clone()], ledger.clone(), plan(&pool, false), &report_path);

    let outcome = scheduler
        .run_cycle(RationalAmount::new(1, 100).unwrap())
        .await
        .unwrap();

    match outcome {
        CycleOutcome::Simulated(simulation) => {
            assert!(simulation.succeeded());
            assert_eq!(simulation.units_consumed, Some(31_000));
        }
        other => panic!("expected a simulation, got {:?}", other),
    }
    assert_eq!(ledger.simulations(), 1);
    assert_eq!(ledger.sends(), 0);
    assert_eq!(ledger.balance_reads.load(std::sync::atomic::Ordering::SeqCst), 2);
    assert!(!report_path.exists());
}

#[tokio::test(start_paused = true)]
async fn execute_cycle_retries_and_writes_report() {
    let dir = tempfile::tempdir().unwrap();
    let pool = pool(Some((1_000_000_000_000, 2_000_000_000)));
    let ledger = Arc::new(ScriptedLedger::new().with_transient_failures(2));
    let report_path = dir.path().join("swapDetails.json");
    let mut scheduler = scheduler(vec![pool.clone()], ledger.clone(), plan(&pool, true), &report_path);

    let outcome = scheduler
        .run_cycle(RationalAmount::new(1, 100).unwrap())
        .await
        .unwrap();

    let CycleOutcome::Executed { signature, report } = outcome else {
        panic!("expected an executed swap");
    };
    assert_eq!(ledger.sends(), 3);
    assert_eq!(report.sol_scan_url, format!("https://solscan.io/tx/{}", signature));
    assert!((report.amount_in - 0.01).abs() < 1e-12);
    assert!(report.min_amount_out <= report.amount_out);
    assert!(report.price_impact < 0.0);

    let stored: FinalReport =
        serde_json::from_str(&std::fs::read_to_string(&report_path).unwrap()).unwrap();
    assert_eq!(stored.sol_scan_url, report.sol_scan_url);
    assert!((stored.amount_out - report.amount_out).abs() < 1e-12);
}

#[tokio::test(start_paused = true)]
async fn execute_cycle_resigns_after_blockhash_expiry() {
    let dir = tempfile::tempdir().unwrap();
    let pool = pool(Some((1_000_000_000_000, 2_000_000_000)));
    let ledger = Arc::new(ScriptedLedger::new().expiring_first_blockhash());
    let report_path = dir.path().join("swapDetails.json");
    let mut scheduler = scheduler(vec![pool.clone()], ledger.clone(), plan(&pool, true), &report_path);

    let outcome = scheduler
        .run_cycle(RationalAmount::new(1, 100).unwrap())
        .await
        .unwrap();

    let CycleOutcome::Executed { signature, report } = outcome else {
        panic!("expected an executed swap");
    };
    // The stale broadcast fails, the re-signed one lands
    assert_eq!(ledger.sends(), 2);
    assert_eq!(report.sol_scan_url, format!("https://solscan.io/tx/{}", signature));
    assert!((report.amount_in - 0.01).abs() < 1e-12);
    assert!(report_path.exists());
}

#[tokio::test]
async fn reversed_pair_resolves_same_pool() {
    let dir = tempfile::tempdir().unwrap();
    let pool = pool(Some((1_000_000_000_000, 2_000_000_000)));
    let ledger = Arc::new(ScriptedLedger::new());
    let mut reversed = plan(&pool, false);
    std::mem::swap(&mut reversed.token_a, &mut reversed.token_b);
    let mut scheduler = scheduler(vec![pool.clone()], ledger.clone(), reversed, &dir.path().join("r.json"));

    // Selling 1 quote unit for base
    let outcome = scheduler.run_cycle(RationalAmount::from_integer(1)).await;

    assert!(matches!(outcome, Ok(CycleOutcome::Simulated(_))));
    assert_eq!(ledger.simulations(), 1);
}
