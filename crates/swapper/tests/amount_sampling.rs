mod common;

use std::collections::HashSet;

use raydium_swap_math::RationalAmount;
use raydium_swapper::scheduler::{sample_amount, sample_pause};
use raydium_swapper::ScheduleConfig;

#[test]
fn samples_stay_in_range_and_spread() {
    let schedule = common::schedule();
    let min = RationalAmount::from_decimal_str("0.001").unwrap();
    let max = RationalAmount::from_decimal_str("0.01").unwrap();
    let mut rng = rand::thread_rng();

    let samples: Vec<RationalAmount> = (0..1000).map(|_| sample_amount(&schedule, &mut rng)).collect();

    for sample in &samples {
        assert!(sample >= &min && sample <= &max, "{} out of range", sample);
        // Nine fractional digits at most
        assert_eq!(sample.floor_to_units(9), *sample);
    }
    let distinct: HashSet<String> = samples.iter().map(|s| s.to_string()).collect();
    assert!(distinct.len() > 100, "only {} distinct amounts", distinct.len());
}

#[test]
fn pauses_stay_in_range_and_spread() {
    let schedule = ScheduleConfig {
        min_interval_secs: 30,
        max_interval_secs: 90,
        ..common::schedule()
    };
    let mut rng = rand::thread_rng();

    let pauses: Vec<_> = (0..1000).map(|_| sample_pause(&schedule, &mut rng)).collect();

    assert!(pauses.iter().all(|p| p.as_secs() >= 30 && p.as_millis() <= 90_000));
    let distinct: HashSet<_> = pauses.iter().collect();
    assert!(distinct.len() > 100);
}
