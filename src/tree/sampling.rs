//! Row and column subsampling for stochastic boosting.
//!
//! Column samples must agree across workers, so their seed depends only on
//! (seed, round, output). Row samples are local to a shard and additionally
//! mix in the worker rank.

use crate::core::types::FeatureIndex;
use rand::prelude::*;
use rand::rngs::StdRng;

/// Mix several words into one seed (splitmix64 finalizer per word).
pub fn derive_seed(parts: &[u64]) -> u64 {
    let mut acc: u64 = 0x9E37_79B9_7F4A_7C15;
    for &part in parts {
        let mut z = acc ^ part.wrapping_add(0x9E37_79B9_7F4A_7C15);
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        acc = z ^ (z >> 31);
    }
    acc
}

/// Features used by one tree, in ascending order.
pub fn sample_columns(
    num_features: usize,
    fraction: f64,
    seed: u64,
    round: usize,
    output: usize,
) -> Vec<FeatureIndex> {
    if fraction >= 1.0 || num_features == 0 {
        return (0..num_features).collect();
    }
    let k = ((num_features as f64 * fraction).round() as usize).clamp(1, num_features);
    let mut rng = StdRng::seed_from_u64(derive_seed(&[seed, round as u64, output as u64, 0]));
    let mut picked = rand::seq::index::sample(&mut rng, num_features, k).into_vec();
    picked.sort_unstable();
    picked
}

/// Local rows used by one tree, in ascending order.
pub fn sample_rows(
    num_rows: usize,
    fraction: f64,
    seed: u64,
    round: usize,
    output: usize,
    rank: usize,
) -> Vec<usize> {
    if fraction >= 1.0 {
        return (0..num_rows).collect();
    }
    let mut rng = StdRng::seed_from_u64(derive_seed(&[
        seed,
        round as u64,
        output as u64,
        rank as u64 + 1,
    ]));
    (0..num_rows).filter(|_| rng.gen::<f64>() < fraction).collect()
}
