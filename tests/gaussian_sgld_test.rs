//! Statistical tests verifying that replay-seeded SGLD reproduces known
//! target distributions.
//!
//! Two checks:
//! 1. `unconditional_chains_reach_unit_gaussian_moments`: with a
//!    standard-normal score and noise std √(2η), the buffer settles into
//!    unit-Gaussian moments.
//! 2. `conditional_chains_settle_near_their_class_mode`: class-conditioned
//!    scores pull each class block of the buffer toward its own mode.

use burn::backend::{Autodiff, NdArray};
use burn::prelude::*;
use ebm_sgld::buffer::{BufferConfig, InitDistribution, ReplayBuffer};
use ebm_sgld::energy::EnergyTarget;
use ebm_sgld::sgld::{ReplaySgld, SgldConfig};
use ebm_sgld::stats::buffer_summary;
use rand::rngs::SmallRng;
use rand::SeedableRng;

type BackendType = Autodiff<NdArray>;

/// `-||x||^2 / 2`: unnormalized log density of a standard normal.
struct StandardNormalScore;

impl EnergyTarget<f32, BackendType> for StandardNormalScore {
    fn energy_batch(
        &self,
        positions: &Tensor<BackendType, 2>,
        _labels: Option<&Tensor<BackendType, 1, Int>>,
    ) -> Tensor<BackendType, 1> {
        positions
            .clone()
            .powf_scalar(2.0)
            .sum_dim(1)
            .squeeze(1)
            .mul_scalar(-0.5)
    }
}

/// `-||x - mu_y||^2 / 2` with `mu_0 = -2` and `mu_1 = +2` per dimension.
struct ClassModes;

impl EnergyTarget<f32, BackendType> for ClassModes {
    fn energy_batch(
        &self,
        positions: &Tensor<BackendType, 2>,
        labels: Option<&Tensor<BackendType, 1, Int>>,
    ) -> Tensor<BackendType, 1> {
        let labels = labels.expect("ClassModes requires labels");
        let mu: Tensor<BackendType, 2> = labels
            .clone()
            .float()
            .mul_scalar(4.0)
            .sub_scalar(2.0)
            .unsqueeze_dim(1);
        positions
            .clone()
            .sub(mu)
            .powf_scalar(2.0)
            .sum_dim(1)
            .squeeze(1)
            .mul_scalar(-0.5)
    }
}

fn normal_buffer(capacity: usize, classes: Option<usize>, seed: u64) -> ReplayBuffer<f32> {
    let mut rng = SmallRng::seed_from_u64(seed);
    ReplayBuffer::new(
        BufferConfig {
            capacity,
            shape: vec![2],
            class_count: classes,
            init: InitDistribution::Normal {
                mean: 0.0,
                std: 1.0,
            },
        },
        &mut rng,
    )
    .expect("buffer construction must succeed")
}

#[test]
fn unconditional_chains_reach_unit_gaussian_moments() {
    const CAPACITY: usize = 512;
    const BATCH: usize = 256;
    const CALLS: usize = 20;
    const SEED: u64 = 42;

    let step_size = 0.01f32;
    let config = SgldConfig::new(step_size, (2.0 * step_size).sqrt(), 50, 0.02).unwrap();
    let mut sampler = ReplaySgld::<f32, BackendType, _>::new(
        StandardNormalScore,
        normal_buffer(CAPACITY, None, SEED),
        config,
    )
    .set_seed(SEED);

    for _ in 0..CALLS {
        sampler.sample(BATCH, None).unwrap();
    }

    // The buffer starts at N(0, 1) and the dynamics preserve it, so tight-ish
    // tolerances are safe even with correlated chains.
    let summary = buffer_summary(sampler.buffer());
    for j in 0..2 {
        assert!(
            summary.mean[j].abs() < 0.2,
            "dimension {j} mean {:.3} drifted from 0",
            summary.mean[j]
        );
        assert!(
            (0.75..1.35).contains(&summary.std[j]),
            "dimension {j} std {:.3} far from 1",
            summary.std[j]
        );
    }
}

#[test]
fn conditional_chains_settle_near_their_class_mode() {
    const CAPACITY: usize = 128;
    const BATCH: usize = 64;
    const CALLS: usize = 25;
    const SEED: u64 = 7;

    let step_size = 0.05f32;
    let config = SgldConfig::new(step_size, (2.0 * step_size).sqrt(), 30, 0.05).unwrap();
    let mut sampler = ReplaySgld::<f32, BackendType, _>::new(
        ClassModes,
        normal_buffer(CAPACITY, Some(2), SEED),
        config,
    )
    .set_seed(SEED);

    let labels: Vec<i64> = (0..BATCH as i64).map(|i| i % 2).collect();
    let mut last_slots = Vec::new();
    for _ in 0..CALLS {
        let (_, slots) = sampler.sample(BATCH, Some(labels.as_slice())).unwrap();
        last_slots = slots.expect("replay is enabled");
    }

    // Slots honor the class partition: block 0 is [0, 64), block 1 [64, 128).
    for (slot, &y) in last_slots.iter().zip(&labels) {
        assert_eq!((slot / 64) as i64, y, "slot {slot} outside class block");
    }

    // Each class block of the buffer sits near its own mode.
    let data = sampler.buffer().as_slice();
    let block = CAPACITY / 2 * 2; // values per class block (slots * dim)
    let mean_of = |values: &[f32]| values.iter().sum::<f32>() / values.len() as f32;
    let mean0 = mean_of(&data[..block]);
    let mean1 = mean_of(&data[block..]);
    assert!(mean0 < -1.0, "class-0 block mean {mean0:.2} not near -2");
    assert!(mean1 > 1.0, "class-1 block mean {mean1:.2} not near +2");
}
