//! A small SGLD demo: warm-started chains sampling a two-mode density
//! through the replay buffer, then a summary of where the buffer ended up.

use burn::backend::{Autodiff, NdArray};
use burn::prelude::*;
use ebm_sgld::buffer::{BufferConfig, InitDistribution, ReplayBuffer};
use ebm_sgld::energy::EnergyTarget;
use ebm_sgld::sgld::{ReplaySgld, SgldConfig};
use ebm_sgld::stats::buffer_summary;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use std::error::Error;

type BackendType = Autodiff<NdArray>;

/// Equal-weight mixture of two unit Gaussians at (-2, -2) and (2, 2),
/// scored as an unnormalized log density.
struct TwoModes;

impl EnergyTarget<f32, BackendType> for TwoModes {
    fn energy_batch(
        &self,
        positions: &Tensor<BackendType, 2>,
        _labels: Option<&Tensor<BackendType, 1, Int>>,
    ) -> Tensor<BackendType, 1> {
        let sq_a: Tensor<BackendType, 1> = positions
            .clone()
            .sub_scalar(2.0)
            .powf_scalar(2.0)
            .sum_dim(1)
            .squeeze(1)
            .mul_scalar(-0.5);
        let sq_b: Tensor<BackendType, 1> = positions
            .clone()
            .add_scalar(2.0)
            .powf_scalar(2.0)
            .sum_dim(1)
            .squeeze(1)
            .mul_scalar(-0.5);
        (sq_a.exp() + sq_b.exp()).log()
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    const SEED: u64 = 42;
    const CALLS: usize = 200;
    const BATCH: usize = 64;

    let mut rng = SmallRng::seed_from_u64(SEED);
    let buffer = ReplayBuffer::new(
        BufferConfig {
            capacity: 256,
            shape: vec![2],
            class_count: None,
            init: InitDistribution::Uniform {
                low: -4.0,
                high: 4.0,
            },
        },
        &mut rng,
    )?;

    // Noise std √(2η) makes the injected noise match the step size.
    let step_size = 0.01f32;
    let config = SgldConfig::new(step_size, (2.0 * step_size).sqrt(), 30, 0.05)?;
    let mut sampler = ReplaySgld::<f32, BackendType, _>::new(TwoModes, buffer, config)
        .set_seed(SEED);

    for call in 0..CALLS {
        let (_, _, diagnostics) = sampler.sample_with_diagnostics(BATCH, None)?;
        if (call + 1) % 50 == 0 {
            println!(
                "call {:>3}: mean score {:.3}",
                call + 1,
                diagnostics.final_mean_score().unwrap_or(f64::NAN)
            );
        }
    }

    let summary = buffer_summary(sampler.buffer());
    println!(
        "buffer after {CALLS} calls: mean = ({:.2}, {:.2}), std = ({:.2}, {:.2})",
        summary.mean[0], summary.mean[1], summary.std[0], summary.std[1]
    );
    println!("expected: mean near (0, 0), std near 2.2 (two modes at ±2)");
    Ok(())
}
