//! Replay-buffer-seeded short-run stochastic-gradient Langevin dynamics.
//!
//! Each call to [`ReplaySgld::sample`] warm-starts a batch of chains from the
//! replay buffer (mixing in fresh noise with the configured reinitialization
//! probability), ascends the target score for a fixed number of
//! gradient-plus-noise steps, and writes the final positions back into the
//! slots they were drawn from. The write-back is all-or-nothing: a failed
//! call leaves the buffer exactly as it was, so a diverged chain can never
//! poison future warm starts.
//!
//! The target score is supplied through the [`EnergyTarget`] trait; the loop
//! discards the autodiff graph after extracting each step's gradient, so
//! memory stays bounded in the step count.

use crate::buffer::ReplayBuffer;
use crate::energy::EnergyTarget;
use crate::error::{Error, Result};
use crate::stats::ChainDiagnostics;
use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use burn::tensor::cast::ToElement;
use indicatif::{ProgressBar, ProgressStyle};
use ndarray::Array1;
use num_traits::Float;
use rand::prelude::*;
use rand_distr::StandardNormal;

/// Step-size/noise/restart configuration for the Langevin loop.
#[derive(Debug, Clone, Copy)]
pub struct SgldConfig<T> {
    /// Gradient-ascent step size, `η > 0`.
    pub step_size: T,
    /// Standard deviation of the per-step Gaussian noise, `σ ≥ 0`.
    pub noise_std: T,
    /// Number of update steps per call. Zero returns the warm start as-is.
    pub n_steps: usize,
    /// Per-example probability of replacing a buffer-seeded start with a
    /// fresh draw. The drawn slot is kept, so its next write-back refreshes
    /// a stale buffer entry.
    pub reinit_prob: f64,
    /// Optional post-step clamp to a valid data range. Off by default;
    /// whether to clip is a caller policy, not a sampler default.
    pub clamp: Option<(T, T)>,
}

impl<T: Float> SgldConfig<T> {
    pub fn new(step_size: T, noise_std: T, n_steps: usize, reinit_prob: f64) -> Result<Self> {
        if step_size <= T::zero() {
            return Err(Error::Config("step size must be positive".to_string()));
        }
        if noise_std < T::zero() {
            return Err(Error::Config(
                "noise std must be non-negative".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&reinit_prob) {
            return Err(Error::Config(
                "reinitialization probability must lie in [0, 1]".to_string(),
            ));
        }
        Ok(Self {
            step_size,
            noise_std,
            n_steps,
            reinit_prob,
            clamp: None,
        })
    }

    /// Clamps positions into `[low, high]` after every update step.
    pub fn with_clamp(mut self, low: T, high: T) -> Result<Self> {
        if low >= high {
            return Err(Error::Config("clamp requires low < high".to_string()));
        }
        self.clamp = Some((low, high));
        Ok(self)
    }
}

/// A data-parallel SGLD sampler driving a persistent replay buffer.
///
/// Owns the buffer and the scoring target for the lifetime of training; the
/// `&mut self` entry points make the per-call read → step → write cycle
/// exclusive, so no two calls can interleave on overlapping slots.
///
/// # Type Parameters
///
/// * `T`: Floating-point type for numerical calculations.
/// * `B`: Autodiff backend from the `burn` crate.
/// * `E`: The scoring target implementing the [`EnergyTarget`] trait.
#[derive(Debug, Clone)]
pub struct ReplaySgld<T, B, E>
where
    B: AutodiffBackend,
{
    /// The scoring target whose density the chains ascend.
    pub target: E,
    config: SgldConfig<T>,
    buffer: ReplayBuffer<T>,
    rng: SmallRng,
    _backend: std::marker::PhantomData<B>,
}

impl<T, B, E> ReplaySgld<T, B, E>
where
    T: Float
        + burn::tensor::ElementConversion
        + burn::tensor::Element
        + rand_distr::uniform::SampleUniform
        + num_traits::FromPrimitive,
    B: AutodiffBackend,
    E: EnergyTarget<T, B>,
    StandardNormal: rand::distributions::Distribution<T>,
{
    pub fn new(target: E, buffer: ReplayBuffer<T>, config: SgldConfig<T>) -> Self {
        let rng = SmallRng::seed_from_u64(thread_rng().gen::<u64>());
        Self {
            target,
            config,
            buffer,
            rng,
            _backend: std::marker::PhantomData,
        }
    }

    /// Sets a new random seed for slot draws, restarts, and fresh samples.
    pub fn set_seed(mut self, seed: u64) -> Self {
        self.rng = SmallRng::seed_from_u64(seed);
        self
    }

    /// Read-only view of the replay buffer. All mutation goes through
    /// [`sample`](Self::sample) and friends.
    pub fn buffer(&self) -> &ReplayBuffer<T> {
        &self.buffer
    }

    pub fn config(&self) -> &SgldConfig<T> {
        &self.config
    }

    /// Generates a batch of synthetic samples.
    ///
    /// Composes the warm start, the Langevin loop, and the buffer
    /// write-back. Returns the final `[batch_size, d]` batch, detached from
    /// the autodiff graph, together with the buffer slots it was written to
    /// (`None` when replay is disabled).
    pub fn sample(
        &mut self,
        batch_size: usize,
        labels: Option<&[i64]>,
    ) -> Result<(Tensor<B, 2>, Option<Vec<usize>>)> {
        self.sample_inner(batch_size, labels, None)
    }

    /// [`sample`](Self::sample) with an `indicatif` progress bar showing the
    /// running mean score per step.
    pub fn sample_with_progress(
        &mut self,
        batch_size: usize,
        labels: Option<&[i64]>,
    ) -> Result<(Tensor<B, 2>, Option<Vec<usize>>)> {
        let pb = ProgressBar::new(self.config.n_steps as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{prefix:8} {bar:40.white} ETA {eta:3} | {msg}")
                .unwrap()
                .progress_chars("=>-"),
        );
        pb.set_prefix("SGLD");
        let mut on_step = |_step: usize, mean_score: f64| {
            pb.inc(1);
            pb.set_message(format!("mean score≈{mean_score:.3}"));
        };
        let out = self.sample_inner(batch_size, labels, Some(&mut on_step));
        pb.finish_with_message("Done!");
        out
    }

    /// [`sample`](Self::sample) plus the per-step mean-score trace.
    pub fn sample_with_diagnostics(
        &mut self,
        batch_size: usize,
        labels: Option<&[i64]>,
    ) -> Result<(Tensor<B, 2>, Option<Vec<usize>>, ChainDiagnostics)> {
        let mut trace = Vec::with_capacity(self.config.n_steps);
        let mut on_step = |_step: usize, mean_score: f64| trace.push(mean_score);
        let (batch, slots) = self.sample_inner(batch_size, labels, Some(&mut on_step))?;
        let diagnostics = ChainDiagnostics {
            steps: trace.len(),
            score_trace: Array1::from_vec(trace),
        };
        Ok((batch, slots, diagnostics))
    }

    fn sample_inner(
        &mut self,
        batch_size: usize,
        labels: Option<&[i64]>,
        on_step: Option<&mut dyn FnMut(usize, f64)>,
    ) -> Result<(Tensor<B, 2>, Option<Vec<usize>>)> {
        if let Some(y) = labels {
            if y.len() != batch_size {
                return Err(Error::Contract(format!(
                    "label batch has length {} but batch_size is {}",
                    y.len(),
                    batch_size
                )));
            }
            if self.buffer.class_count().is_none() {
                return Err(Error::Config(
                    "class-conditional sampling requires a class-partitioned buffer".to_string(),
                ));
            }
        }

        let label_tensor = labels.map(|y| {
            Tensor::<B, 1, Int>::from_data(
                TensorData::new(y.to_vec(), [y.len()]),
                &B::Device::default(),
            )
        });

        let (positions, slots) = self.warm_start(batch_size, labels)?;

        // Scoped eval-mode acquisition: restored on every exit path,
        // including divergence, before the error propagates.
        let prev_mode = self.target.set_eval_mode(true);
        let outcome = self.langevin(positions, label_tensor.as_ref(), on_step);
        self.target.set_eval_mode(prev_mode);
        let finals = outcome?;

        if let Some(slots) = &slots {
            self.buffer.write(slots, finals.clone())?;
        }
        Ok((finals, slots))
    }

    /// Draws the starting batch and the buffer slots it came from.
    ///
    /// With replay disabled the batch is all fresh draws and there are no
    /// slots. Otherwise each example independently keeps its buffer-read
    /// value or, with probability `reinit_prob`, is replaced by a fresh
    /// draw; the slot index is retained either way.
    fn warm_start(
        &mut self,
        batch_size: usize,
        labels: Option<&[i64]>,
    ) -> Result<(Tensor<B, 2>, Option<Vec<usize>>)> {
        if self.buffer.is_empty() {
            return Ok((self.buffer.draw_fresh(batch_size, &mut self.rng), None));
        }

        let slots = self.buffer.sample_slots(batch_size, labels, &mut self.rng)?;
        let seeded: Tensor<B, 2> = self.buffer.read(&slots)?;
        let p = self.config.reinit_prob;
        let positions = if p > 0.0 {
            let fresh = self.buffer.draw_fresh(batch_size, &mut self.rng);
            let restart: Vec<bool> = (0..batch_size).map(|_| self.rng.gen_bool(p)).collect();
            let mask = Tensor::<B, 2, Bool>::from_data(
                TensorData::new(restart, [batch_size, 1]),
                &B::Device::default(),
            )
            .expand([batch_size, self.buffer.dim()]);
            seeded.mask_where(mask, fresh)
        } else {
            seeded
        };
        Ok((positions, Some(slots)))
    }

    /// Runs `n_steps` Langevin updates, detaching the graph after each
    /// gradient extraction.
    fn langevin(
        &mut self,
        mut positions: Tensor<B, 2>,
        labels: Option<&Tensor<B, 1, Int>>,
        mut on_step: Option<&mut dyn FnMut(usize, f64)>,
    ) -> Result<Tensor<B, 2>> {
        let dims = positions.dims();
        let (n, d) = (dims[0], dims[1]);

        for step in 0..self.config.n_steps {
            positions = positions.detach().require_grad();

            // Summing (not averaging) keeps each position's gradient
            // independent of the batch size.
            let scores = self.target.energy_batch(&positions, labels);
            let total = scores.sum();
            let mean_score = on_step
                .as_deref_mut()
                .map(|_| total.clone().into_scalar().to_f64() / n as f64);

            let grads = positions.grad(&total.backward()).ok_or_else(|| {
                Error::Contract("score is not a function of the chain positions".to_string())
            })?;

            let noise = Tensor::<B, 2>::random(
                Shape::new([n, d]),
                burn::tensor::Distribution::Normal(0., 1.),
                &B::Device::default(),
            );
            positions = positions
                .detach()
                .add(Tensor::from_inner(grads.mul_scalar(self.config.step_size)))
                .add(noise.mul_scalar(self.config.noise_std));
            if let Some((low, high)) = self.config.clamp {
                positions = positions.clamp(low, high);
            }

            // NaN propagates through the sum and Inf saturates it, so one
            // host scalar per step detects any non-finite element.
            let checksum = positions.clone().abs().sum().into_scalar().to_f64();
            if !checksum.is_finite() {
                log::warn!("chain diverged at step {step}; aborting before buffer write-back");
                return Err(Error::NumericDivergence { step });
            }

            if let (Some(cb), Some(mean)) = (on_step.as_deref_mut(), mean_score) {
                cb(step, mean);
            }
        }

        Ok(positions.detach())
    }
}
