//! The scoring-collaborator contract and classifier-derived energies.
//!
//! The sampler only ever sees [`EnergyTarget`]: a batched, differentiable
//! per-example score (higher = more probable) plus an evaluation-mode toggle
//! for targets with state-dependent layers. Joint-energy-style models derive
//! their score from classifier logits; [`ClassifierEnergy`] wraps any
//! [`LogitModel`] with one of the two [`ScoringRule`] strategies.

use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use num_traits::Float;

/// A batched scoring target for Langevin sampling.
///
/// # Type Parameters
///
/// * `T`: The floating-point type (e.g., f32 or f64).
/// * `B`: The autodiff backend from the `burn` crate.
pub trait EnergyTarget<T: Float, B: AutodiffBackend> {
    /// Per-example differentiable score for a batch of positions.
    ///
    /// # Parameters
    ///
    /// * `positions`: An `[n, d]` tensor with gradient tracking enabled.
    /// * `labels`: Optional `[n]` class labels for conditional scoring.
    ///
    /// # Returns
    ///
    /// A 1D tensor of shape `[n]`. The sampler sums it before backward, so
    /// the gradient at each position is independent of the batch size. The
    /// sampler ascends this score.
    fn energy_batch(
        &self,
        positions: &Tensor<B, 2>,
        labels: Option<&Tensor<B, 1, Int>>,
    ) -> Tensor<B, 1>;

    /// Switches state-dependent layers (batch statistics and the like)
    /// between training and evaluation behavior, returning the previous
    /// flag so callers can restore it. Must be idempotent.
    ///
    /// The default is a no-op for stateless targets and reports evaluation
    /// mode unconditionally.
    fn set_eval_mode(&mut self, eval: bool) -> bool {
        let _ = eval;
        true
    }
}

/// A classifier head producing `[n, class_count]` logits.
pub trait LogitModel<B: Backend> {
    fn logits(&self, positions: &Tensor<B, 2>) -> Tensor<B, 2>;
}

/// How classifier logits are turned into a scalar score per example.
/// Selected once at construction; the sampling loop never branches on it
/// beyond this dispatch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScoringRule {
    /// `logsumexp_k logits[i, k]` unconditionally, or `logits[i, y_i]` when
    /// labels are given. The joint-energy-model density score.
    LogSumExp,
    /// Minus the cross entropy against a label-smoothed one-hot target
    /// (uniform when no labels are given).
    Contrastive { smoothing: f64 },
}

/// An [`EnergyTarget`] derived from classifier logits.
#[derive(Debug, Clone)]
pub struct ClassifierEnergy<M> {
    pub model: M,
    pub rule: ScoringRule,
    eval_mode: bool,
}

impl<M> ClassifierEnergy<M> {
    pub fn new(model: M, rule: ScoringRule) -> Self {
        Self {
            model,
            rule,
            eval_mode: false,
        }
    }
}

/// Row-wise `log(sum(exp(x)))` with the usual max-shift for stability.
fn logsumexp<B: Backend>(logits: Tensor<B, 2>) -> Tensor<B, 1> {
    let max = logits.clone().max_dim(1);
    (logits - max.clone())
        .exp()
        .sum_dim(1)
        .log()
        .add(max)
        .squeeze(1)
}

impl<T, B, M> EnergyTarget<T, B> for ClassifierEnergy<M>
where
    T: Float,
    B: AutodiffBackend,
    M: LogitModel<B>,
{
    fn energy_batch(
        &self,
        positions: &Tensor<B, 2>,
        labels: Option<&Tensor<B, 1, Int>>,
    ) -> Tensor<B, 1> {
        let logits = self.model.logits(positions);
        let [n, k] = logits.dims();
        match self.rule {
            ScoringRule::LogSumExp => match labels {
                None => logsumexp(logits),
                Some(y) => {
                    let idx: Tensor<B, 2, Int> = y.clone().unsqueeze_dim(1);
                    logits.gather(1, idx).squeeze(1)
                }
            },
            ScoringRule::Contrastive { smoothing } => {
                let device = logits.device();
                let lse: Tensor<B, 2> = logsumexp(logits.clone()).unsqueeze_dim(1);
                let log_probs = logits - lse;
                let dist = match labels {
                    Some(y) => {
                        let idx: Tensor<B, 2, Int> = y.clone().unsqueeze_dim(1);
                        let one_hot = Tensor::<B, 2>::zeros([n, k], &device).scatter(
                            1,
                            idx,
                            Tensor::ones([n, 1], &device),
                        );
                        one_hot
                            .mul_scalar(1.0 - smoothing)
                            .add_scalar(smoothing / k as f64)
                    }
                    None => Tensor::ones([n, k], &device).div_scalar(k as f64),
                };
                // Minus cross entropy, per example.
                (dist * log_probs).sum_dim(1).squeeze(1)
            }
        }
    }

    fn set_eval_mode(&mut self, eval: bool) -> bool {
        std::mem::replace(&mut self.eval_mode, eval)
    }
}
