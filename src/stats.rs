//! Per-call chain diagnostics and buffer summary statistics.

use crate::buffer::ReplayBuffer;
use ndarray::Array1;
use num_traits::{Float, ToPrimitive};

/// Trace of one sampling call, recorded by
/// [`sample_with_diagnostics`](crate::sgld::ReplaySgld::sample_with_diagnostics).
#[derive(Debug, Clone, PartialEq)]
pub struct ChainDiagnostics {
    /// Mean score over the batch, one entry per update step.
    pub score_trace: Array1<f64>,
    /// Number of update steps taken.
    pub steps: usize,
}

impl ChainDiagnostics {
    /// Mean score after the final step, if any steps were taken.
    pub fn final_mean_score(&self) -> Option<f64> {
        self.score_trace.last().copied()
    }
}

/// Per-dimension moments of the buffer contents.
#[derive(Debug, Clone, PartialEq)]
pub struct BufferSummary {
    pub mean: Array1<f64>,
    pub std: Array1<f64>,
    pub capacity: usize,
}

/// Computes per-dimension mean and standard deviation over all slots.
pub fn buffer_summary<T: Float + ToPrimitive>(buffer: &ReplayBuffer<T>) -> BufferSummary
where
    T: rand_distr::uniform::SampleUniform + burn::tensor::Element,
    rand_distr::StandardNormal: rand_distr::Distribution<T>,
{
    let (c, d) = (buffer.capacity(), buffer.dim());
    let mut mean = Array1::<f64>::zeros(d);
    let mut mean_sq = Array1::<f64>::zeros(d);
    for slot in 0..c {
        for j in 0..d {
            let v = ToPrimitive::to_f64(&buffer.as_slice()[slot * d + j]).unwrap_or(f64::NAN);
            mean[j] += v;
            mean_sq[j] += v * v;
        }
    }
    if c > 0 {
        mean /= c as f64;
        mean_sq /= c as f64;
    }
    let std = (&mean_sq - &(&mean * &mean)).mapv(|v| v.max(0.0).sqrt());
    BufferSummary {
        mean,
        std,
        capacity: c,
    }
}
