//! A fixed-capacity replay buffer of previously generated samples.
//!
//! The buffer stores `capacity` flattened samples host-side and hands them to
//! the sampler as `[n, d]` tensors. When a class count is configured, the
//! storage is logically split into contiguous per-class blocks of
//! `capacity / class_count` slots, so slot `i` belongs to class
//! `i / (capacity / class_count)`. The buffer is allocated once, filled from
//! the configured initial distribution, and afterwards only mutated row-wise
//! through [`ReplayBuffer::write`].

use crate::error::{Error, Result};
use burn::prelude::*;
use num_traits::Float;
use rand::rngs::SmallRng;
use rand::Rng;
use rand_distr::uniform::SampleUniform;
use rand_distr::{Distribution, Normal, StandardNormal};

/// The distribution fresh samples are drawn from, both for the initial fill
/// and for per-example chain reinitialization.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InitDistribution<T> {
    /// Uniform on `[low, high)`, e.g. pixel-range data.
    Uniform { low: T, high: T },
    /// Isotropic Gaussian.
    Normal { mean: T, std: T },
}

impl<T> InitDistribution<T>
where
    T: Float + SampleUniform,
    StandardNormal: Distribution<T>,
{
    fn validate(&self) -> Result<()> {
        match *self {
            InitDistribution::Uniform { low, high } => {
                if low >= high {
                    return Err(Error::Config(
                        "uniform init requires low < high".to_string(),
                    ));
                }
            }
            InitDistribution::Normal { std, .. } => {
                if std < T::zero() {
                    return Err(Error::Config(
                        "normal init requires a non-negative std".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }

    fn fill(&self, n: usize, rng: &mut SmallRng) -> Vec<T> {
        match *self {
            InitDistribution::Uniform { low, high } => {
                (0..n).map(|_| rng.gen_range(low..high)).collect()
            }
            InitDistribution::Normal { mean, std } => {
                let normal = Normal::new(mean, std)
                    .expect("Expecting creation of normal distribution to succeed.");
                normal.sample_iter(rng).take(n).collect()
            }
        }
    }
}

/// Configuration for [`ReplayBuffer::new`].
#[derive(Debug, Clone)]
pub struct BufferConfig<T> {
    /// Number of slots. Zero disables replay entirely.
    pub capacity: usize,
    /// Per-sample shape; samples are stored flattened.
    pub shape: Vec<usize>,
    /// When set, partitions the buffer into contiguous per-class blocks.
    pub class_count: Option<usize>,
    /// Distribution for the initial fill and for fresh draws.
    pub init: InitDistribution<T>,
}

/// Fixed-capacity store of generated samples, optionally partitioned by
/// class label. Lives on the host; tensors cross to the compute device only
/// on [`read`](ReplayBuffer::read) and [`write`](ReplayBuffer::write).
#[derive(Debug, Clone)]
pub struct ReplayBuffer<T> {
    data: Vec<T>,
    capacity: usize,
    shape: Vec<usize>,
    dim: usize,
    class_count: Option<usize>,
    init: InitDistribution<T>,
}

impl<T> ReplayBuffer<T>
where
    T: Float + burn::tensor::Element + SampleUniform,
    StandardNormal: Distribution<T>,
{
    /// Allocates the buffer and fills it from the configured distribution.
    ///
    /// Fails with [`Error::Config`] if the sample shape is empty, or if a
    /// class count is set that is zero, exceeds a zero capacity, or does not
    /// evenly divide the capacity.
    pub fn new(config: BufferConfig<T>, rng: &mut SmallRng) -> Result<Self> {
        let dim: usize = config.shape.iter().product();
        if config.shape.is_empty() || dim == 0 {
            return Err(Error::Config(
                "sample shape must have a positive number of elements".to_string(),
            ));
        }
        if let Some(k) = config.class_count {
            if k == 0 {
                return Err(Error::Config("class count must be positive".to_string()));
            }
            if config.capacity == 0 {
                return Err(Error::Config(
                    "class-conditional replay requires a positive capacity".to_string(),
                ));
            }
            if config.capacity % k != 0 {
                return Err(Error::Config(format!(
                    "capacity {} is not divisible by class count {}",
                    config.capacity, k
                )));
            }
        }
        config.init.validate()?;

        let data = config.init.fill(config.capacity * dim, rng);
        log::info!(
            "replay buffer initialized: capacity={}, dim={}, classes={:?}",
            config.capacity,
            dim,
            config.class_count
        );
        Ok(Self {
            data,
            capacity: config.capacity,
            shape: config.shape,
            dim,
            class_count: config.class_count,
            init: config.init,
        })
    }

    /// Draws `n` slot indices uniformly with replacement.
    ///
    /// Unconditional when `labels` is `None`; otherwise one independent draw
    /// from each label's contiguous block.
    pub fn sample_slots(
        &self,
        n: usize,
        labels: Option<&[i64]>,
        rng: &mut SmallRng,
    ) -> Result<Vec<usize>> {
        if self.capacity == 0 {
            return Err(Error::Config(
                "cannot draw slots from a zero-capacity buffer".to_string(),
            ));
        }
        match labels {
            None => Ok((0..n).map(|_| rng.gen_range(0..self.capacity)).collect()),
            Some(labels) => {
                let k = self.class_count.ok_or_else(|| {
                    Error::Config(
                        "label-conditional slot draw on an unconditional buffer".to_string(),
                    )
                })?;
                if labels.len() != n {
                    return Err(Error::Contract(format!(
                        "label batch has length {} but {} slots were requested",
                        labels.len(),
                        n
                    )));
                }
                let block = self.capacity / k;
                labels
                    .iter()
                    .map(|&y| {
                        if y < 0 || y as usize >= k {
                            return Err(Error::Config(format!(
                                "label {y} out of range for {k} classes"
                            )));
                        }
                        Ok(y as usize * block + rng.gen_range(0..block))
                    })
                    .collect()
            }
        }
    }

    /// Copies the samples at `slots` into an `[n, d]` tensor.
    pub fn read<B: Backend>(&self, slots: &[usize]) -> Result<Tensor<B, 2>> {
        let mut rows = Vec::with_capacity(slots.len() * self.dim);
        for &slot in slots {
            if slot >= self.capacity {
                return Err(Error::Config(format!(
                    "slot {slot} out of range for capacity {}",
                    self.capacity
                )));
            }
            rows.extend_from_slice(&self.data[slot * self.dim..(slot + 1) * self.dim]);
        }
        let td = TensorData::new(rows, [slots.len(), self.dim]);
        Ok(Tensor::from_data(td, &B::Device::default()))
    }

    /// Overwrites the samples at `slots` with the rows of `batch`, in index
    /// order (the last occurrence of a duplicated slot wins).
    pub fn write<B: Backend>(&mut self, slots: &[usize], batch: Tensor<B, 2>) -> Result<()> {
        let dims = batch.dims();
        if dims[0] != slots.len() || dims[1] != self.dim {
            return Err(Error::Contract(format!(
                "write batch has shape {:?} but [{}, {}] was expected",
                dims,
                slots.len(),
                self.dim
            )));
        }
        let values = batch
            .into_data()
            .convert::<T>()
            .to_vec::<T>()
            .map_err(|e| Error::Contract(format!("write batch not convertible: {e:?}")))?;
        for (i, &slot) in slots.iter().enumerate() {
            if slot >= self.capacity {
                return Err(Error::Config(format!(
                    "slot {slot} out of range for capacity {}",
                    self.capacity
                )));
            }
            self.data[slot * self.dim..(slot + 1) * self.dim]
                .copy_from_slice(&values[i * self.dim..(i + 1) * self.dim]);
        }
        Ok(())
    }

    /// Draws `n` fresh samples from the init distribution as an `[n, d]`
    /// tensor. Used for chain reinitialization and for replay-disabled mode.
    pub fn draw_fresh<B: Backend>(&self, n: usize, rng: &mut SmallRng) -> Tensor<B, 2> {
        let td = TensorData::new(self.init.fill(n * self.dim, rng), [n, self.dim]);
        Tensor::from_data(td, &B::Device::default())
    }

    /// Replaces the entire buffer contents, e.g. when restoring a
    /// checkpoint. Everything else about the buffer is unchanged.
    pub fn overwrite_all(&mut self, values: &[T]) -> Result<()> {
        if values.len() != self.data.len() {
            return Err(Error::Config(format!(
                "restore payload has {} values but the buffer holds {}",
                values.len(),
                self.data.len()
            )));
        }
        self.data.copy_from_slice(values);
        Ok(())
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Flattened per-sample length.
    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn class_count(&self) -> Option<usize> {
        self.class_count
    }

    /// True when replay is disabled (zero capacity).
    pub fn is_empty(&self) -> bool {
        self.capacity == 0
    }

    /// Raw slot-major view of the stored samples, for diagnostics and
    /// persistence.
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }
}
