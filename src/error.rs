//! Error taxonomy shared by the buffer and the sampler.

/// Errors surfaced by buffer construction, slot accounting, and the
/// Langevin loop.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid buffer or sampler configuration, detected at construction or
    /// on entry to a sampling call.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The scoring collaborator or the caller broke its contract (score not
    /// a function of the positions, mismatched label batch, mismatched
    /// read/write shapes).
    #[error("scoring contract violated: {0}")]
    Contract(String),

    /// Chain positions became NaN/Inf after an update step. The sampling
    /// call aborts before any buffer write, so buffer contents stay intact.
    #[error("non-finite chain positions after update step {step}")]
    NumericDivergence { step: usize },
}

pub type Result<T> = std::result::Result<T, Error>;
