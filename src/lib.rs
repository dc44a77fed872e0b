pub mod buffer;
pub mod energy;
pub mod error;
pub mod io;
pub mod sgld;
pub mod stats;

pub use error::{Error, Result};
