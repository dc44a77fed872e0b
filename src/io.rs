//! Optional persistence of buffer contents (enable the `csv` feature).
//!
//! The on-disk layout is a single dense table: a header row
//! `slot,dim_0,...,dim_{d-1}` followed by one row per slot. Capacity and
//! flattened sample width are recovered from the table structure; shape and
//! class count come from the [`BufferConfig`](crate::buffer::BufferConfig)
//! supplied on load, which must describe the same buffer.

#[cfg(feature = "csv")]
use crate::buffer::{BufferConfig, ReplayBuffer};
#[cfg(feature = "csv")]
use crate::error::Error as SamplerError;
#[cfg(feature = "csv")]
use csv::{Reader, Writer};
#[cfg(feature = "csv")]
use num_traits::Float;
#[cfg(feature = "csv")]
use rand::rngs::SmallRng;
#[cfg(feature = "csv")]
use rand_distr::{uniform::SampleUniform, Distribution, StandardNormal};
#[cfg(feature = "csv")]
use std::error::Error;
#[cfg(feature = "csv")]
use std::fs::File;

#[cfg(feature = "csv")]
/// Saves the buffer as a CSV file, one row per slot.
///
/// # Arguments
///
/// * `buffer` - The buffer to persist.
/// * `filename` - The file path where the CSV data will be written.
pub fn save_buffer_csv<T>(buffer: &ReplayBuffer<T>, filename: &str) -> Result<(), Box<dyn Error>>
where
    T: Float + burn::tensor::Element + SampleUniform + std::fmt::Display,
    StandardNormal: Distribution<T>,
{
    let mut wtr = Writer::from_writer(File::create(filename)?);

    let d = buffer.dim();
    let mut header: Vec<String> = vec!["slot".to_string()];
    header.extend((0..d).map(|i| format!("dim_{}", i)));
    wtr.write_record(&header)?;

    for slot in 0..buffer.capacity() {
        let mut row = vec![slot.to_string()];
        row.extend(
            buffer.as_slice()[slot * d..(slot + 1) * d]
                .iter()
                .map(|v| v.to_string()),
        );
        wtr.write_record(&row)?;
    }

    wtr.flush()?;
    Ok(())
}

#[cfg(feature = "csv")]
/// Allocates a buffer from `config` and restores its contents from a CSV
/// file written by [`save_buffer_csv`]. The file must hold exactly
/// `capacity` rows of `dim` values.
pub fn load_buffer_csv<T>(
    filename: &str,
    config: BufferConfig<T>,
    rng: &mut SmallRng,
) -> Result<ReplayBuffer<T>, Box<dyn Error>>
where
    T: Float + burn::tensor::Element + SampleUniform,
    StandardNormal: Distribution<T>,
{
    let mut buffer = ReplayBuffer::new(config, rng)?;
    let d = buffer.dim();

    let mut values: Vec<T> = Vec::with_capacity(buffer.capacity() * d);
    let mut rdr = Reader::from_reader(File::open(filename)?);
    for record in rdr.records() {
        let record = record?;
        if record.len() != d + 1 {
            return Err(SamplerError::Config(format!(
                "row has {} columns but {} were expected",
                record.len(),
                d + 1
            ))
            .into());
        }
        for field in record.iter().skip(1) {
            let v: f64 = field.parse()?;
            values.push(
                T::from(v).ok_or_else(|| {
                    SamplerError::Config(format!("value {v} not representable"))
                })?,
            );
        }
    }

    buffer.overwrite_all(&values)?;
    Ok(buffer)
}
