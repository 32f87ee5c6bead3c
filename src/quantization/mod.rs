//! Quantization Module
//!
//! Uniform affine quantization of inputs, weights and outputs for
//! integer-only inference.

mod calibration;
mod quantizer;

pub use calibration::CalibrationStats;
pub use quantizer::{QuantizedArray, UniformQuantizer, MAX_N_BITS};

pub(crate) use quantizer::check_n_bits;
