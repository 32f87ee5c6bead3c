//! Encrypted execution
//!
//! Compiles the integer part of a quantized linear model into a circuit,
//! bounds its accumulator bit width and evaluates it on additively
//! secret-shared inputs.

mod circuit;
mod config;
mod encryption;
mod keys;

pub use circuit::{signed_bit_width, CircuitArtifact, ExecutionMode, FheCircuit};
pub use config::{CompilationConfig, MAX_SUPPORTED_BIT_WIDTH};
pub use encryption::{EncryptedInput, EncryptedOutput, Share};
pub use keys::KeySet;
