//! Integer circuits for quantized linear layers
//!
//! A circuit evaluates `acc = Σ_j (q_j - z_x) · w_jk + b_k` over quantized
//! inputs `q`. The zero point is folded into a per-output constant so the
//! encrypted evaluation only needs public multiplications and additions:
//! `acc_k = Σ_j q_j · w_jk + (b_k - z_x · Σ_j w_jk)`.

use crate::error::{KolosalError, Result};
use chrono::{DateTime, Utc};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::config::CompilationConfig;
use super::encryption::{EncryptedInput, EncryptedOutput, Share};
use super::keys::KeySet;

/// Where a quantized model runs its integer part
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ExecutionMode {
    /// Plaintext integer arithmetic
    #[default]
    Clear,
    /// Secret-shared evaluation through a compiled circuit
    Fhe,
}

/// Bits needed to hold `v` in two's complement
pub fn signed_bit_width(v: i64) -> u32 {
    if v >= 0 {
        65 - v.leading_zeros()
    } else {
        65 - (!v).leading_zeros()
    }
}

fn signed_bit_width_wide(v: i128) -> u32 {
    if v >= 0 {
        129 - v.leading_zeros()
    } else {
        129 - (!v).leading_zeros()
    }
}

/// `offsets_k = b_k - zx * sum_j W_jk`, so the circuit takes raw quantized inputs
fn fold_zero_point(weights: &Array2<i64>, bias: &Array1<i64>, input_zero_point: i64) -> Result<Array1<i64>> {
    let zx = i128::from(input_zero_point);
    let mut offsets = Array1::zeros(bias.len());
    for (k, column) in weights.columns().into_iter().enumerate() {
        let colsum: i128 = column.iter().map(|&w| i128::from(w)).sum();
        let folded = colsum
            .checked_mul(zx)
            .and_then(|shift| i128::from(bias[k]).checked_sub(shift))
            .and_then(|v| i64::try_from(v).ok())
            .ok_or_else(|| {
                KolosalError::CompilationError(format!(
                    "offset for output {} does not fit in 64 bits (zero point {})",
                    k, input_zero_point
                ))
            })?;
        offsets[k] = folded;
    }
    Ok(offsets)
}

/// A compiled linear circuit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FheCircuit {
    /// Zero-point-centered weights, `(n_inputs, n_outputs)`
    weights: Array2<i64>,
    /// Bias with the input zero point folded in
    offsets: Array1<i64>,
    input_zero_point: i64,
    n_bits: u8,
    max_bit_width: u32,
    bit_width_limit: u32,
    fingerprint: String,
}

impl FheCircuit {
    /// Build and bound a circuit
    ///
    /// `weights` are centered quantized weights, `bias` is already at the
    /// accumulator scale and `calibration` holds quantized inputs used to
    /// measure the widest accumulator.
    pub fn compile(
        weights: &Array2<i64>,
        bias: &Array1<i64>,
        input_zero_point: i64,
        n_bits: u8,
        calibration: &Array2<i64>,
        config: &CompilationConfig,
    ) -> Result<Self> {
        config.validate()?;
        if bias.len() != weights.ncols() {
            return Err(KolosalError::shape(
                format!("{} bias terms", weights.ncols()),
                format!("{} bias terms", bias.len()),
            ));
        }
        if calibration.nrows() == 0 {
            return Err(KolosalError::CompilationError("calibration set is empty".to_string()));
        }
        if calibration.ncols() != weights.nrows() {
            return Err(KolosalError::shape(
                format!("{} calibration features", weights.nrows()),
                format!("{} calibration features", calibration.ncols()),
            ));
        }

        let offsets = fold_zero_point(weights, bias, input_zero_point)?;
        let mut circuit = Self {
            weights: weights.clone(),
            offsets,
            input_zero_point,
            n_bits,
            max_bit_width: 0,
            bit_width_limit: config.max_bit_width,
            fingerprint: String::new(),
        };
        circuit.fingerprint = circuit.compute_fingerprint();

        let accumulators = circuit.accumulate_wide(calibration);
        circuit.max_bit_width = calibration
            .iter()
            .map(|&v| i128::from(v))
            .chain(accumulators.iter().copied())
            .map(signed_bit_width_wide)
            .max()
            .unwrap_or(1);

        if config.show_circuit {
            info!("{}", circuit.describe());
        }

        if circuit.max_bit_width > config.max_bit_width {
            let err = KolosalError::BitWidthOverflow {
                required: circuit.max_bit_width,
                limit: config.max_bit_width,
            };
            if config.dump_artifacts_on_unexpected_failures {
                match CircuitArtifact::new(&circuit, &err, config).write_to(&config.artifacts_dir) {
                    Ok(path) => warn!(path = %path.display(), "compilation failed, circuit dumped"),
                    Err(e) => warn!(error = %e, "compilation failed and the circuit could not be dumped"),
                }
            }
            return Err(err);
        }

        debug!(
            fingerprint = %circuit.fingerprint,
            n_inputs = circuit.n_inputs(),
            n_outputs = circuit.n_outputs(),
            max_bit_width = circuit.max_bit_width,
            "circuit compiled"
        );
        Ok(circuit)
    }

    fn compute_fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update([self.n_bits]);
        hasher.update(self.input_zero_point.to_le_bytes());
        hasher.update((self.weights.nrows() as u64).to_le_bytes());
        hasher.update((self.weights.ncols() as u64).to_le_bytes());
        for w in self.weights.iter().chain(self.offsets.iter()) {
            hasher.update(w.to_le_bytes());
        }
        format!("{:x}", hasher.finalize())
    }

    /// Accumulators in `i128`, wide enough for any `i64` inputs and weights
    fn accumulate_wide(&self, q_inputs: &Array2<i64>) -> Array2<i128> {
        let (n_samples, n_outputs) = (q_inputs.nrows(), self.n_outputs());
        Array2::from_shape_fn((n_samples, n_outputs), |(i, k)| {
            q_inputs
                .row(i)
                .iter()
                .zip(self.weights.column(k).iter())
                .fold(i128::from(self.offsets[k]), |acc, (&x, &w)| {
                    acc.saturating_add(i128::from(x) * i128::from(w))
                })
        })
    }

    fn check_inputs(&self, shape: (usize, usize)) -> Result<()> {
        if shape.1 != self.n_inputs() {
            return Err(KolosalError::shape(
                format!("{} features", self.n_inputs()),
                format!("{} features", shape.1),
            ));
        }
        Ok(())
    }

    /// Plaintext accumulators, `(n_samples, n_outputs)`
    pub fn evaluate_clear(&self, q_inputs: &Array2<i64>) -> Result<Array2<i64>> {
        self.check_inputs(q_inputs.dim())?;
        let wide = self.accumulate_wide(q_inputs);
        let mut out = Array2::zeros(wide.dim());
        for (dst, &v) in out.iter_mut().zip(wide.iter()) {
            *dst = i64::try_from(v).map_err(|_| {
                KolosalError::ExecutionError(format!("accumulator {} does not fit in 64 bits", v))
            })?;
        }
        Ok(out)
    }

    /// Evaluate on shares; each output share depends on one input share only
    pub fn run(&self, input: &EncryptedInput) -> Result<EncryptedOutput> {
        if input.fingerprint != self.fingerprint {
            return Err(KolosalError::ExecutionError(
                "input was encrypted for a different circuit".to_string(),
            ));
        }
        self.check_inputs(input.shape)?;
        let (n_samples, n_inputs) = input.shape;
        let n_outputs = self.n_outputs();

        let apply = |share: &Share, with_offsets: bool| -> Share {
            let mut out = Vec::with_capacity(n_samples * n_outputs);
            for row in share.data.chunks_exact(n_inputs) {
                for k in 0..n_outputs {
                    let mut acc = if with_offsets { self.offsets[k] as u64 } else { 0u64 };
                    for (j, &x) in row.iter().enumerate() {
                        acc = acc.wrapping_add(x.wrapping_mul(self.weights[[j, k]] as u64));
                    }
                    out.push(acc);
                }
            }
            Share::from_raw(out)
        };

        Ok(EncryptedOutput {
            client: apply(&input.client, false),
            server: apply(&input.server, true),
            shape: (n_samples, n_outputs),
            fingerprint: self.fingerprint.clone(),
        })
    }

    /// Encrypt, evaluate and decrypt in one call
    pub fn execute(&self, keys: &KeySet, q_inputs: &Array2<i64>) -> Result<Array2<i64>> {
        let encrypted = keys.encrypt(q_inputs)?;
        let output = keys.decrypt(&self.run(&encrypted)?)?;
        if let Some(&v) = output.iter().find(|&&v| signed_bit_width(v) > self.bit_width_limit) {
            return Err(KolosalError::ExecutionError(format!(
                "accumulator {} needs {} bits, circuit was compiled for {}",
                v,
                signed_bit_width(v),
                self.bit_width_limit
            )));
        }
        Ok(output)
    }

    /// SHA-256 over the circuit description
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Widest signed value seen on the calibration set
    pub fn max_bit_width(&self) -> u32 {
        self.max_bit_width
    }

    /// Limit the circuit was compiled under
    pub fn bit_width_limit(&self) -> u32 {
        self.bit_width_limit
    }

    pub fn n_bits(&self) -> u8 {
        self.n_bits
    }

    pub fn n_inputs(&self) -> usize {
        self.weights.nrows()
    }

    pub fn n_outputs(&self) -> usize {
        self.weights.ncols()
    }

    /// Human-readable listing of the circuit
    pub fn describe(&self) -> String {
        let mut text = format!(
            "circuit {} ({} inputs x u{} -> {} outputs, max {} bits)\n",
            &self.fingerprint[..12.min(self.fingerprint.len())],
            self.n_inputs(),
            self.n_bits,
            self.n_outputs(),
            self.max_bit_width
        );
        for k in 0..self.n_outputs() {
            let terms: Vec<String> = self
                .weights
                .column(k)
                .iter()
                .enumerate()
                .map(|(j, w)| format!("{}*x{}", w, j))
                .collect();
            text.push_str(&format!("  y{} = {} + {}\n", k, terms.join(" + "), self.offsets[k]));
        }
        text
    }
}

/// JSON dump of a circuit that failed to compile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitArtifact {
    pub created_at: DateTime<Utc>,
    pub error: String,
    pub fingerprint: String,
    pub n_bits: u8,
    pub input_zero_point: i64,
    pub max_bit_width: u32,
    pub bit_width_limit: u32,
    /// Row per input
    pub weights: Vec<Vec<i64>>,
    pub offsets: Vec<i64>,
    pub config: CompilationConfig,
}

impl CircuitArtifact {
    pub fn new(circuit: &FheCircuit, error: &KolosalError, config: &CompilationConfig) -> Self {
        Self {
            created_at: Utc::now(),
            error: error.to_string(),
            fingerprint: circuit.fingerprint.clone(),
            n_bits: circuit.n_bits,
            input_zero_point: circuit.input_zero_point,
            max_bit_width: circuit.max_bit_width,
            bit_width_limit: circuit.bit_width_limit,
            weights: circuit.weights.rows().into_iter().map(|r| r.to_vec()).collect(),
            offsets: circuit.offsets.to_vec(),
            config: config.clone(),
        }
    }

    /// Write into `dir` (created if missing) and return the file path
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(dir)?;
        let path = dir.join(format!(
            "circuit-{}-{}.json",
            &self.fingerprint[..12.min(self.fingerprint.len())],
            self.created_at.format("%Y%m%dT%H%M%S%.6f")
        ));
        let writer = BufWriter::new(File::create(&path)?);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(path)
    }
}
