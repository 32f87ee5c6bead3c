//! Quantized linear layer shared by the regression and classification models

use crate::error::{KolosalError, Result};
use crate::fhe::{CompilationConfig, ExecutionMode, FheCircuit, KeySet};
use crate::quantization::UniformQuantizer;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Largest accumulator magnitude a layer may produce; leaves headroom for
/// folding the input zero point into the offsets
const ACCUMULATOR_LIMIT: i128 = (i64::MAX / 4) as i128;

/// Reject layers whose worst-case accumulator does not fit in `i64`
///
/// Bounds `|sum_j (q_j - zx) * w_jk| + |b_k|` over every `q_j` in the input range.
fn check_accumulator_range(
    n_bits: u8,
    input_quantizer: &UniformQuantizer,
    weights: &Array2<i64>,
    bias: &Array1<i64>,
) -> Result<()> {
    let zx = i128::from(input_quantizer.zero_point);
    let span = zx.abs().max((i128::from(input_quantizer.qmax()) - zx).abs());
    let out_of_range = |what: String| {
        KolosalError::QuantizationError(format!("{} exceeds the 64-bit accumulator range at {} bits", what, n_bits))
    };
    if span > ACCUMULATOR_LIMIT {
        return Err(out_of_range(format!("input zero point {}", zx)));
    }

    for (k, column) in weights.columns().into_iter().enumerate() {
        let worst = column.iter().try_fold(i128::from(bias[k].unsigned_abs()), |acc, &w| {
            acc.checked_add(span.checked_mul(i128::from(w.unsigned_abs()))?)
        });
        match worst {
            Some(bound) if bound <= ACCUMULATOR_LIMIT => {}
            _ => return Err(out_of_range(format!("output {}", k))),
        }
    }
    Ok(())
}

#[derive(Debug, Clone)]
struct Compiled {
    circuit: FheCircuit,
    keys: Arc<KeySet>,
}

/// Integer-only version of `y = x · W + b`
///
/// Inputs and weights are quantized per tensor, the bias lives at the
/// accumulator scale `s_x · s_w`, and outputs are requantized with a
/// quantizer calibrated on the training outputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuantizedLinearCore {
    n_bits: u8,
    input_quantizer: UniformQuantizer,
    weight_quantizer: UniformQuantizer,
    output_quantizer: UniformQuantizer,
    /// Weights minus their zero point, `(n_features, n_outputs)`
    weights: Array2<i64>,
    /// `round(b / (s_x · s_w))`
    bias: Array1<i64>,
    #[serde(skip)]
    compiled: Option<Compiled>,
}

impl QuantizedLinearCore {
    /// Quantize float parameters, calibrating on the training inputs `x`
    pub fn fit(n_bits: u8, x: &Array2<f64>, weights: &Array2<f64>, bias: &Array1<f64>) -> Result<Self> {
        if x.ncols() != weights.nrows() {
            return Err(KolosalError::shape(
                format!("{} features", weights.nrows()),
                format!("{} features", x.ncols()),
            ));
        }
        if bias.len() != weights.ncols() {
            return Err(KolosalError::shape(
                format!("{} bias terms", weights.ncols()),
                format!("{} bias terms", bias.len()),
            ));
        }

        let input_quantizer = UniformQuantizer::fit(n_bits, x.iter())?;
        let weight_quantizer = UniformQuantizer::fit(n_bits, weights.iter())?;
        let zw = weight_quantizer.zero_point;
        if i128::from(zw).abs() > ACCUMULATOR_LIMIT {
            return Err(KolosalError::QuantizationError(format!(
                "weight zero point {} is out of integer range at {} bits",
                zw, n_bits
            )));
        }
        let q_weights = weight_quantizer.quantize(weights).mapv(|q| q - zw);

        let accumulator_scale = input_quantizer.scale * weight_quantizer.scale;
        let q_bias = bias
            .iter()
            .map(|&b| {
                let q = (b / accumulator_scale).round();
                if q.is_finite() && q.abs() <= ACCUMULATOR_LIMIT as f64 {
                    Ok(q as i64)
                } else {
                    Err(KolosalError::QuantizationError(format!(
                        "bias {} is out of integer range at {} bits (accumulator scale {:e})",
                        b, n_bits, accumulator_scale
                    )))
                }
            })
            .collect::<Result<Array1<i64>>>()?;
        check_accumulator_range(n_bits, &input_quantizer, &q_weights, &q_bias)?;

        let mut core = Self {
            n_bits,
            output_quantizer: input_quantizer.clone(),
            input_quantizer,
            weight_quantizer,
            weights: q_weights,
            bias: q_bias,
            compiled: None,
        };

        // Output range comes from what the integer layer produces on the training set
        let raw_outputs = core.rescale(&core.accumulate_clear(&core.quantize_inputs(x)?));
        core.output_quantizer = UniformQuantizer::fit(n_bits, raw_outputs.iter())?;

        info!(
            n_bits,
            n_features = core.n_features(),
            n_outputs = core.n_outputs(),
            input_scale = core.input_quantizer.scale,
            weight_scale = core.weight_quantizer.scale,
            "quantized linear layer fitted"
        );
        Ok(core)
    }

    pub fn n_bits(&self) -> u8 {
        self.n_bits
    }

    pub fn n_features(&self) -> usize {
        self.weights.nrows()
    }

    pub fn n_outputs(&self) -> usize {
        self.weights.ncols()
    }

    pub fn input_quantizer(&self) -> &UniformQuantizer {
        &self.input_quantizer
    }

    pub fn weight_quantizer(&self) -> &UniformQuantizer {
        &self.weight_quantizer
    }

    pub fn output_quantizer(&self) -> &UniformQuantizer {
        &self.output_quantizer
    }

    /// Centered integer weights
    pub fn quantized_weights(&self) -> &Array2<i64> {
        &self.weights
    }

    /// Integer bias at the accumulator scale
    pub fn quantized_bias(&self) -> &Array1<i64> {
        &self.bias
    }

    pub fn quantize_inputs(&self, x: &Array2<f64>) -> Result<Array2<i64>> {
        if x.ncols() != self.n_features() {
            return Err(KolosalError::shape(
                format!("{} features", self.n_features()),
                format!("{} features", x.ncols()),
            ));
        }
        Ok(self.input_quantizer.quantize(x))
    }

    fn accumulate_clear(&self, q_inputs: &Array2<i64>) -> Array2<i64> {
        let zx = self.input_quantizer.zero_point;
        q_inputs.mapv(|q| q - zx).dot(&self.weights) + &self.bias
    }

    fn rescale(&self, accumulators: &Array2<i64>) -> Array2<f64> {
        let scale = self.input_quantizer.scale * self.weight_quantizer.scale;
        accumulators.mapv(|a| a as f64 * scale)
    }

    /// Integer accumulators for `x`, computed in the clear or under encryption
    pub fn accumulate(&self, x: &Array2<f64>, mode: ExecutionMode) -> Result<Array2<i64>> {
        let q_inputs = self.quantize_inputs(x)?;
        match mode {
            ExecutionMode::Clear => Ok(self.accumulate_clear(&q_inputs)),
            ExecutionMode::Fhe => {
                let compiled = self.compiled.as_ref().ok_or(KolosalError::ModelNotCompiled)?;
                compiled.circuit.execute(&compiled.keys, &q_inputs)
            }
        }
    }

    /// Dequantized, requantized outputs, `(n_samples, n_outputs)`
    pub fn forward(&self, x: &Array2<f64>, mode: ExecutionMode) -> Result<Array2<f64>> {
        let accumulators = self.accumulate(x, mode)?;
        Ok(self.output_quantizer.quant_dequant(&self.rescale(&accumulators)))
    }

    /// Compile the integer layer, using `x` to calibrate the accumulator width
    pub fn compile(&mut self, x: &Array2<f64>, config: &CompilationConfig) -> Result<&FheCircuit> {
        let q_inputs = self.quantize_inputs(x)?;
        let circuit = FheCircuit::compile(
            &self.weights,
            &self.bias,
            self.input_quantizer.zero_point,
            self.n_bits,
            &q_inputs,
            config,
        )?;
        let keys = KeySet::generate(config, &circuit)?;
        debug!(
            fingerprint = circuit.fingerprint(),
            max_bit_width = circuit.max_bit_width(),
            cached_keys = keys.is_cached(),
            "quantized linear layer compiled"
        );
        let compiled = self.compiled.insert(Compiled { circuit, keys });
        Ok(&compiled.circuit)
    }

    pub fn is_compiled(&self) -> bool {
        self.compiled.is_some()
    }

    pub fn circuit(&self) -> Option<&FheCircuit> {
        self.compiled.as_ref().map(|c| &c.circuit)
    }
}
