//! Uniform affine quantizer
//!
//! Maps floats onto the unsigned integer range `[0, 2^n_bits - 1]`:
//! `q = clamp(round(x / scale + zero_point))`, `x ≈ (q - zero_point) * scale`.

use crate::error::{KolosalError, Result};
use ndarray::{Array, Dimension};
use serde::{Deserialize, Serialize};

use super::calibration::CalibrationStats;

/// Widest supported quantization; keeps accumulators far from i64 overflow
pub const MAX_N_BITS: u8 = 24;

/// Uniform affine quantizer fitted to a value range
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UniformQuantizer {
    /// Bit width of the quantized integers
    pub n_bits: u8,
    /// Float value of one integer step
    pub scale: f64,
    /// Integer that represents 0.0
    pub zero_point: i64,
    /// Calibrated minimum
    pub rmin: f64,
    /// Calibrated maximum
    pub rmax: f64,
}

impl UniformQuantizer {
    /// Fit scale and zero point to the range of `values`
    pub fn fit<'a, I>(n_bits: u8, values: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'a f64>,
    {
        let mut stats = CalibrationStats::new();
        stats.collect(values);
        Self::from_stats(n_bits, &stats)
    }

    /// Fit scale and zero point from collected calibration statistics
    pub fn from_stats(n_bits: u8, stats: &CalibrationStats) -> Result<Self> {
        check_n_bits(n_bits)?;
        let (rmin, rmax) = stats.range().ok_or_else(|| {
            KolosalError::QuantizationError("cannot calibrate on an empty or non-finite range".to_string())
        })?;

        let levels = ((1u64 << n_bits) - 1) as f64;
        let (scale, zero_point) = if rmax - rmin < f64::EPSILON * rmax.abs().max(1.0) {
            // Constant input: one step equals the value itself
            let scale = if rmax == 0.0 { 1.0 } else { rmax.abs() };
            let zero_point = if rmax < 0.0 { 1 } else { 0 };
            (scale, zero_point)
        } else {
            let scale = (rmax - rmin) / levels;
            (scale, (-rmin / scale).round() as i64)
        };

        Ok(Self {
            n_bits,
            scale,
            zero_point,
            rmin,
            rmax,
        })
    }

    /// Largest representable integer
    pub fn qmax(&self) -> i64 {
        (1i64 << self.n_bits) - 1
    }

    /// Quantize one value, clamping to the integer range
    pub fn quantize_value(&self, value: f64) -> i64 {
        let q = (value / self.scale + self.zero_point as f64).round();
        (q.max(0.0) as i64).min(self.qmax())
    }

    /// Map one integer back to float
    pub fn dequantize_value(&self, q: i64) -> f64 {
        (q - self.zero_point) as f64 * self.scale
    }

    /// Quantize an array of any dimension
    pub fn quantize<D: Dimension>(&self, values: &Array<f64, D>) -> Array<i64, D> {
        values.mapv(|v| self.quantize_value(v))
    }

    /// Dequantize an array of any dimension
    pub fn dequantize<D: Dimension>(&self, q: &Array<i64, D>) -> Array<f64, D> {
        q.mapv(|v| self.dequantize_value(v))
    }

    /// Round-trip through the integer domain
    pub fn quant_dequant<D: Dimension>(&self, values: &Array<f64, D>) -> Array<f64, D> {
        values.mapv(|v| self.dequantize_value(self.quantize_value(v)))
    }
}

pub(crate) fn check_n_bits(n_bits: u8) -> Result<()> {
    if n_bits == 0 || n_bits > MAX_N_BITS {
        return Err(KolosalError::invalid_param(
            "n_bits",
            n_bits,
            format!("must be in 1..={}", MAX_N_BITS),
        ));
    }
    Ok(())
}

/// Quantized values together with the quantizer that produced them
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuantizedArray<D: Dimension> {
    pub values: Array<i64, D>,
    pub quantizer: UniformQuantizer,
}

impl<D: Dimension> QuantizedArray<D> {
    /// Calibrate a quantizer on `data` and quantize it
    pub fn from_float(n_bits: u8, data: &Array<f64, D>) -> Result<Self> {
        let quantizer = UniformQuantizer::fit(n_bits, data.iter())?;
        let values = quantizer.quantize(data);
        Ok(Self { values, quantizer })
    }

    /// Values relative to the zero point, the form used inside integer circuits
    pub fn centered(&self) -> Array<i64, D> {
        let zp = self.quantizer.zero_point;
        self.values.mapv(|q| q - zp)
    }

    pub fn dequantize(&self) -> Array<f64, D> {
        self.quantizer.dequantize(&self.values)
    }
}
