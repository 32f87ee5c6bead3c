//! Encrypted tensors
//!
//! A value `x` is split into two additive shares over Z/2^64,
//! `x = x_c + x_s (mod 2^64)`. Each share on its own is uniformly random.
//! Shares are zeroized on drop.

use crate::error::{KolosalError, Result};
use ndarray::Array2;
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// One additive share of a row-major matrix
#[derive(Debug, Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Share {
    /// Share values (zeroized on drop)
    pub data: Vec<u64>,
}

impl Share {
    pub fn from_raw(data: Vec<u64>) -> Self {
        Self { data }
    }

    /// Uniformly random share
    pub fn random_with_rng<R: RngCore>(len: usize, rng: &mut R) -> Self {
        Self {
            data: (0..len).map(|_| rng.next_u64()).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Secret-shared quantized inputs bound to one compiled circuit
#[derive(Debug, Clone)]
pub struct EncryptedInput {
    /// Client's share: X_c = X - X_s
    pub client: Share,
    /// Server's share, drawn from the key stream
    pub server: Share,
    /// `(n_samples, n_features)`
    pub shape: (usize, usize),
    /// Circuit the keys were generated for
    pub fingerprint: String,
}

impl EncryptedInput {
    /// Split `values` using `server` as the mask
    pub(crate) fn from_plaintext(values: &Array2<i64>, server: Share, fingerprint: &str) -> Result<Self> {
        if server.len() != values.len() {
            return Err(KolosalError::ExecutionError(format!(
                "mask has {} values, input has {}",
                server.len(),
                values.len()
            )));
        }
        let client = Share::from_raw(
            values
                .iter()
                .zip(&server.data)
                .map(|(&x, &xs)| (x as u64).wrapping_sub(xs))
                .collect(),
        );
        Ok(Self {
            client,
            server,
            shape: values.dim(),
            fingerprint: fingerprint.to_string(),
        })
    }
}

/// Secret-shared circuit outputs
#[derive(Debug, Clone)]
pub struct EncryptedOutput {
    /// Y_c = X_c · W
    pub client: Share,
    /// Y_s = X_s · W + offsets
    pub server: Share,
    /// `(n_samples, n_outputs)`
    pub shape: (usize, usize),
    pub fingerprint: String,
}

impl EncryptedOutput {
    /// Recombine the shares: Y = Y_c + Y_s (mod 2^64), read as two's complement
    pub(crate) fn reconstruct(&self) -> Result<Array2<i64>> {
        if self.client.len() != self.server.len() || self.client.len() != self.shape.0 * self.shape.1 {
            return Err(KolosalError::ExecutionError(format!(
                "share lengths {} and {} do not match shape {:?}",
                self.client.len(),
                self.server.len(),
                self.shape
            )));
        }
        let data: Vec<i64> = self
            .client
            .data
            .iter()
            .zip(&self.server.data)
            .map(|(&c, &s)| c.wrapping_add(s) as i64)
            .collect();
        Array2::from_shape_vec(self.shape, data).map_err(|e| KolosalError::ExecutionError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    #[test]
    fn test_shares_reconstruct_negative_values() {
        let values = array![[-5i64, 0], [7, i64::MIN + 1]];
        let mut rng = ChaCha20Rng::seed_from_u64(3);
        let mask = Share::random_with_rng(values.len(), &mut rng);
        let input = EncryptedInput::from_plaintext(&values, mask, "abc").unwrap();

        let output = EncryptedOutput {
            client: input.client.clone(),
            server: input.server.clone(),
            shape: input.shape,
            fingerprint: input.fingerprint.clone(),
        };
        assert_eq!(output.reconstruct().unwrap(), values);
    }

    #[test]
    fn test_client_share_hides_input() {
        let values = array![[1i64, 1, 1, 1]];
        let mut rng = ChaCha20Rng::seed_from_u64(11);
        let mask = Share::random_with_rng(4, &mut rng);
        let input = EncryptedInput::from_plaintext(&values, mask, "abc").unwrap();
        assert!(input.client.data.iter().all(|&c| c != 1));
    }

    #[test]
    fn test_mask_length_mismatch() {
        let values = array![[1i64, 2]];
        assert!(EncryptedInput::from_plaintext(&values, Share::from_raw(vec![0]), "abc").is_err());
    }
}
