//! Key generation and the insecure key cache

use crate::error::{KolosalError, Result};
use ndarray::Array2;
use parking_lot::Mutex;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};
use tracing::debug;

use super::circuit::FheCircuit;
use super::config::CompilationConfig;
use super::encryption::{EncryptedInput, EncryptedOutput, Share};

type CacheKey = (u64, String);

fn key_cache() -> &'static Mutex<HashMap<CacheKey, Arc<KeySet>>> {
    static CACHE: OnceLock<Mutex<HashMap<CacheKey, Arc<KeySet>>>> = OnceLock::new();
    CACHE.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Key material for one compiled circuit
///
/// The key is the ChaCha20 stream that produces the server-side masks.
pub struct KeySet {
    fingerprint: String,
    seed: Option<u64>,
    rng: Mutex<ChaCha20Rng>,
}

impl fmt::Debug for KeySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeySet")
            .field("fingerprint", &self.fingerprint)
            .field("cached", &self.seed.is_some())
            .finish_non_exhaustive()
    }
}

impl KeySet {
    /// Generate keys for `circuit`
    ///
    /// With the insecure key cache enabled, every call with the same seed and
    /// circuit returns the same keys.
    pub fn generate(config: &CompilationConfig, circuit: &FheCircuit) -> Result<Arc<Self>> {
        config.validate()?;
        let fingerprint = circuit.fingerprint().to_string();

        if !config.use_insecure_key_cache {
            debug!(%fingerprint, "generating fresh keys");
            return Ok(Arc::new(Self {
                fingerprint,
                seed: None,
                rng: Mutex::new(ChaCha20Rng::from_entropy()),
            }));
        }

        let seed = config.insecure_key_seed;
        let mut cache = key_cache().lock();
        let keys = cache
            .entry((seed, fingerprint.clone()))
            .or_insert_with(|| {
                debug!(%fingerprint, seed, "caching insecure keys");
                let mut hasher = Sha256::new();
                hasher.update(seed.to_le_bytes());
                hasher.update(fingerprint.as_bytes());
                let rng = ChaCha20Rng::from_seed(hasher.finalize().into());
                Arc::new(Self {
                    fingerprint: fingerprint.clone(),
                    seed: Some(seed),
                    rng: Mutex::new(rng),
                })
            });
        Ok(Arc::clone(keys))
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Whether these keys came from the insecure cache
    pub fn is_cached(&self) -> bool {
        self.seed.is_some()
    }

    /// Secret-share quantized inputs
    pub fn encrypt(&self, values: &Array2<i64>) -> Result<EncryptedInput> {
        let mask = {
            let mut rng = self.rng.lock();
            Share::random_with_rng(values.len(), &mut *rng)
        };
        EncryptedInput::from_plaintext(values, mask, &self.fingerprint)
    }

    /// Recover circuit outputs
    pub fn decrypt(&self, output: &EncryptedOutput) -> Result<Array2<i64>> {
        if output.fingerprint != self.fingerprint {
            return Err(KolosalError::ExecutionError(
                "output was produced under different keys".to_string(),
            ));
        }
        output.reconstruct()
    }
}
