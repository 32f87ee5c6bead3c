//! Compilation configuration

use crate::error::{KolosalError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Widest accumulator the encrypted backend can carry
pub const MAX_SUPPORTED_BIT_WIDTH: u32 = 62;

/// Options controlling circuit compilation and key generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompilationConfig {
    /// Largest signed accumulator width a compiled circuit may need
    pub max_bit_width: u32,
    /// Reuse keys across compilations of the same circuit (tests only)
    pub use_insecure_key_cache: bool,
    /// Seed for cached keys
    pub insecure_key_seed: u64,
    /// Gate for options that weaken security
    pub enable_unsafe_features: bool,
    /// Write a JSON description of the circuit when compilation fails
    pub dump_artifacts_on_unexpected_failures: bool,
    /// Where failure artifacts go
    pub artifacts_dir: PathBuf,
    /// Log the compiled circuit at info level
    pub show_circuit: bool,
}

impl Default for CompilationConfig {
    fn default() -> Self {
        Self {
            max_bit_width: 16,
            use_insecure_key_cache: false,
            insecure_key_seed: 0,
            enable_unsafe_features: false,
            dump_artifacts_on_unexpected_failures: false,
            artifacts_dir: PathBuf::from("./.artifacts"),
            show_circuit: false,
        }
    }
}

impl CompilationConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fast, reproducible keys for test suites
    pub fn for_testing() -> Self {
        Self {
            use_insecure_key_cache: true,
            enable_unsafe_features: true,
            dump_artifacts_on_unexpected_failures: false,
            ..Self::default()
        }
    }

    /// Defaults overridden by `KOLOSAL_FHE_*` environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_bit_width: std::env::var("KOLOSAL_FHE_MAX_BIT_WIDTH")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_bit_width),
            use_insecure_key_cache: std::env::var("KOLOSAL_FHE_INSECURE_KEY_CACHE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.use_insecure_key_cache),
            insecure_key_seed: std::env::var("KOLOSAL_FHE_INSECURE_KEY_SEED")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.insecure_key_seed),
            enable_unsafe_features: std::env::var("KOLOSAL_FHE_ENABLE_UNSAFE_FEATURES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.enable_unsafe_features),
            dump_artifacts_on_unexpected_failures: std::env::var("KOLOSAL_FHE_DUMP_ARTIFACTS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.dump_artifacts_on_unexpected_failures),
            artifacts_dir: std::env::var("KOLOSAL_FHE_ARTIFACTS_DIR")
                .ok()
                .map(PathBuf::from)
                .unwrap_or(defaults.artifacts_dir),
            show_circuit: std::env::var("KOLOSAL_FHE_SHOW_CIRCUIT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.show_circuit),
        }
    }

    pub fn with_max_bit_width(mut self, bits: u32) -> Self {
        self.max_bit_width = bits;
        self
    }

    /// Cache keys under `seed`; also needs [`with_unsafe_features`](Self::with_unsafe_features)
    pub fn with_insecure_key_cache(mut self, seed: u64) -> Self {
        self.use_insecure_key_cache = true;
        self.insecure_key_seed = seed;
        self
    }

    pub fn with_unsafe_features(mut self, enable: bool) -> Self {
        self.enable_unsafe_features = enable;
        self
    }

    /// Dump failing circuits into `dir`
    pub fn with_artifacts_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dump_artifacts_on_unexpected_failures = true;
        self.artifacts_dir = dir.into();
        self
    }

    pub fn with_show_circuit(mut self, show: bool) -> Self {
        self.show_circuit = show;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.use_insecure_key_cache && !self.enable_unsafe_features {
            return Err(KolosalError::ConfigError(
                "use_insecure_key_cache requires enable_unsafe_features".to_string(),
            ));
        }
        if !(2..=MAX_SUPPORTED_BIT_WIDTH).contains(&self.max_bit_width) {
            return Err(KolosalError::ConfigError(format!(
                "max_bit_width must be in 2..={}, got {}",
                MAX_SUPPORTED_BIT_WIDTH, self.max_bit_width
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = CompilationConfig::default();
        assert_eq!(config.max_bit_width, 16);
        assert!(!config.use_insecure_key_cache);
        assert!(config.validate().is_ok());
        assert!(CompilationConfig::for_testing().validate().is_ok());
    }

    #[test]
    fn test_insecure_cache_needs_unsafe_features() {
        let config = CompilationConfig::new().with_insecure_key_cache(7);
        assert!(matches!(config.validate(), Err(KolosalError::ConfigError(_))));
        assert!(config.with_unsafe_features(true).validate().is_ok());
    }

    #[test]
    fn test_bit_width_bounds() {
        assert!(CompilationConfig::new().with_max_bit_width(1).validate().is_err());
        assert!(CompilationConfig::new().with_max_bit_width(63).validate().is_err());
        assert!(CompilationConfig::new().with_max_bit_width(62).validate().is_ok());
    }

    #[test]
    fn test_serde_round_trip() {
        let config = CompilationConfig::for_testing().with_artifacts_dir("/tmp/circuits");
        let json = serde_json::to_string(&config).unwrap();
        let back: CompilationConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, back);
    }
}
