use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;

use crate::error::{EitxtError, EitxtResult};
use crate::types::{Compression, EncryptOptions};

/// Hard ceiling on PBKDF2 iterations; `crypto.max_iterations` may only lower it.
pub const ITERATIONS_CEILING: u32 = 10_000_000;

/// Top-level configuration (loaded from eitxt.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EitxtConfig {
    pub server: ServerConfig,
    pub limits: LimitsConfig,
    pub crypto: CryptoConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// HTTP listen address (default: 127.0.0.1:8080)
    pub listen: String,
    /// Serve Prometheus text on /metrics
    pub metrics: bool,
    /// Log level (default: info)
    pub log_level: String,
    /// Log format: "json" or "text"
    pub log_format: String,
}

/// Size ceilings and the MIME allow-list enforced at the service boundary
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Largest plaintext file accepted for encryption (default: 100 MiB)
    pub max_file_bytes: u64,
    /// Largest armored text accepted for decryption (default: 200 MiB)
    pub max_text_bytes: u64,
    /// Content types accepted by the encrypt endpoint
    pub allowed_mime_types: Vec<String>,
}

/// Defaults applied when a caller does not choose
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CryptoConfig {
    /// PBKDF2-HMAC-SHA256 iterations (default: 310000)
    pub iterations: u32,
    /// Plaintext bytes per chunk (default: 1 MiB)
    pub chunk_bytes: usize,
    /// Compression mode (default: gzip)
    pub compression: Compression,
    /// Upper bound on caller-chosen iterations (at most 10_000_000)
    pub max_iterations: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:8080".into(),
            metrics: true,
            log_level: "info".into(),
            log_format: "text".into(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_file_bytes: 100 * 1024 * 1024,
            max_text_bytes: 200 * 1024 * 1024,
            allowed_mime_types: [
                "image/png",
                "image/jpeg",
                "image/jpg",
                "image/webp",
                "image/gif",
                "image/bmp",
                "image/svg+xml",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

impl Default for CryptoConfig {
    fn default() -> Self {
        Self {
            iterations: 310_000,
            chunk_bytes: 1024 * 1024,
            compression: Compression::Gzip,
            max_iterations: ITERATIONS_CEILING,
        }
    }
}

impl LimitsConfig {
    pub fn is_mime_allowed(&self, mime: &str) -> bool {
        self.allowed_mime_types.iter().any(|m| m == mime)
    }
}

impl CryptoConfig {
    /// Reject a caller-chosen work factor outside `1..=max_iterations`.
    pub fn check_iterations(&self, iterations: u32) -> EitxtResult<()> {
        if iterations == 0 || iterations > self.max_iterations {
            return Err(EitxtError::InvalidInput(format!(
                "iterations must be in 1..={}",
                self.max_iterations
            )));
        }
        Ok(())
    }
}

impl EitxtConfig {
    /// Read `path`, falling back to defaults when the file does not exist.
    pub fn load(path: &Path) -> EitxtResult<Self> {
        if !path.exists() {
            tracing::warn!("config file not found: {}  (using defaults)", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| EitxtError::Config(format!("parsing {}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> EitxtResult<()> {
        self.server
            .listen
            .parse::<SocketAddr>()
            .map_err(|e| EitxtError::Config(format!("server.listen {:?}: {e}", self.server.listen)))?;
        if self.crypto.chunk_bytes == 0 {
            return Err(EitxtError::Config("crypto.chunk_bytes must be at least 1".into()));
        }
        if self.crypto.max_iterations == 0 || self.crypto.max_iterations > ITERATIONS_CEILING {
            return Err(EitxtError::Config(format!(
                "crypto.max_iterations must be in 1..={ITERATIONS_CEILING}"
            )));
        }
        if self.crypto.iterations == 0 || self.crypto.iterations > self.crypto.max_iterations {
            return Err(EitxtError::Config(format!(
                "crypto.iterations must be in 1..={}",
                self.crypto.max_iterations
            )));
        }
        Ok(())
    }

    /// Encryption options used when the caller supplies none.
    pub fn encrypt_defaults(&self) -> EncryptOptions {
        EncryptOptions {
            compression: self.crypto.compression,
            chunk_bytes: self.crypto.chunk_bytes,
            iterations: self.crypto.iterations,
        }
    }
}
