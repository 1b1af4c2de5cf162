use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::types::{CollationId, Result, RowpackError};

/// Default tier ceilings, in bytes.
pub const DEFAULT_POOL_TIERS: [usize; 7] = [64, 256, 1024, 4096, 16384, 65536, 262144];

/// Collation used for character columns that do not declare one (`utf8mb4_0900_ai_ci`).
pub const DEFAULT_COLLATION: u32 = 255;

/// Configuration for the tiered buffer pool.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolOptions {
    /// Capacity ceilings of the fixed-size tiers.
    pub tiers: Vec<usize>,
    /// Sentinel bytes appended after each buffer's usable region.
    pub guard_len: usize,
    /// Whether releases verify the sentinel bytes.
    pub check_guards: bool,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            tiers: DEFAULT_POOL_TIERS.to_vec(),
            guard_len: 0,
            check_guards: false,
        }
    }
}

impl PoolOptions {
    /// Replaces the tier ceilings.
    pub fn tiers(mut self, tiers: Vec<usize>) -> Self {
        self.tiers = tiers;
        self
    }

    /// Sets the guard length in bytes (0 disables guards).
    pub fn guard_len(mut self, bytes: usize) -> Self {
        self.guard_len = bytes;
        self
    }

    /// Enables or disables guard verification on release.
    pub fn check_guards(mut self, enabled: bool) -> Self {
        self.check_guards = enabled;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.tiers.iter().any(|&t| t == 0) {
            return Err(RowpackError::Config("pool tier ceilings must be non-zero".into()));
        }
        if self.check_guards && self.guard_len == 0 {
            tracing::warn!("options.check_guards_without_guard_len");
        }
        Ok(())
    }
}

/// Configuration for the value codec.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecOptions {
    /// Collation applied to character columns without an explicit one.
    pub default_collation: u32,
}

impl Default for CodecOptions {
    fn default() -> Self {
        Self {
            default_collation: DEFAULT_COLLATION,
        }
    }
}

impl CodecOptions {
    /// Sets the fallback collation id.
    pub fn default_collation(mut self, id: u32) -> Self {
        self.default_collation = id;
        self
    }

    /// Fallback collation as a typed id.
    pub fn default_collation_id(&self) -> CollationId {
        CollationId(self.default_collation)
    }
}

/// Top-level options supplied when creating a [`crate::CodecContext`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RowpackOptions {
    /// Buffer pool configuration.
    pub pool: PoolOptions,
    /// Codec configuration.
    pub codec: CodecOptions,
}

impl RowpackOptions {
    /// Parses options from TOML text; missing keys take their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let options: RowpackOptions =
            toml::from_str(text).map_err(|err| RowpackError::Config(err.to_string()))?;
        options.validate()?;
        Ok(options)
    }

    /// Reads options from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&text)
    }

    /// Replaces the pool options.
    pub fn pool(mut self, pool: PoolOptions) -> Self {
        self.pool = pool;
        self
    }

    /// Replaces the codec options.
    pub fn codec(mut self, codec: CodecOptions) -> Self {
        self.codec = codec;
        self
    }

    /// Checks option invariants.
    pub fn validate(&self) -> Result<()> {
        self.pool.validate()
    }
}
