//! # Generation Module
//!
//! Per-run configuration and the randomness primitives every other module
//! draws from.
//!
//! A generation run owns exactly one [`RandomSource`]. Templates, the resolver
//! and the scheduler never create their own generators; they borrow the run's
//! source so that a seed fully determines the output.

pub mod random;
pub mod weighted;

pub use random::*;
pub use weighted::*;

use crate::{config, ShopCountPolicy, VariantKey, VaultResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration for one generation run.
///
/// Controls the seed of the run's random stream and an optional draw budget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Random seed for reproducible generation
    pub seed: Option<u64>,
    /// Upper bound on random draws for one pass (None = unlimited)
    pub max_random_draws: Option<u64>,
}

impl GenerationConfig {
    /// Creates a seeded generation configuration.
    ///
    /// # Examples
    ///
    /// ```
    /// use vaultwright::GenerationConfig;
    ///
    /// let config = GenerationConfig::new(12345);
    /// assert_eq!(config.seed, Some(12345));
    /// assert!(config.max_random_draws.is_none());
    /// ```
    pub fn new(seed: u64) -> Self {
        Self {
            seed: Some(seed),
            max_random_draws: None,
        }
    }

    /// Creates a configuration for testing with a bounded draw budget.
    pub fn for_testing(seed: u64) -> Self {
        Self {
            seed: Some(seed),
            max_random_draws: Some(1_000_000),
        }
    }

    /// Creates a configuration with no seed. Starting a pass with it fails.
    pub fn unseeded() -> Self {
        Self {
            seed: None,
            max_random_draws: None,
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self::new(42)
    }
}

/// Engine-wide settings shared by every pass over one template pool.
///
/// Missing fields fall back to their defaults when deserializing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Glyphs that are concrete terrain and never need a directive
    pub terrain_glyphs: String,
    /// First-match order for conditional template variants
    pub variant_priority: Vec<VariantKey>,
    /// Tags limiting each template carrying them to one placement per pass
    pub unique_tags: Vec<String>,
    /// Tags with this prefix form a group of which one template is placed per pass
    pub unique_group_prefix: String,
    /// Maximum nesting of hook-issued requests
    pub max_hook_depth: u32,
    /// Parameter value (or context tag) activating the shop variant
    pub shop_sentinel: String,
    /// Parameter value prefix activating the altar-overflow variant
    pub altar_overflow_prefix: String,
    /// Shop-count policy used by `schedule_shops`
    pub shop_policy: ShopCountPolicy,
}

impl EngineConfig {
    /// Loads an engine configuration from JSON.
    pub fn from_json(json: &str) -> VaultResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Loads an engine configuration from a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> VaultResult<Self> {
        let json = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&json)
    }

    /// Whether `symbol` is plain terrain.
    pub fn is_terrain(&self, symbol: char) -> bool {
        self.terrain_glyphs.contains(symbol)
    }

    /// Whether `tag` makes its own template placeable once per pass.
    pub fn is_unique_tag(&self, tag: &str) -> bool {
        self.unique_tags.iter().any(|t| t == tag)
    }

    /// Whether `tag` names a group sharing one placement per pass.
    pub fn is_unique_group(&self, tag: &str) -> bool {
        !self.unique_group_prefix.is_empty() && tag.starts_with(&self.unique_group_prefix)
    }

    /// Whether `tag` limits placements in any way.
    pub fn is_uniqueness_tag(&self, tag: &str) -> bool {
        self.is_unique_tag(tag) || self.is_unique_group(tag)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            terrain_glyphs: config::DEFAULT_TERRAIN_GLYPHS.to_string(),
            variant_priority: vec![VariantKey::Shop, VariantKey::AltarOverflow],
            unique_tags: vec![config::DEFAULT_UNIQUE_TAG.to_string()],
            unique_group_prefix: config::DEFAULT_UNIQUE_GROUP_PREFIX.to_string(),
            max_hook_depth: config::DEFAULT_MAX_HOOK_DEPTH,
            shop_sentinel: config::DEFAULT_SHOP_SENTINEL.to_string(),
            altar_overflow_prefix: config::DEFAULT_ALTAR_OVERFLOW_PREFIX.to_string(),
            shop_policy: ShopCountPolicy::default(),
        }
    }
}
