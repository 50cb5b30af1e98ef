//! # Vaultwright
//!
//! Seeded template resolution and placement scheduling for roguelike level
//! generation.
//!
//! ## Architecture Overview
//!
//! Vaultwright turns a pool of declarative *templates* (small symbolic grids
//! with substitution rules) into concrete placement instructions for a level
//! builder. The core pieces are:
//!
//! - **Generation**: the seeded [`RandomSource`] and [`WeightedList`] sampling
//! - **Templates**: template records, directives and the read-only [`TemplatePool`]
//! - **Resolution**: the [`TemplateSubstitutionResolver`] that rewrites a grid
//! - **Context**: the [`ContextBindingLayer`] deciding eligibility and variants
//! - **Scheduling**: the [`PlacementScheduler`], shop policy and [`HookSequencer`]
//!
//! ## Determinism
//!
//! Every random decision is drawn from one [`RandomSource`] per generation
//! pass, in a fixed order. Two passes with the same seed, pool and request
//! sequence produce identical [`PlacementResult`]s.

pub mod context;
pub mod generation;
pub mod resolve;
pub mod scheduling;
pub mod templates;

// Core module re-exports
pub use context::*;
pub use generation::*;
pub use resolve::*;
pub use scheduling::*;
pub use templates::*;

/// Core error type for the Vaultwright engine.
#[derive(thiserror::Error, Debug)]
pub enum VaultError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// A weighted list was empty or had zero total weight
    #[error("Invalid distribution: {0}")]
    InvalidDistribution(String),

    /// A grid symbol was left without any binding
    #[error("Template '{template}' leaves placeholder '{symbol}' unbound")]
    UnboundPlaceholder { template: String, symbol: char },

    /// A directive targeted a symbol that an earlier directive already resolved
    #[error("Template '{template}' re-targets already resolved placeholder '{symbol}'")]
    DirectiveConflict { template: String, symbol: char },

    /// A directive is malformed (e.g. unequal permutation groups)
    #[error("Invalid directive: {0}")]
    InvalidDirective(String),

    /// A template record is malformed
    #[error("Invalid template: {0}")]
    InvalidTemplate(String),

    /// A request named a template that is not in the pool
    #[error("Unknown template: {0}")]
    UnknownTemplate(String),

    /// The generation pass was started without a seed
    #[error("Random source has no seed; generation cannot be reproduced")]
    MissingSeed,

    /// The random source ran past its configured draw budget
    #[error("Random source exhausted after {0} draws")]
    RandomExhausted(u64),

    /// A post-placement hook failed
    #[error("Hook failed: {0}")]
    HookFailed(String),
}

impl VaultError {
    /// Whether this error must abort the whole generation pass.
    ///
    /// Template-level failures only remove the offending template; a broken
    /// random stream invalidates every later decision.
    pub fn is_fatal_to_pass(&self) -> bool {
        matches!(
            self,
            VaultError::MissingSeed | VaultError::RandomExhausted(_) | VaultError::Io(_)
        )
    }
}

/// Result type used throughout the Vaultwright codebase.
pub type VaultResult<T> = Result<T, VaultError>;

/// Version information for the engine.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Engine configuration constants.
pub mod config {
    /// Weight given to templates and alternatives that do not declare one
    pub const DEFAULT_WEIGHT: u32 = 10;

    /// Glyphs that are concrete terrain and never need a directive
    pub const DEFAULT_TERRAIN_GLYPHS: &str = "x.+=@cvbmwWlG ";

    /// Maximum nesting of hook-issued requests
    pub const DEFAULT_MAX_HOOK_DEPTH: u32 = 4;

    /// Exact tag making a template placeable once per pass
    pub const DEFAULT_UNIQUE_TAG: &str = "unique";

    /// Tag prefix forming a group of which only one template may be placed
    pub const DEFAULT_UNIQUE_GROUP_PREFIX: &str = "uniq_";

    /// Tag selecting ordinary shop templates
    pub const DEFAULT_SHOP_TAG: &str = "shop";

    /// Template placed by the shop policy's depth-band override
    pub const DEFAULT_SHOP_ALTERNATE: &str = "bazaar_entry";

    /// Parameter value that activates the shop variant
    pub const DEFAULT_SHOP_SENTINEL: &str = "shop";

    /// Parameter value prefix that activates the altar-overflow variant
    pub const DEFAULT_ALTAR_OVERFLOW_PREFIX: &str = "overflow_altar_";
}
