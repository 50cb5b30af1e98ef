//! # Templates Module
//!
//! Template records and the read-only pool they are loaded into.
//!
//! A template is a named grid of symbols plus the directives that turn those
//! symbols into concrete content, along with the constraints deciding where
//! it may appear. Templates arrive already parsed (usually as JSON records)
//! and never change after [`TemplatePool::load`] accepts them.

pub mod directives;
pub mod grid;
pub mod pool;

pub use directives::*;
pub use grid::*;
pub use pool::*;

use crate::{config, BranchId, VariantKey};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

fn default_weight() -> u32 {
    config::DEFAULT_WEIGHT
}

/// Inclusive depth range; `max = None` means unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepthRange {
    pub min: i32,
    #[serde(default)]
    pub max: Option<i32>,
}

impl DepthRange {
    pub fn new(min: i32, max: Option<i32>) -> Self {
        Self { min, max }
    }

    /// Checks if a depth lies in the range.
    ///
    /// # Examples
    ///
    /// ```
    /// use vaultwright::DepthRange;
    ///
    /// let range = DepthRange::new(12, None);
    /// assert!(!range.contains(11));
    /// assert!(range.contains(12));
    /// assert!(DepthRange::new(1, Some(3)).contains(3));
    /// ```
    pub fn contains(&self, depth: i32) -> bool {
        depth >= self.min && self.max.map_or(true, |max| depth <= max)
    }
}

/// Depth range within one branch, or within every branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepthSpec {
    /// Branch the range applies to (None = any branch)
    #[serde(default)]
    pub branch: Option<BranchId>,
    pub range: DepthRange,
}

/// Per-branch selection chance `successes` in `out_of`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchChance {
    /// Branch the chance applies to (None = fallback for every branch)
    #[serde(default)]
    pub branch: Option<BranchId>,
    pub successes: u32,
    pub out_of: u32,
}

/// A mutually exclusive set of directives, run after the common ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variant {
    /// Selector key enabling this variant (None = default variant)
    #[serde(default)]
    pub when: Option<VariantKey>,
    pub directives: Vec<Directive>,
}

/// A named, constrained, weighted content blueprint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub name: String,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    /// Where the template may appear; empty means nowhere
    #[serde(default)]
    pub depths: Vec<DepthSpec>,
    /// Relative likelihood among eligible candidates (0 = only by name)
    #[serde(default = "default_weight")]
    pub weight: u32,
    #[serde(default)]
    pub chances: Vec<BranchChance>,
    /// Context tags that must all be active for the template to be eligible
    #[serde(default)]
    pub requires_tags: BTreeSet<String>,
    /// Directives run for every placement, in order
    #[serde(default)]
    pub directives: Vec<Directive>,
    #[serde(default)]
    pub variants: Vec<Variant>,
    pub grid: Grid,
}

impl Template {
    /// Creates a template with default weight and no constraints.
    ///
    /// Without depth entries the template is never eligible; add some with
    /// [`Template::with_depths`].
    pub fn new(name: impl Into<String>, grid: Grid) -> Self {
        Self {
            name: name.into(),
            tags: BTreeSet::new(),
            depths: Vec::new(),
            weight: config::DEFAULT_WEIGHT,
            chances: Vec::new(),
            requires_tags: BTreeSet::new(),
            directives: Vec::new(),
            variants: Vec::new(),
            grid,
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    pub fn with_weight(mut self, weight: u32) -> Self {
        self.weight = weight;
        self
    }

    /// Makes the template eligible at `min..=max` in every branch.
    pub fn with_depths(mut self, min: i32, max: Option<i32>) -> Self {
        self.depths.push(DepthSpec {
            branch: None,
            range: DepthRange::new(min, max),
        });
        self
    }

    /// Makes the template eligible at `min..=max` in one branch.
    pub fn with_branch_depths(mut self, branch: &str, min: i32, max: Option<i32>) -> Self {
        self.depths.push(DepthSpec {
            branch: Some(BranchId::from(branch)),
            range: DepthRange::new(min, max),
        });
        self
    }

    pub fn with_chance(mut self, branch: Option<&str>, successes: u32, out_of: u32) -> Self {
        self.chances.push(BranchChance {
            branch: branch.map(BranchId::from),
            successes,
            out_of,
        });
        self
    }

    pub fn with_directive(mut self, directive: Directive) -> Self {
        self.directives.push(directive);
        self
    }

    pub fn with_variant(mut self, when: Option<VariantKey>, directives: Vec<Directive>) -> Self {
        self.variants.push(Variant { when, directives });
        self
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    /// Every directive sequence a placement can run: the common directives
    /// followed by each variant, plus the common directives alone when no
    /// default variant exists.
    pub fn directive_sequences(&self) -> Vec<Vec<&Directive>> {
        let common: Vec<&Directive> = self.directives.iter().collect();
        let mut sequences: Vec<Vec<&Directive>> = self
            .variants
            .iter()
            .map(|variant| common.iter().copied().chain(variant.directives.iter()).collect())
            .collect();
        if !self.variants.iter().any(|v| v.when.is_none()) {
            sequences.push(common);
        }
        sequences
    }
}
