//! # Context Module
//!
//! The generation context of a pass and the binding layer that evaluates
//! templates against it.
//!
//! Templates never read the context directly. The [`ContextBindingLayer`]
//! answers the two questions the rest of the engine asks:
//! - may this template be placed here and now (depth, branch, region, tags)?
//! - which of its mutually exclusive directive variants applies?

use crate::{EngineConfig, Template, Variant};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Name of a dungeon branch (e.g. "D", "Lair", "Orc").
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BranchId(String);

impl BranchId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for BranchId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl fmt::Display for BranchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Key of a conditional directive variant declared by a template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariantKey {
    /// The placement is hosting a shop
    Shop,
    /// The placement is hosting surplus altars
    AltarOverflow,
}

/// A variant selector active in a generation context.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VariantSelector {
    Shop,
    AltarOverflow { deity: String },
}

impl VariantSelector {
    pub fn key(&self) -> VariantKey {
        match self {
            VariantSelector::Shop => VariantKey::Shop,
            VariantSelector::AltarOverflow { .. } => VariantKey::AltarOverflow,
        }
    }
}

/// Target area a template is placed into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    /// Identifier used to attach hooks
    pub id: String,
    pub width: usize,
    pub height: usize,
}

impl Region {
    pub fn new(id: impl Into<String>, width: usize, height: usize) -> Self {
        Self {
            id: id.into(),
            width,
            height,
        }
    }

    /// A region large enough for any template.
    pub fn unbounded(id: impl Into<String>) -> Self {
        Self::new(id, usize::MAX, usize::MAX)
    }

    /// Whether a grid of the given size fits.
    pub fn fits(&self, width: usize, height: usize) -> bool {
        width <= self.width && height <= self.height
    }
}

/// Where and under which conditions a pass is generating.
///
/// # Examples
///
/// ```
/// use vaultwright::GenerationContext;
///
/// let context = GenerationContext::new(12, "D")
///     .with_tag("no_monster_gen")
///     .with_param("room_purpose", "shop");
/// assert_eq!(context.depth, 12);
/// assert_eq!(context.branch.as_str(), "D");
/// assert!(context.tags.contains("no_monster_gen"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationContext {
    /// Depth within the branch (1-based)
    pub depth: i32,
    pub branch: BranchId,
    /// Free-form parameters accumulated by the caller
    #[serde(default)]
    pub params: BTreeMap<String, String>,
    /// Explicit variant selectors
    #[serde(default)]
    pub selectors: Vec<VariantSelector>,
    /// Tags active for the current placement attempt
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

impl GenerationContext {
    pub fn new(depth: i32, branch: impl Into<BranchId>) -> Self {
        Self {
            depth,
            branch: branch.into(),
            params: BTreeMap::new(),
            selectors: Vec::new(),
            tags: BTreeSet::new(),
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    pub fn with_selector(mut self, selector: VariantSelector) -> Self {
        if !self.selectors.contains(&selector) {
            self.selectors.push(selector);
        }
        self
    }
}

/// Read-only view of the context used by eligibility predicates and
/// conditional variant selection.
#[derive(Debug, Clone)]
pub struct ContextBindingLayer {
    variant_priority: Vec<VariantKey>,
    shop_sentinel: String,
    altar_overflow_prefix: String,
}

impl ContextBindingLayer {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            variant_priority: config.variant_priority.clone(),
            shop_sentinel: config.shop_sentinel.clone(),
            altar_overflow_prefix: config.altar_overflow_prefix.clone(),
        }
    }

    /// Depth and branch eligibility.
    ///
    /// A template with no depth entries, or none naming this branch, is never
    /// eligible.
    pub fn depth_eligible(&self, template: &Template, context: &GenerationContext) -> bool {
        template.depths.iter().any(|spec| {
            spec.branch
                .as_ref()
                .map_or(true, |branch| *branch == context.branch)
                && spec.range.contains(context.depth)
        })
    }

    /// Full eligibility: depth/branch, region fit and required context tags.
    pub fn is_eligible(
        &self,
        template: &Template,
        context: &GenerationContext,
        region: &Region,
    ) -> bool {
        self.depth_eligible(template, context)
            && region.fits(template.grid.width(), template.grid.height())
            && template.requires_tags.is_subset(&context.tags)
    }

    /// The selection chance applying in the context's branch, as
    /// `(successes, out_of)`. A branch-specific entry beats a wildcard one.
    pub fn chance_for(&self, template: &Template, context: &GenerationContext) -> Option<(u32, u32)> {
        template
            .chances
            .iter()
            .find(|c| c.branch.as_ref() == Some(&context.branch))
            .or_else(|| template.chances.iter().find(|c| c.branch.is_none()))
            .map(|c| (c.successes, c.out_of))
    }

    /// Converts a raw parameter value into a selector, if it names one.
    pub fn classify_parameter(&self, value: &str) -> Option<VariantSelector> {
        if value == self.shop_sentinel {
            return Some(VariantSelector::Shop);
        }
        value
            .strip_prefix(self.altar_overflow_prefix.as_str())
            .filter(|deity| !deity.is_empty())
            .map(|deity| VariantSelector::AltarOverflow {
                deity: deity.to_string(),
            })
    }

    /// All selectors active in the context: explicit ones first, then those
    /// derived from tags and parameters (in key order).
    pub fn active_selectors(&self, context: &GenerationContext) -> Vec<VariantSelector> {
        let mut selectors = context.selectors.clone();
        if context.tags.contains(&self.shop_sentinel) {
            selectors.push(VariantSelector::Shop);
        }
        for value in context.params.values() {
            if let Some(selector) = self.classify_parameter(value) {
                selectors.push(selector);
            }
        }

        let mut seen = BTreeSet::new();
        selectors.retain(|s| seen.insert(s.clone()));
        selectors
    }

    /// Picks the template variant to run.
    ///
    /// Walks the engine's priority order and returns the first variant whose
    /// key is active in the context; otherwise the default variant (if any).
    /// Selectors missing from the priority order never match.
    pub fn select_variant<'t>(
        &self,
        template: &'t Template,
        context: &GenerationContext,
    ) -> Option<&'t Variant> {
        let active = self.active_selectors(context);
        for key in &self.variant_priority {
            if !active.iter().any(|s| s.key() == *key) {
                continue;
            }
            if let Some(variant) = template.variants.iter().find(|v| v.when == Some(*key)) {
                return Some(variant);
            }
        }
        template.variants.iter().find(|v| v.when.is_none())
    }

    /// Deity supplied by the first active altar-overflow selector.
    pub fn altar_deity(&self, context: &GenerationContext) -> Option<String> {
        self.active_selectors(context)
            .into_iter()
            .find_map(|selector| match selector {
                VariantSelector::AltarOverflow { deity } => Some(deity),
                VariantSelector::Shop => None,
            })
    }
}
