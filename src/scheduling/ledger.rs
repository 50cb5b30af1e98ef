//! Per-pass bookkeeping: satisfied uniqueness constraints, excluded templates and
//! requests that came up short.

use crate::{EngineConfig, PlacementRequest, Selector, Template, TemplateFailure, VaultError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Uniqueness constraints satisfied so far in one pass.
///
/// A plain unique tag retires the template that carried it; a group tag
/// retires every template in the group.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UniquenessLedger {
    templates: BTreeSet<String>,
    groups: BTreeSet<String>,
}

impl UniquenessLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the template, or one of its groups, was already placed.
    pub fn blocks(&self, template: &Template, config: &EngineConfig) -> bool {
        let unique = template.tags.iter().any(|tag| config.is_unique_tag(tag));
        (unique && self.templates.contains(&template.name))
            || template
                .tags
                .iter()
                .any(|tag| config.is_unique_group(tag) && self.groups.contains(tag))
    }

    /// Records a placed template against its uniqueness constraints.
    pub fn record(&mut self, template: &Template, config: &EngineConfig) {
        for tag in &template.tags {
            if config.is_unique_tag(tag) {
                self.templates.insert(template.name.clone());
            } else if config.is_unique_group(tag) {
                self.groups.insert(tag.clone());
            }
        }
    }

    /// Whether a uniquely tagged template was placed.
    pub fn is_placed(&self, template: &str) -> bool {
        self.templates.contains(template)
    }

    /// Whether a group tag is used up.
    pub fn is_satisfied(&self, group: &str) -> bool {
        self.groups.contains(group)
    }
}

/// A request that placed fewer templates than it asked for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shortfall {
    pub selector: Selector,
    pub region: String,
    pub requested: u32,
    pub placed: u32,
}

/// Mutable state threaded through every request of one pass.
#[derive(Debug, Clone, Default)]
pub struct PassState {
    pub ledger: UniquenessLedger,
    excluded: BTreeSet<String>,
    failures: Vec<TemplateFailure>,
    shortfalls: Vec<Shortfall>,
}

impl PassState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes a template from selection for the rest of the pass.
    pub fn exclude(&mut self, template: &str, error: &VaultError) {
        if self.excluded.insert(template.to_string()) {
            self.failures.push(TemplateFailure::new(template, error));
        }
    }

    pub fn is_excluded(&self, template: &str) -> bool {
        self.excluded.contains(template)
    }

    pub fn record_shortfall(&mut self, request: &PlacementRequest, placed: u32) {
        self.shortfalls.push(Shortfall {
            selector: request.selector.clone(),
            region: request.region.id.clone(),
            requested: request.count,
            placed,
        });
    }

    pub fn failures(&self) -> &[TemplateFailure] {
        &self.failures
    }

    pub fn shortfalls(&self) -> &[Shortfall] {
        &self.shortfalls
    }

    pub(crate) fn into_parts(self) -> (Vec<TemplateFailure>, Vec<Shortfall>) {
        (self.failures, self.shortfalls)
    }
}
