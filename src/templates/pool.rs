//! # Template Pool
//!
//! Loading and validation of template records.
//!
//! Invalid records are rejected one by one: a broken template is reported as
//! a [`TemplateFailure`] and the rest of the pool stays usable.

use crate::{Directive, EngineConfig, Template, VaultError, VaultResult};
use log::{info, warn};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::path::Path;

/// A template rejected at load time, or excluded during a pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TemplateFailure {
    pub template: String,
    pub reason: String,
}

impl TemplateFailure {
    pub fn new(template: impl Into<String>, error: &VaultError) -> Self {
        Self {
            template: template.into(),
            reason: error.to_string(),
        }
    }
}

/// Read-only collection of validated templates, in load order.
#[derive(Debug, Clone, Default)]
pub struct TemplatePool {
    templates: Vec<Template>,
    index: HashMap<String, usize>,
}

impl TemplatePool {
    /// Validates and loads templates, skipping the ones that fail.
    pub fn load(records: Vec<Template>, config: &EngineConfig) -> (Self, Vec<TemplateFailure>) {
        let mut pool = Self::default();
        let mut failures = Vec::new();

        for template in records {
            let outcome = if pool.index.contains_key(&template.name) {
                Err(VaultError::InvalidTemplate(format!(
                    "duplicate template name '{}'",
                    template.name
                )))
            } else {
                validate_template(&template, config)
            };

            match outcome {
                Ok(()) => {
                    pool.index.insert(template.name.clone(), pool.templates.len());
                    pool.templates.push(template);
                }
                Err(error) => {
                    warn!("Skipping template '{}': {}", template.name, error);
                    failures.push(TemplateFailure::new(template.name.as_str(), &error));
                }
            }
        }

        info!(
            "Loaded {} templates ({} rejected)",
            pool.templates.len(),
            failures.len()
        );
        (pool, failures)
    }

    /// Loads templates from a JSON array of records.
    ///
    /// A record that does not deserialize is reported as a failure instead
    /// of aborting the whole load; only a malformed top-level document fails.
    pub fn from_json(json: &str, config: &EngineConfig) -> VaultResult<(Self, Vec<TemplateFailure>)> {
        let values: Vec<serde_json::Value> = serde_json::from_str(json)?;
        let mut records = Vec::with_capacity(values.len());
        let mut failures = Vec::new();

        for (position, value) in values.into_iter().enumerate() {
            let name = value
                .get("name")
                .and_then(|n| n.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| format!("#{}", position));
            match serde_json::from_value::<Template>(value) {
                Ok(template) => records.push(template),
                Err(error) => {
                    let error = VaultError::from(error);
                    warn!("Skipping template '{}': {}", name, error);
                    failures.push(TemplateFailure::new(name, &error));
                }
            }
        }

        let (pool, mut load_failures) = Self::load(records, config);
        failures.append(&mut load_failures);
        Ok((pool, failures))
    }

    /// Loads templates from a JSON file.
    pub fn from_path(
        path: impl AsRef<Path>,
        config: &EngineConfig,
    ) -> VaultResult<(Self, Vec<TemplateFailure>)> {
        let json = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&json, config)
    }

    pub fn get(&self, name: &str) -> Option<&Template> {
        self.index.get(name).map(|&i| &self.templates[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Template> {
        self.templates.iter()
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

/// Checks a template record before it enters the pool.
///
/// Rejects malformed distributions and directives, duplicate variants, grid
/// symbols that no directive resolves, and directives re-targeting a symbol
/// an earlier directive already resolved.
pub fn validate_template(template: &Template, config: &EngineConfig) -> VaultResult<()> {
    if template.name.trim().is_empty() {
        return Err(VaultError::InvalidTemplate(
            "template has an empty name".to_string(),
        ));
    }

    template
        .directives
        .iter()
        .chain(template.variants.iter().flat_map(|v| v.directives.iter()))
        .try_for_each(Directive::validate)?;

    if let Some(chance) = template.chances.iter().find(|c| c.out_of == 0) {
        return Err(VaultError::InvalidDistribution(format!(
            "template '{}' has chance {}/0",
            template.name, chance.successes
        )));
    }

    let mut keys = BTreeSet::new();
    for variant in &template.variants {
        if !keys.insert(variant.when) {
            return Err(VaultError::InvalidTemplate(format!(
                "template '{}' declares variant {:?} twice",
                template.name, variant.when
            )));
        }
    }

    for sequence in template.directive_sequences() {
        check_coverage(template, &sequence, config)?;
        check_conflicts(template, &sequence, &mut BTreeSet::new())?;
    }

    Ok(())
}

fn check_coverage(
    template: &Template,
    sequence: &[&Directive],
    config: &EngineConfig,
) -> VaultResult<()> {
    let covered = covered_symbols(sequence);
    let mut needed = template.grid.symbols();
    for directive in sequence {
        needed.extend(directive.produced_glyphs());
    }

    match needed
        .into_iter()
        .find(|s| !config.is_terrain(*s) && !covered.contains(s))
    {
        Some(symbol) => Err(VaultError::UnboundPlaceholder {
            template: template.name.clone(),
            symbol,
        }),
        None => Ok(()),
    }
}

/// Symbols fully resolved by a sequence. A `choose` only covers what every
/// one of its blocks covers.
fn covered_symbols(sequence: &[&Directive]) -> BTreeSet<char> {
    let mut covered = BTreeSet::new();
    for directive in sequence {
        match directive {
            Directive::Choose { blocks } => {
                let mut common: Option<BTreeSet<char>> = None;
                for alt in blocks.iter() {
                    let block: Vec<&Directive> = alt.value.iter().collect();
                    let block_covered = covered_symbols(&block);
                    common = Some(match common {
                        None => block_covered,
                        Some(prev) => prev.intersection(&block_covered).copied().collect(),
                    });
                }
                covered.extend(common.unwrap_or_default());
            }
            d if d.consumes_targets() => covered.extend(d.targets()),
            _ => {}
        }
    }
    covered
}

fn check_conflicts(
    template: &Template,
    sequence: &[&Directive],
    consumed: &mut BTreeSet<char>,
) -> VaultResult<()> {
    for directive in sequence {
        if let Directive::Choose { blocks } = directive {
            let mut merged = consumed.clone();
            for alt in blocks.iter() {
                let mut branch = consumed.clone();
                let block: Vec<&Directive> = alt.value.iter().collect();
                check_conflicts(template, &block, &mut branch)?;
                merged.extend(branch);
            }
            *consumed = merged;
            continue;
        }

        if let Some(symbol) = directive.targets().into_iter().find(|t| consumed.contains(t)) {
            return Err(VaultError::DirectiveConflict {
                template: template.name.clone(),
                symbol,
            });
        }
        for glyph in directive.produced_glyphs() {
            consumed.remove(&glyph);
        }
        if directive.consumes_targets() {
            consumed.extend(directive.targets());
        }
    }
    Ok(())
}
