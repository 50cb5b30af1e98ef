//! # Directives
//!
//! Rules describing how a template's placeholder symbols become concrete
//! terrain, features, monsters and items.
//!
//! A rule is a small tree: either a literal, or a weighted list whose entries
//! are themselves rules. Resolution descends the tree with one weighted draw
//! per level until it reaches a literal. Whole blocks of directives can also
//! be chosen by weight with [`Directive::Choose`].

use crate::{RandomSource, VaultError, VaultResult, WeightedAlternative, WeightedList};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A resolution rule producing values of `T`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule<T> {
    /// Always produces this value
    Literal(T),
    /// Picks one sub-rule by weight, then resolves it
    Weighted(WeightedList<Rule<T>>),
}

impl<T> Rule<T> {
    /// Builds a weighted rule whose entries are literals.
    ///
    /// # Examples
    ///
    /// ```
    /// use vaultwright::{RandomSource, Rule};
    ///
    /// let rule = Rule::weighted(vec![('x', 1), ('.', 1)]);
    /// let mut rng = RandomSource::seeded(3);
    /// let value = rule.resolve(&mut rng).unwrap();
    /// assert!(*value == 'x' || *value == '.');
    /// ```
    pub fn weighted(pairs: impl IntoIterator<Item = (T, u32)>) -> Self {
        Rule::Weighted(WeightedList::new(
            pairs
                .into_iter()
                .map(|(value, weight)| WeightedAlternative::new(Rule::Literal(value), weight))
                .collect(),
        ))
    }

    /// Resolves the rule down to a literal.
    pub fn resolve(&self, rng: &mut RandomSource) -> VaultResult<&T> {
        match self {
            Rule::Literal(value) => Ok(value),
            Rule::Weighted(list) => list.choose(rng)?.resolve(rng),
        }
    }

    /// Checks every weighted list in the tree.
    pub fn validate(&self) -> VaultResult<()> {
        match self {
            Rule::Literal(_) => Ok(()),
            Rule::Weighted(list) => {
                list.validate()?;
                list.iter().try_for_each(|alt| alt.value.validate())
            }
        }
    }

    /// Every literal reachable in the tree.
    pub fn literals(&self) -> Vec<&T> {
        match self {
            Rule::Literal(value) => vec![value],
            Rule::Weighted(list) => list.iter().flat_map(|alt| alt.value.literals()).collect(),
        }
    }
}

/// Quality qualifier for generated items.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemQuality {
    #[default]
    Ordinary,
    Good,
    Excellent,
}

/// Inclusive quantity range, resolved once per placed item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quantity {
    pub min: u32,
    pub max: u32,
}

impl Quantity {
    pub fn exactly(amount: u32) -> Self {
        Self {
            min: amount,
            max: amount,
        }
    }
}

/// Item descriptor with optional modifiers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemSpec {
    /// Item base name (e.g. "potion of curing")
    pub name: String,
    #[serde(default)]
    pub quantity: Option<Quantity>,
    /// Enchantment bonus
    #[serde(default)]
    pub plus: Option<i32>,
    /// Ego / brand name
    #[serde(default)]
    pub ego: Option<String>,
    #[serde(default)]
    pub quality: ItemQuality,
}

impl ItemSpec {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            quantity: None,
            plus: None,
            ego: None,
            quality: ItemQuality::Ordinary,
        }
    }

    pub fn validate(&self) -> VaultResult<()> {
        match self.quantity {
            Some(q) if q.min > q.max => Err(VaultError::InvalidDirective(format!(
                "item '{}' has quantity range {}-{}",
                self.name, q.min, q.max
            ))),
            _ => Ok(()),
        }
    }
}

/// Monster descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonsterSpec {
    /// Species name
    pub name: String,
    /// Whether the monster arrives with its usual band
    #[serde(default)]
    pub band: bool,
}

impl MonsterSpec {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            band: false,
        }
    }
}

/// Dungeon feature descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeatureSpec {
    /// Plain terrain feature (fountain, statue, trap, ...)
    Terrain { name: String },
    /// A shop of the given kind, optionally with a name suffix and fixed stock
    Shop {
        kind: String,
        #[serde(default)]
        suffix: Option<String>,
        #[serde(default)]
        stock: Vec<ItemSpec>,
    },
    /// An altar; without a deity the context's altar-overflow deity is used
    Altar {
        #[serde(default)]
        deity: Option<String>,
    },
}

impl FeatureSpec {
    pub fn terrain(name: impl Into<String>) -> Self {
        FeatureSpec::Terrain { name: name.into() }
    }

    pub fn validate(&self) -> VaultResult<()> {
        match self {
            FeatureSpec::Shop { stock, .. } => stock.iter().try_for_each(ItemSpec::validate),
            _ => Ok(()),
        }
    }
}

/// A rule describing how one or more placeholders are resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Directive {
    /// Replace each listed symbol with a glyph drawn from `rule`.
    Substitute {
        symbols: Vec<char>,
        rule: Rule<char>,
        /// One draw shared by every occurrence instead of one per occurrence
        #[serde(default)]
        shared: bool,
    },
    /// Exactly `count` occurrences get `primary`, the rest get `fallback`.
    SubstituteCount {
        symbol: char,
        count: usize,
        primary: Rule<char>,
        fallback: Rule<char>,
    },
    /// Randomly permute equally sized symbol groups.
    Permute { groups: Vec<Vec<char>> },
    BindFeature {
        symbol: char,
        rule: Rule<FeatureSpec>,
        #[serde(default)]
        shared: bool,
    },
    BindMonster {
        symbol: char,
        rule: Rule<MonsterSpec>,
        #[serde(default)]
        shared: bool,
    },
    BindItem {
        symbol: char,
        rule: Rule<ItemSpec>,
        #[serde(default)]
        shared: bool,
    },
    /// Pick one block of directives by weight and run it in place.
    Choose { blocks: WeightedList<Vec<Directive>> },
}

impl Directive {
    /// Short name for log and error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Directive::Substitute { .. } => "substitute",
            Directive::SubstituteCount { .. } => "substitute_count",
            Directive::Permute { .. } => "permute",
            Directive::BindFeature { .. } => "bind_feature",
            Directive::BindMonster { .. } => "bind_monster",
            Directive::BindItem { .. } => "bind_item",
            Directive::Choose { .. } => "choose",
        }
    }

    /// Symbols this directive rewrites or binds (excluding nested blocks).
    pub fn targets(&self) -> Vec<char> {
        match self {
            Directive::Substitute { symbols, .. } => symbols.clone(),
            Directive::SubstituteCount { symbol, .. }
            | Directive::BindFeature { symbol, .. }
            | Directive::BindMonster { symbol, .. }
            | Directive::BindItem { symbol, .. } => vec![*symbol],
            Directive::Permute { groups } => groups.iter().flatten().copied().collect(),
            Directive::Choose { .. } => Vec::new(),
        }
    }

    /// Whether the directive fully resolves its targets.
    ///
    /// Permutations only rename symbols; the renamed symbols still need a
    /// later directive.
    pub fn consumes_targets(&self) -> bool {
        !matches!(self, Directive::Permute { .. } | Directive::Choose { .. })
    }

    /// Glyphs this directive may write into the grid, including nested blocks.
    pub fn produced_glyphs(&self) -> BTreeSet<char> {
        match self {
            Directive::Substitute { rule, .. } => rule.literals().into_iter().copied().collect(),
            Directive::SubstituteCount {
                primary, fallback, ..
            } => primary
                .literals()
                .into_iter()
                .chain(fallback.literals())
                .copied()
                .collect(),
            Directive::Permute { groups } => groups.iter().flatten().copied().collect(),
            Directive::Choose { blocks } => blocks
                .iter()
                .flat_map(|alt| alt.value.iter().flat_map(Directive::produced_glyphs))
                .collect(),
            Directive::BindFeature { .. }
            | Directive::BindMonster { .. }
            | Directive::BindItem { .. } => BTreeSet::new(),
        }
    }

    /// Checks distributions and shape constraints, recursively.
    pub fn validate(&self) -> VaultResult<()> {
        match self {
            Directive::Substitute { symbols, rule, .. } => {
                if symbols.is_empty() {
                    return Err(VaultError::InvalidDirective(
                        "substitute names no symbols".to_string(),
                    ));
                }
                rule.validate()
            }
            Directive::SubstituteCount {
                primary, fallback, ..
            } => {
                primary.validate()?;
                fallback.validate()
            }
            Directive::Permute { groups } => {
                if groups.len() < 2 {
                    return Err(VaultError::InvalidDirective(
                        "permute needs at least two groups".to_string(),
                    ));
                }
                let size = groups[0].len();
                if size == 0 || groups.iter().any(|g| g.len() != size) {
                    return Err(VaultError::InvalidDirective(format!(
                        "permute groups must be non-empty and of equal size: {:?}",
                        groups
                    )));
                }
                let distinct: BTreeSet<char> = groups.iter().flatten().copied().collect();
                if distinct.len() != size * groups.len() {
                    return Err(VaultError::InvalidDirective(format!(
                        "permute groups repeat a symbol: {:?}",
                        groups
                    )));
                }
                Ok(())
            }
            Directive::BindFeature { rule, .. } => {
                rule.validate()?;
                rule.literals().into_iter().try_for_each(FeatureSpec::validate)
            }
            Directive::BindMonster { rule, .. } => rule.validate(),
            Directive::BindItem { rule, .. } => {
                rule.validate()?;
                rule.literals().into_iter().try_for_each(ItemSpec::validate)
            }
            Directive::Choose { blocks } => {
                blocks.validate()?;
                blocks
                    .iter()
                    .flat_map(|alt| alt.value.iter())
                    .try_for_each(Directive::validate)
            }
        }
    }
}
