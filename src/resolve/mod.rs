//! # Resolution Module
//!
//! Turns one template into a concrete grid plus feature, monster and item
//! bindings.
//!
//! Directives run in declaration order: first the template's common
//! directives, then the variant picked by the [`ContextBindingLayer`]. Every
//! random draw happens in a fixed order (directive order, then row-major cell
//! order), which keeps resolution reproducible for a given stream.

use crate::{
    ContextBindingLayer, Directive, EngineConfig, FeatureSpec, GenerationContext, Grid,
    ItemQuality, ItemSpec, MonsterSpec, RandomSource, Template, VariantKey, VaultError,
    VaultResult,
};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A resolved item with concrete quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemBinding {
    pub name: String,
    pub quantity: u32,
    pub plus: Option<i32>,
    pub ego: Option<String>,
    pub quality: ItemQuality,
}

/// A resolved dungeon feature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeatureBinding {
    Terrain {
        name: String,
    },
    Shop {
        kind: String,
        suffix: Option<String>,
        stock: Vec<ItemBinding>,
    },
    Altar {
        deity: String,
    },
}

/// Concrete content bound to a grid cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "category", rename_all = "snake_case")]
pub enum Binding {
    Feature { feature: FeatureBinding },
    Monster { monster: MonsterSpec },
    Item { item: ItemBinding },
}

/// A binding at a grid position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacedBinding {
    pub x: usize,
    pub y: usize,
    /// Grid symbol the binding was attached to
    pub symbol: char,
    pub binding: Binding,
}

/// Output of resolving a single template.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedTemplate {
    pub grid: Grid,
    pub bindings: Vec<PlacedBinding>,
    /// Variant that ran, if a keyed one was selected
    pub variant: Option<VariantKey>,
}

/// Working state while one template resolves.
struct Resolution<'a> {
    template: &'a str,
    grid: Grid,
    consumed: BTreeSet<char>,
    bound_cells: BTreeSet<(usize, usize)>,
    bindings: Vec<PlacedBinding>,
    deity: Option<String>,
}

impl Resolution<'_> {
    /// Unbound positions of `symbol`, row-major.
    fn live_positions(&self, symbol: char) -> Vec<(usize, usize)> {
        self.grid
            .positions_of(symbol)
            .into_iter()
            .filter(|pos| !self.bound_cells.contains(pos))
            .collect()
    }

    fn claim(&self, symbols: &[char]) -> VaultResult<()> {
        match symbols.iter().find(|s| self.consumed.contains(*s)) {
            Some(&symbol) => Err(VaultError::DirectiveConflict {
                template: self.template.to_string(),
                symbol,
            }),
            None => Ok(()),
        }
    }

    /// Writes glyphs and marks the targets resolved; written glyphs become
    /// targetable again.
    fn write(&mut self, targets: &[char], writes: Vec<((usize, usize), char)>) {
        for ((x, y), glyph) in writes {
            self.grid.set(x, y, glyph);
            self.consumed.remove(&glyph);
        }
        self.consumed.extend(targets.iter().copied());
    }

    fn bind(&mut self, symbol: char, placed: Vec<((usize, usize), Binding)>) {
        for ((x, y), binding) in placed {
            self.bound_cells.insert((x, y));
            self.bindings.push(PlacedBinding {
                x,
                y,
                symbol,
                binding,
            });
        }
        self.consumed.insert(symbol);
    }
}

/// Resolves template placeholders into concrete content.
#[derive(Debug, Clone)]
pub struct TemplateSubstitutionResolver {
    layer: ContextBindingLayer,
    terrain_glyphs: String,
}

impl TemplateSubstitutionResolver {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            layer: ContextBindingLayer::new(config),
            terrain_glyphs: config.terrain_glyphs.clone(),
        }
    }

    /// Resolves every placeholder of `template` in `context`.
    ///
    /// Fails with [`VaultError::DirectiveConflict`] when a directive targets
    /// an already resolved symbol, and with [`VaultError::UnboundPlaceholder`]
    /// when a non-terrain cell is left without a binding.
    pub fn resolve(
        &self,
        template: &Template,
        context: &GenerationContext,
        rng: &mut RandomSource,
    ) -> VaultResult<ResolvedTemplate> {
        let mut state = Resolution {
            template: &template.name,
            grid: template.grid.clone(),
            consumed: BTreeSet::new(),
            bound_cells: BTreeSet::new(),
            bindings: Vec::new(),
            deity: self.layer.altar_deity(context),
        };

        let common: Vec<&Directive> = template.directives.iter().collect();
        self.run_sequence(&common, &mut state, rng)?;

        let variant = self.layer.select_variant(template, context);
        if let Some(variant) = variant {
            debug!("Template '{}' runs variant {:?}", template.name, variant.when);
            let directives: Vec<&Directive> = variant.directives.iter().collect();
            self.run_sequence(&directives, &mut state, rng)?;
        }

        for (y, row) in state.grid.to_rows().iter().enumerate() {
            for (x, symbol) in row.chars().enumerate() {
                if !self.terrain_glyphs.contains(symbol) && !state.bound_cells.contains(&(x, y)) {
                    return Err(VaultError::UnboundPlaceholder {
                        template: template.name.clone(),
                        symbol,
                    });
                }
            }
        }

        Ok(ResolvedTemplate {
            grid: state.grid,
            bindings: state.bindings,
            variant: variant.and_then(|v| v.when),
        })
    }

    fn run_sequence(
        &self,
        directives: &[&Directive],
        state: &mut Resolution<'_>,
        rng: &mut RandomSource,
    ) -> VaultResult<()> {
        for directive in directives {
            self.apply(directive, state, rng)?;
        }
        Ok(())
    }

    fn apply(
        &self,
        directive: &Directive,
        state: &mut Resolution<'_>,
        rng: &mut RandomSource,
    ) -> VaultResult<()> {
        match directive {
            Directive::Substitute {
                symbols,
                rule,
                shared,
            } => {
                state.claim(symbols)?;
                let targets: Vec<Vec<(usize, usize)>> =
                    symbols.iter().map(|&s| state.live_positions(s)).collect();
                let mut writes = Vec::new();
                for positions in targets {
                    if positions.is_empty() {
                        continue;
                    }
                    let shared_glyph = if *shared {
                        Some(*rule.resolve(rng)?)
                    } else {
                        None
                    };
                    for pos in positions {
                        let glyph = match shared_glyph {
                            Some(glyph) => glyph,
                            None => *rule.resolve(rng)?,
                        };
                        writes.push((pos, glyph));
                    }
                }
                state.write(symbols, writes);
            }

            Directive::SubstituteCount {
                symbol,
                count,
                primary,
                fallback,
            } => {
                state.claim(&[*symbol])?;
                let positions = state.live_positions(*symbol);
                let chosen = rng.sample_indices(positions.len(), *count)?;
                let mut writes = Vec::with_capacity(positions.len());
                for (i, pos) in positions.into_iter().enumerate() {
                    let rule = if chosen.binary_search(&i).is_ok() {
                        primary
                    } else {
                        fallback
                    };
                    writes.push((pos, *rule.resolve(rng)?));
                }
                state.write(&[*symbol], writes);
            }

            Directive::Permute { groups } => {
                let symbols: Vec<char> = groups.iter().flatten().copied().collect();
                state.claim(&symbols)?;

                let mut order: Vec<usize> = (0..groups.len()).collect();
                rng.shuffle(&mut order)?;

                let mut writes = Vec::new();
                for (from, &to) in order.iter().enumerate() {
                    for (j, &symbol) in groups[from].iter().enumerate() {
                        let replacement = groups[to][j];
                        for pos in state.live_positions(symbol) {
                            writes.push((pos, replacement));
                        }
                    }
                }
                // Renamed symbols stay open for later directives.
                state.write(&[], writes);
            }

            Directive::BindFeature {
                symbol,
                rule,
                shared,
            } => {
                let deity = state.deity.clone();
                self.bind_each(state, *symbol, *shared, rng, |rng| {
                    let feature = resolve_feature(rule.resolve(rng)?, deity.as_deref(), rng)?;
                    Ok(Binding::Feature { feature })
                })?;
            }

            Directive::BindMonster {
                symbol,
                rule,
                shared,
            } => {
                self.bind_each(state, *symbol, *shared, rng, |rng| {
                    Ok(Binding::Monster {
                        monster: rule.resolve(rng)?.clone(),
                    })
                })?;
            }

            Directive::BindItem {
                symbol,
                rule,
                shared,
            } => {
                self.bind_each(state, *symbol, *shared, rng, |rng| {
                    Ok(Binding::Item {
                        item: resolve_item(rule.resolve(rng)?, rng)?,
                    })
                })?;
            }

            Directive::Choose { blocks } => {
                let block: Vec<&Directive> = blocks.choose(rng)?.iter().collect();
                self.run_sequence(&block, state, rng)?;
            }
        }
        Ok(())
    }

    /// Binds every live occurrence of `symbol`, drawing once per occurrence
    /// or once in total when `shared`.
    fn bind_each<F>(
        &self,
        state: &mut Resolution<'_>,
        symbol: char,
        shared: bool,
        rng: &mut RandomSource,
        mut draw: F,
    ) -> VaultResult<()>
    where
        F: FnMut(&mut RandomSource) -> VaultResult<Binding>,
    {
        state.claim(&[symbol])?;
        let positions = state.live_positions(symbol);
        let mut placed = Vec::with_capacity(positions.len());

        if shared && !positions.is_empty() {
            let binding = draw(rng)?;
            placed.extend(positions.into_iter().map(|pos| (pos, binding.clone())));
        } else {
            for pos in positions {
                placed.push((pos, draw(rng)?));
            }
        }

        state.bind(symbol, placed);
        Ok(())
    }
}

/// Resolves an item descriptor, drawing its quantity when it is a range.
pub fn resolve_item(spec: &ItemSpec, rng: &mut RandomSource) -> VaultResult<ItemBinding> {
    let quantity = match spec.quantity {
        None => 1,
        Some(q) if q.min == q.max => q.min,
        Some(q) => rng.uniform_int(i64::from(q.min), i64::from(q.max))? as u32,
    };
    Ok(ItemBinding {
        name: spec.name.clone(),
        quantity,
        plus: spec.plus,
        ego: spec.ego.clone(),
        quality: spec.quality,
    })
}

/// Resolves a feature descriptor; altars without a deity take the context's.
pub fn resolve_feature(
    spec: &FeatureSpec,
    context_deity: Option<&str>,
    rng: &mut RandomSource,
) -> VaultResult<FeatureBinding> {
    Ok(match spec {
        FeatureSpec::Terrain { name } => FeatureBinding::Terrain { name: name.clone() },
        FeatureSpec::Shop {
            kind,
            suffix,
            stock,
        } => FeatureBinding::Shop {
            kind: kind.clone(),
            suffix: suffix.clone(),
            stock: stock
                .iter()
                .map(|item| resolve_item(item, rng))
                .collect::<VaultResult<Vec<_>>>()?,
        },
        FeatureSpec::Altar { deity } => FeatureBinding::Altar {
            deity: deity
                .as_deref()
                .or(context_deity)
                .map(str::to_string)
                .ok_or_else(|| {
                    VaultError::InvalidDirective(
                        "altar has no deity and the context supplies none".to_string(),
                    )
                })?,
        },
    })
}
