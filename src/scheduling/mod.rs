//! # Scheduling Module
//!
//! Selection and placement of templates for a generation pass.
//!
//! The [`PlacementScheduler`] answers placement requests ("three templates
//! tagged `shop` in this region") against a read-only [`TemplatePool`]. It
//! filters candidates through the [`ContextBindingLayer`], picks among them
//! by weight, resolves the winner and records it in the pass's
//! [`UniquenessLedger`]. Post-placement callbacks live in [`hooks`], the
//! per-pass state in [`ledger`] and [`pass`], and the shop-count policy in
//! [`shops`].

pub mod hooks;
pub mod ledger;
pub mod pass;
pub mod shops;

pub use hooks::*;
pub use ledger::*;
pub use pass::*;
pub use shops::*;

use crate::{
    weighted_index, ContextBindingLayer, EngineConfig, GenerationContext, PlacedBinding,
    RandomSource, Region, ResolvedTemplate, Template, TemplatePool,
    TemplateSubstitutionResolver, VariantKey, VaultError, VaultResult,
};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Which templates a request may pick from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "by", content = "value", rename_all = "snake_case")]
pub enum Selector {
    /// Any eligible template with non-zero weight
    Any,
    /// Eligible templates carrying the tag, with non-zero weight
    Tag(String),
    /// Exactly the named template, whatever its weight
    Name(String),
}

impl Selector {
    pub fn matches(&self, template: &Template) -> bool {
        match self {
            Selector::Any => template.weight > 0,
            Selector::Tag(tag) => template.weight > 0 && template.has_tag(tag),
            Selector::Name(name) => template.name == *name,
        }
    }
}

/// An `x` in `y` chance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chance {
    pub successes: u32,
    pub out_of: u32,
}

/// A request for placements in one region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacementRequest {
    pub selector: Selector,
    pub count: u32,
    pub region: Region,
    /// Gate drawn before every placement attempt
    #[serde(default)]
    pub chance: Option<Chance>,
}

impl PlacementRequest {
    pub fn any(region: Region, count: u32) -> Self {
        Self {
            selector: Selector::Any,
            count,
            region,
            chance: None,
        }
    }

    pub fn by_tag(tag: impl Into<String>, region: Region, count: u32) -> Self {
        Self {
            selector: Selector::Tag(tag.into()),
            count,
            region,
            chance: None,
        }
    }

    pub fn by_name(name: impl Into<String>, region: Region) -> Self {
        Self {
            selector: Selector::Name(name.into()),
            count: 1,
            region,
            chance: None,
        }
    }

    pub fn with_chance(mut self, successes: u32, out_of: u32) -> Self {
        self.chance = Some(Chance { successes, out_of });
        self
    }
}

/// A fully resolved placement, ready for the level builder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacementResult {
    pub template: String,
    /// Region the placement was requested for
    pub region: String,
    pub tags: BTreeSet<String>,
    pub variant: Option<VariantKey>,
    /// Resolved grid rows
    pub grid: Vec<String>,
    pub bindings: Vec<PlacedBinding>,
}

impl PlacementResult {
    fn new(template: &Template, region: &Region, resolved: ResolvedTemplate) -> Self {
        Self {
            template: template.name.clone(),
            region: region.id.clone(),
            tags: template.tags.clone(),
            variant: resolved.variant,
            grid: resolved.grid.to_rows(),
            bindings: resolved.bindings,
        }
    }
}

/// Selects, resolves and records template placements.
#[derive(Debug, Clone)]
pub struct PlacementScheduler<'p> {
    pool: &'p TemplatePool,
    config: EngineConfig,
    layer: ContextBindingLayer,
    resolver: TemplateSubstitutionResolver,
}

impl<'p> PlacementScheduler<'p> {
    pub fn new(pool: &'p TemplatePool, config: &EngineConfig) -> Self {
        Self {
            pool,
            config: config.clone(),
            layer: ContextBindingLayer::new(config),
            resolver: TemplateSubstitutionResolver::new(config),
        }
    }

    pub fn pool(&self) -> &'p TemplatePool {
        self.pool
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Places up to `request.count` templates.
    ///
    /// Returns fewer results when the request's chance gate fails or when
    /// candidates run out; running out is recorded as a shortfall in `state`.
    /// Templates that fail to resolve are excluded for the rest of the pass
    /// and selection is retried. Errors fatal to the pass are returned, as is
    /// `UnknownTemplate` for a by-name request the pool cannot satisfy.
    pub fn schedule(
        &self,
        request: &PlacementRequest,
        context: &GenerationContext,
        state: &mut PassState,
        rng: &mut RandomSource,
    ) -> VaultResult<Vec<PlacementResult>> {
        if let Selector::Name(name) = &request.selector {
            if self.pool.get(name).is_none() {
                return Err(VaultError::UnknownTemplate(name.clone()));
            }
        }

        let mut results = Vec::new();
        let mut exhausted = false;

        for _ in 0..request.count {
            if let Some(gate) = request.chance {
                if !rng.chance(gate.successes, gate.out_of)? {
                    debug!("Placement attempt for {:?} skipped by chance gate", request.selector);
                    continue;
                }
            }

            match self.place_one(request, context, state, rng)? {
                Some(result) => results.push(result),
                None => {
                    exhausted = true;
                    break;
                }
            }
        }

        if exhausted {
            warn!(
                "Request {:?} in region '{}' placed {} of {}",
                request.selector,
                request.region.id,
                results.len(),
                request.count
            );
            state.record_shortfall(request, results.len() as u32);
        }

        Ok(results)
    }

    /// Templates that may be picked for this attempt, in pool order.
    ///
    /// Draws one chance roll per otherwise-eligible template carrying a
    /// selection chance.
    fn candidates(
        &self,
        request: &PlacementRequest,
        context: &GenerationContext,
        state: &PassState,
        rng: &mut RandomSource,
    ) -> VaultResult<Vec<&'p Template>> {
        let mut candidates = Vec::new();
        for template in self.pool.iter() {
            if !request.selector.matches(template)
                || state.is_excluded(&template.name)
                || state.ledger.blocks(template, &self.config)
                || !self.layer.is_eligible(template, context, &request.region)
            {
                continue;
            }
            if let Some((successes, out_of)) = self.layer.chance_for(template, context) {
                if !rng.chance(successes, out_of)? {
                    continue;
                }
            }
            candidates.push(template);
        }
        Ok(candidates)
    }

    fn place_one(
        &self,
        request: &PlacementRequest,
        context: &GenerationContext,
        state: &mut PassState,
        rng: &mut RandomSource,
    ) -> VaultResult<Option<PlacementResult>> {
        loop {
            let candidates = self.candidates(request, context, state, rng)?;
            let chosen = match candidates.len() {
                0 => return Ok(None),
                1 => candidates[0],
                _ => candidates[weighted_index(candidates.iter().map(|t| t.weight), rng)?],
            };

            match self.resolver.resolve(chosen, context, rng) {
                Ok(resolved) => {
                    debug!(
                        "Placed '{}' in region '{}' at depth {}",
                        chosen.name, request.region.id, context.depth
                    );
                    state.ledger.record(chosen, &self.config);
                    return Ok(Some(PlacementResult::new(chosen, &request.region, resolved)));
                }
                Err(error) if error.is_fatal_to_pass() => return Err(error),
                Err(error) => {
                    warn!("Excluding template '{}' for this pass: {}", chosen.name, error);
                    state.exclude(&chosen.name, &error);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Directive, GenerationConfig, Grid, MonsterSpec, Rule};

    fn floor_template(name: &str) -> Template {
        Template::new(name, Grid::from_rows(&["xAx"]).unwrap())
            .with_depths(1, None)
            .with_directive(Directive::Substitute {
                symbols: vec!['A'],
                rule: Rule::Literal('.'),
                shared: false,
            })
    }

    fn pool(templates: Vec<Template>) -> TemplatePool {
        let (pool, failures) = TemplatePool::load(templates, &EngineConfig::default());
        assert!(failures.is_empty(), "{:?}", failures);
        pool
    }

    fn rng() -> RandomSource {
        RandomSource::from_config(&GenerationConfig::new(2024)).unwrap()
    }

    #[test]
    fn test_selector_matching() {
        let template = floor_template("a").with_tag("shop");
        assert!(Selector::Any.matches(&template));
        assert!(Selector::Tag("shop".to_string()).matches(&template));
        assert!(!Selector::Tag("altar".to_string()).matches(&template));
        assert!(Selector::Name("a".to_string()).matches(&template));

        let hidden = floor_template("hidden").with_weight(0);
        assert!(!Selector::Any.matches(&hidden));
        assert!(Selector::Name("hidden".to_string()).matches(&hidden));
    }

    #[test]
    fn test_schedule_fills_count() {
        let pool = pool(vec![floor_template("a"), floor_template("b")]);
        let scheduler = PlacementScheduler::new(&pool, &EngineConfig::default());
        let mut state = PassState::new();
        let request = PlacementRequest::any(Region::unbounded("level"), 5);

        let results = scheduler
            .schedule(&request, &GenerationContext::new(3, "D"), &mut state, &mut rng())
            .unwrap();
        assert_eq!(results.len(), 5);
        assert!(results.iter().all(|r| r.grid == vec!["x.x".to_string()]));
        assert!(state.shortfalls().is_empty());
    }

    #[test]
    fn test_unique_template_placed_once() {
        let pool = pool(vec![floor_template("once").with_tag("unique")]);
        let scheduler = PlacementScheduler::new(&pool, &EngineConfig::default());
        let mut state = PassState::new();
        let request = PlacementRequest::any(Region::unbounded("level"), 3);

        let results = scheduler
            .schedule(&request, &GenerationContext::new(3, "D"), &mut state, &mut rng())
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(state.shortfalls().len(), 1);
        assert_eq!(state.shortfalls()[0].placed, 1);
    }

    #[test]
    fn test_zero_weight_only_by_name() {
        let pool = pool(vec![floor_template("secret").with_weight(0)]);
        let scheduler = PlacementScheduler::new(&pool, &EngineConfig::default());
        let context = GenerationContext::new(3, "D");
        let mut state = PassState::new();
        let mut rng = rng();

        let any = scheduler
            .schedule(&PlacementRequest::any(Region::unbounded("r"), 1), &context, &mut state, &mut rng)
            .unwrap();
        assert!(any.is_empty());

        let named = scheduler
            .schedule(
                &PlacementRequest::by_name("secret", Region::unbounded("r")),
                &context,
                &mut state,
                &mut rng,
            )
            .unwrap();
        assert_eq!(named.len(), 1);
    }

    #[test]
    fn test_failing_template_is_excluded_and_retried() {
        // Passes load validation, but the altar needs a deity the context lacks.
        let altar = Template::new("altar", Grid::from_rows(&["_"]).unwrap())
            .with_depths(1, None)
            .with_weight(1000)
            .with_directive(Directive::BindFeature {
                symbol: '_',
                rule: Rule::Literal(crate::FeatureSpec::Altar { deity: None }),
                shared: false,
            });
        let pool = pool(vec![altar, floor_template("plain")]);
        let scheduler = PlacementScheduler::new(&pool, &EngineConfig::default());
        let mut state = PassState::new();

        let results = scheduler
            .schedule(
                &PlacementRequest::any(Region::unbounded("r"), 2),
                &GenerationContext::new(1, "D"),
                &mut state,
                &mut rng(),
            )
            .unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.template == "plain"));
        assert!(state.is_excluded("altar"));
        assert_eq!(state.failures().len(), 1);
    }

    #[test]
    fn test_unknown_name_is_an_error() {
        let pool = pool(vec![floor_template("a")]);
        let scheduler = PlacementScheduler::new(&pool, &EngineConfig::default());
        let result = scheduler.schedule(
            &PlacementRequest::by_name("missing", Region::unbounded("r")),
            &GenerationContext::new(1, "D"),
            &mut PassState::new(),
            &mut rng(),
        );
        assert!(matches!(result, Err(VaultError::UnknownTemplate(_))));
    }

    #[test]
    fn test_request_chance_gate() {
        let pool = pool(vec![floor_template("a")]);
        let scheduler = PlacementScheduler::new(&pool, &EngineConfig::default());
        let mut state = PassState::new();
        let request = PlacementRequest::any(Region::unbounded("r"), 50).with_chance(0, 1);

        let results = scheduler
            .schedule(&request, &GenerationContext::new(1, "D"), &mut state, &mut rng())
            .unwrap();
        assert!(results.is_empty());
        // Gated attempts are not a shortfall.
        assert!(state.shortfalls().is_empty());
    }

    #[test]
    fn test_template_chance_zero_never_selected() {
        let pool = pool(vec![floor_template("never").with_chance(None, 0, 10)]);
        let scheduler = PlacementScheduler::new(&pool, &EngineConfig::default());
        let mut state = PassState::new();
        let results = scheduler
            .schedule(
                &PlacementRequest::any(Region::unbounded("r"), 3),
                &GenerationContext::new(1, "D"),
                &mut state,
                &mut rng(),
            )
            .unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_template_chance_gates_selection_frequency() {
        // "rare" dominates the weights, so how often it wins tracks its 1 in 4 gate.
        let pool = pool(vec![
            floor_template("rare").with_chance(None, 1, 4).with_weight(1000),
            floor_template("common"),
        ]);
        let scheduler = PlacementScheduler::new(&pool, &EngineConfig::default());
        let context = GenerationContext::new(1, "D");
        let mut rng = rng();

        let trials = 4000;
        let mut rare = 0;
        for _ in 0..trials {
            let mut state = PassState::new();
            let results = scheduler
                .schedule(
                    &PlacementRequest::any(Region::unbounded("r"), 1),
                    &context,
                    &mut state,
                    &mut rng,
                )
                .unwrap();
            assert_eq!(results.len(), 1);
            if results[0].template == "rare" {
                rare += 1;
            }
        }

        let frequency = rare as f64 / trials as f64;
        assert!((frequency - 0.25).abs() < 0.03, "rare placed {}", frequency);
    }

    #[test]
    fn test_placement_result_carries_bindings() {
        let template = Template::new("den", Grid::from_rows(&["x1x"]).unwrap())
            .with_depths(1, None)
            .with_tag("lair")
            .with_directive(Directive::BindMonster {
                symbol: '1',
                rule: Rule::Literal(MonsterSpec::named("wolf")),
                shared: false,
            });
        let pool = pool(vec![template]);
        let scheduler = PlacementScheduler::new(&pool, &EngineConfig::default());
        let mut state = PassState::new();
        let results = scheduler
            .schedule(
                &PlacementRequest::by_tag("lair", Region::new("cave", 10, 10), 1),
                &GenerationContext::new(1, "D"),
                &mut state,
                &mut rng(),
            )
            .unwrap();
        assert_eq!(results[0].region, "cave");
        assert!(results[0].tags.contains("lair"));
        assert_eq!(results[0].bindings.len(), 1);
        assert_eq!(results[0].bindings[0].x, 1);
    }
}
