//! # Generation Pass
//!
//! One pass owns the random source, the context and the uniqueness state for
//! a single level. Passes share nothing but the read-only pool, so several
//! can run side by side.

use crate::{
    GenerationConfig, GenerationContext, HookSequencer, PassState, PlacementRequest,
    PlacementResult, PlacementScheduler, RandomSource, Region, Shortfall, TemplateFailure,
    VaultResult,
};
use log::info;
use serde::Serialize;

/// Everything a finished pass produced.
#[derive(Debug, Clone, Serialize)]
pub struct PassOutcome {
    pub seed: u64,
    pub results: Vec<PlacementResult>,
    /// Templates excluded during the pass
    pub failures: Vec<TemplateFailure>,
    pub shortfalls: Vec<Shortfall>,
    pub random_draws: u64,
}

/// A single generation pass.
///
/// An error fatal to the pass (see [`crate::VaultError::is_fatal_to_pass`])
/// leaves it in an unspecified state; discard it.
pub struct GenerationPass<'a> {
    scheduler: &'a PlacementScheduler<'a>,
    context: GenerationContext,
    rng: RandomSource,
    state: PassState,
    results: Vec<PlacementResult>,
}

impl<'a> GenerationPass<'a> {
    /// Starts a pass. Fails with `MissingSeed` when the config has no seed.
    pub fn new(
        scheduler: &'a PlacementScheduler<'a>,
        context: GenerationContext,
        config: &GenerationConfig,
    ) -> VaultResult<Self> {
        Ok(Self {
            scheduler,
            context,
            rng: RandomSource::from_config(config)?,
            state: PassState::new(),
            results: Vec::new(),
        })
    }

    pub fn context(&self) -> &GenerationContext {
        &self.context
    }

    pub fn state(&self) -> &PassState {
        &self.state
    }

    pub fn results(&self) -> &[PlacementResult] {
        &self.results
    }

    /// Schedules one request and returns its placements.
    pub fn schedule(&mut self, request: &PlacementRequest) -> VaultResult<Vec<PlacementResult>> {
        let placed =
            self.scheduler
                .schedule(request, &self.context, &mut self.state, &mut self.rng)?;
        self.results.extend(placed.iter().cloned());
        Ok(placed)
    }

    /// Places the level's shops in `region`.
    pub fn schedule_shops(&mut self, region: &Region) -> VaultResult<Vec<PlacementResult>> {
        let placed =
            self.scheduler
                .schedule_shops(region, &self.context, &mut self.state, &mut self.rng)?;
        self.results.extend(placed.iter().cloned());
        Ok(placed)
    }

    /// Finishes the pass without hooks.
    pub fn finish(self) -> PassOutcome {
        let seed = self.rng.seed();
        let random_draws = self.rng.draws();
        let (failures, shortfalls) = self.state.into_parts();
        info!(
            "Pass finished: {} placements, {} failures, {} shortfalls, {} draws",
            self.results.len(),
            failures.len(),
            shortfalls.len(),
            random_draws
        );
        PassOutcome {
            seed,
            results: self.results,
            failures,
            shortfalls,
            random_draws,
        }
    }

    /// Runs the hooks once over the pass's placements, then finishes.
    pub fn finish_with_hooks(mut self, hooks: &HookSequencer<'_>) -> VaultResult<PassOutcome> {
        let added = hooks.run(
            self.scheduler,
            &self.context,
            &self.results,
            &mut self.state,
            &mut self.rng,
        )?;
        self.results.extend(added);
        Ok(self.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EngineConfig, Grid, Template, TemplatePool, VaultError};

    fn pool() -> TemplatePool {
        let (pool, _) = TemplatePool::load(
            vec![Template::new("plain", Grid::from_rows(&["x.x"]).unwrap()).with_depths(1, None)],
            &EngineConfig::default(),
        );
        pool
    }

    #[test]
    fn test_pass_requires_seed() {
        let pool = pool();
        let scheduler = PlacementScheduler::new(&pool, &EngineConfig::default());
        let result = GenerationPass::new(
            &scheduler,
            GenerationContext::new(1, "D"),
            &GenerationConfig::unseeded(),
        );
        assert!(matches!(result, Err(VaultError::MissingSeed)));
    }

    #[test]
    fn test_pass_collects_results() {
        let pool = pool();
        let scheduler = PlacementScheduler::new(&pool, &EngineConfig::default());
        let mut pass = GenerationPass::new(
            &scheduler,
            GenerationContext::new(1, "D"),
            &GenerationConfig::new(8),
        )
        .unwrap();
        pass.schedule(&PlacementRequest::any(Region::unbounded("a"), 2)).unwrap();
        pass.schedule(&PlacementRequest::any(Region::unbounded("b"), 1)).unwrap();
        assert_eq!(pass.results().len(), 3);

        let outcome = pass.finish();
        assert_eq!(outcome.seed, 8);
        assert_eq!(outcome.results.len(), 3);
        assert!(outcome.failures.is_empty());
    }

    #[test]
    fn test_draw_budget_is_fatal() {
        let pool = pool();
        let scheduler = PlacementScheduler::new(&pool, &EngineConfig::default());
        let config = GenerationConfig {
            seed: Some(1),
            max_random_draws: Some(0),
        };
        let mut pass =
            GenerationPass::new(&scheduler, GenerationContext::new(1, "D"), &config).unwrap();
        let request = PlacementRequest::any(Region::unbounded("a"), 1).with_chance(1, 2);
        assert!(matches!(
            pass.schedule(&request),
            Err(VaultError::RandomExhausted(0))
        ));
    }
}
