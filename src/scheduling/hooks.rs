//! # Post-placement Hooks
//!
//! Callbacks registered against a region, run synchronously once the pass's
//! scheduling is done.
//!
//! A hook sees the placements made in its region and may issue further
//! requests for that same region. Issued requests are scheduled straight
//! away, sharing the pass's uniqueness ledger, and give the region's hooks
//! that have not run yet their turn on the grown placement list. Every hook
//! is invoked exactly once per run, and nesting stops at
//! `EngineConfig::max_hook_depth`.

use crate::{
    GenerationContext, PassState, PlacementRequest, PlacementResult, PlacementScheduler,
    RandomSource, Region, VaultError, VaultResult,
};
use log::{debug, warn};

type HookFn<'h> = Box<dyn Fn(&mut HookScope<'_, '_>) -> VaultResult<()> + 'h>;

struct RegisteredHook<'h> {
    region: Region,
    label: String,
    hook: HookFn<'h>,
}

/// Ordered list of post-placement hooks.
#[derive(Default)]
pub struct HookSequencer<'h> {
    hooks: Vec<RegisteredHook<'h>>,
}

impl<'h> HookSequencer<'h> {
    pub fn new() -> Self {
        Self { hooks: Vec::new() }
    }

    /// Registers a hook for `region`. Hooks run in registration order.
    pub fn register<F>(&mut self, region: Region, label: impl Into<String>, hook: F)
    where
        F: Fn(&mut HookScope<'_, '_>) -> VaultResult<()> + 'h,
    {
        self.hooks.push(RegisteredHook {
            region,
            label: label.into(),
            hook: Box::new(hook),
        });
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Runs every hook exactly once against the pass's placements.
    ///
    /// Returns the placements the hooks added. A failing hook keeps what it
    /// placed before failing and the remaining hooks still run; only errors
    /// fatal to the pass stop the sequence.
    pub fn run(
        &self,
        scheduler: &PlacementScheduler<'_>,
        context: &GenerationContext,
        placed: &[PlacementResult],
        state: &mut PassState,
        rng: &mut RandomSource,
    ) -> VaultResult<Vec<PlacementResult>> {
        let mut invoked = vec![false; self.hooks.len()];
        let mut all = placed.to_vec();
        let start = all.len();

        let mut run = HookRun {
            hooks: &self.hooks,
            scheduler,
            context,
            state,
            rng,
            invoked: &mut invoked,
            placed: &mut all,
        };
        run.fire(None, 0)?;

        Ok(all.split_off(start))
    }
}

impl std::fmt::Debug for HookSequencer<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.hooks.iter().map(|h| (&h.region.id, &h.label)))
            .finish()
    }
}

/// Everything a hook invocation borrows from the pass.
struct HookRun<'a, 'h> {
    hooks: &'a [RegisteredHook<'h>],
    scheduler: &'a PlacementScheduler<'a>,
    context: &'a GenerationContext,
    state: &'a mut PassState,
    rng: &'a mut RandomSource,
    /// Hooks already started in this run
    invoked: &'a mut Vec<bool>,
    /// Pass placements followed by everything hooks added so far
    placed: &'a mut Vec<PlacementResult>,
}

impl HookRun<'_, '_> {
    /// Invokes every hook not yet started, limited to `region` when given.
    fn fire(&mut self, region: Option<&str>, depth: u32) -> VaultResult<()> {
        let hooks = self.hooks;
        for (index, registered) in hooks.iter().enumerate() {
            if self.invoked[index] || region.map_or(false, |id| registered.region.id != id) {
                continue;
            }
            self.invoked[index] = true;

            let in_region: Vec<PlacementResult> = self
                .placed
                .iter()
                .filter(|p| p.region == registered.region.id)
                .cloned()
                .collect();

            debug!(
                "Running hook '{}' for region '{}' at depth {}",
                registered.label, registered.region.id, depth
            );
            let mut scope = HookScope {
                run: HookRun {
                    hooks,
                    scheduler: self.scheduler,
                    context: self.context,
                    state: &mut *self.state,
                    rng: &mut *self.rng,
                    invoked: &mut *self.invoked,
                    placed: &mut *self.placed,
                },
                region: &registered.region,
                placed: &in_region,
                depth,
                issued: Vec::new(),
            };

            match (registered.hook)(&mut scope) {
                Ok(()) => {}
                Err(error) if error.is_fatal_to_pass() => return Err(error),
                Err(error) => warn!("Hook '{}' failed: {}", registered.label, error),
            }
        }
        Ok(())
    }
}

/// A hook's view of the pass.
pub struct HookScope<'a, 'h> {
    run: HookRun<'a, 'h>,
    region: &'a Region,
    placed: &'a [PlacementResult],
    depth: u32,
    issued: Vec<PlacementResult>,
}

impl HookScope<'_, '_> {
    pub fn context(&self) -> &GenerationContext {
        self.run.context
    }

    /// Region the hook was registered against.
    pub fn region(&self) -> &Region {
        self.region
    }

    /// Placements in the hook's region when the hook started.
    pub fn placed(&self) -> &[PlacementResult] {
        self.placed
    }

    /// Nesting level: 0 for hooks started directly after the pass.
    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Placements this hook's own requests made so far.
    pub fn issued(&self) -> &[PlacementResult] {
        &self.issued
    }

    /// Schedules a request for the hook's own region and returns its
    /// placements.
    ///
    /// The region's hooks that have not run yet then start, unless the
    /// nesting limit is reached.
    pub fn issue(&mut self, request: PlacementRequest) -> VaultResult<Vec<PlacementResult>> {
        if request.region.id != self.region.id {
            return Err(VaultError::HookFailed(format!(
                "request for region '{}' issued from a hook of region '{}'",
                request.region.id, self.region.id
            )));
        }

        let placed =
            self.run
                .scheduler
                .schedule(&request, self.run.context, self.run.state, self.run.rng)?;
        self.issued.extend(placed.iter().cloned());
        self.run.placed.extend(placed.iter().cloned());

        let next_depth = self.depth + 1;
        if next_depth > self.run.scheduler.config().max_hook_depth {
            debug!(
                "Hook nesting limit {} reached in region '{}'",
                self.run.scheduler.config().max_hook_depth,
                self.region.id
            );
        } else if !placed.is_empty() {
            self.run.fire(Some(self.region.id.as_str()), next_depth)?;
        }
        Ok(placed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EngineConfig, GenerationConfig, Grid, Template, TemplatePool};
    use std::cell::Cell;

    fn pool() -> TemplatePool {
        let templates = vec![
            Template::new("room", Grid::from_rows(&["x.x"]).unwrap())
                .with_depths(1, None)
                .with_tag("room"),
            Template::new("statue", Grid::from_rows(&["G"]).unwrap())
                .with_depths(1, None)
                .with_tag("decor"),
        ];
        let (pool, failures) = TemplatePool::load(templates, &EngineConfig::default());
        assert!(failures.is_empty());
        pool
    }

    #[test]
    fn test_hooks_run_in_order_once() {
        let pool = pool();
        let scheduler = PlacementScheduler::new(&pool, &EngineConfig::default());
        let context = GenerationContext::new(1, "D");
        let mut state = PassState::new();
        let mut rng = RandomSource::from_config(&GenerationConfig::new(5)).unwrap();
        let order = std::cell::RefCell::new(Vec::new());

        let mut hooks = HookSequencer::new();
        hooks.register(Region::unbounded("hall"), "first", |_scope| {
            order.borrow_mut().push("first");
            Ok(())
        });
        hooks.register(Region::unbounded("hall"), "second", |_scope| {
            order.borrow_mut().push("second");
            Ok(())
        });

        let added = hooks.run(&scheduler, &context, &[], &mut state, &mut rng).unwrap();
        assert!(added.is_empty());
        assert_eq!(*order.borrow(), vec!["first", "second"]);
    }

    #[test]
    fn test_hook_issues_request_in_own_region() {
        let pool = pool();
        let scheduler = PlacementScheduler::new(&pool, &EngineConfig::default());
        let context = GenerationContext::new(1, "D");
        let mut state = PassState::new();
        let mut rng = RandomSource::seeded(5);

        let mut hooks = HookSequencer::new();
        hooks.register(Region::unbounded("hall"), "decorate", |scope| {
            let region = scope.region().clone();
            scope.issue(PlacementRequest::by_tag("decor", region, 2))?;
            Ok(())
        });

        let added = hooks.run(&scheduler, &context, &[], &mut state, &mut rng).unwrap();
        assert_eq!(added.len(), 2);
        assert!(added.iter().all(|p| p.template == "statue" && p.region == "hall"));
    }

    #[test]
    fn test_hook_failure_keeps_earlier_placements() {
        let pool = pool();
        let scheduler = PlacementScheduler::new(&pool, &EngineConfig::default());
        let context = GenerationContext::new(1, "D");
        let mut state = PassState::new();
        let mut rng = RandomSource::seeded(5);
        let later_ran = Cell::new(false);

        let mut hooks = HookSequencer::new();
        hooks.register(Region::unbounded("hall"), "partial", |scope| {
            let region = scope.region().clone();
            scope.issue(PlacementRequest::by_tag("decor", region, 1))?;
            // Wrong region: fails this hook only.
            scope.issue(PlacementRequest::by_tag("decor", Region::unbounded("cellar"), 1))?;
            Ok(())
        });
        hooks.register(Region::unbounded("hall"), "later", |_scope| {
            later_ran.set(true);
            Ok(())
        });

        let added = hooks.run(&scheduler, &context, &[], &mut state, &mut rng).unwrap();
        assert_eq!(added.len(), 1);
        assert!(later_ran.get());
    }

    #[test]
    fn test_nested_hooks_do_not_reenter() {
        let pool = pool();
        let scheduler = PlacementScheduler::new(&pool, &EngineConfig::default());
        let context = GenerationContext::new(1, "D");
        let mut state = PassState::new();
        let mut rng = RandomSource::seeded(5);
        let calls = Cell::new(0u32);

        let mut hooks = HookSequencer::new();
        hooks.register(Region::unbounded("hall"), "echo", |scope| {
            calls.set(calls.get() + 1);
            let region = scope.region().clone();
            scope.issue(PlacementRequest::by_tag("decor", region, 1))?;
            Ok(())
        });

        let added = hooks.run(&scheduler, &context, &[], &mut state, &mut rng).unwrap();
        assert_eq!(calls.get(), 1);
        assert_eq!(added.len(), 1);
    }

    #[test]
    fn test_each_hook_invoked_once_when_another_issues() {
        let pool = pool();
        let scheduler = PlacementScheduler::new(&pool, &EngineConfig::default());
        let context = GenerationContext::new(1, "D");
        let mut state = PassState::new();
        let mut rng = RandomSource::seeded(5);
        let counted = Cell::new(0u32);
        let seen = Cell::new(0usize);

        let mut hooks = HookSequencer::new();
        hooks.register(Region::unbounded("hall"), "decorate", |scope| {
            let region = scope.region().clone();
            scope.issue(PlacementRequest::by_tag("decor", region, 1))?;
            Ok(())
        });
        hooks.register(Region::unbounded("hall"), "count", |scope| {
            counted.set(counted.get() + 1);
            seen.set(scope.placed().len());
            Ok(())
        });

        let added = hooks.run(&scheduler, &context, &[], &mut state, &mut rng).unwrap();
        assert_eq!(added.len(), 1);
        assert_eq!(counted.get(), 1);
        // Started from inside the first hook, after its placement landed.
        assert_eq!(seen.get(), 1);
    }

    #[test]
    fn test_hooks_see_only_their_region() {
        let pool = pool();
        let scheduler = PlacementScheduler::new(&pool, &EngineConfig::default());
        let context = GenerationContext::new(1, "D");
        let mut state = PassState::new();
        let mut rng = RandomSource::seeded(5);

        let placed = scheduler
            .schedule(
                &PlacementRequest::by_tag("room", Region::unbounded("hall"), 2),
                &context,
                &mut state,
                &mut rng,
            )
            .unwrap();
        let seen = Cell::new(usize::MAX);
        let mut hooks = HookSequencer::new();
        hooks.register(Region::unbounded("cellar"), "count", |scope| {
            seen.set(scope.placed().len());
            Ok(())
        });
        hooks.run(&scheduler, &context, &placed, &mut state, &mut rng).unwrap();
        assert_eq!(seen.get(), 0);
    }
}
