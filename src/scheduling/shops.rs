//! # Shop Placement
//!
//! How many shops a level receives, and when one of them is replaced by the
//! designated alternate template.

use crate::{
    config, GenerationContext, PassState, PlacementRequest, PlacementResult, PlacementScheduler,
    RandomSource, Region, VariantSelector, VaultError, VaultResult,
};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

/// Shop-count policy.
///
/// A level gets one shop `single_successes` in `single_out_of` times, and
/// otherwise a uniform count in `multi_min..=multi_max`. Inside the
/// alternate depth band one shop may instead be the alternate template, with
/// probability `1 / (alternate_base - (depth - 1))`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShopCountPolicy {
    pub single_successes: u32,
    pub single_out_of: u32,
    pub multi_min: u32,
    pub multi_max: u32,
    pub alternate_min_depth: i32,
    pub alternate_max_depth: i32,
    pub alternate_base: i32,
    /// Tag selecting ordinary shop templates
    pub shop_tag: String,
    /// Template placed when the alternate draw succeeds
    pub alternate: String,
}

impl Default for ShopCountPolicy {
    fn default() -> Self {
        Self {
            single_successes: 5,
            single_out_of: 6,
            multi_min: 2,
            multi_max: 5,
            alternate_min_depth: 11,
            alternate_max_depth: 27,
            alternate_base: 30,
            shop_tag: config::DEFAULT_SHOP_TAG.to_string(),
            alternate: config::DEFAULT_SHOP_ALTERNATE.to_string(),
        }
    }
}

/// Outcome of the shop-count draws for one level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShopPlan {
    /// Total shops, counting the alternate
    pub count: u32,
    /// Whether one of them is the alternate template
    pub alternate: bool,
}

impl ShopCountPolicy {
    /// Draws the number of shops.
    pub fn draw_count(&self, rng: &mut RandomSource) -> VaultResult<u32> {
        if rng.chance(self.single_successes, self.single_out_of)? {
            return Ok(1);
        }
        let count = rng.uniform_int(i64::from(self.multi_min), i64::from(self.multi_max))?;
        Ok(count as u32)
    }

    /// Draws whether the alternate replaces a shop. Consumes no randomness
    /// outside the alternate depth band.
    pub fn alternate_fires(&self, depth: i32, rng: &mut RandomSource) -> VaultResult<bool> {
        if depth < self.alternate_min_depth || depth > self.alternate_max_depth {
            return Ok(false);
        }
        let denominator = self.alternate_base - (depth - 1);
        if denominator <= 0 {
            return Err(VaultError::InvalidDistribution(format!(
                "alternate shop chance 1 in {} at depth {}",
                denominator, depth
            )));
        }
        rng.one_in(denominator as u32)
    }

    /// Count draw first, then the alternate draw.
    pub fn plan(&self, depth: i32, rng: &mut RandomSource) -> VaultResult<ShopPlan> {
        let count = self.draw_count(rng)?;
        let alternate = self.alternate_fires(depth, rng)?;
        Ok(ShopPlan { count, alternate })
    }
}

impl PlacementScheduler<'_> {
    /// Plans and places the shops of one level.
    ///
    /// Shop templates resolve with the shop selector active. When the
    /// alternate draw succeeds the alternate is requested by name and the
    /// remaining count drops by one whether or not it could be placed.
    pub fn schedule_shops(
        &self,
        region: &Region,
        context: &GenerationContext,
        state: &mut PassState,
        rng: &mut RandomSource,
    ) -> VaultResult<Vec<PlacementResult>> {
        let policy = &self.config().shop_policy;
        let plan = policy.plan(context.depth, rng)?;
        debug!("Shop plan at depth {}: {:?}", context.depth, plan);

        let mut shop_context = context.clone();
        if !shop_context.selectors.contains(&VariantSelector::Shop) {
            shop_context.selectors.push(VariantSelector::Shop);
        }

        let mut results = Vec::new();
        let mut remaining = plan.count;
        if plan.alternate {
            remaining = remaining.saturating_sub(1);
            let request = PlacementRequest::by_name(policy.alternate.clone(), region.clone());
            match self.schedule(&request, &shop_context, state, rng) {
                Ok(placed) => results.extend(placed),
                Err(error) if error.is_fatal_to_pass() => return Err(error),
                Err(error) => warn!("Alternate shop '{}' not placed: {}", policy.alternate, error),
            }
        }

        if remaining > 0 {
            let request = PlacementRequest::by_tag(policy.shop_tag.clone(), region.clone(), remaining);
            results.extend(self.schedule(&request, &shop_context, state, rng)?);
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alternate_band_consumes_no_draws_outside() {
        let policy = ShopCountPolicy::default();
        let mut rng = RandomSource::seeded(1);
        for depth in [1, 5, 10, 28, 40] {
            assert!(!policy.alternate_fires(depth, &mut rng).unwrap());
        }
        assert_eq!(rng.draws(), 0);

        policy.alternate_fires(11, &mut rng).unwrap();
        assert_eq!(rng.draws(), 1);
    }

    #[test]
    fn test_alternate_certain_at_deep_edge() {
        let policy = ShopCountPolicy {
            alternate_base: 27,
            ..ShopCountPolicy::default()
        };
        let mut rng = RandomSource::seeded(3);
        // 1 in (27 - 26) always fires.
        assert!(policy.alternate_fires(27, &mut rng).unwrap());
    }

    #[test]
    fn test_misconfigured_alternate_base() {
        let policy = ShopCountPolicy {
            alternate_base: 10,
            ..ShopCountPolicy::default()
        };
        let mut rng = RandomSource::seeded(3);
        assert!(matches!(
            policy.alternate_fires(20, &mut rng),
            Err(VaultError::InvalidDistribution(_))
        ));
    }

    #[test]
    fn test_draw_count_bounds() {
        let policy = ShopCountPolicy::default();
        let mut rng = RandomSource::seeded(99);
        for _ in 0..1000 {
            let count = policy.draw_count(&mut rng).unwrap();
            assert!((1..=5).contains(&count));
        }
    }

    #[test]
    fn test_policy_from_partial_json() {
        let policy: ShopCountPolicy = serde_json::from_str(r#"{"alternate": "market"}"#).unwrap();
        assert_eq!(policy.alternate, "market");
        assert_eq!(policy.single_out_of, 6);
    }
}
