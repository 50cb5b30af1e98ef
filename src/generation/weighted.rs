//! # Weighted Choice
//!
//! Discrete distributions over arbitrary values.
//!
//! Weights are relative: `a:1 / b:3` picks `b` three times as often as `a`.
//! Sampling uses a single draw from the run's [`RandomSource`].

use crate::{config, RandomSource, VaultError, VaultResult};
use serde::{Deserialize, Serialize};

fn default_weight() -> u32 {
    config::DEFAULT_WEIGHT
}

/// One option in a weighted list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedAlternative<T> {
    /// The value produced when this alternative is picked
    pub value: T,
    /// Relative likelihood (defaults to 10)
    #[serde(default = "default_weight")]
    pub weight: u32,
}

impl<T> WeightedAlternative<T> {
    /// Creates an alternative with an explicit weight.
    pub fn new(value: T, weight: u32) -> Self {
        Self { value, weight }
    }
}

/// A discrete probability distribution over values of `T`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeightedList<T> {
    alternatives: Vec<WeightedAlternative<T>>,
}

impl<T> WeightedList<T> {
    /// Creates a list from alternatives.
    pub fn new(alternatives: Vec<WeightedAlternative<T>>) -> Self {
        Self { alternatives }
    }

    /// Creates a list from `(value, weight)` pairs.
    ///
    /// # Examples
    ///
    /// ```
    /// use vaultwright::{RandomSource, WeightedList};
    ///
    /// let list = WeightedList::from_pairs(vec![('a', 1), ('b', 0)]);
    /// let mut rng = RandomSource::seeded(1);
    /// assert_eq!(*list.choose(&mut rng).unwrap(), 'a');
    /// ```
    pub fn from_pairs(pairs: impl IntoIterator<Item = (T, u32)>) -> Self {
        Self::new(
            pairs
                .into_iter()
                .map(|(value, weight)| WeightedAlternative::new(value, weight))
                .collect(),
        )
    }

    /// Creates a single-entry list.
    pub fn single(value: T) -> Self {
        Self::from_pairs(std::iter::once((value, config::DEFAULT_WEIGHT)))
    }

    pub fn len(&self) -> usize {
        self.alternatives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alternatives.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &WeightedAlternative<T>> {
        self.alternatives.iter()
    }

    /// Sum of all weights.
    pub fn total_weight(&self) -> u64 {
        self.alternatives.iter().map(|a| u64::from(a.weight)).sum()
    }

    /// Checks that the list can be sampled.
    pub fn validate(&self) -> VaultResult<()> {
        if self.alternatives.is_empty() {
            return Err(VaultError::InvalidDistribution(
                "weighted list is empty".to_string(),
            ));
        }
        if self.total_weight() == 0 {
            return Err(VaultError::InvalidDistribution(
                "weighted list has zero total weight".to_string(),
            ));
        }
        Ok(())
    }

    /// Picks one value with probability `weight / total`.
    pub fn choose(&self, rng: &mut RandomSource) -> VaultResult<&T> {
        self.validate()?;
        let index = weighted_index(self.alternatives.iter().map(|a| a.weight), rng)?;
        Ok(&self.alternatives[index].value)
    }
}

/// Picks an index into `weights` with probability proportional to its weight.
///
/// Consumes exactly one draw. Zero-weight entries are never picked.
pub fn weighted_index(
    weights: impl IntoIterator<Item = u32>,
    rng: &mut RandomSource,
) -> VaultResult<usize> {
    let weights: Vec<u64> = weights.into_iter().map(u64::from).collect();
    let total: u64 = weights.iter().sum();
    if total == 0 {
        return Err(VaultError::InvalidDistribution(if weights.is_empty() {
            "no candidates to choose from".to_string()
        } else {
            "candidates have zero total weight".to_string()
        }));
    }

    let mut roll = rng.below(total)?;
    for (index, weight) in weights.iter().enumerate() {
        if roll < *weight {
            return Ok(index);
        }
        roll -= weight;
    }

    // roll < total guarantees a hit above
    Err(VaultError::InvalidDistribution(
        "weighted roll overflowed total".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_list_is_invalid() {
        let list: WeightedList<char> = WeightedList::new(Vec::new());
        let mut rng = RandomSource::seeded(1);
        assert!(matches!(
            list.choose(&mut rng),
            Err(VaultError::InvalidDistribution(_))
        ));
    }

    #[test]
    fn test_zero_weight_list_is_invalid() {
        let list = WeightedList::from_pairs(vec![('a', 0), ('b', 0)]);
        assert!(list.validate().is_err());
    }

    #[test]
    fn test_zero_weight_entry_never_chosen() {
        let list = WeightedList::from_pairs(vec![('a', 0), ('b', 5), ('c', 0)]);
        let mut rng = RandomSource::seeded(8);
        for _ in 0..500 {
            assert_eq!(*list.choose(&mut rng).unwrap(), 'b');
        }
    }

    #[test]
    fn test_choose_uses_one_draw() {
        let list = WeightedList::from_pairs(vec![(1, 3), (2, 7)]);
        let mut rng = RandomSource::seeded(8);
        list.choose(&mut rng).unwrap();
        assert_eq!(rng.draws(), 1);
    }

    #[test]
    fn test_default_weight_when_deserializing() {
        let list: WeightedList<String> =
            serde_json::from_str(r#"[{"value": "orc"}, {"value": "goblin", "weight": 5}]"#)
                .unwrap();
        let weights: Vec<u32> = list.iter().map(|a| a.weight).collect();
        assert_eq!(weights, vec![10, 5]);
        assert_eq!(list.total_weight(), 15);
    }
}
