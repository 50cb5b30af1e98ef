//! # Random Source
//!
//! The single sequential random stream of a generation run.
//!
//! Every primitive consumes exactly one draw from the underlying generator
//! (shuffles and samples consume one per step), so the sequence of decisions
//! depends only on the seed and on call order.

use crate::{GenerationConfig, VaultError, VaultResult};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Seeded, order-dependent random stream.
#[derive(Debug, Clone)]
pub struct RandomSource {
    rng: StdRng,
    seed: u64,
    draws: u64,
    max_draws: Option<u64>,
}

impl RandomSource {
    /// Creates the random source for a run.
    ///
    /// Fails with [`VaultError::MissingSeed`] when the configuration carries no
    /// seed, since an unseeded run cannot be reproduced.
    pub fn from_config(config: &GenerationConfig) -> VaultResult<Self> {
        let seed = config.seed.ok_or(VaultError::MissingSeed)?;
        let mut source = Self::seeded(seed);
        source.max_draws = config.max_random_draws;
        Ok(source)
    }

    /// Creates an unbounded source from a seed.
    ///
    /// # Examples
    ///
    /// ```
    /// use vaultwright::RandomSource;
    ///
    /// let mut a = RandomSource::seeded(7);
    /// let mut b = RandomSource::seeded(7);
    /// assert_eq!(a.uniform_int(1, 100).unwrap(), b.uniform_int(1, 100).unwrap());
    /// ```
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            seed,
            draws: 0,
            max_draws: None,
        }
    }

    /// The seed this stream was created from.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Number of draws consumed so far.
    pub fn draws(&self) -> u64 {
        self.draws
    }

    fn tick(&mut self) -> VaultResult<()> {
        if let Some(max) = self.max_draws {
            if self.draws >= max {
                return Err(VaultError::RandomExhausted(self.draws));
            }
        }
        self.draws += 1;
        Ok(())
    }

    /// Uniform integer in `0..n`.
    pub fn below(&mut self, n: u64) -> VaultResult<u64> {
        if n == 0 {
            return Err(VaultError::InvalidDistribution(
                "cannot draw from an empty range".to_string(),
            ));
        }
        self.tick()?;
        Ok(self.rng.gen_range(0..n))
    }

    /// Uniform integer in the inclusive range `lo..=hi`.
    pub fn uniform_int(&mut self, lo: i64, hi: i64) -> VaultResult<i64> {
        if lo > hi {
            return Err(VaultError::InvalidDistribution(format!(
                "empty range {}..={}",
                lo, hi
            )));
        }
        self.tick()?;
        Ok(self.rng.gen_range(lo..=hi))
    }

    /// Succeeds `successes` times in `out_of`.
    ///
    /// Always consumes a draw, even when the outcome is certain.
    pub fn chance(&mut self, successes: u32, out_of: u32) -> VaultResult<bool> {
        if out_of == 0 {
            return Err(VaultError::InvalidDistribution(
                "chance with zero denominator".to_string(),
            ));
        }
        Ok(self.below(u64::from(out_of))? < u64::from(successes))
    }

    /// Succeeds once in `n`.
    pub fn one_in(&mut self, n: u32) -> VaultResult<bool> {
        self.chance(1, n)
    }

    /// Shuffles `items` in place (Fisher-Yates, one draw per position).
    pub fn shuffle<T>(&mut self, items: &mut [T]) -> VaultResult<()> {
        for i in (1..items.len()).rev() {
            let j = self.below(i as u64 + 1)? as usize;
            items.swap(i, j);
        }
        Ok(())
    }

    /// Picks `amount` distinct indices out of `0..len`, uniformly, returned
    /// in ascending order. Asking for more than `len` returns all of them.
    pub fn sample_indices(&mut self, len: usize, amount: usize) -> VaultResult<Vec<usize>> {
        let amount = amount.min(len);
        let mut indices: Vec<usize> = (0..len).collect();
        for i in 0..amount {
            let j = i + self.below((len - i) as u64)? as usize;
            indices.swap(i, j);
        }
        indices.truncate(amount);
        indices.sort_unstable();
        Ok(indices)
    }
}
