//! Weight-vector individuals of the meta GA.

use std::collections::BTreeMap;

use rand::Rng;
use rand_distr::{Distribution, Normal};

use crate::ga::Individual;
use crate::models::{WeightConfig, WeightKey};
use crate::random::probability;

/// A candidate weight vector, one value per [`WeightKey`].
///
/// Values always lie within [`WeightKey::bounds`], so reward weights stay
/// non-negative and penalty weights non-positive.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightChromosome {
    pub values: BTreeMap<WeightKey, f64>,
    fitness: Option<f64>,
}

impl Individual for WeightChromosome {
    fn fitness(&self) -> f64 {
        self.fitness.unwrap_or(f64::NEG_INFINITY)
    }

    fn set_fitness(&mut self, fitness: f64) {
        self.fitness = Some(fitness);
    }
}

fn clamp_to_bounds(key: WeightKey, value: f64) -> f64 {
    let (low, high) = key.bounds();
    value.clamp(low, high)
}

fn range_width(key: WeightKey) -> f64 {
    let (low, high) = key.bounds();
    high - low
}

impl WeightChromosome {
    /// Copies `config`, clamping each weight into its bounds.
    pub fn from_config(config: &WeightConfig) -> Self {
        Self {
            values: WeightKey::ALL
                .iter()
                .map(|&k| (k, clamp_to_bounds(k, config.get(k))))
                .collect(),
            fitness: None,
        }
    }

    pub fn to_config(&self) -> WeightConfig {
        let mut config = WeightConfig::default();
        for (&key, &value) in &self.values {
            config.set(key, value);
        }
        config
    }

    /// `base` with every weight shifted uniformly by up to `spread` of its range.
    pub fn random_around<R: Rng>(base: &WeightConfig, spread: f64, rng: &mut R) -> Self {
        let spread = probability(spread);
        let values = WeightKey::ALL
            .iter()
            .map(|&k| {
                let shift = if spread > 0.0 {
                    rng.random_range(-spread..=spread) * range_width(k)
                } else {
                    0.0
                };
                (k, clamp_to_bounds(k, base.get(k) + shift))
            })
            .collect();
        Self {
            values,
            fitness: None,
        }
    }

    pub fn get(&self, key: WeightKey) -> f64 {
        self.values.get(&key).copied().unwrap_or(0.0)
    }

    /// BLX-α crossover: each child weight is drawn from the parents' interval
    /// widened by `alpha` of its length on both sides.
    pub fn blend_crossover<R: Rng>(
        &self,
        other: &WeightChromosome,
        alpha: f64,
        rng: &mut R,
    ) -> (WeightChromosome, WeightChromosome) {
        let mut c1 = BTreeMap::new();
        let mut c2 = BTreeMap::new();
        for key in WeightKey::ALL {
            let (a, b) = (self.get(key), other.get(key));
            let (low, high) = (a.min(b), a.max(b));
            let d = high - low;
            if d <= 0.0 {
                c1.insert(key, a);
                c2.insert(key, b);
                continue;
            }
            let (from, to) = (low - alpha * d, high + alpha * d);
            c1.insert(key, clamp_to_bounds(key, rng.random_range(from..=to)));
            c2.insert(key, clamp_to_bounds(key, rng.random_range(from..=to)));
        }
        (
            WeightChromosome {
                values: c1,
                fitness: None,
            },
            WeightChromosome {
                values: c2,
                fitness: None,
            },
        )
    }

    /// Adds Gaussian noise with σ = `sigma × range` to each weight with
    /// probability `rate`. Returns the number of mutated weights.
    pub fn mutate<R: Rng>(&mut self, rate: f64, sigma: f64, rng: &mut R) -> usize {
        let rate = probability(rate);
        let mut mutated = 0;
        for (&key, value) in self.values.iter_mut() {
            if !rng.random_bool(rate) {
                continue;
            }
            let Ok(normal) = Normal::new(0.0, sigma * range_width(key)) else {
                continue;
            };
            *value = clamp_to_bounds(key, *value + normal.sample(rng));
            mutated += 1;
        }
        if mutated > 0 {
            self.fitness = None;
        }
        mutated
    }

    pub fn is_evaluated(&self) -> bool {
        self.fitness.is_some()
    }
}
