//! Crossover operators on gene sequences.
//!
//! All operators take two equal-length parents and return two children.
//! Parents shorter than two genes are returned unchanged.
//!
//! - [`single_point`]: prefix from one parent, suffix from the other
//! - [`two_point`]: middle segment swapped between parents
//! - [`uniform`]: per-position coin flip, children are exact complements
//! - [`order_based`]: segment kept from one parent, remaining genes taken in
//!   the other parent's order (Davis, 1985), generalised to repeated class ids

use std::collections::HashMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use rand::Rng;

use super::chromosome::{Gene, GeneKey};

/// Crossover strategy applied by the population manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum CrossoverMethod {
    SinglePoint,
    TwoPoint,
    Uniform,
    OrderBased,
}

impl CrossoverMethod {
    pub const ALL: [CrossoverMethod; 4] = [
        CrossoverMethod::SinglePoint,
        CrossoverMethod::TwoPoint,
        CrossoverMethod::Uniform,
        CrossoverMethod::OrderBased,
    ];

    pub fn name(self) -> &'static str {
        match self {
            CrossoverMethod::SinglePoint => "single_point",
            CrossoverMethod::TwoPoint => "two_point",
            CrossoverMethod::Uniform => "uniform",
            CrossoverMethod::OrderBased => "order_based",
        }
    }

    /// Applies this operator to two gene sequences.
    pub fn apply<R: Rng>(
        self,
        parent1: &[Gene],
        parent2: &[Gene],
        rng: &mut R,
    ) -> (Vec<Gene>, Vec<Gene>) {
        match self {
            CrossoverMethod::SinglePoint => single_point(parent1, parent2, rng),
            CrossoverMethod::TwoPoint => two_point(parent1, parent2, rng),
            CrossoverMethod::Uniform => uniform(parent1, parent2, rng),
            CrossoverMethod::OrderBased => order_based(parent1, parent2, rng),
        }
    }
}

impl std::fmt::Display for CrossoverMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Single-point crossover with cut `k ∈ [1, n)`.
///
/// # Panics
/// Panics if parents have different lengths.
pub fn single_point<R: Rng>(
    parent1: &[Gene],
    parent2: &[Gene],
    rng: &mut R,
) -> (Vec<Gene>, Vec<Gene>) {
    let n = parent1.len();
    assert_eq!(n, parent2.len(), "parents must have equal length");
    if n < 2 {
        return (parent1.to_vec(), parent2.to_vec());
    }

    let cut = rng.random_range(1..n);
    let mut child1 = Vec::with_capacity(n);
    child1.extend_from_slice(&parent1[..cut]);
    child1.extend_from_slice(&parent2[cut..]);
    let mut child2 = Vec::with_capacity(n);
    child2.extend_from_slice(&parent2[..cut]);
    child2.extend_from_slice(&parent1[cut..]);
    (child1, child2)
}

/// Two-point crossover: genes in `[a, b)` are swapped, `1 ≤ a < b < n`.
///
/// Falls back to single-point for fewer than three genes.
pub fn two_point<R: Rng>(
    parent1: &[Gene],
    parent2: &[Gene],
    rng: &mut R,
) -> (Vec<Gene>, Vec<Gene>) {
    let n = parent1.len();
    assert_eq!(n, parent2.len(), "parents must have equal length");
    if n < 3 {
        return single_point(parent1, parent2, rng);
    }

    let a = rng.random_range(1..n - 1);
    let b = rng.random_range(a + 1..n);
    let mut child1 = parent1.to_vec();
    let mut child2 = parent2.to_vec();
    child1[a..b].copy_from_slice(&parent2[a..b]);
    child2[a..b].copy_from_slice(&parent1[a..b]);
    (child1, child2)
}

/// Uniform crossover: each position comes from either parent with p = 0.5.
pub fn uniform<R: Rng>(
    parent1: &[Gene],
    parent2: &[Gene],
    rng: &mut R,
) -> (Vec<Gene>, Vec<Gene>) {
    let n = parent1.len();
    assert_eq!(n, parent2.len(), "parents must have equal length");

    let mut child1 = Vec::with_capacity(n);
    let mut child2 = Vec::with_capacity(n);
    for (g1, g2) in parent1.iter().zip(parent2) {
        if rng.random_bool(0.5) {
            child1.push(*g1);
            child2.push(*g2);
        } else {
            child1.push(*g2);
            child2.push(*g1);
        }
    }
    (child1, child2)
}

/// Order-based crossover.
///
/// A random segment `[start, end]` is copied from the template parent; the
/// remaining positions are filled left to right with the donor's genes in
/// donor order, skipping genes whose `(class_id, week)` identity has already
/// been placed as often as it occurs in the template.
pub fn order_based<R: Rng>(
    parent1: &[Gene],
    parent2: &[Gene],
    rng: &mut R,
) -> (Vec<Gene>, Vec<Gene>) {
    let n = parent1.len();
    assert_eq!(n, parent2.len(), "parents must have equal length");
    if n < 2 {
        return (parent1.to_vec(), parent2.to_vec());
    }

    let (start, end) = random_segment(n, rng);
    let child1 = order_child(parent1, parent2, start, end);
    let child2 = order_child(parent2, parent1, start, end);
    (child1, child2)
}

/// Builds one order-based child: segment from `template`, rest from `donor`.
fn order_child(template: &[Gene], donor: &[Gene], start: usize, end: usize) -> Vec<Gene> {
    let mut quota: HashMap<GeneKey, usize> = HashMap::new();
    for gene in template {
        *quota.entry(gene.key()).or_insert(0) += 1;
    }

    let mut slots: Vec<Option<Gene>> = vec![None; template.len()];
    for i in start..=end {
        slots[i] = Some(template[i]);
        if let Some(left) = quota.get_mut(&template[i].key()) {
            *left -= 1;
        }
    }

    fill_preserving_order(&mut slots, donor, &mut quota);

    // Parents with differing identity multisets leave gaps; keep the template gene there.
    slots
        .into_iter()
        .zip(template)
        .map(|(slot, fallback)| slot.unwrap_or(*fallback))
        .collect()
}

/// Fills empty `slots` left to right with `donor` genes in donor order.
///
/// `quota` holds how many more genes of each identity may be placed; donor
/// genes whose identity is exhausted (already used) are skipped. Returns the
/// number of slots filled.
pub fn fill_preserving_order(
    slots: &mut [Option<Gene>],
    donor: &[Gene],
    quota: &mut HashMap<GeneKey, usize>,
) -> usize {
    let mut filled = 0;
    let mut donor_iter = donor.iter();

    for slot in slots.iter_mut().filter(|s| s.is_none()) {
        let next = donor_iter.by_ref().find(|gene| match quota.get_mut(&gene.key()) {
            Some(left) if *left > 0 => {
                *left -= 1;
                true
            }
            _ => false,
        });
        match next {
            Some(gene) => {
                *slot = Some(*gene);
                filled += 1;
            }
            None => break,
        }
    }
    filled
}

/// Pick a random segment `[start, end]` within `0..n` where `start <= end`.
fn random_segment<R: Rng>(n: usize, rng: &mut R) -> (usize, usize) {
    let a = rng.random_range(0..n);
    let b = rng.random_range(0..n);
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}
