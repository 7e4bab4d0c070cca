use rand::seq::index;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use super::RlState;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub state: RlState,
    pub action: f64,
    pub next_state: RlState,
    pub reward: f64,
}

/// Bounded experience buffer. Once full, each push evicts the oldest entry.
#[derive(Debug, Clone)]
pub struct ReplayMemory {
    capacity: usize,
    entries: VecDeque<Transition>,
}

impl ReplayMemory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, transition: Transition) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(transition);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &Transition> {
        self.entries.iter()
    }

    /// Uniform sample of `n` distinct entries (all of them if fewer are held).
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R, n: usize) -> Vec<&Transition> {
        let n = n.min(self.entries.len());
        index::sample(rng, self.entries.len(), n)
            .into_iter()
            .filter_map(|i| self.entries.get(i))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn transition(reward: f64) -> Transition {
        Transition {
            state: RlState::default(),
            action: 0.0,
            next_state: RlState::default(),
            reward,
        }
    }

    #[test]
    fn test_evicts_oldest_at_capacity() {
        let mut memory = ReplayMemory::new(3);
        for r in 0..5 {
            memory.push(transition(r as f64));
        }
        let rewards: Vec<f64> = memory.iter().map(|t| t.reward).collect();
        assert_eq!(rewards, vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_sample_is_without_replacement() {
        let mut memory = ReplayMemory::new(10);
        for r in 0..10 {
            memory.push(transition(r as f64));
        }
        let mut rng = StdRng::seed_from_u64(7);
        let mut rewards: Vec<f64> = memory.sample(&mut rng, 6).iter().map(|t| t.reward).collect();
        rewards.sort_by(f64::total_cmp);
        rewards.dedup();
        assert_eq!(rewards.len(), 6);
    }

    proptest! {
        #[test]
        fn prop_never_exceeds_capacity(capacity in 1usize..20, pushes in 0usize..60) {
            let mut memory = ReplayMemory::new(capacity);
            for r in 0..pushes {
                memory.push(transition(r as f64));
            }
            prop_assert_eq!(memory.len(), pushes.min(capacity));
            if pushes > 0 {
                prop_assert_eq!(memory.iter().last().map(|t| t.reward), Some((pushes - 1) as f64));
            }
        }
    }
}
