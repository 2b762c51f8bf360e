use super::BootstrapReplayBufferConfig;
use crate::{
    base::{Transition, TransitionBatch},
    error::ForesightError,
};
use anyhow::Result;
use log::trace;
use rand::{Rng, RngCore};

struct Entry {
    transition: Transition,
    mask: Vec<bool>,
}

/// A ring buffer of transitions with per-head bootstrap masks.
///
/// Randomness is not owned by the buffer; mask draws and sampling use the
/// random source passed by the caller.
pub struct BootstrapReplayBuffer {
    /// Maximum number of transitions that can be stored.
    capacity: usize,

    /// Slot of the next insertion once the buffer is full.
    i: usize,

    num_heads: usize,
    bootstrap: bool,
    bootstrap_prob: f64,
    entries: Vec<Entry>,
}

impl BootstrapReplayBuffer {
    /// Constructs a buffer.
    pub fn build(config: &BootstrapReplayBufferConfig) -> Result<Self> {
        config.check()?;
        Ok(Self {
            capacity: config.capacity,
            i: 0,
            num_heads: config.num_heads,
            bootstrap: config.bootstrap,
            bootstrap_prob: config.bootstrap_prob,
            entries: Vec::with_capacity(config.capacity.min(1 << 16)),
        })
    }

    /// Inserts a transition, evicting the oldest one if the buffer is full.
    pub fn append(&mut self, transition: Transition, rng: &mut dyn RngCore) {
        let mask = match self.bootstrap {
            true => (0..self.num_heads)
                .map(|_| rng.gen_bool(self.bootstrap_prob))
                .collect(),
            false => vec![true; self.num_heads],
        };
        let entry = Entry { transition, mask };

        if self.entries.len() < self.capacity {
            self.entries.push(entry);
        } else {
            self.entries[self.i] = entry;
            self.i = (self.i + 1) % self.capacity;
        }
    }

    /// Samples `batch_size` transitions uniformly with replacement among those
    /// whose mask bit for `head` is set.
    ///
    /// Fails with [`ForesightError::Data`] if no transition belongs to the head.
    pub fn sample(
        &self,
        batch_size: usize,
        head: usize,
        rng: &mut dyn RngCore,
    ) -> Result<TransitionBatch> {
        if head >= self.num_heads {
            return Err(ForesightError::data(format!(
                "head {} is out of range, the buffer has {} heads",
                head, self.num_heads
            )));
        }
        let ixs = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.mask[head])
            .map(|(ix, _)| ix)
            .collect::<Vec<_>>();
        if ixs.is_empty() {
            return Err(ForesightError::data(format!(
                "no transition in the bootstrap partition of head {} ({} stored)",
                head,
                self.entries.len()
            )));
        }
        trace!("Sample {} of {} transitions for head {}", batch_size, ixs.len(), head);

        let picked = (0..batch_size).map(|_| &self.entries[ixs[rng.gen_range(0..ixs.len())]].transition);
        TransitionBatch::from_transitions(picked)
    }

    /// Samples `batch_size` transitions uniformly with replacement, ignoring masks.
    pub fn sample_uniform(&self, batch_size: usize, rng: &mut dyn RngCore) -> Result<TransitionBatch> {
        if self.entries.is_empty() {
            return Err(ForesightError::data("cannot sample from an empty buffer"));
        }
        let n = self.entries.len();
        let picked = (0..batch_size).map(|_| &self.entries[rng.gen_range(0..n)].transition);
        TransitionBatch::from_transitions(picked)
    }

    /// Iterates over stored transitions from the oldest to the newest.
    pub fn iter(&self) -> impl Iterator<Item = &Transition> + '_ {
        let (newer, older) = self.entries.split_at(self.i);
        older.iter().chain(newer.iter()).map(|e| &e.transition)
    }

    /// All stored transitions, oldest first.
    pub fn all(&self) -> Result<TransitionBatch> {
        TransitionBatch::from_transitions(self.iter())
    }

    /// Bootstrap masks aligned with [`BootstrapReplayBuffer::iter`].
    pub fn masks(&self) -> impl Iterator<Item = &[bool]> + '_ {
        let (newer, older) = self.entries.split_at(self.i);
        older.iter().chain(newer.iter()).map(|e| e.mask.as_slice())
    }

    /// Number of transitions whose mask bit for `head` is set.
    pub fn head_len(&self, head: usize) -> usize {
        self.entries
            .iter()
            .filter(|e| e.mask.get(head).copied().unwrap_or(false))
            .count()
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

    pub fn num_heads(&self) -> usize {
        self.num_heads
    }

    /// Removes every transition.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.i = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::{rngs::StdRng, SeedableRng};

    fn transition(x: f32) -> Transition {
        Transition::new(array![x], array![0.0], x, array![x + 1.0], false).unwrap()
    }

    fn buffer(capacity: usize, num_heads: usize, bootstrap: bool) -> BootstrapReplayBuffer {
        let config = BootstrapReplayBufferConfig::default()
            .capacity(capacity)
            .num_heads(num_heads)
            .bootstrap(bootstrap);
        BootstrapReplayBuffer::build(&config).unwrap()
    }

    #[test]
    fn test_ring_keeps_latest_in_order() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut buffer = buffer(5, 1, false);
        for i in 0..8 {
            buffer.append(transition(i as f32), &mut rng);
        }

        assert_eq!(buffer.len(), 5);
        let rewards = buffer.iter().map(|t| t.reward).collect::<Vec<_>>();
        assert_eq!(rewards, vec![3.0, 4.0, 5.0, 6.0, 7.0]);
        assert_eq!(buffer.all().unwrap().reward.to_vec(), rewards);
    }

    #[test]
    fn test_masks_without_bootstrap_are_full() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut buffer = buffer(10, 3, false);
        for i in 0..4 {
            buffer.append(transition(i as f32), &mut rng);
        }
        assert!(buffer.masks().all(|m| m.iter().all(|b| *b)));
        assert_eq!(buffer.head_len(2), 4);
    }

    #[test]
    fn test_sample_respects_head_mask() -> Result<()> {
        let mut rng = StdRng::seed_from_u64(7);
        let mut buffer = buffer(100, 2, true);
        for i in 0..100 {
            buffer.append(transition(i as f32), &mut rng);
        }
        let members = buffer
            .iter()
            .zip(buffer.masks())
            .filter(|(_, m)| m[1])
            .map(|(t, _)| t.reward)
            .collect::<Vec<_>>();
        assert_eq!(members.len(), buffer.head_len(1));

        let batch = buffer.sample(64, 1, &mut rng)?;
        assert_eq!(batch.len(), 64);
        assert!(batch.reward.iter().all(|r| members.contains(r)));
        Ok(())
    }

    #[test]
    fn test_sample_empty_partition_is_an_error() {
        let mut rng = StdRng::seed_from_u64(0);
        let buffer = buffer(10, 2, true);
        let e = buffer.sample(4, 0, &mut rng).unwrap_err();
        assert!(matches!(
            e.downcast_ref::<ForesightError>(),
            Some(ForesightError::Data(_))
        ));
        assert!(buffer.sample(4, 2, &mut rng).is_err());
        assert!(buffer.sample_uniform(4, &mut rng).is_err());
    }
}
