use rand::Rng;

/// Stores a batch of `ReplayBuffer<O, A>` samples
pub struct BatchedReplayBufferSlice<O, A> {
    pub states: Vec<O>,
    pub actions: Vec<A>,
    pub next_states: Vec<O>,
    pub rewards: Vec<f32>,
    pub terminated: Vec<bool>,
    pub truncated: Vec<bool>,
}

impl<O, A> BatchedReplayBufferSlice<O, A> {
    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// `1.0` where the transition ended the episode through termination,
    /// `0.0` otherwise. Truncated transitions still bootstrap.
    pub fn done_mask(&self) -> Vec<f32> {
        self.terminated
            .iter()
            .map(|&t| if t { 1.0 } else { 0.0 })
            .collect()
    }
}

/// Stores a single `ReplayBuffer<O, A>` sample
pub struct ReplayBufferSlice<O, A> {
    pub state: O,
    pub action: A,
    pub next_state: O,
    pub reward: f32,
    pub terminated: bool,
    pub truncated: bool,
}

/// ReplayBuffer stores transitions for off-policy training
///
/// Storage is circular: once `size` transitions are held, each new
/// transition overwrites the oldest one. The types of state and action
/// are generic for compatability with any observation/action type.
pub struct ReplayBuffer<O: Clone, A: Clone> {
    states: Vec<O>,
    actions: Vec<A>,
    next_states: Vec<O>,
    rewards: Vec<f32>,
    terminated: Vec<bool>,
    truncated: Vec<bool>,

    /// stores the maximum size of the buffer
    size: usize,

    /// stores the current replace position in the circular array
    ptr: usize,
}

impl<O: Clone, A: Clone> ReplayBuffer<O, A> {
    pub fn new(size: usize) -> Self {
        assert!(size > 0, "replay buffer size must be positive");

        // large buffers grow on demand
        let cap = size.min(1 << 16);

        Self {
            states: Vec::with_capacity(cap),
            actions: Vec::with_capacity(cap),
            next_states: Vec::with_capacity(cap),
            rewards: Vec::with_capacity(cap),
            terminated: Vec::with_capacity(cap),
            truncated: Vec::with_capacity(cap),
            size,
            ptr: 0,
        }
    }

    /// Whether the replay buffer is currently full
    pub fn full(&self) -> bool {
        self.curr_len() == self.size
    }

    /// The number of samples currently stored in the buffer
    pub fn curr_len(&self) -> usize {
        self.states.len()
    }

    /// The maximum number of samples this buffer can hold
    pub fn size(&self) -> usize {
        self.size
    }

    /// Clones out the sample stored at `idx`, if there is one
    pub fn get(&self, idx: usize) -> Option<ReplayBufferSlice<O, A>> {
        if idx >= self.curr_len() {
            return None;
        }

        Some(ReplayBufferSlice {
            state: self.states[idx].clone(),
            action: self.actions[idx].clone(),
            next_state: self.next_states[idx].clone(),
            reward: self.rewards[idx],
            terminated: self.terminated[idx],
            truncated: self.truncated[idx],
        })
    }

    /// Adds a ReplayBufferSlice<O, A>, which is a single
    /// sample of data, the to buffer
    pub fn add_slice(&mut self, item: ReplayBufferSlice<O, A>) {
        if self.full() {
            self.states[self.ptr] = item.state;
            self.actions[self.ptr] = item.action;
            self.next_states[self.ptr] = item.next_state;
            self.rewards[self.ptr] = item.reward;
            self.terminated[self.ptr] = item.terminated;
            self.truncated[self.ptr] = item.truncated;
        } else {
            self.states.push(item.state);
            self.actions.push(item.action);
            self.next_states.push(item.next_state);
            self.rewards.push(item.reward);
            self.terminated.push(item.terminated);
            self.truncated.push(item.truncated);
        }

        self.ptr = (self.ptr + 1) % self.size();
    }

    /// Adds a single piece of data to the replay buffer
    pub fn add(
        &mut self,
        state: O,
        action: A,
        next_state: O,
        reward: f32,
        terminated: bool,
        truncated: bool,
    ) {
        self.add_slice(ReplayBufferSlice {
            state,
            action,
            next_state,
            reward,
            terminated,
            truncated,
        })
    }

    /// Uniformly samples `batch_size` transitions, with replacement.
    ///
    /// Note, the data is cloned out of the data (not removed).
    ///
    /// # Panics
    /// Will panic if the buffer is empty.
    pub fn batch_sample(&self, batch_size: usize) -> BatchedReplayBufferSlice<O, A> {
        if self.curr_len() == 0 {
            panic!("Cannot sample from an empty replay buffer");
        }

        let mut rng = rand::rng();
        let indices: Vec<usize> = (0..batch_size)
            .map(|_| rng.random_range(0..self.curr_len()))
            .collect();

        BatchedReplayBufferSlice {
            states: indices.iter().map(|&i| self.states[i].clone()).collect(),
            actions: indices.iter().map(|&i| self.actions[i].clone()).collect(),
            next_states: indices
                .iter()
                .map(|&i| self.next_states[i].clone())
                .collect(),
            rewards: indices.iter().map(|&i| self.rewards[i]).collect(),
            terminated: indices.iter().map(|&i| self.terminated[i]).collect(),
            truncated: indices.iter().map(|&i| self.truncated[i]).collect(),
        }
    }
}

#[cfg(test)]
mod tests {

    use crate::common::spaces::{BoxSpace, Discrete, Space};

    use super::ReplayBuffer;

    #[test]
    fn test_create_replay_buffer() {
        let mut observation_space = Discrete::from(6);
        let mut action_space = BoxSpace::from((vec![0.0, 0.0, 0.1], vec![1.0, 0.2, 0.1]));

        let mut buffer = ReplayBuffer::new(1000);

        buffer.add(
            observation_space.sample(),
            action_space.sample(),
            observation_space.sample(),
            0.5,
            false,
            false,
        );

        assert_eq!(buffer.curr_len(), 1);
    }

    #[should_panic]
    #[test]
    fn test_batch_sample_empty() {
        let buffer = ReplayBuffer::<usize, Vec<f32>>::new(1000);

        buffer.batch_sample(64);
    }

    #[test]
    fn test_batch_sample_larger_than_contents() {
        let mut buffer: ReplayBuffer<usize, usize> = ReplayBuffer::new(1000);

        for i in 0..4 {
            buffer.add(i, i, i + 1, 0.5, false, false);
        }

        let batch = buffer.batch_sample(32);
        assert_eq!(batch.len(), 32);
        assert!(batch.states.iter().all(|&s| s < 4));
        assert!(batch
            .states
            .iter()
            .zip(batch.next_states.iter())
            .all(|(s, ns)| *ns == s + 1));
    }

    #[test]
    fn test_full() {
        let mut buffer: ReplayBuffer<usize, usize> = ReplayBuffer::new(5);

        for _ in 0..5 {
            assert!(!buffer.full());
            buffer.add(0, 0, 0, 0.0, false, false)
        }

        assert!(buffer.full());
    }

    #[test]
    fn test_overwrites_oldest() {
        let mut buffer: ReplayBuffer<usize, usize> = ReplayBuffer::new(3);

        for i in 0..5 {
            buffer.add(i, 0, 0, i as f32, false, false);
        }

        assert_eq!(buffer.curr_len(), 3);

        let mut states: Vec<usize> = (0..3)
            .filter_map(|i| buffer.get(i))
            .map(|s| s.state)
            .collect();
        states.sort();
        assert_eq!(states, vec![2, 3, 4]);
        assert!(buffer.get(3).is_none());
    }

    #[test]
    fn test_done_mask_ignores_truncation() {
        let mut buffer: ReplayBuffer<usize, usize> = ReplayBuffer::new(1);
        buffer.add(0, 0, 0, 0.0, false, true);

        let batch = buffer.batch_sample(2);
        assert_eq!(batch.done_mask(), vec![0.0, 0.0]);
    }
}
