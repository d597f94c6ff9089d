//! Engine-wide tunables, passed at construction instead of read from
//! globals.

/// Tunables for a [`crate::dispatcher::Dispatcher`].
#[derive(Clone, Copy, Debug)]
pub struct EngineConfig {
    /// Initial `Vec` capacity for the dispatcher's entry list.
    pub queue_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig { queue_capacity: 16 }
    }
}
