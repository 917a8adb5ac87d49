/// Evaluation limits shared by every evaluation an [`Evaluator`](super::Evaluator) runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvaluatorConfig {
    /// Maximum nesting of expression trees; deeper trees fail with `err:XPDY0130`.
    pub max_depth: usize,
    /// Entries kept by each context's result cache (0 disables caching).
    pub cache_capacity: usize,
    /// Loop iterations between cancellation polls inside paths, predicates
    /// and quantifiers.
    pub poll_interval: usize,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            max_depth: 512,
            cache_capacity: 256,
            poll_interval: 64,
        }
    }
}

impl EvaluatorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    pub fn with_poll_interval(mut self, interval: usize) -> Self {
        self.poll_interval = interval.max(1);
        self
    }
}
