//! Per-worker counters: monotonic, mutated only by the owning worker thread
//! and observed elsewhere solely through a [`Counters`] snapshot carried
//! over the control channel (see [`crate::control`]).

use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Counters {
    pub requests: u64,
    pub code_200: u64,
    pub code_404: u64,
    pub code_412: u64,
    pub code_503: u64,
}

impl Counters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `other`'s fields into `self`, component-wise. Used by the
    /// coordinator to aggregate replies from multiple workers.
    pub fn add_assign(&mut self, other: &Counters) {
        self.requests += other.requests;
        self.code_200 += other.code_200;
        self.code_404 += other.code_404;
        self.code_412 += other.code_412;
        self.code_503 += other.code_503;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_all_zero() {
        let c = Counters::new();
        assert_eq!(c.requests, 0);
        assert_eq!(c.code_200, 0);
    }

    #[test]
    fn add_assign_sums_component_wise() {
        let mut a = Counters {
            requests: 5,
            code_200: 3,
            code_404: 0,
            code_412: 1,
            code_503: 1,
        };
        let b = Counters {
            requests: 2,
            code_200: 2,
            code_404: 0,
            code_412: 0,
            code_503: 0,
        };
        a.add_assign(&b);
        assert_eq!(a.requests, 7);
        assert_eq!(a.code_200, 5);
        assert_eq!(a.code_412, 1);
        assert_eq!(a.code_503, 1);
    }
}
