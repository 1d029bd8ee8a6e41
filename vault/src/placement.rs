//! Assign shares to backends.

use crate::backend::Backend;
use std::sync::Arc;

/// Policy assigning each share to a backend.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Placement {
    /// Share `i` is placed on backend `i mod B`.
    #[default]
    RoundRobin,

    /// Backends are (stably) ordered from most to least durable before applying
    /// [Placement::RoundRobin], so the lowest indices land on the most durable backends.
    DurableFirst,
}

impl Placement {
    /// Returns the position (in `backends`) of the backend assigned to each of `shares` shares.
    ///
    /// Returns an empty assignment if there are no backends.
    pub fn assign(&self, backends: &[Arc<dyn Backend>], shares: usize) -> Vec<usize> {
        if backends.is_empty() {
            return Vec::new();
        }
        let mut order = (0..backends.len()).collect::<Vec<_>>();
        if let Placement::DurableFirst = self {
            order.sort_by_key(|position| backends[*position].kind());
        }
        (0..shares).map(|i| order[i % order.len()]).collect()
    }
}
