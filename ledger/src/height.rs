//! # Height Oracle
//!
//! The ledger's only notion of time is the host's monotonic height counter.
//! It is read once per operation through [`HeightOracle`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::types::Height;

/// Source of the current host height.
pub trait HeightOracle {
    /// Height at the moment of the call.
    fn current_height(&self) -> Height;
}

/// In-process height counter shared between the host and the ledger.
///
/// Cloning yields another handle onto the same counter. The counter only
/// moves forward: [`set`](Self::set) ignores attempts to lower it.
#[derive(Debug, Clone, Default)]
pub struct BlockHeight {
    height: Arc<AtomicU64>,
}

impl BlockHeight {
    /// Starts the counter at `genesis`.
    pub fn new(genesis: Height) -> Self {
        Self {
            height: Arc::new(AtomicU64::new(genesis)),
        }
    }

    /// Raises the counter to `height`. Returns the height now in effect,
    /// which is the old value if `height` would have moved it backwards.
    pub fn set(&self, height: Height) -> Height {
        let previous = self.height.fetch_max(height, Ordering::SeqCst);
        previous.max(height)
    }

    /// Moves the counter forward by `blocks`, saturating at `u64::MAX`.
    pub fn advance(&self, blocks: u64) -> Height {
        let mut current = self.height.load(Ordering::SeqCst);
        loop {
            let next = current.saturating_add(blocks);
            match self.height.compare_exchange(
                current,
                next,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return next,
                Err(observed) => current = observed,
            }
        }
    }
}

impl HeightOracle for BlockHeight {
    fn current_height(&self) -> Height {
        self.height.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_never_moves_backwards() {
        let height = BlockHeight::new(10);
        assert_eq!(height.set(20), 20);
        assert_eq!(height.set(5), 20);
        assert_eq!(height.current_height(), 20);
    }

    #[test]
    fn advance_saturates() {
        let height = BlockHeight::new(u64::MAX - 1);
        assert_eq!(height.advance(5), u64::MAX);
    }

    #[test]
    fn clones_observe_the_same_counter() {
        let height = BlockHeight::new(1);
        let view = height.clone();
        height.advance(49);
        assert_eq!(view.current_height(), 50);
    }
}
