//! Injected identifier generation.
//!
//! Nothing in the engine mints ids from process-wide state. Callers hand an
//! [`IdGenerator`] to whatever needs fresh ids, so production code can use
//! random UUIDs while tests get a predictable sequence.

use std::sync::atomic::{AtomicU64, Ordering};

use uuid::Uuid;

/// Source of fresh unique identifiers.
pub trait IdGenerator: Send + Sync {
    /// Returns a new identifier, distinct from every one returned before.
    fn next_id(&self) -> Uuid;
}

/// Generates random version 4 UUIDs.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomIdGenerator;

impl IdGenerator for RandomIdGenerator {
    fn next_id(&self) -> Uuid {
        Uuid::new_v4()
    }
}

/// Generates `00000000-0000-0000-0000-000000000001`, `...02` and so on.
#[derive(Debug, Default)]
pub struct SequentialIdGenerator {
    counter: AtomicU64,
}

impl SequentialIdGenerator {
    /// Creates a generator whose first id is `1`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a generator whose first id is `start + 1`.
    pub fn starting_after(start: u64) -> Self {
        Self {
            counter: AtomicU64::new(start),
        }
    }
}

impl IdGenerator for SequentialIdGenerator {
    fn next_id(&self) -> Uuid {
        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        Uuid::from_u128(u128::from(n))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequential_ids_count_up_from_one() {
        let ids = SequentialIdGenerator::new();
        assert_eq!(ids.next_id(), Uuid::from_u128(1));
        assert_eq!(ids.next_id(), Uuid::from_u128(2));
    }

    #[test]
    fn sequential_ids_can_resume() {
        let ids = SequentialIdGenerator::starting_after(41);
        assert_eq!(ids.next_id(), Uuid::from_u128(42));
    }

    #[test]
    fn random_ids_differ() {
        let ids = RandomIdGenerator;
        assert_ne!(ids.next_id(), ids.next_id());
    }
}
