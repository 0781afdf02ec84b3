use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

/// Admits at most one top-level unit of work at a time.
///
/// The slot holds the generation of the current flight, or 0 when empty.
#[derive(Default)]
pub struct FlightSlot {
    owner: Arc<AtomicU64>,
    next_generation: AtomicU64,
}

/// Proof of holding the slot. Releases it on drop unless the slot was
/// force-released and handed to a newer flight in the meantime.
#[derive(Debug)]
pub struct Flight {
    generation: u64,
    owner: Arc<AtomicU64>,
}

impl FlightSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_acquire(&self) -> Option<Flight> {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed) + 1;
        self.owner
            .compare_exchange(0, generation, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Flight {
                generation,
                owner: self.owner.clone(),
            })
    }

    /// Empty the slot regardless of who holds it. Returns whether it was held.
    pub fn release(&self) -> bool {
        self.owner.swap(0, Ordering::AcqRel) != 0
    }

    pub fn is_busy(&self) -> bool {
        self.owner.load(Ordering::Acquire) != 0
    }
}

impl Drop for Flight {
    fn drop(&mut self) {
        let _ = self.owner.compare_exchange(
            self.generation,
            0,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_flight() {
        let slot = FlightSlot::new();
        let flight = slot.try_acquire().unwrap();
        assert!(slot.is_busy());
        assert!(slot.try_acquire().is_none());

        drop(flight);
        assert!(!slot.is_busy());
        assert!(slot.try_acquire().is_some());
    }

    #[test]
    fn test_stale_flight_does_not_release_newer_one() {
        let slot = FlightSlot::new();
        let stale = slot.try_acquire().unwrap();

        assert!(slot.release());
        let current = slot.try_acquire().unwrap();

        drop(stale);
        assert!(slot.is_busy());

        drop(current);
        assert!(!slot.is_busy());
        assert!(!slot.release());
    }
}
