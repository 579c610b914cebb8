use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

/// Generation tag for a loaded store. Async work started under an older epoch
/// must not touch current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Epoch(pub u64);

impl fmt::Display for Epoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "epoch#{}", self.0)
    }
}

#[derive(Clone, Default)]
pub struct EpochCounter {
    current: Arc<AtomicU64>,
}

impl EpochCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Epoch {
        Epoch(self.current.load(Ordering::Acquire))
    }

    /// Move to a new epoch, orphaning everything tagged with the previous one.
    pub fn advance(&self) -> Epoch {
        Epoch(self.current.fetch_add(1, Ordering::AcqRel) + 1)
    }

    pub fn guard(&self) -> EpochGuard {
        EpochGuard {
            counter: self.clone(),
            epoch: self.current(),
        }
    }
}

/// Captured epoch that async work checks after every suspension point.
#[derive(Clone)]
pub struct EpochGuard {
    counter: EpochCounter,
    epoch: Epoch,
}

impl EpochGuard {
    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    pub fn is_current(&self) -> bool {
        self.counter.current() == self.epoch
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_goes_stale_after_advance() {
        let counter = EpochCounter::new();
        let guard = counter.guard();
        assert!(guard.is_current());

        let next = counter.advance();
        assert!(next > guard.epoch());
        assert!(!guard.is_current());
        assert!(counter.guard().is_current());
    }
}
