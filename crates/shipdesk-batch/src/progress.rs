use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::broadcast;

pub const DEFAULT_PROGRESS_BUFFER_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchProgress {
    pub sequence: u64,
    pub operation: &'static str,
    pub completed: usize,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl BatchProgress {
    pub fn is_finished(&self) -> bool {
        self.completed >= self.total
    }
}

/// Fan-out of batch progress to any number of observers. Publishing with no
/// subscribers is not an error.
#[derive(Debug)]
pub struct ProgressBus {
    next_sequence: AtomicU64,
    sender: broadcast::Sender<BatchProgress>,
}

impl Default for ProgressBus {
    fn default() -> Self {
        Self::new(DEFAULT_PROGRESS_BUFFER_CAPACITY)
    }
}

impl ProgressBus {
    pub fn new(buffer_capacity: usize) -> Self {
        assert!(
            buffer_capacity > 0,
            "progress buffer_capacity must be greater than 0"
        );
        let (sender, _receiver) = broadcast::channel(buffer_capacity);
        Self {
            next_sequence: AtomicU64::new(0),
            sender,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BatchProgress> {
        self.sender.subscribe()
    }

    pub fn publish(
        &self,
        operation: &'static str,
        completed: usize,
        total: usize,
        succeeded: usize,
        failed: usize,
    ) -> BatchProgress {
        let progress = BatchProgress {
            sequence: self.next_sequence(),
            operation,
            completed,
            total,
            succeeded,
            failed,
        };
        if self.sender.receiver_count() > 0 {
            let _ = self.sender.send(progress.clone());
        }
        progress
    }

    fn next_sequence(&self) -> u64 {
        let mut current = self.next_sequence.load(Ordering::Relaxed);
        loop {
            let next = current
                .checked_add(1)
                .expect("batch progress sequence exhausted");
            match self.next_sequence.compare_exchange_weak(
                current,
                next,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return next,
                Err(observed) => current = observed,
            }
        }
    }
}
