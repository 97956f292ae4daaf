use super::RecordStore;
use crate::error::Error;
use std::sync::atomic::{AtomicI64, Ordering};

/// Issues record identifiers. Implementations must be safe to call from
/// several threads at once.
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> i64;
}

/// Monotonic ids continuing after the highest id already stored.
#[derive(Debug)]
pub struct SequentialIds {
    last: AtomicI64,
}

impl SequentialIds {
    pub fn starting_after(last: i64) -> Self {
        Self {
            last: AtomicI64::new(last.max(0)),
        }
    }

    pub fn from_store(store: &dyn RecordStore) -> Result<Self, Error> {
        Ok(Self::starting_after(store.max_record_id()?.unwrap_or(0)))
    }
}

impl IdGenerator for SequentialIds {
    fn next_id(&self) -> i64 {
        self.last.fetch_add(1, Ordering::Relaxed) + 1
    }
}

/// Random positive 63-bit ids.
#[derive(Debug, Default)]
pub struct RandomIds;

impl IdGenerator for RandomIds {
    fn next_id(&self) -> i64 {
        loop {
            let (high, _) = uuid::Uuid::new_v4().as_u64_pair();
            let id = (high & i64::MAX as u64) as i64;
            if id != 0 {
                return id;
            }
        }
    }
}
