//! Seed sources for token derivation.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use uuid::Uuid;

/// Produces one seed per token segment.
///
/// Implementations must never hand out the same seed twice within a process;
/// token uniqueness rests entirely on that.
pub trait EntropySource: Send + Sync {
    fn seed(&self) -> String;
}

static SEED_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Live entropy: random UUID, RNG draw, wall-clock nanos, pid and a
/// process-wide counter.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEntropy;

impl EntropySource for SystemEntropy {
    fn seed(&self) -> String {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_nanos())
            .unwrap_or_default();
        let sequence = SEED_COUNTER.fetch_add(1, Ordering::Relaxed);
        let noise: u64 = rand::random();

        format!(
            "{}{nanos}{}{sequence}{noise:016x}",
            Uuid::new_v4().simple(),
            std::process::id()
        )
    }
}

/// Deterministic seeds `"<prefix>-0"`, `"<prefix>-1"`, ...
///
/// Used to replay token derivation in tests and fixtures.
#[derive(Debug)]
pub struct SequenceEntropy {
    prefix: String,
    next: AtomicU64,
}

impl SequenceEntropy {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: AtomicU64::new(0),
        }
    }
}

impl EntropySource for SequenceEntropy {
    fn seed(&self) -> String {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        format!("{}-{n}", self.prefix)
    }
}
