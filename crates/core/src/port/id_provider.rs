// ID Provider Port (for deterministic testing)

/// ID provider interface (allows deterministic IDs in tests)
pub trait IdProvider: Send + Sync {
    /// Generate a new job ID. Uniqueness is enforced by the registry, not here.
    fn generate_id(&self) -> String;
}

/// Short random IDs: first 8 hex chars of a UUID v4 (production)
pub struct UuidProvider;

pub const SHORT_ID_LEN: usize = 8;

impl IdProvider for UuidProvider {
    fn generate_id(&self) -> String {
        let mut id = uuid::Uuid::new_v4().simple().to_string();
        id.truncate(SHORT_ID_LEN);
        id
    }
}

pub mod mocks {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Mutex;

    /// job-1, job-2, ...
    #[derive(Default)]
    pub struct SequentialIdProvider {
        next: AtomicU64,
    }

    impl IdProvider for SequentialIdProvider {
        fn generate_id(&self) -> String {
            let n = self.next.fetch_add(1, Ordering::Relaxed) + 1;
            format!("job-{n}")
        }
    }

    /// Replays a fixed list of IDs, then falls back to sequential ones
    pub struct ScriptedIdProvider {
        ids: Mutex<VecDeque<String>>,
        fallback: SequentialIdProvider,
    }

    impl ScriptedIdProvider {
        pub fn new<I, S>(ids: I) -> Self
        where
            I: IntoIterator<Item = S>,
            S: Into<String>,
        {
            Self {
                ids: Mutex::new(ids.into_iter().map(Into::into).collect()),
                fallback: SequentialIdProvider::default(),
            }
        }
    }

    impl IdProvider for ScriptedIdProvider {
        fn generate_id(&self) -> String {
            let next = self
                .ids
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .pop_front();
            next.unwrap_or_else(|| self.fallback.generate_id())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uuid_provider_short_hex() {
        let id = UuidProvider.generate_id();
        assert_eq!(id.len(), SHORT_ID_LEN);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_scripted_then_sequential() {
        let ids = mocks::ScriptedIdProvider::new(["dup", "dup"]);
        assert_eq!(ids.generate_id(), "dup");
        assert_eq!(ids.generate_id(), "dup");
        assert_eq!(ids.generate_id(), "job-1");
    }
}
