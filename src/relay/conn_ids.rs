use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use rand::Rng;

use crate::relay::protocol::ConnId;

/// Hands out random connection ids that are unique among live connections.
///
/// Shared between the accept loop (which allocates) and the server loop
/// (which releases once a disconnect has been fully processed).
#[derive(Debug, Clone, Default)]
pub struct ConnIdAllocator {
    live: Arc<Mutex<HashSet<ConnId>>>,
}

impl ConnIdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&self) -> ConnId {
        self.allocate_with(&mut rand::thread_rng())
    }

    pub fn allocate_with<R: Rng>(&self, rng: &mut R) -> ConnId {
        let mut live = match self.live.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        loop {
            let id = ConnId::random(&mut *rng);
            if live.insert(id.clone()) {
                return id;
            }
        }
    }

    pub fn release(&self, id: &ConnId) {
        if let Ok(mut live) = self.live.lock() {
            live.remove(id);
        }
    }

    pub fn live_count(&self) -> usize {
        self.live.lock().map(|l| l.len()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use crate::relay::protocol::CONN_ID_LEN;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn ids_are_alphanumeric_and_unique() {
        let ids = ConnIdAllocator::new();
        let a = ids.allocate();
        let b = ids.allocate();

        assert_eq!(a.as_str().len(), CONN_ID_LEN);
        assert!(a.as_str().chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a, b);
        assert_eq!(ids.live_count(), 2);

        ids.release(&a);
        assert_eq!(ids.live_count(), 1);
    }

    #[test]
    fn collision_with_live_id_is_retried() {
        let ids = ConnIdAllocator::new();
        let first = ids.allocate_with(&mut StdRng::seed_from_u64(7));
        // Same seed replays the same first draw; it must be skipped.
        let second = ids.allocate_with(&mut StdRng::seed_from_u64(7));
        assert_ne!(first, second);

        ids.release(&first);
        let third = ids.allocate_with(&mut StdRng::seed_from_u64(7));
        assert_eq!(third, first);
    }
}
