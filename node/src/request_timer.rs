//! Outstanding block requests, one per height.
//!
//! An entry older than the request timeout counts as absent, so the next
//! `try_request_next` asks again (possibly another peer).

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

struct Pending {
    peer_id: String,
    deadline: Instant,
}

pub struct RequestTimer {
    timeout: Duration,
    pending: Mutex<HashMap<u32, Pending>>,
}

impl RequestTimer {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            pending: Mutex::new(HashMap::new()),
        }
    }

    pub fn add(&self, height: u32, peer_id: &str) {
        let entry = Pending {
            peer_id: peer_id.to_string(),
            deadline: Instant::now() + self.timeout,
        };
        self.lock().insert(height, entry);
    }

    /// True while a request for `height` is outstanding. Expired entries are dropped.
    pub fn exists(&self, height: u32) -> bool {
        let mut pending = self.lock();
        match pending.get(&height) {
            Some(p) if p.deadline > Instant::now() => true,
            Some(_) => {
                pending.remove(&height);
                false
            }
            None => false,
        }
    }

    pub fn remove(&self, height: u32) {
        self.lock().remove(&height);
    }

    /// Forget every request sent to `peer_id`. Returns the freed heights.
    pub fn remove_by_peer(&self, peer_id: &str) -> Vec<u32> {
        let mut pending = self.lock();
        let heights: Vec<u32> = pending
            .iter()
            .filter(|(_, p)| p.peer_id == peer_id)
            .map(|(h, _)| *h)
            .collect();
        for h in &heights {
            pending.remove(h);
        }
        heights
    }

    /// Drop expired entries. Returns their heights in ascending order.
    pub fn expire(&self) -> Vec<u32> {
        let now = Instant::now();
        let mut pending = self.lock();
        let mut expired: Vec<u32> = pending
            .iter()
            .filter(|(_, p)| p.deadline <= now)
            .map(|(h, _)| *h)
            .collect();
        expired.sort_unstable();
        for h in &expired {
            pending.remove(h);
        }
        expired
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<u32, Pending>> {
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }
}
