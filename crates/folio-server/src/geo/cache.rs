//! In-process TTL cache of resolved locations, keyed by IP string.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

use folio_core::location::Location;

#[derive(Debug, Clone)]
struct CacheEntry {
    location: Location,
    /// Insertion sequence number; the key into `Entries::order`.
    seq: u64,
    expires_at: Instant,
}

/// Map plus an insertion-ordered index so the oldest entry is found in
/// `O(log n)`.
#[derive(Debug, Default)]
struct Entries {
    map: HashMap<String, CacheEntry>,
    order: BTreeMap<u64, String>,
    next_seq: u64,
}

impl Entries {
    fn insert(&mut self, ip: &str, location: Location, expires_at: Instant) {
        let seq = self.next_seq;
        self.next_seq += 1;
        let entry = CacheEntry {
            location,
            seq,
            expires_at,
        };
        if let Some(old) = self.map.insert(ip.to_string(), entry) {
            self.order.remove(&old.seq);
        }
        self.order.insert(seq, ip.to_string());
    }

    fn remove(&mut self, ip: &str) {
        if let Some(entry) = self.map.remove(ip) {
            self.order.remove(&entry.seq);
        }
    }

    fn len(&self) -> usize {
        self.map.len()
    }

    fn remove_expired(&mut self, now: Instant) -> usize {
        let expired: Vec<String> = self
            .map
            .iter()
            .filter(|(_, entry)| now > entry.expires_at)
            .map(|(ip, _)| ip.clone())
            .collect();
        for ip in &expired {
            self.remove(ip);
        }
        expired.len()
    }

    /// Remove oldest-inserted entries until at most `max` remain.
    fn evict_oldest(&mut self, max: usize) -> usize {
        let mut evicted = 0;
        while self.map.len() > max {
            let Some((_, ip)) = self.order.pop_first() else {
                break;
            };
            self.map.remove(&ip);
            evicted += 1;
        }
        evicted
    }
}

/// What a sweep removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub expired: usize,
    pub evicted: usize,
}

/// Best-effort location cache.
///
/// Entries expire `ttl` after insertion. The map is capped at
/// `max_entries`; when full, the oldest-inserted entries go first.
/// Contents are process-local and lost on restart.
pub struct GeoCache {
    entries: Mutex<Entries>,
    max_entries: usize,
}

impl GeoCache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: Mutex::new(Entries::default()),
            max_entries: max_entries.max(1),
        }
    }

    /// Return the cached location for `ip`, or `None` on a miss.
    ///
    /// An entry whose expiry has passed counts as a miss and is dropped.
    pub async fn get(&self, ip: &str) -> Option<Location> {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        match entries.map.get(ip) {
            Some(entry) if now <= entry.expires_at => return Some(entry.location.clone()),
            Some(_) => {}
            None => return None,
        }
        entries.remove(ip);
        None
    }

    /// Store `location` for `ip` for `ttl`, evicting the oldest entries if
    /// the cache is at capacity.
    pub async fn put(&self, ip: &str, location: Location, ttl: Duration) {
        let mut entries = self.entries.lock().await;
        entries.insert(ip, location, Instant::now() + ttl);
        let evicted = entries.evict_oldest(self.max_entries);
        if evicted > 0 {
            debug!(evicted, "Geo cache over capacity");
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// Drop expired entries, then trim to capacity oldest-first.
    pub async fn sweep(&self) -> SweepReport {
        let mut entries = self.entries.lock().await;
        let expired = entries.remove_expired(Instant::now());
        let evicted = entries.evict_oldest(self.max_entries);
        SweepReport { expired, evicted }
    }

    /// Spawn the periodic sweep. The task runs until [`SweepHandle::stop`]
    /// is called or the handle is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> SweepHandle {
        let cache = Arc::clone(self);
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick fires immediately; nothing can have expired yet.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let report = cache.sweep().await;
                        if report.expired > 0 || report.evicted > 0 {
                            info!(
                                expired = report.expired,
                                evicted = report.evicted,
                                "Geo cache swept"
                            );
                        }
                    }
                    _ = &mut stop_rx => break,
                }
            }
        });
        SweepHandle {
            stop: Some(stop_tx),
            task: Some(task),
        }
    }
}

/// Owner of the background sweep task.
pub struct SweepHandle {
    stop: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl SweepHandle {
    /// Signal the sweeper to exit and wait for it.
    pub async fn stop(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for SweepHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
