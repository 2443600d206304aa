use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex},
};

use crate::frame::Frame;

/// Frames never evicted below this count, regardless of the byte budget.
pub const MIN_RETAINED_FRAMES: usize = 20;

/// One contiguous run of cached frame numbers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CacheRange {
    /// First frame number in the run (inclusive).
    pub start: i64,
    /// Last frame number in the run (inclusive).
    pub end: i64,
}

#[derive(Debug, Default)]
struct CacheInner {
    max_bytes: i64,
    frames: HashMap<i64, Arc<Frame>>,
    /// Recency order, most-recently-used first.
    lru: VecDeque<i64>,
    /// All known frame numbers; sorted on demand for range coalescing.
    ordered: Vec<i64>,
    needs_range_processing: bool,
    range_version: u64,
    ranges: Vec<CacheRange>,
}

/// A byte-bounded in-memory store of produced frames, keyed by frame number.
///
/// All operations serialize on one internal lock; reads never fail (a miss is
/// simply `None`). Eviction is least-recently-used, only while the byte total
/// exceeds the budget and more than [`MIN_RETAINED_FRAMES`] frames remain. A
/// budget of 0 disables eviction entirely.
#[derive(Debug)]
pub struct CacheMemory {
    inner: Mutex<CacheInner>,
}

impl CacheMemory {
    /// An unbounded cache (never evicts).
    pub fn new() -> Self {
        Self::with_max_bytes(0)
    }

    /// A cache bounded to roughly `max_bytes` of frame data.
    pub fn with_max_bytes(max_bytes: i64) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                max_bytes,
                ..CacheInner::default()
            }),
        }
    }

    /// Size the byte budget from a stream profile: room for `frame_count`
    /// frames of the given dimensions plus one frame's worth of audio each.
    pub fn set_max_bytes_from_info(
        &self,
        frame_count: usize,
        width: u32,
        height: u32,
        sample_rate: i32,
        channels: i32,
    ) {
        let image = i64::from(width) * i64::from(height) * 4;
        let audio = i64::from(sample_rate / 24) * i64::from(channels.max(1)) * 4;
        self.set_max_bytes(frame_count as i64 * (image + audio));
    }

    /// The configured byte budget (0 = unbounded).
    pub fn max_bytes(&self) -> i64 {
        self.lock().max_bytes
    }

    /// Change the byte budget.
    pub fn set_max_bytes(&self, max_bytes: i64) {
        self.lock().max_bytes = max_bytes;
    }

    /// Insert a frame, or refresh its recency if already present, then evict
    /// down to the byte budget.
    pub fn add(&self, frame: Arc<Frame>) {
        let mut inner = self.lock();
        let number = frame.number;
        if inner.frames.contains_key(&number) {
            move_to_front(&mut inner.lru, number);
            inner.frames.insert(number, frame);
        } else {
            inner.frames.insert(number, frame);
            inner.lru.push_front(number);
            inner.ordered.push(number);
            inner.needs_range_processing = true;
            clean_up(&mut inner);
        }
    }

    /// O(1) lookup; `None` on a miss.
    pub fn get_frame(&self, number: i64) -> Option<Arc<Frame>> {
        self.lock().frames.get(&number).cloned()
    }

    /// The cached frame with the smallest frame number.
    pub fn smallest_frame(&self) -> Option<Arc<Frame>> {
        let inner = self.lock();
        let smallest = inner.frames.keys().min()?;
        inner.frames.get(smallest).cloned()
    }

    /// Remove one frame by number.
    pub fn remove(&self, number: i64) {
        self.remove_range(number, number);
    }

    /// Remove the closed range `[start, end]` of frame numbers.
    pub fn remove_range(&self, start: i64, end: i64) {
        let mut inner = self.lock();
        remove_range_locked(&mut inner, start, end);
    }

    /// Drop every cached frame.
    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.frames.clear();
        inner.lru.clear();
        inner.ordered.clear();
        inner.needs_range_processing = true;
    }

    /// Number of cached frames.
    pub fn count(&self) -> usize {
        self.lock().frames.len()
    }

    /// Total bytes of all cached frames.
    pub fn bytes(&self) -> i64 {
        let inner = self.lock();
        total_bytes(&inner)
    }

    /// The coalesced runs of cached frame numbers, plus a version counter
    /// that advances whenever the runs are recomputed. Observers can compare
    /// versions to detect staleness without diffing the list.
    pub fn ranges(&self) -> (u64, Vec<CacheRange>) {
        let mut inner = self.lock();
        calculate_ranges(&mut inner);
        (inner.range_version, inner.ranges.clone())
    }

    /// Snapshot for UI introspection: version, byte total, frame count and
    /// ranges, with 64-bit frame numbers stringified.
    pub fn to_structured(&self) -> serde_json::Value {
        let mut inner = self.lock();
        calculate_ranges(&mut inner);
        let ranges: Vec<serde_json::Value> = inner
            .ranges
            .iter()
            .map(|r| {
                serde_json::json!({
                    "start": r.start.to_string(),
                    "end": r.end.to_string(),
                })
            })
            .collect();
        serde_json::json!({
            "type": "CacheMemory",
            "version": inner.range_version.to_string(),
            "ranges": ranges,
            "frame_count": inner.frames.len(),
            "bytes": total_bytes(&inner),
            "max_bytes": inner.max_bytes,
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CacheInner> {
        self.inner.lock().expect("cache lock poisoned")
    }
}

impl Default for CacheMemory {
    fn default() -> Self {
        Self::new()
    }
}

fn total_bytes(inner: &CacheInner) -> i64 {
    inner.frames.values().map(|f| f.bytes() as i64).sum()
}

fn move_to_front(lru: &mut VecDeque<i64>, number: i64) {
    if let Some(at) = lru.iter().position(|&n| n == number) {
        lru.remove(at);
        lru.push_front(number);
    }
}

fn remove_range_locked(inner: &mut CacheInner, start: i64, end: i64) {
    inner.lru.retain(|&n| n < start || n > end);
    inner.ordered.retain(|&n| n < start || n > end);
    inner.frames.retain(|&n, _| n < start || n > end);
    inner.needs_range_processing = true;
}

fn clean_up(inner: &mut CacheInner) {
    if inner.max_bytes <= 0 {
        return;
    }
    while total_bytes(inner) > inner.max_bytes && inner.lru.len() > MIN_RETAINED_FRAMES {
        let Some(&oldest) = inner.lru.back() else {
            break;
        };
        tracing::debug!(frame = oldest, "cache evicting least-recently-used frame");
        remove_range_locked(inner, oldest, oldest);
    }
}

fn calculate_ranges(inner: &mut CacheInner) {
    if !inner.needs_range_processing {
        return;
    }
    inner.ordered.sort_unstable();
    inner.range_version += 1;
    inner.ranges.clear();

    let mut iter = inner.ordered.iter().copied();
    let Some(first) = iter.next() else {
        inner.needs_range_processing = false;
        return;
    };
    let mut start = first;
    let mut end = first;
    for n in iter {
        if n - end > 1 {
            inner.ranges.push(CacheRange { start, end });
            start = n;
        }
        end = n;
    }
    inner.ranges.push(CacheRange { start, end });
    inner.needs_range_processing = false;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(number: i64, samples: usize) -> Arc<Frame> {
        Arc::new(Frame::blank(number, 4, 4, [0, 0, 0], samples, 2))
    }

    #[test]
    fn miss_returns_none_without_error() {
        let cache = CacheMemory::new();
        assert!(cache.get_frame(1).is_none());
    }

    #[test]
    fn add_and_get_roundtrip() {
        let cache = CacheMemory::new();
        cache.add(frame(3, 10));
        assert_eq!(cache.get_frame(3).unwrap().number, 3);
        assert_eq!(cache.count(), 1);
    }

    #[test]
    fn re_adding_refreshes_rather_than_duplicates() {
        let cache = CacheMemory::new();
        cache.add(frame(1, 10));
        cache.add(frame(2, 10));
        cache.add(frame(1, 10));
        assert_eq!(cache.count(), 2);
    }

    #[test]
    fn eviction_respects_budget_and_floor() {
        // Each frame: 4*4*4 image + 100*2*4 audio = 864 bytes.
        let per_frame = 864;
        let cache = CacheMemory::with_max_bytes(per_frame * 25);
        for n in 1..=40 {
            cache.add(frame(n, 100));
        }
        assert!(cache.bytes() <= per_frame * 25);
        assert!(cache.count() >= MIN_RETAINED_FRAMES);
        // Oldest frames went first.
        assert!(cache.get_frame(1).is_none());
        assert!(cache.get_frame(40).is_some());
    }

    #[test]
    fn zero_budget_never_evicts() {
        let cache = CacheMemory::with_max_bytes(0);
        for n in 1..=100 {
            cache.add(frame(n, 100));
        }
        assert_eq!(cache.count(), 100);
    }

    #[test]
    fn floor_overrides_budget() {
        let cache = CacheMemory::with_max_bytes(1);
        for n in 1..=30 {
            cache.add(frame(n, 100));
        }
        assert_eq!(cache.count(), MIN_RETAINED_FRAMES);
    }

    #[test]
    fn recency_refresh_changes_eviction_order() {
        let per_frame = 864;
        let cache = CacheMemory::with_max_bytes(per_frame * 20);
        for n in 1..=21 {
            cache.add(frame(n, 100));
        }
        // Refresh frame 1 so frame 2 becomes the eviction candidate.
        cache.add(frame(1, 100));
        cache.add(frame(22, 100));
        assert!(cache.get_frame(1).is_some());
        assert!(cache.get_frame(2).is_none());
    }

    #[test]
    fn ranges_coalesce_and_version_advances() {
        let cache = CacheMemory::new();
        for n in [1, 2, 3, 7, 8, 20] {
            cache.add(frame(n, 1));
        }
        let (v1, ranges) = cache.ranges();
        assert_eq!(
            ranges,
            vec![
                CacheRange { start: 1, end: 3 },
                CacheRange { start: 7, end: 8 },
                CacheRange { start: 20, end: 20 },
            ]
        );
        // Unchanged cache: same version.
        let (v2, _) = cache.ranges();
        assert_eq!(v1, v2);
        cache.remove_range(2, 2);
        let (v3, ranges) = cache.ranges();
        assert!(v3 > v2);
        assert_eq!(ranges[0], CacheRange { start: 1, end: 1 });
    }

    #[test]
    fn remove_range_is_inclusive() {
        let cache = CacheMemory::new();
        for n in 1..=10 {
            cache.add(frame(n, 1));
        }
        cache.remove_range(3, 7);
        assert_eq!(cache.count(), 5);
        assert!(cache.get_frame(3).is_none());
        assert!(cache.get_frame(7).is_none());
        assert!(cache.get_frame(8).is_some());
    }

    #[test]
    fn smallest_frame_is_by_number_not_recency() {
        let cache = CacheMemory::new();
        cache.add(frame(9, 1));
        cache.add(frame(4, 1));
        cache.add(frame(6, 1));
        assert_eq!(cache.smallest_frame().unwrap().number, 4);
    }
}
