use std::fmt;

use crate::event::{EventKey, ScheduledEvent};

/// Number of initial buckets.
const INIT_BUCKETS: usize = 2;

/// Upper bound on the number of events sampled when estimating a new bucket
/// width.
const MAX_SAMPLES: usize = 25;

/// A self-tuning calendar queue.
///
/// Events are hashed into `n` buckets by `(time / width) % n`, with each
/// bucket kept sorted. As long as the bucket width tracks the typical
/// inter-event gap, each bucket holds *O*(1) events and insertion and pop
/// are amortized constant time.
///
/// Dequeuing scans buckets starting from the one holding the last dequeued
/// event, looking for a head event that falls within the bucket's slice of
/// the current "day" (a window of `n * width` ticks); the first hit is the
/// globally minimal record. If a full wrap finds no head within the day, the
/// queue falls back to the global minimum tracked along the way, which
/// bounds a pop by *O*(*n*).
///
/// The bucket count doubles when the queue grows past twice the bucket
/// count and halves (with a floor of two) when it shrinks below half of it;
/// every resize re-estimates the bucket width from a sample of up to 25
/// events.
pub struct CalendarQueue<V> {
    buckets: Vec<Vec<ScheduledEvent<V>>>,
    /// Bucket width in ticks, at least 1.
    width: u64,
    len: usize,
    /// Bucket holding the last dequeued event.
    last_bucket: usize,
    /// Exclusive upper edge of `last_bucket`'s current window.
    bucket_top: u64,
    /// Timestamp of the last dequeued event; no live record is earlier.
    last_time: u64,
}

impl<V> CalendarQueue<V> {
    /// Creates an empty `CalendarQueue`.
    pub fn new() -> Self {
        Self::with_buckets(INIT_BUCKETS)
    }

    /// Creates an empty `CalendarQueue` with the specified initial bucket
    /// count (at least 2).
    pub fn with_buckets(n_buckets: usize) -> Self {
        let n_buckets = n_buckets.max(2);

        Self {
            buckets: (0..n_buckets).map(|_| Vec::new()).collect(),
            width: 1,
            len: 0,
            last_bucket: 0,
            bucket_top: 1,
            last_time: 0,
        }
    }

    /// Returns the number of enqueued events.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Checks whether the queue holds no event.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the current bucket count.
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Returns the current bucket width in ticks.
    pub fn width(&self) -> u64 {
        self.width
    }

    /// Inserts an event record.
    pub fn insert(&mut self, event: ScheduledEvent<V>) {
        self.do_insert(event);
        self.len += 1;

        if self.len > 2 * self.buckets.len() {
            self.resize(2 * self.buckets.len());
        }
    }

    /// Returns the key of the next event, if any.
    pub fn peek_next(&self) -> Option<EventKey> {
        let (bucket, _) = self.find_next()?;

        self.buckets[bucket].first().map(|e| e.key())
    }

    /// Removes and returns the next event, if any.
    pub fn pop_next(&mut self) -> Option<ScheduledEvent<V>> {
        let (bucket, top) = self.find_next()?;
        let event = self.buckets[bucket].remove(0);

        self.last_bucket = bucket;
        self.bucket_top = top;
        self.last_time = event.key().time.ticks();
        self.len -= 1;

        if self.len < self.buckets.len() / 2 && self.buckets.len() > 2 {
            self.resize(self.buckets.len() / 2);
        }

        Some(event)
    }

    /// Removes and returns the event with the provided key, if present.
    pub fn remove(&mut self, key: EventKey) -> Option<ScheduledEvent<V>> {
        let bucket = self.hash(key.time.ticks());
        let idx = self.buckets[bucket].iter().position(|e| e.key() == key)?;
        let event = self.buckets[bucket].remove(idx);

        self.len -= 1;
        if self.len < self.buckets.len() / 2 && self.buckets.len() > 2 {
            self.resize(self.buckets.len() / 2);
        }

        Some(event)
    }

    fn hash(&self, time: u64) -> usize {
        ((time / self.width) % self.buckets.len() as u64) as usize
    }

    /// Inserts in the bucket selected by the hash, keeping the bucket
    /// sorted. Scans from the back since insertions are most often the
    /// latest event of their bucket.
    fn do_insert(&mut self, event: ScheduledEvent<V>) {
        let key = event.key();
        let bucket_idx = self.hash(key.time.ticks());
        let bucket = &mut self.buckets[bucket_idx];
        let idx = bucket
            .iter()
            .rposition(|e| e.key() < key)
            .map_or(0, |idx| idx + 1);

        bucket.insert(idx, event);
    }

    /// Locates the bucket holding the next event and the window edge to
    /// restore the cursor with, using the calendar dequeue scan.
    fn find_next(&self) -> Option<(usize, u64)> {
        if self.len == 0 {
            return None;
        }

        let n = self.buckets.len();
        let mut bucket = self.last_bucket;
        let mut top = self.bucket_top;
        let mut min: Option<(usize, EventKey)> = None;

        for _ in 0..n {
            if let Some(head) = self.buckets[bucket].first() {
                let key = head.key();
                if key.time.ticks() < top {
                    // First head within the current day window: this is the
                    // global minimum.
                    return Some((bucket, top));
                }
                if min.map_or(true, |(_, min_key)| key < min_key) {
                    min = Some((bucket, key));
                }
            }
            bucket = (bucket + 1) % n;
            top = top.saturating_add(self.width);
        }

        // No event due within the current day: jump the cursor directly to
        // the earliest head found during the wrap.
        let (bucket, key) = min.expect("non-empty queue with all buckets empty");
        let time = key.time.ticks();

        Some((
            bucket,
            (time / self.width)
                .saturating_add(1)
                .saturating_mul(self.width),
        ))
    }

    /// Rebuilds the bucket array at the new count, re-estimating the bucket
    /// width. Pure internal reorganization: the dequeue order is unchanged.
    fn resize(&mut self, n_buckets: usize) {
        let n_buckets = n_buckets.max(2);
        if n_buckets == self.buckets.len() {
            return;
        }

        self.width = self.calculate_new_width();

        #[cfg(feature = "tracing")]
        tracing::trace!(
            n_buckets,
            width = self.width,
            len = self.len,
            "resizing calendar queue"
        );

        let events: Vec<_> = self
            .buckets
            .iter_mut()
            .flat_map(|bucket| bucket.drain(..))
            .collect();

        self.buckets = (0..n_buckets).map(|_| Vec::new()).collect();
        self.last_bucket = self.hash(self.last_time);
        self.bucket_top = (self.last_time / self.width)
            .saturating_add(1)
            .saturating_mul(self.width);

        for event in events {
            self.do_insert(event);
        }
    }

    /// Estimates the bucket width from the average gap between consecutive
    /// event timestamps, sampled over up to [`MAX_SAMPLES`] of the earliest
    /// events. Gaps larger than twice the raw average are discarded as
    /// outliers and the width is set to three times the filtered average,
    /// with a floor of one tick.
    fn calculate_new_width(&self) -> u64 {
        if self.len < 2 {
            return 1;
        }

        let mut times: Vec<u64> = self
            .buckets
            .iter()
            .flat_map(|bucket| bucket.iter().map(|e| e.key().time.ticks()))
            .collect();
        times.sort_unstable();
        times.truncate(MAX_SAMPLES);

        let gaps: Vec<u64> = times.windows(2).map(|w| w[1] - w[0]).collect();
        let avg = gaps.iter().sum::<u64>() / gaps.len() as u64;

        let cutoff = avg.saturating_mul(2);
        let (sum, count) = gaps
            .iter()
            .filter(|&&gap| gap <= cutoff)
            .fold((0u64, 0u64), |(sum, count), &gap| (sum + gap, count + 1));
        if count == 0 {
            return 1;
        }

        (sum / count).saturating_mul(3).max(1)
    }
}

impl<V> Default for CalendarQueue<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> fmt::Debug for CalendarQueue<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CalendarQueue")
            .field("len", &self.len)
            .field("n_buckets", &self.buckets.len())
            .field("width", &self.width)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::SimTime;

    fn event(time: u64, uid: u64) -> ScheduledEvent<u64> {
        let key = EventKey {
            time: SimTime::from_ticks(time),
            uid,
        };

        ScheduledEvent::new(key, uid).0
    }

    #[test]
    fn grows_and_shrinks() {
        let mut queue = CalendarQueue::with_buckets(2);

        for uid in 0..32 {
            queue.insert(event(uid * 10, uid));
        }
        assert!(queue.bucket_count() > 2);

        while queue.pop_next().is_some() {}
        assert_eq!(queue.bucket_count(), 2);
        assert!(queue.is_empty());
    }

    #[test]
    fn resize_preserves_order() {
        let mut queue = CalendarQueue::with_buckets(2);

        // Insertion order deliberately scrambled; sizes chosen to cross both
        // resize thresholds while draining.
        for uid in 0..64 {
            let time = (uid * 7919) % 1000;
            queue.insert(event(time, uid));
        }

        let mut prev = None;
        while let Some(ev) = queue.pop_next() {
            let key = ev.key();
            if let Some(prev) = prev {
                assert!(key > prev);
            }
            prev = Some(key);
        }
    }

    #[test]
    fn far_future_event_is_found() {
        let mut queue = CalendarQueue::with_buckets(2);

        queue.insert(event(u64::MAX - 1, 0));
        queue.insert(event(3, 1));

        assert_eq!(queue.pop_next().unwrap().key().uid, 1);
        assert_eq!(queue.pop_next().unwrap().key().uid, 0);
        assert!(queue.pop_next().is_none());
    }

    #[test]
    fn width_collapses_on_tiny_queue() {
        let queue = CalendarQueue::<u64>::with_buckets(2);

        assert_eq!(queue.calculate_new_width(), 1);
    }
}
