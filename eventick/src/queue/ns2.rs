use std::cell::Cell;
use std::fmt;

use slab::Slab;

use crate::event::{EventKey, ScheduledEvent};

/// Number of initial buckets.
const INIT_BUCKETS: usize = 2;

/// Every that many resize attempts the bucket width is unconditionally
/// re-estimated.
const ADJUST_WIDTH_INTERVAL: u32 = 10;

/// A calendar queue port of the ns-2 scheduler's bucket queue.
///
/// The dequeue strategy is the same rotating-window scan as
/// [`CalendarQueue`](super::CalendarQueue), but the internal bookkeeping
/// differs:
///
/// - each bucket is a circular doubly-linked list of arena-allocated nodes
///   (index links in a [`Slab`], no raw pointers), so a located record can
///   be spliced out in *O*(1);
/// - the queue counts head probes during dequeues (`head_search`) and
///   position probes during insertions (`insert_search`) and uses their
///   ratio to decide when a resize should also re-estimate the bucket
///   width;
/// - the width estimate prefers four times the average gap observed between
///   consecutively dequeued events and falls back to sampling the fullest
///   bucket's timestamp span when no dequeue history is available yet.
///
/// Within a bucket, records are kept in ascending `(time, uid)` order, so
/// the FIFO tie-break between same-instant events is preserved exactly as in
/// the other disciplines.
pub struct Ns2CalendarQueue<V> {
    arena: Slab<Node<V>>,
    /// Head node of each bucket's circular list.
    buckets: Vec<Option<usize>>,
    /// Bucket width in ticks, at least 1.
    width: u64,
    len: usize,
    /// Bucket holding the last dequeued event.
    last_bucket: usize,
    /// Exclusive upper edge of `last_bucket`'s current window.
    bucket_top: u64,
    /// Timestamp of the last dequeued event; no live record is earlier.
    last_time: u64,
    /// Head probes performed by dequeue scans since the last width
    /// adjustment. Interior mutability because peeks share the scan.
    head_search: Cell<u64>,
    /// Position probes performed by insertions since the last width
    /// adjustment.
    insert_search: u64,
    resize_attempts: u32,
    /// Sum and count of the timestamp deltas between consecutive dequeues.
    gap_sum: u64,
    gap_count: u64,
    prev_dequeue_time: Option<u64>,
}

struct Node<V> {
    event: ScheduledEvent<V>,
    next: usize,
    prev: usize,
}

impl<V> Ns2CalendarQueue<V> {
    /// Creates an empty `Ns2CalendarQueue`.
    pub fn new() -> Self {
        Self {
            arena: Slab::new(),
            buckets: vec![None; INIT_BUCKETS],
            width: 1,
            len: 0,
            last_bucket: 0,
            bucket_top: 1,
            last_time: 0,
            head_search: Cell::new(0),
            insert_search: 0,
            resize_attempts: 0,
            gap_sum: 0,
            gap_count: 0,
            prev_dequeue_time: None,
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
        self.do_insert(event, true);
        self.len += 1;

        if self.len > 2 * self.buckets.len() {
            self.resize(2 * self.buckets.len());
        }
    }

    /// Returns the key of the next event, if any.
    pub fn peek_next(&self) -> Option<EventKey> {
        let (bucket, _) = self.find_next()?;
        let head = self.buckets[bucket].expect("located bucket is empty");

        Some(self.arena[head].event.key())
    }

    /// Removes and returns the next event, if any.
    pub fn pop_next(&mut self) -> Option<ScheduledEvent<V>> {
        let (bucket, top) = self.find_next()?;
        let head = self.buckets[bucket].expect("located bucket is empty");
        let event = self.unlink(bucket, head);

        let time = event.key().time.ticks();
        if let Some(prev) = self.prev_dequeue_time {
            self.gap_sum += time - prev;
            self.gap_count += 1;
        }
        self.prev_dequeue_time = Some(time);

        self.last_bucket = bucket;
        self.bucket_top = top;
        self.last_time = time;
        self.len -= 1;

        if self.len < self.buckets.len() / 2 && self.buckets.len() > 2 {
            self.resize(self.buckets.len() / 2);
        }

        Some(event)
    }

    /// Removes and returns the event with the provided key, if present.
    ///
    /// Locating the record walks its bucket; the splice itself is *O*(1).
    pub fn remove(&mut self, key: EventKey) -> Option<ScheduledEvent<V>> {
        let bucket = self.hash(key.time.ticks());
        let head = self.buckets[bucket]?;

        let mut cur = head;
        loop {
            if self.arena[cur].event.key() == key {
                let event = self.unlink(bucket, cur);
                self.len -= 1;

                if self.len < self.buckets.len() / 2 && self.buckets.len() > 2 {
                    self.resize(self.buckets.len() / 2);
                }

                return Some(event);
            }
            cur = self.arena[cur].next;
            if cur == head {
                return None;
            }
        }
    }

    fn hash(&self, time: u64) -> usize {
        ((time / self.width) % self.buckets.len() as u64) as usize
    }

    /// Inserts in the bucket selected by the hash, keeping the circular
    /// list in ascending key order.
    fn do_insert(&mut self, event: ScheduledEvent<V>, count_probes: bool) {
        let key = event.key();
        let bucket = self.hash(key.time.ticks());
        let idx = self.arena.insert(Node {
            event,
            next: usize::MAX,
            prev: usize::MAX,
        });

        match self.buckets[bucket] {
            None => {
                self.arena[idx].next = idx;
                self.arena[idx].prev = idx;
                self.buckets[bucket] = Some(idx);
            }
            Some(head) => {
                // Find the first node with a greater key; inserting before
                // the head means the new record is the bucket minimum,
                // reaching the head again means it is the maximum.
                let mut cur = head;
                let mut before = None;
                loop {
                    if count_probes {
                        self.insert_search += 1;
                    }
                    if self.arena[cur].event.key() > key {
                        before = Some(cur);
                        break;
                    }
                    cur = self.arena[cur].next;
                    if cur == head {
                        break;
                    }
                }

                let at = before.unwrap_or(head);
                let prev = self.arena[at].prev;
                self.arena[idx].next = at;
                self.arena[idx].prev = prev;
                self.arena[prev].next = idx;
                self.arena[at].prev = idx;

                if before == Some(head) {
                    self.buckets[bucket] = Some(idx);
                }
            }
        }
    }

    /// Splices a node out of its bucket and returns its record.
    fn unlink(&mut self, bucket: usize, idx: usize) -> ScheduledEvent<V> {
        let (next, prev) = {
            let node = &self.arena[idx];
            (node.next, node.prev)
        };

        if next == idx {
            self.buckets[bucket] = None;
        } else {
            self.arena[prev].next = next;
            self.arena[next].prev = prev;
            if self.buckets[bucket] == Some(idx) {
                self.buckets[bucket] = Some(next);
            }
        }

        self.arena.remove(idx).event
    }

    /// Locates the bucket holding the next event and the window edge to
    /// restore the cursor with; same rotating-window scan as the adaptive
    /// calendar queue, with head probes counted.
    fn find_next(&self) -> Option<(usize, u64)> {
        if self.len == 0 {
            return None;
        }

        let n = self.buckets.len();
        let mut bucket = self.last_bucket;
        let mut top = self.bucket_top;
        let mut min: Option<(usize, EventKey)> = None;

        for _ in 0..n {
            if let Some(head) = self.buckets[bucket] {
                self.head_search.set(self.head_search.get() + 1);
                let key = self.arena[head].event.key();
                if key.time.ticks() < top {
                    return Some((bucket, top));
                }
                if min.map_or(true, |(_, min_key)| key < min_key) {
                    min = Some((bucket, key));
                }
            }
            bucket = (bucket + 1) % n;
            top = top.saturating_add(self.width);
        }

        let (bucket, key) = min.expect("non-empty queue with all buckets empty");
        let time = key.time.ticks();

        Some((
            bucket,
            (time / self.width)
                .saturating_add(1)
                .saturating_mul(self.width),
        ))
    }

    /// Rebuilds the bucket array at the new count. The width is only
    /// re-estimated on every [`ADJUST_WIDTH_INTERVAL`]-th attempt, or
    /// earlier when insertion probing dominates head probing (overfull
    /// buckets).
    fn resize(&mut self, n_buckets: usize) {
        let n_buckets = n_buckets.max(2);
        if n_buckets == self.buckets.len() {
            return;
        }

        self.resize_attempts += 1;
        if self.resize_attempts % ADJUST_WIDTH_INTERVAL == 0
            || self.insert_search > self.head_search.get()
        {
            self.width = self.new_width(n_buckets);
            self.head_search.set(0);
            self.insert_search = 0;
        }

        #[cfg(feature = "tracing")]
        tracing::trace!(
            n_buckets,
            width = self.width,
            len = self.len,
            "resizing ns-2 calendar queue"
        );

        let events: Vec<_> = self.arena.drain().map(|node| node.event).collect();

        self.buckets = vec![None; n_buckets];
        self.last_bucket = self.hash(self.last_time);
        self.bucket_top = (self.last_time / self.width)
            .saturating_add(1)
            .saturating_mul(self.width);

        for event in events {
            self.do_insert(event, false);
        }
    }

    /// Estimates the bucket width: four times the average observed dequeue
    /// gap when available, otherwise the fullest bucket's timestamp span
    /// divided by `min(n_buckets, events in that bucket)`. Floor of one
    /// tick.
    fn new_width(&self, n_buckets: usize) -> u64 {
        if self.gap_count >= 2 {
            return (self.gap_sum / self.gap_count).saturating_mul(4).max(1);
        }

        let mut fullest: Option<(usize, usize)> = None;
        for (bucket, head) in self.buckets.iter().enumerate() {
            let Some(head) = *head else { continue };
            let mut count = 0;
            let mut cur = head;
            loop {
                count += 1;
                cur = self.arena[cur].next;
                if cur == head {
                    break;
                }
            }
            if fullest.map_or(true, |(_, max)| count > max) {
                fullest = Some((bucket, count));
            }
        }

        let Some((bucket, count)) = fullest else {
            return 1;
        };
        let head = self.buckets[bucket].expect("fullest bucket is empty");
        let first = self.arena[head].event.key().time.ticks();
        let last = self.arena[self.arena[head].prev].event.key().time.ticks();

        ((last - first) / (count.min(n_buckets) as u64).max(1)).max(1)
    }
}

impl<V> Default for Ns2CalendarQueue<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> fmt::Debug for Ns2CalendarQueue<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ns2CalendarQueue")
            .field("len", &self.len)
            .field("n_buckets", &self.buckets.len())
            .field("width", &self.width)
            .finish_non_exhaustive()
    }
}
