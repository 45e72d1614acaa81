//! Millisecond clock and the one-shot timer queue every wait goes through.

use std::cell::Cell;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;
use std::time::Instant;

/// Monotonic milliseconds since an arbitrary origin.
pub trait Clock {
    fn now_ms(&self) -> u64;
}

/// Wall clock measured from construction.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

/// A clock that only moves when told to. Clones share the same time.
///
/// # Examples
/// ```
/// use karaoke::clock::{Clock, ManualClock};
///
/// let clock = ManualClock::new();
/// let handle = clock.clone();
/// handle.advance(250);
/// assert_eq!(clock.now_ms(), 250);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<u64>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, now_ms: u64) {
        self.now.set(now_ms);
    }

    pub fn advance(&self, ms: u64) {
        self.now.set(self.now.get() + ms);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.get()
    }
}

/// Identifies a registered timer for cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(u64);

/// One-shot timers ordered by due time, then by registration.
///
/// Nothing here sleeps: the owner asks for [`TimerQueue::next_due`], waits
/// however it likes, and drains with [`TimerQueue::pop_due`].
#[derive(Debug)]
pub struct TimerQueue<T> {
    entries: BTreeMap<(u64, u64), T>,
    due_by_id: HashMap<u64, u64>,
    next_id: u64,
}

impl<T> Default for TimerQueue<T> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
            due_by_id: HashMap::new(),
            next_id: 0,
        }
    }
}

impl<T> TimerQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire `payload` `delay_ms` after `now_ms`.
    pub fn after(&mut self, now_ms: u64, delay_ms: u64, payload: T) -> TimerHandle {
        self.at(now_ms.saturating_add(delay_ms), payload)
    }

    /// Fire `payload` at `due_ms`.
    pub fn at(&mut self, due_ms: u64, payload: T) -> TimerHandle {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.insert((due_ms, id), payload);
        self.due_by_id.insert(id, due_ms);
        TimerHandle(id)
    }

    /// Remove a timer that has not fired. Returns its payload if it was still
    /// queued.
    pub fn cancel(&mut self, handle: TimerHandle) -> Option<T> {
        let due = self.due_by_id.remove(&handle.0)?;
        self.entries.remove(&(due, handle.0))
    }

    /// Take the earliest timer due at or before `now_ms`.
    pub fn pop_due(&mut self, now_ms: u64) -> Option<(u64, T)> {
        let (&(due, id), _) = self.entries.iter().next()?;
        if due > now_ms {
            return None;
        }
        self.due_by_id.remove(&id);
        self.entries.remove(&(due, id)).map(|payload| (due, payload))
    }

    pub fn next_due(&self) -> Option<u64> {
        self.entries.keys().next().map(|&(due, _)| due)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.due_by_id.clear();
    }
}
