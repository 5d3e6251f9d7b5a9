/// Handle to a scheduled timer, used to cancel it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

#[derive(Debug, Clone)]
struct Timer<K> {
    id: TimerId,
    due_ms: u64,
    every_ms: Option<u64>,
    kind: K,
}

/// Single-threaded timer queue on a virtual millisecond clock.
///
/// Nothing fires on its own: the owner advances the clock and handles each
/// due timer in turn, so two callbacks never interleave.
#[derive(Debug, Clone)]
pub struct Scheduler<K> {
    now_ms: u64,
    next_id: u64,
    timers: Vec<Timer<K>>,
}

impl<K> Default for Scheduler<K> {
    fn default() -> Self {
        Self {
            now_ms: 0,
            next_id: 0,
            timers: Vec::new(),
        }
    }
}

impl<K: Clone> Scheduler<K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    pub fn schedule_once(&mut self, delay_ms: u64, kind: K) -> TimerId {
        self.push(delay_ms, None, kind)
    }

    pub fn schedule_every(&mut self, interval_ms: u64, kind: K) -> TimerId {
        let interval_ms = interval_ms.max(1);
        self.push(interval_ms, Some(interval_ms), kind)
    }

    /// Returns true if the timer was still pending.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        let before = self.timers.len();
        self.timers.retain(|t| t.id != id);
        self.timers.len() != before
    }

    #[cfg(test)]
    fn is_pending(&self, id: TimerId) -> bool {
        self.timers.iter().any(|t| t.id == id)
    }

    pub fn pending(&self) -> usize {
        self.timers.len()
    }

    /// Pop the earliest timer due at or before `until_ms`, moving the clock to its due time.
    ///
    /// Repeating timers are re-armed before being returned.
    pub fn pop_due(&mut self, until_ms: u64) -> Option<(TimerId, K)> {
        let idx = self
            .timers
            .iter()
            .enumerate()
            .filter(|(_, t)| t.due_ms <= until_ms)
            .min_by_key(|(_, t)| (t.due_ms, t.id))
            .map(|(i, _)| i)?;

        let timer = &mut self.timers[idx];
        self.now_ms = self.now_ms.max(timer.due_ms);
        let fired = (timer.id, timer.kind.clone());
        let every_ms = timer.every_ms;
        match every_ms {
            Some(every) => timer.due_ms += every,
            None => {
                self.timers.swap_remove(idx);
            }
        }
        Some(fired)
    }

    /// Move the clock forward once every due timer has been handled.
    pub fn advance_to(&mut self, until_ms: u64) {
        self.now_ms = self.now_ms.max(until_ms);
    }

    fn push(&mut self, delay_ms: u64, every_ms: Option<u64>, kind: K) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.timers.push(Timer {
            id,
            due_ms: self.now_ms + delay_ms,
            every_ms,
            kind,
        });
        id
    }
}
