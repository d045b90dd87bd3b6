//! Cancellable level-time timers
//!
//! Timers are keyed to a generation counter. `reset` bumps the generation
//! and drops everything pending, so nothing scheduled for a superseded
//! session can fire into the next one.

/// What a timer does when it fires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// Replace gravity with the level's shifted gravity
    GravityShift,
    /// Hide the voiceover text
    VoiceoverHide,
}

/// Handle returned by `schedule`, usable for targeted cancellation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerHandle {
    id: u64,
    generation: u64,
}

/// A timer that came due during `advance`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FiredTimer {
    pub kind: TimerKind,
    pub generation: u64,
    pub due_ms: f64,
}

#[derive(Debug, Clone)]
struct Pending {
    id: u64,
    generation: u64,
    kind: TimerKind,
    due_ms: f64,
}

/// Single-threaded timer queue driven by frame deltas
#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    generation: u64,
    /// Level time since the last reset (ms)
    now_ms: f64,
    next_id: u64,
    pending: Vec<Pending>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn now_ms(&self) -> f64 {
        self.now_ms
    }

    /// Whether a fired timer still belongs to the live generation
    pub fn is_current(&self, generation: u64) -> bool {
        generation == self.generation
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Kinds of all pending timers, in due order
    pub fn pending_kinds(&self) -> Vec<TimerKind> {
        let mut pending: Vec<&Pending> = self.pending.iter().collect();
        pending.sort_by(|a, b| a.due_ms.total_cmp(&b.due_ms).then(a.id.cmp(&b.id)));
        pending.into_iter().map(|p| p.kind).collect()
    }

    /// Schedule `kind` to fire `delay_ms` from now
    pub fn schedule(&mut self, kind: TimerKind, delay_ms: f64) -> TimerHandle {
        let id = self.next_id;
        self.next_id += 1;
        self.pending.push(Pending {
            id,
            generation: self.generation,
            kind,
            due_ms: self.now_ms + delay_ms.max(0.0),
        });
        TimerHandle {
            id,
            generation: self.generation,
        }
    }

    /// Cancel one timer. Returns false if it already fired or was cancelled.
    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        let before = self.pending.len();
        self.pending
            .retain(|p| !(p.id == handle.id && p.generation == handle.generation));
        self.pending.len() != before
    }

    /// Cancel everything and start a new generation with the clock at zero
    pub fn reset(&mut self) {
        if !self.pending.is_empty() {
            log::debug!(
                "Cancelling {} pending timer(s) from generation {}",
                self.pending.len(),
                self.generation
            );
        }
        self.pending.clear();
        self.generation += 1;
        self.now_ms = 0.0;
    }

    /// Advance the clock and return every timer that came due, oldest first
    pub fn advance(&mut self, delta_ms: f64) -> Vec<FiredTimer> {
        self.now_ms += delta_ms.max(0.0);
        let now = self.now_ms;

        let mut due: Vec<Pending> = Vec::new();
        self.pending.retain(|p| {
            if p.due_ms <= now {
                due.push(p.clone());
                false
            } else {
                true
            }
        });
        due.sort_by(|a, b| a.due_ms.total_cmp(&b.due_ms).then(a.id.cmp(&b.id)));

        due.into_iter()
            .map(|p| FiredTimer {
                kind: p.kind,
                generation: p.generation,
                due_ms: p.due_ms,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fires_once_when_due() {
        let mut timers = Scheduler::new();
        timers.schedule(TimerKind::GravityShift, 100.0);

        assert!(timers.advance(99.0).is_empty());
        let fired = timers.advance(1.0);
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].kind, TimerKind::GravityShift);
        assert!(timers.advance(1000.0).is_empty());
    }

    #[test]
    fn test_fired_in_due_order() {
        let mut timers = Scheduler::new();
        timers.schedule(TimerKind::VoiceoverHide, 4000.0);
        timers.schedule(TimerKind::GravityShift, 1000.0);

        let fired = timers.advance(5000.0);
        let kinds: Vec<_> = fired.iter().map(|f| f.kind).collect();
        assert_eq!(kinds, vec![TimerKind::GravityShift, TimerKind::VoiceoverHide]);
    }

    #[test]
    fn test_reset_drops_pending_and_bumps_generation() {
        let mut timers = Scheduler::new();
        timers.schedule(TimerKind::GravityShift, 100.0);
        let old = timers.generation();

        timers.reset();
        assert_eq!(timers.pending_count(), 0);
        assert!(!timers.is_current(old));
        assert_eq!(timers.now_ms(), 0.0);
        assert!(timers.advance(500.0).is_empty());
    }

    #[test]
    fn test_cancel_single() {
        let mut timers = Scheduler::new();
        let shift = timers.schedule(TimerKind::GravityShift, 100.0);
        timers.schedule(TimerKind::VoiceoverHide, 100.0);

        assert!(timers.cancel(shift));
        assert!(!timers.cancel(shift));
        let fired = timers.advance(100.0);
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].kind, TimerKind::VoiceoverHide);
    }

    #[test]
    fn test_stale_handle_does_not_cancel_new_generation() {
        let mut timers = Scheduler::new();
        let stale = timers.schedule(TimerKind::GravityShift, 100.0);
        timers.reset();
        timers.schedule(TimerKind::GravityShift, 100.0);

        assert!(!timers.cancel(stale));
        assert_eq!(timers.pending_count(), 1);
    }
}
