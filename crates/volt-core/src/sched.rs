//! Cooperative tick scheduler.
//!
//! A hardware timer interrupt posts one tick per period into [`Ticker`];
//! the main loop polls [`Scheduler::next_ready`] and dispatches on the
//! returned task id. The scheduler itself performs no I/O and never calls
//! task code, so it carries no trait objects and no function pointers:
//! what runs for each id is the main loop's business.
//!
//! Tasks run non-preemptively in registration order. Periodic tasks are
//! rescheduled at a fixed rate (`next_due + period`, not `now + period`),
//! so a late dispatch does not drift the cycle; a task registered with
//! period 0 runs once and frees its slot.

use core::cell::Cell;

use critical_section::Mutex;

/// Task table size.
pub const MAX_TASKS: usize = 8;

pub type TaskId = usize;

/// Monotonic tick counter shared with interrupt context.
///
/// `post()` is the only thing the tick interrupt does; everything else
/// runs from the main loop. The counter wraps; all comparisons against it
/// use wrapping arithmetic.
pub struct Ticker {
    ticks: Mutex<Cell<u32>>,
}

impl Ticker {
    pub const fn new() -> Self {
        Self {
            ticks: Mutex::new(Cell::new(0)),
        }
    }

    /// Advance the counter by one tick. Called from the timer interrupt.
    pub fn post(&self) {
        critical_section::with(|cs| {
            let ticks = self.ticks.borrow(cs);
            ticks.set(ticks.get().wrapping_add(1));
        });
    }

    /// Current tick count.
    pub fn now(&self) -> u32 {
        critical_section::with(|cs| self.ticks.borrow(cs).get())
    }
}

impl Default for Ticker {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    next_due: u32,
    period: u32,
    live: bool,
}

/// Fixed-capacity task table.
pub struct Scheduler {
    slots: heapless::Vec<Slot, MAX_TASKS>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            slots: heapless::Vec::new(),
        }
    }

    /// Register a task first due `initial_delay` ticks from now and
    /// repeating every `period` ticks; `period == 0` means one-shot.
    ///
    /// Returns the task id, or `None` when the table is full.
    pub fn add(&mut self, now: u32, initial_delay: u32, period: u32) -> Option<TaskId> {
        let slot = Slot {
            next_due: now.wrapping_add(initial_delay),
            period,
            live: true,
        };
        self.slots.push(slot).ok()?;
        Some(self.slots.len() - 1)
    }

    /// The first task due at `now`, in registration order, or `None` when
    /// nothing is due. Reschedules the returned task before returning, so
    /// calling in a loop drains every due task exactly once per cycle.
    pub fn next_ready(&mut self, now: u32) -> Option<TaskId> {
        for (id, slot) in self.slots.iter_mut().enumerate() {
            if !slot.live || !due(now, slot.next_due) {
                continue;
            }
            if slot.period == 0 {
                slot.live = false;
            } else {
                slot.next_due = slot.next_due.wrapping_add(slot.period);
            }
            return Some(id);
        }
        None
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

/// Wrapping due test: `now` has reached `next_due` when the wrapped
/// difference is in the lower half of the counter range.
fn due(now: u32, next_due: u32) -> bool {
    now.wrapping_sub(next_due) < u32::MAX / 2
}
