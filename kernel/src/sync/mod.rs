// SPDX-License-Identifier: GPL-2.0

//! Synchronization primitives (`spec` §4.9), built by this crate directly on
//! top of [`crate::sched::SchedulerOps`] — not delegated further down. This
//! mirrors `original_source`'s `kwrapper.h`, where the same primitives are a
//! thin, purpose-built layer over the scheduler's own wait/signal calls.
//!
//! Every timed wait here follows the same shape: compute a deadline from
//! `tick_count()`, spin on the condition with `task_yield`/`task_delay`
//! between checks, and report the outcome as [`crate::error::WaitResult`]
//! rather than collapsing a timeout into a generic I/O error.

pub mod mutex;
pub mod queue;
pub mod semaphore;

pub use mutex::KMutex;
pub use queue::KQueue;
pub use semaphore::KSemaphore;

use crate::sched;

/// RAII guard over `SchedulerOps::critical_section_enter/exit`. Used only
/// for the short windows `spec` §5/§9 name — resource-list link/unlink, PID
/// bump, ownership-slot flip — never across a blocking call.
pub struct CriticalSection {
	_private: (),
}

impl CriticalSection {
	pub fn enter() -> Self {
		sched::current().critical_section_enter();
		CriticalSection { _private: () }
	}
}

impl Drop for CriticalSection {
	fn drop(&mut self) {
		sched::current().critical_section_exit();
	}
}

/// Poll `condition` until it returns `Some(value)`, `timeout_ms` elapses, or
/// (being a no-op today, reserved for ISR wakeups) the wait is otherwise
/// interrupted. `0` means try-once; [`sched::MAX_DELAY`] means block
/// forever. Shared by every primitive in this module.
pub(crate) fn poll_wait<T>(
	timeout_ms: u32,
	mut condition: impl FnMut() -> Option<T>,
) -> crate::error::WaitResult<T> {
	use crate::error::WaitResult;

	if let Some(v) = condition() {
		return WaitResult::Signalled(v);
	}
	if timeout_ms == 0 {
		return WaitResult::TimedOut;
	}

	let ops = sched::current();
	let deadline = if timeout_ms == sched::MAX_DELAY {
		None
	} else {
		Some(ops.tick_count() + timeout_ms as u64)
	};

	loop {
		ops.task_delay(1);
		if let Some(v) = condition() {
			return WaitResult::Signalled(v);
		}
		if let Some(deadline) = deadline {
			if ops.tick_count() >= deadline {
				return match condition() {
					Some(v) => WaitResult::Signalled(v),
					None => WaitResult::TimedOut,
				};
			}
		}
	}
}
