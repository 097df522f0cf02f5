// SPDX-License-Identifier: GPL-2.0

//! Scheduler binding: a thin abstraction over the preemptive task scheduler
//! this crate assumes but never implements (`spec` §4.8).
//!
//! The kernel calls through `&'static dyn SchedulerOps`, installed once at
//! boot via [`install`]. Production targets provide a real implementation
//! driving an RTOS tick; under `cfg(test)` (or the `test-support` feature,
//! which the `drivers` crate's own tests enable as a dev-dependency to
//! reach the same harness across the crate boundary) the [`host`] module
//! supplies one backed by OS threads so every sync primitive and
//! process-manager test runs real concurrent tasks without hardware.

#[cfg(any(test, feature = "test-support"))]
pub mod host;

use spin::Once;

/// Opaque handle to a scheduled task. Backends stuff whatever they need
/// behind the pointer; the kernel never dereferences it itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskHandle(pub *const ());

unsafe impl Send for TaskHandle {}
unsafe impl Sync for TaskHandle {}

/// Sentinel timeout meaning "block forever".
pub const MAX_DELAY: u32 = u32::MAX;

/// Signed priority, centred on 0; backends map this onto their own range.
pub type Priority = i32;

pub type TaskEntry = fn(arg: *mut ());

/// The scheduler primitives this crate calls through (`spec` §4.8).
///
/// Implementors must make every method safe to call from both task context
/// and, where marked, from ISR context.
pub trait SchedulerOps: Send + Sync {
	fn task_create(
		&self,
		entry: TaskEntry,
		name: &str,
		stack_depth: usize,
		arg: *mut (),
		priority: Priority,
	) -> Option<TaskHandle>;

	fn task_delete(&self, task: TaskHandle);

	fn task_yield(&self);

	fn task_delay(&self, ms: u32);

	fn task_suspend(&self, task: TaskHandle);

	fn task_resume(&self, task: TaskHandle);

	fn current_task(&self) -> TaskHandle;

	fn tick_count(&self) -> u64;

	/// Disable scheduling (and, on real targets, interrupts) until the
	/// matching `critical_section_exit`. Must not be held across a
	/// blocking call — see `kernel::sync::CriticalSection`.
	fn critical_section_enter(&self);

	fn critical_section_exit(&self);

	/// Per-task opaque tag, used to hang a `*const Process` off the
	/// scheduler's own task record (`spec` I1).
	fn set_task_tag(&self, task: TaskHandle, ptr: *mut ());

	fn get_task_tag(&self, task: TaskHandle) -> *mut ();
}

static SCHEDULER: Once<&'static dyn SchedulerOps> = Once::new();

/// Install the global scheduler binding. Must be called exactly once, at
/// boot, before any call into `kernel::sync`, `kernel::process`, or
/// `kernel::driver` — mirrors the single-init static cells `spec` §9 calls
/// for the process list, mount table, and driver registry.
///
/// A second call is a no-op: the first-installed binding wins.
pub fn install(ops: &'static dyn SchedulerOps) {
	SCHEDULER.call_once(|| ops);
}

/// Fetch the installed scheduler binding.
///
/// # Panics
/// Panics if [`install`] has not been called yet — an uninstalled
/// scheduler is a boot-sequencing bug, not a recoverable error.
pub fn current() -> &'static dyn SchedulerOps {
	*SCHEDULER
		.get()
		.expect("scheduler binding not installed — call kernel::sched::install at boot")
}
