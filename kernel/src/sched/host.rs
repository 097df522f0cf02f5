// SPDX-License-Identifier: GPL-2.0

//! `std::thread`-backed [`SchedulerOps`] for the host test harness.
//!
//! Gated by `cfg(test)` or the `test-support` feature (see `kernel::sched`).
//! It lets every sync-primitive and process-manager test in this crate, and
//! in crates depending on it, exercise real concurrent tasks — real
//! blocking, real timeouts — without any hardware or simulator.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Mutex, OnceLock};
use std::thread::{self, JoinHandle, Thread};
use std::time::Instant;

use super::{Priority, SchedulerOps, TaskEntry, TaskHandle};

struct TaskRecord {
	thread: Thread,
	join: Mutex<Option<JoinHandle<()>>>,
	tag: AtomicI64,
	suspended: std::sync::atomic::AtomicBool,
}

/// Host scheduler: every "task" is an OS thread, every tick a millisecond
/// of wall-clock time since the scheduler was created.
pub struct HostScheduler {
	start: Instant,
	next_id: AtomicUsize,
	tasks: Mutex<HashMap<usize, &'static TaskRecord>>,
	cs_depth: AtomicU32,
}

impl HostScheduler {
	pub fn new() -> Self {
		Self {
			start: Instant::now(),
			next_id: AtomicUsize::new(1),
			tasks: Mutex::new(HashMap::new()),
			cs_depth: AtomicU32::new(0),
		}
	}

	fn handle_for(&self, id: usize) -> TaskHandle {
		TaskHandle(id as *const ())
	}

	fn id_of(&self, handle: TaskHandle) -> usize {
		handle.0 as usize
	}

	fn record(&self, handle: TaskHandle) -> &'static TaskRecord {
		let id = self.id_of(handle);
		*self
			.tasks
			.lock()
			.unwrap()
			.get(&id)
			.expect("host scheduler: unknown task handle")
	}
}

impl Default for HostScheduler {
	fn default() -> Self {
		Self::new()
	}
}

impl SchedulerOps for HostScheduler {
	fn task_create(
		&self,
		entry: TaskEntry,
		name: &str,
		_stack_depth: usize,
		arg: *mut (),
		_priority: Priority,
	) -> Option<TaskHandle> {
		let id = self.next_id.fetch_add(1, Ordering::Relaxed);
		let arg_addr = arg as usize;
		let name = name.to_string();

		let (tx, rx) = std::sync::mpsc::channel::<Thread>();
		let join = thread::Builder::new()
			.name(name)
			.spawn(move || {
				tx.send(thread::current()).ok();
				let arg = arg_addr as *mut ();
				entry(arg);
			})
			.ok()?;

		let thread_handle = rx.recv().ok()?;
		let record: &'static TaskRecord = Box::leak(Box::new(TaskRecord {
			thread: thread_handle,
			join: Mutex::new(Some(join)),
			tag: AtomicI64::new(0),
			suspended: std::sync::atomic::AtomicBool::new(false),
		}));

		self.tasks.lock().unwrap().insert(id, record);
		Some(self.handle_for(id))
	}

	fn task_delete(&self, task: TaskHandle) {
		let id = self.id_of(task);
		if let Some(rec) = self.tasks.lock().unwrap().remove(&id) {
			if let Some(join) = rec.join.lock().unwrap().take() {
				// Best effort: the thread is expected to have already
				// returned from its entry trampoline by this point.
				let _ = join.join();
			}
		}
	}

	fn task_yield(&self) {
		thread::yield_now();
	}

	fn task_delay(&self, ms: u32) {
		if ms == super::MAX_DELAY {
			loop {
				thread::park();
			}
		}
		thread::sleep(std::time::Duration::from_millis(ms as u64));
	}

	fn task_suspend(&self, task: TaskHandle) {
		let rec = self.record(task);
		rec.suspended.store(true, Ordering::SeqCst);
	}

	fn task_resume(&self, task: TaskHandle) {
		let rec = self.record(task);
		rec.suspended.store(false, Ordering::SeqCst);
		rec.thread.unpark();
	}

	/// Every distinct OS thread gets a distinct, non-zero handle — including
	/// the main test thread and any `std::thread::spawn`ed thread never
	/// passed through `task_create`, lazily registered here on first call.
	/// `sync::mutex::UNOWNED` relies on `0` never being a live handle key,
	/// so there is no bootstrap sentinel returned here.
	fn current_task(&self) -> TaskHandle {
		let tid = thread::current().id();
		let mut tasks = self.tasks.lock().unwrap();
		for (id, rec) in tasks.iter() {
			if rec.thread.id() == tid {
				return self.handle_for(*id);
			}
		}
		let id = self.next_id.fetch_add(1, Ordering::Relaxed);
		let record: &'static TaskRecord = Box::leak(Box::new(TaskRecord {
			thread: thread::current(),
			join: Mutex::new(None),
			tag: AtomicI64::new(0),
			suspended: std::sync::atomic::AtomicBool::new(false),
		}));
		tasks.insert(id, record);
		self.handle_for(id)
	}

	fn tick_count(&self) -> u64 {
		self.start.elapsed().as_millis() as u64
	}

	fn critical_section_enter(&self) {
		self.cs_depth.fetch_add(1, Ordering::SeqCst);
	}

	fn critical_section_exit(&self) {
		self.cs_depth.fetch_sub(1, Ordering::SeqCst);
	}

	fn set_task_tag(&self, task: TaskHandle, ptr: *mut ()) {
		self.record(task).tag.store(ptr as i64, Ordering::SeqCst);
	}

	fn get_task_tag(&self, task: TaskHandle) -> *mut () {
		self.record(task).tag.load(Ordering::SeqCst) as *mut ()
	}
}

static INSTANCE: OnceLock<HostScheduler> = OnceLock::new();

/// Install a fresh [`HostScheduler`] as the global binding, once per test
/// binary. Safe to call from multiple tests; only the first call wins.
pub fn install() -> &'static HostScheduler {
	let sched = INSTANCE.get_or_init(HostScheduler::new);
	super::install(sched);
	sched
}
