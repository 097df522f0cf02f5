// SPDX-License-Identifier: GPL-2.0

//! Process and thread manager (`spec` §4.2): command-line parsing, program
//! table lookup, globals allocation, stdio wiring, task creation, and the
//! teardown path that walks a process's resource list on exit.

use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicI32, AtomicU32, AtomicU64, Ordering};

use crate::error::{Error, Result};
use crate::resource::{ResourceBody, ResourceKind, ResourceList};
use crate::sched::{self, TaskHandle};
use crate::sync::CriticalSection;
use crate::types::Pid;
use crate::vfs::{self, OpenFlags, OpenFile};

/// A program linked into the static program table (`spec` §3).
pub struct ProgramEntry {
	pub name: &'static str,
	pub main: fn(argv: &[String]) -> i32,
	pub globals_size: usize,
	pub stack_depth: usize,
}

/// Reserved program-table name for the internal syscall-worker entry
/// (`spec` §4.2 step 2).
pub const KWORKER_NAME: &str = "kworker";

fn kworker_main(_argv: &[String]) -> i32 {
	0
}

static PROGRAM_TABLE: spin::Mutex<Vec<ProgramEntry>> = spin::Mutex::new(Vec::new());

/// Register a program, making it reachable by name from `process_create`.
/// Called at boot (`kernel::initd`) for every statically-linked user
/// program; tests call it directly.
pub fn register_program(entry: ProgramEntry) {
	PROGRAM_TABLE.lock().push(entry);
}

fn lookup_program(name: &str) -> Option<ProgramEntry>
where
{
	if name == KWORKER_NAME {
		return Some(ProgramEntry {
			name: KWORKER_NAME,
			main: kworker_main,
			globals_size: 0,
			stack_depth: 1024,
		});
	}
	PROGRAM_TABLE.lock().iter().find(|e| e.name == name).map(|e| ProgramEntry {
		name: e.name,
		main: e.main,
		globals_size: e.globals_size,
		stack_depth: e.stack_depth,
	})
}

/// Split `command_line` on whitespace, honouring single- and
/// double-quoted substrings (`spec` §4.2 step 1, §8 boundary behaviours).
/// An unterminated quote consumes to end-of-string as a single argument.
pub fn parse_argv(command_line: &str) -> Result<Vec<String>> {
	let mut args = Vec::new();
	let mut current = String::new();
	let mut have_current = false;
	let mut quote: Option<char> = None;

	for c in command_line.chars() {
		match quote {
			Some(q) => {
				if c == q {
					quote = None;
				} else {
					current.push(c);
				}
			}
			None => {
				if c == '\'' || c == '"' {
					quote = Some(c);
					have_current = true;
				} else if c.is_whitespace() {
					if have_current {
						args.push(core::mem::take(&mut current));
						have_current = false;
					}
				} else {
					current.push(c);
					have_current = true;
				}
			}
		}
	}
	if have_current || quote.is_some() {
		args.push(current);
	}

	if args.is_empty() || args[0].is_empty() {
		return Err(Error::Einval);
	}
	Ok(args)
}

/// Attributes accepted by `process_create` (`spec` §4.2 *Inputs*).
#[derive(Default)]
pub struct ProcessAttributes {
	pub cwd: Option<String>,
	pub p_stdin: Option<String>,
	pub p_stdout: Option<String>,
	pub p_stderr: Option<String>,
	pub f_stdin: Option<Arc<OpenFile>>,
	pub f_stdout: Option<Arc<OpenFile>>,
	pub f_stderr: Option<Arc<OpenFile>>,
	pub priority: i32,
	pub has_parent: bool,
	pub detached: bool,
}

pub struct Process {
	pub pid: Pid,
	pub program_name: String,
	priority: i32,
	stack_depth: usize,
	globals: Option<Arc<spin::Mutex<Vec<u8>>>>,
	task: spin::Mutex<Option<TaskHandle>>,
	pub stdin: spin::Mutex<Option<Arc<OpenFile>>>,
	pub stdout: spin::Mutex<Option<Arc<OpenFile>>>,
	pub stderr: spin::Mutex<Option<Arc<OpenFile>>>,
	pub cwd: spin::Mutex<String>,
	pub argv: Vec<String>,
	res_list: spin::Mutex<ResourceList>,
	status: AtomicI32,
	errnov: AtomicI32,
	timecnt: AtomicU64,
	last_restore_tick: AtomicU64,
}

impl Process {
	pub fn res_list_len(&self) -> usize {
		self.res_list.lock().len()
	}

	pub fn priority(&self) -> i32 {
		self.priority
	}

	pub fn stack_depth(&self) -> usize {
		self.stack_depth
	}

	/// Size of this process's globals blob, `0` for a program that declared
	/// none. Feeds `procfs`'s `usedmem` view (`SPEC_FULL` §4.5).
	pub fn globals_len(&self) -> usize {
		self.globals.as_ref().map(|g| g.lock().len()).unwrap_or(0)
	}

	pub fn status(&self) -> i32 {
		self.status.load(Ordering::Acquire)
	}

	pub fn errnov(&self) -> i32 {
		self.errnov.load(Ordering::Acquire)
	}

	pub fn set_errnov(&self, v: i32) {
		self.errnov.store(v, Ordering::Release);
	}

	pub fn timecnt(&self) -> u64 {
		self.timecnt.load(Ordering::Acquire)
	}

	/// Register a resource on this process's list under a critical
	/// section (`spec` §4.1).
	pub fn register_resource(&self, body: ResourceBody) -> crate::types::ResRef {
		let _cs = CriticalSection::enter();
		self.res_list.lock().register(body)
	}

	pub fn release_resource(
		&self,
		id: crate::types::ResRef,
		expected_kind: ResourceKind,
	) -> Result<()> {
		let _cs = CriticalSection::enter();
		self.res_list.lock().release(id, expected_kind)
	}

	/// *save* context-switch hook (`spec` §4.2 "Context swapping"):
	/// accumulate elapsed ticks since this process was last restored.
	pub fn on_context_save(&self) {
		let now = sched::current().tick_count();
		let last = self.last_restore_tick.swap(now, Ordering::AcqRel);
		self.timecnt.fetch_add(now.saturating_sub(last), Ordering::AcqRel);
	}

	/// *restore* context-switch hook: stamp the tick at which this
	/// process became active again.
	pub fn on_context_restore(&self) {
		self.last_restore_tick
			.store(sched::current().tick_count(), Ordering::Release);
	}
}

static NEXT_PID: AtomicU32 = AtomicU32::new(1);
static PROCESS_TABLE: spin::Mutex<BTreeMap<u32, Arc<Process>>> = spin::Mutex::new(BTreeMap::new());

fn allocate_pid() -> Pid {
	Pid(NEXT_PID.fetch_add(1, Ordering::Relaxed))
}

struct Trampoline {
	program_main: fn(argv: &[String]) -> i32,
	process: Arc<Process>,
}

fn trampoline_entry(arg: *mut ()) {
	let boxed = unsafe { Box::from_raw(arg as *mut Trampoline) };
	let status = (boxed.program_main)(&boxed.process.argv);
	process_exit_inner(&boxed.process, status);
}

/// `process_create(command_line, attributes, out_pid)` (`spec` §4.2).
///
/// Any failure after argv parsing unwinds: partially-registered resources
/// are freed with the process record, and the PID counter is *not* rolled
/// back (`spec` §4.2).
pub fn process_create(command_line: &str, attrs: ProcessAttributes) -> Result<Pid> {
	let argv = parse_argv(command_line)?;

	let entry = lookup_program(&argv[0]).ok_or(Error::Enoent)?;

	let globals = if entry.globals_size > 0 {
		Some(Arc::new(spin::Mutex::new(alloc::vec![0u8; entry.globals_size])))
	} else {
		None
	};

	let pid = allocate_pid();
	let process = Arc::new(Process {
		pid,
		program_name: entry.name.to_string(),
		priority: attrs.priority,
		stack_depth: entry.stack_depth,
		globals: globals.clone(),
		task: spin::Mutex::new(None),
		stdin: spin::Mutex::new(None),
		stdout: spin::Mutex::new(None),
		stderr: spin::Mutex::new(None),
		cwd: spin::Mutex::new(attrs.cwd.clone().unwrap_or_else(|| String::from("/"))),
		argv,
		res_list: spin::Mutex::new(ResourceList::new()),
		status: AtomicI32::new(0),
		errnov: AtomicI32::new(0),
		timecnt: AtomicU64::new(0),
		last_restore_tick: AtomicU64::new(sched::current().tick_count()),
	});

	if let Some(globals) = globals {
		process.register_resource(ResourceBody::Memory(globals));
	}

	apply_stdio(&process, &attrs)?;

	let boxed = Box::new(Trampoline {
		program_main: entry.main,
		process: process.clone(),
	});
	let arg = Box::into_raw(boxed) as *mut ();

	let task = sched::current()
		.task_create(trampoline_entry, entry.name, entry.stack_depth, arg, 0)
		.ok_or(Error::Enomem)?;
	sched::current().set_task_tag(task, Arc::as_ptr(&process) as *mut ());
	*process.task.lock() = Some(task);
	process.register_resource(ResourceBody::Thread(task));

	{
		let _cs = CriticalSection::enter();
		PROCESS_TABLE.lock().insert(pid.0, process);
	}

	Ok(pid)
}

fn apply_stdio(process: &Arc<Process>, attrs: &ProcessAttributes) -> Result<()> {
	let stdin = if let Some(f) = &attrs.f_stdin {
		Some(f.clone())
	} else if let Some(path) = &attrs.p_stdin {
		Some(open_and_register(process, path, OpenFlags::READ | OpenFlags::APPEND)?)
	} else {
		None
	};

	let stdout = if let Some(f) = &attrs.f_stdout {
		Some(f.clone())
	} else if let Some(path) = &attrs.p_stdout {
		if attrs.p_stdin.as_deref() == Some(path.as_str()) {
			stdin.clone()
		} else {
			Some(open_and_register(process, path, OpenFlags::WRITE | OpenFlags::APPEND)?)
		}
	} else {
		None
	};

	let stderr = if let Some(f) = &attrs.f_stderr {
		Some(f.clone())
	} else if let Some(path) = &attrs.p_stderr {
		if attrs.p_stdin.as_deref() == Some(path.as_str()) {
			stdin.clone()
		} else if attrs.p_stdout.as_deref() == Some(path.as_str()) {
			stdout.clone()
		} else {
			Some(open_and_register(process, path, OpenFlags::WRITE | OpenFlags::APPEND)?)
		}
	} else {
		None
	};

	*process.stdin.lock() = stdin;
	*process.stdout.lock() = stdout;
	*process.stderr.lock() = stderr;
	Ok(())
}

fn open_and_register(process: &Arc<Process>, path: &str, flags: OpenFlags) -> Result<Arc<OpenFile>> {
	let file = Arc::new(vfs::vfs().open(path, flags)?);
	process.register_resource(ResourceBody::File(file.clone()));
	Ok(file)
}

fn process_exit_inner(process: &Arc<Process>, status: i32) {
	process.status.store(status, Ordering::Release);
	let _cs = CriticalSection::enter();
	// The process's own task is a `Thread` resource of itself (registered in
	// `process_create`); suspending it here would be a self-suspend on a
	// real RTOS if `process_exit` runs on that very task's stack, so it is
	// skipped — `process_destroy` reaps the task itself once this process
	// record is removed from the table.
	let current = sched::current().current_task();
	process.res_list.lock().release_all(|task| {
		if task != current {
			sched::current().task_suspend(task);
		}
	});
}

/// `process_exit(task_handle, status)` (`spec` §4.2). Invoking from a
/// thread releases only the thread's own resources; the parent process is
/// unaffected — threads are tracked as a `Thread` resource of their parent
/// and never carry their own `res_list` in this encoding.
pub fn process_exit(pid: Pid, status: i32) -> Result<()> {
	let process = lookup(pid).ok_or(Error::Esrch)?;
	process_exit_inner(&process, status);
	Ok(())
}

/// `process_abort(task_handle)` (`spec` §4.2, §7): writes the literal
/// `"Aborted\n"` to stderr, then behaves as `process_exit(task, -1)`.
pub fn process_abort(pid: Pid) -> Result<()> {
	let process = lookup(pid).ok_or(Error::Esrch)?;
	if let Some(stderr) = process.stderr.lock().as_ref() {
		let _ = stderr.write(b"Aborted\n");
	}
	process_exit_inner(&process, -1);
	Ok(())
}

/// `process_destroy(pid, out_status)` (`spec` §4.2): external reaper,
/// removes the record from the process list. `spec` P1/P3: a destroyed PID
/// is never reused and a second destroy of the same `pid` returns `ESRCH`.
pub fn process_destroy(pid: Pid) -> Result<i32> {
	let _cs = CriticalSection::enter();
	let process = PROCESS_TABLE.lock().remove(&pid.0).ok_or(Error::Esrch)?;
	Ok(process.status())
}

pub fn lookup(pid: Pid) -> Option<Arc<Process>> {
	PROCESS_TABLE.lock().get(&pid.0).cloned()
}

pub fn exists(pid: Pid) -> bool {
	PROCESS_TABLE.lock().contains_key(&pid.0)
}

/// Live process snapshot, for `procfs`'s `/taskid` and `/taskname` views.
pub fn list() -> Vec<Arc<Process>> {
	PROCESS_TABLE.lock().values().cloned().collect()
}

pub fn find_by_name(name: &str) -> Option<Arc<Process>> {
	PROCESS_TABLE
		.lock()
		.values()
		.find(|p| p.program_name == name)
		.cloned()
}

/// Program-table snapshot `(name, globals_size, stack_depth)`, for
/// `procfs`'s `/bin` view. Includes the reserved `kworker` entry.
pub fn list_programs() -> Vec<(String, usize, usize)> {
	let mut out = alloc::vec![(String::from(KWORKER_NAME), 0, 1024)];
	out.extend(
		PROGRAM_TABLE
			.lock()
			.iter()
			.map(|e| (String::from(e.name), e.globals_size, e.stack_depth)),
	);
	out
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::sched::host;

	fn setup() {
		host::install();
		crate::fs::registry::register_defaults();
	}

	#[test]
	fn argv_boundary_behaviours() {
		assert_eq!(parse_argv(""), Err(Error::Einval));
		assert_eq!(parse_argv("a").unwrap(), alloc::vec!["a"]);
		assert_eq!(parse_argv("a b").unwrap(), alloc::vec!["a", "b"]);
		assert_eq!(parse_argv("\"a b\"").unwrap(), alloc::vec!["a b"]);
		assert_eq!(parse_argv("'a b' c").unwrap(), alloc::vec!["a b", "c"]);
		assert_eq!(parse_argv("a   ").unwrap(), alloc::vec!["a"]);
		assert_eq!(parse_argv("\"abc").unwrap(), alloc::vec!["abc"]);
	}

	#[test]
	fn echo_quoted_scenario() {
		let argv = parse_argv("echo 'hello world' foo").unwrap();
		assert_eq!(argv, alloc::vec!["echo", "hello world", "foo"]);
	}

	#[test]
	fn unknown_program_is_enoent() {
		setup();
		let result = process_create("no-such-program", ProcessAttributes::default());
		assert_eq!(result, Err(Error::Enoent));
	}

	#[test]
	fn reap_returns_status_then_esrch() {
		setup();
		register_program(ProgramEntry {
			name: "returns-42",
			main: |_argv| 42,
			globals_size: 0,
			stack_depth: 4096,
		});
		let pid = process_create("returns-42", ProcessAttributes::default()).unwrap();
		// Give the host thread a moment to run to completion.
		std::thread::sleep(std::time::Duration::from_millis(50));
		let status = process_destroy(pid).unwrap();
		assert_eq!(status, 42);
		assert_eq!(process_destroy(pid), Err(Error::Esrch));
	}

	#[test]
	fn pid_never_reused() {
		setup();
		register_program(ProgramEntry {
			name: "noop-prog",
			main: |_argv| 0,
			globals_size: 0,
			stack_depth: 4096,
		});
		let a = process_create("noop-prog", ProcessAttributes::default()).unwrap();
		std::thread::sleep(std::time::Duration::from_millis(30));
		process_destroy(a).unwrap();
		let b = process_create("noop-prog", ProcessAttributes::default()).unwrap();
		assert_ne!(a, b);
	}
}
