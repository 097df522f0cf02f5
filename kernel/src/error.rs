// SPDX-License-Identifier: GPL-2.0

//! Kernel error taxonomy and errno mapping.
//!
//! Every syscall-shaped entry point in this crate returns [`Result<T>`]. The
//! six kinds from the design (Validation, Resource, State, I/O, Timeout,
//! Fatal) are not a separate type — they are documented groupings of the
//! variants below; `Fatal` conditions are never meant to reach a caller and
//! are instead routed through [`crate::panic::kernel_panic`].

use core::fmt;

/// Kernel error type. Variant names follow the POSIX errno this crate
/// surfaces them as (`spec` §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
	/// Invalid argument / malformed syntax. (Validation)
	Einval,
	/// Permission denied for the calling task/port. (Validation / State)
	Eacces,
	/// Resource busy: port locked, already mounted, second opener. (State)
	Ebusy,
	/// Bad handle / use-after-close. (Validation)
	Ebadf,
	/// No such file, mount point, driver, or program. (Resource)
	Enoent,
	/// Already exists: mount point occupied, node already present. (State)
	Eexist,
	/// Peripheral or medium I/O error. (I/O)
	Eio,
	/// Medium or table full. (Resource)
	Enospc,
	/// Heap exhausted. (Resource)
	Enomem,
	/// Mutating call against a read-only mount. (State)
	Erofs,
	/// Operation not permitted (mutex/owner mismatch). (Validation / State)
	Eperm,
	/// Write past the reading end of a fifo/pipe. (I/O)
	Epipe,
	/// A timed wait expired. (Timeout)
	Etime,
	/// Try-once call found nothing available right now. (State)
	Eagain,
	/// No such device / device not configured for this node. (Resource)
	Enxio,
	/// Function not implemented by this backend/driver. (Validation)
	Enosys,
	/// No such process / already reaped. (Resource)
	Esrch,
	/// Interrupted wait (used internally by ISR-signalled paths). (I/O)
	Eintr,
}

impl Error {
	/// Convert to a negative errno value, the representation user-facing
	/// library wrappers (and `errnov`) store.
	pub const fn to_errno(self) -> i32 {
		match self {
			Error::Eperm => -1,
			Error::Enoent => -2,
			Error::Esrch => -3,
			Error::Eintr => -4,
			Error::Eio => -5,
			Error::Enxio => -6,
			Error::Eagain => -11,
			Error::Enomem => -12,
			Error::Eacces => -13,
			Error::Ebusy => -16,
			Error::Eexist => -17,
			Error::Enospc => -28,
			Error::Epipe => -32,
			Error::Einval => -22,
			Error::Enosys => -38,
			Error::Erofs => -30,
			Error::Ebadf => -9,
			Error::Etime => -62,
		}
	}
}

impl fmt::Display for Error {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			Error::Einval => "invalid argument",
			Error::Eacces => "permission denied",
			Error::Ebusy => "resource busy",
			Error::Ebadf => "bad handle",
			Error::Enoent => "no such file or directory",
			Error::Eexist => "already exists",
			Error::Eio => "I/O error",
			Error::Enospc => "no space left",
			Error::Enomem => "out of memory",
			Error::Erofs => "read-only filesystem",
			Error::Eperm => "operation not permitted",
			Error::Epipe => "broken pipe",
			Error::Etime => "timer expired",
			Error::Eagain => "resource temporarily unavailable",
			Error::Enxio => "no such device",
			Error::Enosys => "function not implemented",
			Error::Esrch => "no such process",
			Error::Eintr => "interrupted",
		};
		f.write_str(s)
	}
}

/// Kernel result type.
pub type Result<T> = core::result::Result<T, Error>;

/// Outcome of a timed wait on a sync primitive. Kept distinct from [`Error`]
/// so a timeout is never silently collapsed into an I/O error at the caller
/// (design notes, "Timed waits").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitResult<T> {
	Signalled(T),
	TimedOut,
}

impl<T> WaitResult<T> {
	/// `timeout_was_zero` distinguishes the "try-once" boundary (`EAGAIN`)
	/// from a real timeout (`ETIME`) per the same outcome.
	pub fn into_result(self, timeout_was_zero: bool) -> Result<T> {
		match self {
			WaitResult::Signalled(v) => Ok(v),
			WaitResult::TimedOut if timeout_was_zero => Err(Error::Eagain),
			WaitResult::TimedOut => Err(Error::Etime),
		}
	}
}
