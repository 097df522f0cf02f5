// SPDX-License-Identifier: GPL-2.0

//! Common identifiers and time units shared across kernel modules.

use core::fmt;

/// Process identifier. Monotonically increasing, nonzero, never reused
/// while any process record — live or zombie awaiting reap — exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pid(pub u32);

impl fmt::Display for Pid {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

/// Thread identifier, unique within its owning process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tid(pub u32);

impl fmt::Display for Tid {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

/// Resource handle: a monotonically increasing, never-reused id returned by
/// `register_resource` and required by `release_resource`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResRef(pub u64);

impl fmt::Display for ResRef {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "#{}", self.0)
	}
}

/// Milliseconds: the unit every timeout in this crate is specified in.
pub type Millis = u32;

/// Kernel tick count, millisecond resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Ticks(pub u64);

impl Ticks {
	pub const ZERO: Ticks = Ticks(0);

	pub fn elapsed_since(self, earlier: Ticks) -> u64 {
		self.0.saturating_sub(earlier.0)
	}
}

impl core::ops::Add<u64> for Ticks {
	type Output = Ticks;
	fn add(self, rhs: u64) -> Ticks {
		Ticks(self.0.saturating_add(rhs))
	}
}

/// User/group identifier, carried for `chown`/`chmod` bookkeeping; no
/// permission enforcement beyond ownership equality is in scope.
pub type Uid = u16;
pub type Gid = u16;

/// File mode bits, POSIX-shaped (rwx triplets plus type bits), as stored by
/// the VFS and produced by `stat`.
pub type Mode = u32;
