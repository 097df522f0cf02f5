// SPDX-License-Identifier: GPL-2.0

//! Normal and recursive mutexes (`spec` §4.9). Priority inheritance is
//! assumed to be supplied by the scheduler binding, not reimplemented here.

use core::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

use crate::error::{Error, Result};
use crate::sched::{self, TaskHandle};

const UNOWNED: usize = 0;

/// A mutex. `recursive = true` lets the current owner lock it again (must
/// be unlocked the same number of times); `recursive = false` makes a
/// second lock attempt by the owner itself block like any other task.
pub struct KMutex {
	owner: AtomicUsize,
	depth: AtomicU32,
	recursive: bool,
}

fn handle_key(h: TaskHandle) -> usize {
	h.0 as usize
}

impl KMutex {
	pub fn new(recursive: bool) -> Self {
		Self {
			owner: AtomicUsize::new(UNOWNED),
			depth: AtomicU32::new(0),
			recursive,
		}
	}

	/// Attempt to lock, blocking up to `timeout_ms`. `0` is try-once,
	/// [`sched::MAX_DELAY`] blocks forever.
	pub fn lock(&self, timeout_ms: u32) -> Result<()> {
		let outcome = super::poll_wait(timeout_ms, || self.try_lock_once());
		outcome.into_result(timeout_ms == 0)
	}

	fn try_lock_once(&self) -> Option<()> {
		let me = handle_key(sched::current().current_task());

		if self.recursive {
			let current_owner = self.owner.load(Ordering::Acquire);
			if current_owner == me {
				self.depth.fetch_add(1, Ordering::AcqRel);
				return Some(());
			}
		}

		match self
			.owner
			.compare_exchange(UNOWNED, me, Ordering::AcqRel, Ordering::Acquire)
		{
			Ok(_) => {
				self.depth.store(1, Ordering::Release);
				Some(())
			}
			Err(_) => None,
		}
	}

	/// Unlock. Returns `EPERM` if the caller is not the current owner, or
	/// if a recursive mutex is unlocked more times than it was locked
	/// (`spec` §8 boundary behaviour).
	pub fn unlock(&self) -> Result<()> {
		let me = handle_key(sched::current().current_task());
		let current_owner = self.owner.load(Ordering::Acquire);
		if current_owner != me {
			return Err(Error::Eperm);
		}

		let remaining = self.depth.fetch_sub(1, Ordering::AcqRel);
		if remaining == 0 {
			// Already fully unlocked; undo the underflowing subtract.
			self.depth.store(0, Ordering::Release);
			return Err(Error::Eperm);
		}
		if remaining == 1 {
			self.owner.store(UNOWNED, Ordering::Release);
		}
		Ok(())
	}

	pub fn is_locked(&self) -> bool {
		self.owner.load(Ordering::Acquire) != UNOWNED
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::sched::host;
	use std::sync::Arc;
	use std::thread;

	fn setup() {
		host::install();
	}

	#[test]
	fn normal_mutex_second_lock_by_owner_blocks_until_timeout() {
		setup();
		let m = KMutex::new(false);
		assert_eq!(m.lock(0), Ok(()));
		assert_eq!(m.lock(20), Err(Error::Etime));
		assert_eq!(m.unlock(), Ok(()));
	}

	#[test]
	fn recursive_mutex_requires_matching_unlock_count() {
		setup();
		let m = KMutex::new(true);
		assert_eq!(m.lock(0), Ok(()));
		assert_eq!(m.lock(0), Ok(()));
		assert_eq!(m.lock(0), Ok(()));
		assert_eq!(m.unlock(), Ok(()));
		assert_eq!(m.unlock(), Ok(()));
		assert!(m.is_locked());
		assert_eq!(m.unlock(), Ok(()));
		assert!(!m.is_locked());
		assert_eq!(m.unlock(), Err(Error::Eperm));
	}

	#[test]
	fn unlock_by_non_owner_is_eperm() {
		setup();
		let m = Arc::new(KMutex::new(false));
		assert_eq!(m.lock(0), Ok(()));
		let m2 = m.clone();
		let result = thread::spawn(move || m2.unlock()).join().unwrap();
		assert_eq!(result, Err(Error::Eperm));
	}

	#[test]
	fn lock_released_by_other_task_is_observed() {
		setup();
		let m = Arc::new(KMutex::new(false));
		assert_eq!(m.lock(0), Ok(()));
		let m2 = m.clone();
		let t = thread::spawn(move || m2.lock(1000));
		thread::sleep(std::time::Duration::from_millis(20));
		m.unlock().unwrap();
		assert_eq!(t.join().unwrap(), Ok(()));
	}
}
