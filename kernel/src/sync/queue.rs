// SPDX-License-Identifier: GPL-2.0

//! Fixed-capacity FIFO message queue (`spec` §4.9), with ISR-safe send and
//! receive.

use alloc::collections::VecDeque;

use crate::error::{Result, WaitResult};

/// A FIFO of fixed-size items with capacity `N`. Items are moved by value;
/// callers that need byte buffers carry a fixed-size array as `T`. Guarded
/// by a `spin::Mutex` rather than `KMutex` so a queue can be used before
/// any task context exists (e.g. during driver init).
pub struct KQueue<T> {
	buf: spin::Mutex<VecDeque<T>>,
	capacity: usize,
}

impl<T> KQueue<T> {
	pub fn new(capacity: usize) -> Self {
		Self {
			buf: spin::Mutex::new(VecDeque::with_capacity(capacity)),
			capacity,
		}
	}

	pub fn len(&self) -> usize {
		self.buf.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Blocks on full. `0` is try-once ⇒ `EAGAIN` if full; `MAX_DELAY`
	/// blocks forever.
	pub fn send(&self, item: T, timeout_ms: u32) -> Result<()>
	where
		T: Send,
	{
		let mut slot = Some(item);
		let outcome = super::poll_wait(timeout_ms, || {
			let mut buf = self.buf.lock();
			if buf.len() < self.capacity {
				buf.push_back(slot.take().expect("send polled after success"));
				Some(())
			} else {
				None
			}
		});
		outcome.into_result(timeout_ms == 0)
	}

	/// ISR-safe send: never blocks, fails immediately if full.
	pub fn send_from_isr(&self, item: T) -> Result<()> {
		let mut buf = self.buf.lock();
		if buf.len() >= self.capacity {
			return Err(crate::error::Error::Eagain);
		}
		buf.push_back(item);
		Ok(())
	}

	/// Blocks on empty. `0` is try-once ⇒ `EAGAIN`; `MAX_DELAY` blocks
	/// forever.
	pub fn receive(&self, timeout_ms: u32) -> Result<T> {
		let outcome = super::poll_wait(timeout_ms, || self.buf.lock().pop_front());
		outcome.into_result(timeout_ms == 0)
	}

	/// ISR-safe receive: never blocks, fails immediately if empty.
	pub fn receive_from_isr(&self) -> Result<T> {
		self.buf
			.lock()
			.pop_front()
			.ok_or(crate::error::Error::Eagain)
	}

	/// Read the head without removing it.
	pub fn peek(&self, timeout_ms: u32) -> Result<T>
	where
		T: Clone,
	{
		let outcome: WaitResult<T> =
			super::poll_wait(timeout_ms, || self.buf.lock().front().cloned());
		outcome.into_result(timeout_ms == 0)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::Error;
	use crate::sched::host;
	use std::sync::Arc;
	use std::thread;

	fn setup() {
		host::install();
	}

	#[test]
	fn send_on_full_with_zero_timeout_is_eagain() {
		setup();
		let q: KQueue<u8> = KQueue::new(1);
		assert_eq!(q.send(1, 0), Ok(()));
		assert_eq!(q.send(2, 0), Err(Error::Eagain));
	}

	#[test]
	fn receive_on_empty_with_zero_timeout_is_eagain() {
		setup();
		let q: KQueue<u8> = KQueue::new(1);
		assert_eq!(q.receive(0), Err(Error::Eagain));
	}

	#[test]
	fn fifo_order_preserved() {
		setup();
		let q: KQueue<u8> = KQueue::new(4);
		q.send(1, 0).unwrap();
		q.send(2, 0).unwrap();
		q.send(3, 0).unwrap();
		assert_eq!(q.receive(0), Ok(1));
		assert_eq!(q.receive(0), Ok(2));
		assert_eq!(q.receive(0), Ok(3));
	}

	#[test]
	fn peek_does_not_remove() {
		setup();
		let q: KQueue<u8> = KQueue::new(4);
		q.send(7, 0).unwrap();
		assert_eq!(q.peek(0), Ok(7));
		assert_eq!(q.receive(0), Ok(7));
	}

	#[test]
	fn depth_never_exceeds_capacity_under_isr_and_task_interleave() {
		setup();
		let q = Arc::new(KQueue::<u8>::new(3));
		let mut sent = 0u8;
		for _ in 0..10 {
			if q.send_from_isr(sent).is_ok() {
				sent += 1;
			}
			assert!(q.len() <= 3);
			let _ = q.receive(0);
		}
	}

	#[test]
	fn blocked_receiver_observes_later_send() {
		setup();
		let q = Arc::new(KQueue::<u8>::new(1));
		let q2 = q.clone();
		let t = thread::spawn(move || q2.receive(1000));
		thread::sleep(std::time::Duration::from_millis(20));
		q.send(42, 0).unwrap();
		assert_eq!(t.join().unwrap(), Ok(42));
	}
}
