// SPDX-License-Identifier: GPL-2.0

//! UART-style serial byte stream driver. Register-level access is
//! abstracted behind [`UartPort`], the same shape `kernel::i2c` uses for
//! its bus trait — the architecture-specific MMIO `spec.md` §1 excludes
//! from this crate's scope. This module owns only the ten-function
//! `Driver` contract and an RX ring buffer; a board-support crate supplies
//! the real 16550-register-poking `UartPort` impl.

use alloc::collections::VecDeque;
use alloc::sync::Arc;

use kernel::driver::{tty_ioctl, Driver, DriverHandle};
use kernel::error::{Error, Result};
use kernel::vfs::OpenFlags;

const RX_BUFFER_CAP: usize = 1024;

/// Raw byte-level access to one UART. Implementors wait however their
/// target requires (busy-poll a status register, block on an interrupt);
/// this driver only calls through the trait, never touches hardware.
pub trait UartPort: Send + Sync {
	fn tx_ready(&self) -> bool;
	fn rx_ready(&self) -> bool;
	fn write_byte(&self, byte: u8);
	fn read_byte(&self) -> u8;
}

struct SerialHandle {
	rx: spin::Mutex<VecDeque<u8>>,
}

pub struct SerialDriver {
	port: Arc<dyn UartPort>,
}

impl SerialDriver {
	pub fn new(port: Arc<dyn UartPort>) -> Self {
		Self { port }
	}

	fn drain_hardware(&self, rx: &mut VecDeque<u8>) {
		while self.port.rx_ready() && rx.len() < RX_BUFFER_CAP {
			rx.push_back(self.port.read_byte());
		}
	}
}

impl Driver for SerialDriver {
	fn init(&self, _major: u32, _minor: u32) -> Result<DriverHandle> {
		Ok(Arc::new(SerialHandle {
			rx: spin::Mutex::new(VecDeque::new()),
		}))
	}

	fn release(&self, _handle: &DriverHandle) {}

	fn open(&self, _handle: &DriverHandle, _flags: OpenFlags) -> Result<()> {
		Ok(())
	}

	fn close(&self, _handle: &DriverHandle, _force: bool) {}

	/// Reads what is already buffered plus whatever the hardware has
	/// ready, stopping early at a newline so line-oriented callers (a
	/// shell reading a command) get one line per call.
	fn read(&self, handle: &DriverHandle, dst: &mut [u8], _offset: u64) -> Result<usize> {
		let handle = handle.downcast_ref::<SerialHandle>().ok_or(Error::Einval)?;
		let mut rx = handle.rx.lock();
		self.drain_hardware(&mut rx);

		let mut n = 0;
		while n < dst.len() {
			match rx.pop_front() {
				Some(byte) => {
					dst[n] = byte;
					n += 1;
					if byte == b'\n' {
						break;
					}
				}
				None => break,
			}
		}
		Ok(n)
	}

	fn write(&self, _handle: &DriverHandle, src: &[u8], _offset: u64) -> Result<usize> {
		for &byte in src {
			while !self.port.tx_ready() {
				core::hint::spin_loop();
			}
			self.port.write_byte(byte);
		}
		Ok(src.len())
	}

	fn ioctl(&self, _handle: &DriverHandle, request: u32, _argref: usize) -> Result<()> {
		match request {
			tty_ioctl::TCGETS | tty_ioctl::TCSETS => Ok(()),
			_ => Err(Error::Enosys),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	struct LoopbackUart {
		queued: spin::Mutex<VecDeque<u8>>,
	}

	impl UartPort for LoopbackUart {
		fn tx_ready(&self) -> bool {
			true
		}
		fn rx_ready(&self) -> bool {
			!self.queued.lock().is_empty()
		}
		fn write_byte(&self, byte: u8) {
			self.queued.lock().push_back(byte);
		}
		fn read_byte(&self) -> u8 {
			self.queued.lock().pop_front().unwrap_or(0)
		}
	}

	#[test]
	fn write_then_read_sees_looped_back_bytes() {
		let port = Arc::new(LoopbackUart {
			queued: spin::Mutex::new(VecDeque::new()),
		});
		let driver = SerialDriver::new(port);
		let handle = driver.init(4, 64).unwrap();

		driver.write(&handle, b"hi\n", 0).unwrap();
		let mut buf = [0u8; 16];
		let n = driver.read(&handle, &mut buf, 0).unwrap();
		assert_eq!(&buf[..n], b"hi\n");
	}

	#[test]
	fn read_stops_at_newline_leaving_rest_buffered() {
		let port = Arc::new(LoopbackUart {
			queued: spin::Mutex::new(VecDeque::new()),
		});
		let driver = SerialDriver::new(port);
		let handle = driver.init(4, 64).unwrap();

		driver.write(&handle, b"ab\ncd", 0).unwrap();
		let mut buf = [0u8; 16];
		let n1 = driver.read(&handle, &mut buf, 0).unwrap();
		assert_eq!(&buf[..n1], b"ab\n");
		let n2 = driver.read(&handle, &mut buf, 0).unwrap();
		assert_eq!(&buf[..n2], b"cd");
	}

	#[test]
	fn unknown_ioctl_is_enosys() {
		let port = Arc::new(LoopbackUart {
			queued: spin::Mutex::new(VecDeque::new()),
		});
		let driver = SerialDriver::new(port);
		let handle = driver.init(4, 64).unwrap();
		assert_eq!(driver.ioctl(&handle, 0xffff, 0), Err(Error::Enosys));
	}
}
