// SPDX-License-Identifier: GPL-2.0

//! Null, zero, and full device drivers, grounded in Linux's
//! `drivers/char/mem.c` the way the teacher's version already cited: three
//! stateless drivers implementing the kernel's ten-function `Driver`
//! contract directly, no per-handle state needed.

use alloc::sync::Arc;

use kernel::driver::{Driver, DriverHandle};
use kernel::error::{Error, Result};
use kernel::vfs::OpenFlags;

pub struct NullDriver;

impl Driver for NullDriver {
	fn init(&self, _major: u32, _minor: u32) -> Result<DriverHandle> {
		Ok(Arc::new(()))
	}
	fn release(&self, _handle: &DriverHandle) {}
	fn open(&self, _handle: &DriverHandle, _flags: OpenFlags) -> Result<()> {
		Ok(())
	}
	fn close(&self, _handle: &DriverHandle, _force: bool) {}

	fn read(&self, _handle: &DriverHandle, _dst: &mut [u8], _offset: u64) -> Result<usize> {
		Ok(0)
	}

	fn write(&self, _handle: &DriverHandle, src: &[u8], _offset: u64) -> Result<usize> {
		Ok(src.len())
	}
}

pub struct ZeroDriver;

impl Driver for ZeroDriver {
	fn init(&self, _major: u32, _minor: u32) -> Result<DriverHandle> {
		Ok(Arc::new(()))
	}
	fn release(&self, _handle: &DriverHandle) {}
	fn open(&self, _handle: &DriverHandle, _flags: OpenFlags) -> Result<()> {
		Ok(())
	}
	fn close(&self, _handle: &DriverHandle, _force: bool) {}

	fn read(&self, _handle: &DriverHandle, dst: &mut [u8], _offset: u64) -> Result<usize> {
		dst.fill(0);
		Ok(dst.len())
	}

	fn write(&self, _handle: &DriverHandle, src: &[u8], _offset: u64) -> Result<usize> {
		Ok(src.len())
	}
}

pub struct FullDriver;

impl Driver for FullDriver {
	fn init(&self, _major: u32, _minor: u32) -> Result<DriverHandle> {
		Ok(Arc::new(()))
	}
	fn release(&self, _handle: &DriverHandle) {}
	fn open(&self, _handle: &DriverHandle, _flags: OpenFlags) -> Result<()> {
		Ok(())
	}
	fn close(&self, _handle: &DriverHandle, _force: bool) {}

	fn read(&self, _handle: &DriverHandle, dst: &mut [u8], _offset: u64) -> Result<usize> {
		dst.fill(0);
		Ok(dst.len())
	}

	fn write(&self, _handle: &DriverHandle, _src: &[u8], _offset: u64) -> Result<usize> {
		Err(Error::Enospc)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn null_discards_writes_and_reads_eof() {
		let d = NullDriver;
		let h = d.init(1, 3).unwrap();
		assert_eq!(d.write(&h, b"anything", 0).unwrap(), 8);
		let mut buf = [0xffu8; 4];
		assert_eq!(d.read(&h, &mut buf, 0).unwrap(), 0);
		assert_eq!(buf, [0xff; 4]);
	}

	#[test]
	fn zero_fills_reads_and_discards_writes() {
		let d = ZeroDriver;
		let h = d.init(1, 5).unwrap();
		let mut buf = [0xffu8; 4];
		assert_eq!(d.read(&h, &mut buf, 0).unwrap(), 4);
		assert_eq!(buf, [0u8; 4]);
		assert_eq!(d.write(&h, b"x", 0).unwrap(), 1);
	}

	#[test]
	fn full_rejects_writes_with_enospc() {
		let d = FullDriver;
		let h = d.init(1, 7).unwrap();
		assert_eq!(d.write(&h, b"x", 0), Err(Error::Enospc));
		let mut buf = [0xffu8; 2];
		assert_eq!(d.read(&h, &mut buf, 0).unwrap(), 2);
		assert_eq!(buf, [0u8; 2]);
	}
}
