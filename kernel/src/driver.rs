// SPDX-License-Identifier: GPL-2.0

//! Driver framework (`spec` §4.6): the ten-function contract every driver
//! implements, the flat major/minor space, and the `mknod` handshake that
//! binds a filesystem path to a `(driver, handle)` pair.

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::sync::Arc;
use core::any::Any;

use crate::error::{Error, Result};
use crate::vfs::backend::{OpenFlags, Stat};

/// Opaque per-node driver state. The framework never downcasts this; only
/// the owning driver does (via `Any::downcast_ref` in its own methods).
pub type DriverHandle = Arc<dyn Any + Send + Sync>;

/// The ten-function driver contract (`spec` §4.6).
pub trait Driver: Send + Sync {
	fn init(&self, major: u32, minor: u32) -> Result<DriverHandle>;
	fn release(&self, handle: &DriverHandle);

	/// Expected to reject a second opener unless the driver supports
	/// sharing, by recording the opening task's identity in its own
	/// handle state and returning `EBUSY` to a mismatched caller.
	fn open(&self, handle: &DriverHandle, flags: OpenFlags) -> Result<()>;
	fn close(&self, handle: &DriverHandle, force: bool);

	fn write(&self, handle: &DriverHandle, src: &[u8], offset: u64) -> Result<usize>;
	fn read(&self, handle: &DriverHandle, dst: &mut [u8], offset: u64) -> Result<usize>;

	fn ioctl(&self, _handle: &DriverHandle, _request: u32, _argref: usize) -> Result<()> {
		Err(Error::Enosys)
	}

	fn flush(&self, _handle: &DriverHandle) -> Result<()> {
		Ok(())
	}

	fn stat(&self, _handle: &DriverHandle, _out: &mut Stat) -> Result<()> {
		Err(Error::Enosys)
	}
}

struct DriverEntry {
	name: String,
	driver: Arc<dyn Driver>,
}

struct Registry {
	by_major: BTreeMap<u32, DriverEntry>,
	handles: BTreeMap<(u32, u32), DriverHandle>,
}

static REGISTRY: spin::Mutex<Registry> = spin::Mutex::new(Registry {
	by_major: BTreeMap::new(),
	handles: BTreeMap::new(),
});

pub fn register(name: &str, major: u32, driver: Arc<dyn Driver>) {
	REGISTRY.lock().by_major.insert(
		major,
		DriverEntry {
			name: String::from(name),
			driver,
		},
	);
}

pub fn is_registered(name: &str, major: u32) -> bool {
	REGISTRY
		.lock()
		.by_major
		.get(&major)
		.is_some_and(|e| e.name == name)
}

fn with_driver<R>(major: u32, f: impl FnOnce(&Arc<dyn Driver>) -> R) -> Result<R> {
	let reg = REGISTRY.lock();
	let entry = reg.by_major.get(&major).ok_or(Error::Enxio)?;
	Ok(f(&entry.driver))
}

/// Bind `(major, minor)` to a live driver handle, creating it via
/// `Driver::init` on first open, then call the driver's own `open` to
/// enforce its port-ownership rule.
pub fn open(major: u32, minor: u32, flags: OpenFlags) -> Result<DriverHandle> {
	let handle = {
		let mut reg = REGISTRY.lock();
		let entry = reg.by_major.get(&major).ok_or(Error::Enxio)?;
		if let Some(h) = reg.handles.get(&(major, minor)) {
			h.clone()
		} else {
			let h = entry.driver.init(major, minor)?;
			reg.handles.insert((major, minor), h.clone());
			h
		}
	};
	with_driver(major, |d| d.open(&handle, flags))??;
	Ok(handle)
}

pub fn close(major: u32, handle: &DriverHandle, force: bool) {
	let _ = with_driver(major, |d| d.close(handle, force));
}

pub fn read(major: u32, handle: &DriverHandle, dst: &mut [u8], offset: u64) -> Result<usize> {
	with_driver(major, |d| d.read(handle, dst, offset))?
}

pub fn write(major: u32, handle: &DriverHandle, src: &[u8], offset: u64) -> Result<usize> {
	with_driver(major, |d| d.write(handle, src, offset))?
}

pub fn ioctl(major: u32, handle: &DriverHandle, request: u32, argref: usize) -> Result<()> {
	with_driver(major, |d| d.ioctl(handle, request, argref))?
}

pub fn flush(major: u32, handle: &DriverHandle) -> Result<()> {
	with_driver(major, |d| d.flush(handle))?
}

pub fn stat(major: u32, handle: &DriverHandle, out: &mut Stat) -> Result<()> {
	with_driver(major, |d| d.stat(handle, out))?
}

/// ioctl request numbers a TTY-like driver would recognize. No TTY driver
/// ships in this crate (`SPEC_FULL` §9 Open Question: TTY is out-of-core);
/// these constants exist so a downstream driver crate can implement the
/// line discipline without this crate guessing it.
pub mod tty_ioctl {
	pub const TCGETS: u32 = 0x5401;
	pub const TCSETS: u32 = 0x5402;
	pub const TIOCGWINSZ: u32 = 0x5413;
	pub const TIOCSWINSZ: u32 = 0x5414;
}

#[cfg(test)]
pub mod test_support {
	use super::*;

	struct NullDriver;

	impl Driver for NullDriver {
		fn init(&self, _major: u32, _minor: u32) -> Result<DriverHandle> {
			Ok(Arc::new(()))
		}
		fn release(&self, _handle: &DriverHandle) {}
		fn open(&self, _handle: &DriverHandle, _flags: OpenFlags) -> Result<()> {
			Ok(())
		}
		fn close(&self, _handle: &DriverHandle, _force: bool) {}
		fn write(&self, _handle: &DriverHandle, src: &[u8], _offset: u64) -> Result<usize> {
			Ok(src.len())
		}
		fn read(&self, _handle: &DriverHandle, _dst: &mut [u8], _offset: u64) -> Result<usize> {
			Ok(0)
		}
	}

	pub fn register_null_driver(major: u32, name: &str) {
		register(name, major, Arc::new(NullDriver));
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn second_opener_rejected_when_driver_tracks_sharing() {
		struct ExclusiveDriver {
			owner: spin::Mutex<Option<usize>>,
		}
		impl Driver for ExclusiveDriver {
			fn init(&self, _major: u32, _minor: u32) -> Result<DriverHandle> {
				Ok(Arc::new(()))
			}
			fn release(&self, _handle: &DriverHandle) {}
			fn open(&self, _handle: &DriverHandle, _flags: OpenFlags) -> Result<()> {
				let mut owner = self.owner.lock();
				if owner.is_some() {
					return Err(Error::Ebusy);
				}
				*owner = Some(1);
				Ok(())
			}
			fn close(&self, _handle: &DriverHandle, _force: bool) {
				*self.owner.lock() = None;
			}
			fn write(&self, _h: &DriverHandle, src: &[u8], _o: u64) -> Result<usize> {
				Ok(src.len())
			}
			fn read(&self, _h: &DriverHandle, _d: &mut [u8], _o: u64) -> Result<usize> {
				Ok(0)
			}
		}

		register(
			"exclusive-test",
			200,
			Arc::new(ExclusiveDriver {
				owner: spin::Mutex::new(None),
			}),
		);
		assert!(open(200, 0, OpenFlags::READ).is_ok());
		assert_eq!(open(200, 0, OpenFlags::READ).unwrap_err(), Error::Ebusy);
	}

	#[test]
	fn mknod_requires_driver_already_registered() {
		assert!(!is_registered("nonexistent-driver-xyz", 250));
	}
}
