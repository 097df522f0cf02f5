// SPDX-License-Identifier: GPL-2.0

//! VFS core (`spec` §4.3): mount table, path resolution, dispatch to
//! filesystem backends. File handles are opaque to callers — there is no
//! classic integer file-descriptor table inside the kernel; each `open`
//! returns a heap-allocated [`OpenFile`] that callers register on their
//! process's resource list.

pub mod backend;
pub mod dirent;
pub mod path;

use alloc::string::String;
use alloc::sync::Arc;
use core::sync::atomic::{AtomicU64, Ordering};

use crate::error::{Error, Result};
use crate::types::{Gid, Mode, Uid};

pub use backend::{FsBackend, FsDirHandle, FsHandle, OpenFlags, SeekWhence, Stat, StatFs};
pub use dirent::{DirEntry, FileType};
pub use path::{Mount, MountTable};

/// A file open on some mount. Serializes its own read/write calls behind
/// `pos` rather than a global VFS lock, so unrelated mounts stay
/// independent (`SPEC_FULL` §4.3).
pub struct OpenFile {
	mount: Arc<Mount>,
	handle: Arc<dyn FsHandle>,
	pos: AtomicU64,
	io_lock: spin::Mutex<()>,
}

impl OpenFile {
	pub fn read(&self, buf: &mut [u8]) -> Result<usize> {
		let _guard = self.io_lock.lock();
		let offset = self.pos.load(Ordering::Acquire);
		let n = self.handle.read(buf, offset)?;
		self.pos.fetch_add(n as u64, Ordering::AcqRel);
		Ok(n)
	}

	pub fn write(&self, buf: &[u8]) -> Result<usize> {
		let _guard = self.io_lock.lock();
		let offset = self.pos.load(Ordering::Acquire);
		let n = self.handle.write(buf, offset)?;
		self.pos.fetch_add(n as u64, Ordering::AcqRel);
		Ok(n)
	}

	pub fn seek(&self, offset: i64, whence: SeekWhence) -> Result<u64> {
		let _guard = self.io_lock.lock();
		let mut stat = Stat::default();
		let base = match whence {
			SeekWhence::Start => 0,
			SeekWhence::Current => self.pos.load(Ordering::Acquire),
			SeekWhence::End => {
				self.handle.fstat(&mut stat)?;
				stat.size
			}
		};
		let new_pos = (base as i64 + offset).max(0) as u64;
		self.pos.store(new_pos, Ordering::Release);
		Ok(new_pos)
	}

	pub fn ioctl(&self, request: u32, argref: usize) -> Result<()> {
		self.handle.ioctl(request, argref)
	}

	pub fn fstat(&self, out: &mut Stat) -> Result<()> {
		self.handle.fstat(out)
	}

	pub fn flush(&self) -> Result<()> {
		self.handle.flush()
	}
}

impl Drop for OpenFile {
	fn drop(&mut self) {
		self.mount.dec_open();
	}
}

pub struct DirHandle {
	mount: Arc<Mount>,
	dir: Arc<dyn FsDirHandle>,
	seek_pos: AtomicU64,
}

impl DirHandle {
	/// Yields `None` once exhausted (`spec` §4.4: "lazy sequence
	/// terminated when name is null"), advancing the restart token.
	pub fn readdir(&self) -> Result<Option<DirEntry>> {
		let pos = self.seek_pos.load(Ordering::Acquire);
		let entry = self.dir.readdir(pos)?;
		if entry.is_some() {
			self.seek_pos.fetch_add(1, Ordering::AcqRel);
		}
		Ok(entry)
	}

	pub fn seekdir(&self, pos: u64) {
		self.seek_pos.store(pos, Ordering::Release);
	}

	pub fn telldir(&self) -> u64 {
		self.seek_pos.load(Ordering::Acquire)
	}

	pub fn rewinddir(&self) {
		self.seekdir(0);
	}
}

impl Drop for DirHandle {
	fn drop(&mut self) {
		self.mount.dec_open();
	}
}

/// The VFS singleton: one mount table, shared by every process.
pub struct Vfs {
	table: MountTable,
}

impl Vfs {
	pub const fn new() -> Self {
		Self {
			table: MountTable::new(),
		}
	}

	pub fn mount(&self, fs_name: &str, src_path: &str, mount_point: &str) -> Result<()> {
		let backend = crate::fs::registry::lookup(fs_name).ok_or(Error::Enoent)?;
		let fs_handle = backend.init(src_path, mount_point)?;
		self.table
			.mount(String::from(src_path), String::from(mount_point), fs_handle)
	}

	pub fn umount(&self, mount_point: &str) -> Result<()> {
		self.table.umount(mount_point)
	}

	pub fn open(&self, path: &str, flags: OpenFlags) -> Result<OpenFile> {
		let (mount, tail) = self.table.resolve(path)?;
		let handle = mount.backend.open(&tail, flags)?;
		mount.inc_open();
		Ok(OpenFile {
			mount,
			handle,
			pos: AtomicU64::new(0),
			io_lock: spin::Mutex::new(()),
		})
	}

	pub fn opendir(&self, path: &str) -> Result<DirHandle> {
		let (mount, tail) = self.table.resolve(path)?;
		let dir = mount.backend.opendir(&tail)?;
		mount.inc_open();
		Ok(DirHandle {
			mount,
			dir,
			seek_pos: AtomicU64::new(0),
		})
	}

	pub fn stat(&self, path: &str, out: &mut Stat) -> Result<()> {
		let (mount, tail) = self.table.resolve(path)?;
		mount.backend.stat(&tail, out)
	}

	pub fn statfs(&self, path: &str, out: &mut StatFs) -> Result<()> {
		let (mount, _tail) = self.table.resolve(path)?;
		mount.backend.statfs(out)
	}

	pub fn mkdir(&self, path: &str, mode: Mode) -> Result<()> {
		let (mount, tail) = self.table.resolve(path)?;
		mount.backend.mkdir(&tail, mode)
	}

	pub fn mknod(&self, path: &str, driver_name: &str, major: u32, minor: u32) -> Result<()> {
		let (mount, tail) = self.table.resolve(path)?;
		mount.backend.mknod(&tail, driver_name, major, minor)
	}

	pub fn mkfifo(&self, path: &str, mode: Mode) -> Result<()> {
		let (mount, tail) = self.table.resolve(path)?;
		mount.backend.mkfifo(&tail, mode)
	}

	pub fn remove(&self, path: &str) -> Result<()> {
		let (mount, tail) = self.table.resolve(path)?;
		mount.backend.remove(&tail)
	}

	pub fn rename(&self, old: &str, new: &str) -> Result<()> {
		let (mount_old, tail_old) = self.table.resolve(old)?;
		let (mount_new, tail_new) = self.table.resolve(new)?;
		if !Arc::ptr_eq(&mount_old, &mount_new) {
			return Err(Error::Einval);
		}
		mount_old.backend.rename(&tail_old, &tail_new)
	}

	pub fn chmod(&self, path: &str, mode: Mode) -> Result<()> {
		let (mount, tail) = self.table.resolve(path)?;
		mount.backend.chmod(&tail, mode)
	}

	pub fn chown(&self, path: &str, uid: Uid, gid: Gid) -> Result<()> {
		let (mount, tail) = self.table.resolve(path)?;
		mount.backend.chown(&tail, uid, gid)
	}
}

static VFS: Vfs = Vfs::new();

pub fn vfs() -> &'static Vfs {
	&VFS
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::fs;

	fn setup() {
		fs::registry::register_defaults();
	}

	#[test]
	fn write_then_read_back_is_identical() {
		setup();
		let v = Vfs::new();
		v.mount("ramfs", "", "/").unwrap();
		v.mkdir("/", 0o755).ok();
		let f = v.open("/greeting", OpenFlags::READ | OpenFlags::WRITE | OpenFlags::CREATE).unwrap();
		let n = f.write(b"hello world").unwrap();
		assert_eq!(n, 11);
		let mut buf = [0u8; 11];
		f.seek(0, SeekWhence::Start).unwrap();
		let read = f.read(&mut buf).unwrap();
		assert_eq!(read, 11);
		assert_eq!(&buf, b"hello world");
	}

	#[test]
	fn path_below_mount_blocks_umount() {
		setup();
		let v = Vfs::new();
		v.mount("ramfs", "", "/").unwrap();
		v.mount("ramfs", "", "/mnt").unwrap();
		let f = v.open("/mnt/x", OpenFlags::READ | OpenFlags::WRITE | OpenFlags::CREATE).unwrap();
		assert_eq!(v.umount("/mnt"), Err(Error::Ebusy));
		drop(f);
		assert!(v.umount("/mnt").is_ok());
	}
}
