// SPDX-License-Identifier: GPL-2.0

//! Filesystem backend contract (`spec` §4.5).
//!
//! A mount is a `Arc<dyn FsBackend>`; an open file is a `Arc<dyn FsHandle>`
//! obtained from `FsBackend::open`. Unsupported operations use the
//! teacher's pattern of a default method returning the right errno (e.g.
//! `EROFS` for a read-only backend, `ENOSYS` for an operation the backend
//! never implements) rather than forcing every backend to implement every
//! method.

use alloc::sync::Arc;

use crate::error::{Error, Result};
use crate::types::{Gid, Mode, Uid};
use crate::vfs::dirent::{DirEntry, FileType};

bitflags::bitflags! {
	#[derive(Debug, Clone, Copy, PartialEq, Eq)]
	pub struct OpenFlags: u32 {
		const READ   = 0b0001;
		const WRITE  = 0b0010;
		const APPEND = 0b0100;
		const CREATE = 0b1000;
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekWhence {
	Start,
	Current,
	End,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Stat {
	pub size: u64,
	pub mode: Mode,
	pub uid: Uid,
	pub gid: Gid,
	pub filetype_device: bool,
	pub dev: Option<(u32, u32)>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StatFs {
	pub block_size: u32,
	pub blocks_total: u64,
	pub blocks_free: u64,
	pub files_total: u64,
	pub files_free: u64,
}

/// An open file or device handle returned by `FsBackend::open`.
pub trait FsHandle: Send + Sync {
	fn read(&self, buf: &mut [u8], offset: u64) -> Result<usize>;
	fn write(&self, buf: &[u8], offset: u64) -> Result<usize>;

	fn ioctl(&self, _request: u32, _argref: usize) -> Result<()> {
		Err(Error::Enosys)
	}

	fn fstat(&self, _out: &mut Stat) -> Result<()> {
		Err(Error::Enosys)
	}

	fn flush(&self) -> Result<()> {
		Ok(())
	}
}

/// An open directory handle returned by `FsBackend::opendir`.
pub trait FsDirHandle: Send + Sync {
	/// Yield the entry at `pos` if one exists. `spec` §4.4's "lazy
	/// sequence terminated when name is null" is `Ok(None)`.
	fn readdir(&self, pos: u64) -> Result<Option<DirEntry>>;
}

/// A mounted filesystem. Every mutating default below returns `EROFS`,
/// matching the spec's read-only backends (procfs; eefs mounted `ro`).
pub trait FsBackend: Send + Sync {
	fn open(&self, path: &str, flags: OpenFlags) -> Result<Arc<dyn FsHandle>>;

	fn opendir(&self, path: &str) -> Result<Arc<dyn FsDirHandle>> {
		let _ = path;
		Err(Error::Enosys)
	}

	fn stat(&self, _path: &str, _out: &mut Stat) -> Result<()> {
		Err(Error::Enosys)
	}

	fn statfs(&self, out: &mut StatFs) -> Result<()> {
		*out = StatFs::default();
		Ok(())
	}

	fn mkdir(&self, _path: &str, _mode: Mode) -> Result<()> {
		Err(Error::Erofs)
	}

	fn mknod(&self, _path: &str, _driver_name: &str, _major: u32, _minor: u32) -> Result<()> {
		Err(Error::Erofs)
	}

	fn mkfifo(&self, _path: &str, _mode: Mode) -> Result<()> {
		Err(Error::Erofs)
	}

	fn remove(&self, _path: &str) -> Result<()> {
		Err(Error::Erofs)
	}

	fn rename(&self, _old: &str, _new: &str) -> Result<()> {
		Err(Error::Erofs)
	}

	fn chmod(&self, _path: &str, _mode: Mode) -> Result<()> {
		Err(Error::Erofs)
	}

	fn chown(&self, _path: &str, _uid: Uid, _gid: Gid) -> Result<()> {
		Err(Error::Erofs)
	}

	fn sync(&self) -> Result<()> {
		Ok(())
	}
}

/// Resolve a `FileType` for a stat result carrying a device tag, used by
/// backends that populate `DirEntry::filetype`.
pub fn filetype_of(stat: &Stat, is_dir: bool, is_fifo: bool) -> FileType {
	if stat.dev.is_some() {
		FileType::Device
	} else if is_dir {
		FileType::Directory
	} else if is_fifo {
		FileType::Fifo
	} else {
		FileType::Regular
	}
}
