// SPDX-License-Identifier: GPL-2.0

//! Mount table and longest-prefix-match path resolution (`spec` §4.3).

use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;

use crate::error::{Error, Result};
use crate::vfs::backend::FsBackend;

pub struct Mount {
	pub src_path: String,
	pub mount_point: String,
	pub backend: Arc<dyn FsBackend>,
	/// Count of `OpenFile`/`DirHandle` resources currently beneath this
	/// mount; `umount` fails with `EBUSY` while this is nonzero.
	open_count: core::sync::atomic::AtomicUsize,
}

impl Mount {
	pub fn open_count(&self) -> usize {
		self.open_count.load(core::sync::atomic::Ordering::Acquire)
	}

	pub fn inc_open(&self) {
		self.open_count
			.fetch_add(1, core::sync::atomic::Ordering::AcqRel);
	}

	pub fn dec_open(&self) {
		self.open_count
			.fetch_sub(1, core::sync::atomic::Ordering::AcqRel);
	}
}

/// The global mount table. Mutations (`mount`/`umount`) take the table's
/// own mutex; path resolution reads are lock-free under the assumption
/// that mounts/umounts are rare (`spec` §5).
pub struct MountTable {
	mounts: spin::RwLock<Vec<Arc<Mount>>>,
}

impl MountTable {
	pub const fn new() -> Self {
		Self {
			mounts: spin::RwLock::new(Vec::new()),
		}
	}

	pub fn mount(
		&self,
		src_path: String,
		mount_point: String,
		backend: Arc<dyn FsBackend>,
	) -> Result<()> {
		let mut mounts = self.mounts.write();
		if mounts.iter().any(|m| m.mount_point == mount_point) {
			return Err(Error::Eexist);
		}
		mounts.push(Arc::new(Mount {
			src_path,
			mount_point,
			backend,
			open_count: core::sync::atomic::AtomicUsize::new(0),
		}));
		Ok(())
	}

	pub fn umount(&self, mount_point: &str) -> Result<()> {
		let mut mounts = self.mounts.write();
		let pos = mounts
			.iter()
			.position(|m| m.mount_point == mount_point)
			.ok_or(Error::Enoent)?;
		if mounts[pos].open_count() > 0 {
			return Err(Error::Ebusy);
		}
		mounts.remove(pos);
		Ok(())
	}

	/// Longest-prefix match against the mount table. Returns the winning
	/// mount and the tail portion of `path` relative to its mount point.
	pub fn resolve(&self, path: &str) -> Result<(Arc<Mount>, String)> {
		let mounts = self.mounts.read();
		let mut best: Option<&Arc<Mount>> = None;

		for m in mounts.iter() {
			if is_prefix(&m.mount_point, path) {
				let better = match best {
					None => true,
					Some(b) => m.mount_point.len() > b.mount_point.len(),
				};
				if better {
					best = Some(m);
				}
			}
		}

		let m = best.ok_or(Error::Enoent)?;
		let tail = tail_after_prefix(&m.mount_point, path);
		Ok((m.clone(), tail))
	}
}

fn is_prefix(mount_point: &str, path: &str) -> bool {
	if mount_point == "/" {
		return true;
	}
	path == mount_point || path.starts_with(mount_point) && path.as_bytes()[mount_point.len()] == b'/'
}

fn tail_after_prefix(mount_point: &str, path: &str) -> String {
	if mount_point == "/" {
		return String::from(path);
	}
	let rest = &path[mount_point.len()..];
	if rest.is_empty() {
		String::from("/")
	} else {
		String::from(rest)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::vfs::backend::{FsHandle, OpenFlags};

	struct NullBackend;
	impl FsBackend for NullBackend {
		fn open(&self, _path: &str, _flags: OpenFlags) -> Result<Arc<dyn FsHandle>> {
			Err(Error::Enosys)
		}
	}

	#[test]
	fn longest_prefix_wins() {
		let table = MountTable::new();
		table
			.mount(String::new(), String::from("/"), Arc::new(NullBackend))
			.unwrap();
		table
			.mount(String::new(), String::from("/dev"), Arc::new(NullBackend))
			.unwrap();

		let (m, tail) = table.resolve("/dev/i2c0").unwrap();
		assert_eq!(m.mount_point, "/dev");
		assert_eq!(tail, "/i2c0");

		let (m, tail) = table.resolve("/home/file").unwrap();
		assert_eq!(m.mount_point, "/");
		assert_eq!(tail, "/home/file");
	}

	#[test]
	fn umount_restores_prior_state_when_idle() {
		let table = MountTable::new();
		table
			.mount(String::new(), String::from("/"), Arc::new(NullBackend))
			.unwrap();
		table
			.mount(String::new(), String::from("/dev"), Arc::new(NullBackend))
			.unwrap();
		assert!(table.umount("/dev").is_ok());
		assert_eq!(table.resolve("/dev/x").unwrap().0.mount_point, "/");
	}

	#[test]
	fn umount_fails_busy_with_open_handles() {
		let table = MountTable::new();
		table
			.mount(String::new(), String::from("/dev"), Arc::new(NullBackend))
			.unwrap();
		let (m, _) = table.resolve("/dev").unwrap();
		m.inc_open();
		assert_eq!(table.umount("/dev"), Err(Error::Ebusy));
		m.dec_open();
		assert!(table.umount("/dev").is_ok());
	}
}
