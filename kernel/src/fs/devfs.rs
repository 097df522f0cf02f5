// SPDX-License-Identifier: GPL-2.0

//! Device filesystem (`spec` §4.5): routes `open/close/read/write/ioctl/
//! flush` to the driver registered under a node's `(major, minor)`, and
//! owns the registry of live nodes created by `mknod`.

use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};
use alloc::sync::Arc;

use crate::driver;
use crate::error::{Error, Result};
use crate::vfs::backend::{Stat, StatFs};
use crate::vfs::dirent::{DirEntry, FileType};
use crate::vfs::{FsBackend, FsDirHandle, FsHandle, OpenFlags};

struct DeviceNode {
	major: u32,
	minor: u32,
}

pub struct DevFs {
	nodes: spin::Mutex<BTreeMap<String, DeviceNode>>,
}

impl DevFs {
	pub fn new() -> Self {
		Self {
			nodes: spin::Mutex::new(BTreeMap::new()),
		}
	}
}

impl Default for DevFs {
	fn default() -> Self {
		Self::new()
	}
}

fn leaf(path: &str) -> &str {
	path.trim_start_matches('/')
}

struct DevFileHandle {
	major: u32,
	minor: u32,
	driver_handle: driver::DriverHandle,
}

impl FsHandle for DevFileHandle {
	fn read(&self, buf: &mut [u8], offset: u64) -> Result<usize> {
		driver::read(self.major, &self.driver_handle, buf, offset)
	}

	fn write(&self, buf: &[u8], offset: u64) -> Result<usize> {
		driver::write(self.major, &self.driver_handle, buf, offset)
	}

	fn ioctl(&self, request: u32, argref: usize) -> Result<()> {
		driver::ioctl(self.major, &self.driver_handle, request, argref)
	}

	fn fstat(&self, out: &mut Stat) -> Result<()> {
		driver::stat(self.major, &self.driver_handle, out)?;
		out.dev = Some((self.major, self.minor));
		Ok(())
	}

	fn flush(&self) -> Result<()> {
		driver::flush(self.major, &self.driver_handle)
	}
}

impl Drop for DevFileHandle {
	fn drop(&mut self) {
		driver::close(self.major, &self.driver_handle, false);
	}
}

struct DevDirHandle {
	names: alloc::vec::Vec<(String, u32, u32)>,
}

impl FsDirHandle for DevDirHandle {
	fn readdir(&self, pos: u64) -> Result<Option<DirEntry>> {
		match self.names.get(pos as usize) {
			Some((name, major, minor)) => Ok(Some(DirEntry {
				name: name.clone(),
				size: 0,
				filetype: FileType::Device,
				dev: Some((*major, *minor)),
			})),
			None => Ok(None),
		}
	}
}

impl FsBackend for DevFs {
	fn open(&self, path: &str, flags: OpenFlags) -> Result<Arc<dyn FsHandle>> {
		let name = leaf(path);
		let (major, minor) = {
			let nodes = self.nodes.lock();
			let node = nodes.get(name).ok_or(Error::Enxio)?;
			(node.major, node.minor)
		};
		let handle = driver::open(major, minor, flags)?;
		Ok(Arc::new(DevFileHandle {
			major,
			minor,
			driver_handle: handle,
		}))
	}

	fn opendir(&self, path: &str) -> Result<Arc<dyn FsDirHandle>> {
		if !path.is_empty() && path != "/" {
			return Err(Error::Enoent);
		}
		let nodes = self.nodes.lock();
		let names = nodes
			.iter()
			.map(|(name, node)| (name.clone(), node.major, node.minor))
			.collect();
		Ok(Arc::new(DevDirHandle { names }))
	}

	fn mknod(&self, path: &str, driver_name: &str, major: u32, minor: u32) -> Result<()> {
		if !driver::is_registered(driver_name, major) {
			return Err(Error::Enxio);
		}
		let name = leaf(path).to_string();
		let mut nodes = self.nodes.lock();
		if nodes.contains_key(&name) {
			return Err(Error::Eexist);
		}
		nodes.insert(name, DeviceNode { major, minor });
		Ok(())
	}

	fn remove(&self, path: &str) -> Result<()> {
		let name = leaf(path);
		self.nodes
			.lock()
			.remove(name)
			.map(|_| ())
			.ok_or(Error::Enoent)
	}

	fn stat(&self, path: &str, out: &mut Stat) -> Result<()> {
		let name = leaf(path);
		let nodes = self.nodes.lock();
		let node = nodes.get(name).ok_or(Error::Enoent)?;
		out.dev = Some((node.major, node.minor));
		out.filetype_device = true;
		Ok(())
	}

	fn statfs(&self, out: &mut StatFs) -> Result<()> {
		*out = StatFs::default();
		Ok(())
	}
}

pub struct DevFsFactory;

impl crate::fs::FsFactory for DevFsFactory {
	fn name(&self) -> &'static str {
		"devfs"
	}

	fn init(&self, _src_path: &str, _mount_point: &str) -> Result<Arc<dyn FsBackend>> {
		Ok(Arc::new(DevFs::new()))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn mknod_rejects_unregistered_driver() {
		let fs = DevFs::new();
		assert_eq!(
			fs.mknod("/i2c0", "no-such-driver", 0, 0),
			Err(Error::Enxio)
		);
	}

	#[test]
	fn mknod_then_remove_then_stat_is_enoent() {
		let fs = DevFs::new();
		crate::driver::test_support::register_null_driver(99, "testnull");
		fs.mknod("/null", "testnull", 99, 0).unwrap();
		let mut stat = Stat::default();
		assert!(fs.stat("/null", &mut stat).is_ok());
		fs.remove("/null").unwrap();
		assert_eq!(fs.stat("/null", &mut stat), Err(Error::Enoent));
	}
}
