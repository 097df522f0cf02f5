// SPDX-License-Identifier: GPL-2.0

//! RAM-backed filesystem, the default root mounted before any real storage
//! is available (`SPEC_FULL` §4.5 SUPPLEMENT). Adapted from the teacher's
//! inode-table `ramfs.rs`: a table of nodes keyed by inode number, each
//! directory holding its children's names, rather than an in-memory map
//! flattened by path.

use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicU64, Ordering};

use crate::error::{Error, Result};
use crate::types::{Gid, Mode, Uid};
use crate::vfs::backend::{filetype_of, Stat, StatFs};
use crate::vfs::dirent::DirEntry;
use crate::vfs::{FsBackend, FsDirHandle, FsHandle, OpenFlags};

enum NodeBody {
	File(Vec<u8>),
	Dir(BTreeMap<String, u64>),
}

struct Node {
	body: NodeBody,
	mode: Mode,
	uid: Uid,
	gid: Gid,
}

type NodeTable = Arc<spin::Mutex<BTreeMap<u64, Node>>>;

pub struct RamFs {
	next_ino: AtomicU64,
	nodes: NodeTable,
}

const ROOT_INO: u64 = 1;

impl RamFs {
	pub fn new() -> Self {
		let mut nodes = BTreeMap::new();
		nodes.insert(
			ROOT_INO,
			Node {
				body: NodeBody::Dir(BTreeMap::new()),
				mode: 0o755,
				uid: 0,
				gid: 0,
			},
		);
		Self {
			next_ino: AtomicU64::new(ROOT_INO + 1),
			nodes: Arc::new(spin::Mutex::new(nodes)),
		}
	}

	fn alloc_ino(&self) -> u64 {
		self.next_ino.fetch_add(1, Ordering::Relaxed)
	}

	/// Resolve an absolute path (already relative to this mount) to an
	/// inode number, walking one component at a time from the root.
	fn resolve(&self, path: &str) -> Result<u64> {
		let mut ino = ROOT_INO;
		for comp in path.split('/').filter(|c| !c.is_empty()) {
			let nodes = self.nodes.lock();
			let dir = nodes.get(&ino).ok_or(Error::Enoent)?;
			match &dir.body {
				NodeBody::Dir(children) => {
					ino = *children.get(comp).ok_or(Error::Enoent)?;
				}
				NodeBody::File(_) => return Err(Error::Enoent),
			}
		}
		Ok(ino)
	}

	fn parent_and_leaf(path: &str) -> (&str, &str) {
		match path.trim_end_matches('/').rsplit_once('/') {
			Some((parent, leaf)) if !parent.is_empty() => (parent, leaf),
			Some((_, leaf)) => ("/", leaf),
			None => ("/", path),
		}
	}

	fn create(&self, path: &str, body: NodeBody, mode: Mode) -> Result<u64> {
		let (parent_path, leaf) = Self::parent_and_leaf(path);
		if leaf.is_empty() {
			return Err(Error::Einval);
		}
		let parent_ino = self.resolve(parent_path)?;
		let ino = self.alloc_ino();
		let mut nodes = self.nodes.lock();
		{
			let parent = nodes.get_mut(&parent_ino).ok_or(Error::Enoent)?;
			match &mut parent.body {
				NodeBody::Dir(children) => {
					if children.contains_key(leaf) {
						return Err(Error::Eexist);
					}
					children.insert(leaf.to_string(), ino);
				}
				NodeBody::File(_) => return Err(Error::Enoent),
			}
		}
		nodes.insert(
			ino,
			Node {
				body,
				mode,
				uid: 0,
				gid: 0,
			},
		);
		Ok(ino)
	}
}

impl Default for RamFs {
	fn default() -> Self {
		Self::new()
	}
}

struct RamFile {
	nodes: NodeTable,
	ino: u64,
}

impl FsHandle for RamFile {
	fn read(&self, buf: &mut [u8], offset: u64) -> Result<usize> {
		let nodes = self.nodes.lock();
		let node = nodes.get(&self.ino).ok_or(Error::Enoent)?;
		match &node.body {
			NodeBody::File(data) => {
				let offset = offset as usize;
				if offset >= data.len() {
					return Ok(0);
				}
				let n = (data.len() - offset).min(buf.len());
				buf[..n].copy_from_slice(&data[offset..offset + n]);
				Ok(n)
			}
			NodeBody::Dir(_) => Err(Error::Einval),
		}
	}

	fn write(&self, buf: &[u8], offset: u64) -> Result<usize> {
		let mut nodes = self.nodes.lock();
		let node = nodes.get_mut(&self.ino).ok_or(Error::Enoent)?;
		match &mut node.body {
			NodeBody::File(data) => {
				let offset = offset as usize;
				if data.len() < offset + buf.len() {
					data.resize(offset + buf.len(), 0);
				}
				data[offset..offset + buf.len()].copy_from_slice(buf);
				Ok(buf.len())
			}
			NodeBody::Dir(_) => Err(Error::Einval),
		}
	}

	fn fstat(&self, out: &mut Stat) -> Result<()> {
		let nodes = self.nodes.lock();
		let node = nodes.get(&self.ino).ok_or(Error::Enoent)?;
		out.size = match &node.body {
			NodeBody::File(data) => data.len() as u64,
			NodeBody::Dir(_) => 0,
		};
		out.mode = node.mode;
		out.uid = node.uid;
		out.gid = node.gid;
		Ok(())
	}
}

struct RamDir {
	nodes: NodeTable,
	ino: u64,
}

impl FsDirHandle for RamDir {
	fn readdir(&self, pos: u64) -> Result<Option<DirEntry>> {
		let nodes = self.nodes.lock();
		let node = nodes.get(&self.ino).ok_or(Error::Enoent)?;
		match &node.body {
			NodeBody::Dir(children) => {
				let Some((name, child_ino)) = children.iter().nth(pos as usize) else {
					return Ok(None);
				};
				let child = nodes.get(child_ino).ok_or(Error::Enoent)?;
				let (size, is_dir) = match &child.body {
					NodeBody::File(data) => (data.len() as u64, false),
					NodeBody::Dir(_) => (0, true),
				};
				let mut stat = Stat::default();
				stat.size = size;
				Ok(Some(DirEntry {
					name: name.clone(),
					size,
					filetype: filetype_of(&stat, is_dir, false),
					dev: None,
				}))
			}
			NodeBody::File(_) => Err(Error::Einval),
		}
	}
}

impl FsBackend for RamFs {
	fn open(&self, path: &str, flags: OpenFlags) -> Result<Arc<dyn FsHandle>> {
		let ino = match self.resolve(path) {
			Ok(ino) => ino,
			Err(Error::Enoent) if flags.contains(OpenFlags::CREATE) => self
				.create(path, NodeBody::File(Vec::new()), 0o644)
				.map_err(|_| Error::Enoent)?,
			Err(e) => return Err(e),
		};
		Ok(Arc::new(RamFile {
			nodes: self.nodes.clone(),
			ino,
		}))
	}

	fn opendir(&self, path: &str) -> Result<Arc<dyn FsDirHandle>> {
		let ino = self.resolve(path)?;
		Ok(Arc::new(RamDir {
			nodes: self.nodes.clone(),
			ino,
		}))
	}

	fn stat(&self, path: &str, out: &mut Stat) -> Result<()> {
		let ino = self.resolve(path)?;
		let nodes = self.nodes.lock();
		let node = nodes.get(&ino).ok_or(Error::Enoent)?;
		let is_dir = matches!(node.body, NodeBody::Dir(_));
		out.size = match &node.body {
			NodeBody::File(data) => data.len() as u64,
			NodeBody::Dir(_) => 0,
		};
		out.mode = node.mode;
		out.uid = node.uid;
		out.gid = node.gid;
		out.filetype_device = false;
		let _ = is_dir;
		Ok(())
	}

	fn statfs(&self, out: &mut StatFs) -> Result<()> {
		*out = StatFs {
			block_size: 512,
			blocks_total: u64::MAX,
			blocks_free: u64::MAX,
			files_total: u64::MAX,
			files_free: u64::MAX,
		};
		Ok(())
	}

	fn mkdir(&self, path: &str, mode: Mode) -> Result<()> {
		self.create(path, NodeBody::Dir(BTreeMap::new()), mode)?;
		Ok(())
	}

	fn mkfifo(&self, path: &str, mode: Mode) -> Result<()> {
		self.create(path, NodeBody::File(Vec::new()), mode)?;
		Ok(())
	}

	fn remove(&self, path: &str) -> Result<()> {
		let (parent_path, leaf) = Self::parent_and_leaf(path);
		let parent_ino = self.resolve(parent_path)?;
		let mut nodes = self.nodes.lock();
		let removed_ino = {
			let parent = nodes.get_mut(&parent_ino).ok_or(Error::Enoent)?;
			match &mut parent.body {
				NodeBody::Dir(children) => children.remove(leaf).ok_or(Error::Enoent)?,
				NodeBody::File(_) => return Err(Error::Enoent),
			}
		};
		nodes.remove(&removed_ino);
		Ok(())
	}

	fn chmod(&self, path: &str, mode: Mode) -> Result<()> {
		let ino = self.resolve(path)?;
		let mut nodes = self.nodes.lock();
		nodes.get_mut(&ino).ok_or(Error::Enoent)?.mode = mode;
		Ok(())
	}

	fn chown(&self, path: &str, uid: Uid, gid: Gid) -> Result<()> {
		let ino = self.resolve(path)?;
		let mut nodes = self.nodes.lock();
		let node = nodes.get_mut(&ino).ok_or(Error::Enoent)?;
		node.uid = uid;
		node.gid = gid;
		Ok(())
	}
}

pub struct RamFsFactory;

impl crate::fs::FsFactory for RamFsFactory {
	fn name(&self) -> &'static str {
		"ramfs"
	}

	fn init(&self, _src_path: &str, _mount_point: &str) -> Result<Arc<dyn FsBackend>> {
		Ok(Arc::new(RamFs::new()))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::vfs::backend::OpenFlags;

	#[test]
	fn mkdir_then_readdir_lists_entry() {
		let fs: Arc<RamFs> = Arc::new(RamFs::new());
		let backend: Arc<dyn FsBackend> = fs.clone();
		backend.mkdir("/sub", 0o755).unwrap();
		let dir = backend.opendir("/").unwrap();
		let mut names = Vec::new();
		let mut pos = 0u64;
		while let Some(entry) = dir.readdir(pos).unwrap() {
			names.push(entry.name);
			pos += 1;
		}
		assert_eq!(names, alloc::vec!["sub".to_string()]);
	}

	#[test]
	fn write_then_read_roundtrip() {
		let fs: Arc<RamFs> = Arc::new(RamFs::new());
		let backend: Arc<dyn FsBackend> = fs.clone();
		let file = backend
			.open("/a", OpenFlags::READ | OpenFlags::WRITE | OpenFlags::CREATE)
			.unwrap();
		assert_eq!(file.write(b"abc", 0).unwrap(), 3);
		let mut buf = [0u8; 3];
		assert_eq!(file.read(&mut buf, 0).unwrap(), 3);
		assert_eq!(&buf, b"abc");
	}

	#[test]
	fn remove_then_stat_is_enoent() {
		let fs: Arc<RamFs> = Arc::new(RamFs::new());
		let backend: Arc<dyn FsBackend> = fs.clone();
		backend
			.open("/a", OpenFlags::WRITE | OpenFlags::CREATE)
			.unwrap();
		backend.remove("/a").unwrap();
		let mut stat = Stat::default();
		assert_eq!(backend.stat("/a", &mut stat), Err(Error::Enoent));
	}
}
