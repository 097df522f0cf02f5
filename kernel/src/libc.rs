// SPDX-License-Identifier: GPL-2.0

//! Minimal libc-style shims over the VFS (`SPEC_FULL` overview: "libc
//! shims"), grounded in the original's `<libc/dirent.h>`: a `DIR`-handle
//! wrapper around directory iteration, plus the path-splitting helpers
//! `basename`/`dirname` user programs expect from a POSIX-ish environment.

use alloc::string::String;

use crate::error::Result;
use crate::vfs::{self, DirEntry, OpenFlags};

/// Directory stream, the Rust shape of the original's opaque `DIR *`.
pub struct Dir {
	handle: vfs::DirHandle,
}

pub fn opendir(path: &str) -> Result<Dir> {
	Ok(Dir {
		handle: vfs::vfs().opendir(path)?,
	})
}

impl Dir {
	pub fn readdir(&self) -> Result<Option<DirEntry>> {
		self.handle.readdir()
	}

	pub fn rewinddir(&self) {
		self.handle.rewinddir()
	}

	pub fn telldir(&self) -> u64 {
		self.handle.telldir()
	}

	pub fn seekdir(&self, pos: u64) {
		self.handle.seekdir(pos)
	}
}

/// Read an entire file's content, growing the buffer as needed. Simple
/// shim over `open`/`read`/`close` for the common "slurp a config file"
/// case; user programs needing streaming I/O use `vfs::vfs().open`
/// directly.
pub fn read_to_string(path: &str) -> Result<String> {
	let file = vfs::vfs().open(path, OpenFlags::READ)?;
	let mut out = alloc::vec::Vec::new();
	let mut chunk = [0u8; 256];
	loop {
		let n = file.read(&mut chunk)?;
		if n == 0 {
			break;
		}
		out.extend_from_slice(&chunk[..n]);
	}
	String::from_utf8(out).map_err(|_| crate::error::Error::Einval)
}

/// Final path component, POSIX `basename(3)` semantics for the subset this
/// kernel needs: no trailing-slash stripping, no in-place mutation of the
/// input. `basename("/a/b")` is `"b"`; `basename("a")` is `"a"`.
pub fn basename(path: &str) -> &str {
	match path.rsplit_once('/') {
		Some((_, tail)) => tail,
		None => path,
	}
}

/// Everything before the final path component. `dirname("/a/b")` is
/// `"/a"`; `dirname("a")` is `"."`, matching POSIX `dirname(3)` for a
/// path with no directory separator.
pub fn dirname(path: &str) -> &str {
	match path.rsplit_once('/') {
		Some(("", _)) => "/",
		Some((head, _)) => head,
		None => ".",
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn basename_and_dirname_split_a_simple_path() {
		assert_eq!(basename("/a/b/c"), "c");
		assert_eq!(dirname("/a/b/c"), "/a/b");
	}

	#[test]
	fn basename_and_dirname_handle_no_separator() {
		assert_eq!(basename("c"), "c");
		assert_eq!(dirname("c"), ".");
	}

	#[test]
	fn dirname_of_top_level_path_is_root() {
		assert_eq!(dirname("/c"), "/");
	}

	#[test]
	fn opendir_and_read_to_string_round_trip() {
		crate::sched::host::install();
		crate::fs::registry::register_defaults();
		let v = vfs::Vfs::new();
		v.mount("ramfs", "", "/").unwrap();
		let f = v
			.open("/notes", OpenFlags::READ | OpenFlags::WRITE | OpenFlags::CREATE)
			.unwrap();
		f.write(b"hello").unwrap();
		drop(f);

		let content = {
			let file = v.open("/notes", OpenFlags::READ).unwrap();
			let mut out = alloc::string::String::new();
			let mut chunk = [0u8; 16];
			loop {
				let n = file.read(&mut chunk).unwrap();
				if n == 0 {
					break;
				}
				out.push_str(core::str::from_utf8(&chunk[..n]).unwrap());
			}
			out
		};
		assert_eq!(content, "hello");
	}
}
