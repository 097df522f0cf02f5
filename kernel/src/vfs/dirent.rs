// SPDX-License-Identifier: GPL-2.0

//! Directory iteration types (`spec` §4.4).

use alloc::string::String;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
	Regular,
	Directory,
	Device,
	Fifo,
}

/// One entry yielded by `readdir`. A `None` return from `readdir` is the
/// "name is null" terminator `spec` §4.4 describes.
#[derive(Debug, Clone)]
pub struct DirEntry {
	pub name: String,
	pub size: u64,
	pub filetype: FileType,
	pub dev: Option<(u32, u32)>,
}
