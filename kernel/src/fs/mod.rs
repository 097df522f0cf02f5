// SPDX-License-Identifier: GPL-2.0

//! Filesystem backends (`SPEC_FULL` §4.5): devfs, procfs, eefs, ramfs, and
//! the static filesystem registry `mount(fs_name, ...)` looks names up in.

pub mod devfs;
pub mod eefs;
pub mod procfs;
pub mod ramfs;
pub mod registry;

use alloc::sync::Arc;

use crate::error::Result;
use crate::vfs::FsBackend;

/// A filesystem type's `init`, keyed by name in the static registry
/// (`spec` §6: "`fs_name` must match an entry in the static FS registry").
pub trait FsFactory: Send + Sync {
	fn name(&self) -> &'static str;

	fn init(&self, src_path: &str, mount_point: &str) -> Result<Arc<dyn FsBackend>>;
}
