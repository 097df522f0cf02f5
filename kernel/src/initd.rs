// SPDX-License-Identifier: GPL-2.0

//! Process zero's boot sequence: register the static filesystem backends
//! and establish the mount order the original firmware always follows —
//! mount a root filesystem before anything that lives under it can be
//! created (`SPEC_FULL` §4.5 SUPPLEMENT). A board-support binary calls
//! [`boot`] once, after installing its `SchedulerOps` binding
//! (`kernel::sched::install`) and before spawning any user program.

use crate::error::Result;
use crate::fs::registry;
use crate::types::Mode;
use crate::vfs::vfs;

const DEFAULT_DIR_MODE: Mode = 0o755;

/// Mount the root ramfs, then `/dev` (devfs) and `/proc` (procfs) under it.
///
/// Idempotent only in the sense that a second call re-mounts on top of the
/// first; callers are expected to invoke this exactly once, matching the
/// original's single `initd` entry point.
pub fn boot() -> Result<()> {
	registry::register_defaults();

	vfs().mount("ramfs", "", "/")?;
	crate::info!("mounted ramfs at /");

	vfs().mkdir("/dev", DEFAULT_DIR_MODE)?;
	vfs().mount("devfs", "", "/dev")?;
	crate::info!("mounted devfs at /dev");

	vfs().mkdir("/proc", DEFAULT_DIR_MODE)?;
	vfs().mount("procfs", "", "/proc")?;
	crate::info!("mounted procfs at /proc");

	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::sched::host;
	use crate::vfs::OpenFlags;

	#[test]
	fn boot_establishes_dev_and_proc_under_root() {
		host::install();
		boot().unwrap();

		let f = vfs()
			.open("/hello", OpenFlags::READ | OpenFlags::WRITE | OpenFlags::CREATE)
			.unwrap();
		f.write(b"hi").unwrap();
		drop(f);

		vfs().opendir("/dev").unwrap();
		vfs().opendir("/proc").unwrap();
	}
}
