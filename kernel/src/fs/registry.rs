// SPDX-License-Identifier: GPL-2.0

//! Static filesystem registry (`spec` §6, §9 "Global mutable state").

use alloc::sync::Arc;
use alloc::vec::Vec;

use super::FsFactory;

static REGISTRY: spin::Mutex<Vec<Arc<dyn FsFactory>>> = spin::Mutex::new(Vec::new());

pub fn register(factory: Arc<dyn FsFactory>) {
	let mut reg = REGISTRY.lock();
	if !reg.iter().any(|f| f.name() == factory.name()) {
		reg.push(factory);
	}
}

pub fn lookup(fs_name: &str) -> Option<Arc<dyn FsFactory>> {
	REGISTRY
		.lock()
		.iter()
		.find(|f| f.name() == fs_name)
		.cloned()
}

/// Register the four backends this crate ships. Called once at boot by
/// `kernel::initd`; tests call it directly since they do not run `initd`.
pub fn register_defaults() {
	register(Arc::new(super::ramfs::RamFsFactory));
	register(Arc::new(super::devfs::DevFsFactory));
	register(Arc::new(super::procfs::ProcFsFactory));
	register(Arc::new(super::eefs::EeFsFactory));
}
