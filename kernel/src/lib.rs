// SPDX-License-Identifier: GPL-2.0

//! RTOS kernel core: process manager, resource registry, VFS and
//! filesystem backends, driver framework, I²C master core, sync
//! primitives, and a scheduler binding trait external collaborators
//! implement. Production targets build this crate `no_std + alloc`;
//! `cargo test` runs it under `std` (`SPEC_FULL` ambient item N) so the
//! whole suite exercises real concurrent tasks via `kernel::sched::host`
//! without any hardware. The `test-support` feature flips on the same
//! `std` build outside `cfg(test)`, for the `drivers` crate's own tests to
//! reach `kernel::sched::host` across the crate boundary.

#![cfg_attr(not(any(test, feature = "test-support")), no_std)]

extern crate alloc;

pub mod console;
pub mod driver;
pub mod error;
pub mod fs;
pub mod i2c;
pub mod initd;
pub mod libc;
pub mod logging;
pub mod panic;
pub mod prelude;
pub mod process;
pub mod resource;
pub mod sched;
pub mod sync;
pub mod types;
pub mod vfs;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = "rtos-kernel";
