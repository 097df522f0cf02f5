// SPDX-License-Identifier: GPL-2.0

//! Kernel prelude - commonly used types, traits, and logging macros.

pub use alloc::vec;
pub use alloc::{
	boxed::Box,
	collections::{BTreeMap, BTreeSet},
	format,
	string::{String, ToString},
	sync::Arc,
	vec::Vec,
};
pub use core::{
	fmt, mem,
	option::Option::{self, None, Some},
	ptr,
	result::Result as CoreResult,
	slice, str,
};

pub use crate::error::{Error, Result};
pub use crate::process::Process;
pub use crate::sync::{CriticalSection, KMutex, KQueue, KSemaphore};
pub use crate::types::*;

/// Raw console output, bypassing the leveled logger entirely.
#[macro_export]
macro_rules! print {
    ($($arg:tt)*) => ($crate::console::_print(format_args!($($arg)*)));
}

#[macro_export]
macro_rules! println {
    () => ($crate::print!("\n"));
    ($($arg:tt)*) => ($crate::print!("{}\n", format_args!($($arg)*)));
}

#[macro_export]
macro_rules! debug {
	($($arg:tt)*) => {
		$crate::logging::log($crate::logging::LogLevel::Debug, "kernel", &alloc::format!($($arg)*))
	};
}

#[macro_export]
macro_rules! info {
	($($arg:tt)*) => {
		$crate::logging::log($crate::logging::LogLevel::Info, "kernel", &alloc::format!($($arg)*))
	};
}

#[macro_export]
macro_rules! warn {
	($($arg:tt)*) => {
		$crate::logging::log($crate::logging::LogLevel::Warn, "kernel", &alloc::format!($($arg)*))
	};
}

#[macro_export]
macro_rules! error {
	($($arg:tt)*) => {
		$crate::logging::log($crate::logging::LogLevel::Error, "kernel", &alloc::format!($($arg)*))
	};
}
