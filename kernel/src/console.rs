// SPDX-License-Identifier: GPL-2.0

//! Console sink (`SPEC_FULL` ambient item M): a pluggable `Write`-style
//! sink the logger and `print!`/`println!` macros target. Real byte-level
//! output (UART, framebuffer) is architecture-specific MMIO, out of scope
//! per `spec.md` §1 — this module only owns sink registration and the
//! locking around it, following the teacher's `console.rs` shape without
//! its VGA/serial-port specifics.

use alloc::sync::Arc;
use core::fmt;

/// Where console bytes actually go. A board-support crate installs one of
/// these on real hardware via [`set_sink`]; `cfg(test)` installs a stdout
/// sink automatically so `#[cfg(test)]` code exercising logging has
/// somewhere to write.
pub trait ConsoleSink: Send + Sync {
	fn write_str(&self, s: &str);
}

static SINK: spin::Mutex<Option<Arc<dyn ConsoleSink>>> = spin::Mutex::new(None);

/// Install the byte sink. A later call replaces whatever was installed
/// before it; with nothing installed, console output is silently dropped
/// rather than panicking.
pub fn set_sink(sink: Arc<dyn ConsoleSink>) {
	*SINK.lock() = Some(sink);
}

pub fn write_str(s: &str) {
	if let Some(sink) = SINK.lock().as_ref() {
		sink.write_str(s);
	}
}

struct Adapter;

impl fmt::Write for Adapter {
	fn write_str(&mut self, s: &str) -> fmt::Result {
		write_str(s);
		Ok(())
	}
}

/// Target of the `print!`/`println!` macros (`kernel::prelude`).
pub fn _print(args: fmt::Arguments) {
	use fmt::Write;
	let _ = Adapter.write_fmt(args);
}

#[cfg(test)]
pub struct StdoutSink;

#[cfg(test)]
impl ConsoleSink for StdoutSink {
	fn write_str(&self, s: &str) {
		std::print!("{}", s);
	}
}

/// Install the `cfg(test)` default sink. Idempotent; safe to call from
/// every test's own `setup()`.
#[cfg(test)]
pub fn install_test_sink() {
	set_sink(Arc::new(StdoutSink));
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloc::sync::Arc;
	use alloc::vec::Vec;

	struct RecordingSink {
		buf: spin::Mutex<alloc::string::String>,
	}

	impl ConsoleSink for RecordingSink {
		fn write_str(&self, s: &str) {
			self.buf.lock().push_str(s);
		}
	}

	#[test]
	fn installed_sink_receives_written_bytes() {
		let sink = Arc::new(RecordingSink {
			buf: spin::Mutex::new(alloc::string::String::new()),
		});
		set_sink(sink.clone());
		write_str("hello");
		assert_eq!(&*sink.buf.lock(), "hello");
		let _: Vec<()> = Vec::new();
	}
}
