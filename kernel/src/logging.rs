// SPDX-License-Identifier: GPL-2.0

//! Kernel logging (`SPEC_FULL` ambient item L): a small ring-buffer,
//! level-filtered logger in the teacher's bespoke style — not the `log`
//! crate, since the teacher never depends on it and this kernel has no
//! allocator available at the point the earliest boot messages are logged.
//! Simplified from the teacher's version: no per-CPU/per-pid tagging (this
//! kernel is single-core, and `process::current_process_pid` would require
//! the scheduler to already be installed before the first log line could be
//! emitted), and timestamps are a monotonic sequence counter rather than a
//! jiffies read, so logging works before `sched::install` runs.

use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
	Error = 0,
	Warn = 1,
	Info = 2,
	Debug = 3,
}

impl LogLevel {
	pub fn as_str(&self) -> &'static str {
		match self {
			LogLevel::Error => "ERROR",
			LogLevel::Warn => "WARN",
			LogLevel::Info => "INFO",
			LogLevel::Debug => "DEBUG",
		}
	}
}

#[derive(Debug, Clone)]
pub struct LogEntry {
	pub level: LogLevel,
	pub seq: u64,
	pub module: String,
	pub message: String,
}

impl LogEntry {
	pub fn format(&self) -> String {
		format!("[{:>5}] [{:>6}] {}: {}\n", self.level.as_str(), self.seq, self.module, self.message)
	}
}

#[derive(Debug)]
pub struct LoggerConfig {
	pub min_level: LogLevel,
	pub max_entries: usize,
	pub console_output: bool,
}

impl LoggerConfig {
	pub fn new() -> Self {
		Self {
			min_level: LogLevel::Info,
			max_entries: 512,
			console_output: true,
		}
	}

	pub fn with_level(mut self, level: LogLevel) -> Self {
		self.min_level = level;
		self
	}

	pub fn with_max_entries(mut self, max: usize) -> Self {
		self.max_entries = max;
		self
	}
}

impl Default for LoggerConfig {
	fn default() -> Self {
		Self::new()
	}
}

#[derive(Debug, Default)]
pub struct LogStats {
	pub total_entries: u64,
	pub entries_by_level: [u64; 4],
	pub dropped_entries: u64,
}

pub struct KernelLogger {
	config: LoggerConfig,
	entries: Vec<LogEntry>,
	stats: LogStats,
}

static SEQ: AtomicU64 = AtomicU64::new(0);

impl KernelLogger {
	pub const fn new() -> Self {
		Self {
			config: LoggerConfig {
				min_level: LogLevel::Info,
				max_entries: 512,
				console_output: true,
			},
			entries: Vec::new(),
			stats: LogStats {
				total_entries: 0,
				entries_by_level: [0; 4],
				dropped_entries: 0,
			},
		}
	}

	pub fn init(&mut self, config: LoggerConfig) {
		self.config = config;
	}

	pub fn log(&mut self, level: LogLevel, module: &str, message: &str) {
		if level > self.config.min_level {
			return;
		}

		let entry = LogEntry {
			level,
			seq: SEQ.fetch_add(1, Ordering::Relaxed),
			module: module.to_string(),
			message: message.to_string(),
		};

		self.stats.total_entries += 1;
		self.stats.entries_by_level[level as usize] += 1;

		if self.config.console_output {
			crate::console::write_str(&entry.format());
		}

		if self.entries.len() >= self.config.max_entries {
			self.entries.remove(0);
			self.stats.dropped_entries += 1;
		}
		self.entries.push(entry);
	}

	pub fn entries(&self) -> &[LogEntry] {
		&self.entries
	}

	pub fn clear(&mut self) {
		self.entries.clear();
	}

	pub fn stats(&self) -> &LogStats {
		&self.stats
	}

	pub fn set_level(&mut self, level: LogLevel) {
		self.config.min_level = level;
	}
}

impl Default for KernelLogger {
	fn default() -> Self {
		Self::new()
	}
}

static KERNEL_LOGGER: spin::Mutex<KernelLogger> = spin::Mutex::new(KernelLogger::new());

pub fn init_logging(config: LoggerConfig) {
	KERNEL_LOGGER.lock().init(config);
	log(LogLevel::Info, "logging", "kernel logging initialized");
}

pub fn log(level: LogLevel, module: &str, message: &str) {
	KERNEL_LOGGER.lock().log(level, module, message);
}

pub fn set_log_level(level: LogLevel) {
	KERNEL_LOGGER.lock().set_level(level);
}

pub fn get_log_stats() -> LogStats {
	let logger = KERNEL_LOGGER.lock();
	LogStats {
		total_entries: logger.stats().total_entries,
		entries_by_level: logger.stats().entries_by_level,
		dropped_entries: logger.stats().dropped_entries,
	}
}

pub fn clear_log_buffer() {
	KERNEL_LOGGER.lock().clear();
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn entries_below_min_level_are_filtered() {
		let mut logger = KernelLogger::new();
		logger.init(LoggerConfig::new().with_level(LogLevel::Warn).with_max_entries(8));
		logger.log(LogLevel::Debug, "test", "should be dropped");
		logger.log(LogLevel::Error, "test", "should be kept");
		assert_eq!(logger.entries().len(), 1);
		assert_eq!(logger.entries()[0].message, "should be kept");
	}

	#[test]
	fn ring_buffer_evicts_oldest_when_full() {
		let mut logger = KernelLogger::new();
		logger.init(LoggerConfig::new().with_level(LogLevel::Debug).with_max_entries(2));
		logger.log(LogLevel::Info, "t", "first");
		logger.log(LogLevel::Info, "t", "second");
		logger.log(LogLevel::Info, "t", "third");
		assert_eq!(logger.entries().len(), 2);
		assert_eq!(logger.entries()[0].message, "second");
		assert_eq!(logger.stats().dropped_entries, 1);
	}
}
