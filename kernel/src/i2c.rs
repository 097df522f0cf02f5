// SPDX-License-Identifier: GPL-2.0

//! I²C master core (`spec` §4.7): per-port ownership lock, the five-step
//! write state machine, the read-side REPEATED-START/POS/early-ACK special
//! cases for `n==1`/`n==2`/`n>=3`, and error classification with forced bus
//! recovery. Register-level access sits behind [`I2cBus`] — the
//! architecture-specific MMIO/NVIC access `spec.md` §1 excludes from scope;
//! this module is the *state machine*, never a register.
//!
//! **(SUPPLEMENT, from `original_source/.../i2c_lld.c`)** The original's
//! `IRQ_EV_handler`/`IRQ_ER_handler` split interrupt-driven completion from
//! polled completion: events land `event_sem` and the foreground call
//! blocks on it. [`I2cPort::wait_event`] reproduces the same two-path shape
//! — [`I2cBus::irq_driven`] true means block on `event_sem`; false means
//! poll [`I2cBus::poll_event`] directly.

use core::sync::atomic::{AtomicU32, Ordering};

use crate::error::{Error, Result};
use crate::sched::{self, TaskHandle};
use crate::sync::KSemaphore;

/// Timeout for each state-machine step (`spec` §4.7 step 1's `T`). Not
/// configurable per port — the original peripheral driver hard-codes its
/// own bus-timeout constant the same way.
const STEP_TIMEOUT_MS: u32 = 1000;

/// The six classified error kinds (`spec` §4.7 "Error classification").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum I2cError {
	Timeout,
	Overrun,
	AckFailure,
	ArbLost,
	BusError,
	Generic,
}

impl I2cError {
	/// `spec` §6: "I²C classified errors → EIO/ETIME/EACCES as
	/// appropriate". `AckFailure` (a NACK from the slave) maps to
	/// `EACCES`; every other classified kind is `EIO`.
	fn to_errno(self) -> Error {
		match self {
			I2cError::Timeout => Error::Etime,
			I2cError::AckFailure => Error::Eacces,
			I2cError::Overrun | I2cError::ArbLost | I2cError::BusError | I2cError::Generic => Error::Eio,
		}
	}
}

/// A hardware event as the status register would report it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusEvent {
	/// START condition generated (SB).
	Sb,
	/// Address phase acknowledged (ADDR).
	Addr,
	/// Byte transfer finished (BTF).
	Btf,
	/// Transmit data register empty (TXE).
	Txe,
	/// Receive data register not empty (RXNE).
	Rxne,
	Error(I2cError),
}

/// Register-level access the driver needs, abstracted away from any real
/// MMIO/NVIC so the state machine in this module can be tested on a host.
pub trait I2cBus: Send + Sync {
	fn generate_start(&self);
	fn generate_stop(&self);
	/// `addr7` is the 7-bit slave address; `read` selects the R/W bit.
	fn send_address(&self, addr7: u8, read: bool);
	fn send_byte(&self, byte: u8);
	fn read_byte(&self) -> u8;
	/// Clear ADDR by the read-SR1-then-SR2 dance real silicon requires.
	fn clear_addr_by_read_sr(&self);
	fn set_ack(&self, enable: bool);
	/// POS bit: selects which of the last two bytes NACK applies to.
	fn set_pos(&self, enable: bool);
	/// Non-blocking status poll. `None` means nothing new since the last
	/// poll.
	fn poll_event(&self) -> Option<BusEvent>;
	/// When true, completion is signalled by an interrupt landing the
	/// port's `event_sem` rather than by polling this trait directly.
	fn irq_driven(&self) -> bool {
		false
	}
	/// Reset status and re-initialize the peripheral after an aborted
	/// transaction (`spec` §4.7 "re-initializes the peripheral").
	fn reinit(&self);
}

struct PortState {
	owner: Option<TaskHandle>,
	slave_addr: u8,
	scl_hz: u32,
	use_dma: bool,
	last_error: Option<I2cError>,
}

/// One I²C port (`spec` §4.7: `{addr_base, task_handle_of_owner, lock_state,
/// slave_addr, scl_hz, event_sem, error_code, use_dma}`).
pub struct I2cPort {
	bus: alloc::sync::Arc<dyn I2cBus>,
	state: spin::Mutex<PortState>,
	event_sem: KSemaphore,
}

impl I2cPort {
	pub fn new(bus: alloc::sync::Arc<dyn I2cBus>) -> Self {
		Self {
			bus,
			state: spin::Mutex::new(PortState {
				owner: None,
				slave_addr: 0,
				scl_hz: 100_000,
				use_dma: false,
				last_error: None,
			}),
			event_sem: KSemaphore::binary(false),
		}
	}

	/// Port ownership is a single slot. A second opener — a different
	/// task, while one already holds it — is `PORTLOCKED`, which `spec`
	/// §6 maps to `EBUSY`.
	pub fn open(&self) -> Result<()> {
		let current = sched::current().current_task();
		let mut st = self.state.lock();
		match st.owner {
			None => {
				st.owner = Some(current);
				Ok(())
			}
			Some(t) if t == current => Ok(()),
			Some(_) => Err(Error::Ebusy),
		}
	}

	pub fn close(&self) -> Result<()> {
		let current = sched::current().current_task();
		let mut st = self.state.lock();
		match st.owner {
			Some(t) if t == current => {
				st.owner = None;
				Ok(())
			}
			_ => Err(Error::Eacces),
		}
	}

	pub fn set_slave_addr(&self, addr7: u8) -> Result<()> {
		self.check_owner()?;
		self.state.lock().slave_addr = addr7;
		Ok(())
	}

	pub fn set_scl_freq(&self, hz: u32) -> Result<()> {
		self.check_owner()?;
		self.state.lock().scl_hz = hz;
		Ok(())
	}

	pub fn set_use_dma(&self, enabled: bool) -> Result<()> {
		self.check_owner()?;
		self.state.lock().use_dma = enabled;
		Ok(())
	}

	pub fn get_status(&self) -> Option<I2cError> {
		self.state.lock().last_error
	}

	/// "Subsequent operations check that identity and fail with EACCES /
	/// PORTLOCKED if it does not match" (`spec` §4.7): an unopened port
	/// is `EACCES` (no session at all); a port held by a different task
	/// is `EBUSY` (PORTLOCKED).
	fn check_owner(&self) -> Result<()> {
		let current = sched::current().current_task();
		match self.state.lock().owner {
			Some(t) if t == current => Ok(()),
			Some(_) => Err(Error::Ebusy),
			None => Err(Error::Eacces),
		}
	}

	fn wait_event(&self, timeout_ms: u32) -> Result<BusEvent> {
		if self.bus.irq_driven() {
			self.event_sem.wait(timeout_ms).map_err(|_| Error::Etime)?;
			self.bus.poll_event().ok_or(Error::Eio)
		} else {
			match crate::sync::poll_wait(timeout_ms, || self.bus.poll_event()) {
				crate::error::WaitResult::Signalled(ev) => Ok(ev),
				crate::error::WaitResult::TimedOut => Err(Error::Etime),
			}
		}
	}

	fn expect(&self, want: BusEvent) -> Result<()> {
		match self.wait_event(STEP_TIMEOUT_MS) {
			Ok(ev) if ev == want => Ok(()),
			Ok(BusEvent::Error(e)) => Err(self.fail(e)),
			Ok(_) => Err(self.fail(I2cError::Generic)),
			Err(Error::Etime) => Err(self.fail(I2cError::Timeout)),
			Err(e) => Err(self.fail_errno(e)),
		}
	}

	/// Wait for one of TXE/BTF — real silicon can report either
	/// depending on timing, and `spec` §4.7 step 3/4 treat them
	/// interchangeably ("wait BTF/TXE").
	fn expect_txe_or_btf(&self) -> Result<()> {
		match self.wait_event(STEP_TIMEOUT_MS) {
			Ok(BusEvent::Txe) | Ok(BusEvent::Btf) => Ok(()),
			Ok(BusEvent::Error(e)) => Err(self.fail(e)),
			Ok(_) => Err(self.fail(I2cError::Generic)),
			Err(Error::Etime) => Err(self.fail(I2cError::Timeout)),
			Err(e) => Err(self.fail_errno(e)),
		}
	}

	/// Classified-error path: latch the code, force STOP, reset status,
	/// and re-init the peripheral (`spec` §4.7 "Error classification"),
	/// then return the mapped errno.
	fn fail(&self, err: I2cError) -> Error {
		self.state.lock().last_error = Some(err);
		self.bus.generate_stop();
		self.bus.reinit();
		err.to_errno()
	}

	fn fail_errno(&self, err: Error) -> Error {
		self.state.lock().last_error = Some(I2cError::Generic);
		self.bus.generate_stop();
		self.bus.reinit();
		err
	}

	/// `write(buf, n, subaddr)` — the five-step state machine (`spec`
	/// §4.7 steps 1–5).
	pub fn write(&self, buf: &[u8], subaddr: u8) -> Result<usize> {
		self.check_owner()?;
		let addr = self.state.lock().slave_addr;

		self.bus.generate_start();
		self.expect(BusEvent::Sb)?;

		self.bus.send_address(addr, false);
		self.expect(BusEvent::Addr)?;

		self.bus.clear_addr_by_read_sr();
		self.bus.send_byte(subaddr);
		self.expect_txe_or_btf()?;

		for (i, byte) in buf.iter().enumerate() {
			self.bus.send_byte(*byte);
			let last = i + 1 == buf.len();
			if last {
				self.expect(BusEvent::Btf)?;
			} else {
				self.expect_txe_or_btf()?;
			}
		}

		self.bus.generate_stop();
		Ok(buf.len())
	}

	/// `read(buf, n, subaddr)` — steps 1–3 are shared with `write`
	/// (register-pointer preamble), then the read side diverges at a
	/// REPEATED-START (`spec` §4.7 "for reads the machine diverges after
	/// step 3").
	pub fn read(&self, buf: &mut [u8], subaddr: u8) -> Result<usize> {
		self.check_owner()?;
		let (addr, use_dma) = {
			let st = self.state.lock();
			(st.slave_addr, st.use_dma)
		};
		let n = buf.len();

		self.bus.generate_start();
		self.expect(BusEvent::Sb)?;

		self.bus.send_address(addr, false);
		self.expect(BusEvent::Addr)?;

		self.bus.clear_addr_by_read_sr();
		self.bus.send_byte(subaddr);
		self.expect_txe_or_btf()?;

		// "For n == 1 ACK is cleared before address-ACK is cleared" —
		// done now, before the repeated start, so it is already in
		// effect when ADDR fires for the read address below.
		if n == 1 {
			self.bus.set_ack(false);
		}

		self.bus.generate_start();
		self.expect(BusEvent::Sb)?;

		self.bus.send_address(addr, true);
		self.expect(BusEvent::Addr)?;

		if n == 0 {
			self.bus.clear_addr_by_read_sr();
			self.bus.generate_stop();
		} else if n == 1 {
			self.bus.clear_addr_by_read_sr();
			self.expect(BusEvent::Rxne)?;
			self.bus.generate_stop();
			buf[0] = self.bus.read_byte();
		} else if n == 2 {
			// The POS sequence: POS+ACK configured before ADDR is
			// cleared, STOP generated immediately after, both bytes
			// read once BTF reports the pair is ready.
			self.bus.set_pos(true);
			self.bus.set_ack(false);
			self.bus.clear_addr_by_read_sr();
			self.bus.generate_stop();
			self.expect(BusEvent::Btf)?;
			buf[0] = self.bus.read_byte();
			buf[1] = self.bus.read_byte();
		} else if use_dma {
			self.bus.clear_addr_by_read_sr();
			// The original driver's DMA completion callback issues
			// STOP once the whole transfer lands; modeled here as one
			// wait covering the entire buffer.
			self.expect(BusEvent::Rxne)?;
			for slot in buf.iter_mut() {
				*slot = self.bus.read_byte();
			}
			self.bus.generate_stop();
		} else {
			self.bus.clear_addr_by_read_sr();
			for i in 0..n {
				if i == n - 2 {
					self.bus.set_ack(false);
				}
				if i == n - 1 {
					self.bus.generate_stop();
				}
				self.expect(BusEvent::Rxne)?;
				buf[i] = self.bus.read_byte();
			}
		}

		Ok(n)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloc::collections::VecDeque;
	use alloc::format;
	use alloc::string::String;
	use alloc::sync::Arc;
	use alloc::vec::Vec;

	struct MockI2cBus {
		events: spin::Mutex<VecDeque<BusEvent>>,
		read_bytes: spin::Mutex<VecDeque<u8>>,
		log: spin::Mutex<Vec<String>>,
		start_count: AtomicU32,
	}

	impl MockI2cBus {
		fn new(events: Vec<BusEvent>, read_bytes: Vec<u8>) -> Self {
			Self {
				events: spin::Mutex::new(events.into()),
				read_bytes: spin::Mutex::new(read_bytes.into()),
				log: spin::Mutex::new(Vec::new()),
				start_count: AtomicU32::new(0),
			}
		}

		fn log(&self) -> Vec<String> {
			self.log.lock().clone()
		}
	}

	impl I2cBus for MockI2cBus {
		fn generate_start(&self) {
			let n = self.start_count.fetch_add(1, Ordering::Relaxed);
			self.log.lock().push(if n == 0 { "Start".into() } else { "RepStart".into() });
		}

		fn generate_stop(&self) {
			self.log.lock().push("Stop".into());
		}

		fn send_address(&self, addr7: u8, read: bool) {
			let byte = (addr7 << 1) | read as u8;
			self.log.lock().push(format!("Addr({:#04x})", byte));
		}

		fn send_byte(&self, byte: u8) {
			self.log.lock().push(format!("SubAddr({:#04x})", byte));
		}

		fn read_byte(&self) -> u8 {
			self.read_bytes.lock().pop_front().unwrap_or(0)
		}

		fn clear_addr_by_read_sr(&self) {}
		fn set_ack(&self, _enable: bool) {}
		fn set_pos(&self, _enable: bool) {}

		fn poll_event(&self) -> Option<BusEvent> {
			let ev = self.events.lock().pop_front();
			if matches!(ev, Some(BusEvent::Rxne)) {
				self.log.lock().push("RxNE".into());
			}
			ev
		}

		fn reinit(&self) {
			self.log.lock().push("Reinit".into());
		}
	}

	fn setup() {
		crate::sched::host::install();
	}

	#[test]
	fn register_read_of_one_byte_follows_the_spec_trace() {
		setup();
		let bus = Arc::new(MockI2cBus::new(
			alloc::vec![
				BusEvent::Sb,
				BusEvent::Addr,
				BusEvent::Btf,
				BusEvent::Sb,
				BusEvent::Addr,
				BusEvent::Rxne,
			],
			alloc::vec![0x80],
		));
		let port = I2cPort::new(bus.clone());
		port.open().unwrap();
		port.set_slave_addr(0x68).unwrap();

		let mut buf = [0u8; 1];
		let n = port.read(&mut buf, 0x00).unwrap();

		assert_eq!(n, 1);
		assert_eq!(buf[0], 0x80);
		assert_eq!(
			bus.log(),
			alloc::vec![
				"Start".to_string(),
				"Addr(0xd0)".to_string(),
				"SubAddr(0x00)".to_string(),
				"RepStart".to_string(),
				"Addr(0xd1)".to_string(),
				"RxNE".to_string(),
				"Stop".to_string(),
			]
		);
	}

	#[test]
	fn write_completes_start_to_stop() {
		setup();
		let bus = Arc::new(MockI2cBus::new(
			alloc::vec![BusEvent::Sb, BusEvent::Addr, BusEvent::Txe, BusEvent::Btf],
			Vec::new(),
		));
		let port = I2cPort::new(bus.clone());
		port.open().unwrap();
		port.set_slave_addr(0x50).unwrap();

		assert_eq!(port.write(&[0xaa], 0x10).unwrap(), 1);
		assert_eq!(bus.log().last().unwrap(), "Stop");
	}

	#[test]
	fn ack_failure_classifies_as_eacces_and_leaves_bus_idle() {
		setup();
		let bus = Arc::new(MockI2cBus::new(
			alloc::vec![BusEvent::Sb, BusEvent::Error(I2cError::AckFailure)],
			Vec::new(),
		));
		let port = I2cPort::new(bus.clone());
		port.open().unwrap();
		port.set_slave_addr(0x10).unwrap();

		assert_eq!(port.write(&[0x01], 0x00).unwrap_err(), Error::Eacces);
		assert_eq!(port.get_status(), Some(I2cError::AckFailure));
		assert!(bus.log().contains(&"Stop".to_string()));
		assert!(bus.log().contains(&"Reinit".to_string()));
	}

	#[test]
	fn step_timeout_classifies_as_etime() {
		setup();
		let bus = Arc::new(MockI2cBus::new(Vec::new(), Vec::new()));
		let port = I2cPort::new(bus.clone());
		port.open().unwrap();

		assert_eq!(port.write(&[0x01], 0x00).unwrap_err(), Error::Etime);
		assert_eq!(port.get_status(), Some(I2cError::Timeout));
	}

	#[test]
	fn second_opener_from_another_task_is_portlocked() {
		setup();
		let bus = Arc::new(MockI2cBus::new(Vec::new(), Vec::new()));
		let port = Arc::new(I2cPort::new(bus));
		port.open().unwrap();

		let port2 = port.clone();
		let result = std::thread::spawn(move || port2.open()).join().unwrap();
		assert_eq!(result.unwrap_err(), Error::Ebusy);
	}

	#[test]
	fn operation_without_open_is_eacces() {
		setup();
		let bus = Arc::new(MockI2cBus::new(Vec::new(), Vec::new()));
		let port = I2cPort::new(bus);
		assert_eq!(port.write(&[0x01], 0x00).unwrap_err(), Error::Eacces);
	}
}
