// SPDX-License-Identifier: GPL-2.0

//! Concrete drivers built against `kernel::driver`'s ten-function
//! contract: memory devices, a UART-style serial byte stream, and the I²C
//! master peripheral driver.

#![no_std]

extern crate alloc;

pub mod i2c_driver;
pub mod mem;
pub mod serial;
