// Licensed under the Apache-2.0 license

//! Static holder connecting the bus interrupt vector to a [`TwiSlave`].
//!
//! The driver is built in the main context and then moved into a
//! `SharedTwiSlave` static. The vector only forwards to
//! [`SharedTwiSlave::service`] inside a critical section:
//!
//! ```rust,ignore
//! static TWI: SharedTwiSlave<Board, Buffer, &'static ExitFlag> = SharedTwiSlave::new();
//!
//! #[interrupt]
//! fn TWI() {
//!     cortex_m::interrupt::free(|cs| {
//!         TWI.service(cs);
//!     });
//! }
//! ```
//!
//! The interrupt must not nest with itself. Holding the critical section for
//! the whole handler also keeps the main context from observing the write
//! state or target address halfway through an event.

use core::cell::RefCell;

use cortex_m::interrupt::{CriticalSection, Mutex};

use crate::common::{Logger, NoOpLogger};
use crate::i2c::traits::TwiHardware;
use crate::i2c::twi_slave::TwiSlave;
use crate::prog::{BootControl, ProgrammingBuffer};

pub struct SharedTwiSlave<H, B, C, L = NoOpLogger>
where
    H: TwiHardware,
    B: ProgrammingBuffer,
    C: BootControl,
    L: Logger,
{
    slave: Mutex<RefCell<Option<TwiSlave<H, B, C, L>>>>,
}

impl<H, B, C, L> Default for SharedTwiSlave<H, B, C, L>
where
    H: TwiHardware,
    B: ProgrammingBuffer,
    C: BootControl,
    L: Logger,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<H, B, C, L> SharedTwiSlave<H, B, C, L>
where
    H: TwiHardware,
    B: ProgrammingBuffer,
    C: BootControl,
    L: Logger,
{
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slave: Mutex::new(RefCell::new(None)),
        }
    }

    /// Hand an initialized driver to the interrupt. Returns the previously
    /// installed driver, if any.
    pub fn install(
        &self,
        cs: &CriticalSection,
        slave: TwiSlave<H, B, C, L>,
    ) -> Option<TwiSlave<H, B, C, L>> {
        self.slave.borrow(cs).replace(Some(slave))
    }

    /// Take the driver back, typically to shut it down before leaving the
    /// bootloader.
    pub fn take(&self, cs: &CriticalSection) -> Option<TwiSlave<H, B, C, L>> {
        self.slave.borrow(cs).take()
    }

    pub fn is_installed(&self, cs: &CriticalSection) -> bool {
        self.slave.borrow(cs).borrow().is_some()
    }

    /// Run the bus handler for the pending condition.
    ///
    /// Returns `false` when no driver is installed or the driver is already
    /// borrowed, i.e. the handler was re-entered.
    pub fn service(&self, cs: &CriticalSection) -> bool {
        self.with(cs, |slave| slave.on_bus_event()).is_some()
    }

    /// Run `f` on the installed driver.
    pub fn with<R>(
        &self,
        cs: &CriticalSection,
        f: impl FnOnce(&mut TwiSlave<H, B, C, L>) -> R,
    ) -> Option<R> {
        let cell = self.slave.borrow(cs);
        let mut guard = cell.try_borrow_mut().ok()?;
        guard.as_mut().map(f)
    }
}
