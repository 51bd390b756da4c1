// Licensed under the Apache-2.0 license

//! # Two-Wire Hardware Access Traits
//!
//! The slave state machine never touches registers directly. It goes through
//! two small capabilities, so the protocol logic can be driven by a
//! register-level fake on the host and by the real peripheral on target.
//!
//! ```text
//! TwiRegisters (status / control / data / address registers)
//! TwiLines     (pin mode and module clock gating)
//!     └── TwiHardware (both, blanket implemented)
//! ```

use crate::i2c::common::{LineMode, TwiControl};

/// Register file of the two-wire peripheral.
///
/// Implementations are expected to be plain volatile accesses. None of these
/// methods may block.
///
/// # Examples
///
/// ```rust
/// use twiboot::i2c::{TwiControl, TwiRegisters};
///
/// fn ack_pending<R: TwiRegisters>(regs: &mut R) {
///     let control = regs.control();
///     regs.write_control(control | TwiControl::INT);
/// }
/// ```
pub trait TwiRegisters {
    /// Raw status register, prescaler bits included.
    fn status(&self) -> u8;

    fn control(&self) -> TwiControl;

    /// Write the control register.
    ///
    /// Writing `TwiControl::INT` clears a pending condition; writing it as
    /// zero leaves the pending flag untouched.
    fn write_control(&mut self, value: TwiControl);

    /// Byte received from, or about to be sent to, the bus master.
    fn data(&self) -> u8;

    fn write_data(&mut self, value: u8);

    /// Program the slave address register (`address << 1 | general call`).
    fn write_slave_address(&mut self, value: u8);
}

/// Board-level control of the bus pins and the peripheral clock.
pub trait TwiLines {
    fn set_line_mode(&mut self, mode: LineMode);

    /// Gate the peripheral clock. `true` powers the module.
    fn set_module_power(&mut self, enabled: bool);
}

/// Everything the slave driver needs from the hardware.
pub trait TwiHardware: TwiRegisters + TwiLines {}

impl<T> TwiHardware for T where T: TwiRegisters + TwiLines {}
