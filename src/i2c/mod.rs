// Licensed under the Apache-2.0 license

//! Two-wire (I2C compatible) slave interface used by the bootloader.
//!
//! The protocol state machine lives in [`twi_slave`]; it reaches the hardware
//! only through the [`traits`] capabilities, which [`sim`] implements for host
//! testing. [`isr`] connects a driver instance to the interrupt vector.

pub mod common;
pub mod isr;
pub mod sim;
pub mod traits;
pub mod twi_slave;

pub use common::{
    BusCondition, BusErrorPolicy, Error, LineMode, TargetAddress, TwiConfig, TwiConfigBuilder,
    TwiControl, TwiDiagnostics, WriteState, DEFAULT_SLAVE_ADDRESS,
};
pub use isr::SharedTwiSlave;
pub use traits::{TwiHardware, TwiLines, TwiRegisters};
pub use twi_slave::{TwiSlave, TwiSlaveParts};
