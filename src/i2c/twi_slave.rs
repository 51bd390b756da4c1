// Licensed under the Apache-2.0 license

//! Two-wire slave protocol handler for the bootloader.
//!
//! The host addresses the device, writes a big-endian 16-bit memory address,
//! then either keeps writing data bytes or issues a repeated start and reads.
//!
//! ```text
//! write: S SLA+W  addr_hi addr_lo data0 data1 ...  P      (commit on P)
//! read:  S SLA+W  addr_hi addr_lo  Sr SLA+R data0 ... P
//! exit:  S SLA+W  0xFF    0xFF     P                      (no memory access)
//! ```
//!
//! [`TwiSlave::on_bus_event`] is called once per pending condition. It
//! decodes the status code, updates the write state and target address, makes
//! at most one call into the [`ProgrammingBuffer`], and finally clears the
//! pending flag, which releases the bus.
//!
//! # Preconditions
//!
//! The handler is not reentrant. It must be invoked from a single,
//! non-nesting interrupt context (or a polling loop), and nothing else may
//! hold a mutable reference to the driver while it runs. The
//! [`SharedTwiSlave`](crate::i2c::isr::SharedTwiSlave) holder enforces this
//! with a critical section.

use embedded_hal::i2c::SevenBitAddress;

use crate::common::{log_fmt, Logger, NoOpLogger};
use crate::i2c::common::{
    BusCondition, BusErrorPolicy, Error, LineMode, TargetAddress, TwiConfig, TwiControl,
    TwiDiagnostics, WriteState, MAX_SLAVE_ADDRESS,
};
use crate::i2c::traits::TwiHardware;
use crate::prog::{BootControl, ProgrammingBuffer};

/// Control register value while the slave is listening.
const LISTEN: TwiControl = TwiControl::ENABLE_ACK
    .union(TwiControl::ENABLE)
    .union(TwiControl::INT_ENABLE);

/// Owned collaborators handed back by [`TwiSlave::shutdown`].
pub struct TwiSlaveParts<H, B, C, L> {
    pub hardware: H,
    pub buffer: B,
    pub control: C,
    pub logger: L,
}

/// Bootloader slave on the two-wire bus.
///
/// Exists only while the peripheral is configured: [`TwiSlave::initialize`]
/// builds it and [`TwiSlave::shutdown`] consumes it.
pub struct TwiSlave<H, B, C, L = NoOpLogger>
where
    H: TwiHardware,
    B: ProgrammingBuffer,
    C: BootControl,
    L: Logger,
{
    hardware: H,
    buffer: B,
    control: C,
    logger: L,
    config: TwiConfig,
    write_state: WriteState,
    address_high: u8,
    target: TargetAddress,
    diagnostics: TwiDiagnostics,
}

impl<H, B, C, L> TwiSlave<H, B, C, L>
where
    H: TwiHardware,
    B: ProgrammingBuffer,
    C: BootControl,
    L: Logger,
{
    /// Configure the peripheral as a slave and start listening.
    ///
    /// Powers the module, puts SCL/SDA in pulled-up input mode, programs the
    /// slave address (with general call recognition when configured) and
    /// enables acknowledgement, the module and its interrupt.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSlaveAddress`] if the configured address does
    /// not fit in 7 bits. The hardware is not touched in that case.
    pub fn initialize(
        mut hardware: H,
        buffer: B,
        control: C,
        config: TwiConfig,
        mut logger: L,
    ) -> Result<Self, Error> {
        if config.slave_address > MAX_SLAVE_ADDRESS {
            return Err(Error::InvalidSlaveAddress(config.slave_address));
        }

        hardware.set_module_power(true);
        hardware.set_line_mode(LineMode::PullUpInput);
        hardware.write_slave_address(config.address_register());
        hardware.write_control(LISTEN);

        log_fmt(
            format_args!("twi: slave at {:#04x}", config.slave_address),
            |line| logger.debug(line),
        );

        Ok(Self {
            hardware,
            buffer,
            control,
            logger,
            config,
            write_state: WriteState::AwaitingAddressHighByte,
            address_high: 0,
            target: TargetAddress::default(),
            diagnostics: TwiDiagnostics::default(),
        })
    }

    /// Disable the peripheral and hand the bus lines back.
    ///
    /// Clears the control and address registers, releases SCL/SDA and gates
    /// the module clock, then returns the collaborators so the bus can be
    /// initialized again later.
    pub fn shutdown(mut self) -> TwiSlaveParts<H, B, C, L> {
        self.hardware.write_control(TwiControl::empty());
        self.hardware.write_slave_address(0);
        self.hardware.set_line_mode(LineMode::Released);
        self.hardware.set_module_power(false);
        self.logger.debug("twi: shut down");

        TwiSlaveParts {
            hardware: self.hardware,
            buffer: self.buffer,
            control: self.control,
            logger: self.logger,
        }
    }

    /// Service the pending bus condition.
    ///
    /// Does nothing when no condition is pending. Otherwise the status code
    /// is decoded and handled, and the pending flag is cleared exactly once,
    /// after all state for the event has been updated.
    pub fn on_bus_event(&mut self) {
        if !self.hardware.control().contains(TwiControl::INT) {
            return;
        }

        self.diagnostics.events = self.diagnostics.events.saturating_add(1);

        match BusCondition::try_from(self.hardware.status()) {
            Ok(condition) => {
                self.diagnostics.last_condition = Some(condition);
                self.handle(condition);
            }
            Err(err) => self.unrecognized(err),
        }

        // Releases the bus; the hardware may raise the next condition now.
        let control = self.hardware.control();
        self.hardware.write_control(control | TwiControl::INT);
    }

    fn handle(&mut self, condition: BusCondition) {
        match condition {
            BusCondition::BusError => self.bus_error(),

            // General call writes are decoded exactly like directed writes.
            BusCondition::AddressMatchWrite | BusCondition::AddressMatchGeneralCallWrite => {
                self.write_state = WriteState::AwaitingAddressHighByte;
            }

            BusCondition::DataReceivedAck | BusCondition::GeneralCallDataAck => {
                let byte = self.hardware.data();
                self.receive(byte);
            }

            BusCondition::StopOrRestart => {
                if self.target.is_exit_request() {
                    self.logger.debug("twi: exit requested");
                    self.control.request_exit();
                } else {
                    self.buffer.flush();
                }
            }

            BusCondition::AddressMatchRead | BusCondition::DataTransmittedAck => {
                let byte = self.buffer.get_byte();
                self.hardware.write_data(byte);
            }

            BusCondition::DataTransmittedNack | BusCondition::LastDataAckPending => {
                // Re-arm ACK so the master can address us again.
                let control = self.hardware.control().difference(TwiControl::INT);
                self.hardware.write_control(control | TwiControl::ENABLE_ACK);
            }
        }
    }

    fn receive(&mut self, byte: u8) {
        match self.write_state {
            WriteState::AwaitingAddressHighByte => {
                self.address_high = byte;
            }
            WriteState::AwaitingAddressLowByte => {
                self.target = TargetAddress::from_bytes(self.address_high, byte);
                if !self.target.is_exit_request() {
                    self.buffer.set_address(self.target.value());
                }
            }
            WriteState::StreamingDataByte => {
                self.buffer.set_byte(byte);
            }
        }
        self.write_state = self.write_state.advance();
    }

    fn bus_error(&mut self) {
        self.diagnostics.bus_errors = self.diagnostics.bus_errors.saturating_add(1);

        // INT stays zero here; the final write in on_bus_event clears it.
        let control = self.hardware.control().difference(TwiControl::INT);
        self.hardware.write_control(control | TwiControl::STOP);

        if self.config.bus_error_policy == BusErrorPolicy::ResetTransaction {
            self.write_state = WriteState::AwaitingAddressHighByte;
        }

        log_fmt(format_args!("twi: {}", Error::BusProtocol), |line| {
            self.logger.error(line);
        });
    }

    fn unrecognized(&mut self, err: Error) {
        self.diagnostics.unrecognized_conditions =
            self.diagnostics.unrecognized_conditions.saturating_add(1);
        if let Error::UnrecognizedCondition(code) = err {
            self.diagnostics.last_unrecognized = Some(code);
        }
        log_fmt(format_args!("twi: {err}"), |line| self.logger.error(line));
    }

    /// State applied to the next received data byte.
    pub fn write_state(&self) -> WriteState {
        self.write_state
    }

    /// Most recently assembled target address.
    pub fn target_address(&self) -> TargetAddress {
        self.target
    }

    pub fn slave_address(&self) -> SevenBitAddress {
        self.config.slave_address
    }

    pub fn config(&self) -> &TwiConfig {
        &self.config
    }

    /// Counters for the conditions the handler swallowed.
    pub fn diagnostics(&self) -> TwiDiagnostics {
        self.diagnostics
    }

    pub fn hardware(&self) -> &H {
        &self.hardware
    }

    pub fn hardware_mut(&mut self) -> &mut H {
        &mut self.hardware
    }

    pub fn buffer(&self) -> &B {
        &self.buffer
    }

    pub fn buffer_mut(&mut self) -> &mut B {
        &mut self.buffer
    }
}
